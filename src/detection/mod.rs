//! Hijack classification of a single update against the confs of the
//! prefix it matched.
//!
//! Each update is scored along four dimensions (prefix, path, data plane,
//! policy). Every dimension is a short, ordered table of checks and the
//! first check that reports a finding wins. The combined tuple is then
//! compared against the hijack-shaped combinations in [`combiner`].

pub mod combiner;
mod dplane;
mod path;
mod pattern;
mod policy;
mod prefix;

pub use combiner::{classify, evaluate, Classification, HIJACK_DIM_COMBINATIONS};
pub use pattern::{prepend_mismatch, PatternMismatch};

use std::fmt;

use crate::models::{ConfiguredRule, PrefixNode, RouteUpdate};
use crate::utils::clean_as_path;

/// Code rendered for a dimension that reported nothing
pub const NO_FINDING: char = '-';

/// An update as seen by the classifiers: the raw path is kept for
/// prepend-pattern checks, everything else uses the canonical path
#[derive(Debug)]
pub struct Observation<'a> {
    pub update: &'a RouteUpdate,
    pub path: Vec<u32>,
}

impl<'a> Observation<'a> {
    pub fn new(update: &'a RouteUpdate) -> Self {
        Self {
            update,
            path: clean_as_path(&update.path),
        }
    }

    pub fn orig_path(&self) -> &[u32] {
        &self.update.path
    }

    pub fn origin(&self) -> Option<u32> {
        self.path.last().copied()
    }

    /// ASN adjacent to the origin
    pub fn first_neighbor(&self) -> Option<u32> {
        self.hop_from_origin(1)
    }

    /// Canonical path hop `n` positions before the origin (0 = origin)
    pub fn hop_from_origin(&self, n: usize) -> Option<u32> {
        let idx = self.path.len().checked_sub(n + 1)?;
        self.path.get(idx).copied()
    }
}

pub(crate) type Check<D> = fn(&Observation<'_>, &PrefixNode, &ConfiguredRule) -> Option<D>;

pub trait Dimension {
    fn code(&self) -> char;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrefixDim {
    Squatting,
    SubPrefix,
    Exact,
}

impl Dimension for PrefixDim {
    fn code(&self) -> char {
        match self {
            PrefixDim::Squatting => 'Q',
            PrefixDim::SubPrefix => 'S',
            PrefixDim::Exact => 'E',
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PathDim {
    /// Illegal origin
    Type0,
    /// Legal origin, illegal first neighbor
    Type1,
    /// Path does not follow any configured prepend pattern
    TypeP,
    /// Reserved
    TypeN,
    /// Reserved
    TypeU,
}

impl PathDim {
    /// Number of hops (from the origin) controlled by the hijacker, for
    /// the numeric path types
    pub fn hops(&self) -> Option<usize> {
        match self {
            PathDim::Type0 => Some(0),
            PathDim::Type1 => Some(1),
            _ => None,
        }
    }
}

impl Dimension for PathDim {
    fn code(&self) -> char {
        match self {
            PathDim::Type0 => '0',
            PathDim::Type1 => '1',
            PathDim::TypeP => 'P',
            PathDim::TypeN => 'N',
            PathDim::TypeU => 'U',
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DplaneDim {
    Blackholing,
    Imposture,
    Mitm,
}

impl Dimension for DplaneDim {
    fn code(&self) -> char {
        match self {
            DplaneDim::Blackholing => 'B',
            DplaneDim::Imposture => 'I',
            DplaneDim::Mitm => 'M',
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PolicyDim {
    /// Announcement propagated despite no-export
    Leak,
    /// Reserved
    Other,
}

impl Dimension for PolicyDim {
    fn code(&self) -> char {
        match self {
            PolicyDim::Leak => 'L',
            PolicyDim::Other => 'O',
        }
    }
}

/// What a dimension check found, and whom it blames
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Finding<D> {
    pub dim: D,
    pub accused: Option<u32>,
}

impl<D> Finding<D> {
    pub fn new(dim: D, accused: Option<u32>) -> Self {
        Self { dim, accused }
    }
}

/// Outcome of all four dimensions for one (update, conf) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub prefix: PrefixDim,
    pub path: Option<Finding<PathDim>>,
    pub dplane: Option<DplaneDim>,
    pub policy: Option<Finding<PolicyDim>>,
}

fn code_of<D: Dimension>(dim: Option<&D>) -> char {
    dim.map_or(NO_FINDING, |d| d.code())
}

impl Verdict {
    pub fn codes(&self) -> [char; 4] {
        [
            self.prefix.code(),
            code_of(self.path.as_ref().map(|f| &f.dim)),
            code_of(self.dplane.as_ref()),
            code_of(self.policy.as_ref().map(|f| &f.dim)),
        ]
    }

    /// Tuple rendered like "S|0|-|L"
    pub fn hijack_type(&self) -> String {
        itertools::join(self.codes().iter(), "|")
    }

    pub fn is_hijack_shaped(&self) -> bool {
        HIJACK_DIM_COMBINATIONS.contains(&self.codes())
    }

    /// Path-dimension culprit, falling back to the policy-dimension one
    pub fn accused(&self) -> Option<u32> {
        self.path
            .and_then(|f| f.accused)
            .or_else(|| self.policy.and_then(|f| f.accused))
    }

    pub fn is_leak(&self) -> bool {
        matches!(self.policy, Some(Finding { dim: PolicyDim::Leak, .. }))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.hijack_type())
    }
}
