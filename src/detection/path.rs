use super::{prepend_mismatch, Check, Finding, Observation, PathDim};
use crate::models::{ConfiguredRule, PrefixNode};

type PathCheck = Check<Finding<PathDim>>;

/// Origin not among the allowed origins
fn type_0(obs: &Observation<'_>, _: &PrefixNode, conf: &ConfiguredRule) -> Option<Finding<PathDim>> {
    let origin = obs.origin()?;
    if conf.origin_asns.contains(origin) {
        None
    } else {
        Some(Finding::new(PathDim::Type0, Some(origin)))
    }
}

/// Allowed origin reached through a neighbor that isn't allowed
fn type_1(obs: &Observation<'_>, _: &PrefixNode, conf: &ConfiguredRule) -> Option<Finding<PathDim>> {
    let origin = obs.origin()?;
    let neighbor = obs.first_neighbor()?;
    if conf.origin_asns.contains(origin) && conf.allows_neighbor(neighbor) {
        None
    } else {
        Some(Finding::new(PathDim::Type1, Some(neighbor)))
    }
}

/// Hops before the origin don't follow any configured prepend pattern
fn type_p(obs: &Observation<'_>, _: &PrefixNode, conf: &ConfiguredRule) -> Option<Finding<PathDim>> {
    let mismatch = prepend_mismatch(obs.orig_path(), &conf.prepend_seq)?;
    // Fail closed when the culprit can't be pinned down
    let accused = mismatch.accused?;
    Some(Finding::new(PathDim::TypeP, Some(accused)))
}

fn type_n(_: &Observation<'_>, _: &PrefixNode, _: &ConfiguredRule) -> Option<Finding<PathDim>> {
    None
}

fn type_u(_: &Observation<'_>, _: &PrefixNode, _: &ConfiguredRule) -> Option<Finding<PathDim>> {
    None
}

const EMPTY_PATH: &[PathCheck] = &[type_u];
const ORIGIN_ONLY: &[PathCheck] = &[type_0, type_u];
const ORIGIN_AND_NEIGHBOR: &[PathCheck] = &[type_0, type_1, type_p, type_u];
const LONG_PATH: &[PathCheck] = &[type_0, type_1, type_p, type_n, type_u];

/// Checks that make sense for a canonical path of `path_len` hops, in priority order
fn checks(path_len: usize) -> &'static [PathCheck] {
    match path_len {
        0 => EMPTY_PATH,
        1 => ORIGIN_ONLY,
        2 => ORIGIN_AND_NEIGHBOR,
        _ => LONG_PATH,
    }
}

pub(super) fn check(
    obs: &Observation<'_>,
    node: &PrefixNode,
    conf: &ConfiguredRule,
) -> Option<Finding<PathDim>> {
    checks(obs.path.len())
        .iter()
        .find_map(|check| check(obs, node, conf))
}
