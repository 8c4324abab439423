use super::{Check, Finding, Observation, PolicyDim};
use crate::models::{ConfiguredRule, Policy, PrefixNode};

type PolicyCheck = Check<Finding<PolicyDim>>;

/// A no-export route seen further than its first neighbor; the neighbor
/// that re-announced it is to blame
fn leak(obs: &Observation<'_>, _: &PrefixNode, conf: &ConfiguredRule) -> Option<Finding<PolicyDim>> {
    if conf.has_policy(&Policy::NoExport) {
        let neighbor = obs.first_neighbor()?;
        Some(Finding::new(PolicyDim::Leak, Some(neighbor)))
    } else {
        None
    }
}

/// Reserved for other policy violations
fn other(_: &Observation<'_>, _: &PrefixNode, _: &ConfiguredRule) -> Option<Finding<PolicyDim>> {
    None
}

const SHORT_PATH: &[PolicyCheck] = &[other];
const LONG_PATH: &[PolicyCheck] = &[leak, other];

fn checks(path_len: usize) -> &'static [PolicyCheck] {
    if path_len > 3 {
        LONG_PATH
    } else {
        SHORT_PATH
    }
}

pub(super) fn check(
    obs: &Observation<'_>,
    node: &PrefixNode,
    conf: &ConfiguredRule,
) -> Option<Finding<PolicyDim>> {
    checks(obs.path.len())
        .iter()
        .find_map(|check| check(obs, node, conf))
}
