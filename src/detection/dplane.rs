use super::{Check, DplaneDim, Observation};
use crate::models::{ConfiguredRule, PrefixNode};

// Data-plane checks need traffic measurements the engine doesn't have yet;
// they never report a finding.

fn blackholing(_: &Observation<'_>, _: &PrefixNode, _: &ConfiguredRule) -> Option<DplaneDim> {
    None
}

fn imposture(_: &Observation<'_>, _: &PrefixNode, _: &ConfiguredRule) -> Option<DplaneDim> {
    None
}

fn mitm(_: &Observation<'_>, _: &PrefixNode, _: &ConfiguredRule) -> Option<DplaneDim> {
    None
}

const DPLANE_CHECKS: &[Check<DplaneDim>] = &[blackholing, imposture, mitm];

pub(super) fn check(
    obs: &Observation<'_>,
    node: &PrefixNode,
    conf: &ConfiguredRule,
) -> Option<DplaneDim> {
    DPLANE_CHECKS.iter().find_map(|check| check(obs, node, conf))
}
