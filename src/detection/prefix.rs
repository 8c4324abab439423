use super::{Check, Observation, PrefixDim};
use crate::models::{ConfiguredRule, PrefixNode};

/// No origin configured at all (not even a wildcard): nobody may announce it
fn squatting(_: &Observation<'_>, _: &PrefixNode, conf: &ConfiguredRule) -> Option<PrefixDim> {
    if conf.origin_asns.is_empty() {
        Some(PrefixDim::Squatting)
    } else {
        None
    }
}

fn sub_prefix(obs: &Observation<'_>, node: &PrefixNode, _: &ConfiguredRule) -> Option<PrefixDim> {
    if node.prefix.prefix() < obs.update.prefix.prefix() {
        Some(PrefixDim::SubPrefix)
    } else {
        Some(PrefixDim::Exact)
    }
}

const PREFIX_CHECKS: &[Check<PrefixDim>] = &[squatting, sub_prefix];

/// The prefix dimension always reports something
pub(super) fn check(obs: &Observation<'_>, node: &PrefixNode, conf: &ConfiguredRule) -> PrefixDim {
    PREFIX_CHECKS
        .iter()
        .find_map(|check| check(obs, node, conf))
        .unwrap_or(PrefixDim::Exact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AsnSet, RouteUpdate};
    use chrono::Utc;

    fn node(prefix: &str) -> PrefixNode {
        PrefixNode::new(prefix.parse().unwrap(), Utc::now())
    }

    #[test]
    fn test_prefix_dimension() {
        let update = RouteUpdate::announce("10.0.0.0/25".parse().unwrap(), vec![1], 1, "a");
        let obs = Observation::new(&update);
        let legit = ConfiguredRule {
            origin_asns: AsnSet::Listed(vec![1]),
            ..Default::default()
        };
        assert_eq!(check(&obs, &node("10.0.0.0/24"), &legit), PrefixDim::SubPrefix);
        assert_eq!(check(&obs, &node("10.0.0.0/25"), &legit), PrefixDim::Exact);
        let wildcard = ConfiguredRule {
            origin_asns: AsnSet::Any,
            ..Default::default()
        };
        assert_eq!(check(&obs, &node("10.0.0.0/24"), &wildcard), PrefixDim::SubPrefix);
        let squatted = ConfiguredRule::default();
        assert_eq!(check(&obs, &node("10.0.0.0/24"), &squatted), PrefixDim::Squatting);
    }
}
