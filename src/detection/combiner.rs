use log::trace;

use super::{dplane, path, policy, prefix, Observation, Verdict};
use crate::models::{ConfiguredRule, PrefixNode};

/// Dimension tuples (prefix, path, data plane, policy) that amount to a hijack
pub const HIJACK_DIM_COMBINATIONS: [[char; 4]; 15] = [
    ['S', '0', '-', '-'],
    ['S', '0', '-', 'L'],
    ['S', '1', '-', '-'],
    ['S', '1', '-', 'L'],
    ['S', 'P', '-', '-'],
    ['S', '-', '-', '-'],
    ['S', '-', '-', 'L'],
    ['E', '0', '-', '-'],
    ['E', '0', '-', 'L'],
    ['E', '1', '-', '-'],
    ['E', '1', '-', 'L'],
    ['E', 'P', '-', '-'],
    ['E', '-', '-', 'L'],
    ['Q', '0', '-', '-'],
    ['Q', '0', '-', 'L'],
];

/// Final hijack verdict for an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub verdict: Verdict,
    pub hijacker: Option<u32>,
}

impl Classification {
    pub fn hijack_type(&self) -> String {
        self.verdict.hijack_type()
    }
}

/// Score one update against one conf, every dimension in priority order
pub fn evaluate(obs: &Observation<'_>, node: &PrefixNode, conf: &ConfiguredRule) -> Verdict {
    Verdict {
        prefix: prefix::check(obs, node, conf),
        path: path::check(obs, node, conf),
        dplane: dplane::check(obs, node, conf),
        policy: policy::check(obs, node, conf),
    }
}

/// Classify an update against every conf of its matched prefix.
///
/// The last hijack-shaped verdict wins, but a single conf under which the
/// update looks benign clears it entirely, whatever its position.
pub fn classify(obs: &Observation<'_>, node: &PrefixNode) -> Option<Classification> {
    let mut candidate = None;
    for conf in node.confs.iter() {
        let verdict = evaluate(obs, node, conf);
        trace!("{} under {} conf: {}", obs.update, node.prefix, verdict);
        if !verdict.is_hijack_shaped() {
            return None;
        }
        candidate = Some(Classification {
            hijacker: verdict.accused(),
            verdict,
        });
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AsnSet, Policy, RouteUpdate};
    use chrono::Utc;

    fn conf(origins: &[u32], neighbors: &[u32]) -> ConfiguredRule {
        ConfiguredRule {
            origin_asns: AsnSet::Listed(origins.to_vec()),
            neighbors: AsnSet::Listed(neighbors.to_vec()),
            ..Default::default()
        }
    }

    fn no_export(mut conf: ConfiguredRule) -> ConfiguredRule {
        conf.policies = vec![Policy::NoExport];
        conf
    }

    fn node(prefix: &str, confs: Vec<ConfiguredRule>) -> PrefixNode {
        let mut node = PrefixNode::new(prefix.parse().unwrap(), Utc::now());
        node.confs = confs;
        node
    }

    fn run(prefix: &str, path: Vec<u32>, node: &PrefixNode) -> Option<(String, Option<u32>)> {
        let update = RouteUpdate::announce(prefix.parse().unwrap(), path, 4, "a");
        classify(&Observation::new(&update), node).map(|c| (c.hijack_type(), c.hijacker))
    }

    fn hijack(kind: &str, hijacker: u32) -> Option<(String, Option<u32>)> {
        Some((kind.to_string(), Some(hijacker)))
    }

    #[test]
    fn test_subprefix_type_0() {
        let n = node("10.0.0.0/24", vec![conf(&[1], &[2])]);
        assert_eq!(run("10.0.0.0/25", vec![4, 3, 2, 100], &n), hijack("S|0|-|-", 100));
        let n = node("10.0.0.0/24", vec![no_export(conf(&[1], &[2]))]);
        assert_eq!(run("10.0.0.0/25", vec![4, 3, 2, 100], &n), hijack("S|0|-|L", 100));
    }

    #[test]
    fn test_subprefix_type_1() {
        let n = node("10.0.0.0/24", vec![conf(&[1], &[2])]);
        assert_eq!(run("10.0.0.0/25", vec![4, 3, 100, 1], &n), hijack("S|1|-|-", 100));
        let n = node("10.0.0.0/24", vec![no_export(conf(&[1], &[2]))]);
        assert_eq!(run("10.0.0.0/25", vec![4, 3, 100, 1], &n), hijack("S|1|-|L", 100));
    }

    #[test]
    fn test_subprefix_legit_path() {
        // Legit origin & neighbor still hijack when announcing a sub-prefix,
        // but there's no one to blame
        let n = node("10.0.0.0/24", vec![conf(&[1], &[2])]);
        assert_eq!(
            run("10.0.0.0/25", vec![4, 3, 2, 1], &n),
            Some(("S|-|-|-".to_string(), None))
        );
        let n = node("10.0.0.0/24", vec![no_export(conf(&[1], &[2]))]);
        assert_eq!(run("10.0.0.0/25", vec![4, 3, 2, 1], &n), hijack("S|-|-|L", 2));
    }

    #[test]
    fn test_type_p() {
        let mut c = conf(&[1], &[]);
        c.prepend_seq = vec![vec![4, 3, 2]];
        let n = node("10.0.0.0/24", vec![c]);
        assert_eq!(run("10.0.0.0/25", vec![9, 5, 3, 2, 1], &n), hijack("S|P|-|-", 5));
        assert_eq!(run("10.0.0.0/24", vec![9, 5, 3, 2, 1], &n), hijack("E|P|-|-", 5));
        assert_eq!(run("10.0.0.0/24", vec![9, 4, 3, 2, 1], &n), None);
    }

    #[test]
    fn test_exact_prefix() {
        let n = node("10.0.0.0/24", vec![conf(&[1], &[2])]);
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 100], &n), hijack("E|0|-|-", 100));
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 100, 1], &n), hijack("E|1|-|-", 100));
        let n = node("10.0.0.0/24", vec![no_export(conf(&[1], &[2]))]);
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 100], &n), hijack("E|0|-|L", 100));
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 100, 1], &n), hijack("E|1|-|L", 100));
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 1], &n), hijack("E|-|-|L", 2));
    }

    #[test]
    fn test_exact_prefix_benign() {
        let n = node("10.0.0.0/24", vec![conf(&[1], &[2])]);
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 1], &n), None);
        // prepends and loops are cleaned before checking
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 2, 1, 1], &n), None);
        let wildcard = node(
            "10.0.0.0/24",
            vec![ConfiguredRule {
                origin_asns: AsnSet::Any,
                ..Default::default()
            }],
        );
        assert_eq!(run("10.0.0.0/24", vec![7, 8, 9], &wildcard), None);
    }

    #[test]
    fn test_squatting() {
        let n = node("10.0.0.0/24", vec![conf(&[], &[])]);
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 1], &n), hijack("Q|0|-|-", 1));
        assert_eq!(run("10.0.0.0/25", vec![1], &n), hijack("Q|0|-|-", 1));
        let n = node("10.0.0.0/24", vec![no_export(conf(&[], &[]))]);
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 1], &n), hijack("Q|0|-|L", 1));
    }

    #[test]
    fn test_empty_path_squatting_is_benign() {
        // No origin to blame: Q|-|-|- is not hijack shaped
        let n = node("10.0.0.0/24", vec![conf(&[], &[])]);
        assert_eq!(run("10.0.0.0/24", vec![], &n), None);
    }

    #[test]
    fn test_benign_conf_overrides_hijack() {
        let hijacked = conf(&[1], &[2]);
        let benign = conf(&[100], &[]);
        let n = node("10.0.0.0/24", vec![hijacked.clone(), benign.clone()]);
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 100], &n), None);
        let n = node("10.0.0.0/24", vec![benign, hijacked]);
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 100], &n), None);
    }

    #[test]
    fn test_last_hijack_candidate_wins() {
        let n = node(
            "10.0.0.0/24",
            vec![conf(&[1], &[2]), no_export(conf(&[1], &[2]))],
        );
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 100], &n), hijack("E|0|-|L", 100));
    }

    #[test]
    fn test_no_confs() {
        let n = node("10.0.0.0/24", vec![]);
        assert_eq!(run("10.0.0.0/24", vec![4, 3, 2, 100], &n), None);
    }
}
