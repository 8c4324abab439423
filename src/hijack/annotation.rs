use std::collections::HashSet;

use crate::models::{Community, ConfiguredRule};

/// Pick the community annotation for a hijack.
///
/// Confs and their annotations are scanned in configured order. A matching
/// annotation replaces `current` only when nothing is set yet, or when it
/// sits strictly earlier in the conf's list than the one already recorded.
/// An existing annotation unknown to a conf is left alone.
pub fn annotate(
    communities: &HashSet<Community>,
    confs: &[ConfiguredRule],
    current: &mut Option<String>,
) {
    for conf in confs {
        for annotation in conf.community_annotations.iter() {
            if !annotation.matches(communities) {
                continue;
            }
            let replace = match current.as_deref() {
                None => true,
                Some(existing) => match (
                    conf.annotation_rank(&annotation.name),
                    conf.annotation_rank(existing),
                ) {
                    (Some(found), Some(recorded)) => found < recorded,
                    _ => false,
                },
            };
            if replace {
                *current = Some(annotation.name.clone());
            }
        }
    }
}
