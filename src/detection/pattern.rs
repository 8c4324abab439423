/// How an observed path failed the configured prepend patterns
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PatternMismatch {
    /// Longest run of hops, counted back from the origin, that agreed with
    /// some configured pattern
    pub best_match: usize,
    /// First hop breaking the best matching pattern
    pub accused: Option<u32>,
}

/// Hops at the end of `observed` and `expected` that agree, walking back
/// from the origin side until the first difference
fn match_run_length(observed: &[u32], expected: &[u32]) -> usize {
    observed
        .iter()
        .rev()
        .zip(expected.iter().rev())
        .take_while(|(o, e)| o == e)
        .count()
}

/// Compare the hops right before the origin of the raw `path` against every
/// configured sequence. `None` when nothing is configured or some sequence
/// matches exactly.
pub fn prepend_mismatch(path: &[u32], sequences: &[Vec<u32>]) -> Option<PatternMismatch> {
    if sequences.is_empty() {
        return None;
    }
    let mut best_match = 0;
    for expected in sequences {
        if path.len() < expected.len() + 1 {
            continue;
        }
        let origin_idx = path.len() - 1;
        let observed = &path[origin_idx - expected.len()..origin_idx];
        if observed == expected.as_slice() {
            return None;
        }
        best_match = best_match.max(match_run_length(observed, expected));
    }
    let accused = path
        .len()
        .checked_sub(best_match + 2)
        .and_then(|idx| path.get(idx).copied());
    Some(PatternMismatch {
        best_match,
        accused,
    })
}
