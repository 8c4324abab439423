use std::collections::HashSet;

/// Remove AS-path prepending (consecutive repeats of the same ASN).
/// Also reports whether a non-adjacent repeat (a loop) remains.
fn remove_prepending(path: &[u32]) -> (Vec<u32>, bool) {
    let mut cleaned: Vec<u32> = Vec::with_capacity(path.len());
    for &asn in path {
        if cleaned.last() != Some(&asn) {
            cleaned.push(asn);
        }
    }
    let distinct: HashSet<&u32> = path.iter().collect();
    let is_loopy = distinct.len() != cleaned.len();
    (cleaned, is_loopy)
}

/// Break loops walking from the origin towards the peer, the direction
/// traffic follows. A repeated ASN cuts the path back to its first sighting.
fn remove_loops(path: &[u32]) -> Vec<u32> {
    let mut from_origin: Vec<u32> = Vec::with_capacity(path.len());
    for &asn in path.iter().rev() {
        match from_origin.iter().position(|&a| a == asn) {
            Some(idx) => from_origin.truncate(idx + 1),
            None => from_origin.push(asn),
        }
    }
    from_origin.reverse();
    from_origin
}

/// Canonical AS-path: no prepends, no loops, ordered peer -> origin
pub fn clean_as_path(path: &[u32]) -> Vec<u32> {
    let (cleaned, is_loopy) = remove_prepending(path);
    if is_loopy {
        remove_loops(&cleaned)
    } else {
        cleaned
    }
}
