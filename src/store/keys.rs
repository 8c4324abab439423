use ipnetwork::IpNetwork;

/// Set of persistent hijack keys currently tracked
pub const PERSISTENT_KEYS: &str = "persistent-keys";

pub fn lock_token(hijack_key: &str) -> String {
    format!("{}token", hijack_key)
}

pub fn lock_token_active(hijack_key: &str) -> String {
    format!("{}token_active", hijack_key)
}

/// (prefix, peer) -> hijack keys
pub fn prefix_peer_hijacks(prefix: &IpNetwork, peer_asn: u32) -> String {
    format!("prefix_{}_peer_{}_hijacks", prefix, peer_asn)
}

/// hijack key -> "prefix_peer" members, reverse of `prefix_peer_hijacks`
pub fn hijack_prefixes_peers(hijack_key: &str) -> String {
    format!("hijack_{}_prefixes_peers", hijack_key)
}

pub fn prefix_peer_member(prefix: &IpNetwork, peer_asn: u32) -> String {
    format!("{}_{}", prefix, peer_asn)
}

/// Split a `prefix_peer_member` back into its parts
pub fn parse_prefix_peer_member(member: &str) -> Option<(IpNetwork, u32)> {
    let (prefix, peer) = member.rsplit_once('_')?;
    Some((prefix.parse().ok()?, peer.parse().ok()?))
}

/// hijack key -> "origin_neighbor" pairs
pub fn hijack_origin_neighbors(hijack_key: &str) -> String {
    format!("hij_orig_neighb_{}", hijack_key)
}

pub fn origin_neighbor_member(origin: Option<u32>, neighbor: Option<u32>) -> String {
    let render = |asn: Option<u32>| asn.map_or_else(|| "None".to_string(), |a| a.to_string());
    format!("{}_{}", render(origin), render(neighbor))
}

pub fn rpki_status(asn: u32, prefix: &IpNetwork) -> String {
    format!("rpki_as{}_p{}", asn, prefix)
}

pub fn seen_update(update_key: &str) -> String {
    format!("seen_{}", update_key)
}
