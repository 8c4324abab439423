use ipnetwork::IpNetwork;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Placeholder used in hashes when no ASN could be accused
const NO_ASN: i64 = -1;

/// Stable 128-bit hex digest over the JSON encoding of `obj`
pub fn get_hash<T: Serialize + ?Sized>(obj: &T) -> String {
    // Plain tuples, strings & numbers never fail to encode
    let encoded = serde_json::to_vec(obj).unwrap_or_default();
    Sha256::digest(&encoded)[..16]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn asn_or_placeholder(asn: Option<u32>) -> i64 {
    asn.map_or(NO_ASN, i64::from)
}

/// Ephemeral identity of an ongoing hijack
pub fn hijack_key(prefix: &IpNetwork, hijack_as: Option<u32>, hij_type: &str) -> String {
    get_hash(&(prefix.to_string(), asn_or_placeholder(hijack_as), hij_type))
}
