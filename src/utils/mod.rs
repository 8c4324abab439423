mod display;
pub use display::*;
mod hash;
pub use hash::*;
mod path;
pub use path::*;

use ipnetwork::IpNetwork;

/// The network directly covering `prefix` (one bit shorter)
pub fn supernet(prefix: &IpNetwork) -> Option<IpNetwork> {
    let len = prefix.prefix().checked_sub(1)?;
    let wider = IpNetwork::new(prefix.ip(), len).ok()?;
    IpNetwork::new(wider.network(), len).ok()
}

/// Does `outer` cover `inner` (same or less specific)
pub fn covers(outer: &IpNetwork, inner: &IpNetwork) -> bool {
    outer.prefix() <= inner.prefix() && outer.contains(inner.network())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNetwork {
        s.parse().unwrap()
    }

    #[test]
    fn test_supernet() {
        assert_eq!(supernet(&net("10.0.1.0/24")), Some(net("10.0.0.0/23")));
        assert_eq!(supernet(&net("2001:db8:8000::/33")), Some(net("2001:db8::/32")));
        assert_eq!(supernet(&net("0.0.0.0/0")), None);
    }

    #[test]
    fn test_covers() {
        assert!(covers(&net("10.0.0.0/8"), &net("10.1.0.0/16")));
        assert!(covers(&net("10.0.0.0/8"), &net("10.0.0.0/8")));
        assert!(!covers(&net("10.0.0.0/8"), &net("2001:db8::/32")));
        assert!(!covers(&net("10.1.0.0/16"), &net("10.0.0.0/8")));
    }
}
