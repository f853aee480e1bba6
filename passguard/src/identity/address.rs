use std::net::IpAddr;

use serde::Deserialize;

use super::{Identity, IdentitySource, RequestView};

/// One place a client address may be read from. Sources are tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum SignalSource {
    Header {
        name: String,
        /// Header carries a comma list (`X-Forwarded-For`); take the first hop.
        #[serde(default)]
        first_hop: bool,
    },
    Peer,
}

pub fn default_sources() -> Vec<SignalSource> {
    vec![
        SignalSource::Header {
            name: "cf-connecting-ip".into(),
            first_hop: false,
        },
        SignalSource::Header {
            name: "x-forwarded-for".into(),
            first_hop: true,
        },
        SignalSource::Header {
            name: "x-real-ip".into(),
            first_hop: false,
        },
        SignalSource::Peer,
    ]
}

#[derive(Debug, Clone)]
pub struct AddressResolver {
    sources: Vec<SignalSource>,
}

impl AddressResolver {
    pub fn new(sources: Vec<SignalSource>) -> Self {
        Self { sources }
    }

    pub fn resolve(&self, req: &dyn RequestView) -> Identity {
        for src in &self.sources {
            let (candidate, source) = match src {
                SignalSource::Header { name, first_hop } => {
                    let Some(raw) = req.header(name) else { continue };
                    let v = if *first_hop {
                        raw.split(',').next().unwrap_or("")
                    } else {
                        raw
                    };
                    (parse_ip(v), IdentitySource::Header(name.to_ascii_lowercase()))
                }
                SignalSource::Peer => (req.peer_addr().map(|a| a.ip()), IdentitySource::Peer),
            };

            match candidate {
                Some(ip) => {
                    return Identity {
                        key: canonical(ip).to_string(),
                        source,
                        set_cookie: None,
                    };
                }
                None => {
                    tracing::debug!(source = %source.as_str(), "ignoring malformed client address");
                }
            }
        }
        Identity::unknown()
    }
}

/// Strict IPv4/IPv6 literal; anything else is rejected.
fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.trim().parse::<IpAddr>().ok()
}

/// Folds IPv4-mapped IPv6 peers onto their IPv4 form so one client keeps one key.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::testing::FakeRequest;

    fn resolver() -> AddressResolver {
        AddressResolver::new(default_sources())
    }

    #[test]
    fn edge_header_wins() {
        let req = FakeRequest::from_peer("10.0.0.1:5000")
            .with_header("cf-connecting-ip", "203.0.113.7")
            .with_header("x-forwarded-for", "198.51.100.1");
        let id = resolver().resolve(&req);
        assert_eq!(id.key, "203.0.113.7");
        assert_eq!(id.source, IdentitySource::Header("cf-connecting-ip".into()));
    }

    #[test]
    fn forwarded_for_uses_first_hop() {
        let req = FakeRequest::from_peer("10.0.0.1:5000")
            .with_header("x-forwarded-for", " 2001:db8::1 , 10.0.0.2");
        assert_eq!(resolver().resolve(&req).key, "2001:db8::1");
    }

    #[test]
    fn malformed_headers_fall_through_to_peer() {
        let req = FakeRequest::from_peer("192.0.2.10:443")
            .with_header("cf-connecting-ip", "not-an-ip")
            .with_header("x-forwarded-for", "999.1.1.1, 1.2.3.4")
            .with_header("x-real-ip", "1.2.3.4; drop table");
        let id = resolver().resolve(&req);
        assert_eq!(id.key, "192.0.2.10");
        assert_eq!(id.source, IdentitySource::Peer);
    }

    #[test]
    fn mapped_ipv6_peer_is_folded() {
        let req = FakeRequest::from_peer("[::ffff:192.0.2.5]:80");
        assert_eq!(resolver().resolve(&req).key, "192.0.2.5");
    }

    #[test]
    fn nothing_valid_is_unknown() {
        let req = FakeRequest::default().with_header("x-real-ip", "garbage");
        assert!(resolver().resolve(&req).is_unknown());
    }

    #[test]
    fn headers_are_ignored_when_not_trusted() {
        let r = AddressResolver::new(vec![SignalSource::Peer]);
        let req = FakeRequest::from_peer("192.0.2.1:1")
            .with_header("cf-connecting-ip", "203.0.113.7");
        assert_eq!(r.resolve(&req).key, "192.0.2.1");
    }
}
