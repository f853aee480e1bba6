//! Client identity resolution.
//!
//! A request is keyed either by a network address taken from an ordered list
//! of trusted signals, or by an opaque session token kept in a cookie. The two
//! strategies are alternatives selected by configuration.

pub mod address;
pub mod cookie;
pub mod session;

use std::net::SocketAddr;

use serde::Deserialize;

use crate::generator::SamplerError;

pub use address::SignalSource;

pub const UNKNOWN_IDENTITY: &str = "unknown";

/// What the identity layer needs from an inbound request.
pub trait RequestView {
    fn header(&self, name: &str) -> Option<&str>;

    fn peer_addr(&self) -> Option<SocketAddr>;

    fn cookie(&self, name: &str) -> Option<&str> {
        self.header("cookie")
            .and_then(|h| cookie::get_cookie_value(h, name))
    }

    /// Whether the client reached us over TLS, directly or through the edge.
    fn is_tls(&self) -> bool {
        self.header("x-forwarded-proto")
            .is_some_and(|p| p.trim().eq_ignore_ascii_case("https"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    Header(String),
    Peer,
    Session,
    /// Freshly minted session token.
    NewSession,
    Unknown,
}

impl IdentitySource {
    pub fn as_str(&self) -> &str {
        match self {
            IdentitySource::Header(name) => name.as_str(),
            IdentitySource::Peer => "peer",
            IdentitySource::Session => "session",
            IdentitySource::NewSession => "new_session",
            IdentitySource::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub key: String,
    pub source: IdentitySource,
    /// `Set-Cookie` value to send back when a session was minted.
    pub set_cookie: Option<String>,
}

impl Identity {
    pub fn unknown() -> Self {
        Self {
            key: UNKNOWN_IDENTITY.to_string(),
            source: IdentitySource::Unknown,
            set_cookie: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.source == IdentitySource::Unknown
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("mint session token: {0}")]
    Mint(#[from] SamplerError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum IdentityConfig {
    Address {
        #[serde(default = "address::default_sources")]
        trusted_sources: Vec<SignalSource>,
    },
    Session {
        #[serde(default = "session::default_cookie_name")]
        cookie_name: String,
        #[serde(default = "session::default_max_age_days")]
        max_age_days: u64,
    },
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig::Address {
            trusted_sources: address::default_sources(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum IdentityResolver {
    Address(address::AddressResolver),
    Session(session::SessionResolver),
}

impl IdentityResolver {
    pub fn from_config(cfg: &IdentityConfig) -> Self {
        match cfg {
            IdentityConfig::Address { trusted_sources } => {
                IdentityResolver::Address(address::AddressResolver::new(trusted_sources.clone()))
            }
            IdentityConfig::Session {
                cookie_name,
                max_age_days,
            } => IdentityResolver::Session(session::SessionResolver::new(
                cookie_name.clone(),
                *max_age_days,
            )),
        }
    }

    pub fn resolve(&self, req: &dyn RequestView) -> Result<Identity, IdentityError> {
        match self {
            IdentityResolver::Address(r) => Ok(r.resolve(req)),
            IdentityResolver::Session(r) => r.resolve(req),
        }
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            IdentityResolver::Address(_) => "address",
            IdentityResolver::Session(_) => "session",
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// In-memory request for tests.
    #[derive(Debug, Default, Clone)]
    pub struct FakeRequest {
        pub headers: HashMap<String, String>,
        pub peer: Option<SocketAddr>,
    }

    impl FakeRequest {
        pub fn from_peer(addr: &str) -> Self {
            Self {
                headers: HashMap::new(),
                peer: addr.parse().ok(),
            }
        }

        pub fn with_header(mut self, name: &str, value: &str) -> Self {
            self.headers.insert(name.to_ascii_lowercase(), value.to_string());
            self
        }
    }

    impl RequestView for FakeRequest {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
        }

        fn peer_addr(&self) -> Option<SocketAddr> {
            self.peer
        }
    }
}
