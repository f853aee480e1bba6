use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::generator::SecureSampler;

use super::cookie::SetCookie;
use super::{Identity, IdentityError, IdentitySource, RequestView};

pub const TOKEN_LEN: usize = 32;
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^[A-Za-z0-9]{{{TOKEN_LEN}}}$")).expect("static token pattern")
});

pub fn default_cookie_name() -> String {
    "pg_sid".to_string()
}

pub fn default_max_age_days() -> u64 {
    365
}

pub fn is_valid_token(t: &str) -> bool {
    TOKEN_RE.is_match(t)
}

pub fn mint_token() -> Result<String, IdentityError> {
    let mut sampler = SecureSampler::new();
    let mut out = String::with_capacity(TOKEN_LEN);
    for _ in 0..TOKEN_LEN {
        out.push(*sampler.pick(TOKEN_ALPHABET)? as char);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct SessionResolver {
    cookie_name: String,
    max_age: Duration,
}

impl SessionResolver {
    pub fn new(cookie_name: String, max_age_days: u64) -> Self {
        Self {
            cookie_name,
            max_age: Duration::from_secs(max_age_days.saturating_mul(24 * 60 * 60)),
        }
    }

    pub fn resolve(&self, req: &dyn RequestView) -> Result<Identity, IdentityError> {
        if let Some(tok) = req.cookie(&self.cookie_name) {
            if is_valid_token(tok) {
                return Ok(Identity {
                    key: tok.to_string(),
                    source: IdentitySource::Session,
                    set_cookie: None,
                });
            }
            tracing::debug!(cookie = %self.cookie_name, "discarding malformed session token");
        }

        let token = mint_token()?;
        let set_cookie = SetCookie {
            name: &self.cookie_name,
            value: &token,
            max_age: self.max_age,
            secure: req.is_tls(),
        }
        .render();

        Ok(Identity {
            key: token,
            source: IdentitySource::NewSession,
            set_cookie: Some(set_cookie),
        })
    }
}
