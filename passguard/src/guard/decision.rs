use std::time::Duration;

use super::policy::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    /// Over the per-window limit, first offence.
    RateLimited,
    /// Too many actions within a few seconds.
    BurstBlocked,
    /// Escalated long block.
    Blocked,
    /// Over a coarse fixed-window tier cap.
    Throttled(Tier),
}

impl RejectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectKind::RateLimited => "rate_limited",
            RejectKind::BurstBlocked => "burst_blocked",
            RejectKind::Blocked => "blocked",
            RejectKind::Throttled(_) => "throttled",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            RejectKind::RateLimited => "Too many requests. Please slow down.",
            RejectKind::BurstBlocked => "You are going too fast. Please wait a moment before trying again.",
            RejectKind::Blocked => "Temporarily blocked due to abusive traffic. Please try again later.",
            RejectKind::Throttled(Tier::General) => "Too many requests, please try again later.",
            RejectKind::Throttled(Tier::Generator) => {
                "Too many password generation requests. Please wait before trying again."
            }
            RejectKind::Throttled(Tier::Health) => {
                "Too many health check requests. Please wait before trying again."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit,

    Reject {
        kind: RejectKind,
        reason: String,
        retry_after_secs: u64,
    },
}

impl Verdict {
    pub fn admit() -> Self {
        Self::Admit
    }

    pub fn reject(kind: RejectKind, retry_after: Duration) -> Self {
        Self::Reject {
            kind,
            reason: kind.message().to_string(),
            retry_after_secs: ceil_secs(retry_after),
        }
    }

    pub fn is_admit(&self) -> bool {
        matches!(self, Verdict::Admit)
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Verdict::Admit => "admit",
            Verdict::Reject { kind, .. } => kind.as_str(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Verdict::Admit => 200,
            Verdict::Reject { .. } => 429,
        }
    }
}

/// Whole seconds, rounded up, never below one.
fn ceil_secs(d: Duration) -> u64 {
    let s = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    s.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_rounds_up() {
        let v = Verdict::reject(RejectKind::Blocked, Duration::from_millis(1500));
        assert!(matches!(v, Verdict::Reject { retry_after_secs: 2, .. }));
        let v = Verdict::reject(RejectKind::Blocked, Duration::ZERO);
        assert!(matches!(v, Verdict::Reject { retry_after_secs: 1, .. }));
    }

    #[test]
    fn kinds_have_distinct_messages() {
        let kinds = [
            RejectKind::RateLimited,
            RejectKind::BurstBlocked,
            RejectKind::Blocked,
            RejectKind::Throttled(Tier::General),
            RejectKind::Throttled(Tier::Generator),
            RejectKind::Throttled(Tier::Health),
        ];
        for a in kinds {
            for b in kinds {
                if a != b {
                    assert_ne!(a.message(), b.message());
                }
            }
        }
        assert_eq!(Verdict::admit().kind_str(), "admit");
        assert_eq!(Verdict::reject(RejectKind::RateLimited, Duration::from_secs(30)).status(), 429);
    }
}
