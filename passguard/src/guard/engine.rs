use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use crate::identity::{Identity, IdentityResolver, RequestView};
use crate::metrics::counters;

use super::decision::{RejectKind, Verdict};
use super::policy::{GuardPolicy, Tier, MAX_PERIOD_SECS};
use super::record::ClientRecord;
use super::store::{ClientStore, StoreError};

/// What kind of request is being judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// A generator call. Burst detection and the generator tier apply.
    Action,
    Health,
    /// Any other request that reaches the API.
    Other,
}

impl Scope {
    fn tier(self) -> Option<Tier> {
        match self {
            Scope::Action => Some(Tier::Generator),
            Scope::Health => Some(Tier::Health),
            Scope::Other => None,
        }
    }
}

/// Outcome of one guarded request.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub verdict: Verdict,
    /// `None` when resolution itself failed.
    pub identity: Option<Identity>,
}

#[derive(Clone)]
pub struct AbuseGuard {
    resolver: Arc<IdentityResolver>,
    store: Arc<dyn ClientStore>,
    policy: Arc<ArcSwap<GuardPolicy>>,
}

impl AbuseGuard {
    pub fn new(resolver: IdentityResolver, store: Arc<dyn ClientStore>, policy: GuardPolicy) -> Self {
        Self {
            resolver: Arc::new(resolver),
            store,
            policy: Arc::new(ArcSwap::from_pointee(policy)),
        }
    }

    pub fn policy(&self) -> Arc<GuardPolicy> {
        self.policy.load_full()
    }

    pub fn swap_policy(&self, policy: GuardPolicy) {
        self.policy.store(Arc::new(policy));
    }

    pub fn store(&self) -> &Arc<dyn ClientStore> {
        &self.store
    }

    pub fn evaluate(&self, req: &dyn RequestView) -> Evaluation {
        self.evaluate_scoped_at(req, Scope::Action, Instant::now())
    }

    pub fn evaluate_scoped(&self, req: &dyn RequestView, scope: Scope) -> Evaluation {
        self.evaluate_scoped_at(req, scope, Instant::now())
    }

    pub fn evaluate_at(&self, req: &dyn RequestView, now: Instant) -> Evaluation {
        self.evaluate_scoped_at(req, Scope::Action, now)
    }

    /// Never fails: internal faults are logged and the request is admitted.
    pub fn evaluate_scoped_at(&self, req: &dyn RequestView, scope: Scope, now: Instant) -> Evaluation {
        let identity = match self.resolver.resolve(req) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, strategy = self.resolver.strategy(), "identity resolution failed; admitting");
                counters::inc_guard_fault("identity");
                return Evaluation {
                    verdict: Verdict::Admit,
                    identity: None,
                };
            }
        };

        if identity.is_unknown() {
            tracing::warn!(peer = ?req.peer_addr(), "could not determine client identity; admitting");
            counters::inc_unresolved();
            return Evaluation {
                verdict: Verdict::Admit,
                identity: Some(identity),
            };
        }

        let verdict = match self.check(&identity.key, scope, now) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, identity = %identity.key, "client store failed; admitting");
                counters::inc_guard_fault("store");
                Verdict::Admit
            }
        };

        counters::inc_verdict(verdict.kind_str());
        if let Verdict::Reject { kind, retry_after_secs, .. } = &verdict {
            tracing::warn!(
                identity = %identity.key,
                source = %identity.source.as_str(),
                kind = kind.as_str(),
                ?scope,
                retry_after_secs,
                "request rejected"
            );
        }

        Evaluation {
            verdict,
            identity: Some(identity),
        }
    }

    /// Counts one request for `identity` and decides on it, atomically.
    pub fn check(&self, identity: &str, scope: Scope, now: Instant) -> Result<Verdict, StoreError> {
        let policy = self.policy.load_full();
        let mut verdict = Verdict::Admit;

        self.store.upsert(identity, now, &mut |rec| {
            verdict = decide(rec, scope, now, &policy);
        })?;

        Ok(verdict)
    }

    pub fn sweep(&self, now: Instant) -> usize {
        let ttl = self.policy.load().idle_ttl();
        self.store.sweep(now, ttl)
    }
}

/// Runs one request through the layers in order: a running block, the
/// general tier, the tracked rate and burst rules, then the scope's own tier.
/// A running block answers before anything is counted.
fn decide(rec: &mut ClientRecord, scope: Scope, now: Instant, p: &GuardPolicy) -> Verdict {
    if let Some(v) = running_block(rec, now) {
        return v;
    }
    if let Some(v) = throttle(rec, Tier::General, now, p) {
        return v;
    }

    match scope {
        Scope::Action => rec.track(now, p.window(), p.burst_window()),
        _ => rec.count(now, p.window()),
    }
    let verdict = judge(rec, scope, now, p);
    if !verdict.is_admit() {
        return verdict;
    }

    scope
        .tier()
        .and_then(|t| throttle(rec, t, now, p))
        .unwrap_or(verdict)
}

fn running_block(rec: &ClientRecord, now: Instant) -> Option<Verdict> {
    if let Some(until) = rec.blocked_until.filter(|u| now < *u) {
        return Some(Verdict::reject(RejectKind::Blocked, until - now));
    }
    rec.burst_blocked_until
        .filter(|u| now < *u)
        .map(|until| Verdict::reject(RejectKind::BurstBlocked, until - now))
}

fn throttle(rec: &mut ClientRecord, tier: Tier, now: Instant, p: &GuardPolicy) -> Option<Verdict> {
    let rule = p.tiers.rule(tier)?;
    let (hits, reset_in) = rec.hit_tier(tier, now, rule.window());
    (hits > rule.max_requests).then(|| Verdict::reject(RejectKind::Throttled(tier), reset_in))
}

/// `now + d` with `d` capped, since a swapped-in policy may be unvalidated.
fn deadline(now: Instant, d: Duration) -> Instant {
    let d = d.min(Duration::from_secs(MAX_PERIOD_SECS));
    now.checked_add(d).unwrap_or(now)
}

/// Applies the rate and burst rules to a freshly counted record with no
/// block running.
///
/// Order: expired blocks are cleared, then a new burst (actions only), then
/// the per-window rate with strike escalation.
fn judge(rec: &mut ClientRecord, scope: Scope, now: Instant, p: &GuardPolicy) -> Verdict {
    if rec.blocked_until.is_some_and(|u| now >= u) {
        rec.blocked_until = None;
        rec.suspicious_strikes = 0;
    }

    if rec.burst_blocked_until.is_some_and(|u| now >= u) {
        rec.burst_blocked_until = None;
        // history restarts with the current action
        rec.recent_burst.retain(|t| *t >= now);
    }

    if let (Scope::Action, Some(burst)) = (scope, &p.burst) {
        if rec.recent_burst.len() >= burst.max_actions {
            let until = deadline(now, Duration::from_secs(burst.block_secs));
            rec.burst_blocked_until = Some(until);
            tracing::info!(identity = %rec.identity, actions = rec.recent_burst.len(), "burst detected");
            return Verdict::reject(RejectKind::BurstBlocked, until - now);
        }
    }

    if rec.request_count > p.rate.max_requests {
        rec.suspicious_strikes += 1;
        tracing::warn!(
            identity = %rec.identity,
            requests = rec.request_count,
            strikes = rec.suspicious_strikes,
            "per-window limit exceeded"
        );

        if rec.suspicious_strikes >= p.rate.strikes_to_block {
            let until = deadline(now, Duration::from_secs(p.rate.block_secs));
            rec.blocked_until = Some(until);
            tracing::error!(identity = %rec.identity, block_secs = p.rate.block_secs, "blocking after repeated violations");
            return Verdict::reject(RejectKind::Blocked, until - now);
        }
        return Verdict::reject(RejectKind::RateLimited, Duration::from_secs(p.rate.retry_after_secs));
    }

    Verdict::Admit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::policy::{BurstRule, TierPolicy};
    use crate::guard::store::MemoryStore;
    use crate::identity::testing::FakeRequest;
    use crate::identity::{address, IdentityConfig};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn guard(policy: GuardPolicy) -> AbuseGuard {
        AbuseGuard::new(
            IdentityResolver::from_config(&IdentityConfig::default()),
            Arc::new(MemoryStore::new()),
            policy,
        )
    }

    /// Only the per-window rate rule, no burst detector or tier caps.
    fn rate_only() -> GuardPolicy {
        GuardPolicy {
            burst: None,
            tiers: TierPolicy::disabled(),
            ..GuardPolicy::default()
        }
    }

    fn client() -> FakeRequest {
        FakeRequest::from_peer("198.51.100.20:4000")
    }

    fn reject_kind(e: &Evaluation) -> Option<(RejectKind, u64)> {
        match &e.verdict {
            Verdict::Reject { kind, retry_after_secs, .. } => Some((*kind, *retry_after_secs)),
            Verdict::Admit => None,
        }
    }

    #[test]
    fn thirty_per_minute_then_rate_limited() {
        let g = guard(rate_only());
        let t0 = Instant::now();
        let req = client();

        for i in 0..30 {
            let e = g.evaluate_at(&req, t0 + secs(i));
            assert!(e.verdict.is_admit(), "action {} rejected", i + 1);
        }

        let e = g.evaluate_at(&req, t0 + secs(30));
        let (kind, retry) = reject_kind(&e).expect("31st must be rejected");
        assert_eq!(kind, RejectKind::RateLimited);
        assert!(retry > 0);

        let rec = g.store().get("198.51.100.20").unwrap().unwrap();
        assert_eq!(rec.suspicious_strikes, 1);
        assert!(rec.blocked_until.is_none());
    }

    #[test]
    fn second_strike_blocks_for_an_hour_across_windows() {
        let g = guard(rate_only());
        let t0 = Instant::now();
        let req = client();

        for i in 0..31 {
            g.evaluate_at(&req, t0 + secs(i));
        }

        // quiet for more than a window: the counter resets, the strike stays
        let t1 = t0 + secs(30 + 61);
        for i in 0..30 {
            assert!(g.evaluate_at(&req, t1 + secs(i)).verdict.is_admit());
        }
        let e = g.evaluate_at(&req, t1 + secs(30));
        assert_eq!(reject_kind(&e), Some((RejectKind::Blocked, 3600)));

        // still blocked later on, with the remaining time
        let e = g.evaluate_at(&req, t1 + secs(30 + 600));
        assert_eq!(reject_kind(&e), Some((RejectKind::Blocked, 3000)));
    }

    #[test]
    fn block_expiry_clears_strikes() {
        let g = guard(rate_only());
        let t0 = Instant::now();
        let req = client();
        for i in 0..32 {
            g.evaluate_at(&req, t0 + secs(i));
        }
        assert!(g.store().get("198.51.100.20").unwrap().unwrap().blocked_until.is_some());

        let after = t0 + secs(31 + 3600 + 1);
        assert!(g.evaluate_at(&req, after).verdict.is_admit());
        let rec = g.store().get("198.51.100.20").unwrap().unwrap();
        assert_eq!(rec.suspicious_strikes, 0);
        assert!(rec.blocked_until.is_none());
        assert_eq!(rec.request_count, 1);
    }

    #[test]
    fn retries_during_a_block_do_not_extend_it() {
        let g = guard(rate_only());
        let t0 = Instant::now();
        let req = client();
        for i in 0..32 {
            g.evaluate_at(&req, t0 + secs(i));
        }
        let blocked_at = t0 + secs(31);

        // a client retrying every 50s never leaves a quiet minute
        for k in 1..72 {
            let e = g.evaluate_at(&req, blocked_at + secs(50 * k));
            assert_eq!(reject_kind(&e), Some((RejectKind::Blocked, 3600 - 50 * k)));
        }
        let rec = g.store().get("198.51.100.20").unwrap().unwrap();
        assert_eq!(rec.request_count, 32);
        assert_eq!(rec.last_request_at, blocked_at);

        let expiry = blocked_at + secs(3600);
        assert!(g.evaluate_at(&req, expiry).verdict.is_admit());
        assert!(g.evaluate_at(&req, expiry + secs(40)).verdict.is_admit());
        let rec = g.store().get("198.51.100.20").unwrap().unwrap();
        assert_eq!(rec.request_count, 2);
        assert_eq!(rec.suspicious_strikes, 0);
    }

    #[test]
    fn huge_block_in_unchecked_policy_is_clamped() {
        let mut p = rate_only();
        p.rate.max_requests = 1;
        p.rate.strikes_to_block = 1;
        p.rate.block_secs = u64::MAX;
        let g = guard(p);
        let t0 = Instant::now();
        assert!(g.evaluate_at(&client(), t0).verdict.is_admit());
        let e = g.evaluate_at(&client(), t0 + secs(1));
        assert_eq!(reject_kind(&e), Some((RejectKind::Blocked, MAX_PERIOD_SECS)));

        let mut p = rate_only();
        p.burst = Some(BurstRule {
            block_secs: u64::MAX,
            ..BurstRule::default()
        });
        let g = guard(p);
        g.evaluate_at(&client(), t0);
        g.evaluate_at(&client(), t0);
        let e = g.evaluate_at(&client(), t0);
        assert_eq!(reject_kind(&e), Some((RejectKind::BurstBlocked, MAX_PERIOD_SECS)));
    }

    #[test]
    fn health_checks_are_throttled_per_minute() {
        let g = guard(GuardPolicy::default());
        let t0 = Instant::now();
        let req = client();
        for i in 0..5 {
            let e = g.evaluate_scoped_at(&req, Scope::Health, t0 + secs(i));
            assert!(e.verdict.is_admit(), "health check {} rejected", i + 1);
        }

        let e = g.evaluate_scoped_at(&req, Scope::Health, t0 + secs(5));
        assert_eq!(reject_kind(&e), Some((RejectKind::Throttled(Tier::Health), 55)));

        // the next window starts fresh
        let e = g.evaluate_scoped_at(&req, Scope::Health, t0 + secs(60));
        assert!(e.verdict.is_admit());
    }

    #[test]
    fn general_tier_covers_every_scope() {
        let mut p = rate_only();
        p.rate.max_requests = 1_000;
        p.tiers.general = TierPolicy::default().general;
        let g = guard(p);
        let t0 = Instant::now();
        let req = client();

        for i in 0..50 {
            assert!(g.evaluate_scoped_at(&req, Scope::Other, t0 + secs(i * 2)).verdict.is_admit());
        }
        let e = g.evaluate_scoped_at(&req, Scope::Other, t0 + secs(100));
        assert_eq!(reject_kind(&e), Some((RejectKind::Throttled(Tier::General), 800)));
        let e = g.evaluate_scoped_at(&req, Scope::Action, t0 + secs(101));
        assert_eq!(reject_kind(&e), Some((RejectKind::Throttled(Tier::General), 799)));

        assert!(g.evaluate_scoped_at(&req, Scope::Action, t0 + secs(900)).verdict.is_admit());
    }

    #[test]
    fn generator_tier_caps_actions_only() {
        let mut p = rate_only();
        p.rate.max_requests = 1_000;
        p.tiers.generator = TierPolicy::default().generator;
        let g = guard(p);
        let t0 = Instant::now();
        let req = client();

        for i in 0..25 {
            assert!(g.evaluate_at(&req, t0 + secs(i * 10)).verdict.is_admit());
        }
        let e = g.evaluate_at(&req, t0 + secs(250));
        assert_eq!(reject_kind(&e), Some((RejectKind::Throttled(Tier::Generator), 650)));

        assert!(g.evaluate_scoped_at(&req, Scope::Health, t0 + secs(251)).verdict.is_admit());
        assert!(g.evaluate_scoped_at(&req, Scope::Other, t0 + secs(252)).verdict.is_admit());
    }

    #[test]
    fn non_actions_count_toward_rate_but_not_burst() {
        let mut p = GuardPolicy::default();
        p.tiers = TierPolicy::disabled();
        let g = guard(p);
        let t0 = Instant::now();
        let req = client();

        for _ in 0..10 {
            assert!(g.evaluate_scoped_at(&req, Scope::Other, t0).verdict.is_admit());
        }
        assert!(g.evaluate_at(&req, t0).verdict.is_admit());
        let rec = g.store().get("198.51.100.20").unwrap().unwrap();
        assert_eq!(rec.request_count, 11);
        assert_eq!(rec.recent_burst.len(), 1);

        for _ in 0..19 {
            g.evaluate_scoped_at(&req, Scope::Other, t0 + secs(1));
        }
        let e = g.evaluate_scoped_at(&req, Scope::Other, t0 + secs(1));
        assert_eq!(reject_kind(&e).map(|(k, _)| k), Some(RejectKind::RateLimited));
    }

    #[test]
    fn three_quick_actions_trigger_burst_block() {
        let g = guard(GuardPolicy::default());
        let t0 = Instant::now();
        let req = client();

        assert!(g.evaluate_at(&req, t0).verdict.is_admit());
        assert!(g.evaluate_at(&req, t0 + secs(1)).verdict.is_admit());
        let e = g.evaluate_at(&req, t0 + secs(2));
        assert_eq!(reject_kind(&e), Some((RejectKind::BurstBlocked, 30)));

        // inside the burst block
        let e = g.evaluate_at(&req, t0 + secs(12));
        assert_eq!(reject_kind(&e), Some((RejectKind::BurstBlocked, 20)));

        // after it expires the next action goes through
        let e = g.evaluate_at(&req, t0 + secs(33));
        assert!(e.verdict.is_admit());
        let rec = g.store().get("198.51.100.20").unwrap().unwrap();
        assert!(rec.burst_blocked_until.is_none());
        assert_eq!(rec.recent_burst.len(), 1);
    }

    #[test]
    fn spaced_actions_never_burst() {
        let g = guard(GuardPolicy::default());
        let t0 = Instant::now();
        let req = client();
        for i in 0..10 {
            assert!(g.evaluate_at(&req, t0 + secs(i * 3)).verdict.is_admit());
        }
    }

    #[test]
    fn identities_are_tracked_separately() {
        let g = guard(GuardPolicy::default());
        let t0 = Instant::now();
        let a = client();
        let b = FakeRequest::from_peer("198.51.100.21:4000");
        g.evaluate_at(&a, t0);
        g.evaluate_at(&a, t0);
        assert!(!g.evaluate_at(&a, t0).verdict.is_admit());
        assert!(g.evaluate_at(&b, t0).verdict.is_admit());
    }

    #[test]
    fn unknown_identity_is_admitted_and_untracked() {
        let g = AbuseGuard::new(
            IdentityResolver::Address(address::AddressResolver::new(vec![])),
            Arc::new(MemoryStore::new()),
            GuardPolicy::default(),
        );
        let t0 = Instant::now();
        for _ in 0..100 {
            let e = g.evaluate_at(&client(), t0);
            assert!(e.verdict.is_admit());
            assert!(e.identity.as_ref().unwrap().is_unknown());
        }
        assert!(g.store().is_empty());
    }

    struct BrokenStore;

    impl ClientStore for BrokenStore {
        fn get(&self, _: &str) -> Result<Option<ClientRecord>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        fn upsert(
            &self,
            _: &str,
            _: Instant,
            _: &mut dyn FnMut(&mut ClientRecord),
        ) -> Result<ClientRecord, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        fn sweep(&self, _: Instant, _: Duration) -> usize {
            0
        }

        fn len(&self) -> usize {
            0
        }
    }

    #[test]
    fn store_failure_fails_open() {
        let g = AbuseGuard::new(
            IdentityResolver::from_config(&IdentityConfig::default()),
            Arc::new(BrokenStore),
            GuardPolicy::default(),
        );
        let t0 = Instant::now();
        for _ in 0..50 {
            assert!(g.evaluate_at(&client(), t0).verdict.is_admit());
        }
    }

    #[test]
    fn swapped_policy_applies_to_next_request() {
        let g = guard(rate_only());
        let t0 = Instant::now();
        let req = client();
        g.evaluate_at(&req, t0);

        let mut tight = rate_only();
        tight.rate.max_requests = 1;
        g.swap_policy(tight);

        let e = g.evaluate_at(&req, t0 + secs(1));
        assert_eq!(reject_kind(&e).map(|(k, _)| k), Some(RejectKind::RateLimited));
    }

    #[test]
    fn evaluate_tracks_an_action_now() {
        let g = guard(GuardPolicy::default());
        assert!(g.evaluate(&client()).verdict.is_admit());
        let rec = g.store().get("198.51.100.20").unwrap().unwrap();
        assert_eq!(rec.request_count, 1);
        assert_eq!(rec.recent_burst.len(), 1);
        assert_eq!(rec.tiers.len(), 2);
    }

    #[test]
    fn sweep_uses_policy_ttl() {
        let g = guard(GuardPolicy::default());
        let t0 = Instant::now();
        g.evaluate_at(&client(), t0);
        assert_eq!(g.sweep(t0 + secs(60)), 0);
        assert_eq!(g.sweep(t0 + secs(3601)), 1);
        assert!(g.store().is_empty());
    }
}
