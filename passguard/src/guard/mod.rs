//! Abuse detection in front of the API.
//!
//! Each request is tracked against the caller's identity and then judged by
//! a layered policy: coarse fixed-window tier caps, a short burst detector for
//! generator actions, a per-window limit, and a long block after repeated
//! violations. A running block is answered before anything is counted.
//! Faults inside the guard never turn into rejections.

pub mod decision;
pub mod engine;
pub mod policy;
pub mod record;
pub mod store;
pub mod sweep;
pub mod update;

pub use decision::{RejectKind, Verdict};
pub use engine::{AbuseGuard, Evaluation, Scope};
pub use policy::{BurstRule, GuardPolicy, RateRule, Tier, TierPolicy, TierRule};
pub use record::ClientRecord;
pub use store::{ClientStore, MemoryStore, StoreError};
