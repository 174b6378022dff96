//! # reputation-ledger
//!
//! Transactional reputation counters with tiered role synchronization.
//!
//! The engine answers two questions:
//!
//! > How many live scam/vouch reports does a user have, and which single
//! > external "tier" role should they hold for that count?
//!
//! ## Core Contract
//!
//! 1. Report adds/removes and their counter updates commit atomically
//! 2. A counter always equals the number of live reports for its key
//! 3. A user holds at most one tier per category, converged idempotently
//!
//! ## Architecture
//!
//! ```text
//! Report event → ReportLedger → LedgerStore (one transaction)
//!                                    ↓ new counter value
//!               TierReconciler → TierCatalog → DirectoryAdapter
//!                                  (create-on-demand)   (external roles)
//! ```
//!
//! ## Consistency Guarantees
//!
//! - Ban gate, lazy row creation, report insert and counter increment
//!   are one atomic unit; a banned user leaves zero trace
//! - Counter decrements floor at zero even under drift
//! - Concurrent tier creation converges on one external resource per
//!   (community, category, threshold) key
//! - Reconciliation passes are stateless and idempotent; callers
//!   serialize passes per (community, user, category)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod reconciler;
pub mod store;
pub mod types;

// Re-exports
pub use catalog::{TierCatalog, TierPurgeOutcome, TierRangeOutcome};
pub use directory::{DirectoryAdapter, DirectoryError, InMemoryDirectory};
pub use error::{ErrorKind, LedgerError};
pub use ledger::ReportLedger;
pub use reconciler::{ReconcileError, ReconcileOutcome, TierReconciler};
pub use store::{InMemoryLedgerStore, LedgerStore, ReportInsert, TierUpsert};
#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresLedgerStore};
pub use types::{
    BanRecord, ChannelId, Community, CommunityId, CommunityStats, NewReport, Report,
    ReportCategory, ReportFilter, ReportId, ResourceId, StaffMember, TierEntry, UserCounter,
    UserId,
};

/// Schema version for all ledger types.
/// Increment on breaking changes to any persisted shape.
pub const LEDGER_SCHEMA_VERSION: &str = "1.0.0";

/// Maximum length of a report reason, in characters.
pub const MAX_REASON_LEN: usize = 1024;

/// Maximum threshold accepted by bulk tier range creation.
pub const MAX_TIER_RANGE: u32 = 100;
