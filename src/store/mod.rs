//! Ledger storage backends.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::types::{
    BanRecord, ChannelId, Community, CommunityId, CommunityStats, NewReport, Report,
    ReportCategory, ReportFilter, ReportId, ResourceId, StaffMember, TierEntry, UserCounter,
    UserId,
};

/// Outcome of an attempted report insert.
///
/// The ban gate runs inside the same transaction as the insert, so a
/// banned user is reported as a value rather than a backend error:
/// nothing was mutated, the transaction simply declined the write.
#[derive(Debug, Clone)]
pub enum ReportInsert {
    /// The report was inserted and the matching counter incremented.
    Inserted(Report),
    /// The user is banned; no row was written, no counter touched.
    Banned(BanRecord),
}

/// Outcome of a conflict-key tier upsert.
#[derive(Debug, Clone)]
pub enum TierUpsert {
    /// No entry existed; this call created the row.
    Created(TierEntry),
    /// An entry already existed; the stored row is returned unchanged
    /// and the caller's resource id was discarded.
    Existing(TierEntry),
}

impl TierUpsert {
    /// The catalog entry, whichever way the upsert resolved.
    pub fn into_entry(self) -> TierEntry {
        match self {
            Self::Created(e) | Self::Existing(e) => e,
        }
    }

    /// True when this call created the row.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Trait for ledger storage backends.
///
/// Every method is one atomic unit of work: multi-step operations
/// (`insert_report`, `delete_report`) either commit all their effects or
/// none. Implementations must order listed results deterministically.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    // ── communities ────────────────────────────────────────────────

    /// Fetch the community row, creating it if absent.
    async fn ensure_community(&self, community: &CommunityId) -> Result<Community, Self::Error>;

    /// Fetch the community row if it exists.
    async fn community(&self, community: &CommunityId) -> Result<Option<Community>, Self::Error>;

    /// Set or clear the audit log channel, creating the row if absent.
    async fn set_log_channel(
        &self,
        community: &CommunityId,
        channel: Option<ChannelId>,
    ) -> Result<Community, Self::Error>;

    /// Set or clear the vouch lookup channel, creating the row if absent.
    async fn set_vouch_channel(
        &self,
        community: &CommunityId,
        channel: Option<ChannelId>,
    ) -> Result<Community, Self::Error>;

    // ── counters & reports ─────────────────────────────────────────

    /// Fetch the counter row, zero-valued when absent.
    async fn counter(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<UserCounter, Self::Error>;

    /// Insert a report atomically: ban check, lazy community/counter row
    /// creation, report insert, counter increment. All or nothing.
    async fn insert_report(&self, new: NewReport) -> Result<ReportInsert, Self::Error>;

    /// Delete the report matching all four keys and decrement the
    /// matching counter (floored at zero), atomically. Returns `false`
    /// without touching the counter when no row matched.
    async fn delete_report(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: ReportCategory,
        id: ReportId,
    ) -> Result<bool, Self::Error>;

    /// Most recent report for the key, ties broken by highest id.
    async fn latest_report(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: ReportCategory,
    ) -> Result<Option<Report>, Self::Error>;

    /// All reports about a user, optionally filtered by category,
    /// newest first.
    async fn reports_for_user(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: Option<ReportCategory>,
    ) -> Result<Vec<Report>, Self::Error>;

    /// Filtered report search within a community, newest first.
    async fn search_reports(
        &self,
        community: &CommunityId,
        filter: &ReportFilter,
    ) -> Result<Vec<Report>, Self::Error>;

    /// Zero one or both counter fields, creating rows if absent.
    async fn reset_counts(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: Option<ReportCategory>,
    ) -> Result<UserCounter, Self::Error>;

    // ── tier catalog ───────────────────────────────────────────────

    /// Fetch a tier entry by key.
    async fn tier(
        &self,
        community: &CommunityId,
        category: ReportCategory,
        threshold: u32,
    ) -> Result<Option<TierEntry>, Self::Error>;

    /// Insert a tier entry, resolving key conflicts to the existing row.
    async fn upsert_tier(
        &self,
        community: &CommunityId,
        category: ReportCategory,
        threshold: u32,
        resource: ResourceId,
    ) -> Result<TierUpsert, Self::Error>;

    /// Tier entries for a category, ascending by threshold.
    async fn tiers_for_category(
        &self,
        community: &CommunityId,
        category: ReportCategory,
    ) -> Result<Vec<TierEntry>, Self::Error>;

    /// Delete every tier entry of the community, returning the removed
    /// rows.
    async fn delete_tiers(&self, community: &CommunityId) -> Result<Vec<TierEntry>, Self::Error>;

    // ── bans ───────────────────────────────────────────────────────

    /// Record (or refresh) a ban.
    async fn ban_user(
        &self,
        community: &CommunityId,
        user: &UserId,
        reason: Option<String>,
        banned_by: &UserId,
    ) -> Result<BanRecord, Self::Error>;

    /// Lift a ban. Returns `false` when no ban existed.
    async fn unban_user(&self, community: &CommunityId, user: &UserId)
        -> Result<bool, Self::Error>;

    /// Fetch a ban record if present.
    async fn ban_record(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<Option<BanRecord>, Self::Error>;

    /// All bans in the community, most recent first.
    async fn banned_users(&self, community: &CommunityId) -> Result<Vec<BanRecord>, Self::Error>;

    // ── staff ──────────────────────────────────────────────────────

    /// Add (or refresh) a staff roster entry.
    async fn add_staff(
        &self,
        community: &CommunityId,
        user: &UserId,
        added_by: &UserId,
    ) -> Result<StaffMember, Self::Error>;

    /// Remove a staff roster entry. Returns `false` when absent.
    async fn remove_staff(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<bool, Self::Error>;

    /// Fetch a staff roster entry if present.
    async fn staff_member(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<Option<StaffMember>, Self::Error>;

    /// All staff in the community, oldest first.
    async fn staff_members(
        &self,
        community: &CommunityId,
    ) -> Result<Vec<StaffMember>, Self::Error>;

    // ── statistics ─────────────────────────────────────────────────

    /// Aggregate counts for the community.
    async fn statistics(&self, community: &CommunityId) -> Result<CommunityStats, Self::Error>;
}

pub use memory::InMemoryLedgerStore;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresLedgerStore};
