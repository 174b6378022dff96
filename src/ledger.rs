//! Report ledger: the business rules in front of a [`LedgerStore`].
//!
//! The ledger validates input before any mutation, maps the store's
//! transactional outcomes onto the public error taxonomy, and exposes the
//! ban/staff/statistics surfaces callers build commands on. Counter
//! integrity itself lives in the store: every multi-step mutation is one
//! atomic unit of work there.

use std::sync::Arc;

use crate::error::LedgerError;
use crate::store::{LedgerStore, ReportInsert};
use crate::types::{
    BanRecord, ChannelId, Community, CommunityId, CommunityStats, NewReport, Report,
    ReportCategory, ReportFilter, ReportId, StaffMember, UserCounter, UserId,
};
use crate::MAX_REASON_LEN;

/// Business facade over a ledger store.
pub struct ReportLedger<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> ReportLedger<S> {
    /// Create a ledger over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// File a report.
    ///
    /// Rejects oversized reasons before any mutation; a banned target
    /// user fails with [`LedgerError::BannedUser`] and zero storage
    /// effects. On success the report row and the matching counter
    /// increment have committed together.
    pub async fn add_report(&self, new: NewReport) -> Result<Report, LedgerError> {
        if let Some(reason) = &new.reason {
            if reason.chars().count() > MAX_REASON_LEN {
                return Err(LedgerError::Validation(format!(
                    "reason must be {} characters or less",
                    MAX_REASON_LEN
                )));
            }
        }

        match self
            .store
            .insert_report(new)
            .await
            .map_err(LedgerError::from_store)?
        {
            ReportInsert::Inserted(report) => {
                tracing::debug!(
                    community = %report.community,
                    user = %report.user,
                    category = %report.category,
                    report_id = %report.id,
                    "report added"
                );
                Ok(report)
            }
            ReportInsert::Banned(ban) => Err(LedgerError::BannedUser {
                community: ban.community,
                user: ban.user,
            }),
        }
    }

    /// Remove a report by id.
    ///
    /// The row must match all four keys; otherwise the operation is a
    /// no-op reported as [`LedgerError::NotFound`] and the counter is
    /// untouched.
    pub async fn remove_report(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: ReportCategory,
        id: ReportId,
    ) -> Result<(), LedgerError> {
        let deleted = self
            .store
            .delete_report(community, user, category, id)
            .await
            .map_err(LedgerError::from_store)?;
        if !deleted {
            return Err(LedgerError::NotFound(format!(
                "no {} report {} for user {} in community {}",
                category, id, user, community
            )));
        }
        tracing::debug!(%community, %user, %category, report_id = %id, "report removed");
        Ok(())
    }

    /// Most recent report of a category for a user.
    pub async fn latest_report(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: ReportCategory,
    ) -> Result<Report, LedgerError> {
        self.store
            .latest_report(community, user, category)
            .await
            .map_err(LedgerError::from_store)?
            .ok_or_else(|| {
                LedgerError::NotFound(format!(
                    "no {} report for user {} in community {}",
                    category, user, community
                ))
            })
    }

    /// Remove the most recent report of a category, returning the removed
    /// report. This is the undo flow behind "remove last scam/vouch".
    pub async fn undo_latest(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: ReportCategory,
    ) -> Result<Report, LedgerError> {
        let latest = self.latest_report(community, user, category).await?;
        self.remove_report(community, user, category, latest.id)
            .await?;
        Ok(latest)
    }

    /// All reports about a user, optionally filtered by category, newest
    /// first.
    pub async fn user_reports(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: Option<ReportCategory>,
    ) -> Result<Vec<Report>, LedgerError> {
        self.store
            .reports_for_user(community, user, category)
            .await
            .map_err(LedgerError::from_store)
    }

    /// Filtered report search within a community.
    pub async fn search_reports(
        &self,
        community: &CommunityId,
        filter: &ReportFilter,
    ) -> Result<Vec<Report>, LedgerError> {
        self.store
            .search_reports(community, filter)
            .await
            .map_err(LedgerError::from_store)
    }

    /// Current counters for a user (zero-valued when no row exists).
    pub async fn counts(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<UserCounter, LedgerError> {
        self.store
            .counter(community, user)
            .await
            .map_err(LedgerError::from_store)
    }

    /// Zero one or both counters for a user.
    ///
    /// The report log is left intact; this is a staff override, not a
    /// bulk report deletion.
    pub async fn reset_counts(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: Option<ReportCategory>,
    ) -> Result<UserCounter, LedgerError> {
        let counter = self
            .store
            .reset_counts(community, user, category)
            .await
            .map_err(LedgerError::from_store)?;
        tracing::info!(%community, %user, ?category, "counters reset");
        Ok(counter)
    }

    // ── bans ───────────────────────────────────────────────────────

    /// Ban a user from the reputation system in this community.
    pub async fn ban_user(
        &self,
        community: &CommunityId,
        user: &UserId,
        reason: Option<String>,
        banned_by: &UserId,
    ) -> Result<BanRecord, LedgerError> {
        let record = self
            .store
            .ban_user(community, user, reason, banned_by)
            .await
            .map_err(LedgerError::from_store)?;
        tracing::info!(%community, %user, banned_by = %record.banned_by, "user banned");
        Ok(record)
    }

    /// Lift a ban. `NotFound` when the user was not banned.
    pub async fn unban_user(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<(), LedgerError> {
        let removed = self
            .store
            .unban_user(community, user)
            .await
            .map_err(LedgerError::from_store)?;
        if !removed {
            return Err(LedgerError::NotFound(format!(
                "user {} is not banned in community {}",
                user, community
            )));
        }
        tracing::info!(%community, %user, "user unbanned");
        Ok(())
    }

    /// Fetch a ban record if present.
    pub async fn ban_record(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<Option<BanRecord>, LedgerError> {
        self.store
            .ban_record(community, user)
            .await
            .map_err(LedgerError::from_store)
    }

    /// All bans in the community, most recent first.
    pub async fn banned_users(
        &self,
        community: &CommunityId,
    ) -> Result<Vec<BanRecord>, LedgerError> {
        self.store
            .banned_users(community)
            .await
            .map_err(LedgerError::from_store)
    }

    // ── staff roster ───────────────────────────────────────────────

    /// Add a staff member.
    pub async fn add_staff(
        &self,
        community: &CommunityId,
        user: &UserId,
        added_by: &UserId,
    ) -> Result<StaffMember, LedgerError> {
        self.store
            .add_staff(community, user, added_by)
            .await
            .map_err(LedgerError::from_store)
    }

    /// Remove a staff member. `NotFound` when absent.
    pub async fn remove_staff(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<(), LedgerError> {
        let removed = self
            .store
            .remove_staff(community, user)
            .await
            .map_err(LedgerError::from_store)?;
        if !removed {
            return Err(LedgerError::NotFound(format!(
                "user {} is not staff in community {}",
                user, community
            )));
        }
        Ok(())
    }

    /// Fetch a staff roster entry if present.
    pub async fn staff_member(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<Option<StaffMember>, LedgerError> {
        self.store
            .staff_member(community, user)
            .await
            .map_err(LedgerError::from_store)
    }

    /// All staff in the community, oldest first.
    pub async fn staff_members(
        &self,
        community: &CommunityId,
    ) -> Result<Vec<StaffMember>, LedgerError> {
        self.store
            .staff_members(community)
            .await
            .map_err(LedgerError::from_store)
    }

    // ── community config & statistics ──────────────────────────────

    /// Fetch a community row, creating it if absent.
    pub async fn ensure_community(
        &self,
        community: &CommunityId,
    ) -> Result<Community, LedgerError> {
        self.store
            .ensure_community(community)
            .await
            .map_err(LedgerError::from_store)
    }

    /// Set or clear the audit log channel.
    pub async fn set_log_channel(
        &self,
        community: &CommunityId,
        channel: Option<ChannelId>,
    ) -> Result<Community, LedgerError> {
        self.store
            .set_log_channel(community, channel)
            .await
            .map_err(LedgerError::from_store)
    }

    /// Set or clear the vouch lookup channel.
    pub async fn set_vouch_channel(
        &self,
        community: &CommunityId,
        channel: Option<ChannelId>,
    ) -> Result<Community, LedgerError> {
        self.store
            .set_vouch_channel(community, channel)
            .await
            .map_err(LedgerError::from_store)
    }

    /// Aggregate counts for the community.
    pub async fn statistics(
        &self,
        community: &CommunityId,
    ) -> Result<CommunityStats, LedgerError> {
        self.store
            .statistics(community)
            .await
            .map_err(LedgerError::from_store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::InMemoryLedgerStore;

    fn ledger() -> ReportLedger<InMemoryLedgerStore> {
        ReportLedger::new(Arc::new(InMemoryLedgerStore::new()))
    }

    fn new_report(user: &str, category: ReportCategory, reason: Option<&str>) -> NewReport {
        NewReport {
            community: CommunityId::from("g1"),
            user: UserId::from(user),
            category,
            reason: reason.map(str::to_string),
            reported_by: UserId::from("staff"),
        }
    }

    #[tokio::test]
    async fn test_oversized_reason_rejected_before_mutation() {
        let ledger = ledger();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        let long = "x".repeat(MAX_REASON_LEN + 1);
        let err = ledger
            .add_report(new_report("u1", ReportCategory::Scam, Some(&long)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let counter = ledger.counts(&community, &user).await.unwrap();
        assert!(counter.is_zero());
    }

    #[tokio::test]
    async fn test_reason_at_limit_accepted() {
        let ledger = ledger();
        let exact = "x".repeat(MAX_REASON_LEN);
        ledger
            .add_report(new_report("u1", ReportCategory::Scam, Some(&exact)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_banned_user_cannot_be_reported_until_unbanned() {
        let ledger = ledger();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");
        let staff = UserId::from("mod");

        ledger
            .ban_user(&community, &user, Some("fraud ring".into()), &staff)
            .await
            .unwrap();

        let err = ledger
            .add_report(new_report("u1", ReportCategory::Scam, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BannedUser);
        assert!(ledger.counts(&community, &user).await.unwrap().is_zero());

        ledger.unban_user(&community, &user).await.unwrap();
        ledger
            .add_report(new_report("u1", ReportCategory::Scam, None))
            .await
            .unwrap();
        assert_eq!(
            ledger.counts(&community, &user).await.unwrap().scam_count,
            1
        );
    }

    #[tokio::test]
    async fn test_undo_latest_removes_newest_report() {
        let ledger = ledger();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        let first = ledger
            .add_report(new_report("u1", ReportCategory::Vouch, Some("older")))
            .await
            .unwrap();
        let second = ledger
            .add_report(new_report("u1", ReportCategory::Vouch, Some("newer")))
            .await
            .unwrap();

        let undone = ledger
            .undo_latest(&community, &user, ReportCategory::Vouch)
            .await
            .unwrap();
        assert_eq!(undone.id, second.id);

        let remaining = ledger
            .user_reports(&community, &user, Some(ReportCategory::Vouch))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, first.id);
        assert_eq!(
            ledger.counts(&community, &user).await.unwrap().vouch_count,
            1
        );
    }

    #[tokio::test]
    async fn test_remove_with_bogus_id_is_noop() {
        let ledger = ledger();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        ledger
            .add_report(new_report("u1", ReportCategory::Scam, None))
            .await
            .unwrap();

        let err = ledger
            .remove_report(&community, &user, ReportCategory::Scam, ReportId::new(9999))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            ledger.counts(&community, &user).await.unwrap().scam_count,
            1
        );
    }

    #[tokio::test]
    async fn test_reset_counts_leaves_reports() {
        let ledger = ledger();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        for _ in 0..2 {
            ledger
                .add_report(new_report("u1", ReportCategory::Scam, None))
                .await
                .unwrap();
        }
        ledger
            .add_report(new_report("u1", ReportCategory::Vouch, None))
            .await
            .unwrap();

        let counter = ledger
            .reset_counts(&community, &user, Some(ReportCategory::Scam))
            .await
            .unwrap();
        assert_eq!(counter.scam_count, 0);
        assert_eq!(counter.vouch_count, 1);

        // Log is untouched: three reports still exist.
        let all = ledger.user_reports(&community, &user, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_staff_roster() {
        let ledger = ledger();
        let community = CommunityId::from("g1");
        let admin = UserId::from("admin");

        ledger
            .add_staff(&community, &UserId::from("m1"), &admin)
            .await
            .unwrap();
        ledger
            .add_staff(&community, &UserId::from("m2"), &admin)
            .await
            .unwrap();

        assert_eq!(ledger.staff_members(&community).await.unwrap().len(), 2);

        ledger
            .remove_staff(&community, &UserId::from("m1"))
            .await
            .unwrap();
        let err = ledger
            .remove_staff(&community, &UserId::from("m1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_channel_config() {
        let ledger = ledger();
        let community = CommunityId::from("g1");

        let row = ledger
            .set_log_channel(&community, Some(ChannelId::from("c1")))
            .await
            .unwrap();
        assert_eq!(row.log_channel, Some(ChannelId::from("c1")));

        let row = ledger.set_log_channel(&community, None).await.unwrap();
        assert_eq!(row.log_channel, None);
    }
}
