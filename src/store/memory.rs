//! In-memory ledger store for testing and local development.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{LedgerStore, ReportInsert, TierUpsert};
use crate::types::{
    BanRecord, ChannelId, Community, CommunityId, CommunityStats, NewReport, Report,
    ReportCategory, ReportFilter, ReportId, ResourceId, StaffMember, TierEntry, UserCounter,
    UserId,
};

/// Error type for the in-memory store.
///
/// In-memory operations are infallible; the enum is uninhabited and only
/// exists to satisfy the trait's associated error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {}

#[derive(Debug, Default)]
struct Inner {
    communities: BTreeMap<CommunityId, Community>,
    counters: BTreeMap<(CommunityId, UserId), UserCounter>,
    reports: BTreeMap<ReportId, Report>,
    tiers: BTreeMap<(CommunityId, ReportCategory, u32), TierEntry>,
    bans: BTreeMap<(CommunityId, UserId), BanRecord>,
    staff: BTreeMap<(CommunityId, UserId), StaffMember>,
    next_report_id: i64,
}

impl Inner {
    fn ensure_community(&mut self, community: &CommunityId) -> Community {
        self.communities
            .entry(community.clone())
            .or_insert_with(|| Community {
                id: community.clone(),
                log_channel: None,
                vouch_channel: None,
                created_at: Utc::now(),
            })
            .clone()
    }

    fn ensure_counter(&mut self, community: &CommunityId, user: &UserId) -> &mut UserCounter {
        self.counters
            .entry((community.clone(), user.clone()))
            .or_insert_with(|| UserCounter::zero(community.clone(), user.clone()))
    }
}

/// In-memory ledger store.
///
/// Uses BTreeMap for deterministic iteration order; every trait method
/// runs under one lock acquisition, which is what makes each call atomic.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: Mutex<Inner>,
}

impl InMemoryLedgerStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live reports across all communities.
    pub fn num_reports(&self) -> usize {
        self.inner.lock().reports.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Error = InMemoryError;

    async fn ensure_community(&self, community: &CommunityId) -> Result<Community, Self::Error> {
        Ok(self.inner.lock().ensure_community(community))
    }

    async fn community(&self, community: &CommunityId) -> Result<Option<Community>, Self::Error> {
        Ok(self.inner.lock().communities.get(community).cloned())
    }

    async fn set_log_channel(
        &self,
        community: &CommunityId,
        channel: Option<ChannelId>,
    ) -> Result<Community, Self::Error> {
        let mut inner = self.inner.lock();
        let row = inner
            .communities
            .entry(community.clone())
            .or_insert_with(|| Community {
                id: community.clone(),
                log_channel: None,
                vouch_channel: None,
                created_at: Utc::now(),
            });
        row.log_channel = channel;
        Ok(row.clone())
    }

    async fn set_vouch_channel(
        &self,
        community: &CommunityId,
        channel: Option<ChannelId>,
    ) -> Result<Community, Self::Error> {
        let mut inner = self.inner.lock();
        let row = inner
            .communities
            .entry(community.clone())
            .or_insert_with(|| Community {
                id: community.clone(),
                log_channel: None,
                vouch_channel: None,
                created_at: Utc::now(),
            });
        row.vouch_channel = channel;
        Ok(row.clone())
    }

    async fn counter(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<UserCounter, Self::Error> {
        Ok(self
            .inner
            .lock()
            .counters
            .get(&(community.clone(), user.clone()))
            .cloned()
            .unwrap_or_else(|| UserCounter::zero(community.clone(), user.clone())))
    }

    async fn insert_report(&self, new: NewReport) -> Result<ReportInsert, Self::Error> {
        let mut inner = self.inner.lock();

        // Ban gate first: a declined write leaves no trace.
        if let Some(ban) = inner.bans.get(&(new.community.clone(), new.user.clone())) {
            return Ok(ReportInsert::Banned(ban.clone()));
        }

        inner.ensure_community(&new.community);
        inner.ensure_counter(&new.community, &new.user);

        inner.next_report_id += 1;
        let report = Report {
            id: ReportId::new(inner.next_report_id),
            community: new.community.clone(),
            user: new.user.clone(),
            category: new.category,
            reason: new.reason,
            reported_by: new.reported_by,
            created_at: Utc::now(),
        };
        inner.reports.insert(report.id, report.clone());

        let counter = inner.ensure_counter(&new.community, &new.user);
        match new.category {
            ReportCategory::Scam => counter.scam_count += 1,
            ReportCategory::Vouch => counter.vouch_count += 1,
        }

        Ok(ReportInsert::Inserted(report))
    }

    async fn delete_report(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: ReportCategory,
        id: ReportId,
    ) -> Result<bool, Self::Error> {
        let mut inner = self.inner.lock();

        let matched = inner
            .reports
            .get(&id)
            .map(|r| r.community == *community && r.user == *user && r.category == category)
            .unwrap_or(false);
        if !matched {
            return Ok(false);
        }

        inner.reports.remove(&id);
        let counter = inner.ensure_counter(community, user);
        match category {
            ReportCategory::Scam => counter.scam_count = counter.scam_count.saturating_sub(1),
            ReportCategory::Vouch => counter.vouch_count = counter.vouch_count.saturating_sub(1),
        }
        Ok(true)
    }

    async fn latest_report(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: ReportCategory,
    ) -> Result<Option<Report>, Self::Error> {
        Ok(self
            .inner
            .lock()
            .reports
            .values()
            .filter(|r| r.community == *community && r.user == *user && r.category == category)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn reports_for_user(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: Option<ReportCategory>,
    ) -> Result<Vec<Report>, Self::Error> {
        let inner = self.inner.lock();
        let mut rows: Vec<Report> = inner
            .reports
            .values()
            .filter(|r| {
                r.community == *community
                    && r.user == *user
                    && category.map(|c| r.category == c).unwrap_or(true)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn search_reports(
        &self,
        community: &CommunityId,
        filter: &ReportFilter,
    ) -> Result<Vec<Report>, Self::Error> {
        let inner = self.inner.lock();
        let mut rows: Vec<Report> = inner
            .reports
            .values()
            .filter(|r| {
                r.community == *community
                    && filter.user.as_ref().map(|u| r.user == *u).unwrap_or(true)
                    && filter.category.map(|c| r.category == c).unwrap_or(true)
                    && filter
                        .reported_by
                        .as_ref()
                        .map(|u| r.reported_by == *u)
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(filter.limit);
        Ok(rows)
    }

    async fn reset_counts(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: Option<ReportCategory>,
    ) -> Result<UserCounter, Self::Error> {
        let mut inner = self.inner.lock();
        inner.ensure_community(community);
        let counter = inner.ensure_counter(community, user);
        match category {
            Some(ReportCategory::Scam) => counter.scam_count = 0,
            Some(ReportCategory::Vouch) => counter.vouch_count = 0,
            None => {
                counter.scam_count = 0;
                counter.vouch_count = 0;
            }
        }
        Ok(counter.clone())
    }

    async fn tier(
        &self,
        community: &CommunityId,
        category: ReportCategory,
        threshold: u32,
    ) -> Result<Option<TierEntry>, Self::Error> {
        Ok(self
            .inner
            .lock()
            .tiers
            .get(&(community.clone(), category, threshold))
            .cloned())
    }

    async fn upsert_tier(
        &self,
        community: &CommunityId,
        category: ReportCategory,
        threshold: u32,
        resource: ResourceId,
    ) -> Result<TierUpsert, Self::Error> {
        let mut inner = self.inner.lock();
        inner.ensure_community(community);
        let key = (community.clone(), category, threshold);
        if let Some(existing) = inner.tiers.get(&key) {
            return Ok(TierUpsert::Existing(existing.clone()));
        }
        let entry = TierEntry {
            community: community.clone(),
            category,
            threshold,
            resource,
            created_at: Utc::now(),
        };
        inner.tiers.insert(key, entry.clone());
        Ok(TierUpsert::Created(entry))
    }

    async fn tiers_for_category(
        &self,
        community: &CommunityId,
        category: ReportCategory,
    ) -> Result<Vec<TierEntry>, Self::Error> {
        // BTreeMap key order is (community, category, threshold), so this
        // range is already ascending by threshold.
        Ok(self
            .inner
            .lock()
            .tiers
            .values()
            .filter(|t| t.community == *community && t.category == category)
            .cloned()
            .collect())
    }

    async fn delete_tiers(&self, community: &CommunityId) -> Result<Vec<TierEntry>, Self::Error> {
        let mut inner = self.inner.lock();
        let keys: Vec<_> = inner
            .tiers
            .keys()
            .filter(|(c, _, _)| c == community)
            .cloned()
            .collect();
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = inner.tiers.remove(&key) {
                removed.push(entry);
            }
        }
        Ok(removed)
    }

    async fn ban_user(
        &self,
        community: &CommunityId,
        user: &UserId,
        reason: Option<String>,
        banned_by: &UserId,
    ) -> Result<BanRecord, Self::Error> {
        let mut inner = self.inner.lock();
        inner.ensure_community(community);
        let record = BanRecord {
            community: community.clone(),
            user: user.clone(),
            reason,
            banned_by: banned_by.clone(),
            banned_at: Utc::now(),
        };
        inner
            .bans
            .insert((community.clone(), user.clone()), record.clone());
        Ok(record)
    }

    async fn unban_user(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<bool, Self::Error> {
        Ok(self
            .inner
            .lock()
            .bans
            .remove(&(community.clone(), user.clone()))
            .is_some())
    }

    async fn ban_record(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<Option<BanRecord>, Self::Error> {
        Ok(self
            .inner
            .lock()
            .bans
            .get(&(community.clone(), user.clone()))
            .cloned())
    }

    async fn banned_users(&self, community: &CommunityId) -> Result<Vec<BanRecord>, Self::Error> {
        let inner = self.inner.lock();
        let mut rows: Vec<BanRecord> = inner
            .bans
            .values()
            .filter(|b| b.community == *community)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.banned_at.cmp(&a.banned_at));
        Ok(rows)
    }

    async fn add_staff(
        &self,
        community: &CommunityId,
        user: &UserId,
        added_by: &UserId,
    ) -> Result<StaffMember, Self::Error> {
        let mut inner = self.inner.lock();
        inner.ensure_community(community);
        let member = StaffMember {
            community: community.clone(),
            user: user.clone(),
            added_by: added_by.clone(),
            added_at: Utc::now(),
        };
        inner
            .staff
            .insert((community.clone(), user.clone()), member.clone());
        Ok(member)
    }

    async fn remove_staff(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<bool, Self::Error> {
        Ok(self
            .inner
            .lock()
            .staff
            .remove(&(community.clone(), user.clone()))
            .is_some())
    }

    async fn staff_member(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<Option<StaffMember>, Self::Error> {
        Ok(self
            .inner
            .lock()
            .staff
            .get(&(community.clone(), user.clone()))
            .cloned())
    }

    async fn staff_members(
        &self,
        community: &CommunityId,
    ) -> Result<Vec<StaffMember>, Self::Error> {
        let inner = self.inner.lock();
        let mut rows: Vec<StaffMember> = inner
            .staff
            .values()
            .filter(|s| s.community == *community)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.added_at.cmp(&b.added_at));
        Ok(rows)
    }

    async fn statistics(&self, community: &CommunityId) -> Result<CommunityStats, Self::Error> {
        let inner = self.inner.lock();
        let total_users = inner
            .counters
            .keys()
            .filter(|(c, _)| c == community)
            .count() as u64;
        let mut stats = CommunityStats {
            total_users,
            ..Default::default()
        };
        for report in inner.reports.values() {
            if report.community != *community {
                continue;
            }
            stats.total_reports += 1;
            match report.category {
                ReportCategory::Scam => stats.scam_reports += 1,
                ReportCategory::Vouch => stats.vouch_reports += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_report(community: &str, user: &str, category: ReportCategory) -> NewReport {
        NewReport {
            community: CommunityId::from(community),
            user: UserId::from(user),
            category,
            reason: None,
            reported_by: UserId::from("staff"),
        }
    }

    #[tokio::test]
    async fn test_insert_increments_counter() {
        let store = InMemoryLedgerStore::new();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        for _ in 0..3 {
            let outcome = store
                .insert_report(new_report("g1", "u1", ReportCategory::Scam))
                .await
                .unwrap();
            assert!(matches!(outcome, ReportInsert::Inserted(_)));
        }

        let counter = store.counter(&community, &user).await.unwrap();
        assert_eq!(counter.scam_count, 3);
        assert_eq!(counter.vouch_count, 0);
    }

    #[tokio::test]
    async fn test_ban_gate_declines_insert_without_mutation() {
        let store = InMemoryLedgerStore::new();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        store
            .ban_user(&community, &user, Some("fraud".into()), &UserId::from("mod"))
            .await
            .unwrap();

        let outcome = store
            .insert_report(new_report("g1", "u1", ReportCategory::Scam))
            .await
            .unwrap();
        assert!(matches!(outcome, ReportInsert::Banned(_)));

        let counter = store.counter(&community, &user).await.unwrap();
        assert!(counter.is_zero());
        assert_eq!(store.num_reports(), 0);
    }

    #[tokio::test]
    async fn test_delete_nonmatching_is_noop() {
        let store = InMemoryLedgerStore::new();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        let outcome = store
            .insert_report(new_report("g1", "u1", ReportCategory::Vouch))
            .await
            .unwrap();
        let report = match outcome {
            ReportInsert::Inserted(r) => r,
            ReportInsert::Banned(_) => unreachable!(),
        };

        // Wrong category: no row matches all four keys.
        let deleted = store
            .delete_report(&community, &user, ReportCategory::Scam, report.id)
            .await
            .unwrap();
        assert!(!deleted);

        let counter = store.counter(&community, &user).await.unwrap();
        assert_eq!(counter.vouch_count, 1);
    }

    #[tokio::test]
    async fn test_decrement_floors_at_zero() {
        let store = InMemoryLedgerStore::new();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        let report = match store
            .insert_report(new_report("g1", "u1", ReportCategory::Scam))
            .await
            .unwrap()
        {
            ReportInsert::Inserted(r) => r,
            ReportInsert::Banned(_) => unreachable!(),
        };

        assert!(store
            .delete_report(&community, &user, ReportCategory::Scam, report.id)
            .await
            .unwrap());
        // Second delete of the same id is a no-op; counter stays zero.
        assert!(!store
            .delete_report(&community, &user, ReportCategory::Scam, report.id)
            .await
            .unwrap());

        let counter = store.counter(&community, &user).await.unwrap();
        assert_eq!(counter.scam_count, 0);
    }

    #[tokio::test]
    async fn test_upsert_tier_resolves_to_existing() {
        let store = InMemoryLedgerStore::new();
        let community = CommunityId::from("g1");

        let first = store
            .upsert_tier(&community, ReportCategory::Scam, 3, ResourceId::from("r1"))
            .await
            .unwrap();
        assert!(first.is_created());

        let second = store
            .upsert_tier(&community, ReportCategory::Scam, 3, ResourceId::from("r2"))
            .await
            .unwrap();
        assert!(!second.is_created());
        assert_eq!(second.into_entry().resource, ResourceId::from("r1"));
    }

    #[tokio::test]
    async fn test_tiers_for_category_ascending() {
        let store = InMemoryLedgerStore::new();
        let community = CommunityId::from("g1");

        for threshold in [5u32, 1, 3] {
            store
                .upsert_tier(
                    &community,
                    ReportCategory::Vouch,
                    threshold,
                    ResourceId::new(format!("r{}", threshold)),
                )
                .await
                .unwrap();
        }

        let tiers = store
            .tiers_for_category(&community, ReportCategory::Vouch)
            .await
            .unwrap();
        let thresholds: Vec<u32> = tiers.iter().map(|t| t.threshold).collect();
        assert_eq!(thresholds, vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_latest_report_ties_break_by_id() {
        let store = InMemoryLedgerStore::new();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        let mut last_id = None;
        for _ in 0..3 {
            if let ReportInsert::Inserted(r) = store
                .insert_report(new_report("g1", "u1", ReportCategory::Scam))
                .await
                .unwrap()
            {
                last_id = Some(r.id);
            }
        }

        let latest = store
            .latest_report(&community, &user, ReportCategory::Scam)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Some(latest.id), last_id);
    }

    #[tokio::test]
    async fn test_search_filters_and_limit() {
        let store = InMemoryLedgerStore::new();
        let community = CommunityId::from("g1");

        for user in ["u1", "u2"] {
            for _ in 0..3 {
                store
                    .insert_report(new_report("g1", user, ReportCategory::Scam))
                    .await
                    .unwrap();
            }
        }
        store
            .insert_report(new_report("g1", "u1", ReportCategory::Vouch))
            .await
            .unwrap();

        let filter = ReportFilter::default()
            .user(UserId::from("u1"))
            .category(ReportCategory::Scam)
            .limit(2);
        let rows = store.search_reports(&community, &filter).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.user == UserId::from("u1")));
        assert!(rows.iter().all(|r| r.category == ReportCategory::Scam));
    }

    #[tokio::test]
    async fn test_statistics() {
        let store = InMemoryLedgerStore::new();
        let community = CommunityId::from("g1");

        store
            .insert_report(new_report("g1", "u1", ReportCategory::Scam))
            .await
            .unwrap();
        store
            .insert_report(new_report("g1", "u2", ReportCategory::Vouch))
            .await
            .unwrap();

        let stats = store.statistics(&community).await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_reports, 2);
        assert_eq!(stats.scam_reports, 1);
        assert_eq!(stats.vouch_reports, 1);
    }
}
