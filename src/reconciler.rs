//! Tier reconciliation: converge external memberships onto the counter.
//!
//! Each pass is stateless and idempotent. For one (community, user,
//! category) it reads the counter, resolves the target tier for that
//! exact value (creating it on demand, falling back to the highest
//! existing threshold at or below the count when creation fails), strips
//! every tier membership of the category the user currently holds, then
//! asserts the single correct one.
//!
//! Removal is always total: the directory has no notion of "the current
//! tier", only a membership set, so clearing everything before the add is
//! what makes repeated passes converge and what sheds stale memberships
//! left behind by historical threshold changes.
//!
//! ## Precondition
//!
//! Passes for different users may run in parallel without coordination.
//! Passes for the *same* key must be serialized by the caller (a keyed
//! mutex or per-key queue); the reconciler holds no state between calls
//! and cannot enforce this itself.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::catalog::{TierCatalog, TierRangeOutcome};
use crate::directory::{DirectoryAdapter, DirectoryError};
use crate::error::LedgerError;
use crate::store::LedgerStore;
use crate::types::{CommunityId, ReportCategory, ResourceId, UserId};

/// Error type for reconciliation passes.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The ledger store failed; nothing external was touched yet.
    #[error("storage error: {0}")]
    Storage(String),
    /// A directory call failed before any membership change.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
    /// Old memberships were removed but the target tier could not be
    /// assigned. `removed` records the partial progress so the caller
    /// can retry just the add.
    #[error("tier assignment failed after removing {} memberships: {source}", removed.len())]
    AssignFailed {
        /// Memberships removed before the add failed.
        removed: Vec<ResourceId>,
        /// The underlying directory failure.
        #[source]
        source: DirectoryError,
    },
    /// The bulk setup failed entirely.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ReconcileError {
    fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Tier resource the user now holds, if any.
    pub assigned: Option<ResourceId>,
    /// Tier memberships removed during the pass (may include the tier
    /// that was immediately re-added).
    pub removed: Vec<ResourceId>,
}

/// Reconciles a user's external tier memberships with their counter.
pub struct TierReconciler<S: LedgerStore, D: DirectoryAdapter> {
    store: Arc<S>,
    directory: Arc<D>,
    catalog: TierCatalog<S, D>,
}

impl<S: LedgerStore, D: DirectoryAdapter> TierReconciler<S, D> {
    /// Create a reconciler over a store and a directory.
    pub fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        let catalog = TierCatalog::new(Arc::clone(&store), Arc::clone(&directory));
        Self {
            store,
            directory,
            catalog,
        }
    }

    /// The catalog this reconciler resolves tiers through.
    pub fn catalog(&self) -> &TierCatalog<S, D> {
        &self.catalog
    }

    /// Run one reconciliation pass for (community, user, category).
    pub async fn reconcile(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: ReportCategory,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let counter = self
            .store
            .counter(community, user)
            .await
            .map_err(ReconcileError::from_store)?;
        let count = counter.count(category);

        // Target tier for the exact count; on resolution failure degrade
        // to the highest existing threshold at or below the count rather
        // than leave the user with no tier at all.
        let target = if count == 0 {
            None
        } else {
            match self.catalog.resolve_tier(community, category, count).await {
                Ok(entry) => Some(entry.resource),
                Err(err) => {
                    tracing::warn!(
                        %community, %user, %category, count, error = %err,
                        "exact tier resolution failed, falling back to highest threshold at or below count"
                    );
                    self.highest_at_or_below(community, category, count).await?
                }
            }
        };

        // Every catalog-known tier of this category the user holds gets
        // removed, target included: total removal is what keeps repeated
        // passes convergent.
        let known: BTreeSet<ResourceId> = self
            .store
            .tiers_for_category(community, category)
            .await
            .map_err(ReconcileError::from_store)?
            .into_iter()
            .map(|t| t.resource)
            .collect();
        let memberships = self.directory.list_membership(user).await?;
        let to_remove: Vec<ResourceId> = memberships
            .into_iter()
            .filter(|id| known.contains(id))
            .collect();

        if !to_remove.is_empty() {
            if let Err(err) = self.directory.remove_membership(user, &to_remove).await {
                // Hierarchy constraints in the external system can block
                // removal; assignment still proceeds.
                tracing::warn!(
                    %community, %user, %category, error = %err,
                    "failed to remove existing tier memberships, continuing with assignment"
                );
            }
        }

        let mut assigned = None;
        if let Some(resource) = target {
            match self.directory.add_membership(user, &resource).await {
                Ok(()) => assigned = Some(resource),
                Err(source) => {
                    return Err(ReconcileError::AssignFailed {
                        removed: to_remove,
                        source,
                    })
                }
            }
        }

        tracing::debug!(
            %community, %user, %category, count,
            assigned = ?assigned, removed = to_remove.len(),
            "reconciliation pass complete"
        );
        Ok(ReconcileOutcome {
            assigned,
            removed: to_remove,
        })
    }

    /// Create tiers for thresholds `1..=max` (bulk setup).
    pub async fn create_tiers_for_range(
        &self,
        community: &CommunityId,
        category: ReportCategory,
        max: u32,
    ) -> Result<TierRangeOutcome, ReconcileError> {
        Ok(self
            .catalog
            .create_tiers_for_range(community, category, max)
            .await?)
    }

    async fn highest_at_or_below(
        &self,
        community: &CommunityId,
        category: ReportCategory,
        count: u32,
    ) -> Result<Option<ResourceId>, ReconcileError> {
        let tiers = self
            .store
            .tiers_for_category(community, category)
            .await
            .map_err(ReconcileError::from_store)?;
        Ok(tiers
            .into_iter()
            .filter(|t| t.threshold <= count)
            .max_by_key(|t| t.threshold)
            .map(|t| t.resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::store::InMemoryLedgerStore;
    use crate::types::NewReport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fixture() -> (
        Arc<InMemoryLedgerStore>,
        Arc<InMemoryDirectory>,
        TierReconciler<InMemoryLedgerStore, InMemoryDirectory>,
    ) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let reconciler = TierReconciler::new(Arc::clone(&store), Arc::clone(&directory));
        (store, directory, reconciler)
    }

    async fn add_scams(store: &InMemoryLedgerStore, community: &str, user: &str, n: usize) {
        for _ in 0..n {
            store
                .insert_report(NewReport {
                    community: CommunityId::from(community),
                    user: UserId::from(user),
                    category: ReportCategory::Scam,
                    reason: None,
                    reported_by: UserId::from("staff"),
                })
                .await
                .unwrap();
        }
    }

    /// Directory wrapper that fails selected operations, for exercising
    /// the degraded paths.
    struct FlakyDirectory {
        inner: InMemoryDirectory,
        fail_create: AtomicBool,
        fail_add: AtomicBool,
        fail_remove: AtomicBool,
    }

    impl FlakyDirectory {
        fn new() -> Self {
            Self {
                inner: InMemoryDirectory::new(),
                fail_create: AtomicBool::new(false),
                fail_add: AtomicBool::new(false),
                fail_remove: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl DirectoryAdapter for FlakyDirectory {
        async fn create_resource(
            &self,
            name: &str,
            color: u32,
        ) -> Result<ResourceId, DirectoryError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(DirectoryError::Unavailable("create disabled".into()));
            }
            self.inner.create_resource(name, color).await
        }

        async fn delete_resource(&self, id: &ResourceId) -> Result<(), DirectoryError> {
            self.inner.delete_resource(id).await
        }

        async fn list_membership(
            &self,
            user: &UserId,
        ) -> Result<BTreeSet<ResourceId>, DirectoryError> {
            self.inner.list_membership(user).await
        }

        async fn add_membership(
            &self,
            user: &UserId,
            id: &ResourceId,
        ) -> Result<(), DirectoryError> {
            if self.fail_add.load(Ordering::SeqCst) {
                return Err(DirectoryError::Rejected("hierarchy".into()));
            }
            self.inner.add_membership(user, id).await
        }

        async fn remove_membership(
            &self,
            user: &UserId,
            ids: &[ResourceId],
        ) -> Result<(), DirectoryError> {
            if self.fail_remove.load(Ordering::SeqCst) {
                return Err(DirectoryError::Rejected("hierarchy".into()));
            }
            self.inner.remove_membership(user, ids).await
        }
    }

    #[tokio::test]
    async fn test_assigns_exact_tier_for_count() {
        let (store, directory, reconciler) = fixture();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        add_scams(&store, "g1", "u1", 3).await;

        let outcome = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();

        let assigned = outcome.assigned.expect("tier assigned");
        assert_eq!(directory.resource(&assigned).unwrap().name, "Scams 3");
        assert!(directory.memberships_of(&user).contains(&assigned));
    }

    #[tokio::test]
    async fn test_zero_count_removes_everything() {
        let (store, directory, reconciler) = fixture();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        add_scams(&store, "g1", "u1", 2).await;
        let first = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();
        let held = first.assigned.unwrap();

        store
            .reset_counts(&community, &user, Some(ReportCategory::Scam))
            .await
            .unwrap();

        let outcome = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();
        assert_eq!(outcome.assigned, None);
        assert_eq!(outcome.removed, vec![held]);
        assert!(directory.memberships_of(&user).is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let (store, directory, reconciler) = fixture();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        add_scams(&store, "g1", "u1", 2).await;

        let first = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();
        let second = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();

        assert_eq!(first.assigned, second.assigned);
        // The second pass removed the held tier and re-added it.
        assert_eq!(second.removed, vec![first.assigned.clone().unwrap()]);
        assert_eq!(
            directory.memberships_of(&user).len(),
            1,
            "membership set must converge"
        );
    }

    #[tokio::test]
    async fn test_stale_tiers_of_same_category_are_shed() {
        let (store, directory, reconciler) = fixture();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        // History: user held tiers 1 and 2 from before thresholds moved.
        let t1 = reconciler
            .catalog()
            .resolve_tier(&community, ReportCategory::Scam, 1)
            .await
            .unwrap();
        let t2 = reconciler
            .catalog()
            .resolve_tier(&community, ReportCategory::Scam, 2)
            .await
            .unwrap();
        directory.add_membership(&user, &t1.resource).await.unwrap();
        directory.add_membership(&user, &t2.resource).await.unwrap();

        add_scams(&store, "g1", "u1", 3).await;
        let outcome = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();

        assert_eq!(outcome.removed.len(), 2);
        let held = directory.memberships_of(&user);
        assert_eq!(held.len(), 1);
        assert!(held.contains(&outcome.assigned.unwrap()));
    }

    #[tokio::test]
    async fn test_other_category_memberships_untouched() {
        let (store, directory, reconciler) = fixture();
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        let vouch_tier = reconciler
            .catalog()
            .resolve_tier(&community, ReportCategory::Vouch, 1)
            .await
            .unwrap();
        directory
            .add_membership(&user, &vouch_tier.resource)
            .await
            .unwrap();

        add_scams(&store, "g1", "u1", 1).await;
        let outcome = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();

        assert!(outcome.removed.is_empty());
        assert!(directory
            .memberships_of(&user)
            .contains(&vouch_tier.resource));
    }

    #[tokio::test]
    async fn test_fallback_to_highest_existing_threshold() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let directory = Arc::new(FlakyDirectory::new());
        let reconciler = TierReconciler::new(Arc::clone(&store), Arc::clone(&directory));
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        // Tiers 1 and 2 exist from earlier setup.
        reconciler
            .create_tiers_for_range(&community, ReportCategory::Scam, 2)
            .await
            .unwrap();

        add_scams(&store, "g1", "u1", 5).await;
        // Tier 5 cannot be created now.
        directory.fail_create.store(true, Ordering::SeqCst);

        let outcome = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();

        let assigned = outcome.assigned.expect("fell back to an existing tier");
        assert_eq!(directory.inner.resource(&assigned).unwrap().name, "Scams 2");
    }

    #[tokio::test]
    async fn test_removal_failure_does_not_block_assignment() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let directory = Arc::new(FlakyDirectory::new());
        let reconciler = TierReconciler::new(Arc::clone(&store), Arc::clone(&directory));
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        add_scams(&store, "g1", "u1", 1).await;
        let first = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();
        let stale = first.assigned.unwrap();

        add_scams(&store, "g1", "u1", 1).await;
        directory.fail_remove.store(true, Ordering::SeqCst);

        let outcome = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();

        let assigned = outcome.assigned.expect("target assigned despite removal failure");
        assert_eq!(directory.inner.resource(&assigned).unwrap().name, "Scams 2");
        // The stale tier could not be shed; the user holds both until a
        // later pass succeeds.
        let held = directory.inner.memberships_of(&user);
        assert!(held.contains(&assigned));
        assert!(held.contains(&stale));
    }

    #[tokio::test]
    async fn test_assign_failure_reports_partial_progress() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let directory = Arc::new(FlakyDirectory::new());
        let reconciler = TierReconciler::new(Arc::clone(&store), Arc::clone(&directory));
        let community = CommunityId::from("g1");
        let user = UserId::from("u1");

        add_scams(&store, "g1", "u1", 1).await;
        let first = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap();
        let held = first.assigned.unwrap();

        add_scams(&store, "g1", "u1", 1).await;
        directory.fail_add.store(true, Ordering::SeqCst);

        let err = reconciler
            .reconcile(&community, &user, ReportCategory::Scam)
            .await
            .unwrap_err();
        match err {
            ReconcileError::AssignFailed { removed, .. } => {
                // Everything was removed even though the add failed.
                assert_eq!(removed, vec![held]);
                assert!(directory.inner.memberships_of(&user).is_empty());
            }
            other => panic!("expected AssignFailed, got {other:?}"),
        }
    }
}
