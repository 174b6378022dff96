//! Tier catalog: lazy creation of external tier resources.
//!
//! The catalog owns the (community, category, threshold) -> resource
//! mapping. Resolution is create-on-demand: a miss creates the external
//! resource first, then records it with a conflict-key upsert. When the
//! upsert loses a race (or the catalog write fails outright), the freshly
//! created resource is deleted again so no orphan survives; both racers
//! converge on the id stored in the catalog.

use std::sync::Arc;

use crate::directory::DirectoryAdapter;
use crate::error::LedgerError;
use crate::store::{LedgerStore, TierUpsert};
use crate::types::{CommunityId, ReportCategory, ResourceId, TierEntry};
use crate::MAX_TIER_RANGE;

/// Outcome of a bulk tier range creation.
///
/// Partial success is a supported terminal state: failed thresholds are
/// listed and the ids that did resolve are kept.
#[derive(Debug, Clone)]
pub struct TierRangeOutcome {
    /// Resource ids resolved, one per successful threshold, ascending.
    pub resources: Vec<ResourceId>,
    /// Human-readable description of each failed threshold.
    pub failures: Vec<String>,
}

impl TierRangeOutcome {
    /// True when every threshold resolved.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of a bulk tier purge.
#[derive(Debug, Clone)]
pub struct TierPurgeOutcome {
    /// External resources actually deleted.
    pub deleted: usize,
    /// Catalog rows cleared.
    pub entries_cleared: usize,
    /// Human-readable description of each failed external deletion.
    pub failures: Vec<String>,
}

impl TierPurgeOutcome {
    /// True when every external deletion succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Tier catalog over a ledger store and a directory adapter.
pub struct TierCatalog<S: LedgerStore, D: DirectoryAdapter> {
    store: Arc<S>,
    directory: Arc<D>,
}

impl<S: LedgerStore, D: DirectoryAdapter> TierCatalog<S, D> {
    /// Create a catalog.
    pub fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        Self { store, directory }
    }

    /// Resolve the tier entry for a threshold, creating the external
    /// resource and catalog row on demand.
    ///
    /// Idempotent: repeated calls with the same key return the same
    /// resource id, and concurrent callers never leave two live external
    /// resources for one key.
    pub async fn resolve_tier(
        &self,
        community: &CommunityId,
        category: ReportCategory,
        threshold: u32,
    ) -> Result<TierEntry, LedgerError> {
        if threshold == 0 {
            return Err(LedgerError::Validation(
                "tier threshold must be positive".to_string(),
            ));
        }

        if let Some(entry) = self
            .store
            .tier(community, category, threshold)
            .await
            .map_err(LedgerError::from_store)?
        {
            return Ok(entry);
        }

        let name = category.tier_name(threshold);
        let color = category.tier_color(threshold);
        let resource = self.directory.create_resource(&name, color).await?;

        match self
            .store
            .upsert_tier(community, category, threshold, resource.clone())
            .await
        {
            Ok(TierUpsert::Created(entry)) => {
                tracing::debug!(%community, %category, threshold, resource = %entry.resource, "tier created");
                Ok(entry)
            }
            Ok(TierUpsert::Existing(entry)) => {
                // Lost the creation race: the stored row wins, our
                // resource must not outlive this call.
                tracing::debug!(
                    %community, %category, threshold,
                    winner = %entry.resource, loser = %resource,
                    "concurrent tier creation, discarding losing resource"
                );
                if let Err(err) = self.directory.delete_resource(&resource).await {
                    tracing::warn!(%resource, error = %err, "failed to delete losing tier resource");
                }
                Ok(entry)
            }
            Err(err) => {
                if let Err(delete_err) = self.directory.delete_resource(&resource).await {
                    tracing::warn!(%resource, error = %delete_err, "failed to roll back tier resource after catalog write failure");
                }
                Err(LedgerError::from_store(err))
            }
        }
    }

    /// Tier entries for a category, ascending by threshold.
    pub async fn tiers_for_category(
        &self,
        community: &CommunityId,
        category: ReportCategory,
    ) -> Result<Vec<TierEntry>, LedgerError> {
        self.store
            .tiers_for_category(community, category)
            .await
            .map_err(LedgerError::from_store)
    }

    /// Create tier entries for thresholds `1..=max`, sequentially.
    ///
    /// Per-threshold failures are collected rather than aborting the
    /// loop; the operation fails outright only when `max` is out of
    /// range or no threshold resolved at all.
    pub async fn create_tiers_for_range(
        &self,
        community: &CommunityId,
        category: ReportCategory,
        max: u32,
    ) -> Result<TierRangeOutcome, LedgerError> {
        if max == 0 || max > MAX_TIER_RANGE {
            return Err(LedgerError::Validation(format!(
                "tier range must be between 1 and {}",
                MAX_TIER_RANGE
            )));
        }

        let mut resources = Vec::with_capacity(max as usize);
        let mut failures = Vec::new();
        for threshold in 1..=max {
            match self.resolve_tier(community, category, threshold).await {
                Ok(entry) => resources.push(entry.resource),
                Err(err) => failures.push(format!("threshold {}: {}", threshold, err)),
            }
        }

        if resources.is_empty() {
            return Err(LedgerError::ExternalAdapter(failures.join("; ")));
        }
        if !failures.is_empty() {
            tracing::warn!(
                %community, %category, max,
                failed = failures.len(),
                "tier range creation completed with failures"
            );
        }
        Ok(TierRangeOutcome { resources, failures })
    }

    /// Delete every tier of the community: external resources first
    /// (best-effort, failures collected), then the catalog rows.
    pub async fn delete_all_tiers(
        &self,
        community: &CommunityId,
    ) -> Result<TierPurgeOutcome, LedgerError> {
        let mut entries = Vec::new();
        for category in [ReportCategory::Scam, ReportCategory::Vouch] {
            entries.extend(
                self.store
                    .tiers_for_category(community, category)
                    .await
                    .map_err(LedgerError::from_store)?,
            );
        }

        let mut deleted = 0;
        let mut failures = Vec::new();
        for entry in &entries {
            match self.directory.delete_resource(&entry.resource).await {
                Ok(()) => deleted += 1,
                Err(crate::directory::DirectoryError::ResourceNotFound(_)) => {
                    // Already gone externally; clearing the row is enough.
                }
                Err(err) => {
                    failures.push(format!("resource {}: {}", entry.resource, err));
                }
            }
        }

        let cleared = self
            .store
            .delete_tiers(community)
            .await
            .map_err(LedgerError::from_store)?;

        tracing::info!(
            %community,
            deleted,
            entries_cleared = cleared.len(),
            failed = failures.len(),
            "tier catalog purged"
        );
        Ok(TierPurgeOutcome {
            deleted,
            entries_cleared: cleared.len(),
            failures,
        })
    }
}
