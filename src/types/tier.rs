//! Tier catalog entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::ReportCategory;
use super::ids::{CommunityId, ResourceId};

/// A catalog entry mapping (community, category, threshold) to the
/// external directory resource representing that tier.
///
/// Entries are unique per key; concurrent creation is resolved at the
/// storage layer by a conflict-key upsert that converges on the row that
/// won the insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierEntry {
    /// Community owning the tier.
    pub community: CommunityId,
    /// Category the tier tracks.
    pub category: ReportCategory,
    /// Counter value the tier corresponds to. Always >= 1.
    pub threshold: u32,
    /// External directory resource backing the tier.
    pub resource: ResourceId,
    /// When the catalog entry was created.
    pub created_at: DateTime<Utc>,
}
