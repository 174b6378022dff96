//! Report events and their derived per-user counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::ReportCategory;
use super::ids::{CommunityId, ReportId, UserId};

/// An immutable report event in the ledger.
///
/// Reports are append-only; the only mutation is explicit removal by id,
/// which also decrements the matching counter in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Storage-generated id, increasing in insertion order.
    pub id: ReportId,
    /// Community the report belongs to.
    pub community: CommunityId,
    /// User the report is about.
    pub user: UserId,
    /// Report category.
    pub category: ReportCategory,
    /// Optional free-form reason, at most `MAX_REASON_LEN` characters.
    pub reason: Option<String>,
    /// User who filed the report.
    pub reported_by: UserId,
    /// When the report was filed.
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a new report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReport {
    /// Community the report belongs to.
    pub community: CommunityId,
    /// User the report is about.
    pub user: UserId,
    /// Report category.
    pub category: ReportCategory,
    /// Optional free-form reason.
    pub reason: Option<String>,
    /// User who filed the report.
    pub reported_by: UserId,
}

/// Per-user counter row, materialized from the live set of reports.
///
/// Counters are only mutated by the report ledger inside the same
/// transaction as the report insert/delete; decrements floor at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounter {
    /// Community the counter belongs to.
    pub community: CommunityId,
    /// User the counter belongs to.
    pub user: UserId,
    /// Number of live scam reports.
    pub scam_count: u32,
    /// Number of live vouch reports.
    pub vouch_count: u32,
}

impl UserCounter {
    /// A zero-valued counter for a user with no ledger rows yet.
    pub fn zero(community: CommunityId, user: UserId) -> Self {
        Self {
            community,
            user,
            scam_count: 0,
            vouch_count: 0,
        }
    }

    /// Counter value for one category.
    pub fn count(&self, category: ReportCategory) -> u32 {
        match category {
            ReportCategory::Scam => self.scam_count,
            ReportCategory::Vouch => self.vouch_count,
        }
    }

    /// True when both counters are zero.
    pub fn is_zero(&self) -> bool {
        self.scam_count == 0 && self.vouch_count == 0
    }
}

/// Filters for searching reports within a community.
///
/// Unset fields match everything; results are ordered newest first and
/// capped at `limit` rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    /// Only reports about this user.
    pub user: Option<UserId>,
    /// Only reports of this category.
    pub category: Option<ReportCategory>,
    /// Only reports filed by this user.
    pub reported_by: Option<UserId>,
    /// Maximum number of rows returned.
    pub limit: usize,
}

impl ReportFilter {
    /// Default row cap for searches.
    pub const DEFAULT_LIMIT: usize = 50;

    /// Filter about a specific user.
    pub fn user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    /// Filter by category.
    pub fn category(mut self, category: ReportCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Filter by reporter.
    pub fn reported_by(mut self, reporter: UserId) -> Self {
        self.reported_by = Some(reporter);
        self
    }

    /// Override the row cap.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            user: None,
            category: None,
            reported_by: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}
