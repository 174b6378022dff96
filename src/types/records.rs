//! Community, ban, staff and statistics records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ChannelId, CommunityId, UserId};

/// A community row. Created lazily on first write, never deleted by
/// the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    /// Community identifier.
    pub id: CommunityId,
    /// Optional channel receiving audit notifications.
    pub log_channel: Option<ChannelId>,
    /// Optional channel where vouch lookups are posted.
    pub vouch_channel: Option<ChannelId>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// A ban record. Presence blocks new report creation for the user in
/// that community; existing reports and counters are untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    /// Community the ban applies to.
    pub community: CommunityId,
    /// Banned user.
    pub user: UserId,
    /// Optional reason recorded with the ban.
    pub reason: Option<String>,
    /// Staff member who issued the ban.
    pub banned_by: UserId,
    /// When the ban was issued.
    pub banned_at: DateTime<Utc>,
}

/// A staff roster entry. Authorization data consulted by callers; the
/// core only stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    /// Community the staff member belongs to.
    pub community: CommunityId,
    /// Staff member's user id.
    pub user: UserId,
    /// Who added them to the roster.
    pub added_by: UserId,
    /// When they were added.
    pub added_at: DateTime<Utc>,
}

/// Aggregate counts for one community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityStats {
    /// Users with a counter row.
    pub total_users: u64,
    /// Live reports of any category.
    pub total_reports: u64,
    /// Live scam reports.
    pub scam_reports: u64,
    /// Live vouch reports.
    pub vouch_reports: u64,
}
