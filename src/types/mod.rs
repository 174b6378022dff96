//! Core types for the reputation ledger.

pub mod category;
pub mod ids;
pub mod records;
pub mod report;
pub mod tier;

pub use category::ReportCategory;
pub use ids::{ChannelId, CommunityId, ReportId, ResourceId, UserId};
pub use records::{BanRecord, Community, CommunityStats, StaffMember};
pub use report::{NewReport, Report, ReportFilter, UserCounter};
pub use tier::TierEntry;
