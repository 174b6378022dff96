//! PostgreSQL ledger store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Executor, Row};
use std::time::Duration;

use super::{LedgerStore, ReportInsert, TierUpsert};
use crate::types::{
    BanRecord, ChannelId, Community, CommunityId, CommunityStats, NewReport, Report,
    ReportCategory, ReportFilter, ReportId, ResourceId, StaffMember, TierEntry, UserCounter,
    UserId,
};

/// DDL for the ledger tables, applied by [`PostgresLedgerStore::ensure_schema`].
///
/// The unique keys are load-bearing: `tier_entries` resolves concurrent
/// tier creation to one row, and `ban_records`/`staff_members` make the
/// corresponding writes idempotent upserts.
pub const LEDGER_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS communities (
        community_id     TEXT PRIMARY KEY,
        log_channel_id   TEXT,
        vouch_channel_id TEXT,
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_counters (
        community_id TEXT NOT NULL,
        user_id      TEXT NOT NULL,
        scam_count   INTEGER NOT NULL DEFAULT 0,
        vouch_count  INTEGER NOT NULL DEFAULT 0,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (community_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reports (
        id           BIGSERIAL PRIMARY KEY,
        community_id TEXT NOT NULL,
        user_id      TEXT NOT NULL,
        category     TEXT NOT NULL,
        reason       TEXT,
        reported_by  TEXT NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS reports_by_user
        ON reports (community_id, user_id, category, created_at DESC, id DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tier_entries (
        community_id TEXT NOT NULL,
        category     TEXT NOT NULL,
        threshold    INTEGER NOT NULL,
        resource_id  TEXT NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (community_id, category, threshold)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ban_records (
        community_id TEXT NOT NULL,
        user_id      TEXT NOT NULL,
        reason       TEXT,
        banned_by    TEXT NOT NULL,
        banned_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (community_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS staff_members (
        community_id TEXT NOT NULL,
        user_id      TEXT NOT NULL,
        added_by     TEXT NOT NULL,
        added_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (community_id, user_id)
    )
    "#,
];

/// Configuration for the PostgreSQL connection pool.
///
/// Defaults balance pool size against managed-Postgres connection limits
/// and fail fast on acquire.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/reputation".to_string()),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            max_lifetime_secs: std::env::var("DB_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Error type for the PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A stored value could not be decoded into a domain type.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// PostgreSQL ledger store.
///
/// Each logical operation acquires one connection (or one transaction for
/// the multi-step report mutations) and releases it on every path.
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Apply the ledger schema (idempotent).
    pub async fn ensure_schema(&self) -> Result<(), PostgresError> {
        for statement in LEDGER_SCHEMA {
            self.pool.execute(*statement).await?;
        }
        Ok(())
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn parse_community_row(row: &PgRow) -> Result<Community, PostgresError> {
        Ok(Community {
            id: CommunityId::new(row.try_get::<String, _>("community_id")?),
            log_channel: row
                .try_get::<Option<String>, _>("log_channel_id")?
                .map(ChannelId::new),
            vouch_channel: row
                .try_get::<Option<String>, _>("vouch_channel_id")?
                .map(ChannelId::new),
            created_at: row.try_get("created_at")?,
        })
    }

    fn parse_counter_row(row: &PgRow) -> Result<UserCounter, PostgresError> {
        let scam: i32 = row.try_get("scam_count")?;
        let vouch: i32 = row.try_get("vouch_count")?;
        Ok(UserCounter {
            community: CommunityId::new(row.try_get::<String, _>("community_id")?),
            user: UserId::new(row.try_get::<String, _>("user_id")?),
            scam_count: scam.max(0) as u32,
            vouch_count: vouch.max(0) as u32,
        })
    }

    fn parse_report_row(row: &PgRow) -> Result<Report, PostgresError> {
        let category_str: String = row.try_get("category")?;
        let category = ReportCategory::from_str(&category_str).ok_or_else(|| {
            PostgresError::CorruptRow(format!("unknown report category: {}", category_str))
        })?;
        Ok(Report {
            id: ReportId::new(row.try_get::<i64, _>("id")?),
            community: CommunityId::new(row.try_get::<String, _>("community_id")?),
            user: UserId::new(row.try_get::<String, _>("user_id")?),
            category,
            reason: row.try_get("reason")?,
            reported_by: UserId::new(row.try_get::<String, _>("reported_by")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn parse_tier_row(row: &PgRow) -> Result<TierEntry, PostgresError> {
        let category_str: String = row.try_get("category")?;
        let category = ReportCategory::from_str(&category_str).ok_or_else(|| {
            PostgresError::CorruptRow(format!("unknown tier category: {}", category_str))
        })?;
        let threshold: i32 = row.try_get("threshold")?;
        Ok(TierEntry {
            community: CommunityId::new(row.try_get::<String, _>("community_id")?),
            category,
            threshold: threshold.max(0) as u32,
            resource: ResourceId::new(row.try_get::<String, _>("resource_id")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn parse_ban_row(row: &PgRow) -> Result<BanRecord, PostgresError> {
        Ok(BanRecord {
            community: CommunityId::new(row.try_get::<String, _>("community_id")?),
            user: UserId::new(row.try_get::<String, _>("user_id")?),
            reason: row.try_get("reason")?,
            banned_by: UserId::new(row.try_get::<String, _>("banned_by")?),
            banned_at: row.try_get("banned_at")?,
        })
    }

    fn parse_staff_row(row: &PgRow) -> Result<StaffMember, PostgresError> {
        Ok(StaffMember {
            community: CommunityId::new(row.try_get::<String, _>("community_id")?),
            user: UserId::new(row.try_get::<String, _>("user_id")?),
            added_by: UserId::new(row.try_get::<String, _>("added_by")?),
            added_at: row.try_get("added_at")?,
        })
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Error = PostgresError;

    async fn ensure_community(&self, community: &CommunityId) -> Result<Community, Self::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO communities (community_id) VALUES ($1)
            ON CONFLICT (community_id) DO NOTHING
            RETURNING community_id, log_channel_id, vouch_channel_id, created_at
            "#,
        )
        .bind(community.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Self::parse_community_row(r),
            None => {
                let row = sqlx::query(
                    r#"
                    SELECT community_id, log_channel_id, vouch_channel_id, created_at
                    FROM communities WHERE community_id = $1
                    "#,
                )
                .bind(community.as_str())
                .fetch_one(&self.pool)
                .await?;
                Self::parse_community_row(&row)
            }
        }
    }

    async fn community(&self, community: &CommunityId) -> Result<Option<Community>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT community_id, log_channel_id, vouch_channel_id, created_at
            FROM communities WHERE community_id = $1
            "#,
        )
        .bind(community.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_community_row).transpose()
    }

    async fn set_log_channel(
        &self,
        community: &CommunityId,
        channel: Option<ChannelId>,
    ) -> Result<Community, Self::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO communities (community_id, log_channel_id) VALUES ($1, $2)
            ON CONFLICT (community_id) DO UPDATE SET log_channel_id = $2
            RETURNING community_id, log_channel_id, vouch_channel_id, created_at
            "#,
        )
        .bind(community.as_str())
        .bind(channel.as_ref().map(|c| c.as_str().to_string()))
        .fetch_one(&self.pool)
        .await?;
        Self::parse_community_row(&row)
    }

    async fn set_vouch_channel(
        &self,
        community: &CommunityId,
        channel: Option<ChannelId>,
    ) -> Result<Community, Self::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO communities (community_id, vouch_channel_id) VALUES ($1, $2)
            ON CONFLICT (community_id) DO UPDATE SET vouch_channel_id = $2
            RETURNING community_id, log_channel_id, vouch_channel_id, created_at
            "#,
        )
        .bind(community.as_str())
        .bind(channel.as_ref().map(|c| c.as_str().to_string()))
        .fetch_one(&self.pool)
        .await?;
        Self::parse_community_row(&row)
    }

    async fn counter(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<UserCounter, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT community_id, user_id, scam_count, vouch_count
            FROM user_counters WHERE community_id = $1 AND user_id = $2
            "#,
        )
        .bind(community.as_str())
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Self::parse_counter_row(r),
            None => Ok(UserCounter::zero(community.clone(), user.clone())),
        }
    }

    async fn insert_report(&self, new: NewReport) -> Result<ReportInsert, Self::Error> {
        let mut tx = self.pool.begin().await?;

        // Ban gate inside the transaction: a banned user causes a clean
        // rollback with zero mutation.
        let ban = sqlx::query(
            r#"
            SELECT community_id, user_id, reason, banned_by, banned_at
            FROM ban_records WHERE community_id = $1 AND user_id = $2
            "#,
        )
        .bind(new.community.as_str())
        .bind(new.user.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(ref row) = ban {
            let record = Self::parse_ban_row(row)?;
            tx.rollback().await?;
            return Ok(ReportInsert::Banned(record));
        }

        sqlx::query(
            "INSERT INTO communities (community_id) VALUES ($1) ON CONFLICT (community_id) DO NOTHING",
        )
        .bind(new.community.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO user_counters (community_id, user_id) VALUES ($1, $2)
            ON CONFLICT (community_id, user_id) DO NOTHING
            "#,
        )
        .bind(new.community.as_str())
        .bind(new.user.as_str())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO reports (community_id, user_id, category, reason, reported_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, community_id, user_id, category, reason, reported_by, created_at
            "#,
        )
        .bind(new.community.as_str())
        .bind(new.user.as_str())
        .bind(new.category.as_str())
        .bind(&new.reason)
        .bind(new.reported_by.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let report = Self::parse_report_row(&row)?;

        let increment = match new.category {
            ReportCategory::Scam => {
                "UPDATE user_counters SET scam_count = scam_count + 1 \
                 WHERE community_id = $1 AND user_id = $2"
            }
            ReportCategory::Vouch => {
                "UPDATE user_counters SET vouch_count = vouch_count + 1 \
                 WHERE community_id = $1 AND user_id = $2"
            }
        };
        sqlx::query(increment)
            .bind(new.community.as_str())
            .bind(new.user.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ReportInsert::Inserted(report))
    }

    async fn delete_report(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: ReportCategory,
        id: ReportId,
    ) -> Result<bool, Self::Error> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM reports
            WHERE id = $1 AND community_id = $2 AND user_id = $3 AND category = $4
            "#,
        )
        .bind(id.value())
        .bind(community.as_str())
        .bind(user.as_str())
        .bind(category.as_str())
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        // GREATEST floors the counter at zero even if ledger and counter
        // have drifted.
        let decrement = match category {
            ReportCategory::Scam => {
                "UPDATE user_counters SET scam_count = GREATEST(scam_count - 1, 0) \
                 WHERE community_id = $1 AND user_id = $2"
            }
            ReportCategory::Vouch => {
                "UPDATE user_counters SET vouch_count = GREATEST(vouch_count - 1, 0) \
                 WHERE community_id = $1 AND user_id = $2"
            }
        };
        sqlx::query(decrement)
            .bind(community.as_str())
            .bind(user.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn latest_report(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: ReportCategory,
    ) -> Result<Option<Report>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, community_id, user_id, category, reason, reported_by, created_at
            FROM reports
            WHERE community_id = $1 AND user_id = $2 AND category = $3
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(community.as_str())
        .bind(user.as_str())
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_report_row).transpose()
    }

    async fn reports_for_user(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: Option<ReportCategory>,
    ) -> Result<Vec<Report>, Self::Error> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    r#"
                    SELECT id, community_id, user_id, category, reason, reported_by, created_at
                    FROM reports
                    WHERE community_id = $1 AND user_id = $2 AND category = $3
                    ORDER BY created_at DESC, id DESC
                    "#,
                )
                .bind(community.as_str())
                .bind(user.as_str())
                .bind(category.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, community_id, user_id, category, reason, reported_by, created_at
                    FROM reports
                    WHERE community_id = $1 AND user_id = $2
                    ORDER BY created_at DESC, id DESC
                    "#,
                )
                .bind(community.as_str())
                .bind(user.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::parse_report_row).collect()
    }

    async fn search_reports(
        &self,
        community: &CommunityId,
        filter: &ReportFilter,
    ) -> Result<Vec<Report>, Self::Error> {
        let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "SELECT id, community_id, user_id, category, reason, reported_by, created_at \
             FROM reports WHERE community_id = ",
        );
        qb.push_bind(community.as_str());
        if let Some(user) = &filter.user {
            qb.push(" AND user_id = ").push_bind(user.as_str());
        }
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(reporter) = &filter.reported_by {
            qb.push(" AND reported_by = ").push_bind(reporter.as_str());
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.limit as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::parse_report_row).collect()
    }

    async fn reset_counts(
        &self,
        community: &CommunityId,
        user: &UserId,
        category: Option<ReportCategory>,
    ) -> Result<UserCounter, Self::Error> {
        sqlx::query(
            "INSERT INTO communities (community_id) VALUES ($1) ON CONFLICT (community_id) DO NOTHING",
        )
        .bind(community.as_str())
        .execute(&self.pool)
        .await?;

        let sql = match category {
            Some(ReportCategory::Scam) => {
                r#"
                INSERT INTO user_counters (community_id, user_id, scam_count) VALUES ($1, $2, 0)
                ON CONFLICT (community_id, user_id) DO UPDATE SET scam_count = 0
                RETURNING community_id, user_id, scam_count, vouch_count
                "#
            }
            Some(ReportCategory::Vouch) => {
                r#"
                INSERT INTO user_counters (community_id, user_id, vouch_count) VALUES ($1, $2, 0)
                ON CONFLICT (community_id, user_id) DO UPDATE SET vouch_count = 0
                RETURNING community_id, user_id, scam_count, vouch_count
                "#
            }
            None => {
                r#"
                INSERT INTO user_counters (community_id, user_id) VALUES ($1, $2)
                ON CONFLICT (community_id, user_id) DO UPDATE SET scam_count = 0, vouch_count = 0
                RETURNING community_id, user_id, scam_count, vouch_count
                "#
            }
        };
        let row = sqlx::query(sql)
            .bind(community.as_str())
            .bind(user.as_str())
            .fetch_one(&self.pool)
            .await?;
        Self::parse_counter_row(&row)
    }

    async fn tier(
        &self,
        community: &CommunityId,
        category: ReportCategory,
        threshold: u32,
    ) -> Result<Option<TierEntry>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT community_id, category, threshold, resource_id, created_at
            FROM tier_entries
            WHERE community_id = $1 AND category = $2 AND threshold = $3
            "#,
        )
        .bind(community.as_str())
        .bind(category.as_str())
        .bind(threshold as i32)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_tier_row).transpose()
    }

    async fn upsert_tier(
        &self,
        community: &CommunityId,
        category: ReportCategory,
        threshold: u32,
        resource: ResourceId,
    ) -> Result<TierUpsert, Self::Error> {
        sqlx::query(
            "INSERT INTO communities (community_id) VALUES ($1) ON CONFLICT (community_id) DO NOTHING",
        )
        .bind(community.as_str())
        .execute(&self.pool)
        .await?;

        // DO NOTHING + RETURNING yields a row only for the winning insert;
        // losers fall through to the select and converge on the stored row.
        let inserted = sqlx::query(
            r#"
            INSERT INTO tier_entries (community_id, category, threshold, resource_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (community_id, category, threshold) DO NOTHING
            RETURNING community_id, category, threshold, resource_id, created_at
            "#,
        )
        .bind(community.as_str())
        .bind(category.as_str())
        .bind(threshold as i32)
        .bind(resource.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ref row) = inserted {
            return Ok(TierUpsert::Created(Self::parse_tier_row(row)?));
        }

        let row = sqlx::query(
            r#"
            SELECT community_id, category, threshold, resource_id, created_at
            FROM tier_entries
            WHERE community_id = $1 AND category = $2 AND threshold = $3
            "#,
        )
        .bind(community.as_str())
        .bind(category.as_str())
        .bind(threshold as i32)
        .fetch_one(&self.pool)
        .await?;
        Ok(TierUpsert::Existing(Self::parse_tier_row(&row)?))
    }

    async fn tiers_for_category(
        &self,
        community: &CommunityId,
        category: ReportCategory,
    ) -> Result<Vec<TierEntry>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT community_id, category, threshold, resource_id, created_at
            FROM tier_entries
            WHERE community_id = $1 AND category = $2
            ORDER BY threshold ASC
            "#,
        )
        .bind(community.as_str())
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_tier_row).collect()
    }

    async fn delete_tiers(&self, community: &CommunityId) -> Result<Vec<TierEntry>, Self::Error> {
        let rows = sqlx::query(
            r#"
            DELETE FROM tier_entries WHERE community_id = $1
            RETURNING community_id, category, threshold, resource_id, created_at
            "#,
        )
        .bind(community.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_tier_row).collect()
    }

    async fn ban_user(
        &self,
        community: &CommunityId,
        user: &UserId,
        reason: Option<String>,
        banned_by: &UserId,
    ) -> Result<BanRecord, Self::Error> {
        sqlx::query(
            "INSERT INTO communities (community_id) VALUES ($1) ON CONFLICT (community_id) DO NOTHING",
        )
        .bind(community.as_str())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO ban_records (community_id, user_id, reason, banned_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (community_id, user_id)
            DO UPDATE SET reason = $3, banned_by = $4, banned_at = now()
            RETURNING community_id, user_id, reason, banned_by, banned_at
            "#,
        )
        .bind(community.as_str())
        .bind(user.as_str())
        .bind(&reason)
        .bind(banned_by.as_str())
        .fetch_one(&self.pool)
        .await?;
        Self::parse_ban_row(&row)
    }

    async fn unban_user(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<bool, Self::Error> {
        let result = sqlx::query(
            "DELETE FROM ban_records WHERE community_id = $1 AND user_id = $2",
        )
        .bind(community.as_str())
        .bind(user.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ban_record(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<Option<BanRecord>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT community_id, user_id, reason, banned_by, banned_at
            FROM ban_records WHERE community_id = $1 AND user_id = $2
            "#,
        )
        .bind(community.as_str())
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_ban_row).transpose()
    }

    async fn banned_users(&self, community: &CommunityId) -> Result<Vec<BanRecord>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT community_id, user_id, reason, banned_by, banned_at
            FROM ban_records WHERE community_id = $1
            ORDER BY banned_at DESC
            "#,
        )
        .bind(community.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_ban_row).collect()
    }

    async fn add_staff(
        &self,
        community: &CommunityId,
        user: &UserId,
        added_by: &UserId,
    ) -> Result<StaffMember, Self::Error> {
        sqlx::query(
            "INSERT INTO communities (community_id) VALUES ($1) ON CONFLICT (community_id) DO NOTHING",
        )
        .bind(community.as_str())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"
            INSERT INTO staff_members (community_id, user_id, added_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (community_id, user_id) DO UPDATE SET added_by = $3
            RETURNING community_id, user_id, added_by, added_at
            "#,
        )
        .bind(community.as_str())
        .bind(user.as_str())
        .bind(added_by.as_str())
        .fetch_one(&self.pool)
        .await?;
        Self::parse_staff_row(&row)
    }

    async fn remove_staff(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<bool, Self::Error> {
        let result = sqlx::query(
            "DELETE FROM staff_members WHERE community_id = $1 AND user_id = $2",
        )
        .bind(community.as_str())
        .bind(user.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn staff_member(
        &self,
        community: &CommunityId,
        user: &UserId,
    ) -> Result<Option<StaffMember>, Self::Error> {
        let row = sqlx::query(
            r#"
            SELECT community_id, user_id, added_by, added_at
            FROM staff_members WHERE community_id = $1 AND user_id = $2
            "#,
        )
        .bind(community.as_str())
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_staff_row).transpose()
    }

    async fn staff_members(
        &self,
        community: &CommunityId,
    ) -> Result<Vec<StaffMember>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT community_id, user_id, added_by, added_at
            FROM staff_members WHERE community_id = $1
            ORDER BY added_at ASC
            "#,
        )
        .bind(community.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_staff_row).collect()
    }

    async fn statistics(&self, community: &CommunityId) -> Result<CommunityStats, Self::Error> {
        let total_users: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_counters WHERE community_id = $1")
                .bind(community.as_str())
                .fetch_one(&self.pool)
                .await?;
        let total_reports: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE community_id = $1")
                .bind(community.as_str())
                .fetch_one(&self.pool)
                .await?;
        let scam_reports: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reports WHERE community_id = $1 AND category = $2",
        )
        .bind(community.as_str())
        .bind(ReportCategory::Scam.as_str())
        .fetch_one(&self.pool)
        .await?;
        let vouch_reports: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reports WHERE community_id = $1 AND category = $2",
        )
        .bind(community.as_str())
        .bind(ReportCategory::Vouch.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(CommunityStats {
            total_users: total_users.max(0) as u64,
            total_reports: total_reports.max(0) as u64,
            scam_reports: scam_reports.max(0) as u64,
            vouch_reports: vouch_reports.max(0) as u64,
        })
    }
}
