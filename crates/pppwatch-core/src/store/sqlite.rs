// SQLite repository over sqlx.
//
// Counters are `u64` in the domain and `INTEGER` (i64) in SQLite. Values
// are converted with range checks in both directions; an out-of-range
// counter is a storage error, never a silent wrap.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, info};

use super::Repository;
use crate::error::CoreError;
use crate::model::{
    Counters, GeoPoint, Router, RouterId, SubscriberRecord, UsageRecord, telegram_target,
};
use crate::reconcile::ReconcileBatch;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS routers (
        id                 TEXT PRIMARY KEY NOT NULL,
        name               TEXT NOT NULL,
        host               TEXT NOT NULL,
        port               INTEGER NOT NULL,
        username           TEXT NOT NULL,
        password           TEXT NOT NULL,
        use_tls            INTEGER NOT NULL DEFAULT 1,
        active             INTEGER NOT NULL DEFAULT 1,
        quarantine_profile TEXT,
        telegram_bot_token TEXT,
        telegram_chat_id   TEXT,
        last_sync          TEXT,
        created_at         TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS subscribers (
        router_id        TEXT NOT NULL REFERENCES routers(id) ON DELETE CASCADE,
        secret_name      TEXT NOT NULL,
        profile          TEXT,
        comment          TEXT,
        latitude         REAL,
        longitude        REAL,
        original_profile TEXT,
        accumulated_tx   INTEGER NOT NULL DEFAULT 0,
        accumulated_rx   INTEGER NOT NULL DEFAULT 0,
        current_tx       INTEGER NOT NULL DEFAULT 0,
        current_rx       INTEGER NOT NULL DEFAULT 0,
        is_online        INTEGER NOT NULL DEFAULT 0,
        last_seen_online TEXT,
        updated_at       TEXT NOT NULL,
        PRIMARY KEY (router_id, secret_name)
    )",
    // No foreign key: history outlives the subscriber and router rows.
    "CREATE TABLE IF NOT EXISTS usage_history (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        router_id   TEXT NOT NULL,
        secret_name TEXT NOT NULL,
        tx_bytes    INTEGER NOT NULL,
        rx_bytes    INTEGER NOT NULL,
        session_end TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS usage_history_by_subscriber
        ON usage_history (router_id, secret_name, session_end)",
];

const UPSERT_SUBSCRIBER: &str = "
    INSERT INTO subscribers (
        router_id, secret_name, profile, comment,
        accumulated_tx, accumulated_rx, current_tx, current_rx,
        is_online, last_seen_online, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (router_id, secret_name) DO UPDATE SET
        profile          = excluded.profile,
        comment          = excluded.comment,
        accumulated_tx   = MAX(subscribers.accumulated_tx, excluded.accumulated_tx),
        accumulated_rx   = MAX(subscribers.accumulated_rx, excluded.accumulated_rx),
        current_tx       = excluded.current_tx,
        current_rx       = excluded.current_rx,
        is_online        = excluded.is_online,
        last_seen_online = excluded.last_seen_online,
        updated_at       = excluded.updated_at";

const SUBSCRIBER_COLUMNS: &str = "router_id, secret_name, profile, comment, latitude, longitude,
    original_profile, accumulated_tx, accumulated_rx, current_tx, current_rx,
    is_online, last_seen_online, updated_at";

const ROUTER_COLUMNS: &str = "id, name, host, port, username, password, use_tls, active,
    quarantine_profile, telegram_bot_token, telegram_chat_id, last_sync, created_at";

/// Repository backed by a SQLite database file (or `sqlite::memory:`).
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (creating if missing) the database and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is its own database, so an
        // in-memory pool must stay at exactly one long-lived connection.
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options.connect_with(options).await?;
        let repo = Self { pool };
        repo.migrate().await?;
        info!(url, "database ready");
        Ok(repo)
    }

    async fn migrate(&self) -> Result<(), CoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("schema ensured");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ── Conversions ─────────────────────────────────────────────────────

fn to_db(value: u64, column: &str) -> Result<i64, CoreError> {
    i64::try_from(value)
        .map_err(|_| CoreError::storage(format!("{column} value {value} exceeds SQLite INTEGER")))
}

fn from_db(value: i64, column: &str) -> Result<u64, CoreError> {
    u64::try_from(value)
        .map_err(|_| CoreError::storage(format!("{column} holds negative value {value}")))
}

fn counters(row: &SqliteRow, tx: &str, rx: &str) -> Result<Counters, CoreError> {
    Ok(Counters::new(
        from_db(row.try_get(tx)?, tx)?,
        from_db(row.try_get(rx)?, rx)?,
    ))
}

fn router_id(row: &SqliteRow, column: &str) -> Result<RouterId, CoreError> {
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|_| CoreError::storage(format!("malformed router id {raw:?}")))
}

fn router_from_row(row: &SqliteRow) -> Result<Router, CoreError> {
    let port: i64 = row.try_get("port")?;
    let password: String = row.try_get("password")?;
    let bot_token: Option<String> = row.try_get("telegram_bot_token")?;

    Ok(Router {
        id: router_id(row, "id")?,
        name: row.try_get("name")?,
        host: row.try_get("host")?,
        port: u16::try_from(port)
            .map_err(|_| CoreError::storage(format!("router port {port} out of range")))?,
        username: row.try_get("username")?,
        password: SecretString::from(password),
        use_tls: row.try_get("use_tls")?,
        active: row.try_get("active")?,
        quarantine_profile: row.try_get("quarantine_profile")?,
        telegram: telegram_target(
            bot_token.map(SecretString::from),
            row.try_get("telegram_chat_id")?,
        ),
        last_sync: row.try_get("last_sync")?,
        created_at: row.try_get("created_at")?,
    })
}

fn subscriber_from_row(row: &SqliteRow) -> Result<SubscriberRecord, CoreError> {
    let latitude: Option<f64> = row.try_get("latitude")?;
    let longitude: Option<f64> = row.try_get("longitude")?;
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
        }),
        _ => None,
    };

    Ok(SubscriberRecord {
        router_id: router_id(row, "router_id")?,
        name: row.try_get("secret_name")?,
        profile: row.try_get("profile")?,
        comment: row.try_get("comment")?,
        location,
        original_profile: row.try_get("original_profile")?,
        accumulated: counters(row, "accumulated_tx", "accumulated_rx")?,
        current: counters(row, "current_tx", "current_rx")?,
        is_online: row.try_get("is_online")?,
        last_seen_online: row.try_get("last_seen_online")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn usage_from_row(row: &SqliteRow) -> Result<UsageRecord, CoreError> {
    Ok(UsageRecord {
        router_id: router_id(row, "router_id")?,
        name: row.try_get("secret_name")?,
        bytes: counters(row, "tx_bytes", "rx_bytes")?,
        session_end: row.try_get("session_end")?,
    })
}

// ── Repository ──────────────────────────────────────────────────────

#[async_trait]
impl Repository for SqliteRepository {
    async fn list_routers(&self) -> Result<Vec<Router>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ROUTER_COLUMNS} FROM routers ORDER BY created_at, name"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(router_from_row).collect()
    }

    async fn get_router(&self, id: RouterId) -> Result<Option<Router>, CoreError> {
        let row = sqlx::query(&format!("SELECT {ROUTER_COLUMNS} FROM routers WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(router_from_row).transpose()
    }

    async fn insert_router(&self, router: &Router) -> Result<(), CoreError> {
        sqlx::query(&format!(
            "INSERT INTO routers ({ROUTER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(router.id.to_string())
        .bind(&router.name)
        .bind(&router.host)
        .bind(i64::from(router.port))
        .bind(&router.username)
        .bind(router.password.expose_secret())
        .bind(router.use_tls)
        .bind(router.active)
        .bind(&router.quarantine_profile)
        .bind(router.telegram.as_ref().map(|t| t.bot_token.expose_secret()))
        .bind(router.telegram.as_ref().map(|t| t.chat_id.as_str()))
        .bind(router.last_sync)
        .bind(router.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_router(&self, router: &Router) -> Result<bool, CoreError> {
        let result = sqlx::query(
            "UPDATE routers SET name = ?, host = ?, port = ?, username = ?, password = ?,
                use_tls = ?, active = ?, quarantine_profile = ?, telegram_bot_token = ?,
                telegram_chat_id = ?, last_sync = ?
             WHERE id = ?",
        )
        .bind(&router.name)
        .bind(&router.host)
        .bind(i64::from(router.port))
        .bind(&router.username)
        .bind(router.password.expose_secret())
        .bind(router.use_tls)
        .bind(router.active)
        .bind(&router.quarantine_profile)
        .bind(router.telegram.as_ref().map(|t| t.bot_token.expose_secret()))
        .bind(router.telegram.as_ref().map(|t| t.chat_id.as_str()))
        .bind(router.last_sync)
        .bind(router.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_router(&self, id: RouterId) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM routers WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_synced(&self, id: RouterId, at: DateTime<Utc>) -> Result<(), CoreError> {
        sqlx::query("UPDATE routers SET last_sync = ? WHERE id = ?")
            .bind(at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_subscribers(&self, router: RouterId) -> Result<Vec<SubscriberRecord>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE router_id = ? ORDER BY secret_name"
        ))
        .bind(router.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(subscriber_from_row).collect()
    }

    async fn get_subscriber(
        &self,
        router: RouterId,
        name: &str,
    ) -> Result<Option<SubscriberRecord>, CoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE router_id = ? AND secret_name = ?"
        ))
        .bind(router.to_string())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(subscriber_from_row).transpose()
    }

    async fn apply_batch(
        &self,
        router: RouterId,
        batch: &ReconcileBatch,
    ) -> Result<(), CoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let router_key = router.to_string();
        let mut tx = self.pool.begin().await?;

        for name in &batch.deletions {
            sqlx::query("DELETE FROM subscribers WHERE router_id = ? AND secret_name = ?")
                .bind(&router_key)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        for row in &batch.upserts {
            sqlx::query(UPSERT_SUBSCRIBER)
                .bind(&router_key)
                .bind(&row.name)
                .bind(&row.profile)
                .bind(&row.comment)
                .bind(to_db(row.accumulated.tx, "accumulated_tx")?)
                .bind(to_db(row.accumulated.rx, "accumulated_rx")?)
                .bind(to_db(row.current.tx, "current_tx")?)
                .bind(to_db(row.current.rx, "current_rx")?)
                .bind(row.is_online)
                .bind(row.last_seen_online)
                .bind(row.updated_at)
                .execute(&mut *tx)
                .await?;
        }

        for record in &batch.history {
            sqlx::query(
                "INSERT INTO usage_history (router_id, secret_name, tx_bytes, rx_bytes, session_end)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&router_key)
            .bind(&record.name)
            .bind(to_db(record.bytes.tx, "tx_bytes")?)
            .bind(to_db(record.bytes.rx, "rx_bytes")?)
            .bind(record.session_end)
            .execute(&mut *tx)
            .await?;
        }

        // Dropping `tx` on any early return above rolls the whole batch back.
        tx.commit().await?;
        debug!(
            router = %router,
            upserts = batch.upserts.len(),
            deletions = batch.deletions.len(),
            history = batch.history.len(),
            "batch committed"
        );
        Ok(())
    }

    async fn set_original_profile(
        &self,
        router: RouterId,
        name: &str,
        profile: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        match profile {
            Some(profile) => {
                sqlx::query(
                    "INSERT INTO subscribers (router_id, secret_name, original_profile, updated_at)
                     VALUES (?, ?, ?, ?)
                     ON CONFLICT (router_id, secret_name) DO UPDATE SET
                        original_profile = excluded.original_profile,
                        updated_at = excluded.updated_at",
                )
                .bind(router.to_string())
                .bind(name)
                .bind(profile)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    "UPDATE subscribers SET original_profile = NULL, updated_at = ?
                     WHERE router_id = ? AND secret_name = ?",
                )
                .bind(now)
                .bind(router.to_string())
                .bind(name)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn set_comment(
        &self,
        router: RouterId,
        name: &str,
        comment: Option<&str>,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            "UPDATE subscribers SET comment = ? WHERE router_id = ? AND secret_name = ?",
        )
        .bind(comment)
        .bind(router.to_string())
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_location(
        &self,
        router: RouterId,
        name: &str,
        location: Option<GeoPoint>,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            "UPDATE subscribers SET latitude = ?, longitude = ?
             WHERE router_id = ? AND secret_name = ?",
        )
        .bind(location.map(|l| l.latitude))
        .bind(location.map(|l| l.longitude))
        .bind(router.to_string())
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn recent_usage(
        &self,
        router: RouterId,
        name: &str,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, CoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT router_id, secret_name, tx_bytes, rx_bytes, session_end
             FROM usage_history
             WHERE router_id = ? AND secret_name = ?
             ORDER BY session_end DESC, id DESC
             LIMIT ?",
        )
        .bind(router.to_string())
        .bind(name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(usage_from_row).collect()
    }
}
