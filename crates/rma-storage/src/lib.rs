//! Analytics-database persistence for RMA: connection settings, schema
//! creation, keyed upserts and the sync run log.

use chrono::{DateTime, Utc};
use rma_core::{
    AnnouncementRecord, CommentRecord, ContractRecord, DeviceRecord, NotificationRecord,
    PropertyRecord, RentalRequestRecord, UserNotificationRecord, UserRecord,
};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{Connection, Executor, PgConnection, PgExecutor};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub const CRATE_NAME: &str = "rma-storage";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid port in {var}: {value:?}")]
    InvalidPort { var: String, value: String },
}

/// Connection parameters for one Postgres database.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub sslmode: Option<String>,
}

impl DbConfig {
    /// Analytics (target) database, `DB_*` variables with local defaults.
    pub fn target_from_env() -> Result<Self, SettingsError> {
        Ok(Self {
            host: env_or("DB_HOST", "127.0.0.1"),
            port: port_from_env("DB_PORT")?,
            dbname: env_or("DB_NAME", "rentme_analytics"),
            user: env_or("DB_USER", "postgres"),
            password: env_or("DB_PASSWORD", ""),
            sslmode: std::env::var("DB_SSLMODE").ok(),
        })
    }

    /// Production (source) database, `SOURCE_DB_*` variables. Returns
    /// `None` when `SOURCE_DB_HOST` is unset: "not configured" is a
    /// different condition than "configured but unreachable".
    pub fn source_from_env() -> Result<Option<Self>, SettingsError> {
        let host = match std::env::var("SOURCE_DB_HOST") {
            Ok(host) if !host.trim().is_empty() => host,
            _ => return Ok(None),
        };
        Ok(Some(Self {
            host,
            port: port_from_env("SOURCE_DB_PORT")?,
            dbname: env_or("SOURCE_DB_NAME", "rentme_production"),
            user: env_or("SOURCE_DB_USER", "postgres"),
            password: env_or("SOURCE_DB_PASSWORD", ""),
            sslmode: std::env::var("SOURCE_DB_SSLMODE").ok(),
        }))
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user)
            .password(&self.password);
        if let Some(mode) = &self.sslmode {
            options = options.ssl_mode(parse_ssl_mode(mode));
        }
        options
    }
}

/// Both ends of a sync run, built once at process start and passed by
/// reference into the runner.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub source: Option<DbConfig>,
    pub target: DbConfig,
}

impl SyncSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Ok(Self {
            source: DbConfig::source_from_env()?,
            target: DbConfig::target_from_env()?,
        })
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn port_from_env(var: &str) -> Result<u16, SettingsError> {
    match std::env::var(var) {
        Ok(raw) => parse_port(var, &raw),
        Err(_) => Ok(5432),
    }
}

pub fn parse_port(var: &str, raw: &str) -> Result<u16, SettingsError> {
    raw.trim().parse().map_err(|_| SettingsError::InvalidPort {
        var: var.to_string(),
        value: raw.to_string(),
    })
}

/// Unknown values fall back to `require`, matching the managed-hosting
/// deployments the target usually runs on.
pub fn parse_ssl_mode(raw: &str) -> PgSslMode {
    match raw.to_ascii_lowercase().as_str() {
        "disable" => PgSslMode::Disable,
        "allow" => PgSslMode::Allow,
        "prefer" => PgSslMode::Prefer,
        "verify-ca" => PgSslMode::VerifyCa,
        "verify-full" => PgSslMode::VerifyFull,
        _ => PgSslMode::Require,
    }
}

pub async fn connect(config: &DbConfig) -> Result<PgConnection, sqlx::Error> {
    debug!(host = %config.host, dbname = %config.dbname, "opening connection");
    PgConnection::connect_with(&config.connect_options()).await
}

/// Analytics schema. Simplified mirrors of the production tables, only the
/// columns the reporting queries need. `REFERENCES` clauses follow the
/// original layout; the sync order keeps them satisfiable.
const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGINT PRIMARY KEY,
    phone_number VARCHAR(100),
    first_name VARCHAR(150),
    last_name VARCHAR(150),
    role VARCHAR(50) DEFAULT 'ordinary',
    is_active BOOLEAN DEFAULT TRUE,
    is_deleted BOOLEAN DEFAULT FALSE,
    date_joined TIMESTAMPTZ,
    last_login TIMESTAMPTZ,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    birth_date DATE,
    gender VARCHAR(225),
    is_identified BOOLEAN DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS devices (
    id BIGINT PRIMARY KEY,
    user_id BIGINT REFERENCES users(id),
    status VARCHAR(10) DEFAULT 'offline',
    device_id VARCHAR(255),
    fcm_token VARCHAR(255),
    name VARCHAR(255),
    device_type VARCHAR(20),
    is_deleted BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    last_synced_at TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS properties (
    id BIGINT PRIMARY KEY,
    user_id BIGINT REFERENCES users(id),
    title TEXT,
    type VARCHAR(50) DEFAULT 'apartment',
    status VARCHAR(50) DEFAULT 'draft',
    area FLOAT,
    address VARCHAR(255),
    n_rooms INTEGER,
    floor INTEGER,
    is_rentable BOOLEAN DEFAULT TRUE,
    is_deleted BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS announcements (
    id BIGINT PRIMARY KEY,
    user_id BIGINT REFERENCES users(id),
    property_id BIGINT REFERENCES properties(id),
    title TEXT,
    price NUMERIC(12,2),
    currency VARCHAR(10) DEFAULT 'UZS',
    moderated_status VARCHAR(100) DEFAULT 'pending',
    views INTEGER DEFAULT 0,
    phone_views INTEGER DEFAULT 0,
    is_available BOOLEAN DEFAULT TRUE,
    is_moderated BOOLEAN DEFAULT FALSE,
    is_deleted BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS rental_requests (
    id BIGINT PRIMARY KEY,
    property_id BIGINT,
    announcement_id BIGINT,
    user_id BIGINT REFERENCES users(id),
    sender_id BIGINT,
    status VARCHAR(50) DEFAULT 'pending',
    text TEXT,
    is_deleted BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS contracts (
    id BIGINT PRIMARY KEY,
    rental_request_id BIGINT,
    property_id BIGINT,
    tenant_id BIGINT,
    homeowner_id BIGINT,
    status VARCHAR(100) DEFAULT 'pending',
    price NUMERIC(12,2),
    start_date DATE,
    end_date DATE,
    contract_type VARCHAR(50) DEFAULT 'fixed',
    is_deleted BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS notifications (
    id BIGINT PRIMARY KEY,
    title VARCHAR(255),
    description TEXT,
    send_to_all BOOLEAN DEFAULT FALSE,
    is_sent BOOLEAN DEFAULT FALSE,
    sent_at TIMESTAMPTZ,
    is_deleted BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS user_notifications (
    id BIGINT PRIMARY KEY,
    user_id BIGINT REFERENCES users(id),
    notification_id BIGINT REFERENCES notifications(id),
    is_read BOOLEAN DEFAULT FALSE,
    read_at TIMESTAMPTZ,
    is_deleted BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS comments (
    id BIGINT PRIMARY KEY,
    property_id BIGINT,
    announcement_id BIGINT,
    author_id BIGINT REFERENCES users(id),
    title VARCHAR(500),
    text TEXT,
    rating INTEGER,
    is_approved BOOLEAN DEFAULT TRUE,
    is_deleted BOOLEAN DEFAULT FALSE,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS sync_runs (
    id BIGSERIAL PRIMARY KEY,
    run_id UUID NOT NULL,
    started_at TIMESTAMPTZ NOT NULL,
    finished_at TIMESTAMPTZ NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'completed',
    records_synced BIGINT NOT NULL DEFAULT 0,
    error_message TEXT
);
"#;

/// Create every table the sync and the dashboard need. Pure
/// `CREATE TABLE IF NOT EXISTS`, safe to run before every sync.
pub async fn ensure_schema(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    Executor::execute(&mut *conn, SCHEMA_DDL).await?;
    Ok(())
}

/// Session-level advisory lock key guarding against overlapping sync runs.
/// ASCII "RMASYNC" packed into an i64.
pub const SYNC_LOCK_KEY: i64 = 0x524d_4153_594e_43;

pub async fn try_acquire_run_lock(conn: &mut PgConnection) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
        .bind(SYNC_LOCK_KEY)
        .fetch_one(&mut *conn)
        .await
}

pub async fn release_run_lock(conn: &mut PgConnection) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
        .bind(SYNC_LOCK_KEY)
        .fetch_one(&mut *conn)
        .await
}

/// One line in the sync audit log, written outside the data transaction.
#[derive(Debug, Clone)]
pub struct SyncRunLog {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: String,
    pub records_synced: i64,
    pub error_message: Option<String>,
}

pub async fn record_sync_run(conn: &mut PgConnection, log: &SyncRunLog) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sync_runs (run_id, started_at, finished_at, status, records_synced, error_message)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(log.run_id)
    .bind(log.started_at)
    .bind(log.finished_at)
    .bind(&log.status)
    .bind(log.records_synced)
    .bind(log.error_message.as_deref())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// Keyed upserts. The conflict target is always the source-assigned id; the
// update clause refreshes the mutable subset of each entity and never
// touches created_at or the original linkage of the row.

pub const UPSERT_USER_SQL: &str = "\
INSERT INTO users (id, phone_number, first_name, last_name, role, is_active, is_deleted, \
date_joined, last_login, created_at, birth_date, gender, is_identified) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
ON CONFLICT (id) DO UPDATE SET \
phone_number = EXCLUDED.phone_number, first_name = EXCLUDED.first_name, \
last_name = EXCLUDED.last_name, role = EXCLUDED.role, is_active = EXCLUDED.is_active, \
last_login = EXCLUDED.last_login, birth_date = EXCLUDED.birth_date, \
gender = EXCLUDED.gender, is_identified = EXCLUDED.is_identified";

pub async fn upsert_user<'e>(ex: impl PgExecutor<'e>, row: &UserRecord) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_USER_SQL)
        .bind(row.id)
        .bind(row.phone_number.as_deref())
        .bind(row.first_name.as_deref())
        .bind(row.last_name.as_deref())
        .bind(row.role.as_deref())
        .bind(row.is_active)
        .bind(row.is_deleted)
        .bind(row.date_joined)
        .bind(row.last_login)
        .bind(row.created_at)
        .bind(row.birth_date)
        .bind(row.gender.as_deref())
        .bind(row.is_identified)
        .execute(ex)
        .await?;
    Ok(())
}

pub const UPSERT_DEVICE_SQL: &str = "\
INSERT INTO devices (id, user_id, status, device_id, fcm_token, name, device_type, \
is_deleted, created_at, last_synced_at) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
ON CONFLICT (id) DO UPDATE SET \
user_id = EXCLUDED.user_id, status = EXCLUDED.status, device_id = EXCLUDED.device_id, \
fcm_token = EXCLUDED.fcm_token, name = EXCLUDED.name, device_type = EXCLUDED.device_type, \
last_synced_at = EXCLUDED.last_synced_at";

pub async fn upsert_device<'e>(
    ex: impl PgExecutor<'e>,
    row: &DeviceRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_DEVICE_SQL)
        .bind(row.id)
        .bind(row.user_id)
        .bind(row.status.as_deref())
        .bind(row.device_id.as_deref())
        .bind(row.fcm_token.as_deref())
        .bind(row.name.as_deref())
        .bind(row.device_type.as_deref())
        .bind(row.is_deleted)
        .bind(row.created_at)
        .bind(row.last_synced_at)
        .execute(ex)
        .await?;
    Ok(())
}

pub const UPSERT_PROPERTY_SQL: &str = "\
INSERT INTO properties (id, user_id, title, type, status, area, address, n_rooms, floor, \
is_rentable, is_deleted, created_at) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
ON CONFLICT (id) DO UPDATE SET \
user_id = EXCLUDED.user_id, title = EXCLUDED.title, type = EXCLUDED.type, \
status = EXCLUDED.status, area = EXCLUDED.area, address = EXCLUDED.address, \
n_rooms = EXCLUDED.n_rooms, floor = EXCLUDED.floor, is_rentable = EXCLUDED.is_rentable";

pub async fn upsert_property<'e>(
    ex: impl PgExecutor<'e>,
    row: &PropertyRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_PROPERTY_SQL)
        .bind(row.id)
        .bind(row.user_id)
        .bind(row.title.as_deref())
        .bind(row.kind.as_deref())
        .bind(row.status.as_deref())
        .bind(row.area)
        .bind(row.address.as_deref())
        .bind(row.n_rooms)
        .bind(row.floor)
        .bind(row.is_rentable)
        .bind(row.is_deleted)
        .bind(row.created_at)
        .execute(ex)
        .await?;
    Ok(())
}

pub const UPSERT_ANNOUNCEMENT_SQL: &str = "\
INSERT INTO announcements (id, user_id, property_id, title, price, currency, \
moderated_status, views, phone_views, is_available, is_moderated, is_deleted, created_at) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
ON CONFLICT (id) DO UPDATE SET \
title = EXCLUDED.title, price = EXCLUDED.price, currency = EXCLUDED.currency, \
moderated_status = EXCLUDED.moderated_status, views = EXCLUDED.views, \
phone_views = EXCLUDED.phone_views, is_available = EXCLUDED.is_available, \
is_moderated = EXCLUDED.is_moderated";

pub async fn upsert_announcement<'e>(
    ex: impl PgExecutor<'e>,
    row: &AnnouncementRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_ANNOUNCEMENT_SQL)
        .bind(row.id)
        .bind(row.user_id)
        .bind(row.property_id)
        .bind(row.title.as_deref())
        .bind(row.price)
        .bind(row.currency.as_deref())
        .bind(row.moderated_status.as_deref())
        .bind(row.views)
        .bind(row.phone_views)
        .bind(row.is_available)
        .bind(row.is_moderated)
        .bind(row.is_deleted)
        .bind(row.created_at)
        .execute(ex)
        .await?;
    Ok(())
}

pub const UPSERT_RENTAL_REQUEST_SQL: &str = "\
INSERT INTO rental_requests (id, property_id, announcement_id, user_id, sender_id, \
status, text, is_deleted, created_at) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
ON CONFLICT (id) DO UPDATE SET \
status = EXCLUDED.status, text = EXCLUDED.text";

pub async fn upsert_rental_request<'e>(
    ex: impl PgExecutor<'e>,
    row: &RentalRequestRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_RENTAL_REQUEST_SQL)
        .bind(row.id)
        .bind(row.property_id)
        .bind(row.announcement_id)
        .bind(row.user_id)
        .bind(row.sender_id)
        .bind(row.status.as_deref())
        .bind(row.text.as_deref())
        .bind(row.is_deleted)
        .bind(row.created_at)
        .execute(ex)
        .await?;
    Ok(())
}

pub const UPSERT_CONTRACT_SQL: &str = "\
INSERT INTO contracts (id, rental_request_id, property_id, tenant_id, homeowner_id, \
status, price, start_date, end_date, contract_type, is_deleted, created_at) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
ON CONFLICT (id) DO UPDATE SET \
status = EXCLUDED.status, price = EXCLUDED.price, start_date = EXCLUDED.start_date, \
end_date = EXCLUDED.end_date, contract_type = EXCLUDED.contract_type";

pub async fn upsert_contract<'e>(
    ex: impl PgExecutor<'e>,
    row: &ContractRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_CONTRACT_SQL)
        .bind(row.id)
        .bind(row.rental_request_id)
        .bind(row.property_id)
        .bind(row.tenant_id)
        .bind(row.homeowner_id)
        .bind(row.status.as_deref())
        .bind(row.price)
        .bind(row.start_date)
        .bind(row.end_date)
        .bind(row.contract_type.as_deref())
        .bind(row.is_deleted)
        .bind(row.created_at)
        .execute(ex)
        .await?;
    Ok(())
}

pub const UPSERT_NOTIFICATION_SQL: &str = "\
INSERT INTO notifications (id, title, description, send_to_all, is_sent, sent_at, \
is_deleted, created_at) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
ON CONFLICT (id) DO UPDATE SET \
title = EXCLUDED.title, description = EXCLUDED.description, \
send_to_all = EXCLUDED.send_to_all, is_sent = EXCLUDED.is_sent, sent_at = EXCLUDED.sent_at";

pub async fn upsert_notification<'e>(
    ex: impl PgExecutor<'e>,
    row: &NotificationRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_NOTIFICATION_SQL)
        .bind(row.id)
        .bind(row.title.as_deref())
        .bind(row.description.as_deref())
        .bind(row.send_to_all)
        .bind(row.is_sent)
        .bind(row.sent_at)
        .bind(row.is_deleted)
        .bind(row.created_at)
        .execute(ex)
        .await?;
    Ok(())
}

pub const UPSERT_USER_NOTIFICATION_SQL: &str = "\
INSERT INTO user_notifications (id, user_id, notification_id, is_read, read_at, \
is_deleted, created_at) \
VALUES ($1, $2, $3, $4, $5, $6, $7) \
ON CONFLICT (id) DO UPDATE SET \
is_read = EXCLUDED.is_read, read_at = EXCLUDED.read_at";

pub async fn upsert_user_notification<'e>(
    ex: impl PgExecutor<'e>,
    row: &UserNotificationRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_USER_NOTIFICATION_SQL)
        .bind(row.id)
        .bind(row.user_id)
        .bind(row.notification_id)
        .bind(row.is_read)
        .bind(row.read_at)
        .bind(row.is_deleted)
        .bind(row.created_at)
        .execute(ex)
        .await?;
    Ok(())
}

pub const UPSERT_COMMENT_SQL: &str = "\
INSERT INTO comments (id, property_id, announcement_id, author_id, title, text, rating, \
is_approved, is_deleted, created_at) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
ON CONFLICT (id) DO UPDATE SET \
title = EXCLUDED.title, text = EXCLUDED.text, rating = EXCLUDED.rating, \
is_approved = EXCLUDED.is_approved";

pub async fn upsert_comment<'e>(
    ex: impl PgExecutor<'e>,
    row: &CommentRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_COMMENT_SQL)
        .bind(row.id)
        .bind(row.property_id)
        .bind(row.announcement_id)
        .bind(row.author_id)
        .bind(row.title.as_deref())
        .bind(row.text.as_deref())
        .bind(row.rating)
        .bind(row.is_approved)
        .bind(row.is_deleted)
        .bind(row.created_at)
        .execute(ex)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_UPSERTS: [&str; 9] = [
        UPSERT_USER_SQL,
        UPSERT_DEVICE_SQL,
        UPSERT_PROPERTY_SQL,
        UPSERT_ANNOUNCEMENT_SQL,
        UPSERT_RENTAL_REQUEST_SQL,
        UPSERT_CONTRACT_SQL,
        UPSERT_NOTIFICATION_SQL,
        UPSERT_USER_NOTIFICATION_SQL,
        UPSERT_COMMENT_SQL,
    ];

    fn update_clause(sql: &str) -> &str {
        sql.split("DO UPDATE SET")
            .nth(1)
            .expect("upsert has an update clause")
    }

    #[test]
    fn every_upsert_merges_on_the_source_id() {
        for sql in ALL_UPSERTS {
            assert!(sql.contains("ON CONFLICT (id) DO UPDATE SET"), "{sql}");
        }
    }

    #[test]
    fn update_clauses_never_touch_created_at() {
        for sql in ALL_UPSERTS {
            assert!(!update_clause(sql).contains("created_at"), "{sql}");
        }
    }

    #[test]
    fn immutable_linkage_stays_out_of_update_clauses() {
        assert!(!update_clause(UPSERT_USER_SQL).contains("date_joined"));
        assert!(!update_clause(UPSERT_ANNOUNCEMENT_SQL).contains("property_id"));
        assert!(!update_clause(UPSERT_ANNOUNCEMENT_SQL).contains("user_id"));
        assert!(!update_clause(UPSERT_RENTAL_REQUEST_SQL).contains("sender_id"));
        assert!(!update_clause(UPSERT_CONTRACT_SQL).contains("tenant_id"));
        assert!(!update_clause(UPSERT_USER_NOTIFICATION_SQL).contains("notification_id"));
    }

    #[test]
    fn announcement_updates_refresh_the_mutable_subset() {
        let clause = update_clause(UPSERT_ANNOUNCEMENT_SQL);
        for column in ["price", "moderated_status", "views", "phone_views", "is_available"] {
            assert!(clause.contains(column), "missing {column}");
        }
    }

    #[test]
    fn ssl_mode_parsing_accepts_the_usual_names() {
        assert!(matches!(parse_ssl_mode("disable"), PgSslMode::Disable));
        assert!(matches!(parse_ssl_mode("Prefer"), PgSslMode::Prefer));
        assert!(matches!(parse_ssl_mode("verify-full"), PgSslMode::VerifyFull));
        // managed targets expect TLS, so unknown values stay strict
        assert!(matches!(parse_ssl_mode("whatever"), PgSslMode::Require));
    }

    #[test]
    fn port_parsing_rejects_garbage() {
        assert_eq!(parse_port("DB_PORT", "5432").unwrap(), 5432);
        assert_eq!(parse_port("DB_PORT", " 5401 ").unwrap(), 5401);
        assert!(parse_port("DB_PORT", "fivefour").is_err());
        assert!(parse_port("DB_PORT", "70000").is_err());
    }

    #[test]
    fn schema_ddl_is_create_if_not_exists_only() {
        assert!(!SCHEMA_DDL.contains("DROP"));
        assert!(!SCHEMA_DDL.contains("TRUNCATE"));
        for entity in rma_core::Entity::SYNC_ORDER {
            let fragment = format!("CREATE TABLE IF NOT EXISTS {} (", entity.target_table());
            assert!(SCHEMA_DDL.contains(&fragment), "missing {entity}");
        }
        assert!(SCHEMA_DDL.contains("CREATE TABLE IF NOT EXISTS sync_runs ("));
    }
}
