//! Production -> analytics Postgres sync pipeline for RMA.
//!
//! One run copies every entity table in topological order inside a single
//! target transaction: extract (schema-tolerant), transform (pure), upsert
//! (keyed by the source id). Re-running against an unchanged source is a
//! no-op on the target.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rma_core::{
    AnnouncementRecord, CommentRecord, ContractRecord, DeviceRecord, Entity, NotificationRecord,
    PropertyRecord, RentalRequestRecord, UserNotificationRecord, UserRecord,
};
use rma_storage as storage;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::{Connection, PgConnection, Postgres, Transaction};
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "rma-sync";

/// Which database an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Source => "source",
            Side::Target => "target",
        })
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source database is not configured; set SOURCE_DB_HOST and friends")]
    SourceConfigMissing,
    #[error(transparent)]
    Settings(#[from] storage::SettingsError),
    #[error("connecting to {side} database: {source}")]
    Connect {
        side: Side,
        #[source]
        source: sqlx::Error,
    },
    #[error("creating analytics schema: {0}")]
    Schema(#[source] sqlx::Error),
    #[error("another sync run holds the target lock")]
    SyncInProgress,
    #[error("extracting {entity}: {source}")]
    Extract {
        entity: Entity,
        #[source]
        source: sqlx::Error,
    },
    #[error("upserting {entity} id {id}: {source}")]
    Upsert {
        entity: Entity,
        id: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("target transaction: {0}")]
    Transaction(#[source] sqlx::Error),
}

// ---------------------------------------------------------------------------
// Source rows
//
// Typed mirrors of the production SELECT lists. Column renames (the ORM
// `_id_id` suffix) happen in the SQL alias so every query variant decodes
// into the same struct.

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSourceRow {
    pub id: i64,
    pub phone_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub date_joined: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub birth_date: Option<chrono::NaiveDate>,
    pub gender: Option<String>,
    pub is_identified: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeviceSourceRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub status: Option<String>,
    pub device_id: Option<String>,
    pub fcm_token: Option<String>,
    pub name: Option<String>,
    pub device_type: Option<String>,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PropertySourceRow {
    pub id: i64,
    pub user_id: Option<i64>,
    /// Multilingual `{lang: text}` mapping, passed through as whatever JSON
    /// the source returns; serialization is the transformer's job.
    pub title: Option<JsonValue>,
    #[sqlx(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub area: Option<f64>,
    pub address: Option<String>,
    pub n_rooms: Option<i32>,
    pub floor: Option<i32>,
    pub is_rentable: bool,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnnouncementSourceRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub property_id: Option<i64>,
    pub title: Option<JsonValue>,
    pub price: Option<rust_decimal::Decimal>,
    pub currency: Option<String>,
    pub moderated_status: Option<String>,
    pub views: Option<i32>,
    pub phone_views: Option<i32>,
    pub is_available: bool,
    pub is_moderated: bool,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RentalRequestSourceRow {
    pub id: i64,
    pub property_id: Option<i64>,
    pub announcement_id: Option<i64>,
    pub user_id: Option<i64>,
    pub sender_id: Option<i64>,
    pub status: Option<String>,
    pub text: Option<String>,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContractSourceRow {
    pub id: i64,
    pub rental_request_id: Option<i64>,
    pub property_id: Option<i64>,
    pub tenant_id: Option<i64>,
    pub homeowner_id: Option<i64>,
    pub status: Option<String>,
    pub price: Option<rust_decimal::Decimal>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    pub contract_type: Option<String>,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationSourceRow {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub send_to_all: bool,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserNotificationSourceRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub notification_id: Option<i64>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentSourceRow {
    pub id: i64,
    pub property_id: Option<i64>,
    pub announcement_id: Option<i64>,
    pub author_id: Option<i64>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub rating: Option<i32>,
    pub is_approved: bool,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Reader
//
// Fixed column lists against the historical table names, always excluding
// soft-deleted rows. ORDER BY id keeps runs deterministic.

const EXTRACT_USERS_SQL: &str = "\
SELECT id, phone_number, first_name, last_name, role, is_active, is_deleted, \
date_joined, last_login, created_at, birth_date, gender, is_identified \
FROM \"user\" WHERE is_deleted = false ORDER BY id";

const EXTRACT_DEVICES_SQL: &str = "\
SELECT id, user_id, status, device_id, fcm_token, name, device_type, is_deleted, \
created_at, last_synced_at \
FROM user_device WHERE is_deleted = false ORDER BY id";

const EXTRACT_PROPERTIES_SQL: &str = "\
SELECT id, user_id, title, type, status, area, address, n_rooms, floor, is_rentable, \
is_deleted, created_at \
FROM properties WHERE is_deleted = false ORDER BY id";

const EXTRACT_ANNOUNCEMENTS_SQL: &str = "\
SELECT id, user_id, property_id, title, price, currency, moderated_status, views, \
phone_views, is_available, is_moderated, is_deleted, created_at \
FROM property_announcements WHERE is_deleted = false ORDER BY id";

/// Newer ORM schemas store the requester/sender links with a doubled `_id`
/// suffix; older ones use the plain names. Try the suffixed form first.
const EXTRACT_RENTAL_REQUESTS_SUFFIXED_SQL: &str = "\
SELECT id, property_id, announcement_id, user_id_id AS user_id, \
sender_id_id AS sender_id, status, text, is_deleted, created_at \
FROM property_rentalrequest WHERE is_deleted = false ORDER BY id";

const EXTRACT_RENTAL_REQUESTS_PLAIN_SQL: &str = "\
SELECT id, property_id, announcement_id, user_id, sender_id, status, text, \
is_deleted, created_at \
FROM property_rentalrequest WHERE is_deleted = false ORDER BY id";

const EXTRACT_CONTRACTS_SQL: &str = "\
SELECT id, rental_request_id, property_id, tenant_id, homeowner_id, status, price, \
start_date, end_date, contract_type, is_deleted, created_at \
FROM contract WHERE is_deleted = false ORDER BY id";

const EXTRACT_NOTIFICATIONS_SQL: &str = "\
SELECT id, title, description, send_to_all, is_sent, sent_at, is_deleted, created_at \
FROM notification WHERE is_deleted = false ORDER BY id";

const EXTRACT_USER_NOTIFICATIONS_SQL: &str = "\
SELECT id, user_id, notification_id, is_read, read_at, is_deleted, created_at \
FROM user_notification WHERE is_deleted = false ORDER BY id";

const EXTRACT_COMMENTS_SQL: &str = "\
SELECT id, property_id, announcement_id, author_id, title, text, rating, is_approved, \
is_deleted, created_at \
FROM comment WHERE is_deleted = false ORDER BY id";

pub async fn extract_users(conn: &mut PgConnection) -> Result<Vec<UserSourceRow>, sqlx::Error> {
    sqlx::query_as(EXTRACT_USERS_SQL).fetch_all(&mut *conn).await
}

pub async fn extract_devices(conn: &mut PgConnection) -> Result<Vec<DeviceSourceRow>, sqlx::Error> {
    sqlx::query_as(EXTRACT_DEVICES_SQL).fetch_all(&mut *conn).await
}

pub async fn extract_properties(
    conn: &mut PgConnection,
) -> Result<Vec<PropertySourceRow>, sqlx::Error> {
    sqlx::query_as(EXTRACT_PROPERTIES_SQL).fetch_all(&mut *conn).await
}

pub async fn extract_announcements(
    conn: &mut PgConnection,
) -> Result<Vec<AnnouncementSourceRow>, sqlx::Error> {
    sqlx::query_as(EXTRACT_ANNOUNCEMENTS_SQL).fetch_all(&mut *conn).await
}

/// Outcome of one schema-variant extraction attempt.
#[derive(Debug)]
pub enum ColumnFallback<T> {
    Rows(Vec<T>),
    ColumnNotFound,
}

/// Postgres SQLSTATE for "undefined column".
pub fn is_undefined_column(code: Option<&str>) -> bool {
    code == Some("42703")
}

/// Run the suffixed-column query inside its own source-side transaction so
/// a failed attempt never leaks an aborted transaction into later
/// statements on the same connection.
async fn try_extract_rental_requests_suffixed(
    conn: &mut PgConnection,
) -> Result<ColumnFallback<RentalRequestSourceRow>, sqlx::Error> {
    let mut tx = conn.begin().await?;
    match sqlx::query_as(EXTRACT_RENTAL_REQUESTS_SUFFIXED_SQL)
        .fetch_all(&mut *tx)
        .await
    {
        Ok(rows) => {
            tx.commit().await?;
            Ok(ColumnFallback::Rows(rows))
        }
        Err(err) => {
            tx.rollback().await?;
            let code = err.as_database_error().and_then(|db| db.code());
            if is_undefined_column(code.as_deref()) {
                Ok(ColumnFallback::ColumnNotFound)
            } else {
                Err(err)
            }
        }
    }
}

pub async fn extract_rental_requests(
    conn: &mut PgConnection,
) -> Result<Vec<RentalRequestSourceRow>, sqlx::Error> {
    match try_extract_rental_requests_suffixed(conn).await? {
        ColumnFallback::Rows(rows) => Ok(rows),
        ColumnFallback::ColumnNotFound => {
            warn!("rental request link columns are unsuffixed, retrying with user_id/sender_id");
            sqlx::query_as(EXTRACT_RENTAL_REQUESTS_PLAIN_SQL)
                .fetch_all(&mut *conn)
                .await
        }
    }
}

pub async fn extract_contracts(
    conn: &mut PgConnection,
) -> Result<Vec<ContractSourceRow>, sqlx::Error> {
    sqlx::query_as(EXTRACT_CONTRACTS_SQL).fetch_all(&mut *conn).await
}

pub async fn extract_notifications(
    conn: &mut PgConnection,
) -> Result<Vec<NotificationSourceRow>, sqlx::Error> {
    sqlx::query_as(EXTRACT_NOTIFICATIONS_SQL).fetch_all(&mut *conn).await
}

pub async fn extract_user_notifications(
    conn: &mut PgConnection,
) -> Result<Vec<UserNotificationSourceRow>, sqlx::Error> {
    sqlx::query_as(EXTRACT_USER_NOTIFICATIONS_SQL)
        .fetch_all(&mut *conn)
        .await
}

pub async fn extract_comments(
    conn: &mut PgConnection,
) -> Result<Vec<CommentSourceRow>, sqlx::Error> {
    sqlx::query_as(EXTRACT_COMMENTS_SQL).fetch_all(&mut *conn).await
}

// ---------------------------------------------------------------------------
// Transformer
//
// Pure per-row mappings. Scalars pass through unchanged; nothing here
// invents a business default for a missing value.

/// Serialize a multilingual title to opaque JSON text. Absent and empty
/// values become NULL, never `"{}"`, so "no title" and "empty title" stay
/// distinguishable downstream.
pub fn title_text(title: Option<JsonValue>) -> Option<String> {
    match title {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::Object(map)) if map.is_empty() => None,
        Some(value) => Some(value.to_string()),
    }
}

pub fn transform_user(row: UserSourceRow) -> UserRecord {
    UserRecord {
        id: row.id,
        phone_number: row.phone_number,
        first_name: row.first_name,
        last_name: row.last_name,
        role: row.role,
        is_active: row.is_active,
        is_deleted: row.is_deleted,
        date_joined: row.date_joined,
        last_login: row.last_login,
        created_at: row.created_at,
        birth_date: row.birth_date,
        gender: row.gender,
        is_identified: row.is_identified,
    }
}

pub fn transform_device(row: DeviceSourceRow) -> DeviceRecord {
    DeviceRecord {
        id: row.id,
        user_id: row.user_id,
        status: row.status,
        device_id: row.device_id,
        fcm_token: row.fcm_token,
        name: row.name,
        device_type: row.device_type,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
        last_synced_at: row.last_synced_at,
    }
}

pub fn transform_property(row: PropertySourceRow) -> PropertyRecord {
    PropertyRecord {
        id: row.id,
        user_id: row.user_id,
        title: title_text(row.title),
        kind: row.kind,
        status: row.status,
        area: row.area,
        address: row.address,
        n_rooms: row.n_rooms,
        floor: row.floor,
        is_rentable: row.is_rentable,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
    }
}

pub fn transform_announcement(row: AnnouncementSourceRow) -> AnnouncementRecord {
    AnnouncementRecord {
        id: row.id,
        user_id: row.user_id,
        property_id: row.property_id,
        title: title_text(row.title),
        price: row.price,
        currency: row.currency,
        moderated_status: row.moderated_status,
        views: row.views,
        phone_views: row.phone_views,
        is_available: row.is_available,
        is_moderated: row.is_moderated,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
    }
}

pub fn transform_rental_request(row: RentalRequestSourceRow) -> RentalRequestRecord {
    RentalRequestRecord {
        id: row.id,
        property_id: row.property_id,
        announcement_id: row.announcement_id,
        user_id: row.user_id,
        sender_id: row.sender_id,
        status: row.status,
        text: row.text,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
    }
}

pub fn transform_contract(row: ContractSourceRow) -> ContractRecord {
    ContractRecord {
        id: row.id,
        rental_request_id: row.rental_request_id,
        property_id: row.property_id,
        tenant_id: row.tenant_id,
        homeowner_id: row.homeowner_id,
        status: row.status,
        price: row.price,
        start_date: row.start_date,
        end_date: row.end_date,
        contract_type: row.contract_type,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
    }
}

pub fn transform_notification(row: NotificationSourceRow) -> NotificationRecord {
    NotificationRecord {
        id: row.id,
        title: row.title,
        description: row.description,
        send_to_all: row.send_to_all,
        is_sent: row.is_sent,
        sent_at: row.sent_at,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
    }
}

pub fn transform_user_notification(row: UserNotificationSourceRow) -> UserNotificationRecord {
    UserNotificationRecord {
        id: row.id,
        user_id: row.user_id,
        notification_id: row.notification_id,
        is_read: row.is_read,
        read_at: row.read_at,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
    }
}

pub fn transform_comment(row: CommentSourceRow) -> CommentRecord {
    CommentRecord {
        id: row.id,
        property_id: row.property_id,
        announcement_id: row.announcement_id,
        author_id: row.author_id,
        title: row.title,
        text: row.text,
        rating: row.rating,
        is_approved: row.is_approved,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
    }
}

// ---------------------------------------------------------------------------
// Orchestrator

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: BTreeMap<String, u64>,
    pub total: u64,
}

impl SyncReport {
    /// The external success contract: `{entity: rows, ...}` and nothing else.
    pub fn counts_json(&self) -> serde_json::Value {
        serde_json::json!(self.counts)
    }
}

/// The external failure contract: `{"error": message}` and nothing else.
pub fn error_json(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

pub struct SyncRunner {
    settings: storage::SyncSettings,
}

impl SyncRunner {
    pub fn new(settings: storage::SyncSettings) -> Self {
        Self { settings }
    }

    /// Run one full sync. All entities commit together or not at all; the
    /// target is never left reflecting only some entities' latest data.
    pub async fn run_once(&self) -> Result<SyncReport, SyncError> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let source_config = self
            .settings
            .source
            .as_ref()
            .ok_or(SyncError::SourceConfigMissing)?;

        info!(%run_id, "sync run starting");
        let mut source_conn = storage::connect(source_config)
            .await
            .map_err(|err| SyncError::Connect {
                side: Side::Source,
                source: err,
            })?;
        let mut target_conn = match storage::connect(&self.settings.target).await {
            Ok(conn) => conn,
            Err(err) => {
                let _ = source_conn.close().await;
                return Err(SyncError::Connect {
                    side: Side::Target,
                    source: err,
                });
            }
        };

        let outcome = sync_with(&mut source_conn, &mut target_conn, run_id, started_at).await;

        // both connections are released on every exit path
        if let Err(err) = source_conn.close().await {
            warn!(error = %err, "closing source connection");
        }
        if let Err(err) = target_conn.close().await {
            warn!(error = %err, "closing target connection");
        }
        outcome
    }
}

async fn sync_with(
    source: &mut PgConnection,
    target: &mut PgConnection,
    run_id: Uuid,
    started_at: DateTime<Utc>,
) -> Result<SyncReport, SyncError> {
    storage::ensure_schema(target).await.map_err(SyncError::Schema)?;

    if !storage::try_acquire_run_lock(target)
        .await
        .map_err(SyncError::Transaction)?
    {
        return Err(SyncError::SyncInProgress);
    }

    let outcome = copy_all(source, target).await;

    if let Err(err) = storage::release_run_lock(target).await {
        warn!(error = %err, "releasing sync run lock");
    }

    let finished_at = Utc::now();
    match outcome {
        Ok(counts) => {
            let total: u64 = counts.values().sum();
            let report = SyncReport {
                run_id,
                started_at,
                finished_at,
                counts,
                total,
            };
            log_run(
                target,
                &storage::SyncRunLog {
                    run_id,
                    started_at,
                    finished_at,
                    status: "completed".to_string(),
                    records_synced: total as i64,
                    error_message: None,
                },
            )
            .await;
            info!(%run_id, total, "sync run committed");
            Ok(report)
        }
        Err(err) => {
            log_run(
                target,
                &storage::SyncRunLog {
                    run_id,
                    started_at,
                    finished_at,
                    status: "failed".to_string(),
                    records_synced: 0,
                    error_message: Some(err.to_string()),
                },
            )
            .await;
            error!(%run_id, error = %err, "sync run aborted");
            Err(err)
        }
    }
}

/// Audit only; a logging failure never fails the run.
async fn log_run(target: &mut PgConnection, log: &storage::SyncRunLog) {
    if let Err(err) = storage::record_sync_run(target, log).await {
        warn!(error = %err, "recording sync run");
    }
}

async fn copy_all(
    source: &mut PgConnection,
    target: &mut PgConnection,
) -> Result<BTreeMap<String, u64>, SyncError> {
    let mut tx = target.begin().await.map_err(SyncError::Transaction)?;
    match copy_entities(source, &mut tx).await {
        Ok(counts) => {
            tx.commit().await.map_err(SyncError::Transaction)?;
            Ok(counts)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rolling back target transaction");
            }
            Err(err)
        }
    }
}

async fn copy_entities(
    source: &mut PgConnection,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<BTreeMap<String, u64>, SyncError> {
    let mut counts = BTreeMap::new();
    counts.insert(Entity::Users.to_string(), copy_users(source, tx).await?);
    counts.insert(Entity::Devices.to_string(), copy_devices(source, tx).await?);
    counts.insert(
        Entity::Properties.to_string(),
        copy_properties(source, tx).await?,
    );
    counts.insert(
        Entity::Announcements.to_string(),
        copy_announcements(source, tx).await?,
    );
    counts.insert(
        Entity::RentalRequests.to_string(),
        copy_rental_requests(source, tx).await?,
    );
    counts.insert(
        Entity::Contracts.to_string(),
        copy_contracts(source, tx).await?,
    );
    counts.insert(
        Entity::Notifications.to_string(),
        copy_notifications(source, tx).await?,
    );
    counts.insert(
        Entity::UserNotifications.to_string(),
        copy_user_notifications(source, tx).await?,
    );
    counts.insert(Entity::Comments.to_string(), copy_comments(source, tx).await?);
    Ok(counts)
}

macro_rules! copy_entity_fn {
    ($fn_name:ident, $entity:expr, $extract:ident, $transform:ident, $upsert:ident) => {
        async fn $fn_name(
            source: &mut PgConnection,
            tx: &mut Transaction<'_, Postgres>,
        ) -> Result<u64, SyncError> {
            let rows = $extract(source).await.map_err(|err| SyncError::Extract {
                entity: $entity,
                source: err,
            })?;
            let mut written = 0u64;
            for row in rows {
                let record = $transform(row);
                storage::$upsert(&mut **tx, &record)
                    .await
                    .map_err(|err| SyncError::Upsert {
                        entity: $entity,
                        id: record.id,
                        source: err,
                    })?;
                written += 1;
            }
            info!(entity = %$entity, rows = written, "entity synced");
            Ok(written)
        }
    };
}

copy_entity_fn!(copy_users, Entity::Users, extract_users, transform_user, upsert_user);
copy_entity_fn!(copy_devices, Entity::Devices, extract_devices, transform_device, upsert_device);
copy_entity_fn!(
    copy_properties,
    Entity::Properties,
    extract_properties,
    transform_property,
    upsert_property
);
copy_entity_fn!(
    copy_announcements,
    Entity::Announcements,
    extract_announcements,
    transform_announcement,
    upsert_announcement
);
copy_entity_fn!(
    copy_rental_requests,
    Entity::RentalRequests,
    extract_rental_requests,
    transform_rental_request,
    upsert_rental_request
);
copy_entity_fn!(
    copy_contracts,
    Entity::Contracts,
    extract_contracts,
    transform_contract,
    upsert_contract
);
copy_entity_fn!(
    copy_notifications,
    Entity::Notifications,
    extract_notifications,
    transform_notification,
    upsert_notification
);
copy_entity_fn!(
    copy_user_notifications,
    Entity::UserNotifications,
    extract_user_notifications,
    transform_user_notification,
    upsert_user_notification
);
copy_entity_fn!(
    copy_comments,
    Entity::Comments,
    extract_comments,
    transform_comment,
    upsert_comment
);

pub async fn run_sync_once_from_env() -> Result<SyncReport, SyncError> {
    let settings = storage::SyncSettings::from_env()?;
    SyncRunner::new(settings).run_once().await
}

// ---------------------------------------------------------------------------
// Scheduler

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub cron: String,
}

impl ScheduleConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("RMA_SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            cron: std::env::var("SYNC_CRON").unwrap_or_else(|_| "0 0 6 * * *".to_string()),
        }
    }
}

/// Build a cron scheduler that runs the full sync, or `None` when
/// scheduling is disabled. The caller owns starting and stopping it.
pub async fn maybe_build_scheduler(
    settings: storage::SyncSettings,
    schedule: &ScheduleConfig,
) -> anyhow::Result<Option<JobScheduler>> {
    if !schedule.enabled {
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let settings = Arc::new(settings);
    let cron = schedule.cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let settings = Arc::clone(&settings);
        Box::pin(async move {
            let runner = SyncRunner::new((*settings).clone());
            match runner.run_once().await {
                Ok(report) => {
                    info!(run_id = %report.run_id, total = report.total, "scheduled sync completed")
                }
                Err(err) => error!(error = %err, "scheduled sync failed"),
            }
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(Some(sched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn absent_and_empty_titles_stay_null() {
        assert_eq!(title_text(None), None);
        assert_eq!(title_text(Some(JsonValue::Null)), None);
        assert_eq!(title_text(Some(json!({}))), None);
    }

    #[test]
    fn present_titles_serialize_to_json_text() {
        let title = title_text(Some(json!({"uz": "Kvartira 1", "ru": "Квартира 1"})));
        let text = title.expect("title present");
        assert!(text.contains("\"uz\""));
        assert!(text.contains("Kvartira 1"));
    }

    #[test]
    fn undefined_column_code_is_the_only_fallback_trigger() {
        assert!(is_undefined_column(Some("42703")));
        assert!(!is_undefined_column(Some("42P01")));
        assert!(!is_undefined_column(Some("23503")));
        assert!(!is_undefined_column(None));
    }

    #[test]
    fn every_extraction_excludes_soft_deleted_rows() {
        for sql in [
            EXTRACT_USERS_SQL,
            EXTRACT_DEVICES_SQL,
            EXTRACT_PROPERTIES_SQL,
            EXTRACT_ANNOUNCEMENTS_SQL,
            EXTRACT_RENTAL_REQUESTS_SUFFIXED_SQL,
            EXTRACT_RENTAL_REQUESTS_PLAIN_SQL,
            EXTRACT_CONTRACTS_SQL,
            EXTRACT_NOTIFICATIONS_SQL,
            EXTRACT_USER_NOTIFICATIONS_SQL,
            EXTRACT_COMMENTS_SQL,
        ] {
            assert!(sql.contains("WHERE is_deleted = false"), "{sql}");
        }
    }

    #[test]
    fn suffixed_rental_request_query_aliases_to_plain_names() {
        assert!(EXTRACT_RENTAL_REQUESTS_SUFFIXED_SQL.contains("user_id_id AS user_id"));
        assert!(EXTRACT_RENTAL_REQUESTS_SUFFIXED_SQL.contains("sender_id_id AS sender_id"));
        assert!(!EXTRACT_RENTAL_REQUESTS_PLAIN_SQL.contains("_id_id"));
    }

    fn announcement_row() -> AnnouncementSourceRow {
        AnnouncementSourceRow {
            id: 7,
            user_id: Some(1),
            property_id: Some(3),
            title: Some(json!({"uz": "E'lon 7"})),
            price: Some(Decimal::from(500_000)),
            currency: Some("UZS".to_string()),
            moderated_status: Some("pending".to_string()),
            views: Some(42),
            phone_views: None,
            is_available: true,
            is_moderated: false,
            is_deleted: false,
            created_at: None,
        }
    }

    #[test]
    fn announcement_transform_passes_scalars_through() {
        let record = transform_announcement(announcement_row());
        assert_eq!(record.id, 7);
        assert_eq!(record.price, Some(Decimal::from(500_000)));
        assert_eq!(record.moderated_status.as_deref(), Some("pending"));
        assert!(record.title.expect("title").contains("E'lon 7"));
        // a missing counter stays missing, it does not become zero
        assert_eq!(record.phone_views, None);
    }

    #[test]
    fn missing_price_stays_null() {
        let mut row = announcement_row();
        row.price = None;
        row.title = None;
        let record = transform_announcement(row);
        assert_eq!(record.price, None);
        assert_eq!(record.title, None);
    }

    #[test]
    fn report_json_shapes_match_the_invocation_contract() {
        let mut counts = BTreeMap::new();
        counts.insert("users".to_string(), 2u64);
        counts.insert("properties".to_string(), 2u64);
        let report = SyncReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            total: 4,
            counts,
        };
        assert_eq!(report.counts_json(), json!({"users": 2, "properties": 2}));
        assert_eq!(
            error_json("connecting to source database: timed out"),
            json!({"error": "connecting to source database: timed out"})
        );
    }

    #[tokio::test]
    async fn disabled_schedule_builds_no_scheduler() {
        let settings = storage::SyncSettings {
            source: None,
            target: storage::DbConfig {
                host: "127.0.0.1".to_string(),
                port: 5432,
                dbname: "rentme_analytics".to_string(),
                user: "postgres".to_string(),
                password: String::new(),
                sslmode: None,
            },
        };
        let schedule = ScheduleConfig {
            enabled: false,
            cron: "0 0 6 * * *".to_string(),
        };
        let sched = maybe_build_scheduler(settings, &schedule)
            .await
            .expect("builder");
        assert!(sched.is_none());
    }

    #[test]
    fn schedule_defaults_to_disabled_daily() {
        let schedule = ScheduleConfig {
            enabled: false,
            cron: "0 0 6 * * *".to_string(),
        };
        assert!(!schedule.enabled);
        assert_eq!(schedule.cron.split_whitespace().count(), 6);
    }
}

