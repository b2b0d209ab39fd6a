//! Core domain records and entity catalog for RMA.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "rma-core";

/// One logical record type copied end-to-end by the sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Users,
    Devices,
    Properties,
    Announcements,
    RentalRequests,
    Contracts,
    Notifications,
    UserNotifications,
    Comments,
}

impl Entity {
    /// Processing order for a sync run: every entity comes after the
    /// entities it references, so declared foreign keys on the analytics
    /// side never see a forward reference.
    pub const SYNC_ORDER: [Entity; 9] = [
        Entity::Users,
        Entity::Devices,
        Entity::Properties,
        Entity::Announcements,
        Entity::RentalRequests,
        Entity::Contracts,
        Entity::Notifications,
        Entity::UserNotifications,
        Entity::Comments,
    ];

    /// Table name in the analytics database.
    pub fn target_table(self) -> &'static str {
        match self {
            Entity::Users => "users",
            Entity::Devices => "devices",
            Entity::Properties => "properties",
            Entity::Announcements => "announcements",
            Entity::RentalRequests => "rental_requests",
            Entity::Contracts => "contracts",
            Entity::Notifications => "notifications",
            Entity::UserNotifications => "user_notifications",
            Entity::Comments => "comments",
        }
    }

    /// Historical table name in the production database. `"user"` is a
    /// reserved word there and must stay quoted.
    pub fn source_table(self) -> &'static str {
        match self {
            Entity::Users => "\"user\"",
            Entity::Devices => "user_device",
            Entity::Properties => "properties",
            Entity::Announcements => "property_announcements",
            Entity::RentalRequests => "property_rentalrequest",
            Entity::Contracts => "contract",
            Entity::Notifications => "notification",
            Entity::UserNotifications => "user_notification",
            Entity::Comments => "comment",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target_table())
    }
}

/// Platform user. The id is assigned by the production database and is
/// preserved verbatim so foreign references stay valid across systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
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
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub is_identified: bool,
}

/// Push-capable device registered by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
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

/// Rentable property. `title` is the multilingual `{lang: text}` mapping
/// serialized to opaque JSON text; an absent or empty source title is NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    pub title: Option<String>,
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

/// Public listing for a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    pub property_id: Option<i64>,
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub moderated_status: Option<String>,
    pub views: Option<i32>,
    pub phone_views: Option<i32>,
    pub is_available: bool,
    pub is_moderated: bool,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalRequestRecord {
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: i64,
    pub rental_request_id: Option<i64>,
    pub property_id: Option<i64>,
    pub tenant_id: Option<i64>,
    pub homeowner_id: Option<i64>,
    pub status: Option<String>,
    pub price: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub contract_type: Option<String>,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Broadcast notification template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub send_to_all: bool,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Join entity: delivery of a notification to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNotificationRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    pub notification_id: Option<i64>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn position(entity: Entity) -> usize {
        Entity::SYNC_ORDER
            .iter()
            .position(|&e| e == entity)
            .expect("entity present in sync order")
    }

    #[test]
    fn sync_order_covers_every_entity_once() {
        assert_eq!(Entity::SYNC_ORDER.len(), 9);
        for (i, a) in Entity::SYNC_ORDER.iter().enumerate() {
            for b in &Entity::SYNC_ORDER[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn referenced_entities_come_before_referencing_ones() {
        assert_eq!(position(Entity::Users), 0);
        assert!(position(Entity::Properties) < position(Entity::Announcements));
        assert!(position(Entity::Announcements) < position(Entity::RentalRequests));
        assert!(position(Entity::RentalRequests) < position(Entity::Contracts));
        assert!(position(Entity::Notifications) < position(Entity::UserNotifications));
        assert!(position(Entity::Announcements) < position(Entity::Comments));
    }

    #[test]
    fn user_source_table_stays_quoted() {
        assert_eq!(Entity::Users.source_table(), "\"user\"");
        assert_eq!(Entity::Users.target_table(), "users");
        assert_eq!(Entity::RentalRequests.source_table(), "property_rentalrequest");
    }
}
