use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    ReadEvent,
    BookEvent,
    CancelBooking,
    ViewBookings,
    ManageUsers,
    ViewAnalytics,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CreateEvent => "create_event",
            Permission::UpdateEvent => "update_event",
            Permission::DeleteEvent => "delete_event",
            Permission::ReadEvent => "read_event",
            Permission::BookEvent => "book_event",
            Permission::CancelBooking => "cancel_booking",
            Permission::ViewBookings => "view_bookings",
            Permission::ManageUsers => "manage_users",
            Permission::ViewAnalytics => "view_analytics",
        }
    }
}

impl Role {
    pub fn has_permission(&self, permission: Permission) -> bool {
        match self {
            Role::Admin => true,
            Role::User => matches!(
                permission,
                Permission::ReadEvent
                    | Permission::BookEvent
                    | Permission::CancelBooking
                    | Permission::ViewBookings
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub gender: Gender,
    pub age: i32,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Account fields before the user is stored. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub gender: Gender,
    pub age: i32,
    pub role: Role,
}

impl NewUser {
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash: self.password_hash,
            gender: self.gender,
            age: self.age,
            role: self.role,
            is_active: true,
            last_login: None,
            created_at: now,
        }
    }
}
