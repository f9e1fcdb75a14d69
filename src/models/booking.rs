use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum BookingStatus {
    #[serde(rename = "pending")]
    #[sqlx(rename = "pending")]
    Pending,
    #[serde(rename = "confirmed")]
    #[sqlx(rename = "confirmed")]
    Confirmed,
    #[serde(rename = "rejected")]
    #[sqlx(rename = "rejected")]
    Rejected,
}

impl BookingStatus {
    /// Only pending bookings move, and only to a terminal state.
    pub fn can_become(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Rejected)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// The pricing tier chosen for a package, copied from the catalog at add time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChoice {
    pub id: String,
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonChoice {
    pub id: String,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCartItem {
    pub cart_id: String,
    pub package_id: String,
    pub package_title: String,
    pub tier: TierChoice,
    pub addons: Vec<AddonChoice>,
    pub total_price: i64,
}

impl BookingCartItem {
    /// Prices a tier plus add-ons. `cart_id` stays empty until the cart assigns one.
    pub fn priced(
        package_id: String,
        package_title: String,
        tier: TierChoice,
        addons: Vec<AddonChoice>,
    ) -> Self {
        let total_price = tier.price + addons.iter().map(|a| a.price).sum::<i64>();
        Self {
            cart_id: String::new(),
            package_id,
            package_title,
            tier,
            addons,
            total_price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub items: Vec<BookingCartItem>,
    pub total_amount: i64,
    pub event_date: String,
    pub user_phone: String,
    pub status: BookingStatus,
    pub rejection_reason: Option<String>,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Booking as stored: `items` is a JSON column, validated when read back.
#[derive(Debug, FromRow)]
pub struct BookingRow {
    pub id: String,
    pub items: String,
    pub total_amount: i64,
    pub event_date: String,
    pub user_phone: String,
    pub status: BookingStatus,
    pub rejection_reason: Option<String>,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<BookingRow> for Booking {
    type Error = serde_json::Error;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            items: serde_json::from_str(&row.items)?,
            total_amount: row.total_amount,
            event_date: row.event_date,
            user_phone: row.user_phone,
            status: row.status,
            rejection_reason: row.rejection_reason,
            user_id: row.user_id,
            user_email: row.user_email,
            user_name: row.user_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
