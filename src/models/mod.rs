pub mod booking;
pub mod gallery;
pub mod product;
pub mod user;

pub use booking::{AddonChoice, Booking, BookingCartItem, BookingRow, BookingStatus, TierChoice};
pub use gallery::{FavoriteList, FavoriteQuota, Gallery, GalleryImage, GalleryRow, ImageView};
pub use product::{parse_price_cents, Product, ProductCategory};
pub use user::{Identity, User};

use chrono::{SecondsFormat, Utc};

/// Current UTC time as RFC 3339 with fixed microsecond precision, so stored
/// timestamps order correctly as plain strings.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
