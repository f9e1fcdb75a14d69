//! Booking checkout and status lifecycle.

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::cart::{BookingCart, CartSlot};
use crate::error::AppError;
use crate::models::{timestamp_now, Booking, BookingCartItem, BookingRow, BookingStatus, Identity};
use crate::notifier::{self, BookingEvent, Notifier};

#[derive(Debug, Clone, Deserialize)]
pub struct Checkout {
    pub event_date: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutReceipt {
    pub booking: Booking,
    /// Whether the studio notification went out. The booking stands either way.
    pub notified: bool,
    /// The caller's bookings after checkout, newest first.
    pub bookings: Vec<Booking>,
}

#[derive(Clone)]
pub struct BookingManager {
    db: SqlitePool,
    notifier: Arc<dyn Notifier>,
}

fn newest_first(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn decode_all(rows: Vec<BookingRow>) -> Result<Vec<Booking>, AppError> {
    let mut bookings = rows
        .into_iter()
        .map(Booking::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    newest_first(&mut bookings);
    Ok(bookings)
}

impl BookingManager {
    pub fn new(db: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Persist the cart as a pending booking for `actor`.
    ///
    /// The cart is cleared only after the booking is stored. Notification
    /// happens after the insert and cannot fail the checkout.
    pub async fn create_booking<S: CartSlot<BookingCartItem>>(
        &self,
        actor: Option<&Identity>,
        cart: &mut BookingCart<S>,
        checkout: Checkout,
    ) -> Result<CheckoutReceipt, AppError> {
        let actor = actor.ok_or(AppError::AuthRequired)?;
        if cart.is_empty() {
            return Err(AppError::validation("booking cart is empty"));
        }
        let event_date = checkout.event_date.trim();
        NaiveDate::parse_from_str(event_date, "%Y-%m-%d")
            .map_err(|_| AppError::validation("event date must be YYYY-MM-DD"))?;

        let now = timestamp_now();
        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            items: cart.items().to_vec(),
            total_amount: cart.total(),
            event_date: event_date.to_string(),
            user_phone: checkout.phone.trim().to_string(),
            status: BookingStatus::Pending,
            rejection_reason: None,
            user_id: actor.id.clone(),
            user_email: actor.email.clone(),
            user_name: actor.name.clone(),
            created_at: now.clone(),
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO bookings (id, items, total_amount, event_date, user_phone, status, rejection_reason, user_id, user_email, user_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&booking.id)
        .bind(serde_json::to_string(&booking.items)?)
        .bind(booking.total_amount)
        .bind(&booking.event_date)
        .bind(&booking.user_phone)
        .bind(booking.status)
        .bind(&booking.user_id)
        .bind(&booking.user_email)
        .bind(&booking.user_name)
        .bind(&booking.created_at)
        .bind(&booking.updated_at)
        .execute(&self.db)
        .await
        .inspect_err(|e| tracing::error!(user_id = %actor.id, error = %e, "failed to create booking"))?;

        tracing::info!(booking_id = %booking.id, total_amount = booking.total_amount, "booking created");

        let notified = notifier::dispatch(self.notifier.as_ref(), BookingEvent::Created(&booking)).await;

        if let Err(e) = cart.clear().await {
            tracing::error!(booking_id = %booking.id, error = %e, "booking stored but cart could not be cleared");
        }

        // the booking is committed; a failed refresh must not read as a failed checkout
        let bookings = self
            .fetch_user_bookings(actor)
            .await
            .unwrap_or_else(|_| vec![booking.clone()]);
        Ok(CheckoutReceipt {
            booking,
            notified,
            bookings,
        })
    }

    pub async fn fetch_user_bookings(&self, actor: &Identity) -> Result<Vec<Booking>, AppError> {
        // filtered without ORDER BY; sorted here so no compound index is needed
        let rows: Vec<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE user_id = ?")
            .bind(&actor.id)
            .fetch_all(&self.db)
            .await
            .inspect_err(|e| tracing::error!(user_id = %actor.id, error = %e, "failed to fetch bookings"))?;
        decode_all(rows)
    }

    pub async fn fetch_all_bookings(&self) -> Result<Vec<Booking>, AppError> {
        let rows: Vec<BookingRow> = sqlx::query_as("SELECT * FROM bookings")
            .fetch_all(&self.db)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to fetch all bookings"))?;
        decode_all(rows)
    }

    async fn find(&self, booking_id: &str) -> Result<Booking, AppError> {
        let row: Option<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE id = ?")
            .bind(booking_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(Booking::try_from(row.ok_or(AppError::NotFound)?)?)
    }

    /// Move a pending booking to `confirmed` or `rejected`. Rejections need a
    /// reason. Confirmed and rejected bookings never change again.
    ///
    /// Callers are trusted to be administrators.
    pub async fn update_booking_status(
        &self,
        booking_id: &str,
        new_status: BookingStatus,
        reason: Option<&str>,
    ) -> Result<Booking, AppError> {
        let current = self.find(booking_id).await?;
        if !current.status.can_become(new_status) {
            return Err(AppError::InvalidTransition {
                from: current.status,
                to: new_status,
            });
        }

        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        let rejection_reason = match new_status {
            BookingStatus::Rejected => Some(
                reason.ok_or_else(|| AppError::validation("a rejection reason is required"))?,
            ),
            _ => None,
        };

        let result = sqlx::query(
            "UPDATE bookings SET status = ?, rejection_reason = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(new_status)
        .bind(rejection_reason)
        .bind(timestamp_now())
        .bind(booking_id)
        .bind(BookingStatus::Pending)
        .execute(&self.db)
        .await
        .inspect_err(|e| tracing::error!(booking_id, error = %e, "failed to update booking status"))?;

        let updated = self.find(booking_id).await?;
        if result.rows_affected() == 0 {
            // another administrator got there first
            return Err(AppError::InvalidTransition {
                from: updated.status,
                to: new_status,
            });
        }

        tracing::info!(booking_id, status = %new_status, "booking status updated");

        notifier::dispatch(
            self.notifier.as_ref(),
            BookingEvent::StatusChanged {
                booking: &updated,
                status: new_status,
                reason,
            },
        )
        .await;

        Ok(updated)
    }
}
