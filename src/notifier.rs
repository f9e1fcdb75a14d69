//! Booking notifications.
//!
//! Notifications run after the booking write has committed. A failed
//! notification is logged under the `notifications` target and otherwise
//! ignored; it never undoes the booking change.

use askama::Template;
use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{timestamp_now, Booking, BookingCartItem, BookingStatus};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_new_booking(&self, booking: &Booking) -> Result<(), AppError>;

    async fn notify_status_change(
        &self,
        booking: &Booking,
        status: BookingStatus,
        reason: Option<&str>,
    ) -> Result<(), AppError>;
}

pub enum BookingEvent<'a> {
    Created(&'a Booking),
    StatusChanged {
        booking: &'a Booking,
        status: BookingStatus,
        reason: Option<&'a str>,
    },
}

/// Post-commit hook: deliver the event, log on failure, report whether it went out.
pub async fn dispatch(notifier: &dyn Notifier, event: BookingEvent<'_>) -> bool {
    let (booking_id, result) = match event {
        BookingEvent::Created(booking) => {
            (&booking.id, notifier.notify_new_booking(booking).await)
        }
        BookingEvent::StatusChanged {
            booking,
            status,
            reason,
        } => (
            &booking.id,
            notifier.notify_status_change(booking, status, reason).await,
        ),
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(target: "notifications", booking_id = %booking_id, error = %e, "booking notification failed");
            false
        }
    }
}

#[derive(Template)]
#[template(path = "booking_created.txt")]
struct BookingCreatedEmail<'a> {
    user_name: &'a str,
    user_email: &'a str,
    phone: &'a str,
    event_date: &'a str,
    total_amount: i64,
    items: &'a [BookingCartItem],
}

#[derive(Template)]
#[template(path = "booking_status.txt")]
struct BookingStatusEmail<'a> {
    user_name: &'a str,
    created_at: &'a str,
    status: String,
    message: &'a str,
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

/// Renders notification emails and queues them in `outbound_emails` for the
/// mail relay to pick up.
#[derive(Clone)]
pub struct OutboxNotifier {
    db: SqlitePool,
    studio_email: String,
}

impl OutboxNotifier {
    pub fn new(db: SqlitePool, studio_email: String) -> Self {
        Self { db, studio_email }
    }

    async fn enqueue(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        booking_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO outbound_emails (id, recipient, subject, body, booking_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(recipient)
        .bind(subject)
        .bind(body)
        .bind(booking_id)
        .bind(timestamp_now())
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn notify_new_booking(&self, booking: &Booking) -> Result<(), AppError> {
        let body = BookingCreatedEmail {
            user_name: &booking.user_name,
            user_email: &booking.user_email,
            phone: or_placeholder(&booking.user_phone, "Not provided"),
            event_date: or_placeholder(&booking.event_date, "Not specified"),
            total_amount: booking.total_amount,
            items: &booking.items,
        }
        .render()?;
        let subject = format!("New Booking worth €{}", booking.total_amount);

        self.enqueue(&self.studio_email, &subject, &body, &booking.id)
            .await
    }

    async fn notify_status_change(
        &self,
        booking: &Booking,
        status: BookingStatus,
        reason: Option<&str>,
    ) -> Result<(), AppError> {
        let status = status.to_string().to_uppercase();
        let body = BookingStatusEmail {
            user_name: &booking.user_name,
            created_at: &booking.created_at,
            status: status.clone(),
            message: or_placeholder(reason.unwrap_or_default(), "No additional details provided."),
        }
        .render()?;
        let subject = format!("Booking Update: {status}");

        self.enqueue(&booking.user_email, &subject, &body, &booking.id)
            .await
    }
}
