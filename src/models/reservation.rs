//! Reservation model and status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Active,
    Fulfilled,
    Cancelled,
    Expired,
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ReservationStatus::Active),
            "fulfilled" => Ok(ReservationStatus::Fulfilled),
            "cancelled" | "canceled" => Ok(ReservationStatus::Cancelled),
            "expired" => Ok(ReservationStatus::Expired),
            other => Err(format!("unknown reservation status: {}", other)),
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ReservationStatus::Active => "ACTIVE",
            ReservationStatus::Fulfilled => "FULFILLED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Expired => "EXPIRED",
        };
        write!(f, "{}", label)
    }
}

/// A standing claim on a book (not a specific copy), made when no copy is
/// immediately available.
///
/// `copy_id` is set only once the queue has earmarked a freed copy for this
/// reservation; `loan_id` is set on fulfillment. At most one ACTIVE
/// reservation exists per (patron, book) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: u64,
    pub book_id: u64,
    pub patron_id: u64,
    pub status: ReservationStatus,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub copy_id: Option<u64>,
    pub loan_id: Option<u64>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn new(
        id: u64,
        book_id: u64,
        patron_id: u64,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            book_id,
            patron_id,
            status: ReservationStatus::Active,
            reserved_at: now,
            expires_at,
            copy_id: None,
            loan_id: None,
            fulfilled_at: None,
            cancelled_at: None,
            expired_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
