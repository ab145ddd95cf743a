//! Loan (borrow) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A borrowing record binding a patron to a specific copy.
///
/// At most one open loan (null `returned_at`) may reference a given copy.
/// A closed loan is never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: u64,
    pub book_id: u64,
    pub copy_id: u64,
    pub patron_id: u64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    /// 0 or 1; a loan may be extended at most once.
    pub extensions_count: u32,
    pub last_extended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && self.due_at < now
    }
}
