//! Book (catalog entry) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog identity aggregating zero or more copies. Not itself allocatable.
///
/// The per-status counters are denormalized inventory totals, recomputed by
/// the counters sink in the same unit of work as any copy transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub isbn: Option<String>,
    pub total_copies: u32,
    pub available_copies: u32,
    pub borrowed_copies: u32,
    pub reserved_copies: u32,
    pub withdrawn_copies: u32,
    pub created_at: DateTime<Utc>,
}

impl Book {
    pub fn new(id: u64, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            isbn: None,
            total_copies: 0,
            available_copies: 0,
            borrowed_copies: 0,
            reserved_copies: 0,
            withdrawn_copies: 0,
            created_at: now,
        }
    }
}
