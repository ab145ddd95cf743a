//! Copy (allocatable inventory unit) model and status machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Copy allocation status.
///
/// Parsed once at the boundary via [`FromStr`](std::str::FromStr); internal
/// code only ever sees the enum. `Withdrawn` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CopyStatus {
    Available,
    Reserved,
    Borrowed,
    Maintenance,
    Withdrawn,
}

impl CopyStatus {
    /// Total transition predicate over the copy state machine.
    ///
    /// ```text
    /// AVAILABLE  -> BORROWED | RESERVED | MAINTENANCE | WITHDRAWN
    /// RESERVED   -> BORROWED | AVAILABLE | MAINTENANCE | WITHDRAWN
    /// BORROWED   -> AVAILABLE
    /// MAINTENANCE -> AVAILABLE | WITHDRAWN
    /// WITHDRAWN  -> (terminal)
    /// ```
    pub fn can_become(self, next: CopyStatus) -> bool {
        use CopyStatus::*;
        matches!(
            (self, next),
            (Available, Borrowed)
                | (Available, Reserved)
                | (Available, Maintenance)
                | (Available, Withdrawn)
                | (Reserved, Borrowed)
                | (Reserved, Available)
                | (Reserved, Maintenance)
                | (Reserved, Withdrawn)
                | (Borrowed, Available)
                | (Maintenance, Available)
                | (Maintenance, Withdrawn)
        )
    }
}

impl std::str::FromStr for CopyStatus {
    type Err = String;

    /// Case-insensitive parse accepting the legacy aliases found in
    /// imported inventory data ("loaned", "held", "discarded", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" | "free" | "on_shelf" | "on shelf" => Ok(CopyStatus::Available),
            "reserved" | "held" | "on_hold" | "on hold" => Ok(CopyStatus::Reserved),
            "borrowed" | "loaned" | "on_loan" | "on loan" | "checked_out" | "checked out" => {
                Ok(CopyStatus::Borrowed)
            }
            "maintenance" | "repair" | "damaged" => Ok(CopyStatus::Maintenance),
            "withdrawn" | "discarded" | "weeded" => Ok(CopyStatus::Withdrawn),
            other => Err(format!("unknown copy status: {}", other)),
        }
    }
}

impl std::fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CopyStatus::Available => "AVAILABLE",
            CopyStatus::Reserved => "RESERVED",
            CopyStatus::Borrowed => "BORROWED",
            CopyStatus::Maintenance => "MAINTENANCE",
            CopyStatus::Withdrawn => "WITHDRAWN",
        };
        write!(f, "{}", label)
    }
}

/// Shelving/access classification of a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    OpenStack,
    ClosedStack,
    Reference,
}

impl std::str::FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open_stack" | "open stack" => Ok(AccessType::OpenStack),
            "closed_stack" | "storage" => Ok(AccessType::ClosedStack),
            "reference" | "digital" => Ok(AccessType::Reference),
            other => Err(format!("unknown access type: {}", other)),
        }
    }
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AccessType::OpenStack => "open_stack",
            AccessType::ClosedStack => "closed_stack",
            AccessType::Reference => "reference",
        };
        write!(f, "{}", label)
    }
}

/// One physical/allocatable instance of a book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Copy {
    pub id: u64,
    pub book_id: u64,
    /// Unique (case-insensitive) inventory code, e.g. a barcode.
    pub inventory_code: String,
    pub status: CopyStatus,
    pub access_type: AccessType,
    pub condition_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Copy {
    pub fn new(
        id: u64,
        book_id: u64,
        inventory_code: impl Into<String>,
        access_type: AccessType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            book_id,
            inventory_code: inventory_code.into(),
            status: CopyStatus::Available,
            access_type,
            condition_note: None,
            created_at: now,
            updated_at: now,
        }
    }
}
