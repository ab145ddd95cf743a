//! Data models for the circulation core

pub mod book;
pub mod copy;
pub mod loan;
pub mod patron;
pub mod reservation;

// Re-export commonly used types
pub use book::Book;
pub use copy::{AccessType, Copy, CopyStatus};
pub use loan::Loan;
pub use patron::{MembershipTier, Patron};
pub use reservation::{Reservation, ReservationStatus};
