//! Collaborator contracts for the circulation core.
//!
//! The core is a library: persistence, directories and the wall clock are
//! injected through these narrow traits. An in-memory reference
//! implementation lives in [`memory`]; production embedders supply their
//! own backends.

pub mod clock;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::CircResult,
    models::{AccessType, Book, Copy, Loan, Patron, Reservation},
};

pub use clock::{Clock, FixedClock, SystemClock};
pub use memory::MemoryRepository;

/// Read-only patron lookup (blocked flag, loan ceiling).
#[mockall::automock]
#[async_trait]
pub trait PatronDirectory: Send + Sync {
    async fn find_patron(&self, id: u64) -> CircResult<Option<Patron>>;
}

#[mockall::automock]
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn find_book(&self, id: u64) -> CircResult<Option<Book>>;
    async fn persist_book(&self, book: &Book) -> CircResult<()>;
}

#[mockall::automock]
#[async_trait]
pub trait CopyRepository: Send + Sync {
    async fn find_copy(&self, id: u64) -> CircResult<Option<Copy>>;

    /// AVAILABLE copies of a book, ordered by access type then id
    /// ascending, optionally restricted to one access type.
    async fn find_available_copies(
        &self,
        book_id: u64,
        limit: usize,
        access_type: Option<AccessType>,
    ) -> CircResult<Vec<Copy>>;

    /// Lookup by inventory code, case-insensitive.
    async fn find_copy_by_inventory_code(&self, code: &str) -> CircResult<Option<Copy>>;

    async fn persist_copy(&self, copy: &Copy) -> CircResult<()>;
}

#[mockall::automock]
#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn find_loan(&self, id: u64) -> CircResult<Option<Loan>>;
    async fn count_open_loans(&self, patron_id: u64) -> CircResult<u32>;
    async fn persist_loan(&self, loan: &Loan) -> CircResult<()>;
}

#[mockall::automock]
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn find_reservation(&self, id: u64) -> CircResult<Option<Reservation>>;

    async fn find_active_for_patron_and_book(
        &self,
        patron_id: u64,
        book_id: u64,
    ) -> CircResult<Option<Reservation>>;

    /// ACTIVE reservations for a book in strict FIFO order: `reserved_at`
    /// ascending, ties broken by id ascending.
    async fn find_active_for_book(&self, book_id: u64) -> CircResult<Vec<Reservation>>;

    async fn count_active_for_patron(&self, patron_id: u64) -> CircResult<u32>;

    async fn persist_reservation(&self, reservation: &Reservation) -> CircResult<()>;
}

/// Write-only sink keeping the per-book inventory counters in step with
/// copy statuses. Invoked in the same unit of work as every copy
/// transition.
#[mockall::automock]
#[async_trait]
pub trait CountersSink: Send + Sync {
    async fn recalculate(&self, book_id: u64) -> CircResult<()>;
}

/// Container wiring all collaborators together
#[derive(Clone)]
pub struct Repository {
    pub patrons: Arc<dyn PatronDirectory>,
    pub books: Arc<dyn BookRepository>,
    pub copies: Arc<dyn CopyRepository>,
    pub loans: Arc<dyn LoanStore>,
    pub reservations: Arc<dyn ReservationStore>,
    pub counters: Arc<dyn CountersSink>,
    pub clock: Arc<dyn Clock>,
}

impl Repository {
    /// Repository backed entirely by the in-memory implementation and the
    /// system clock.
    pub fn in_memory() -> (Self, MemoryRepository) {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> (Self, MemoryRepository) {
        let store = MemoryRepository::new();
        let shared = Arc::new(store.clone());
        let repository = Self {
            patrons: shared.clone(),
            books: shared.clone(),
            copies: shared.clone(),
            loans: shared.clone(),
            reservations: shared.clone(),
            counters: shared,
            clock,
        };
        (repository, store)
    }
}
