//! In-memory reference implementation of the collaborator contracts.
//!
//! Backs the test suite and embedders that do not need durable storage.
//! Reservations live in an insertion-ordered map so the FIFO scan is cheap;
//! ordering is still enforced explicitly by `reserved_at` (ties by id) so a
//! backend with different iteration order stays correct.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::{
    error::{CircResult, CirculationError, Entity, Reason},
    ids::next_id,
    models::{AccessType, Book, Copy, CopyStatus, Loan, MembershipTier, Patron, Reservation},
};

use super::{
    BookRepository, CopyRepository, CountersSink, LoanStore, PatronDirectory, ReservationStore,
};

#[derive(Default)]
struct State {
    patrons: HashMap<u64, Patron>,
    books: HashMap<u64, Book>,
    copies: BTreeMap<u64, Copy>,
    loans: HashMap<u64, Loan>,
    reservations: IndexMap<u64, Reservation>,
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<RwLock<State>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    // --- seeding helpers -------------------------------------------------

    pub async fn add_patron(&self, membership: MembershipTier) -> Patron {
        let patron = Patron::new(next_id(), membership);
        self.inner
            .write()
            .await
            .patrons
            .insert(patron.id, patron.clone());
        patron
    }

    pub async fn set_blocked(&self, patron_id: u64, blocked: bool) {
        if let Some(patron) = self.inner.write().await.patrons.get_mut(&patron_id) {
            patron.blocked = blocked;
        }
    }

    /// Per-patron ceiling override; authoritative over the tier default.
    pub async fn set_loan_limit(&self, patron_id: u64, limit: u32) {
        if let Some(patron) = self.inner.write().await.patrons.get_mut(&patron_id) {
            patron.loan_limit = limit;
        }
    }

    pub async fn add_book(&self, title: &str) -> Book {
        let book = Book::new(next_id(), title, Utc::now());
        self.inner.write().await.books.insert(book.id, book.clone());
        book
    }

    pub async fn add_copy(
        &self,
        book_id: u64,
        inventory_code: &str,
        access_type: AccessType,
    ) -> CircResult<Copy> {
        let mut state = self.inner.write().await;
        if !state.books.contains_key(&book_id) {
            return Err(CirculationError::not_found(Entity::Book, book_id));
        }
        let duplicate = state
            .copies
            .values()
            .any(|c| c.inventory_code.eq_ignore_ascii_case(inventory_code));
        if duplicate {
            return Err(CirculationError::invalid(
                Reason::DuplicateInventoryCode,
                format!("inventory code {} already registered", inventory_code),
            ));
        }
        let copy = Copy::new(next_id(), book_id, inventory_code, access_type, Utc::now());
        state.copies.insert(copy.id, copy.clone());
        recalculate_counters(&mut state, book_id);
        Ok(copy)
    }

    // --- direct reads for assertions -------------------------------------

    pub async fn get_copy(&self, id: u64) -> Option<Copy> {
        self.inner.read().await.copies.get(&id).cloned()
    }

    pub async fn get_loan(&self, id: u64) -> Option<Loan> {
        self.inner.read().await.loans.get(&id).cloned()
    }

    pub async fn get_reservation(&self, id: u64) -> Option<Reservation> {
        self.inner.read().await.reservations.get(&id).cloned()
    }

    pub async fn get_book(&self, id: u64) -> Option<Book> {
        self.inner.read().await.books.get(&id).cloned()
    }
}

fn recalculate_counters(state: &mut State, book_id: u64) {
    let mut total = 0;
    let mut available = 0;
    let mut borrowed = 0;
    let mut reserved = 0;
    let mut withdrawn = 0;
    for copy in state.copies.values().filter(|c| c.book_id == book_id) {
        total += 1;
        match copy.status {
            CopyStatus::Available => available += 1,
            CopyStatus::Borrowed => borrowed += 1,
            CopyStatus::Reserved => reserved += 1,
            CopyStatus::Withdrawn => withdrawn += 1,
            CopyStatus::Maintenance => {}
        }
    }
    if let Some(book) = state.books.get_mut(&book_id) {
        book.total_copies = total;
        book.available_copies = available;
        book.borrowed_copies = borrowed;
        book.reserved_copies = reserved;
        book.withdrawn_copies = withdrawn;
    }
}

#[async_trait]
impl PatronDirectory for MemoryRepository {
    async fn find_patron(&self, id: u64) -> CircResult<Option<Patron>> {
        Ok(self.inner.read().await.patrons.get(&id).cloned())
    }
}

#[async_trait]
impl BookRepository for MemoryRepository {
    async fn find_book(&self, id: u64) -> CircResult<Option<Book>> {
        Ok(self.inner.read().await.books.get(&id).cloned())
    }

    async fn persist_book(&self, book: &Book) -> CircResult<()> {
        self.inner.write().await.books.insert(book.id, book.clone());
        Ok(())
    }
}

#[async_trait]
impl CopyRepository for MemoryRepository {
    async fn find_copy(&self, id: u64) -> CircResult<Option<Copy>> {
        Ok(self.inner.read().await.copies.get(&id).cloned())
    }

    async fn find_available_copies(
        &self,
        book_id: u64,
        limit: usize,
        access_type: Option<AccessType>,
    ) -> CircResult<Vec<Copy>> {
        let state = self.inner.read().await;
        let mut copies: Vec<Copy> = state
            .copies
            .values()
            .filter(|c| c.book_id == book_id && c.status == CopyStatus::Available)
            .filter(|c| access_type.map_or(true, |a| c.access_type == a))
            .cloned()
            .collect();
        copies.sort_by_key(|c| (c.access_type, c.id));
        copies.truncate(limit);
        Ok(copies)
    }

    async fn find_copy_by_inventory_code(&self, code: &str) -> CircResult<Option<Copy>> {
        let state = self.inner.read().await;
        Ok(state
            .copies
            .values()
            .find(|c| c.inventory_code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn persist_copy(&self, copy: &Copy) -> CircResult<()> {
        self.inner.write().await.copies.insert(copy.id, copy.clone());
        Ok(())
    }
}

#[async_trait]
impl LoanStore for MemoryRepository {
    async fn find_loan(&self, id: u64) -> CircResult<Option<Loan>> {
        Ok(self.inner.read().await.loans.get(&id).cloned())
    }

    async fn count_open_loans(&self, patron_id: u64) -> CircResult<u32> {
        let state = self.inner.read().await;
        Ok(state
            .loans
            .values()
            .filter(|l| l.patron_id == patron_id && l.is_open())
            .count() as u32)
    }

    async fn persist_loan(&self, loan: &Loan) -> CircResult<()> {
        self.inner.write().await.loans.insert(loan.id, loan.clone());
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for MemoryRepository {
    async fn find_reservation(&self, id: u64) -> CircResult<Option<Reservation>> {
        Ok(self.inner.read().await.reservations.get(&id).cloned())
    }

    async fn find_active_for_patron_and_book(
        &self,
        patron_id: u64,
        book_id: u64,
    ) -> CircResult<Option<Reservation>> {
        let state = self.inner.read().await;
        let mut matches: Vec<&Reservation> = state
            .reservations
            .values()
            .filter(|r| r.patron_id == patron_id && r.book_id == book_id && r.is_active())
            .collect();
        matches.sort_by_key(|r| (r.reserved_at, r.id));
        Ok(matches.first().map(|r| (*r).clone()))
    }

    async fn find_active_for_book(&self, book_id: u64) -> CircResult<Vec<Reservation>> {
        let state = self.inner.read().await;
        let mut matches: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.book_id == book_id && r.is_active())
            .cloned()
            .collect();
        matches.sort_by_key(|r| (r.reserved_at, r.id));
        Ok(matches)
    }

    async fn count_active_for_patron(&self, patron_id: u64) -> CircResult<u32> {
        let state = self.inner.read().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| r.patron_id == patron_id && r.is_active())
            .count() as u32)
    }

    async fn persist_reservation(&self, reservation: &Reservation) -> CircResult<()> {
        self.inner
            .write()
            .await
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }
}

#[async_trait]
impl CountersSink for MemoryRepository {
    async fn recalculate(&self, book_id: u64) -> CircResult<()> {
        let mut state = self.inner.write().await;
        recalculate_counters(&mut state, book_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_available_copies_ordering() {
        let store = MemoryRepository::new();
        let book = store.add_book("Dune").await;
        let c1 = store
            .add_copy(book.id, "INV-1", AccessType::ClosedStack)
            .await
            .unwrap();
        let c2 = store
            .add_copy(book.id, "INV-2", AccessType::OpenStack)
            .await
            .unwrap();

        let available = store
            .find_available_copies(book.id, 10, None)
            .await
            .unwrap();
        // open stack shelving sorts first
        assert_eq!(
            available.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![c2.id, c1.id]
        );

        let reference_only = store
            .find_available_copies(book.id, 10, Some(AccessType::Reference))
            .await
            .unwrap();
        assert!(reference_only.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_inventory_code_rejected() {
        let store = MemoryRepository::new();
        let book = store.add_book("Dune").await;
        store
            .add_copy(book.id, "INV-1", AccessType::OpenStack)
            .await
            .unwrap();
        let err = store
            .add_copy(book.id, "inv-1", AccessType::OpenStack)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(Reason::DuplicateInventoryCode));
    }

    #[tokio::test]
    async fn test_counters_follow_copy_status() {
        let store = MemoryRepository::new();
        let book = store.add_book("Dune").await;
        let mut copy = store
            .add_copy(book.id, "INV-1", AccessType::OpenStack)
            .await
            .unwrap();

        copy.status = CopyStatus::Borrowed;
        store.persist_copy(&copy).await.unwrap();
        store.recalculate(book.id).await.unwrap();

        let book = store.get_book(book.id).await.unwrap();
        assert_eq!(book.total_copies, 1);
        assert_eq!(book.available_copies, 0);
        assert_eq!(book.borrowed_copies, 1);
    }
}
