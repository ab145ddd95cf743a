//! Allocation orchestrator: one atomic unit of work per request.
//!
//! Every operation serializes on a per-book lock, samples the clock once,
//! and re-reads the entities it mutates under the lock, so two concurrent
//! requests racing for the same last copy observe each other: exactly one
//! allocation succeeds per copy per status epoch. Not-found conditions are
//! reported before any mutation; all domain checks precede all persists.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{
    error::{CircResult, CirculationError, Entity, Reason},
    ids::next_id,
    models::{AccessType, Book, Copy, CopyStatus, Loan, Patron, Reservation},
    repository::Repository,
};

use super::{ledger::CopyLedger, loans::LoanLifecycle, queue::ReservationQueue};

/// Lazily created per-book mutexes serializing orchestrator operations.
#[derive(Default)]
struct BookLocks {
    locks: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>,
}

impl BookLocks {
    fn for_book(&self, book_id: u64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        // A strong count of 1 means only the map holds the entry: no
        // operation is holding or waiting on it, so it can go. Keeps the
        // map bounded by the number of books with in-flight operations.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(book_id).or_default().clone()
    }
}

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    ledger: CopyLedger,
    queue: ReservationQueue,
    loans: LoanLifecycle,
    locks: Arc<BookLocks>,
}

impl CirculationService {
    pub fn new(
        repository: Repository,
        ledger: CopyLedger,
        queue: ReservationQueue,
        loans: LoanLifecycle,
    ) -> Self {
        Self {
            repository,
            ledger,
            queue,
            loans,
            locks: Arc::new(BookLocks::default()),
        }
    }

    /// Direct borrow: allocate a copy of `book_id` to `patron_id`.
    ///
    /// If the patron already holds an ACTIVE reservation for the book it is
    /// fulfilled by this borrow. A caller-specified copy must belong to the
    /// book and be allocatable; it is never silently substituted.
    pub async fn borrow(
        &self,
        patron_id: u64,
        book_id: u64,
        copy_id: Option<u64>,
    ) -> CircResult<Loan> {
        let patron = self.patron(patron_id).await?;
        let book = self.book(book_id).await?;

        let lock = self.locks.for_book(book.id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        let mut reservation = self
            .repository
            .reservations
            .find_active_for_patron_and_book(patron.id, book.id)
            .await?;

        let mut copy = match copy_id {
            Some(copy_id) => {
                let copy = self.copy(copy_id).await?;
                if copy.book_id != book.id {
                    return Err(CirculationError::invalid(
                        Reason::CopyBookMismatch,
                        format!("copy {} belongs to book {}, not {}", copy.id, copy.book_id, book.id),
                    ));
                }
                // A RESERVED copy is only eligible when it is earmarked to
                // this patron's own reservation; anything else would jump
                // the queue.
                let own_earmark = reservation.as_ref().and_then(|r| r.copy_id) == Some(copy.id);
                let eligible = match copy.status {
                    CopyStatus::Available => true,
                    CopyStatus::Reserved => own_earmark,
                    _ => false,
                };
                if !eligible {
                    return Err(CirculationError::conflict(
                        Reason::CopyUnavailable,
                        Entity::Copy,
                        copy.id,
                    ));
                }
                copy
            }
            None => match reservation.as_ref().and_then(|r| r.copy_id) {
                // The patron's own reservation already has an earmarked copy.
                Some(earmarked) => self.copy(earmarked).await?,
                None => self.pick_available_copy(&book).await?,
            },
        };

        self.loans
            .open(&patron, &mut copy, reservation.as_mut(), now)
            .await
    }

    /// Queue a reservation for a book with no available copy.
    pub async fn reserve(
        &self,
        patron_id: u64,
        book_id: u64,
        ttl_days: Option<i64>,
    ) -> CircResult<Reservation> {
        let patron = self.patron(patron_id).await?;
        let book = self.book(book_id).await?;

        let lock = self.locks.for_book(book.id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        self.queue.enqueue(&patron, &book, ttl_days, now).await
    }

    /// Convert an ACTIVE reservation with an earmarked RESERVED copy into a
    /// loan.
    pub async fn fulfill_reservation(&self, reservation_id: u64) -> CircResult<Loan> {
        let reservation = self.reservation(reservation_id).await?;

        let lock = self.locks.for_book(reservation.book_id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        // Re-read under the lock: a concurrent expiry or cancellation that
        // committed first must win.
        let mut reservation = self.reservation(reservation_id).await?;
        if !reservation.is_active() {
            return Err(CirculationError::conflict(
                Reason::ReservationNotActive,
                Entity::Reservation,
                reservation.id,
            ));
        }
        if reservation.is_expired_at(now) {
            return Err(CirculationError::conflict(
                Reason::ReservationExpired,
                Entity::Reservation,
                reservation.id,
            ));
        }
        let Some(copy_id) = reservation.copy_id else {
            return Err(CirculationError::conflict(
                Reason::CopyNotEarmarked,
                Entity::Reservation,
                reservation.id,
            ));
        };
        let mut copy = self.copy(copy_id).await?;
        if copy.status != CopyStatus::Reserved {
            return Err(CirculationError::conflict(
                Reason::CopyNotEarmarked,
                Entity::Copy,
                copy.id,
            ));
        }
        let patron = self.patron(reservation.patron_id).await?;

        self.loans
            .open(&patron, &mut copy, Some(&mut reservation), now)
            .await
    }

    /// Extend an open loan once, unless a reservation is waiting on the
    /// book.
    pub async fn extend_loan(&self, loan_id: u64) -> CircResult<Loan> {
        let loan = self.loan(loan_id).await?;

        let lock = self.locks.for_book(loan.book_id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        let mut loan = self.loan(loan_id).await?;
        self.loans.extend(&mut loan, now).await?;
        Ok(loan)
    }

    /// Return an open loan; the freed copy cascades to the head of the
    /// reservation queue when one is waiting.
    pub async fn return_loan(&self, loan_id: u64) -> CircResult<Loan> {
        let loan = self.loan(loan_id).await?;

        let lock = self.locks.for_book(loan.book_id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        let mut loan = self.loan(loan_id).await?;
        self.loans.close(&mut loan, now).await?;
        Ok(loan)
    }

    pub async fn cancel_reservation(&self, reservation_id: u64) -> CircResult<Reservation> {
        let reservation = self.reservation(reservation_id).await?;

        let lock = self.locks.for_book(reservation.book_id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        let mut reservation = self.reservation(reservation_id).await?;
        self.queue.cancel(&mut reservation, now).await?;
        Ok(reservation)
    }

    pub async fn expire_reservation(&self, reservation_id: u64) -> CircResult<Reservation> {
        let reservation = self.reservation(reservation_id).await?;

        let lock = self.locks.for_book(reservation.book_id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        let mut reservation = self.reservation(reservation_id).await?;
        self.queue.expire(&mut reservation, now).await?;
        Ok(reservation)
    }

    // --- inventory maintenance -------------------------------------------

    /// Add a new AVAILABLE copy to a book's inventory.
    pub async fn register_copy(
        &self,
        book_id: u64,
        inventory_code: &str,
        access_type: AccessType,
    ) -> CircResult<Copy> {
        let book = self.book(book_id).await?;

        let lock = self.locks.for_book(book.id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        if self
            .repository
            .copies
            .find_copy_by_inventory_code(inventory_code)
            .await?
            .is_some()
        {
            return Err(CirculationError::invalid(
                Reason::DuplicateInventoryCode,
                format!("inventory code {} already registered", inventory_code),
            ));
        }

        let copy = Copy::new(next_id(), book.id, inventory_code, access_type, now);
        self.repository.copies.persist_copy(&copy).await?;
        self.repository.counters.recalculate(book.id).await?;
        tracing::info!("copy {} registered for book {}", copy.id, book.id);
        Ok(copy)
    }

    pub async fn withdraw_copy(&self, copy_id: u64, note: Option<&str>) -> CircResult<Copy> {
        let copy = self.copy(copy_id).await?;

        let lock = self.locks.for_book(copy.book_id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        let mut copy = self.copy(copy_id).await?;
        self.ledger.withdraw(&mut copy, note, now).await?;
        Ok(copy)
    }

    pub async fn flag_maintenance(&self, copy_id: u64, note: Option<&str>) -> CircResult<Copy> {
        let copy = self.copy(copy_id).await?;

        let lock = self.locks.for_book(copy.book_id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        let mut copy = self.copy(copy_id).await?;
        self.ledger.flag_maintenance(&mut copy, note, now).await?;
        Ok(copy)
    }

    pub async fn restore_copy(&self, copy_id: u64) -> CircResult<Copy> {
        let copy = self.copy(copy_id).await?;

        let lock = self.locks.for_book(copy.book_id);
        let _guard = lock.lock().await;
        let now = self.repository.clock.now();

        let mut copy = self.copy(copy_id).await?;
        self.ledger.restore(&mut copy, now).await?;
        Ok(copy)
    }

    // --- lookups ----------------------------------------------------------

    /// First AVAILABLE copy of the book (access type then id ascending).
    ///
    /// With no copy to give out, the failure distinguishes a contended book
    /// (waiting reservations) from one with nothing allocatable at all.
    async fn pick_available_copy(&self, book: &Book) -> CircResult<Copy> {
        let available = self
            .repository
            .copies
            .find_available_copies(book.id, 1, None)
            .await?;
        if let Some(copy) = available.into_iter().next() {
            return Ok(copy);
        }
        let queue = self
            .repository
            .reservations
            .find_active_for_book(book.id)
            .await?;
        if !queue.is_empty() {
            return Err(CirculationError::conflict(
                Reason::CopyUnavailable,
                Entity::Book,
                book.id,
            ));
        }
        Err(CirculationError::conflict(
            Reason::NoCopiesAvailable,
            Entity::Book,
            book.id,
        ))
    }

    async fn patron(&self, id: u64) -> CircResult<Patron> {
        self.repository
            .patrons
            .find_patron(id)
            .await?
            .ok_or_else(|| CirculationError::not_found(Entity::Patron, id))
    }

    async fn book(&self, id: u64) -> CircResult<Book> {
        self.repository
            .books
            .find_book(id)
            .await?
            .ok_or_else(|| CirculationError::not_found(Entity::Book, id))
    }

    async fn copy(&self, id: u64) -> CircResult<Copy> {
        self.repository
            .copies
            .find_copy(id)
            .await?
            .ok_or_else(|| CirculationError::not_found(Entity::Copy, id))
    }

    async fn loan(&self, id: u64) -> CircResult<Loan> {
        self.repository
            .loans
            .find_loan(id)
            .await?
            .ok_or_else(|| CirculationError::not_found(Entity::Loan, id))
    }

    async fn reservation(&self, id: u64) -> CircResult<Reservation> {
        self.repository
            .reservations
            .find_reservation(id)
            .await?
            .ok_or_else(|| CirculationError::not_found(Entity::Reservation, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_book_locks_are_evicted() {
        let locks = BookLocks::default();
        let held = locks.for_book(1);
        let _also_held = locks.for_book(2);
        drop(held);

        let _third = locks.for_book(3);
        let map = locks.locks.lock().unwrap();
        assert!(!map.contains_key(&1));
        assert!(map.contains_key(&2));
        assert!(map.contains_key(&3));
    }
}
