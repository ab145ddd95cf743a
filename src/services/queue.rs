//! Reservation queue: per-book FIFO of active reservations.
//!
//! Reservations exist only for contention: a book with an AVAILABLE copy
//! cannot be reserved, it must be borrowed. FIFO order (`reserved_at`
//! ascending, ties by id) is a correctness property; the queue is never
//! reordered. Expiry is evaluated lazily on access.

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::{ReservationConfig, RESERVATION_TTL_MAX_DAYS, RESERVATION_TTL_MIN_DAYS},
    error::{CircResult, CirculationError, Entity, Reason},
    ids::next_id,
    models::{Book, CopyStatus, Patron, Reservation, ReservationStatus},
    repository::Repository,
};

use super::ledger::CopyLedger;

#[derive(Clone)]
pub struct ReservationQueue {
    repository: Repository,
    ledger: CopyLedger,
    config: ReservationConfig,
}

impl ReservationQueue {
    pub fn new(repository: Repository, ledger: CopyLedger, config: ReservationConfig) -> Self {
        Self {
            repository,
            ledger,
            config,
        }
    }

    /// Queue a reservation for `book` by `patron`.
    ///
    /// `ttl_days` overrides the configured default pickup TTL and must fall
    /// within 1..=14 days.
    pub async fn enqueue(
        &self,
        patron: &Patron,
        book: &Book,
        ttl_days: Option<i64>,
        now: DateTime<Utc>,
    ) -> CircResult<Reservation> {
        let ttl = ttl_days.unwrap_or(self.config.ttl_days);
        if !(RESERVATION_TTL_MIN_DAYS..=RESERVATION_TTL_MAX_DAYS).contains(&ttl) {
            return Err(CirculationError::invalid(
                Reason::InvalidTtl,
                format!(
                    "reservation ttl must be between {} and {} days, got {}",
                    RESERVATION_TTL_MIN_DAYS, RESERVATION_TTL_MAX_DAYS, ttl
                ),
            ));
        }

        let active = self
            .repository
            .reservations
            .count_active_for_patron(patron.id)
            .await?;
        if active >= self.config.max_active_per_patron {
            return Err(CirculationError::conflict(
                Reason::ReservationLimitReached,
                Entity::Patron,
                patron.id,
            ));
        }

        // Reservations exist only for contention.
        let available = self
            .repository
            .copies
            .find_available_copies(book.id, 1, None)
            .await?;
        if !available.is_empty() {
            return Err(CirculationError::conflict(
                Reason::CopyCurrentlyAvailable,
                Entity::Book,
                book.id,
            ));
        }

        if self
            .repository
            .reservations
            .find_active_for_patron_and_book(patron.id, book.id)
            .await?
            .is_some()
        {
            return Err(CirculationError::conflict(
                Reason::AlreadyReserved,
                Entity::Book,
                book.id,
            ));
        }

        let reservation = Reservation::new(
            next_id(),
            book.id,
            patron.id,
            now,
            now + Duration::days(ttl),
        );
        self.repository
            .reservations
            .persist_reservation(&reservation)
            .await?;
        tracing::info!(
            "reservation {} queued: patron {} book {}",
            reservation.id,
            patron.id,
            book.id
        );
        Ok(reservation)
    }

    /// Cancel an ACTIVE reservation, releasing any earmarked copy back to
    /// AVAILABLE.
    pub async fn cancel(
        &self,
        reservation: &mut Reservation,
        now: DateTime<Utc>,
    ) -> CircResult<()> {
        if !reservation.is_active() {
            return Err(terminal_conflict(reservation));
        }

        self.drop_earmark(reservation, now).await?;
        reservation.status = ReservationStatus::Cancelled;
        reservation.cancelled_at = Some(now);
        self.repository
            .reservations
            .persist_reservation(reservation)
            .await?;
        tracing::info!("reservation {} cancelled", reservation.id);
        Ok(())
    }

    /// ACTIVE -> EXPIRED, only once past `expires_at`. Safe to call lazily
    /// or from an external timer; a reservation already fulfilled (or
    /// cancelled, or expired) fails with a clean conflict instead of
    /// double-applying.
    pub async fn expire(
        &self,
        reservation: &mut Reservation,
        now: DateTime<Utc>,
    ) -> CircResult<()> {
        if !reservation.is_active() {
            return Err(terminal_conflict(reservation));
        }
        if !reservation.is_expired_at(now) {
            return Err(CirculationError::conflict(
                Reason::NotYetExpired,
                Entity::Reservation,
                reservation.id,
            ));
        }

        self.drop_earmark(reservation, now).await?;
        reservation.status = ReservationStatus::Expired;
        reservation.expired_at = Some(now);
        self.repository
            .reservations
            .persist_reservation(reservation)
            .await?;
        tracing::info!("reservation {} expired", reservation.id);
        Ok(())
    }

    /// Oldest ACTIVE, unexpired reservation for the book that is still
    /// waiting for a copy, if any.
    ///
    /// Entries past their `expires_at` are expired in passing rather than
    /// served. Entries already holding an earmark keep it and are skipped:
    /// re-earmarking the head would strand its previous copy in RESERVED
    /// with no reservation referencing it.
    pub async fn head_of(
        &self,
        book_id: u64,
        now: DateTime<Utc>,
    ) -> CircResult<Option<Reservation>> {
        let queue = self
            .repository
            .reservations
            .find_active_for_book(book_id)
            .await?;
        for mut reservation in queue {
            if reservation.is_expired_at(now) {
                self.expire(&mut reservation, now).await?;
                continue;
            }
            if reservation.copy_id.is_some() {
                continue;
            }
            return Ok(Some(reservation));
        }
        Ok(None)
    }

    /// True when any ACTIVE, unexpired reservation exists for the book,
    /// earmarked or not.
    pub async fn has_pending(&self, book_id: u64, now: DateTime<Utc>) -> CircResult<bool> {
        let queue = self
            .repository
            .reservations
            .find_active_for_book(book_id)
            .await?;
        Ok(queue.iter().any(|r| !r.is_expired_at(now)))
    }

    /// Release the copy earmarked for `reservation`, if any.
    ///
    /// Refuses when the earmarked copy is BORROWED: that copy is bound to
    /// an open loan and must be returned through the loan path.
    async fn drop_earmark(
        &self,
        reservation: &mut Reservation,
        now: DateTime<Utc>,
    ) -> CircResult<()> {
        let Some(copy_id) = reservation.copy_id else {
            return Ok(());
        };
        let mut copy = self
            .repository
            .copies
            .find_copy(copy_id)
            .await?
            .ok_or_else(|| CirculationError::not_found(Entity::Copy, copy_id))?;
        if copy.status == CopyStatus::Borrowed {
            return Err(CirculationError::invalid_transition(copy.id, copy.status));
        }
        if copy.status == CopyStatus::Reserved {
            self.ledger.release_earmark(&mut copy, now).await?;
        }
        reservation.copy_id = None;
        Ok(())
    }
}

fn terminal_conflict(reservation: &Reservation) -> CirculationError {
    let reason = match reservation.status {
        ReservationStatus::Fulfilled => Reason::AlreadyFulfilled,
        ReservationStatus::Cancelled => Reason::AlreadyCancelled,
        ReservationStatus::Expired => Reason::AlreadyExpired,
        // callers check is_active() first
        ReservationStatus::Active => Reason::ReservationNotActive,
    };
    CirculationError::conflict(reason, Entity::Reservation, reservation.id)
}
