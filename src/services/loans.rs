//! Loan lifecycle: open, extend, close.
//!
//! Eligibility (blocked flag, loan ceiling) is enforced at open; extension
//! yields to waiting reservations; closing releases the copy and cascades
//! it to the head of the reservation queue instead of leaving it generally
//! available.

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::CirculationConfig,
    error::{CircResult, CirculationError, Entity, Reason},
    ids::next_id,
    models::{Copy, Loan, Patron, Reservation, ReservationStatus},
    repository::Repository,
};

use super::{ledger::CopyLedger, queue::ReservationQueue};

#[derive(Clone)]
pub struct LoanLifecycle {
    repository: Repository,
    ledger: CopyLedger,
    queue: ReservationQueue,
    config: CirculationConfig,
}

impl LoanLifecycle {
    pub fn new(
        repository: Repository,
        ledger: CopyLedger,
        queue: ReservationQueue,
        config: CirculationConfig,
    ) -> Self {
        Self {
            repository,
            ledger,
            queue,
            config,
        }
    }

    /// Allocate `copy` to `patron` and open a loan against it.
    ///
    /// When `reservation` is supplied it is marked FULFILLED and linked to
    /// the new loan in the same unit of work.
    pub async fn open(
        &self,
        patron: &Patron,
        copy: &mut Copy,
        reservation: Option<&mut Reservation>,
        now: DateTime<Utc>,
    ) -> CircResult<Loan> {
        if patron.blocked {
            return Err(CirculationError::forbidden(
                Reason::PatronBlocked,
                Entity::Patron,
                patron.id,
            ));
        }

        // Ceiling of 0 means unlimited.
        if patron.loan_limit > 0 {
            let open_loans = self.repository.loans.count_open_loans(patron.id).await?;
            if open_loans >= patron.loan_limit {
                return Err(CirculationError::conflict(
                    Reason::LoanLimitReached,
                    Entity::Patron,
                    patron.id,
                ));
            }
        }

        self.ledger
            .allocate(copy, now)
            .await
            .map_err(|e| match e {
                CirculationError::Conflict {
                    reason: Reason::InvalidTransition,
                    ..
                } => CirculationError::conflict(Reason::CopyUnavailable, Entity::Copy, copy.id),
                other => other,
            })?;

        let loan = Loan {
            id: next_id(),
            book_id: copy.book_id,
            copy_id: copy.id,
            patron_id: patron.id,
            borrowed_at: now,
            due_at: now + Duration::days(self.config.loan.period_days),
            returned_at: None,
            extensions_count: 0,
            last_extended_at: None,
            updated_at: now,
        };
        self.repository.loans.persist_loan(&loan).await?;

        if let Some(reservation) = reservation {
            reservation.status = ReservationStatus::Fulfilled;
            reservation.fulfilled_at = Some(now);
            reservation.copy_id = Some(copy.id);
            reservation.loan_id = Some(loan.id);
            self.repository
                .reservations
                .persist_reservation(reservation)
                .await?;
            tracing::info!(
                "reservation {} fulfilled by loan {}",
                reservation.id,
                loan.id
            );
        }

        tracing::info!(
            "loan {} opened: patron {} copy {} due {}",
            loan.id,
            patron.id,
            copy.id,
            loan.due_at
        );
        Ok(loan)
    }

    /// Push the due date by the configured extension period, once per loan.
    ///
    /// Any ACTIVE reservation on the loan's book blocks the extension:
    /// extensions must yield to waiting patrons.
    pub async fn extend(&self, loan: &mut Loan, now: DateTime<Utc>) -> CircResult<()> {
        if !loan.is_open() {
            return Err(CirculationError::conflict(
                Reason::AlreadyReturned,
                Entity::Loan,
                loan.id,
            ));
        }
        if loan.extensions_count >= 1 {
            return Err(CirculationError::conflict(
                Reason::AlreadyExtended,
                Entity::Loan,
                loan.id,
            ));
        }
        if self.queue.has_pending(loan.book_id, now).await? {
            return Err(CirculationError::conflict(
                Reason::ReservationPending,
                Entity::Book,
                loan.book_id,
            ));
        }

        loan.due_at += Duration::days(self.config.loan.extension_period_days);
        loan.extensions_count += 1;
        loan.last_extended_at = Some(now);
        loan.updated_at = now;
        self.repository.loans.persist_loan(loan).await?;
        tracing::info!("loan {} extended, now due {}", loan.id, loan.due_at);
        Ok(())
    }

    /// Close the loan and free its copy.
    ///
    /// If the book's reservation queue has a waiting entry, the freed copy
    /// is immediately earmarked for the head of the queue (with a fresh
    /// pickup window) instead of going back to AVAILABLE.
    pub async fn close(&self, loan: &mut Loan, now: DateTime<Utc>) -> CircResult<()> {
        if !loan.is_open() {
            return Err(CirculationError::conflict(
                Reason::AlreadyReturned,
                Entity::Loan,
                loan.id,
            ));
        }

        let mut copy = self
            .repository
            .copies
            .find_copy(loan.copy_id)
            .await?
            .ok_or_else(|| CirculationError::not_found(Entity::Copy, loan.copy_id))?;

        let was_overdue = loan.is_overdue_at(now);
        self.ledger.release(&mut copy, now).await?;
        loan.returned_at = Some(now);
        loan.updated_at = now;
        self.repository.loans.persist_loan(loan).await?;

        if was_overdue {
            // Overdue handling (fines) lives outside this core.
            tracing::debug!("loan {} returned after due date {}", loan.id, loan.due_at);
        }

        if let Some(mut head) = self.queue.head_of(loan.book_id, now).await? {
            self.ledger.earmark(&mut copy, now).await?;
            head.copy_id = Some(copy.id);
            head.expires_at = now + Duration::days(self.config.reservation.pickup_window_days);
            self.repository
                .reservations
                .persist_reservation(&head)
                .await?;
            tracing::info!(
                "loan {} returned, copy {} earmarked for reservation {}",
                loan.id,
                copy.id,
                head.id
            );
        } else {
            tracing::info!("loan {} returned, copy {} available", loan.id, copy.id);
        }
        Ok(())
    }
}
