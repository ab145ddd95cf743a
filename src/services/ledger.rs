//! Copy ledger: owns every status transition of a copy.
//!
//! All copy mutations in the crate funnel through here so the transition
//! rules and the book-level counter update cannot drift apart. Each
//! successful transition persists the copy and recalculates the owning
//! book's inventory counters in the same unit of work.

use chrono::{DateTime, Utc};

use crate::{
    error::{CircResult, CirculationError},
    models::{Copy, CopyStatus},
    repository::Repository,
};

#[derive(Clone)]
pub struct CopyLedger {
    repository: Repository,
}

impl CopyLedger {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// AVAILABLE or RESERVED -> BORROWED.
    pub async fn allocate(&self, copy: &mut Copy, now: DateTime<Utc>) -> CircResult<()> {
        self.transition(
            copy,
            &[CopyStatus::Available, CopyStatus::Reserved],
            CopyStatus::Borrowed,
            now,
        )
        .await
    }

    /// BORROWED -> AVAILABLE (loan return).
    pub async fn release(&self, copy: &mut Copy, now: DateTime<Utc>) -> CircResult<()> {
        self.transition(copy, &[CopyStatus::Borrowed], CopyStatus::Available, now)
            .await
    }

    /// RESERVED -> AVAILABLE (earmark dropped on cancel/expiry).
    pub async fn release_earmark(&self, copy: &mut Copy, now: DateTime<Utc>) -> CircResult<()> {
        self.transition(copy, &[CopyStatus::Reserved], CopyStatus::Available, now)
            .await
    }

    /// AVAILABLE -> RESERVED (freed copy claimed by a queued reservation).
    pub async fn earmark(&self, copy: &mut Copy, now: DateTime<Utc>) -> CircResult<()> {
        self.transition(copy, &[CopyStatus::Available], CopyStatus::Reserved, now)
            .await
    }

    /// Any status except BORROWED (and terminal WITHDRAWN) -> WITHDRAWN.
    /// A copy currently lent out cannot leave the collection.
    pub async fn withdraw(
        &self,
        copy: &mut Copy,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> CircResult<()> {
        self.transition_with_note(
            copy,
            &[
                CopyStatus::Available,
                CopyStatus::Reserved,
                CopyStatus::Maintenance,
            ],
            CopyStatus::Withdrawn,
            note,
            now,
        )
        .await
    }

    /// AVAILABLE or RESERVED -> MAINTENANCE, recording the condition note.
    pub async fn flag_maintenance(
        &self,
        copy: &mut Copy,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> CircResult<()> {
        self.transition_with_note(
            copy,
            &[CopyStatus::Available, CopyStatus::Reserved],
            CopyStatus::Maintenance,
            note,
            now,
        )
        .await
    }

    /// MAINTENANCE -> AVAILABLE once repaired.
    pub async fn restore(&self, copy: &mut Copy, now: DateTime<Utc>) -> CircResult<()> {
        self.transition(copy, &[CopyStatus::Maintenance], CopyStatus::Available, now)
            .await
    }

    async fn transition(
        &self,
        copy: &mut Copy,
        allowed_from: &[CopyStatus],
        next: CopyStatus,
        now: DateTime<Utc>,
    ) -> CircResult<()> {
        self.transition_with_note(copy, allowed_from, next, None, now)
            .await
    }

    async fn transition_with_note(
        &self,
        copy: &mut Copy,
        allowed_from: &[CopyStatus],
        next: CopyStatus,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> CircResult<()> {
        if !allowed_from.contains(&copy.status) || !copy.status.can_become(next) {
            return Err(CirculationError::invalid_transition(copy.id, copy.status));
        }
        if let Some(note) = note {
            copy.condition_note = Some(note.to_string());
        }
        tracing::debug!(
            "copy {} transition {} -> {}",
            copy.id,
            copy.status,
            next
        );
        copy.status = next;
        copy.updated_at = now;
        self.repository.copies.persist_copy(copy).await?;
        self.repository.counters.recalculate(copy.book_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccessType;
    use crate::repository::Repository;

    async fn ledger_with_copy() -> (CopyLedger, crate::repository::MemoryRepository, Copy) {
        let (repository, store) = Repository::in_memory();
        let book = store.add_book("Solaris").await;
        let copy = store
            .add_copy(book.id, "INV-1", AccessType::OpenStack)
            .await
            .unwrap();
        (CopyLedger::new(repository), store, copy)
    }

    #[tokio::test]
    async fn test_allocate_from_available() {
        let (ledger, store, mut copy) = ledger_with_copy().await;
        let now = Utc::now();
        ledger.allocate(&mut copy, now).await.unwrap();
        assert_eq!(copy.status, CopyStatus::Borrowed);
        assert_eq!(
            store.get_copy(copy.id).await.unwrap().status,
            CopyStatus::Borrowed
        );
        let book = store.get_book(copy.book_id).await.unwrap();
        assert_eq!(book.borrowed_copies, 1);
        assert_eq!(book.available_copies, 0);
    }

    #[tokio::test]
    async fn test_double_allocate_rejected() {
        let (ledger, _store, mut copy) = ledger_with_copy().await;
        let now = Utc::now();
        ledger.allocate(&mut copy, now).await.unwrap();
        let err = ledger.allocate(&mut copy, now).await.unwrap_err();
        assert_eq!(err.reason(), Some(crate::error::Reason::InvalidTransition));
    }

    #[tokio::test]
    async fn test_withdraw_refused_while_borrowed() {
        let (ledger, _store, mut copy) = ledger_with_copy().await;
        let now = Utc::now();
        ledger.allocate(&mut copy, now).await.unwrap();
        assert!(ledger.withdraw(&mut copy, Some("water damage"), now).await.is_err());
        assert_eq!(copy.status, CopyStatus::Borrowed);
        assert_eq!(copy.condition_note, None);
    }

    #[tokio::test]
    async fn test_maintenance_roundtrip() {
        let (ledger, store, mut copy) = ledger_with_copy().await;
        let now = Utc::now();
        ledger
            .flag_maintenance(&mut copy, Some("loose spine"), now)
            .await
            .unwrap();
        assert_eq!(copy.status, CopyStatus::Maintenance);
        assert_eq!(copy.condition_note.as_deref(), Some("loose spine"));
        ledger.restore(&mut copy, now).await.unwrap();
        assert_eq!(copy.status, CopyStatus::Available);
        let book = store.get_book(copy.book_id).await.unwrap();
        assert_eq!(book.available_copies, 1);
    }
}
