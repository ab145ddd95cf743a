//! Business logic services

pub mod circulation;
pub mod ledger;
pub mod loans;
pub mod queue;

use crate::{config::CirculationConfig, repository::Repository};

pub use circulation::CirculationService;
pub use ledger::CopyLedger;
pub use loans::LoanLifecycle;
pub use queue::ReservationQueue;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub ledger: CopyLedger,
    pub queue: ReservationQueue,
    pub loans: LoanLifecycle,
    pub circulation: CirculationService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: CirculationConfig) -> Self {
        let ledger = CopyLedger::new(repository.clone());
        let queue = ReservationQueue::new(
            repository.clone(),
            ledger.clone(),
            config.reservation.clone(),
        );
        let loans = LoanLifecycle::new(
            repository.clone(),
            ledger.clone(),
            queue.clone(),
            config.clone(),
        );
        let circulation =
            CirculationService::new(repository, ledger.clone(), queue.clone(), loans.clone());
        Self {
            ledger,
            queue,
            loans,
            circulation,
        }
    }
}
