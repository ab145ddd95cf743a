//! Library circulation and inventory-allocation core.
//!
//! Owns the per-copy state machine (AVAILABLE, RESERVED, BORROWED,
//! MAINTENANCE, WITHDRAWN), the per-book FIFO reservation queue, the loan
//! lifecycle, and the orchestrator that ties them into atomic allocation
//! workflows: direct borrow, reservation fulfillment, and return with
//! cascade to the next waiting patron.
//!
//! This crate is a library, not a service: transport, persistence and
//! authentication live in the embedding application and reach the core
//! through the collaborator traits in [`repository`].

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod repository;
pub mod services;

pub use config::CirculationConfig;
pub use error::{CircResult, CirculationError, Entity, ErrorKind, Reason};

/// Top-level handle bundling configuration and services
#[derive(Clone)]
pub struct Circulation {
    pub config: Arc<CirculationConfig>,
    pub services: Arc<services::Services>,
}

impl Circulation {
    pub fn new(repository: repository::Repository, config: CirculationConfig) -> Self {
        let services = services::Services::new(repository, config.clone());
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
