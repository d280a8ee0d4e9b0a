//! Durable state: entities, the persistence collaborator trait and its
//! in-memory and Postgres adapters.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;

pub use memory::MemoryReconStore;
pub use postgres::PgReconStore;
pub use repository::ReconStore;
