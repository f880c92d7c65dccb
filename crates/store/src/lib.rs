//! Transactional repository for orders, inventory and notifications.
//!
//! The store is the only shared mutable resource in the system; its
//! transaction boundary is the concurrency control mechanism. Multi-step
//! sequences run inside a [`StoreTransaction`], single-row updates are
//! atomic on their own.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use repository::{OrderStore, StoreTransaction};
