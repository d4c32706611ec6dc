//! Storage for AQMS station metadata.
//!
//! Provides:
//! - [`Session`]: one unit of work (a database transaction) over the
//!   network / station / channel / response-stage tables
//! - [`Store`]: a factory for sessions
//! - [`PgStore`]: PostgreSQL via sqlx, repeatable-read transactions
//! - [`MemoryStore`]: in-process tables for tests and dry runs
//!
//! Sessions are always passed explicitly; nothing in this crate holds
//! global connection state.

pub mod error;
pub mod memory;
pub mod pg;
pub mod session;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, MemoryTables};
pub use pg::PgStore;
pub use session::{from_offdate, open_offdate, to_offdate, Session, Store, OPEN_OFFDATE};
