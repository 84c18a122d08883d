//! Concrete connections and ledgers

pub mod memory;
pub mod postgres;

pub use memory::{MemoryConnection, MemoryLedger};
pub use postgres::{PgConnectionProvider, PgLedger};
