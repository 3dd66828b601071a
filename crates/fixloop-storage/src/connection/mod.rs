//! Connection management: one serialized writer, pooled readers.

pub mod pool;
pub mod pragmas;
pub mod writer;

pub use pool::ReadPool;
pub use pragmas::{apply_pragmas, apply_read_pragmas, verify_wal_mode};
pub use writer::with_immediate_transaction;
