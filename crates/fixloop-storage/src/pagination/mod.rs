//! Keyset cursor pagination. No OFFSET; each page seeks past the last key.

pub mod keyset;

pub use keyset::{finish_page, PaginationCursor};
