//! Database module for the PostgreSQL data service.

mod pool;

pub use pool::*;
