pub mod breaks;
pub mod config;
pub mod session;
pub mod shift;
pub mod stats;
