//! Market data: provider contract, Yahoo Finance implementation, circuit breaker.

pub mod circuit_breaker;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use provider::{history_window, DataError, DataProvider};
pub use yahoo::YahooProvider;
