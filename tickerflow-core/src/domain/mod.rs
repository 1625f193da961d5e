//! Domain types for TickerFlow

pub mod bar;
pub mod order;
pub mod position;
pub mod symbol;
pub mod watchlist;

pub use bar::Bar;
pub use order::{OrderOutcome, OrderRequest};
pub use position::PositionSnapshot;
pub use symbol::{Symbol, SymbolError, MAX_SYMBOL_LEN};
pub use watchlist::{EntryError, LimitPrice, WatchlistEntry};
