//! Chess engine core.
//!
//! The pieces a protocol frontend needs to play chess: a bitboard [`board`]
//! with incremental make/unmake and staged move generation, a phase-blended
//! [`eval`], and a [`search`] built around iterative-deepening PVS with a
//! shared lock-free transposition table and lazy-SMP helper threads.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sable::board::Board;
//! use sable::search::{tb::Tablebases, tt::TransTable, Search, SearchMode};
//!
//! let tt = Arc::new(TransTable::new(16));
//! let mut search = Search::new(tt, Arc::new(Tablebases::none()));
//! search.set_callback(Arc::new(|info| {
//!     if let Some(best) = info.best_move {
//!         println!("bestmove {best:?}");
//!     }
//! }));
//! let board = Board::new();
//! search.iterate(&board, &SearchMode::depth(10));
//! ```

pub mod board;
pub mod eval;
pub mod perft;
pub mod search;
