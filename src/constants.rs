//! Board size configuration and MCTS/playout tuning constants.
//!
//! # Board Size Configuration
//!
//! The default board size is controlled by Cargo features:
//! - `board9x9` (default): 9x9 board
//! - `board13x13`: 13x13 board
//!
//! This only sets [`N`], the size [`crate::board::Board::standard`]
//! builds at; `Board::new(size)` accepts any size at runtime (the GTP
//! front end's `boardsize` command uses this to resize on the fly).
//!
//! ```sh
//! cargo build                           # 9x9 (default)
//! cargo build --no-default-features --features board13x13  # 13x13
//! ```

/// Default board size (NxN) for [`crate::board::Board::standard`].
#[cfg(feature = "board9x9")]
pub const N: usize = 9;

#[cfg(feature = "board13x13")]
pub const N: usize = 13;

#[cfg(all(feature = "board9x9", feature = "board13x13"))]
compile_error!("Cannot enable both 'board9x9' and 'board13x13' features at the same time");

#[cfg(not(any(feature = "board9x9", feature = "board13x13")))]
compile_error!("Must enable exactly one board size feature: 'board9x9' or 'board13x13'");

// =============================================================================
// MCTS (Monte Carlo Tree Search) Parameters
// =============================================================================

/// RAVE equivalence parameter - controls RAVE vs UCB balance. See
/// [`crate::policy::Ucb1Amaf`].
pub const RAVE_EQUIV: usize = 3500;

// =============================================================================
// Playout Heuristic Probabilities
// =============================================================================

/// Probability of using the capture heuristic in playouts.
pub const PROB_HEURISTIC_CAPTURE: f64 = 0.9;

/// Probability of rejecting self-atari suggested by the capture heuristic.
pub const PROB_SSAREJECT: f64 = 0.9;

/// Probability of rejecting self-atari from a uniformly random move.
pub const PROB_RSAREJECT: f64 = 0.5;
