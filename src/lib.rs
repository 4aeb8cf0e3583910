//! Michi-Rust: A minimalistic Go MCTS engine.
//!
//! This crate provides a Monte Carlo Tree Search (MCTS) based Go engine,
//! reimplemented in Rust from the original Michi project and Pachi's
//! `board.c`/`uct.c`.
//!
//! ## Modules
//!
//! - [`constants`] - Board dimensions and engine tuning defaults
//! - [`board`] - Group/liberty Go board: stones, captures, legality, scoring
//! - [`tree`] - Arena-indexed search tree storage
//! - [`policy`] - Tree-selection policies (UCB1, UCB1-Tuned, UCB1-AMAF/RAVE)
//! - [`playout`] - Random playout policies used to score a search leaf
//! - [`mcts`] - The `Engine`: UCT search over `board`/`tree`/`policy`/`playout`
//! - [`gtp`] - Go Text Protocol front end wired onto `Engine`/`Board`
//!
//! ## Example
//!
//! ```
//! use michi_rust::board::{Board, Move, Stone};
//! use michi_rust::mcts::Engine;
//!
//! let board = Board::standard();
//! let mut engine = Engine::init("games=200,threads=0,force_seed=1").unwrap();
//! let best = engine.gen_move(&board, Stone::Black);
//! let _ = Move::new(best, Stone::Black);
//! ```

pub mod board;
pub mod constants;
pub mod gtp;
pub mod mcts;
pub mod playout;
pub mod policy;
pub mod tree;
