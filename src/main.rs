//! Michi-Rust: A minimalistic Go engine.
//!
//! This is a Rust reimplementation of Michi, originally written in Python
//! and later ported to C.
//!
//! ## Usage
//!
//! - `michi-rust` - Show a demo
//! - `michi-rust gtp` - Start GTP server for GUI integration
//! - `michi-rust demo` - Run the MCTS demo

use clap::{Parser, Subcommand};

use michi_rust::board::{is_pass, is_resign, str_coord, Board, Move, Stone};
use michi_rust::gtp::GtpEngine;
use michi_rust::mcts::Engine;

/// Michi-Rust: A minimalistic Go MCTS engine
#[derive(Parser)]
#[command(name = "michi-rust")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the GTP (Go Text Protocol) server for use with GUI applications
    Gtp {
        /// Engine configuration string, e.g. "games=4000,policy=ucb1,playout=light"
        #[arg(long, default_value = "")]
        engine: String,
    },
    /// Run a simple demo of the engine
    Demo,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Gtp { engine }) => {
            let mut gtp = GtpEngine::with_config(&engine);
            gtp.run();
        }
        Some(Commands::Demo) | None => {
            run_demo();
        }
    }
}

fn run_demo() {
    println!("Michi-Rust: Minimalistic Go MCTS Engine\n");

    let mut board = Board::standard();
    let mut engine = Engine::init("games=1000").unwrap();

    println!("Running a short self-play game...");
    let mut consecutive_passes = 0;
    for ply in 0..20 {
        let color = if ply % 2 == 0 { Stone::Black } else { Stone::White };
        let coord = engine.gen_move(&board, color);

        if is_resign(coord) {
            println!("{color:?} resigns.");
            break;
        }

        let m = Move::new(coord, color);
        board.play(m).expect("Engine::gen_move always returns a legal move");
        engine.notify_play(&board, m);

        if is_pass(coord) {
            println!("{color:?} passes.");
            consecutive_passes += 1;
            if consecutive_passes >= 2 {
                break;
            }
        } else {
            println!("{color:?} plays {}.", str_coord(coord, board.size));
            consecutive_passes = 0;
        }
    }

    println!("{board}");
    println!("Score (positive favors White, includes komi): {:.1}", board.official_score());
}
