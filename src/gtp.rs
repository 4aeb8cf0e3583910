//! Go Text Protocol (GTP) implementation.
//!
//! GTP is a text-based protocol for communicating with Go-playing programs.
//! This module implements GTP version 2, allowing the engine to be used
//! with graphical Go interfaces like Sabaki, GoGui, or Lizzie.
//!
//! ## Supported Commands
//!
//! - `name` - Return engine name
//! - `version` - Return engine version
//! - `protocol_version` - Return GTP protocol version (2)
//! - `list_commands` - List all supported commands
//! - `known_command <cmd>` - Check if a command is supported
//! - `quit` - Exit the program
//! - `boardsize <size>` - Reset to an empty board of the given size
//! - `clear_board` - Reset the board to empty
//! - `komi <value>` - Set komi
//! - `play <color> <vertex>` - Play a move
//! - `genmove <color>` - Generate and play a move for the given color
//!
//! ## Example
//!
//! ```ignore
//! use michi_rust::gtp::GtpEngine;
//! let mut engine = GtpEngine::new();
//! engine.run();
//! ```

use std::io::{self, BufRead, Write};

use crate::board::{is_pass, is_resign, parse_coord, str_coord, Board, Move, Stone};
use crate::mcts::Engine;

/// The list of known GTP commands.
const KNOWN_COMMANDS: &[&str] = &[
    "boardsize",
    "clear_board",
    "cputime",
    "genmove",
    "help",
    "known_command",
    "komi",
    "list_commands",
    "name",
    "play",
    "protocol_version",
    "quit",
    "showboard",
    "version",
];

/// GTP engine state: the board being played on and the search engine
/// driving `genmove`.
pub struct GtpEngine {
    board: Board,
    engine: Engine,
    start_time: std::time::Instant,
}

impl GtpEngine {
    /// Create a new GTP engine with default board size and search config.
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Create a new GTP engine whose search engine is parsed from `arg`
    /// (see [`Engine::init`]).
    pub fn with_config(arg: &str) -> Self {
        let board = Board::standard();
        let engine = Engine::init(arg).unwrap_or_default();
        GtpEngine { board, engine, start_time: std::time::Instant::now() }
    }

    /// Run the GTP command loop, reading from stdin and writing to stdout.
    pub fn run(&mut self) {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stderr = io::stderr();

        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };

            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (id, command_line) = Self::parse_id(line);

            let parts: Vec<&str> = command_line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }

            let command = parts[0].to_lowercase();
            let args = &parts[1..];

            let response = self.execute(&command, args);

            if self.engine.debug_level >= 1 {
                eprint!("{}", self.board);
                stderr.flush().unwrap();
            }

            let (success, message) = response;
            let prefix = if success { '=' } else { '?' };
            let id_str = id.map(|i| i.to_string()).unwrap_or_default();

            writeln!(stdout, "{prefix}{id_str} {message}\n").unwrap();
            stdout.flush().unwrap();

            if command == "quit" {
                break;
            }
        }
    }

    /// Parse an optional numeric command ID from the beginning of the line.
    fn parse_id(line: &str) -> (Option<u32>, &str) {
        let trimmed = line.trim();
        let mut chars = trimmed.char_indices();

        if let Some((_, c)) = chars.next() {
            if c.is_ascii_digit() {
                let end = chars
                    .find(|(_, c)| !c.is_ascii_digit())
                    .map(|(i, _)| i)
                    .unwrap_or(trimmed.len());

                if let Ok(id) = trimmed[..end].parse::<u32>() {
                    return (Some(id), trimmed[end..].trim());
                }
            }
        }

        (None, trimmed)
    }

    fn parse_color(s: &str) -> Option<Stone> {
        match s.to_lowercase().as_str() {
            "b" | "black" => Some(Stone::Black),
            "w" | "white" => Some(Stone::White),
            _ => None,
        }
    }

    /// Execute a GTP command and return (success, response).
    fn execute(&mut self, command: &str, args: &[&str]) -> (bool, String) {
        match command {
            "name" => (true, "michi-rust".to_string()),

            "version" => (true, env!("CARGO_PKG_VERSION").to_string()),

            "protocol_version" => (true, "2".to_string()),

            "list_commands" => (true, KNOWN_COMMANDS.join("\n")),

            "known_command" => {
                if args.is_empty() {
                    return (false, "missing argument".to_string());
                }
                let known = KNOWN_COMMANDS.contains(&args[0].to_lowercase().as_str());
                (true, if known { "true" } else { "false" }.to_string())
            }

            "quit" => (true, String::new()),

            "boardsize" => {
                if args.is_empty() {
                    return (false, "missing argument".to_string());
                }
                match args[0].parse::<usize>() {
                    Ok(size) if size >= 2 => {
                        let komi = self.board.komi;
                        self.board = Board::new(size);
                        self.board.komi = komi;
                        self.engine = Engine::init("").unwrap();
                        (true, String::new())
                    }
                    Ok(size) => (false, format!("unacceptable size: {size}")),
                    Err(_) => (false, "invalid size".to_string()),
                }
            }

            "clear_board" => {
                self.board.clear();
                (true, String::new())
            }

            "komi" => {
                if args.is_empty() {
                    return (false, "missing argument".to_string());
                }
                match args[0].parse::<f32>() {
                    Ok(komi) => {
                        self.board.komi = komi;
                        (true, String::new())
                    }
                    Err(_) => (false, "invalid komi".to_string()),
                }
            }

            "play" => {
                if args.len() < 2 {
                    return (false, "missing arguments".to_string());
                }
                let Some(color) = Self::parse_color(args[0]) else {
                    return (false, "invalid color".to_string());
                };
                let coord = parse_coord(args[1], self.board.size);
                let m = Move::new(coord, color);
                match self.board.play(m) {
                    Ok(_) => {
                        self.engine.notify_play(&self.board, m);
                        (true, String::new())
                    }
                    Err(e) => (false, e.to_string()),
                }
            }

            "genmove" => {
                if args.is_empty() {
                    return (false, "missing argument".to_string());
                }
                let Some(color) = Self::parse_color(args[0]) else {
                    return (false, "invalid color".to_string());
                };

                let coord = self.engine.gen_move(&self.board, color);
                if is_resign(coord) {
                    return (true, "resign".to_string());
                }

                let m = Move::new(coord, color);
                self.board.play(m).expect("Engine::gen_move always returns a legal move");
                self.engine.notify_play(&self.board, m);

                if is_pass(coord) {
                    (true, "pass".to_string())
                } else {
                    (true, str_coord(coord, self.board.size))
                }
            }

            "showboard" => {
                let board_str = self.board.to_string();
                eprint!("{board_str}");
                (true, format!("\n{}", board_str.trim_end()))
            }

            "cputime" => {
                let elapsed = self.start_time.elapsed().as_secs_f64();
                (true, format!("{elapsed:.3}"))
            }

            "help" => (true, KNOWN_COMMANDS.join("\n")),

            _ => (false, format!("unknown command: {command}")),
        }
    }
}

impl Default for GtpEngine {
    fn default() -> Self {
        GtpEngine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_engine() -> GtpEngine {
        GtpEngine::with_config("games=20,threads=0,force_seed=1")
    }

    #[test]
    fn test_parse_id_with_id() {
        let (id, cmd) = GtpEngine::parse_id("123 name");
        assert_eq!(id, Some(123));
        assert_eq!(cmd, "name");
    }

    #[test]
    fn test_parse_id_without_id() {
        let (id, cmd) = GtpEngine::parse_id("name");
        assert_eq!(id, None);
        assert_eq!(cmd, "name");
    }

    #[test]
    fn test_name_command() {
        let mut engine = fast_engine();
        let (success, response) = engine.execute("name", &[]);
        assert!(success);
        assert_eq!(response, "michi-rust");
    }

    #[test]
    fn test_protocol_version() {
        let mut engine = fast_engine();
        let (success, response) = engine.execute("protocol_version", &[]);
        assert!(success);
        assert_eq!(response, "2");
    }

    #[test]
    fn test_known_command() {
        let mut engine = fast_engine();

        let (success, response) = engine.execute("known_command", &["name"]);
        assert!(success);
        assert_eq!(response, "true");

        let (success, response) = engine.execute("known_command", &["unknown_cmd"]);
        assert!(success);
        assert_eq!(response, "false");
    }

    #[test]
    fn test_boardsize() {
        let mut engine = fast_engine();

        let (success, _) = engine.execute("boardsize", &["13"]);
        assert!(success);
        assert_eq!(engine.board.size, 13);

        let (success, _) = engine.execute("boardsize", &["1"]);
        assert!(!success);
    }

    #[test]
    fn test_play_and_clear() {
        let mut engine = fast_engine();

        let (success, _) = engine.execute("play", &["black", "D4"]);
        assert!(success);

        let (success, _) = engine.execute("clear_board", &[]);
        assert!(success);
        assert_eq!(engine.board.moves, 0);
    }

    #[test]
    fn test_play_rejects_illegal_move() {
        let mut engine = fast_engine();
        engine.execute("play", &["black", "D4"]);
        let (success, _) = engine.execute("play", &["white", "D4"]);
        assert!(!success);
    }

    #[test]
    fn test_genmove_returns_a_vertex() {
        let mut engine = fast_engine();
        let (success, response) = engine.execute("genmove", &["black"]);
        assert!(success);
        assert!(!response.is_empty());
    }
}
