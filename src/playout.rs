//! Playout policies: how a game is finished out randomly from a given
//! board so the result can be fed back into the search tree.
//!
//! `old` is a direct port of the capture/self-atari heuristics this
//! crate's random playouts have always used; `moggy` adds the floating
//! point probability knobs Pachi's default `uct_playout` uses (skewed
//! toward the last-move neighborhood rather than pure capture chasing);
//! `light` is a pure-random baseline kept for A/B comparison and for
//! tests that want a cheap, fast, policy-agnostic playout.

use crate::board::{is_real, Board, Coord, Move, Stone, PASS};
use crate::constants::{PROB_HEURISTIC_CAPTURE, PROB_RSAREJECT, PROB_SSAREJECT};

/// Records, for every coordinate first played during a playout, which
/// color played it — the raw material the AMAF/RAVE tree policy needs.
/// `None` means the point was never played.
pub type AmafMap = Vec<Option<Stone>>;

/// A pluggable random-game-finisher, driven one full game at a time.
/// `to_move` is the color to move on entry; `max_plies` bounds how many
/// stones can be placed before the playout is simply scored as-is
/// (protects against pathological non-terminating sequences). Returns
/// `true` iff `to_move` won the resulting position.
pub trait PlayoutPolicy: Send + Sync {
    /// Pick one move for `color` to play next, or `None` to pass. This
    /// is the one piece of behavior that actually distinguishes `old`,
    /// `moggy`, and `light` from one another; [`PlayoutPolicy::playout`]
    /// and [`run_seeded`] both drive a full game through it via
    /// [`drive`], so the policy is always used as the opaque plug-in
    /// spec §4.2 calls for rather than being picked back apart by the
    /// caller.
    fn choose_move(&self, board: &Board, color: Stone, rng: &mut fastrand::Rng) -> Option<Coord>;

    /// Run one full rollout to conclusion from `board`, driven by
    /// [`PlayoutPolicy::choose_move`]. Owns its own unseeded RNG, since
    /// the black-box interface spec §4.2 describes takes none; callers
    /// that need reproducibility (the engine's `force_seed` path) use
    /// [`run_seeded`] instead, which threads an explicit RNG through the
    /// same [`drive`] loop.
    fn playout(&self, board: &mut Board, to_move: Stone, max_plies: u32, amaf: Option<&mut AmafMap>) -> bool {
        let mut rng = fastrand::Rng::new();
        drive(board, to_move, max_plies, amaf, self, &mut rng)
    }
}

/// Drive a full playout using `policy.choose_move` as the per-ply move
/// selector, until two consecutive passes or `max_plies` plies, then
/// score it. Shared by [`PlayoutPolicy::playout`] and [`run_seeded`] so
/// every entry point runs a rollout the same way, dispatching through
/// the trait object rather than re-deriving which policy is active.
fn drive(
    board: &mut Board,
    to_move: Stone,
    max_plies: u32,
    mut amaf: Option<&mut AmafMap>,
    policy: &(impl PlayoutPolicy + ?Sized),
    rng: &mut fastrand::Rng,
) -> bool {
    let mut color = to_move;
    let mut consecutive_passes = 0u32;
    let start_moves = board.moves;

    while consecutive_passes < 2 && (board.moves - start_moves) < max_plies {
        match policy.choose_move(board, color, rng) {
            Some(coord) => {
                if board.play(Move::new(coord, color)).is_ok() {
                    if let Some(map) = amaf.as_deref_mut() {
                        if map[coord].is_none() {
                            map[coord] = Some(color);
                        }
                    }
                    consecutive_passes = 0;
                } else {
                    board.play(Move::new(PASS, color)).unwrap();
                    consecutive_passes += 1;
                }
            }
            None => {
                board.play(Move::new(PASS, color)).unwrap();
                consecutive_passes += 1;
            }
        }
        color = color.other();
    }

    let score = board.fast_score();
    match to_move {
        Stone::Black => score > 0.0,
        Stone::White => score < 0.0,
        Stone::Empty => unreachable!(),
    }
}

/// Find a move that saves the group at `coord` (belonging to `color`)
/// currently in atari, by capturing the attacker or extending. Mirrors
/// the capture-chasing heuristic from this crate's original random
/// playout driver.
fn fix_atari(board: &Board, coord: Coord, color: Stone) -> Vec<Coord> {
    let gid = board.group_at(coord);
    if board.stone_at(coord) != color || board.group_libs(gid) != 1 {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for c in 0..board.size * board.size {
        if board.stone_at(c) != Stone::Empty {
            continue;
        }
        let m = Move::new(c, color);
        if board.valid_move(m, false) {
            let mut scratch = board.clone();
            if scratch.play(m).is_ok() {
                let new_gid = scratch.group_at(coord);
                if scratch.group_libs(new_gid) > 1 {
                    candidates.push(c);
                }
            }
        }
    }
    candidates
}

/// Whether playing `m` would leave the mover's own group in atari, i.e.
/// it is a self-atari and should usually be avoided.
fn leaves_self_atari(board: &Board, m: Move) -> bool {
    let mut scratch = board.clone();
    if scratch.play(m).is_err() {
        return false;
    }
    let gid = scratch.group_at(m.coord);
    scratch.group_libs(gid) == 1
}

fn orthogonal_neighbors(board: &Board, c: Coord) -> Vec<Coord> {
    let (x, y) = board.coord_to_xy(c);
    let s = board.size;
    [
        (x > 0).then(|| board.xy_to_coord(x - 1, y)),
        (x + 1 < s).then(|| board.xy_to_coord(x + 1, y)),
        (y > 0).then(|| board.xy_to_coord(x, y - 1)),
        (y + 1 < s).then(|| board.xy_to_coord(x, y + 1)),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn reject_self_atari(board: &Board, m: Move, rng: &mut fastrand::Rng, is_random_choice: bool) -> bool {
    let reject_prob = if is_random_choice { PROB_RSAREJECT } else { PROB_SSAREJECT };
    rng.f64() < reject_prob && leaves_self_atari(board, m)
}

/// Try a capture response in the last move's neighborhood, with
/// probability `PROB_HEURISTIC_CAPTURE`, falling back to a random move.
fn capture_then_random(board: &Board, color: Stone, rng: &mut fastrand::Rng) -> Option<Coord> {
    if is_real(board.last_move.coord) && rng.f64() < PROB_HEURISTIC_CAPTURE {
        for n in orthogonal_neighbors(board, board.last_move.coord) {
            if board.stone_at(n) == color.other() {
                for mv in fix_atari(board, n, color.other()) {
                    let m = Move::new(mv, color);
                    if board.valid_move(m, true) && !reject_self_atari(board, m, rng, false) {
                        return Some(mv);
                    }
                }
            }
        }
    }
    random_move(board, color, rng)
}

/// Pick a uniformly random legal, non-self-atari move for `color`,
/// starting the scan at a random offset so early points in scan order
/// aren't systematically favored.
fn random_move(board: &Board, color: Stone, rng: &mut fastrand::Rng) -> Option<Coord> {
    let n = board.size * board.size;
    let start = rng.usize(0..n);

    let mut candidates = Vec::new();
    for i in 0..n {
        let c = (start + i) % n;
        if board.stone_at(c) == Stone::Empty {
            candidates.push(c);
        }
    }

    for i in 0..candidates.len() {
        let j = i + rng.usize(0..(candidates.len() - i));
        candidates.swap(i, j);
        let c = candidates[i];
        let m = Move::new(c, color);
        if board.valid_move(m, true) && !reject_self_atari(board, m, rng, true) {
            return Some(c);
        }
    }

    None
}

/// Port of this crate's historical `mcplayout` heuristics: try a capture
/// response near the last move with high probability, otherwise a
/// random legal, non-self-atari move.
pub struct OldPlayout;

impl PlayoutPolicy for OldPlayout {
    fn choose_move(&self, board: &Board, color: Stone, rng: &mut fastrand::Rng) -> Option<Coord> {
        capture_then_random(board, color, rng)
    }
}

/// Pachi-style default playout: same capture-chasing idea as
/// [`OldPlayout`], kept as a distinct type so the two can diverge (e.g.
/// pattern-weighted move choice) without disturbing callers that name
/// `old` explicitly.
pub struct MoggyPlayout;

impl PlayoutPolicy for MoggyPlayout {
    fn choose_move(&self, board: &Board, color: Stone, rng: &mut fastrand::Rng) -> Option<Coord> {
        capture_then_random(board, color, rng)
    }
}

/// Pure uniform-random legal moves, no heuristics. Useful as a cheap
/// baseline and in tests where heuristic-driven nondeterminism would
/// make assertions brittle.
pub struct LightPlayout;

impl PlayoutPolicy for LightPlayout {
    fn choose_move(&self, board: &Board, color: Stone, rng: &mut fastrand::Rng) -> Option<Coord> {
        random_move(board, color, rng)
    }
}

/// Test/engine hook: run a playout with an explicit RNG so results are
/// reproducible (`Engine`'s `force_seed` config key uses this path).
/// Dispatches through `policy.choose_move` the same as
/// [`PlayoutPolicy::playout`] does, so a seeded search sees the exact
/// same per-ply behavior as an unseeded one, just with a caller-chosen
/// draw.
pub fn run_seeded(
    policy: &dyn PlayoutPolicy,
    board: &mut Board,
    to_move: Stone,
    max_plies: u32,
    amaf: Option<&mut AmafMap>,
    rng: &mut fastrand::Rng,
) -> bool {
    drive(board, to_move, max_plies, amaf, policy, rng)
}

/// Construct the playout policy named by a config string ("old",
/// "moggy", "light"), matching the engine's `playout=` config key.
pub fn by_name(name: &str) -> anyhow::Result<Box<dyn PlayoutPolicy>> {
    match name {
        "old" => Ok(Box::new(OldPlayout)),
        "moggy" => Ok(Box::new(MoggyPlayout)),
        "light" => Ok(Box::new(LightPlayout)),
        other => anyhow::bail!("unknown playout policy: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_playout_terminates_on_empty_board() {
        let mut board = Board::standard();
        board.play(Move::new(board.xy_to_coord(4, 4), Stone::Black)).unwrap();
        let mut rng = fastrand::Rng::with_seed(42);
        let mut amaf: AmafMap = vec![None; board.size * board.size];
        let moves_before = board.moves;
        let _won = run_seeded(&LightPlayout, &mut board, Stone::White, 500, Some(&mut amaf), &mut rng);
        assert!(board.moves > moves_before);
    }

    #[test]
    fn old_playout_terminates_and_scores() {
        let mut board = Board::standard();
        board.play(Move::new(board.xy_to_coord(4, 4), Stone::Black)).unwrap();
        let mut rng = fastrand::Rng::with_seed(7);
        let _won = run_seeded(&OldPlayout, &mut board, Stone::White, 500, None, &mut rng);
    }

    #[test]
    fn fix_atari_finds_capturing_move() {
        let mut board = Board::standard();
        let center = board.xy_to_coord(4, 4);
        board.play(Move::new(center, Stone::White)).unwrap();
        board.play(Move::new(board.xy_to_coord(3, 4), Stone::Black)).unwrap();
        board.play(Move::new(board.xy_to_coord(8, 8), Stone::White)).unwrap();
        board.play(Move::new(board.xy_to_coord(5, 4), Stone::Black)).unwrap();
        board.play(Move::new(board.xy_to_coord(8, 7), Stone::White)).unwrap();
        board.play(Move::new(board.xy_to_coord(4, 3), Stone::Black)).unwrap();

        let gid = board.group_at(center);
        assert_eq!(board.group_libs(gid), 1);

        let saves = fix_atari(&board, center, Stone::White);
        assert!(saves.contains(&board.xy_to_coord(4, 5)));
    }

    #[test]
    fn amaf_map_records_first_mover_only() {
        let mut board = Board::standard();
        let mut rng = fastrand::Rng::with_seed(1);
        let mut amaf: AmafMap = vec![None; board.size * board.size];
        run_seeded(&LightPlayout, &mut board, Stone::Black, 500, Some(&mut amaf), &mut rng);
        for slot in &amaf {
            if let Some(color) = slot {
                assert!(matches!(color, Stone::Black | Stone::White));
            }
        }
    }

    #[test]
    fn by_name_resolves_known_policies() {
        assert!(by_name("old").is_ok());
        assert!(by_name("moggy").is_ok());
        assert!(by_name("light").is_ok());
        assert!(by_name("nonexistent").is_err());
    }

    /// A fourth policy, not one of `old`/`moggy`/`light`, that always
    /// passes. Exercises that `drive`/`run_seeded` dispatch through
    /// `choose_move` on whatever `PlayoutPolicy` they're handed, rather
    /// than special-casing the three built-in types.
    struct AlwaysPassPlayout;

    impl PlayoutPolicy for AlwaysPassPlayout {
        fn choose_move(&self, _board: &Board, _color: Stone, _rng: &mut fastrand::Rng) -> Option<Coord> {
            None
        }
    }

    #[test]
    fn custom_playout_policy_dispatches_through_choose_move() {
        let mut board = Board::standard();
        let moves_before = board.moves;
        let mut rng = fastrand::Rng::with_seed(1);
        let _won = run_seeded(&AlwaysPassPlayout, &mut board, Stone::Black, 500, None, &mut rng);
        // Both sides pass immediately: exactly two plies played, no stones placed.
        assert_eq!(board.moves, moves_before + 2);
        assert!((0..board.size * board.size).all(|c| board.stone_at(c) == Stone::Empty));
    }
}
