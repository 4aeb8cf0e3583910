//! The UCT search engine: descend the tree with a pluggable
//! [`TreePolicy`], expand leaves, finish them out with a pluggable
//! [`PlayoutPolicy`], and fold the result back up the path that was
//! walked to reach them.
//!
//! The engine owns no board of its own — `gen_move`/`notify_play` are
//! always handed the board they should search from, mirroring
//! `uct_genmove`/`uct_notify_play` in the original `uct.c`, where the
//! engine and the game state it searches are kept separate so the same
//! engine can be reused across different board objects (useful for the
//! GTP front end, which owns the board).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::board::{is_pass, is_real, is_resign, Board, Coord, Move, Stone, PASS, RESIGN};
use crate::playout::{self, AmafMap, PlayoutPolicy};
use crate::policy::{self, TreePolicy};
use crate::tree::{NodeId, Tree};

/// Every tunable of a running search, plus the tree it has accumulated
/// so far. One `Engine` is meant to live for an entire game: it is fed
/// the opponent's moves through [`Engine::notify_play`] and asked for
/// its own through [`Engine::gen_move`], reusing the subtree under
/// whichever branch the game actually took.
pub struct Engine {
    /// Playout budget for one `gen_move` call, discounted by whatever
    /// the reused subtree already carries (see [`Engine::effective_games`]).
    pub games: u32,
    /// Maximum plies a single playout runs before it is scored as-is.
    pub gamelen: u32,
    /// Visits a leaf needs before it is expanded into children.
    pub expand_p: u32,
    /// Chebyshev-distance radius for move generation during expansion;
    /// `0` disables the filter and considers every empty point.
    pub radar_d: i32,
    /// Threshold above which a tree dump is considered worth showing
    /// (kept for config-surface parity with the original).
    pub dumpthres: u32,
    /// Whether playout moves (not just the tree-descent path) are fed
    /// into the AMAF map.
    pub playout_amaf: bool,
    /// Worker thread count. `0` or `1` run the search inline on the
    /// calling thread — the only way to get a reproducible search with
    /// `force_seed`.
    pub threads: u32,
    /// Resign below this value instead of returning a real move.
    pub resign_ratio: f32,
    /// Early-stop threshold: once the best child has at least 1500
    /// playouts and a value at or above this, stop searching.
    pub loss_threshold: f32,
    /// Deterministic RNG seed. `None` means every search draws from
    /// process entropy.
    pub force_seed: Option<u64>,
    /// Gates `eprintln!` diagnostics, exactly like `UDEBUGL` in the
    /// original: `0` silent, `1` per-move summary, `2` and up verbose.
    pub debug_level: i32,
    pub policy: Box<dyn TreePolicy>,
    pub playout: Box<dyn PlayoutPolicy>,
    tree: Option<Tree>,
    rng: fastrand::Rng,
}

impl Default for Engine {
    fn default() -> Self {
        Engine {
            games: 80_000,
            gamelen: 400,
            expand_p: 2,
            radar_d: 0,
            dumpthres: 1000,
            playout_amaf: false,
            threads: 0,
            resign_ratio: 0.2,
            loss_threshold: 0.85,
            force_seed: None,
            debug_level: 1,
            policy: policy::by_name("ucb1amaf").expect("ucb1amaf is a known policy"),
            playout: playout::by_name("moggy").expect("moggy is a known playout"),
            tree: None,
            rng: fastrand::Rng::new(),
        }
    }
}

impl Engine {
    /// Parse an engine configuration string: comma-separated
    /// `key[=value]` pairs (e.g. `"games=4000,resign_ratio=0.1,policy=ucb1,playout=light"`).
    /// An unrecognized key, a malformed value, or an unknown
    /// `policy`/`playout` name is reported to stderr and otherwise
    /// ignored — `init` itself never fails, matching the original
    /// UCT argument parser's tolerance of garbage config strings.
    pub fn init(arg: &str) -> anyhow::Result<Engine> {
        let mut engine = Engine::default();
        for kv in arg.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = match kv.split_once('=') {
                Some((k, v)) => (k, v),
                None => (kv, ""),
            };
            match key {
                "games" => engine.set_parsed(key, value, |e, v| e.games = v),
                "gamelen" => engine.set_parsed(key, value, |e, v| e.gamelen = v),
                "expand_p" => engine.set_parsed(key, value, |e, v| e.expand_p = v),
                "radar_d" => engine.set_parsed(key, value, |e, v| e.radar_d = v),
                "dumpthres" => engine.set_parsed(key, value, |e, v| e.dumpthres = v),
                "threads" => engine.set_parsed(key, value, |e, v| e.threads = v),
                "resign_ratio" => engine.set_parsed(key, value, |e, v| e.resign_ratio = v),
                "loss_threshold" => engine.set_parsed(key, value, |e, v| e.loss_threshold = v),
                "debug_level" => engine.set_parsed(key, value, |e, v| e.debug_level = v),
                "playout_amaf" => engine.playout_amaf = value.is_empty() || value != "0",
                "force_seed" => match value.parse::<u64>() {
                    Ok(seed) => {
                        engine.force_seed = Some(seed);
                        engine.rng = fastrand::Rng::with_seed(seed);
                    }
                    Err(_) => eprintln!("uct: invalid value '{value}' for 'force_seed', ignored"),
                },
                "policy" => {
                    let name = value.split(':').next().unwrap_or(value);
                    match policy::by_name(name) {
                        Ok(p) => engine.policy = p,
                        Err(e) => eprintln!("uct: {e}, keeping default policy"),
                    }
                }
                "playout" => {
                    let name = value.split(':').next().unwrap_or(value);
                    match playout::by_name(name) {
                        Ok(p) => engine.playout = p,
                        Err(e) => eprintln!("uct: {e}, keeping default playout"),
                    }
                }
                other => eprintln!("uct: unknown config key '{other}', ignored"),
            }
        }
        Ok(engine)
    }

    fn set_parsed<T: std::str::FromStr>(&mut self, key: &str, value: &str, set: impl FnOnce(&mut Self, T)) {
        match value.parse() {
            Ok(v) => set(self, v),
            Err(_) => eprintln!("uct: invalid value '{value}' for '{key}', keeping default"),
        }
    }

    /// Tell the engine a move was actually played, whoever made it, so
    /// it can reuse the matching subtree as the root for the next
    /// search instead of throwing its statistics away.
    pub fn notify_play(&mut self, board: &Board, m: Move) {
        self.prepare_move(board, m.color.other(), m.coord);
    }

    /// Search from `board` with `color` to move and return the chosen
    /// coordinate, which may be [`PASS`] or [`RESIGN`]. Never returns
    /// an error: an unreachable configuration just falls back sanely
    /// (no children at all resolves to `Pass`).
    pub fn gen_move(&mut self, board: &Board, color: Stone) -> Coord {
        self.prepare_move(board, color, RESIGN);
        let games = self.effective_games();

        let played = if self.threads <= 1 {
            let halt = AtomicBool::new(false);
            let tree = self.tree.as_mut().expect("prepare_move always leaves a tree");
            run_playouts(
                self.policy.as_ref(),
                self.playout.as_ref(),
                board,
                color,
                tree,
                games,
                self.gamelen,
                self.expand_p,
                self.radar_d,
                self.playout_amaf,
                self.loss_threshold,
                self.debug_level,
                &mut self.rng,
                &halt,
            )
        } else {
            self.gen_move_parallel(board, color, games)
        };

        let tree = self.tree.as_ref().expect("prepare_move always leaves a tree");
        if self.debug_level >= 1 {
            eprintln!("uct: {played} playouts, tree:\n{}", tree.dump(1));
        }

        match self.policy.choose(tree, tree.root) {
            None => {
                self.tree = None;
                PASS
            }
            Some(best) => {
                let node = tree.get(best);
                let coord = node.coord;
                let value = node.value;
                if value < self.resign_ratio && !is_pass(coord) {
                    self.tree = None;
                    return RESIGN;
                }
                self.tree.as_mut().unwrap().promote_at(best);
                coord
            }
        }
    }

    /// Opening-book move generation is not implemented (see
    /// [`crate::tree::Tree::load`]/[`crate::tree::Tree::save`]); this
    /// just runs a regular search so the config surface the original
    /// exposes still has somewhere to grow into.
    pub fn gen_book(&mut self, board: &Board, color: Stone) -> Coord {
        self.gen_move(board, color)
    }

    /// Opening-book persistence is not implemented; this is a
    /// documented no-op delegating to `Tree::save`'s own stub.
    pub fn dump_book(&self, path: &std::path::Path) -> std::io::Result<()> {
        match &self.tree {
            Some(tree) => tree.save(path),
            None => Ok(()),
        }
    }

    /// Ensure the root matches `board`'s actual state, promoting the
    /// subtree reached by `promote` when one exists, or starting a
    /// fresh tree when none does. Passing [`RESIGN`] for `promote`
    /// skips promotion — used by `gen_move` itself, which only needs
    /// to make sure a tree exists before it starts searching.
    fn prepare_move(&mut self, board: &Board, _color: Stone, promote: Coord) {
        if board.moves == 0 && self.tree.is_some() {
            // A fresh game reusing this engine: last game's tree is stale.
            self.tree = None;
        }
        if self.tree.is_none() {
            self.tree = Some(Tree::init(PASS, board.size));
            if let Some(seed) = self.force_seed {
                self.rng = fastrand::Rng::with_seed(seed);
            }
            if self.debug_level >= 1 {
                eprintln!("uct: fresh tree for a {}x{} board", board.size, board.size);
            }
        }
        if !is_resign(promote) {
            self.tree.as_mut().unwrap().promote_node(promote);
        }
    }

    /// The playout budget for this move: the configured `games`,
    /// discounted by whatever the reused subtree's root already
    /// carries (divided by 1.5, exactly as the original's `uct_genmove`
    /// computes it), or the full budget if the tree is still empty.
    fn effective_games(&self) -> u32 {
        let tree = self.tree.as_ref().expect("prepare_move always leaves a tree");
        if tree.children(tree.root).next().is_some() {
            let root_playouts = tree.get(tree.root).playouts as f32;
            ((self.games as f32) - root_playouts / 1.5).max(0.0) as u32
        } else {
            self.games
        }
    }

    /// Run the search across `self.threads` worker threads, each
    /// searching its own clone of the current tree, joined one at a
    /// time under a mutex/condvar pair exactly like
    /// `finish_mutex`/`finish_cond` in the original: once a majority
    /// have reported in, `halt` is raised so the rest wind down early.
    /// Every worker's tree is then merged back into the shared one.
    fn gen_move_parallel(&mut self, board: &Board, color: Stone, games: u32) -> u32 {
        let threads = self.threads as usize;
        let majority = threads.div_ceil(2).max(1);
        let per_thread_games = (games / self.threads.max(1)).max(1);

        let halt = Arc::new(AtomicBool::new(false));
        let finish = Arc::new((Mutex::new(0usize), Condvar::new()));
        let results: Mutex<Vec<Tree>> = Mutex::new(Vec::with_capacity(threads));
        let seeds: Vec<u64> = (0..threads).map(|_| self.rng.u64(..)).collect();

        let base_tree = self.tree.as_ref().expect("prepare_move always leaves a tree");
        let policy = self.policy.as_ref();
        let playout = self.playout.as_ref();
        let gamelen = self.gamelen;
        let expand_p = self.expand_p;
        let radar_d = self.radar_d;
        let playout_amaf = self.playout_amaf;
        let loss_threshold = self.loss_threshold;
        let debug_level = self.debug_level;

        std::thread::scope(|scope| {
            for (tid, &seed) in seeds.iter().enumerate() {
                let mut worker_tree = base_tree.copy();
                let halt = Arc::clone(&halt);
                let finish = Arc::clone(&finish);
                let results = &results;
                scope.spawn(move || {
                    let mixed_seed = seed ^ (tid as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
                    let mut rng = fastrand::Rng::with_seed(mixed_seed);
                    run_playouts(
                        policy,
                        playout,
                        board,
                        color,
                        &mut worker_tree,
                        per_thread_games,
                        gamelen,
                        expand_p,
                        radar_d,
                        playout_amaf,
                        loss_threshold,
                        debug_level,
                        &mut rng,
                        &halt,
                    );
                    results.lock().unwrap().push(worker_tree);

                    let (lock, cvar) = &*finish;
                    let mut joined = lock.lock().unwrap();
                    *joined += 1;
                    if *joined >= majority {
                        halt.store(true, Ordering::SeqCst);
                    }
                    cvar.notify_all();
                });
            }

            let (lock, cvar) = &*finish;
            let mut joined = lock.lock().unwrap();
            while *joined < majority {
                joined = cvar.wait(joined).unwrap();
            }
        });

        let trees = results.into_inner().unwrap();
        let played = trees.iter().map(|t| t.get(t.root).playouts).sum();
        let main_tree = self.tree.as_mut().unwrap();
        for t in &trees {
            main_tree.merge(t);
        }
        played
    }
}

/// Run up to `games` playouts against `tree`, stopping early if `halt`
/// is raised or the best child has clearly already won (the same
/// 1500-playout/`loss_threshold` check `uct_playouts` makes every 500
/// iterations in the original). Invalid moves discovered mid-descent
/// are discarded without counting against the budget. Returns the
/// number of playouts actually completed.
#[allow(clippy::too_many_arguments)]
fn run_playouts(
    policy: &dyn TreePolicy,
    playout: &dyn PlayoutPolicy,
    board: &Board,
    player_color: Stone,
    tree: &mut Tree,
    games: u32,
    gamelen: u32,
    expand_p: u32,
    radar_d: i32,
    playout_amaf: bool,
    loss_threshold: f32,
    debug_level: i32,
    rng: &mut fastrand::Rng,
    halt: &AtomicBool,
) -> u32 {
    let mut played = 0u32;
    while played < games {
        let completed = uct_playout(
            policy,
            playout,
            board,
            player_color,
            tree,
            gamelen,
            expand_p,
            radar_d,
            playout_amaf,
            rng,
        );
        if completed.is_none() {
            continue;
        }
        played += 1;

        if debug_level >= 2 && played % 10_000 == 0 {
            progress_status(policy, tree, played, games);
        }
        if played % 500 == 0 {
            if let Some(best) = policy.choose(tree, tree.root) {
                let node = tree.get(best);
                if node.playouts >= 1500 && node.value >= loss_threshold {
                    break;
                }
            }
        }
        if halt.load(Ordering::Relaxed) {
            break;
        }
    }
    played
}

fn progress_status(policy: &dyn TreePolicy, tree: &Tree, played: u32, games: u32) {
    match policy.choose(tree, tree.root) {
        Some(best) => {
            let node = tree.get(best);
            eprintln!(
                "uct: [{played}/{games}] best {} playouts={} value={:.3}",
                crate::board::str_coord(node.coord, tree.board_size),
                node.playouts,
                node.value
            );
        }
        None => eprintln!("uct: [{played}/{games}] no children yet"),
    }
}

/// One simulation: descend the tree with `policy`, expanding the leaf
/// it reaches, finish the game out with `playout`, and fold the result
/// back up the path just walked. Mirrors `uct_playout` in the original
/// almost line for line, modulo the arena-indexed tree replacing raw
/// node pointers.
///
/// Returns `None` when the descent hits a move the cloned board
/// rejects (the tree and the real game diverged, e.g. a stale ko); the
/// offending node is deleted and the caller should simply try again.
#[allow(clippy::too_many_arguments)]
fn uct_playout(
    policy: &dyn TreePolicy,
    playout: &dyn PlayoutPolicy,
    board: &Board,
    player_color: Stone,
    tree: &mut Tree,
    gamelen: u32,
    expand_p: u32,
    radar_d: i32,
    playout_amaf: bool,
    rng: &mut fastrand::Rng,
) -> Option<()> {
    let mut b = board.clone();
    let track_amaf = policy.wants_amaf();
    let mut amaf_map: Option<AmafMap> = track_amaf.then(|| vec![None; b.size * b.size]);

    let mut path = vec![tree.root];
    let mut n = tree.root;
    let mut node_color = player_color;
    let mut passes: u32 = if is_pass(b.last_move.coord) { 1 } else { 0 };

    let result = loop {
        let is_leaf = tree.children(n).next().is_none();
        if is_leaf {
            if tree.get(n).playouts >= expand_p {
                expand_node(policy, tree, n, &b, node_color, radar_d);
            }
            let rollout_amaf = if playout_amaf { amaf_map.as_mut() } else { None };
            let to_move_won = playout::run_seeded(playout, &mut b, node_color, gamelen, rollout_amaf, rng);
            let mut r = if to_move_won { 1.0 } else { 0.0 };
            if node_color != player_color {
                r = 1.0 - r;
            }
            break r;
        }

        let next = match policy.select(tree, n) {
            Some(next) => next,
            None => break 0.5,
        };
        let coord = tree.get(next).coord;

        if let Some(map) = amaf_map.as_mut() {
            if is_real(coord) && map[coord].is_none() {
                map[coord] = Some(node_color);
            }
        }

        if is_real(coord) {
            if b.play(Move::new(coord, node_color)).is_err() {
                tree.delete_node(next);
                return None;
            }
            passes = 0;
        } else {
            b.play(Move::new(PASS, node_color)).unwrap();
            passes += 1;
        }

        path.push(next);
        n = next;
        node_color = node_color.other();

        if passes >= 2 {
            let score = b.official_score();
            let player_won = match player_color {
                Stone::Black => score < 0.0,
                Stone::White => score > 0.0,
                Stone::Empty => unreachable!(),
            };
            break if player_won { 1.0 } else { 0.0 };
        }
    };

    backpropagate(policy, tree, &path, player_color, result, amaf_map.as_deref());
    Some(())
}

/// Expand a leaf: one child per legal, sensible move for `color`
/// (restricted to points within `radar_d` of an existing stone, when
/// set) plus a Pass child, each seeded with `policy`'s prior.
fn expand_node(policy: &dyn TreePolicy, tree: &mut Tree, node: NodeId, board: &Board, color: Stone, radar_d: i32) {
    if tree.children(node).next().is_some() {
        return;
    }

    let mut coords: Vec<Coord> = Vec::new();
    for c in 0..board.size * board.size {
        if board.stone_at(c) != Stone::Empty {
            continue;
        }
        if radar_d > 0 && !near_existing_stone(board, c, radar_d) {
            continue;
        }
        if board.valid_move(Move::new(c, color), true) {
            coords.push(c);
        }
    }
    coords.push(PASS);

    let track_amaf = policy.wants_amaf();
    let children = tree.expand_many(node, &coords, track_amaf);
    for (&coord, &child) in coords.iter().zip(children.iter()) {
        tree.get_mut(child).value = policy.prior(board, coord);
    }
}

/// Whether any stone on the board lies within Chebyshev distance
/// `radar_d` of `c`, used by [`expand_node`]'s `radar_d` move filter.
fn near_existing_stone(board: &Board, c: Coord, radar_d: i32) -> bool {
    let (cx, cy) = board.coord_to_xy(c);
    for p in 0..board.size * board.size {
        if board.stone_at(p) == Stone::Empty {
            continue;
        }
        let (px, py) = board.coord_to_xy(p);
        let dx = (cx as i32 - px as i32).abs();
        let dy = (cy as i32 - py as i32).abs();
        if dx.max(dy) <= radar_d {
            return true;
        }
    }
    false
}

/// Fold a completed playout's outcome back into every node on the path
/// from the root to where the playout left off. Each node's recorded
/// result is from the perspective of whoever moved into it: the root
/// and every odd-depth node (moves made by `player_color`) record
/// `result` as-is; even-depth descendants (the opponent's moves)
/// record `1.0 - result`. AMAF credit, when tracked, is folded into
/// every node on the path the same way `update_amaf` does for a
/// regular child.
fn backpropagate(
    policy: &dyn TreePolicy,
    tree: &mut Tree,
    path: &[NodeId],
    player_color: Stone,
    result: f32,
    amaf_map: Option<&AmafMap>,
) {
    let amaf_records: Vec<(Coord, f32)> = match amaf_map {
        Some(map) if policy.wants_amaf() => map
            .iter()
            .enumerate()
            .filter_map(|(c, slot)| {
                slot.map(|color| {
                    let r = if color == player_color { result } else { 1.0 - result };
                    (c, r)
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    for (depth, &node) in path.iter().enumerate() {
        let mover_is_player = depth == 0 || depth % 2 == 1;
        let node_result = if mover_is_player { result } else { 1.0 - result };
        policy.update(tree, node, node_result);
        if !amaf_records.is_empty() {
            policy.update_amaf(tree, node, &amaf_records);
        }
    }
}
