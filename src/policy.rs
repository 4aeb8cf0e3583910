//! Tree-selection policies: how the search walks down an existing tree
//! and how it folds a playout's result back into the statistics it
//! passed through.
//!
//! Three policies are provided, in increasing order of sophistication,
//! mirroring the escalation a from-scratch MCTS implementation usually
//! goes through: plain UCB1, UCB1-Tuned (variance-aware exploration),
//! and UCB1-AMAF (RAVE), which is the default and the one this crate's
//! own `mcts` engine exercises most.

use crate::board::{Board, Coord};
use crate::tree::{NodeId, Tree};

/// A pluggable move-selection strategy for descending and updating the
/// search tree. Implementations own no state beyond their tuning
/// constants; all per-search state lives in the [`Tree`] itself.
pub trait TreePolicy: Send + Sync {
    /// Pick one child of `node` to descend into during tree descent, by
    /// this policy's urgency/UCB formula (unvisited children are
    /// infinitely urgent). This is the selector `descend` walks with —
    /// never used for reporting the move `gen_move` actually returns,
    /// that's [`TreePolicy::choose`].
    fn select(&self, tree: &Tree, node: NodeId) -> Option<NodeId>;

    /// Walk from `from` down to a leaf (a node with no children),
    /// repeatedly applying [`TreePolicy::select`]. The default
    /// implementation is correct for every policy here; override only
    /// if a policy needs to track extra state while descending.
    fn descend(&self, tree: &Tree, from: NodeId) -> NodeId {
        let mut node = from;
        while let Some(next) = self.select(tree, node) {
            node = next;
        }
        node
    }

    /// Pick the "best" child of `node` for reporting — the move
    /// `gen_move` actually returns, or the child a progress dump or
    /// early-stop check treats as current best — not for descent.
    /// Default: most-visited, ties broken by value, matching the
    /// teacher's `best_move` (`max_by_key` on visit count rather than
    /// urgency).
    fn choose(&self, tree: &Tree, node: NodeId) -> Option<NodeId> {
        tree.children(node).max_by(|&a, &b| {
            let na = tree.get(a);
            let nb = tree.get(b);
            na.playouts
                .cmp(&nb.playouts)
                .then_with(|| na.value.partial_cmp(&nb.value).unwrap())
        })
    }

    /// Fold a completed playout's `result` (1.0 = win for the mover at
    /// `node`, 0.0 = loss) into `node`'s statistics.
    fn update(&self, tree: &mut Tree, node: NodeId, result: f32);

    /// Initial value bias for a freshly expanded child at `coord`,
    /// given the board position it was expanded from. Returns a value
    /// in `[0, 1]` used to seed the child before any playouts land on
    /// it; the default is uninformative (0.5, i.e. no prior knowledge).
    fn prior(&self, _board: &Board, _coord: Coord) -> f32 {
        0.5
    }

    /// Whether this policy wants AMAF bookkeeping allocated on nodes it
    /// creates (only `ucb1amaf`/RAVE does).
    fn wants_amaf(&self) -> bool {
        false
    }

    /// Fold AMAF observations gathered during a playout into descendants
    /// of `node` whose move appeared in the playout. `amaf_result` maps
    /// a coordinate to the outcome (1.0/0.0) recorded for whichever side
    /// first played it, from `node`'s mover's perspective. Default:
    /// no-op, for policies that ignore AMAF.
    fn update_amaf(&self, _tree: &mut Tree, _node: NodeId, _amaf_result: &[(Coord, f32)]) {}
}

/// Standard UCB1: exploit the empirical mean, explore in proportion to
/// `sqrt(ln(N) / n)`.
pub struct Ucb1 {
    pub c: f32,
}

impl Default for Ucb1 {
    fn default() -> Self {
        Ucb1 { c: std::f32::consts::SQRT_2 }
    }
}

impl TreePolicy for Ucb1 {
    fn select(&self, tree: &Tree, node: NodeId) -> Option<NodeId> {
        let parent_visits = tree.get(node).playouts.max(1) as f32;
        let ln_n = parent_visits.ln();
        tree.children(node)
            .max_by(|&a, &b| {
                ucb1_score(tree, a, ln_n, self.c)
                    .partial_cmp(&ucb1_score(tree, b, ln_n, self.c))
                    .unwrap()
            })
    }

    fn update(&self, tree: &mut Tree, node: NodeId, result: f32) {
        tree.get_mut(node).update(result);
    }
}

fn ucb1_score(tree: &Tree, id: NodeId, ln_n: f32, c: f32) -> f32 {
    let n = tree.get(id);
    if n.playouts == 0 {
        return f32::INFINITY;
    }
    n.value + c * (ln_n / n.playouts as f32).sqrt()
}

/// UCB1-Tuned: the same idea as [`Ucb1`], but the exploration term is
/// scaled down for children whose results are already low-variance,
/// per Auer/Cesa-Bianchi/Fischer.
pub struct Ucb1Tuned {
    pub c: f32,
}

impl Default for Ucb1Tuned {
    fn default() -> Self {
        Ucb1Tuned { c: 1.0 }
    }
}

impl TreePolicy for Ucb1Tuned {
    fn select(&self, tree: &Tree, node: NodeId) -> Option<NodeId> {
        let parent_visits = tree.get(node).playouts.max(1) as f32;
        let ln_n = parent_visits.ln();
        tree.children(node)
            .max_by(|&a, &b| {
                ucb1tuned_score(tree, a, ln_n, self.c)
                    .partial_cmp(&ucb1tuned_score(tree, b, ln_n, self.c))
                    .unwrap()
            })
    }

    fn update(&self, tree: &mut Tree, node: NodeId, result: f32) {
        tree.get_mut(node).update(result);
    }
}

fn ucb1tuned_score(tree: &Tree, id: NodeId, ln_n: f32, c: f32) -> f32 {
    let n = tree.get(id);
    if n.playouts == 0 {
        return f32::INFINITY;
    }
    let visits = n.playouts as f32;
    // Bernoulli variance upper bound: Var <= p(1-p) <= 1/4.
    let variance_bound = n.value * (1.0 - n.value) + (2.0 * ln_n / visits).sqrt();
    let bound = variance_bound.min(0.25);
    n.value + c * (ln_n / visits * bound).sqrt()
}

/// UCB1-AMAF (RAVE): blends the node's own UCB1 value with the AMAF
/// ("all moves as first") estimate gathered from playouts where the
/// move was played at any point, weighting AMAF more heavily while a
/// node is lightly visited and fading it out as its own statistics
/// accumulate. `equiv` is the number of real playouts at which the two
/// estimates are weighted equally (`RAVE_EQUIV` in
/// [`crate::constants`]).
pub struct Ucb1Amaf {
    pub c: f32,
    pub equiv: f32,
}

impl Default for Ucb1Amaf {
    fn default() -> Self {
        Ucb1Amaf {
            c: std::f32::consts::SQRT_2,
            equiv: crate::constants::RAVE_EQUIV as f32,
        }
    }
}

impl TreePolicy for Ucb1Amaf {
    fn select(&self, tree: &Tree, node: NodeId) -> Option<NodeId> {
        let parent_visits = tree.get(node).playouts.max(1) as f32;
        let ln_n = parent_visits.ln();
        tree.children(node)
            .max_by(|&a, &b| {
                self.urgency(tree, a, ln_n)
                    .partial_cmp(&self.urgency(tree, b, ln_n))
                    .unwrap()
            })
    }

    fn update(&self, tree: &mut Tree, node: NodeId, result: f32) {
        tree.get_mut(node).update(result);
    }

    fn wants_amaf(&self) -> bool {
        true
    }

    fn update_amaf(&self, tree: &mut Tree, node: NodeId, amaf_result: &[(Coord, f32)]) {
        for child in tree.children(node).collect::<Vec<_>>() {
            let coord = tree.get(child).coord;
            if let Some(&(_, result)) = amaf_result.iter().find(|&&(c, _)| c == coord) {
                if let Some(stats) = tree.get_mut(child).amaf.as_mut() {
                    stats.playouts += 1;
                    stats.wins += result;
                }
            }
        }
    }
}

impl Ucb1Amaf {
    fn urgency(&self, tree: &Tree, id: NodeId, ln_n: f32) -> f32 {
        let n = tree.get(id);
        let uct = if n.playouts == 0 {
            f32::INFINITY
        } else {
            n.value + self.c * (ln_n / n.playouts as f32).sqrt()
        };
        if uct.is_infinite() {
            return uct;
        }

        let amaf_value = n.amaf.and_then(|a| {
            (a.playouts > 0).then(|| a.wins / a.playouts as f32)
        });

        match amaf_value {
            Some(amaf) => {
                let amaf_playouts = n.amaf.unwrap().playouts as f32;
                let beta = amaf_playouts / (amaf_playouts + n.playouts as f32 + n.playouts as f32 * amaf_playouts / self.equiv);
                (1.0 - beta) * uct.min(1.0) + beta * amaf
            }
            None => uct,
        }
    }
}

/// Construct the tree policy named by a config string ("uct", "ucb1",
/// "ucb1_tuned", "ucb1amaf"), the same vocabulary the engine's `policy=`
/// config key accepts.
pub fn by_name(name: &str) -> anyhow::Result<Box<dyn TreePolicy>> {
    match name {
        "ucb1" => Ok(Box::new(Ucb1::default())),
        "ucb1_tuned" | "ucb1tuned" => Ok(Box::new(Ucb1Tuned::default())),
        "ucb1amaf" | "uct" | "rave" => Ok(Box::new(Ucb1Amaf::default())),
        other => anyhow::bail!("unknown tree policy: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PASS;

    #[test]
    fn ucb1_select_prefers_unvisited_child() {
        let mut tree = Tree::init(PASS, 9);
        let a = tree.expand(tree.root, 1, false);
        let b = tree.expand(tree.root, 2, false);
        tree.get_mut(a).update(0.5);
        tree.get_mut(tree.root).playouts = 1;

        let policy = Ucb1::default();
        let choice = policy.select(&tree, tree.root);
        assert_eq!(choice, Some(b));
    }

    #[test]
    fn ucb1_select_eventually_prefers_higher_value_after_many_visits() {
        let mut tree = Tree::init(PASS, 9);
        let a = tree.expand(tree.root, 1, false);
        let b = tree.expand(tree.root, 2, false);
        for _ in 0..1000 {
            tree.get_mut(a).update(1.0);
            tree.get_mut(b).update(0.0);
        }
        tree.get_mut(tree.root).playouts = 2000;

        let policy = Ucb1::default();
        let choice = policy.select(&tree, tree.root);
        assert_eq!(choice, Some(a));
    }

    #[test]
    fn choose_picks_most_visited_child_not_highest_urgency() {
        // `a` has far fewer playouts than `b` but a perfect value, so an
        // urgency-based pick (infinite bonus on low visit counts) would
        // favor it; `choose` is reporting, not descent, and must still
        // prefer the heavily-visited child per spec §4.5.
        let mut tree = Tree::init(PASS, 9);
        let a = tree.expand(tree.root, 1, false);
        let b = tree.expand(tree.root, 2, false);
        tree.get_mut(a).update(1.0);
        tree.get_mut(b).update(0.5);
        for _ in 1..200 {
            tree.get_mut(b).update(0.5);
        }

        let policy = Ucb1::default();
        assert_eq!(policy.choose(&tree, tree.root), Some(b));
    }

    #[test]
    fn choose_breaks_ties_in_playouts_by_value() {
        let mut tree = Tree::init(PASS, 9);
        let a = tree.expand(tree.root, 1, false);
        let b = tree.expand(tree.root, 2, false);
        tree.get_mut(a).update(0.3);
        tree.get_mut(b).update(0.7);

        let policy = Ucb1::default();
        assert_eq!(policy.choose(&tree, tree.root), Some(b));
    }

    #[test]
    fn amaf_policy_tracks_amaf_stats_when_requested() {
        let mut tree = Tree::init(PASS, 9);
        let a = tree.expand(tree.root, 7, true);
        assert!(tree.get(a).amaf.is_some());

        let policy = Ucb1Amaf::default();
        policy.update_amaf(&mut tree, tree.root, &[(7, 1.0)]);
        let stats = tree.get(a).amaf.unwrap();
        assert_eq!(stats.playouts, 1);
        assert_eq!(stats.wins, 1.0);
    }

    #[test]
    fn descend_default_walks_to_a_leaf() {
        let mut tree = Tree::init(PASS, 9);
        let a = tree.expand(tree.root, 1, false);
        let leaf = tree.expand(a, 2, false);
        let policy = Ucb1::default();
        let reached = policy.descend(&tree, tree.root);
        assert_eq!(reached, leaf);
    }

    #[test]
    fn by_name_resolves_known_policies() {
        assert!(by_name("ucb1").is_ok());
        assert!(by_name("ucb1_tuned").is_ok());
        assert!(by_name("ucb1amaf").is_ok());
        assert!(by_name("not_a_policy").is_err());
    }
}
