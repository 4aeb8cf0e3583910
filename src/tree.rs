//! Search tree storage: an arena of nodes linked by index rather than
//! pointer, so the tree can be shared across worker threads behind a
//! `Mutex` without lifetime gymnastics (see [`crate::mcts`]).
//!
//! Each node keeps a first-child/next-sibling pair instead of a `Vec` of
//! children, which keeps `TreeNode` small and lets the tree grow by
//! simple vector pushes. A node's child list is walked by following
//! `first_child` and then `next_sibling` until `None`.

use crate::board::Coord;

/// Index of a node within a [`Tree`]'s arena.
pub type NodeId = usize;

/// Accumulated AMAF ("all moves as first") statistics for one candidate
/// move at a node, used by the RAVE tree policy (see [`crate::policy`]).
#[derive(Clone, Copy, Debug, Default)]
pub struct AmafStats {
    pub playouts: u32,
    pub wins: f32,
}

/// One node of the search tree: the move that reached it, visit/value
/// statistics, and links to its parent/children/siblings within the
/// arena.
#[derive(Clone, Debug)]
pub struct TreeNode {
    pub coord: Coord,
    pub depth: u32,
    pub playouts: u32,
    /// Mean result in `[0, 1]` from the mover's perspective at this node.
    pub value: f32,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// Per-child AMAF stats, parallel to the children reachable from
    /// this node (indexed the same way children are visited), present
    /// only when the active tree policy requested AMAF tracking.
    pub amaf: Option<AmafStats>,
}

impl TreeNode {
    fn root(coord: Coord) -> Self {
        TreeNode {
            coord,
            depth: 0,
            playouts: 0,
            value: 0.5,
            parent: None,
            first_child: None,
            next_sibling: None,
            amaf: None,
        }
    }

    fn child(coord: Coord, depth: u32, parent: NodeId, track_amaf: bool) -> Self {
        TreeNode {
            coord,
            depth,
            playouts: 0,
            value: 0.5,
            parent: Some(parent),
            first_child: None,
            next_sibling: None,
            amaf: track_amaf.then(AmafStats::default),
        }
    }

    /// Update this node's running mean with one more playout outcome.
    /// `result` is 1.0 for a win from this node's own mover's
    /// perspective, 0.0 for a loss.
    pub fn update(&mut self, result: f32) {
        self.playouts += 1;
        self.value += (result - self.value) / self.playouts as f32;
    }
}

/// An arena-allocated search tree. Nodes are never removed individually
/// mid-search; [`Tree::promote_node`] instead garbage-collects everything
/// not reachable from the new root by rebuilding the arena.
pub struct Tree {
    nodes: Vec<TreeNode>,
    pub root: NodeId,
    /// Deepest `depth` reached by any node currently in the arena, kept
    /// up to date by [`Tree::expand`]/[`Tree::expand_many`].
    pub max_depth: u32,
    /// Board size this tree's coordinates were generated against, kept
    /// only so [`Tree::dump`] can render coordinates correctly.
    pub board_size: usize,
}

impl Tree {
    /// Start a fresh tree with a single root node for `coord` (typically
    /// [`crate::board::PASS`], the "no move yet" placeholder), sized for
    /// a board of `board_size`.
    pub fn init(coord: Coord, board_size: usize) -> Self {
        Tree {
            nodes: vec![TreeNode::root(coord)],
            root: 0,
            max_depth: 0,
            board_size,
        }
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate the ids of `id`'s direct children, in first-child/sibling
    /// order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut cur = self.nodes[id].first_child;
        std::iter::from_fn(move || {
            let next = cur?;
            cur = self.nodes[next].next_sibling;
            Some(next)
        })
    }

    /// Add one child for `coord` under `parent`, returning its id.
    /// `track_amaf` mirrors whether the active tree policy wants RAVE
    /// bookkeeping on this node.
    pub fn expand(&mut self, parent: NodeId, coord: Coord, track_amaf: bool) -> NodeId {
        let depth = self.nodes[parent].depth + 1;
        let id = self.nodes.len();
        self.nodes.push(TreeNode::child(coord, depth, parent, track_amaf));
        self.nodes[id].next_sibling = self.nodes[parent].first_child;
        self.nodes[parent].first_child = Some(id);
        self.max_depth = self.max_depth.max(depth);
        id
    }

    /// Expand `parent` with one child per coordinate in `coords`, in
    /// one batch. Returns the new children's ids in the same order as
    /// `coords` (not the order they end up linked in, which is reversed
    /// as with [`Tree::expand`]).
    pub fn expand_many(&mut self, parent: NodeId, coords: &[Coord], track_amaf: bool) -> Vec<NodeId> {
        coords
            .iter()
            .map(|&c| self.expand(parent, c, track_amaf))
            .collect()
    }

    /// A deep copy of the whole arena, same node ids, same root.
    pub fn copy(&self) -> Tree {
        Tree {
            nodes: self.nodes.clone(),
            root: self.root,
            max_depth: self.max_depth,
            board_size: self.board_size,
        }
    }

    /// Drop a subtree rooted at `id` from future traversal by unlinking
    /// it from its parent's child list. The nodes themselves remain in
    /// the arena (reclaimed only by [`Tree::promote_node`]'s rebuild).
    pub fn delete_node(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id].parent else {
            return;
        };
        let mut cur = self.nodes[parent].first_child;
        let mut prev: Option<NodeId> = None;
        while let Some(n) = cur {
            if n == id {
                let next = self.nodes[n].next_sibling;
                match prev {
                    Some(p) => self.nodes[p].next_sibling = next,
                    None => self.nodes[parent].first_child = next,
                }
                return;
            }
            prev = Some(n);
            cur = self.nodes[n].next_sibling;
        }
    }

    /// Make the child of `root` reached via `coord` the new root,
    /// discarding every other branch, and compact the arena so node ids
    /// stay dense. This is the tree-reuse step after a move is played:
    /// statistics gathered while searching the previous position survive
    /// under the subtree that matches the move actually made.
    pub fn promote_node(&mut self, coord: Coord) {
        let new_root = self
            .children(self.root)
            .find(|&c| self.nodes[c].coord == coord);

        let Some(new_root) = new_root else {
            // No matching statistics: start over from scratch.
            let fresh = TreeNode::root(coord);
            self.nodes.clear();
            self.nodes.push(fresh);
            self.root = 0;
            self.max_depth = 0;
            return;
        };

        self.promote_at(new_root);
    }

    /// Like [`Tree::promote_node`], but `id` is already a known node id
    /// rather than looked up by coordinate (used by the engine when it
    /// already holds the id of the node it is about to promote).
    pub fn promote_at(&mut self, id: NodeId) {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if reachable[n] {
                continue;
            }
            reachable[n] = true;
            stack.extend(self.children(n));
        }

        let mut remap = vec![usize::MAX; self.nodes.len()];
        let mut compacted = Vec::with_capacity(reachable.iter().filter(|&&r| r).count());
        for (old_id, keep) in reachable.iter().enumerate() {
            if *keep {
                remap[old_id] = compacted.len();
                compacted.push(self.nodes[old_id].clone());
            }
        }

        for node in &mut compacted {
            node.parent = node.parent.and_then(|p| {
                let r = remap[p];
                (r != usize::MAX).then_some(r)
            });
            node.first_child = node.first_child.and_then(|c| {
                let r = remap[c];
                (r != usize::MAX).then_some(r)
            });
            node.next_sibling = node.next_sibling.and_then(|s| {
                let r = remap[s];
                (r != usize::MAX).then_some(r)
            });
        }

        let new_root = remap[id];
        compacted[new_root].parent = None;
        compacted[new_root].next_sibling = None;
        compacted[new_root].depth = 0;
        fix_depths(&mut compacted, new_root, 0);

        self.max_depth = compacted.iter().map(|n| n.depth).max().unwrap_or(0);
        self.nodes = compacted;
        self.root = new_root;
    }

    /// Merge statistics from `other` into `self`, node for node, by
    /// matching on the coordinate path from each tree's root. Used to
    /// combine per-worker-thread trees into one result.
    pub fn merge(&mut self, other: &Tree) {
        merge_subtree(self, self.root, other, other.root);
    }

    /// A human-readable dump of the tree's most-visited line, similar to
    /// the progress output a GTP front end might print during search.
    pub fn dump(&self, top_n: usize) -> String {
        let mut out = String::new();
        dump_node(self, self.root, 0, top_n, &mut out);
        out
    }

    /// Opening-book persistence is not part of this crate's scope: no
    /// format is defined, so loading always starts a fresh tree rooted
    /// at `coord`.
    pub fn load(_path: &std::path::Path, coord: Coord, board_size: usize) -> std::io::Result<Tree> {
        Ok(Tree::init(coord, board_size))
    }

    /// Opening-book persistence is not part of this crate's scope: this
    /// is a documented no-op rather than a partial format.
    pub fn save(&self, _path: &std::path::Path) -> std::io::Result<()> {
        Ok(())
    }
}

fn fix_depths(nodes: &mut [TreeNode], id: NodeId, depth: u32) {
    nodes[id].depth = depth;
    let mut cur = nodes[id].first_child;
    while let Some(c) = cur {
        fix_depths(nodes, c, depth + 1);
        cur = nodes[c].next_sibling;
    }
}

fn merge_subtree(dst: &mut Tree, dst_id: NodeId, src: &Tree, src_id: NodeId) {
    let src_node = src.get(src_id).clone();
    {
        let dnode = dst.get_mut(dst_id);
        let total = dnode.playouts + src_node.playouts;
        if total > 0 {
            dnode.value = (dnode.value * dnode.playouts as f32
                + src_node.value * src_node.playouts as f32)
                / total as f32;
        }
        dnode.playouts = total;
        if let (Some(damaf), Some(samaf)) = (dnode.amaf.as_mut(), src_node.amaf) {
            let total_amaf = damaf.playouts + samaf.playouts;
            if total_amaf > 0 {
                damaf.wins += samaf.wins;
            }
            damaf.playouts = total_amaf;
        }
    }

    for src_child in src.children(src_id) {
        let coord = src.get(src_child).coord;
        let existing = dst.children(dst_id).find(|&c| dst.get(c).coord == coord);
        let dst_child = match existing {
            Some(c) => c,
            None => dst.expand(dst_id, coord, src.get(src_child).amaf.is_some()),
        };
        merge_subtree(dst, dst_child, src, src_child);
    }
}

fn dump_node(tree: &Tree, id: NodeId, indent: usize, top_n: usize, out: &mut String) {
    use std::fmt::Write;
    let node = tree.get(id);
    let _ = writeln!(
        out,
        "{:indent$}{} playouts={} value={:.3}",
        "",
        crate::board::str_coord(node.coord, tree.board_size),
        node.playouts,
        node.value,
        indent = indent * 2
    );
    let mut children: Vec<NodeId> = tree.children(id).collect();
    children.sort_by(|&a, &b| tree.get(b).playouts.cmp(&tree.get(a).playouts));
    for &c in children.iter().take(top_n) {
        dump_node(tree, c, indent + 1, top_n, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PASS;

    #[test]
    fn init_has_single_root() {
        let tree = Tree::init(PASS, 9);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root, 0);
        assert_eq!(tree.children(tree.root).count(), 0);
    }

    #[test]
    fn expand_links_children_in_arena() {
        let mut tree = Tree::init(PASS, 9);
        let a = tree.expand(tree.root, 10, false);
        let b = tree.expand(tree.root, 20, false);
        let children: Vec<NodeId> = tree.children(tree.root).collect();
        assert_eq!(children.len(), 2);
        assert!(children.contains(&a));
        assert!(children.contains(&b));
        assert_eq!(tree.get(a).depth, 1);
    }

    #[test]
    fn update_tracks_running_mean() {
        let mut tree = Tree::init(PASS, 9);
        let a = tree.expand(tree.root, 5, false);
        tree.get_mut(a).update(1.0);
        tree.get_mut(a).update(0.0);
        assert_eq!(tree.get(a).playouts, 2);
        assert!((tree.get(a).value - 0.5).abs() < 1e-6);
    }

    #[test]
    fn promote_node_discards_other_branches() {
        let mut tree = Tree::init(PASS, 9);
        let a = tree.expand(tree.root, 10, false);
        let _b = tree.expand(tree.root, 20, false);
        tree.get_mut(a).update(1.0);
        let grandchild = tree.expand(a, 30, false);
        tree.get_mut(grandchild).update(1.0);

        tree.promote_node(10);
        assert_eq!(tree.get(tree.root).coord, 10);
        assert_eq!(tree.get(tree.root).playouts, 1);
        assert_eq!(tree.children(tree.root).count(), 1);
    }

    #[test]
    fn promote_node_with_no_match_starts_fresh() {
        let mut tree = Tree::init(PASS, 9);
        tree.expand(tree.root, 10, false);
        tree.promote_node(999);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(tree.root).coord, 999);
    }

    #[test]
    fn delete_node_unlinks_from_parent() {
        let mut tree = Tree::init(PASS, 9);
        let a = tree.expand(tree.root, 10, false);
        let b = tree.expand(tree.root, 20, false);
        tree.delete_node(a);
        let children: Vec<NodeId> = tree.children(tree.root).collect();
        assert_eq!(children, vec![b]);
    }

    #[test]
    fn merge_combines_playout_counts() {
        let mut t1 = Tree::init(PASS, 9);
        let a1 = t1.expand(t1.root, 10, false);
        t1.get_mut(a1).update(1.0);

        let mut t2 = Tree::init(PASS, 9);
        let a2 = t2.expand(t2.root, 10, false);
        t2.get_mut(a2).update(0.0);

        t1.merge(&t2);
        let a = t1.children(t1.root).next().unwrap();
        assert_eq!(t1.get(a).playouts, 2);
        assert!((t1.get(a).value - 0.5).abs() < 1e-6);
    }
}
