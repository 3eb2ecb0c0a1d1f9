//! Two-state child handle: a move plus prior, with an optionally attached
//! node.
//!
//! Most children of an expanded node are never visited, so materializing a
//! full [`Node`] for each would waste most of the tree budget. A
//! `NodePointer` starts *uninflated* (move and prior only) and is *inflated*
//! into a real node the first time the search descends through it. Inflation
//! is one-shot and race-safe: when two workers inflate concurrently, one
//! installs its node and the loser's transient allocation is dropped on the
//! spot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tengen_core::{Color, Move};

use crate::node::Node;

/// Live node count across all trees in the process. Drives the memory-bound
/// expansion throttle.
static TREE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// Current number of live nodes.
pub fn tree_size() -> usize {
    TREE_SIZE.load(Ordering::Relaxed)
}

#[inline]
pub(crate) fn tree_size_add() {
    TREE_SIZE.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn tree_size_sub() {
    TREE_SIZE.fetch_sub(1, Ordering::Relaxed);
}

/// A child slot: `{move, prior}` until inflated, then an owned [`Node`].
#[derive(Debug)]
pub struct NodePointer {
    vertex: Move,
    policy: f32,
    inner: OnceLock<Arc<Node>>,
}

impl NodePointer {
    pub fn new(vertex: Move, policy: f32) -> Self {
        Self {
            vertex,
            policy,
            inner: OnceLock::new(),
        }
    }

    #[inline]
    pub fn is_inflated(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Attach a node. Idempotent; safe under concurrent calls. The losing
    /// racer's tentative node is freed at scope exit.
    pub fn inflate(&self) {
        if self.inner.get().is_some() {
            return;
        }
        let tentative = Arc::new(Node::new(self.vertex, self.policy));
        // set() fails only when another thread won the race; the tentative
        // Arc then drops here, reverting its tree-size accounting.
        let _ = self.inner.set(tentative);
    }

    /// The inflated node, if any.
    #[inline]
    pub fn node(&self) -> Option<&Arc<Node>> {
        self.inner.get()
    }

    /// Take ownership of the inflated node, emptying this slot.
    /// Used when promoting a child to the new search root.
    pub fn release(&mut self) -> Option<Arc<Node>> {
        self.inner.take()
    }

    #[inline]
    pub fn get_move(&self) -> Move {
        self.vertex
    }

    /// Prior probability. Reads the node once inflated, because root noise
    /// rewrites priors in place.
    #[inline]
    pub fn get_policy(&self) -> f32 {
        match self.inner.get() {
            Some(node) => node.get_policy(),
            None => self.policy,
        }
    }

    #[inline]
    pub fn get_visits(&self) -> i32 {
        match self.inner.get() {
            Some(node) => node.get_visits(),
            None => 0,
        }
    }

    pub fn get_eval(&self, color: Color) -> f32 {
        match self.inner.get() {
            Some(node) if node.get_visits() > 0 => node.get_eval(color),
            _ => 0.0,
        }
    }

    pub fn get_eval_lcb(&self, color: Color) -> f32 {
        match self.inner.get() {
            Some(node) => node.get_eval_lcb(color),
            // Unvisited children sort below any visited one.
            None => -1e6,
        }
    }

    /// False only for an inflated node marked invalid.
    pub fn valid(&self) -> bool {
        self.inner.get().map_or(true, |node| node.valid())
    }

    /// False for an inflated node that is pruned or invalid.
    pub fn active(&self) -> bool {
        self.inner.get().map_or(true, |node| node.active())
    }

    /// Advisory probe: is someone currently expanding this child? Races with
    /// the expansion CAS by design; used only to steer selection away from a
    /// node that would block.
    pub fn is_expanding(&self) -> bool {
        self.inner.get().map_or(false, |node| node.is_expanding())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uninflated_reads() {
        let ptr = NodePointer::new(Move::Vertex(42), 0.125);
        assert!(!ptr.is_inflated());
        assert_eq!(ptr.get_move(), Move::Vertex(42));
        assert!((ptr.get_policy() - 0.125).abs() < 1e-6);
        assert_eq!(ptr.get_visits(), 0);
        assert!(ptr.valid());
        assert!(ptr.active());
        assert!(ptr.get_eval_lcb(Color::Black) < -1e5);
    }

    #[test]
    fn test_inflate_is_idempotent() {
        let ptr = NodePointer::new(Move::Pass, 1.0);
        ptr.inflate();
        let first = Arc::as_ptr(ptr.node().unwrap());
        ptr.inflate();
        assert_eq!(first, Arc::as_ptr(ptr.node().unwrap()));
        assert_eq!(ptr.node().unwrap().get_move(), Move::Pass);
    }

    #[test]
    fn test_concurrent_inflate_single_winner() {
        let ptr = NodePointer::new(Move::Vertex(7), 0.5);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| ptr.inflate());
            }
        });
        // Exactly one node survives the race.
        assert!(ptr.is_inflated());
        assert_eq!(Arc::strong_count(ptr.node().unwrap()), 1);
    }

    #[test]
    fn test_release_empties_slot() {
        let mut ptr = NodePointer::new(Move::Vertex(3), 0.25);
        ptr.inflate();
        let node = ptr.release().unwrap();
        assert_eq!(node.get_move(), Move::Vertex(3));
        assert!(!ptr.is_inflated());
        assert!(ptr.release().is_none());
    }
}
