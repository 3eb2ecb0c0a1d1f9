//! Node accounting against the process-wide tree-size counter.
//!
//! Kept in its own integration binary (and as a single test function) so no
//! concurrently running test can touch the global counter mid-assertion.

use games_othello::OthelloState;
use tengen_core::{Color, Move, UniformEvaluator};
use tengen_mcts::{tree_size, Node, NodePointer, PassFlags, Search, SearchConfig};

#[test]
fn test_tree_size_accounting_is_exact() {
    let baseline = tree_size();

    // Creating a node registers it.
    let node = Node::new(Move::Pass, 0.0);
    assert_eq!(tree_size(), baseline + 1);

    // Uninflated slots cost nothing.
    let ptr = NodePointer::new(Move::Vertex(1), 0.5);
    assert_eq!(tree_size(), baseline + 1);

    // Inflation registers exactly one node, idempotently.
    ptr.inflate();
    assert_eq!(tree_size(), baseline + 2);
    ptr.inflate();
    assert_eq!(tree_size(), baseline + 2);

    // A lost inflation race reverts its transient allocation.
    let contended = NodePointer::new(Move::Vertex(2), 0.5);
    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| contended.inflate());
        }
    });
    assert_eq!(tree_size(), baseline + 3);

    // Destroying a node unregisters exactly one.
    drop(contended);
    assert_eq!(tree_size(), baseline + 2);
    drop(ptr);
    assert_eq!(tree_size(), baseline + 1);
    drop(node);
    assert_eq!(tree_size(), baseline);

    // A full search builds a tree and releases all of it on drop.
    let mut search: Search<OthelloState> =
        Search::with_seed(SearchConfig::for_testing().with_playouts(100), 42);
    let evaluator = UniformEvaluator::new();
    let mut state = OthelloState::new();
    search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    assert!(tree_size() > baseline);
    drop(search);
    assert_eq!(tree_size(), baseline);
}
