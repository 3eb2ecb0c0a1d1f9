//! Parallel PUCT Monte-Carlo tree search for AlphaZero-style play.
//!
//! The crate is game-agnostic: it searches any [`tengen_core::GameState`]
//! guided by any [`tengen_core::Evaluator`]. Each `think` call runs four
//! phases per playout across a pool of worker threads:
//!
//! 1. **Selection**: descend from the root by the PUCT rule, applying a
//!    virtual loss at every node so concurrent workers spread out
//! 2. **Expansion**: the first worker to reach a leaf wins a compare-exchange
//!    and materializes the children from one evaluator query
//! 3. **Evaluation**: the same query's winrate becomes the playout result
//! 4. **Backup**: the result is accumulated up the descent path
//!
//! Around that inner loop sit the root lifecycle (tree reuse between moves,
//! superko pruning, Dirichlet noise), the stop controller (playout/visit
//! budgets, wall-clock budget, non-contender pruning) and the best-move
//! extraction with its pass and resign heuristics.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tengen_core::{Color, UniformEvaluator};
//! use tengen_mcts::{PassFlags, Search, SearchConfig};
//!
//! let mut search = Search::new(SearchConfig::default().with_playouts(1600));
//! let evaluator = UniformEvaluator::new();
//! let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
//! ```

pub mod analysis;
pub mod config;
pub mod math;
pub mod node;
pub mod pointer;
mod root;
pub mod search;
pub mod time;

#[cfg(test)]
mod search_tests;
#[cfg(test)]
pub(crate) mod testutil;

pub use analysis::AnalysisEntry;
pub use config::{SearchConfig, TimeManagement, UNLIMITED_PLAYOUTS};
pub use node::{node_cmp, ExpandState, Node, VIRTUAL_LOSS_COUNT};
pub use pointer::{tree_size, NodePointer};
pub use search::{PassFlags, Search, Trainer};
pub use time::TimeControl;
