//! Contracts shared across the tengen engine.
//!
//! The search core in `tengen-mcts` is written against the traits in this
//! crate: [`GameState`] for board and rules, [`Evaluator`] for the neural
//! policy/value oracle. Board engines and network inference live outside the
//! workspace and plug in by implementing these traits.

pub mod eval;
pub mod state;
pub mod types;

pub use eval::{Evaluator, EvaluatorError, NetEval, UniformEvaluator};
pub use state::GameState;
pub use types::{coords_to_text, move_to_text, Color, GameKind, Move};
