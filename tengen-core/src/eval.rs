//! Evaluator contract for position evaluation.
//!
//! The evaluator provides a policy prior over board vertices plus a winrate
//! estimate. In production this is a neural network behind a batching
//! scheduler; for tests we provide a uniform evaluator.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::state::GameState;

/// Errors surfaced by an evaluator.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// A drain was requested while the call was in flight. Workers unwind
    /// their current playout and exit cleanly when they see this.
    #[error("evaluation halted: drain requested")]
    Halted,

    #[error("evaluation failed: {0}")]
    Failed(String),
}

/// Raw network output for one position.
#[derive(Debug, Clone)]
pub struct NetEval {
    /// Policy prior per intersection, row-major. Length equals the board's
    /// intersection count; illegal moves are filtered by the caller.
    pub policy: Vec<f32>,

    /// Prior for the pass move.
    pub policy_pass: f32,

    /// Winrate in [0, 1] from the side to move's perspective. The search
    /// flips this to Black's perspective before storing.
    pub winrate: f32,
}

/// Trait for position evaluators.
///
/// The drain/resume lifecycle lets the search stop cleanly: `drain_evals`
/// makes in-flight and subsequent calls return [`EvaluatorError::Halted`]
/// until `resume_evals` re-enables evaluation.
pub trait Evaluator<G: GameState>: Send + Sync {
    /// Evaluate a single position.
    fn evaluate(&self, state: &G) -> Result<NetEval, EvaluatorError>;

    /// Request that evaluation halts. Idempotent.
    fn drain_evals(&self) {}

    /// Re-enable evaluation after a drain. Idempotent.
    fn resume_evals(&self) {}
}

/// Uniform evaluator: equal prior over all intersections and the pass move,
/// neutral winrate. Useful for testing the search without a network.
#[derive(Debug, Default)]
pub struct UniformEvaluator {
    draining: AtomicBool,
}

impl UniformEvaluator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<G: GameState> Evaluator<G> for UniformEvaluator {
    fn evaluate(&self, state: &G) -> Result<NetEval, EvaluatorError> {
        if self.draining.load(Ordering::Acquire) {
            return Err(EvaluatorError::Halted);
        }
        let n = state.num_intersections();
        let prob = 1.0 / (n as f32 + 1.0);
        Ok(NetEval {
            policy: vec![prob; n],
            policy_pass: prob,
            winrate: 0.5,
        })
    }

    fn drain_evals(&self) {
        self.draining.store(true, Ordering::Release);
    }

    fn resume_evals(&self) {
        self.draining.store(false, Ordering::Release);
    }
}
