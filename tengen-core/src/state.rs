//! The `GameState` contract consumed by the search core.
//!
//! Board and rules engines live outside this workspace; the search only ever
//! talks to them through this trait. Implementations must be cheap to clone:
//! the search clones the root state once per simulated playout.

use crate::types::{Color, GameKind, Move};

/// A complete game position: board, side to move, move history and scoring.
///
/// The trait folds board and game bookkeeping into one value type. History
/// support (`undo_move` / `forward_move`) is required for search-tree reuse:
/// the engine rewinds a copy of the new position to check that it descends
/// from the previous root, then replays forward one move at a time.
///
/// `Sync` because the workers share one read-only root state and clone it
/// per playout.
pub trait GameState: Clone + Send + Sync {
    /// Rule family of this state.
    fn kind(&self) -> GameKind;

    /// Board side length (19 for Go, 8 for Othello).
    fn board_size(&self) -> usize;

    /// Side to move.
    fn to_move(&self) -> Color;

    /// Force the side to move. Used by the search right before thinking for
    /// a given color.
    fn set_to_move(&mut self, color: Color);

    /// Number of moves played so far.
    fn movenum(&self) -> usize;

    /// Number of consecutive passes ending the current move sequence.
    fn passes(&self) -> u32;

    /// The most recently played move, if any.
    fn last_move(&self) -> Option<Move>;

    /// Komi (compensation points for White). Always from Black's view:
    /// positive komi favors White.
    fn komi(&self) -> f32;

    /// Handicap stone count. Zero for games without handicap.
    fn handicap(&self) -> usize {
        0
    }

    /// Play a move for the side to move. Passing is a move.
    fn play_move(&mut self, mv: Move);

    /// Rewind the last move. A following [`forward_move`](Self::forward_move)
    /// replays it.
    fn undo_move(&mut self);

    /// Replay the next move of a previously rewound history.
    fn forward_move(&mut self);

    /// Whether `mv` is legal for `color` in this position.
    fn is_move_legal(&self, color: Color, mv: Move) -> bool;

    /// Final score from Black's perspective (positive = Black leads),
    /// komi included.
    fn final_score(&self) -> f32;

    /// Position hash. Two states with equal hashes are treated as the same
    /// whole-board position by tree reuse and superko checks.
    fn hash(&self) -> u64;

    /// The move encoding for board coordinate `(x, y)`. The search iterates
    /// policy indices row-major and maps each through this.
    fn vertex_at(&self, x: usize, y: usize) -> Move;

    /// Whether the position repeats an earlier whole-board position.
    /// Only meaningful for Go; Othello has no repetition rule.
    fn superko(&self) -> bool {
        false
    }

    /// Whether `mv` would fill an eye of `color`. Go-only knowledge used
    /// when overruling a pass; Othello has no eyes.
    fn is_eye(&self, _color: Color, _mv: Move) -> bool {
        false
    }

    /// Human-readable text for a move. The default assumes the row-major
    /// vertex encoding of [`types::move_to_text`](crate::types::move_to_text);
    /// padded board encodings override this.
    fn move_to_text(&self, mv: Move) -> String {
        crate::types::move_to_text(mv, self.board_size())
    }

    /// Board intersection count.
    fn num_intersections(&self) -> usize {
        self.board_size() * self.board_size()
    }
}
