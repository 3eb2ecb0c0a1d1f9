//! Shared small types for two-player board games.
//!
//! These are the vocabulary types every other crate speaks: stone color,
//! move encoding (board vertex plus the PASS/RESIGN sentinels) and the
//! game family a state belongs to.

use std::fmt;

/// Stone color. Black moves first in both supported games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    /// The other player.
    #[inline]
    pub fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Index into per-color arrays (Black = 0, White = 1).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Color::Black => 0,
            Color::White => 1,
        }
    }

    /// +1 for Black, -1 for White. Used to express scores relative to a side.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Color::Black => 1.0,
            Color::White => -1.0,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => write!(f, "B"),
            Color::White => write!(f, "W"),
        }
    }
}

/// Which rule family a `GameState` implements.
///
/// The search core is game-agnostic except for a handful of rule-dependent
/// branches (pass emission, superko pruning, eye filtering, Dirichlet alpha),
/// all of which key off this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    Go,
    Othello,
}

/// A move: either a board vertex in the game's own encoding, or a sentinel.
///
/// `Vertex` payloads are opaque to the search; only the owning `GameState`
/// can interpret them. `NoVertex` marks "no move" slots (e.g. a fresh root).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Vertex(u16),
    Pass,
    Resign,
    NoVertex,
}

impl Move {
    #[inline]
    pub fn is_pass(self) -> bool {
        self == Move::Pass
    }

    #[inline]
    pub fn is_vertex(self) -> bool {
        matches!(self, Move::Vertex(_))
    }
}

/// GTP-style text for a board coordinate: column letter (skipping `I`)
/// followed by the 1-indexed row number, e.g. `(3, 2)` -> `"D3"`.
pub fn coords_to_text(x: usize, y: usize) -> String {
    let mut column = x;
    // The letter 'I' is skipped by convention.
    if column >= 8 {
        column += 1;
    }
    let letter = (b'A' + column as u8) as char;
    format!("{}{}", letter, y + 1)
}

/// Text for a move under a row-major vertex encoding (`v = y * size + x`).
///
/// Game states with a different internal encoding override
/// [`GameState::move_to_text`](crate::GameState::move_to_text) instead.
pub fn move_to_text(mv: Move, board_size: usize) -> String {
    match mv {
        Move::Vertex(v) => {
            let v = v as usize;
            coords_to_text(v % board_size, v / board_size)
        }
        Move::Pass => "pass".to_string(),
        Move::Resign => "resign".to_string(),
        Move::NoVertex => "none".to_string(),
    }
}
