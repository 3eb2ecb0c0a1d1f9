//! 8×8 Othello rules for the tengen engine.
//!
//! A complete reference implementation of the [`GameState`] contract: legal
//! move generation with flip scanning in all eight directions, forced-pass
//! handling, disc-differential scoring and Zobrist position hashing. The
//! search crates use it as their end-to-end test game; hosts can use it to
//! play real games.

use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tengen_core::{Color, GameKind, GameState, Move};

pub const BOARD_SIZE: usize = 8;
pub const NUM_INTERSECTIONS: usize = BOARD_SIZE * BOARD_SIZE;

/// Othello's komi: White gets half a disc, so there are no draws.
pub const KOMI: f32 = 0.5;

const EMPTY: u8 = 0;
const BLACK: u8 = 1;
const WHITE: u8 = 2;

/// (dx, dy) of the eight flip-scan directions.
const DIRECTIONS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

struct Zobrist {
    pieces: [[u64; NUM_INTERSECTIONS]; 2],
    white_to_move: u64,
}

static ZOBRIST: Lazy<Zobrist> = Lazy::new(|| {
    let mut rng = ChaCha20Rng::seed_from_u64(0x6F74_6865_6C6C_6Fu64);
    let mut pieces = [[0u64; NUM_INTERSECTIONS]; 2];
    for table in &mut pieces {
        for key in table.iter_mut() {
            *key = rng.gen();
        }
    }
    Zobrist {
        pieces,
        white_to_move: rng.gen(),
    }
});

fn disc_of(color: Color) -> u8 {
    match color {
        Color::Black => BLACK,
        Color::White => WHITE,
    }
}

#[derive(Clone)]
struct HistoryEntry {
    mv: Move,
    board: [u8; NUM_INTERSECTIONS],
    to_move: Color,
    passes: u32,
}

/// A complete Othello position with move history.
#[derive(Clone)]
pub struct OthelloState {
    board: [u8; NUM_INTERSECTIONS],
    to_move: Color,
    passes: u32,
    komi: f32,
    history: Vec<HistoryEntry>,
    cursor: usize,
}

impl OthelloState {
    /// The standard initial position, Black to move.
    pub fn new() -> Self {
        let mut board = [EMPTY; NUM_INTERSECTIONS];
        board[Self::index(3, 3)] = WHITE;
        board[Self::index(4, 4)] = WHITE;
        board[Self::index(4, 3)] = BLACK;
        board[Self::index(3, 4)] = BLACK;
        Self {
            board,
            to_move: Color::Black,
            passes: 0,
            komi: KOMI,
            history: Vec::new(),
            cursor: 0,
        }
    }

    /// An arbitrary position. `cells` uses 0 = empty, 1 = black, 2 = white,
    /// row-major with `(x, y)` at index `y * 8 + x`.
    pub fn from_board(cells: [u8; NUM_INTERSECTIONS], to_move: Color) -> Self {
        Self {
            board: cells,
            to_move,
            passes: 0,
            komi: KOMI,
            history: Vec::new(),
            cursor: 0,
        }
    }

    #[inline]
    fn index(x: usize, y: usize) -> usize {
        y * BOARD_SIZE + x
    }

    /// Number of discs `color` has on the board.
    pub fn count(&self, color: Color) -> usize {
        let disc = disc_of(color);
        self.board.iter().filter(|&&cell| cell == disc).count()
    }

    /// Whether `color` has any legal disc placement.
    pub fn has_legal_moves(&self, color: Color) -> bool {
        (0..NUM_INTERSECTIONS).any(|v| self.is_legal_vertex(color, v))
    }

    fn is_legal_vertex(&self, color: Color, v: usize) -> bool {
        if self.board[v] != EMPTY {
            return false;
        }
        DIRECTIONS
            .iter()
            .any(|&dir| self.scan_flips(color, v, dir) > 0)
    }

    /// Number of opposing discs a placement at `v` would flip along `dir`.
    fn scan_flips(&self, color: Color, v: usize, (dx, dy): (i32, i32)) -> usize {
        let own = disc_of(color);
        let other = disc_of(color.opponent());
        let mut x = (v % BOARD_SIZE) as i32 + dx;
        let mut y = (v / BOARD_SIZE) as i32 + dy;
        let mut captured = 0;

        while (0..BOARD_SIZE as i32).contains(&x) && (0..BOARD_SIZE as i32).contains(&y) {
            match self.board[Self::index(x as usize, y as usize)] {
                cell if cell == other => captured += 1,
                cell if cell == own => return captured,
                _ => return 0,
            }
            x += dx;
            y += dy;
        }
        0
    }

    fn apply(&mut self, mv: Move) {
        match mv {
            Move::Vertex(v) => {
                let v = v as usize;
                let own = disc_of(self.to_move);
                for &(dx, dy) in &DIRECTIONS {
                    let captured = self.scan_flips(self.to_move, v, (dx, dy));
                    let mut x = (v % BOARD_SIZE) as i32;
                    let mut y = (v / BOARD_SIZE) as i32;
                    for _ in 0..captured {
                        x += dx;
                        y += dy;
                        self.board[Self::index(x as usize, y as usize)] = own;
                    }
                }
                self.board[v] = own;
                self.passes = 0;
            }
            Move::Pass => self.passes += 1,
            Move::Resign | Move::NoVertex => {}
        }
        self.to_move = self.to_move.opponent();
    }
}

impl Default for OthelloState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState for OthelloState {
    fn kind(&self) -> GameKind {
        GameKind::Othello
    }

    fn board_size(&self) -> usize {
        BOARD_SIZE
    }

    fn to_move(&self) -> Color {
        self.to_move
    }

    fn set_to_move(&mut self, color: Color) {
        self.to_move = color;
    }

    fn movenum(&self) -> usize {
        self.cursor
    }

    fn passes(&self) -> u32 {
        self.passes
    }

    fn last_move(&self) -> Option<Move> {
        self.cursor
            .checked_sub(1)
            .map(|index| self.history[index].mv)
    }

    fn komi(&self) -> f32 {
        self.komi
    }

    fn play_move(&mut self, mv: Move) {
        self.history.truncate(self.cursor);
        self.history.push(HistoryEntry {
            mv,
            board: self.board,
            to_move: self.to_move,
            passes: self.passes,
        });
        self.cursor += 1;
        self.apply(mv);
    }

    fn undo_move(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let entry = &self.history[self.cursor];
            self.board = entry.board;
            self.to_move = entry.to_move;
            self.passes = entry.passes;
        }
    }

    fn forward_move(&mut self) {
        if self.cursor < self.history.len() {
            let mv = self.history[self.cursor].mv;
            self.cursor += 1;
            self.apply(mv);
        }
    }

    fn is_move_legal(&self, color: Color, mv: Move) -> bool {
        match mv {
            Move::Vertex(v) => (v as usize) < NUM_INTERSECTIONS
                && self.is_legal_vertex(color, v as usize),
            // Passing is only legal when there is nothing else.
            Move::Pass => !self.has_legal_moves(color),
            Move::Resign => true,
            Move::NoVertex => false,
        }
    }

    fn final_score(&self) -> f32 {
        self.count(Color::Black) as f32 - self.count(Color::White) as f32 - self.komi
    }

    fn hash(&self) -> u64 {
        let zobrist = &*ZOBRIST;
        let mut hash = 0u64;
        for (v, &cell) in self.board.iter().enumerate() {
            match cell {
                BLACK => hash ^= zobrist.pieces[0][v],
                WHITE => hash ^= zobrist.pieces[1][v],
                _ => {}
            }
        }
        if self.to_move == Color::White {
            hash ^= zobrist.white_to_move;
        }
        hash
    }

    fn vertex_at(&self, x: usize, y: usize) -> Move {
        Move::Vertex(Self::index(x, y) as u16)
    }
}

#[cfg(test)]
mod tests;
