//! Scripted game states and evaluators for unit tests.
//!
//! `MiniState` is a deliberately dumb `GameState`: a fixed legal-move list
//! with just enough bookkeeping (history, passes, hashes) to drive the
//! search. It stands in for the out-of-workspace board engines where a real
//! board is not needed, and lets tests script Go-only behaviors like superko
//! and eyes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tengen_core::{Color, Evaluator, EvaluatorError, GameKind, GameState, Move, NetEval};

#[derive(Clone)]
pub struct MiniState {
    kind: GameKind,
    size: usize,
    to_move: Color,
    base_movenum: usize,
    komi: f32,
    handicap: usize,
    score: f32,
    legal: Vec<u16>,
    superko_after: Vec<u16>,
    eyes: Vec<u16>,
    pass_legal: Option<bool>,
    base_passes: u32,
    moves: Vec<Move>,
    cursor: usize,
}

impl MiniState {
    pub fn othello(legal: &[u16]) -> Self {
        Self {
            kind: GameKind::Othello,
            size: 8,
            to_move: Color::Black,
            base_movenum: 0,
            komi: 0.5,
            handicap: 0,
            score: 0.0,
            legal: legal.to_vec(),
            superko_after: Vec::new(),
            eyes: Vec::new(),
            pass_legal: None,
            base_passes: 0,
            moves: Vec::new(),
            cursor: 0,
        }
    }

    pub fn go(legal: &[u16]) -> Self {
        Self {
            kind: GameKind::Go,
            size: 19,
            komi: 7.5,
            ..Self::othello(legal)
        }
    }

    pub fn with_movenum(mut self, movenum: usize) -> Self {
        self.base_movenum = movenum;
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn with_passes(mut self, passes: u32) -> Self {
        self.base_passes = passes;
        self
    }

    pub fn with_superko_after(mut self, vertices: &[u16]) -> Self {
        self.superko_after = vertices.to_vec();
        self
    }

    pub fn with_eyes(mut self, vertices: &[u16]) -> Self {
        self.eyes = vertices.to_vec();
        self
    }

    pub fn with_pass_legal(mut self, legal: bool) -> Self {
        self.pass_legal = Some(legal);
        self
    }

    pub fn with_handicap(mut self, handicap: usize) -> Self {
        self.handicap = handicap;
        self
    }

    pub fn with_komi_shift(mut self, delta: f32) -> Self {
        self.komi += delta;
        self
    }

    fn played(&self) -> &[Move] {
        &self.moves[..self.cursor]
    }
}

impl GameState for MiniState {
    fn kind(&self) -> GameKind {
        self.kind
    }

    fn board_size(&self) -> usize {
        self.size
    }

    fn to_move(&self) -> Color {
        self.to_move
    }

    fn set_to_move(&mut self, color: Color) {
        self.to_move = color;
    }

    fn movenum(&self) -> usize {
        self.base_movenum + self.cursor
    }

    fn passes(&self) -> u32 {
        let mut passes = 0;
        for mv in self.played().iter().rev() {
            if mv.is_pass() {
                passes += 1;
            } else {
                return passes;
            }
        }
        self.base_passes + passes
    }

    fn last_move(&self) -> Option<Move> {
        self.played().last().copied()
    }

    fn komi(&self) -> f32 {
        self.komi
    }

    fn handicap(&self) -> usize {
        self.handicap
    }

    fn play_move(&mut self, mv: Move) {
        self.moves.truncate(self.cursor);
        self.moves.push(mv);
        self.cursor += 1;
        self.to_move = self.to_move.opponent();
    }

    fn undo_move(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.to_move = self.to_move.opponent();
        }
    }

    fn forward_move(&mut self) {
        if self.cursor < self.moves.len() {
            self.cursor += 1;
            self.to_move = self.to_move.opponent();
        }
    }

    fn is_move_legal(&self, _color: Color, mv: Move) -> bool {
        match mv {
            Move::Vertex(v) => self.legal.contains(&v),
            Move::Pass => self.pass_legal.unwrap_or(match self.kind {
                GameKind::Go => true,
                GameKind::Othello => self.legal.is_empty(),
            }),
            Move::Resign => true,
            Move::NoVertex => false,
        }
    }

    fn final_score(&self) -> f32 {
        self.score
    }

    fn hash(&self) -> u64 {
        let mut hash = 0x9E37_79B9_7F4A_7C15u64 ^ (self.cursor as u64);
        for mv in self.played() {
            let code = match *mv {
                Move::Vertex(v) => v as u64 + 4,
                Move::Pass => 1,
                Move::Resign => 2,
                Move::NoVertex => 3,
            };
            hash = hash.rotate_left(13) ^ code.wrapping_mul(0x100_0000_01B3);
        }
        hash
    }

    fn vertex_at(&self, x: usize, y: usize) -> Move {
        Move::Vertex((y * self.size + x) as u16)
    }

    fn superko(&self) -> bool {
        match self.played().last() {
            Some(Move::Vertex(v)) => self.superko_after.contains(v),
            _ => false,
        }
    }

    fn is_eye(&self, _color: Color, mv: Move) -> bool {
        match (self.kind, mv) {
            (GameKind::Go, Move::Vertex(v)) => self.eyes.contains(&v),
            _ => false,
        }
    }
}

/// Evaluator returning a scripted policy and winrate, with optional latency
/// for race tests.
pub struct StubEvaluator {
    policy: Option<Vec<f32>>,
    policy_pass: f32,
    winrate: f32,
    /// When set, `winrate` is Black's winrate and the stub converts to the
    /// side-to-move perspective the evaluator contract requires.
    black_perspective: bool,
    latency_ms: u64,
    draining: AtomicBool,
    evals: AtomicUsize,
}

impl StubEvaluator {
    pub fn uniform(winrate: f32) -> Self {
        Self {
            policy: None,
            policy_pass: 0.0,
            winrate,
            black_perspective: false,
            latency_ms: 0,
            draining: AtomicBool::new(false),
            evals: AtomicUsize::new(0),
        }
    }

    /// Uniform policy with a position-independent Black winrate.
    pub fn black_winrate(winrate: f32) -> Self {
        Self {
            black_perspective: true,
            ..Self::uniform(winrate)
        }
    }

    pub fn with_policy(policy: Vec<f32>, policy_pass: f32, winrate: f32) -> Self {
        Self {
            policy: Some(policy),
            policy_pass,
            winrate,
            black_perspective: false,
            latency_ms: 0,
            draining: AtomicBool::new(false),
            evals: AtomicUsize::new(0),
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn eval_count(&self) -> usize {
        self.evals.load(Ordering::Relaxed)
    }

    pub fn drain(&self) {
        self.draining.store(true, Ordering::Release);
    }
}

impl<G: GameState> Evaluator<G> for StubEvaluator {
    fn evaluate(&self, state: &G) -> Result<NetEval, EvaluatorError> {
        if self.draining.load(Ordering::Acquire) {
            return Err(EvaluatorError::Halted);
        }
        self.evals.fetch_add(1, Ordering::Relaxed);
        if self.latency_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(self.latency_ms));
        }
        let winrate = if self.black_perspective && state.to_move() == Color::White {
            1.0 - self.winrate
        } else {
            self.winrate
        };
        let n = state.num_intersections();
        match &self.policy {
            Some(policy) => Ok(NetEval {
                policy: policy.clone(),
                policy_pass: self.policy_pass,
                winrate,
            }),
            None => Ok(NetEval {
                policy: vec![1.0 / (n as f32 + 1.0); n],
                policy_pass: 1.0 / (n as f32 + 1.0),
                winrate,
            }),
        }
    }

    fn drain_evals(&self) {
        self.draining.store(true, Ordering::Release);
    }

    fn resume_evals(&self) {
        self.draining.store(false, Ordering::Release);
    }
}
