//! A search-tree vertex and its concurrent statistics.
//!
//! Nodes are shared between worker threads without locks on the read paths:
//! visit counts, evaluations and virtual losses are atomics, and "who gets to
//! expand this node" is decided by a compare-exchange on a three-state
//! expansion tag rather than a mutex. The children vector sits behind a
//! read-write lock; it is only written by the single expansion winner and by
//! the preparation phase, so read locks never contend with each other.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tengen_core::{Color, Evaluator, EvaluatorError, GameKind, GameState, Move};

use crate::config::SearchConfig;
use crate::math::{atomic_add_f64, cached_t_quantile, load_f32, load_f64, store_f32};
use crate::pointer::{tree_size_add, tree_size_sub, NodePointer};

/// Virtual losses applied per in-flight descent through a node.
pub const VIRTUAL_LOSS_COUNT: i32 = 3;

/// Expansion progress of a node. Transitions are one-way per search pass:
/// `Initial -> Expanding -> Expanded`, with `Expanding -> Initial` only when
/// the evaluator halts mid-expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExpandState {
    Initial = 0,
    Expanding = 1,
    Expanded = 2,
}

impl ExpandState {
    fn from_u8(raw: u8) -> ExpandState {
        match raw {
            0 => ExpandState::Initial,
            1 => ExpandState::Expanding,
            _ => ExpandState::Expanded,
        }
    }
}

const STATUS_ACTIVE: u8 = 0;
const STATUS_PRUNED: u8 = 1;
const STATUS_INVALID: u8 = 2;

/// A tree vertex: the move that reached it, its prior, and the visit and
/// evaluation statistics accumulated by back-propagation.
#[derive(Debug)]
pub struct Node {
    vertex: Move,
    /// Prior probability. Rewritten only in the preparation phase (noise).
    policy: AtomicU32,
    /// Network eval of this position, Black's perspective. Set at expansion.
    net_eval: AtomicU32,
    visits: AtomicI32,
    /// Sum of back-propagated winrates, Black's perspective (f64 bits).
    black_evals: AtomicU64,
    /// Welford accumulator for the eval variance (f64 bits).
    squared_eval_diff: AtomicU64,
    virtual_loss: AtomicI32,
    /// Policy-ratio threshold the children were last materialized at.
    /// 2.0 = not expanded, 0.0 = every reasonable move materialized.
    min_psa_ratio_children: AtomicU32,
    expand_state: AtomicU8,
    status: AtomicU8,
    children: RwLock<Vec<NodePointer>>,
}

impl Node {
    pub fn new(vertex: Move, policy: f32) -> Self {
        tree_size_add();
        Self {
            vertex,
            policy: AtomicU32::new(policy.to_bits()),
            net_eval: AtomicU32::new(0f32.to_bits()),
            visits: AtomicI32::new(0),
            black_evals: AtomicU64::new(0f64.to_bits()),
            squared_eval_diff: AtomicU64::new(0f64.to_bits()),
            virtual_loss: AtomicI32::new(0),
            min_psa_ratio_children: AtomicU32::new(2.0f32.to_bits()),
            expand_state: AtomicU8::new(ExpandState::Initial as u8),
            status: AtomicU8::new(STATUS_ACTIVE),
            children: RwLock::new(Vec::new()),
        }
    }

    #[inline]
    pub fn get_move(&self) -> Move {
        self.vertex
    }

    #[inline]
    pub fn first_visit(&self) -> bool {
        self.get_visits() == 0
    }

    #[inline]
    pub fn get_visits(&self) -> i32 {
        self.visits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn get_policy(&self) -> f32 {
        load_f32(&self.policy)
    }

    #[inline]
    pub fn set_policy(&self, policy: f32) {
        store_f32(&self.policy, policy);
    }

    pub fn virtual_loss(&self) {
        self.virtual_loss
            .fetch_add(VIRTUAL_LOSS_COUNT, Ordering::Relaxed);
    }

    pub fn virtual_loss_undo(&self) {
        self.virtual_loss
            .fetch_sub(VIRTUAL_LOSS_COUNT, Ordering::Relaxed);
    }

    #[inline]
    pub fn virtual_loss_count(&self) -> i32 {
        self.virtual_loss.load(Ordering::Relaxed)
    }

    /// Record a back-propagated evaluation (Black's perspective).
    ///
    /// Readers can observe the visit increment before the matching eval
    /// accumulation; the small transient skew is tolerated by selection.
    pub fn update(&self, eval: f32) {
        let old_eval = self.get_blackevals();
        let old_visits = self.get_visits();
        let old_delta = if old_visits > 0 {
            eval as f64 - old_eval / old_visits as f64
        } else {
            0.0
        };
        self.visits.fetch_add(1, Ordering::Relaxed);
        self.accumulate_eval(eval);
        let new_delta = eval as f64 - (old_eval + eval as f64) / (old_visits + 1) as f64;
        // Welford's online algorithm for the running variance.
        atomic_add_f64(&self.squared_eval_diff, old_delta * new_delta);
    }

    #[inline]
    pub fn get_blackevals(&self) -> f64 {
        load_f64(&self.black_evals)
    }

    fn accumulate_eval(&self, eval: f32) {
        atomic_add_f64(&self.black_evals, eval as f64);
    }

    pub fn get_eval_variance(&self, default_var: f32) -> f32 {
        let visits = self.get_visits();
        if visits > 1 {
            (load_f64(&self.squared_eval_diff) / (visits - 1) as f64) as f32
        } else {
            default_var
        }
    }

    /// Mean winrate for `tomove`, with `virtual_loss` pending descents
    /// counted as losses for Black when White is to move and vice versa.
    pub fn get_raw_eval(&self, tomove: Color, virtual_loss: i32) -> f32 {
        let visits = self.get_visits() + virtual_loss;
        debug_assert!(visits > 0);
        let mut blackevals = self.get_blackevals();
        if tomove == Color::White {
            blackevals += virtual_loss as f64;
        }
        let eval = (blackevals / visits as f64) as f32;
        if tomove == Color::White {
            1.0 - eval
        } else {
            eval
        }
    }

    /// Mean winrate including the node's current virtual losses.
    pub fn get_eval(&self, tomove: Color) -> f32 {
        self.get_raw_eval(tomove, self.virtual_loss.load(Ordering::Relaxed))
    }

    /// The network's immediate evaluation of this position for `tomove`.
    pub fn get_net_eval(&self, tomove: Color) -> f32 {
        let eval = load_f32(&self.net_eval);
        if tomove == Color::White {
            1.0 - eval
        } else {
            eval
        }
    }

    /// Lower confidence bound of the winrate for `color`.
    ///
    /// Children with fewer than two visits sort below every visited child.
    pub fn get_eval_lcb(&self, color: Color) -> f32 {
        let visits = self.get_visits();
        if visits < 2 {
            return -1e6 + visits as f32;
        }
        let mean = self.get_raw_eval(color, 0);
        let stddev = (self.get_eval_variance(1.0) / visits as f32).sqrt();
        let z = cached_t_quantile(visits - 1);
        mean - z * stddev
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.min_psa_ratio_children() <= 1.0
    }

    #[inline]
    fn min_psa_ratio_children(&self) -> f32 {
        load_f32(&self.min_psa_ratio_children)
    }

    /// Would expanding at `min_psa_ratio` admit children not yet linked?
    #[inline]
    pub fn expandable(&self, min_psa_ratio: f32) -> bool {
        min_psa_ratio < self.min_psa_ratio_children()
    }

    pub fn invalidate(&self) {
        self.status.store(STATUS_INVALID, Ordering::Release);
    }

    /// Toggle between active and pruned. Invalid is sticky.
    pub fn set_active(&self, active: bool) {
        if self.valid() {
            let status = if active { STATUS_ACTIVE } else { STATUS_PRUNED };
            self.status.store(status, Ordering::Release);
        }
    }

    #[inline]
    pub fn valid(&self) -> bool {
        self.status.load(Ordering::Acquire) != STATUS_INVALID
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.status.load(Ordering::Acquire) == STATUS_ACTIVE
    }

    #[inline]
    pub fn expand_state(&self) -> ExpandState {
        ExpandState::from_u8(self.expand_state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_expanding(&self) -> bool {
        self.expand_state() == ExpandState::Expanding
    }

    /// Claim the right to expand. Only the winner of the
    /// `Initial -> Expanding` compare-exchange proceeds.
    fn acquire_expanding(&self) -> bool {
        self.expand_state
            .compare_exchange(
                ExpandState::Initial as u8,
                ExpandState::Expanding as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn expand_done(&self) {
        let previous = self
            .expand_state
            .swap(ExpandState::Expanded as u8, Ordering::AcqRel);
        debug_assert_eq!(previous, ExpandState::Expanding as u8);
    }

    fn expand_cancel(&self) {
        let previous = self
            .expand_state
            .swap(ExpandState::Initial as u8, Ordering::AcqRel);
        debug_assert_eq!(previous, ExpandState::Expanding as u8);
    }

    /// Spin until the in-flight expansion (if any) completes. Expansions are
    /// short: one evaluator call plus child linking.
    fn wait_expanded(&self) {
        while self.expand_state.load(Ordering::Acquire) == ExpandState::Expanding as u8 {
            std::hint::spin_loop();
        }
        // Usually Expanded here, but a drain can cancel an expansion back
        // to Initial while we were waiting.
        debug_assert_ne!(
            self.expand_state.load(Ordering::Acquire),
            ExpandState::Expanding as u8
        );
    }

    /// Read access to the children. Structural writes happen only inside the
    /// expansion winner and in the single-threaded preparation phase.
    pub fn children(&self) -> RwLockReadGuard<'_, Vec<NodePointer>> {
        self.children.read()
    }

    pub(crate) fn children_mut(&self) -> RwLockWriteGuard<'_, Vec<NodePointer>> {
        self.children.write()
    }

    /// Materialize this node's children from an evaluator query.
    ///
    /// Returns `Ok(Some(net_eval))` when this call performed the expansion,
    /// `Ok(None)` when there was nothing to do (terminal position, lost the
    /// expansion race, or already expanded at this threshold). A halted
    /// evaluator reverts the state machine and propagates the error.
    pub fn create_children<G, E>(
        &self,
        cfg: &SearchConfig,
        evaluator: &E,
        nodecount: &AtomicUsize,
        state: &G,
        min_psa_ratio: f32,
    ) -> Result<Option<f32>, EvaluatorError>
    where
        G: GameState,
        E: Evaluator<G>,
    {
        // Two consecutive passes end the game: no successors.
        if state.passes() >= 2 {
            return Ok(None);
        }

        if !self.acquire_expanding() {
            return Ok(None);
        }

        if !self.expandable(min_psa_ratio) {
            self.expand_done();
            return Ok(None);
        }

        let raw = match evaluator.evaluate(state) {
            Ok(raw) => raw,
            Err(err) => {
                self.expand_cancel();
                return Err(err);
            }
        };

        // The network reports winrate for the side to move; the tree stores
        // everything from Black's perspective.
        let stm_eval = raw.winrate;
        let to_move = state.to_move();
        let net_eval = if to_move == Color::White {
            1.0 - stm_eval
        } else {
            stm_eval
        };
        store_f32(&self.net_eval, net_eval);

        let size = state.board_size();
        let mut nodelist: Vec<(f32, Move)> = Vec::new();
        let mut legal_sum = 0.0f32;
        for (i, &prior) in raw.policy.iter().enumerate().take(state.num_intersections()) {
            let vertex = state.vertex_at(i % size, i / size);
            if state.is_move_legal(to_move, vertex) {
                nodelist.push((prior, vertex));
                legal_sum += prior;
            }
        }

        match state.kind() {
            GameKind::Othello => {
                // Passing is only a move when nothing else is.
                if nodelist.is_empty() {
                    nodelist.push((1.0, Move::Pass));
                    legal_sum = 1.0;
                }
            }
            GameKind::Go => {
                let mut allow_pass = cfg.dumbpass;

                // Few moves left: always consider passing.
                if nodelist.len() <= std::cmp::max(5, size) {
                    allow_pass = true;
                }

                // Otherwise only try passing when winning on both the net
                // score and the board count.
                if !allow_pass && stm_eval > 0.8 {
                    let relative_score = to_move.sign() * state.final_score();
                    if relative_score >= 0.0 {
                        allow_pass = true;
                    }
                }

                if allow_pass {
                    nodelist.push((raw.policy_pass, Move::Pass));
                    legal_sum += raw.policy_pass;
                }
            }
        }

        if legal_sum > f32::MIN_POSITIVE {
            // Re-normalize after dropping illegal moves.
            for entry in &mut nodelist {
                entry.0 /= legal_sum;
            }
        } else if !nodelist.is_empty() {
            // Can happen with fresh randomized nets.
            let uniform = 1.0 / nodelist.len() as f32;
            for entry in &mut nodelist {
                entry.0 = uniform;
            }
        }

        self.link_nodelist(nodecount, nodelist, min_psa_ratio);
        if self.first_visit() {
            self.update(net_eval);
        }
        self.expand_done();
        Ok(Some(net_eval))
    }

    /// Append children whose prior falls inside the new threshold window.
    /// Entries already linked at a looser threshold are not duplicated.
    fn link_nodelist(
        &self,
        nodecount: &AtomicUsize,
        mut nodelist: Vec<(f32, Move)>,
        min_psa_ratio: f32,
    ) {
        debug_assert!(min_psa_ratio < self.min_psa_ratio_children());

        if nodelist.is_empty() {
            return;
        }

        // Best to worst, so the strongest prior comes first.
        nodelist.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(CmpOrdering::Equal));

        let max_psa = nodelist[0].0;
        let old_min_psa = max_psa * self.min_psa_ratio_children();
        let new_min_psa = max_psa * min_psa_ratio;

        let mut children = self.children_mut();
        if new_min_psa > 0.0 {
            children.reserve(nodelist.iter().filter(|n| n.0 >= new_min_psa).count());
        } else {
            children.reserve(nodelist.len());
        }

        let mut skipped_children = false;
        for (policy, vertex) in nodelist {
            if policy < new_min_psa {
                skipped_children = true;
            } else if policy < old_min_psa {
                children.push(NodePointer::new(vertex, policy));
                nodecount.fetch_add(1, Ordering::Relaxed);
            }
        }
        drop(children);

        store_f32(
            &self.min_psa_ratio_children,
            if skipped_children { min_psa_ratio } else { 0.0 },
        );
    }

    /// PUCT child selection. Returns the inflated best child, or `None` when
    /// every child is inactive.
    pub fn uct_select_child(
        &self,
        cfg: &SearchConfig,
        color: Color,
        is_root: bool,
    ) -> Option<Arc<Node>> {
        // Selection needs the full child list.
        self.wait_expanded();

        let children = self.children();

        // Count parent visits from the children to stay consistent under
        // concurrent updates.
        let mut total_visited_policy = 0.0f32;
        let mut parentvisits = 0i64;
        for child in children.iter() {
            if child.valid() {
                let child_visits = child.get_visits();
                parentvisits += child_visits as i64;
                if child_visits > 0 {
                    total_visited_policy += child.get_policy();
                }
            }
        }

        let numerator = ((parentvisits as f64)
            * (cfg.logpuct as f64 * parentvisits as f64 + cfg.logconst as f64).ln())
        .sqrt();
        let fpu_base = if is_root {
            cfg.fpu_root_reduction
        } else {
            cfg.fpu_reduction
        };
        let fpu_reduction = fpu_base * total_visited_policy.sqrt();
        // First-play urgency: parent eval (not the raw net output) minus the
        // reduction.
        let fpu_eval = self.get_raw_eval(color, 0) - fpu_reduction;

        let mut best: Option<&NodePointer> = None;
        let mut best_value = f64::MIN;

        for child in children.iter() {
            if !child.active() {
                continue;
            }

            let winrate = if child.is_expanding() {
                // Someone else is expanding this node; never select it if we
                // can avoid it, we would block on it.
                -1.0 - fpu_reduction
            } else if child.get_visits() > 0 {
                child.get_eval(color)
            } else {
                fpu_eval
            };
            let psa = child.get_policy();
            let denom = 1.0 + child.get_visits() as f64;
            let puct = cfg.puct as f64 * psa as f64 * (numerator / denom);
            let value = winrate as f64 + puct;

            if value > best_value {
                best_value = value;
                best = Some(child);
            }
        }

        let best = best?;
        best.inflate();
        best.node().map(Arc::clone)
    }

    /// Sort children best-first under the LCB-first ordering. Must only be
    /// called while no workers are running.
    pub fn sort_children(&self, color: Color, lcb_min_visits: f32) {
        let mut children = self.children_mut();
        children.sort_by(|a, b| node_cmp(b, a, color, lcb_min_visits));
    }

    /// Best root child under the LCB-first ordering, inflated.
    pub fn get_best_root_child(&self, color: Color, lcb_min_visit_ratio: f32) -> Option<Arc<Node>> {
        self.wait_expanded();

        let children = self.children();
        let max_visits = children.iter().map(|c| c.get_visits()).max().unwrap_or(0);
        let lcb_min_visits = lcb_min_visit_ratio * max_visits as f32;

        let mut iter = children.iter();
        let mut best = iter.next()?;
        for child in iter {
            if node_cmp(child, best, color, lcb_min_visits) == CmpOrdering::Greater {
                best = child;
            }
        }
        best.inflate();
        best.node().map(Arc::clone)
    }

    /// Count the live subtree and reset the expansion tag of nodes that can
    /// still grow, so a reused tree expands again under the new search.
    pub fn count_nodes_and_clear_expand_state(&self) -> usize {
        let children = self.children();
        let mut nodecount = children.len();
        if self.expandable(0.0) {
            self.expand_state
                .store(ExpandState::Initial as u8, Ordering::Release);
        }
        for child in children.iter() {
            if let Some(node) = child.node() {
                nodecount += node.count_nodes_and_clear_expand_state();
            }
        }
        nodecount
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        tree_size_sub();
    }
}

/// LCB-first ordering over child slots for move selection and stat dumps.
///
/// Compares by lower confidence bound when both sides have enough visits,
/// then by visits, then by prior (both unvisited) or mean eval.
pub fn node_cmp(
    a: &NodePointer,
    b: &NodePointer,
    color: Color,
    lcb_min_visits: f32,
) -> CmpOrdering {
    // LCB needs at least two visits.
    let lcb_min_visits = lcb_min_visits.max(2.0);

    let a_visits = a.get_visits();
    let b_visits = b.get_visits();

    if a_visits as f32 > lcb_min_visits && b_visits as f32 > lcb_min_visits {
        let a_lcb = a.get_eval_lcb(color);
        let b_lcb = b.get_eval_lcb(color);
        if a_lcb != b_lcb {
            return a_lcb.partial_cmp(&b_lcb).unwrap_or(CmpOrdering::Equal);
        }
    }

    if a_visits != b_visits {
        return a_visits.cmp(&b_visits);
    }

    if a_visits == 0 {
        return a
            .get_policy()
            .partial_cmp(&b.get_policy())
            .unwrap_or(CmpOrdering::Equal);
    }

    a.get_eval(color)
        .partial_cmp(&b.get_eval(color))
        .unwrap_or(CmpOrdering::Equal)
}
