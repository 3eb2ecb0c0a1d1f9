//! The per-move search driver.
//!
//! `think` reuses or rebuilds the root, prepares it, fans playout workers out
//! over a scoped thread pool and polls the stop conditions every 10 ms until
//! a budget runs out or a single contender move remains. Workers never hold a
//! lock across an evaluator call; all cross-thread writes in steady state are
//! the atomic counters on the nodes.

use std::collections::VecDeque;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tengen_core::{Color, Evaluator, EvaluatorError, GameKind, GameState, Move};
use tracing::{debug, info, warn};

use crate::analysis::{render_analysis_line, AnalysisEntry};
use crate::config::{SearchConfig, TimeManagement, UNLIMITED_PLAYOUTS};
use crate::math;
use crate::node::Node;
use crate::pointer;
use crate::time::TimeControl;

/// Restrictions on the returned move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassFlags(u8);

impl PassFlags {
    pub const NONE: PassFlags = PassFlags(0);
    /// Never return `Move::Resign`.
    pub const NORESIGN: PassFlags = PassFlags(1);
    /// Avoid `Move::Pass` unless it is the only acceptable move.
    pub const NOPASS: PassFlags = PassFlags(2);

    pub fn contains(self, other: PassFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for PassFlags {
    type Output = PassFlags;

    fn bitor(self, rhs: PassFlags) -> PassFlags {
        PassFlags(self.0 | rhs.0)
    }
}

/// Training-data hook, invoked once per completed `think`.
pub trait Trainer<G: GameState>: Send {
    fn record(&mut self, state: &G, root: &Node);
}

/// Outcome of one simulated playout: a Black-perspective eval, or nothing
/// when the playout was cut short (superko, all children inactive).
#[derive(Debug, Clone, Copy)]
struct SimResult(Option<f32>);

impl SimResult {
    fn none() -> SimResult {
        SimResult(None)
    }

    fn from_eval(eval: f32) -> SimResult {
        SimResult(Some(eval))
    }

    fn from_score(score: f32) -> SimResult {
        if score > 0.0 {
            SimResult(Some(1.0))
        } else if score < 0.0 {
            SimResult(Some(0.0))
        } else {
            SimResult(Some(0.5))
        }
    }

    fn valid(&self) -> bool {
        self.0.is_some()
    }

    fn eval(&self) -> f32 {
        self.0.unwrap_or(0.5)
    }
}

/// Undoes a node's virtual loss on every exit path, `?` included.
struct VirtualLossGuard<'a>(&'a Node);

impl Drop for VirtualLossGuard<'_> {
    fn drop(&mut self) {
        self.0.virtual_loss_undo();
    }
}

/// Read-only context the playout workers run against.
struct SimCtx<'a, E> {
    cfg: &'a SearchConfig,
    evaluator: &'a E,
    nodes: &'a AtomicUsize,
    root: &'a Node,
}

/// Expansion threshold by memory pressure: the fuller the node budget, the
/// higher the policy bar for materializing children; at the limit expansion
/// stops entirely (2.0 can never be reached by a prior ratio).
fn get_min_psa_ratio(cfg: &SearchConfig) -> f32 {
    let mem_full = pointer::tree_size() as f32 / cfg.max_tree_size as f32;
    if mem_full > 0.5 {
        if mem_full > 0.95 {
            if mem_full >= 1.0 {
                return 2.0;
            }
            return 0.01;
        }
        return 0.001;
    }
    0.0
}

/// One playout: descend by PUCT, expand at the leaf, back-propagate the
/// evaluation. A halted evaluator unwinds through `?`; the virtual-loss
/// guards keep the counters balanced on that path too.
fn play_simulation<G, E>(
    ctx: &SimCtx<'_, E>,
    state: &mut G,
    node: &Node,
) -> Result<SimResult, EvaluatorError>
where
    G: GameState,
    E: Evaluator<G>,
{
    let color = state.to_move();
    let mut result = SimResult::none();
    let mut new_node = false;

    node.virtual_loss();
    let _guard = VirtualLossGuard(node);

    if node.expandable(0.0) {
        if state.passes() >= 2 {
            // Two consecutive passes: score the final position.
            result = SimResult::from_score(state.final_score());
        } else {
            let had_children = node.has_children();
            let expanded = node.create_children(
                ctx.cfg,
                ctx.evaluator,
                ctx.nodes,
                state,
                get_min_psa_ratio(ctx.cfg),
            )?;
            if let Some(eval) = expanded {
                if !had_children {
                    result = SimResult::from_eval(eval);
                    new_node = true;
                }
            }
        }
    }

    if node.has_children() && !result.valid() {
        if let Some(next) = node.uct_select_child(ctx.cfg, color, ptr::eq(node, ctx.root)) {
            let mv = next.get_move();
            state.play_move(mv);
            if mv != Move::Pass && state.superko() {
                next.invalidate();
            } else {
                result = play_simulation(ctx, state, &next)?;
            }
        }
    }

    // A fresh expansion already applied its own update.
    if result.valid() && !new_node {
        node.update(result.eval());
    }

    Ok(result)
}

/// Walk the principal variation: best child by LCB at every step, stopping
/// at anything unvisited or still expanding.
fn get_pv<G: GameState>(cfg: &SearchConfig, state: &mut G, parent: &Node) -> String {
    if !parent.has_children() {
        return String::new();
    }
    if parent.expandable(0.0) {
        // Not fully expanded: someone could be linking children while we
        // walk them. Stay out of that node entirely.
        return String::new();
    }
    let best = match parent.get_best_root_child(state.to_move(), cfg.lcb_min_visit_ratio) {
        Some(best) => best,
        None => return String::new(),
    };
    if best.first_visit() {
        return String::new();
    }

    let best_move = best.get_move();
    let mut res = state.move_to_text(best_move);
    state.play_move(best_move);

    let next = get_pv(cfg, state, &best);
    if !next.is_empty() {
        res.push(' ');
        res.push_str(&next);
    }
    res
}

/// A search instance bound to one game. Owns the tree across moves so that
/// consecutive `think` calls can reuse the relevant subtree.
pub struct Search<G: GameState> {
    cfg: SearchConfig,
    root: Arc<Node>,
    last_rootstate: Option<G>,
    nodes: AtomicUsize,
    reused_nodes: usize,
    playouts: AtomicI32,
    running: AtomicBool,
    stop: Arc<AtomicBool>,
    max_playouts: i32,
    max_visits: i32,
    time_control: TimeControl,
    rng: ChaCha20Rng,
    think_output: String,
    delete_futures: VecDeque<thread::JoinHandle<()>>,
    trainer: Option<Box<dyn Trainer<G>>>,
}

impl<G: GameState> Search<G> {
    pub fn new(cfg: SearchConfig) -> Search<G> {
        math::init_z_table(cfg.ci_alpha);
        let max_playouts = cfg.max_playouts.min(UNLIMITED_PLAYOUTS);
        let max_visits = cfg.max_visits.min(UNLIMITED_PLAYOUTS);
        Search {
            root: Arc::new(Node::new(Move::Pass, 0.0)),
            last_rootstate: None,
            nodes: AtomicUsize::new(0),
            reused_nodes: 0,
            playouts: AtomicI32::new(0),
            running: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
            max_playouts,
            max_visits,
            time_control: TimeControl::infinite(),
            rng: ChaCha20Rng::from_entropy(),
            think_output: String::new(),
            delete_futures: VecDeque::new(),
            trainer: None,
            cfg,
        }
    }

    /// Like [`Search::new`], with a deterministic noise/randomization seed.
    pub fn with_seed(cfg: SearchConfig, seed: u64) -> Search<G> {
        let mut search = Search::new(cfg);
        search.rng = ChaCha20Rng::seed_from_u64(seed);
        search
    }

    pub fn set_playout_limit(&mut self, playouts: i32) {
        self.max_playouts = playouts.min(UNLIMITED_PLAYOUTS);
    }

    pub fn set_visit_limit(&mut self, visits: i32) {
        // Half the integer range, so concurrent visit increments can't
        // overflow.
        self.max_visits = visits.min(UNLIMITED_PLAYOUTS);
    }

    pub fn set_time_control(&mut self, time_control: TimeControl) {
        self.time_control = time_control;
    }

    pub fn time_control_mut(&mut self) -> &mut TimeControl {
        &mut self.time_control
    }

    pub fn set_trainer(&mut self, trainer: Box<dyn Trainer<G>>) {
        self.trainer = Some(trainer);
    }

    /// Shared flag that makes a running [`ponder`](Search::ponder) return.
    pub fn stop_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// The current root. Exposed for stat inspection and tests.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Nodes carried over from the previous search by tree reuse.
    pub fn reused_nodes(&self) -> usize {
        self.reused_nodes
    }

    /// Live node count of the current tree.
    pub fn node_count(&self) -> usize {
        self.nodes.load(Ordering::Relaxed)
    }

    /// Playouts completed by the current/last `think` call.
    pub fn playouts(&self) -> i32 {
        self.playouts.load(Ordering::Relaxed)
    }

    /// Summary of the previous `think` call.
    pub fn explain_last_think(&self) -> &str {
        &self.think_output
    }

    /// Pick a move for `color` in `state`.
    pub fn think<E: Evaluator<G>>(
        &mut self,
        state: &mut G,
        evaluator: &E,
        color: Color,
        passflag: PassFlags,
    ) -> Move {
        self.time_control.start(color);
        let start = Instant::now();

        self.update_root(state);
        state.set_to_move(color);

        let time_for_move = self.time_control.max_time_for_move(
            state.board_size(),
            color,
            state.movenum(),
            self.cfg.timemanage != TimeManagement::Off,
            self.cfg.lagbuffer_cs,
        );
        info!(
            budget_s = time_for_move as f32 / 100.0,
            "thinking at most this long"
        );

        // A sorted, legal move list at the root: even in time trouble the
        // search returns something decent.
        let root = Arc::clone(&self.root);
        if let Err(err) =
            root.prepare_root_node(&self.cfg, evaluator, color, &self.nodes, state, &mut self.rng)
        {
            warn!(error = %err, "root preparation aborted");
        }

        if root.has_children() {
            self.running.store(true, Ordering::Release);
            self.run_workers(state, evaluator, &root, start, time_for_move, false);
            evaluator.resume_evals();

            // Reactivate any children pruned as non-contenders; the tree
            // may be reused by the next call.
            for child in root.children().iter() {
                if let Some(node) = child.node() {
                    node.set_active(true);
                }
            }
        }

        self.time_control.stop(color);

        if !root.has_children() {
            return Move::Pass;
        }

        self.dump_stats(state, &root);
        if let Some(trainer) = self.trainer.as_mut() {
            trainer.record(state, &root);
        }

        let elapsed_centis = (start.elapsed().as_millis() / 10) as i64;
        let playouts = self.playouts.load(Ordering::Relaxed);
        info!(
            visits = root.get_visits(),
            nodes = self.nodes.load(Ordering::Relaxed),
            playouts,
            rate = playouts as f32 * 100.0 / (elapsed_centis + 1) as f32,
            "search finished"
        );

        let bestmove = self.get_best_move(state, passflag);

        self.think_output = format!(
            "move {}, {} => {}\n{}",
            state.movenum(),
            color,
            state.move_to_text(bestmove),
            self.get_analysis(state, root.get_visits())
        );

        // Keep the root state around to check for tree reuse next call.
        self.last_rootstate = Some(state.clone());
        bestmove
    }

    /// Search during the opponent's turn. Does not commit a move, does not
    /// record training data; runs until the stop token fires or a limit is
    /// hit. Tree reuse is disabled while analysis move restrictions apply.
    pub fn ponder<E: Evaluator<G>>(&mut self, state: &mut G, evaluator: &E) {
        let disable_reuse = !self.cfg.analyze_avoid_list.is_empty();
        if disable_reuse {
            self.last_rootstate = None;
        }

        self.update_root(state);

        let root = Arc::clone(&self.root);
        let color = state.to_move();
        if let Err(err) =
            root.prepare_root_node(&self.cfg, evaluator, color, &self.nodes, state, &mut self.rng)
        {
            warn!(error = %err, "root preparation aborted");
        }

        self.stop.store(false, Ordering::Release);
        if root.has_children() {
            self.running.store(true, Ordering::Release);
            let start = Instant::now();
            self.run_workers(state, evaluator, &root, start, 1, true);
            evaluator.resume_evals();
        }

        self.dump_stats(state, &root);
        info!(
            visits = root.get_visits(),
            nodes = self.nodes.load(Ordering::Relaxed),
            "ponder finished"
        );

        if !disable_reuse {
            self.last_rootstate = Some(state.clone());
        }
    }

    /// Fan out the playout workers and drive the stop controller until the
    /// search should end; returns with workers joined and the evaluator
    /// drained.
    fn run_workers<E: Evaluator<G>>(
        &self,
        state: &G,
        evaluator: &E,
        root: &Arc<Node>,
        start: Instant,
        time_for_move: i32,
        pondering: bool,
    ) {
        let cfg = &self.cfg;
        let ctx = SimCtx {
            cfg,
            evaluator,
            nodes: &self.nodes,
            root: root.as_ref(),
        };
        let playouts = &self.playouts;
        let running = &self.running;
        let max_tree_size = cfg.max_tree_size;

        thread::scope(|s| {
            for _ in 0..cfg.num_threads.max(1) {
                s.spawn(|| loop {
                    let mut currstate = state.clone();
                    match play_simulation(&ctx, &mut currstate, ctx.root) {
                        Ok(result) => {
                            if result.valid() {
                                playouts.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        // Drained evaluator: unwind cleanly.
                        Err(_) => break,
                    }
                    if !running.load(Ordering::Acquire) || pointer::tree_size() >= max_tree_size {
                        break;
                    }
                });
            }

            let mut keeprunning = true;
            let mut last_update = 0;
            let mut last_output = 0;
            while keeprunning {
                thread::sleep(Duration::from_millis(10));

                let elapsed_centis = (start.elapsed().as_millis() / 10) as i32;

                if cfg.analyze_interval_cs > 0
                    && elapsed_centis - last_output > cfg.analyze_interval_cs
                {
                    last_output = elapsed_centis;
                    self.output_analysis(state, root);
                }

                if !cfg.quiet && elapsed_centis - last_update > 250 {
                    last_update = elapsed_centis;
                    info!(
                        "{}",
                        self.get_analysis(state, self.playouts.load(Ordering::Relaxed))
                    );
                }

                keeprunning = self.is_running();
                if pondering {
                    keeprunning &= !self.stop.load(Ordering::Acquire);
                    keeprunning &= !self.stop_thinking(0, 1);
                } else {
                    keeprunning &= !self.stop_thinking(elapsed_centis, time_for_move);
                    keeprunning &= self.have_alternate_moves(state, elapsed_centis, time_for_move);
                }
            }

            // Make sure analysis is posted at least once.
            if cfg.analyze_interval_cs > 0 && last_output == 0 {
                self.output_analysis(state, root);
            }

            self.running.store(false, Ordering::Release);
            evaluator.drain_evals();
            // Scope exit joins the workers.
        });
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && pointer::tree_size() < self.cfg.max_tree_size
    }

    fn stop_thinking(&self, elapsed_centis: i32, time_for_move: i32) -> bool {
        self.playouts.load(Ordering::Relaxed) >= self.max_playouts
            || self.root.get_visits() >= self.max_visits
            || elapsed_centis >= time_for_move
    }

    /// Remaining playouts this move can still get, bounded by the measured
    /// playout rate once it is reliable (1 s and 100 playouts).
    fn est_playouts_left(&self, elapsed_centis: i32, time_for_move: i32) -> i32 {
        let playouts = self.playouts.load(Ordering::Relaxed);
        let playouts_left = (self.max_playouts - playouts)
            .min(self.max_visits - self.root.get_visits())
            .max(0);

        if elapsed_centis < 100 || playouts < 100 {
            return playouts_left;
        }
        let playout_rate = playouts as f32 / elapsed_centis as f32;
        let time_left = (time_for_move - elapsed_centis).max(0);
        playouts_left.min((playout_rate * time_left as f32).ceil() as i32)
    }

    /// Count (and optionally prune) root children that can no longer catch
    /// up with the leader within the remaining playout budget.
    fn prune_noncontenders(
        &self,
        color: Color,
        elapsed_centis: i32,
        time_for_move: i32,
        prune: bool,
    ) -> usize {
        // The root's children vector is never structurally modified during
        // a running search, so walking it here is safe.
        let children = self.root.children();

        let mut lcb_max = 0.0f32;
        let mut n_first = 0;
        for child in children.iter() {
            if child.valid() {
                let visits = child.get_visits();
                if visits > 0 {
                    lcb_max = lcb_max.max(child.get_eval_lcb(color));
                }
                n_first = n_first.max(visits);
            }
        }

        let min_required_visits = n_first - self.est_playouts_left(elapsed_centis, time_for_move);
        let mut pruned_nodes = 0;
        for child in children.iter() {
            if child.valid() {
                let visits = child.get_visits();
                let has_enough_visits = visits >= min_required_visits;
                // Never prune moves that could still have the best lower
                // confidence bound.
                let high_winrate = visits > 0
                    && child
                        .node()
                        .map(|node| node.get_raw_eval(color, 0))
                        .unwrap_or(0.0)
                        >= lcb_max;
                let prune_this_node = !(has_enough_visits || high_winrate);

                if prune {
                    if let Some(node) = child.node() {
                        node.set_active(!prune_this_node);
                    }
                }
                if prune_this_node {
                    pruned_nodes += 1;
                }
            }
        }

        debug_assert!(pruned_nodes < children.len());
        pruned_nodes
    }

    /// False once only a single contender remains and time rules allow
    /// banking the savings.
    fn have_alternate_moves(&self, state: &G, elapsed_centis: i32, time_for_move: i32) -> bool {
        if self.cfg.timemanage == TimeManagement::Off {
            return true;
        }
        let my_color = state.to_move();
        // Self-play disables pruning to keep the visit distribution
        // unbiased for training data.
        let prune = self.cfg.timemanage != TimeManagement::NoPruning;
        let pruned = self.prune_noncontenders(my_color, elapsed_centis, time_for_move, prune);
        if pruned < self.root.children().len().saturating_sub(1) {
            return true;
        }
        // If time can't be saved up anyway, use all of it, unless "fast"
        // time management asks for quick responses to forced moves.
        if !self.time_control.can_accumulate_time(my_color)
            || self.max_playouts < UNLIMITED_PLAYOUTS
        {
            if self.cfg.timemanage != TimeManagement::Fast {
                return true;
            }
        }
        if time_for_move - elapsed_centis > 50 {
            info!(
                saved_s = (time_for_move - elapsed_centis) as f32 / 100.0,
                "only one contender left, stopping early"
            );
        }
        false
    }

    /// Reset per-move counters and make the root match `state`, reusing the
    /// previous tree when the position descends from the old root.
    fn update_root(&mut self, state: &G) {
        // Playout accounting is per `think` call.
        self.playouts.store(0, Ordering::Relaxed);
        let start_nodes = self.nodes.load(Ordering::Relaxed);

        if !self.advance_to_new_rootstate(state) {
            self.root = Arc::new(Node::new(Move::Pass, 0.0));
        }
        // Clear the snapshot to prevent accidental use below.
        self.last_rootstate = None;

        // Size of the (reused or fresh) tree, with stale expansion tags
        // cleared on the way.
        let node_count = self.root.count_nodes_and_clear_expand_state();
        self.nodes.store(node_count, Ordering::Relaxed);
        self.reused_nodes = node_count;
        if node_count > 0 {
            debug!(
                start_nodes,
                reused = node_count,
                "root update reused part of the tree"
            );
        }
    }

    /// Try to walk the old root forward to the current position. Any failure
    /// falls back to a fresh root.
    fn advance_to_new_rootstate(&mut self, state: &G) -> bool {
        let Some(mut last) = self.last_rootstate.take() else {
            return false;
        };

        if state.komi() != last.komi() {
            return false;
        }
        let Some(depth) = state.movenum().checked_sub(last.movenum()) else {
            return false;
        };

        let mut test = state.clone();
        for _ in 0..depth {
            test.undo_move();
        }
        if last.hash() != test.hash() {
            // The old root does not lie on this game's history.
            return false;
        }

        // Make sure the subtrees discarded on the previous move are in fact
        // gone before we start discarding more.
        while let Some(handle) = self.delete_futures.pop_front() {
            let _ = handle.join();
        }

        for _ in 0..depth {
            test.forward_move();
            let Some(mv) = test.last_move() else {
                return false;
            };

            let oldroot = Arc::clone(&self.root);
            let promoted = oldroot.find_child(mv);
            // Lazy tree destruction: the old root's siblings die on a
            // background thread, off the move's critical path.
            self.delete_futures
                .push_back(thread::spawn(move || drop(oldroot)));

            match promoted {
                Some(newroot) => self.root = newroot,
                // Tree hasn't been expanded this far.
                None => return false,
            }
            last.play_move(mv);
        }

        debug_assert_eq!(state.movenum(), last.movenum());

        if last.hash() != test.hash() {
            // Can happen if the host played multiple moves in a row for the
            // same player.
            return false;
        }
        true
    }

    /// Extract the move to play: LCB-best child, adjusted by the pass and
    /// resign heuristics.
    fn get_best_move(&mut self, state: &G, passflag: PassFlags) -> Move {
        let color = state.to_move();
        let root = Arc::clone(&self.root);

        // Make sure best is first.
        let max_visits = root
            .children()
            .iter()
            .map(|c| c.get_visits())
            .max()
            .unwrap_or(0);
        root.sort_children(color, self.cfg.lcb_min_visit_ratio * max_visits as f32);

        // Early game: randomize the move proportionally to playouts.
        if state.movenum() < self.cfg.random_cnt {
            root.randomize_first_proportionally(
                &mut self.rng,
                self.cfg.random_temp,
                self.cfg.random_min_visits,
            );
        }

        let Some(first_child) = root.get_first_child() else {
            return Move::Pass;
        };
        let mut bestmove = first_child.get_move();
        let mut besteval = if first_child.first_visit() {
            0.5
        } else {
            first_child.get_raw_eval(color, 0)
        };

        if passflag.contains(PassFlags::NOPASS) {
            if bestmove == Move::Pass {
                if let Some(nopass) = root.get_nopass_child(state) {
                    info!("preferring not to pass");
                    bestmove = nopass.get_move();
                    besteval = if nopass.first_visit() {
                        1.0
                    } else {
                        nopass.get_raw_eval(color, 0)
                    };
                } else {
                    info!("pass is the only acceptable move");
                }
            }
        } else if state.kind() == GameKind::Go && !self.cfg.dumbpass {
            let relative_score = color.sign() * state.final_score();
            if bestmove == Move::Pass {
                // Passing ended up on top: check what it actually scores.
                if relative_score < 0.0 {
                    if let Some(nopass) = root.get_nopass_child(state) {
                        info!("avoiding pass because it loses");
                        bestmove = nopass.get_move();
                        besteval = if nopass.first_visit() {
                            1.0
                        } else {
                            nopass.get_raw_eval(color, 0)
                        };
                    } else {
                        info!("no alternative to passing");
                    }
                } else if relative_score > 0.0 {
                    info!("passing wins");
                } else {
                    // Draw: only deviate for an alternative that looks
                    // winning.
                    if let Some(nopass) = root.get_nopass_child(state) {
                        if !nopass.first_visit() {
                            let nopass_eval = nopass.get_raw_eval(color, 0);
                            if nopass_eval > 0.5 {
                                info!("avoiding pass, alternative might win");
                                bestmove = nopass.get_move();
                                besteval = nopass_eval;
                            }
                        }
                    }
                }
            } else if state.last_move() == Some(Move::Pass) {
                // The opponent passed; should we pass out and end the game?
                if !state.is_move_legal(color, Move::Pass) {
                    info!("passing is forbidden, playing on");
                } else if relative_score < 0.0 {
                    info!("passing loses, playing on");
                } else if relative_score > 0.0 {
                    info!("passing wins, passing out");
                    bestmove = Move::Pass;
                } else if besteval < 0.5 {
                    // Draw: make it depend on the evaluation.
                    bestmove = Move::Pass;
                }
            }
        }

        if bestmove != Move::Pass && self.should_resign(state, passflag, besteval) {
            info!(eval = besteval, "eval looks bad, resigning");
            bestmove = Move::Resign;
        }

        bestmove
    }

    fn should_resign(&self, state: &G, passflag: PassFlags, besteval: f32) -> bool {
        if passflag.contains(PassFlags::NORESIGN) {
            return false;
        }
        if self.cfg.resignpct == 0 {
            return false;
        }

        let num_intersections = state.num_intersections();
        let move_threshold = num_intersections / 4;
        let movenum = state.movenum();
        if movenum <= move_threshold {
            // Too early in the game to resign.
            return false;
        }

        let color = state.to_move();
        let is_default_resign = self.cfg.resignpct < 0;
        let resign_threshold = 0.01
            * if is_default_resign {
                10.0
            } else {
                self.cfg.resignpct as f32
            };
        if besteval > resign_threshold {
            return false;
        }

        if state.handicap() > 0 && color == Color::White && is_default_resign {
            // White giving handicap may see the opponent fumble; blend
            // toward the normal threshold over the early game.
            let handicap_threshold = resign_threshold / (1 + state.handicap()) as f32;
            let blend_ratio = (movenum as f32 / (0.6 * num_intersections as f32)).min(1.0);
            let blended = blend_ratio * resign_threshold + (1.0 - blend_ratio) * handicap_threshold;
            if besteval > blended {
                return false;
            }
        }

        if !state.is_move_legal(color, Move::Resign) {
            return false;
        }

        true
    }

    /// Post-search per-child summary, best first.
    fn dump_stats(&self, state: &G, parent: &Node) {
        if self.cfg.quiet || !parent.has_children() {
            return;
        }

        let color = state.to_move();
        let max_visits = parent
            .children()
            .iter()
            .map(|c| c.get_visits())
            .max()
            .unwrap_or(0);

        // Sort children, put best move on top.
        parent.sort_children(color, self.cfg.lcb_min_visit_ratio * max_visits as f32);

        let first_unvisited = parent
            .get_first_child()
            .map(|first| first.first_visit())
            .unwrap_or(true);
        if first_unvisited {
            return;
        }

        let children = parent.children();
        let mut movecount = 0;
        for child in children.iter() {
            // Always display at least two moves, so a one-move dump still
            // explains itself.
            movecount += 1;
            if movecount > 2 && child.get_visits() == 0 {
                break;
            }

            let move_text = state.move_to_text(child.get_move());
            let mut tmpstate = state.clone();
            tmpstate.play_move(child.get_move());
            let pv = match child.node() {
                Some(node) => {
                    let rest = get_pv(&self.cfg, &mut tmpstate, node);
                    if rest.is_empty() {
                        move_text.clone()
                    } else {
                        format!("{move_text} {rest}")
                    }
                }
                None => move_text.clone(),
            };

            let winrate = if child.get_visits() > 0 {
                child
                    .node()
                    .map(|node| node.get_raw_eval(color, 0) * 100.0)
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            info!(
                "{:>4} -> {:>7} (V: {:5.2}%) (LCB: {:5.2}%) (N: {:5.2}%) PV: {}",
                move_text,
                child.get_visits(),
                winrate,
                child.get_eval_lcb(color).max(0.0) * 100.0,
                child.get_policy() * 100.0,
                pv
            );
        }
        drop(children);

        tree_stats(parent);
    }

    /// One-line search summary: playouts, root winrate, PV.
    fn get_analysis(&self, state: &G, playouts: i32) -> String {
        let mut tempstate = state.clone();
        let color = tempstate.to_move();
        let pvstring = get_pv(&self.cfg, &mut tempstate, &self.root);
        let winrate = if self.root.get_visits() > 0 {
            100.0 * self.root.get_raw_eval(color, 0)
        } else {
            50.0
        };
        format!("Playouts: {playouts}, Win: {winrate:.2}%, PV: {pvstring}")
    }

    /// Emit the canonical per-candidate analysis line.
    fn output_analysis(&self, state: &G, parent: &Node) {
        if !parent.has_children() {
            return;
        }
        let color = state.to_move();
        let children = parent.children();
        let max_visits = children.iter().map(|c| c.get_visits()).max().unwrap_or(0);

        let mut entries = Vec::new();
        for child in children.iter() {
            let visits = child.get_visits();
            // Send only variations with visits, unless more moves were
            // requested explicitly.
            if visits == 0 && entries.len() >= self.cfg.analyze_post_move_count {
                continue;
            }

            let move_text = state.move_to_text(child.get_move());
            let mut tmpstate = state.clone();
            tmpstate.play_move(child.get_move());
            let rest = child
                .node()
                .map(|node| get_pv(&self.cfg, &mut tmpstate, node))
                .unwrap_or_default();
            let pv = if rest.is_empty() {
                move_text.clone()
            } else {
                format!("{move_text} {rest}")
            };

            let winrate = if visits > 0 {
                child
                    .node()
                    .map(|node| node.get_raw_eval(color, 0))
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            entries.push(AnalysisEntry {
                move_text,
                visits,
                winrate,
                policy_prior: child.get_policy(),
                pv,
                lcb: child.get_eval_lcb(color),
                // At least two visits for a meaningful LCB.
                lcb_ratio_exceeded: visits > 2
                    && visits as f32 > max_visits as f32 * self.cfg.lcb_min_visit_ratio,
            });
        }
        drop(children);

        let line = render_analysis_line(entries);
        info!(target: "tengen::analysis", "{}", line.trim_end());
    }
}

impl<G: GameState> Drop for Search<G> {
    fn drop(&mut self) {
        while let Some(handle) = self.delete_futures.pop_front() {
            let _ = handle.join();
        }
    }
}

/// Depth and branching accounting over the live tree.
fn tree_stats(root: &Node) {
    struct Acc {
        nodes: usize,
        non_leaf_nodes: usize,
        depth_sum: usize,
        max_depth: usize,
        children_count: usize,
    }

    fn traverse(node: &Node, depth: usize, acc: &mut Acc) {
        acc.nodes += 1;
        // A leaf can't have been visited more than once.
        if node.get_visits() > 1 {
            acc.non_leaf_nodes += 1;
        }
        acc.depth_sum += depth;
        acc.max_depth = acc.max_depth.max(depth);

        for child in node.children().iter() {
            if child.get_visits() > 0 {
                if let Some(node) = child.node() {
                    acc.children_count += 1;
                    traverse(node, depth + 1, acc);
                }
            } else {
                acc.nodes += 1;
                acc.depth_sum += depth + 1;
                acc.max_depth = acc.max_depth.max(depth + 1);
            }
        }
    }

    let mut acc = Acc {
        nodes: 0,
        non_leaf_nodes: 0,
        depth_sum: 0,
        max_depth: 0,
        children_count: 0,
    };
    traverse(root, 0, &mut acc);

    if acc.nodes > 0 {
        info!(
            avg_depth = acc.depth_sum as f32 / acc.nodes as f32,
            max_depth = acc.max_depth,
            non_leaf_nodes = acc.non_leaf_nodes,
            avg_children = acc.children_count as f32 / acc.non_leaf_nodes.max(1) as f32,
            "tree statistics"
        );
    }
}
