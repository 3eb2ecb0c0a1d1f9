//! Operations that are only ever applied to the root of a search.
//!
//! They run in the single-threaded preparation phase (or after workers have
//! quiesced), which is what permits the structural edits below: erasing
//! superko children, rewriting priors with noise, reordering the child list.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use tengen_core::{Color, Evaluator, EvaluatorError, GameKind, GameState, Move};
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::node::Node;

impl Node {
    /// The child currently sorted to the front, inflated.
    pub fn get_first_child(&self) -> Option<Arc<Node>> {
        let children = self.children();
        let first = children.first()?;
        first.inflate();
        first.node().map(Arc::clone)
    }

    /// Invalidate and erase root children whose move repeats an earlier
    /// whole-board position. If valid alternatives remain and passing is
    /// barred by the rules in force, the pass child is erased too.
    ///
    /// Go only; Othello has no repetition rule.
    pub(crate) fn kill_superkos<G: GameState>(&self, state: &G) {
        {
            let children = self.children();
            let mut pass_child = None;
            let mut valid_count = 0usize;

            for child in children.iter() {
                let mv = child.get_move();
                if mv == Move::Pass {
                    pass_child = Some(child);
                } else if mv.is_vertex() {
                    let mut trial = state.clone();
                    trial.play_move(mv);
                    if trial.superko() {
                        // Mark invalid for now; erased below.
                        if let Some(node) = child.node() {
                            node.invalidate();
                        }
                    }
                }
                if child.valid() {
                    valid_count += 1;
                }
            }

            if valid_count > 1 {
                if let Some(pass) = pass_child {
                    if !state.is_move_legal(state.to_move(), Move::Pass) {
                        if let Some(node) = pass.node() {
                            node.invalidate();
                        }
                    }
                }
            }
        }

        // Now the actual deletion.
        self.children_mut().retain(|child| child.valid());
    }

    /// Mix Dirichlet noise into the root priors: each child's prior becomes
    /// `(1 - epsilon) * prior + epsilon * eta` for a Dirichlet sample `eta`.
    /// A degenerate sample sum leaves the priors untouched.
    pub(crate) fn dirichlet_noise<R: Rng>(&self, epsilon: f32, alpha: f32, rng: &mut R) {
        let children = self.children();
        let gamma = match Gamma::new(alpha as f64, 1.0) {
            Ok(gamma) => gamma,
            Err(_) => return,
        };

        let mut dirichlet: Vec<f64> = (0..children.len()).map(|_| gamma.sample(rng)).collect();
        let sample_sum: f64 = dirichlet.iter().sum();

        // If the noise vector sums to zero or a denormal, don't normalize.
        if sample_sum < f64::MIN_POSITIVE {
            return;
        }
        for sample in &mut dirichlet {
            *sample /= sample_sum;
        }

        for (child, eta) in children.iter().zip(dirichlet) {
            if let Some(node) = child.node() {
                let policy = node.get_policy() * (1.0 - epsilon) + epsilon * eta as f32;
                node.set_policy(policy);
            }
        }
    }

    /// Swap a randomly chosen well-visited child into front position, with
    /// probability proportional to `(visits / N0)^(1/temperature)`.
    /// Expects the children to already be sorted best-first.
    pub(crate) fn randomize_first_proportionally<R: Rng>(
        &self,
        rng: &mut R,
        random_temp: f64,
        random_min_visits: i32,
    ) {
        let mut accum = 0.0f64;
        let mut norm_factor = 0.0f64;
        let mut accum_vector = Vec::new();

        {
            let children = self.children();
            for child in children.iter() {
                let visits = child.get_visits();
                if norm_factor == 0.0 {
                    norm_factor = visits as f64;
                    // Nonsensical options? End of game?
                    if visits <= random_min_visits {
                        return;
                    }
                }
                if visits > random_min_visits {
                    accum += (visits as f64 / norm_factor).powf(1.0 / random_temp);
                    accum_vector.push(accum);
                }
            }
        }

        if accum <= 0.0 {
            return;
        }

        let pick = rng.gen_range(0.0..accum);
        let mut index = 0usize;
        for (i, &value) in accum_vector.iter().enumerate() {
            if pick < value {
                index = i;
                break;
            }
        }

        if index == 0 {
            return;
        }

        let mut children = self.children_mut();
        debug_assert!(children.len() > index);
        children.swap(0, index);
    }

    /// First child that is not a pass and (in Go) not an own-eye fill.
    /// Used when the engine is forbidden from passing: overruling its move
    /// needs the eye knowledge the search itself does not.
    pub(crate) fn get_nopass_child<G: GameState>(&self, state: &G) -> Option<Arc<Node>> {
        let children = self.children();
        for child in children.iter() {
            let mv = child.get_move();
            if mv == Move::Pass {
                continue;
            }
            // The eye filter applies to Go only.
            if state.kind() == GameKind::Go && state.is_eye(state.to_move(), mv) {
                continue;
            }
            child.inflate();
            return child.node().map(Arc::clone);
        }
        None
    }

    /// Detach and return the child for `mv`, inflating it if needed.
    /// Used to promote a child to the new search root.
    pub(crate) fn find_child(&self, mv: Move) -> Option<Arc<Node>> {
        let mut children = self.children_mut();
        for child in children.iter_mut() {
            if child.get_move() == mv {
                // No guarantee this slot was ever inflated.
                child.inflate();
                return child.release();
            }
        }
        // Can happen if we resigned or the children are not expanded.
        None
    }

    pub(crate) fn inflate_all_children(&self) {
        for child in self.children().iter() {
            child.inflate();
        }
    }

    /// Make the root ready for workers: expand it, inflate every child,
    /// prune superko repetitions and apply analysis restrictions and noise.
    pub(crate) fn prepare_root_node<G, E, R>(
        &self,
        cfg: &SearchConfig,
        evaluator: &E,
        color: Color,
        nodes: &AtomicUsize,
        root_state: &G,
        rng: &mut R,
    ) -> Result<(), EvaluatorError>
    where
        G: GameState,
        E: Evaluator<G>,
        R: Rng,
    {
        if self.expandable(0.0) {
            self.create_children(cfg, evaluator, nodes, root_state, 0.0)?;
        }
        if !self.has_children() {
            return Ok(());
        }
        info!(eval = self.get_net_eval(color), "root network eval");

        // A lot of the code downstream assumes every root child is
        // inflated, so do that here once.
        self.inflate_all_children();

        // Remove illegal repetitions so the root move list is correct.
        if root_state.kind() == GameKind::Go {
            self.kill_superkos(root_state);
        }

        self.apply_avoid_list(&cfg.analyze_avoid_list);

        if cfg.noise {
            // Scale the Dirichlet concentration to the board size.
            let alpha = match root_state.kind() {
                GameKind::Go => 0.03 * 361.0 / root_state.num_intersections() as f32,
                GameKind::Othello => 0.5,
            };
            self.dirichlet_noise(0.25, alpha, rng);
        }

        Ok(())
    }

    /// Erase root children named in an analysis avoid list, unless that
    /// would leave the root without children.
    fn apply_avoid_list(&self, avoid: &[Move]) {
        if avoid.is_empty() {
            return;
        }
        {
            let children = self.children();
            let survivors = children
                .iter()
                .filter(|c| !avoid.contains(&c.get_move()))
                .count();
            if survivors == 0 {
                debug!("avoid list covers every root child, ignoring it");
                return;
            }
            for child in children.iter() {
                if avoid.contains(&child.get_move()) {
                    if let Some(node) = child.node() {
                        node.invalidate();
                    }
                }
            }
        }
        self.children_mut().retain(|child| child.valid());
    }
}
