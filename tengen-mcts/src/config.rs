//! Search configuration parameters.

use serde::Deserialize;
use tengen_core::Move;

/// Sentinel for "no playout/visit limit". Half the integer range so that
/// concurrent increments cannot overflow the counter.
pub const UNLIMITED_PLAYOUTS: i32 = i32::MAX / 2;

/// Time-management policy for the stop controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeManagement {
    /// Never stop early; think for the full per-move budget.
    Off,
    /// Stop early when only one contender move remains.
    On,
    /// Like `On`, but also respond quickly when time cannot be saved up.
    Fast,
    /// Early exit without pruning non-contenders (self-play: keeps visit
    /// distributions unbiased for training data).
    NoPruning,
}

/// Configuration for one search instance.
///
/// Defaults match tournament play; [`SearchConfig::for_testing`] shrinks the
/// limits for fast deterministic tests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of search worker threads.
    pub num_threads: usize,

    /// PUCT exploration constant.
    pub puct: f32,

    /// Scale of the visit count inside the exploration logarithm.
    pub logpuct: f32,

    /// Additive constant inside the exploration logarithm.
    pub logconst: f32,

    /// First-play-urgency reduction for unvisited children.
    pub fpu_reduction: f32,

    /// FPU reduction applied at the root instead of `fpu_reduction`.
    pub fpu_root_reduction: f32,

    /// Randomize the chosen move proportionally to visits while
    /// `movenum < random_cnt`. Zero disables randomization.
    pub random_cnt: usize,

    /// Temperature for proportional move randomization.
    pub random_temp: f64,

    /// Children at or below this visit count are excluded from
    /// proportional randomization.
    pub random_min_visits: i32,

    /// Mix Dirichlet noise into the root priors.
    pub noise: bool,

    /// Disable the pass heuristics ("dumb" passing: always consider pass,
    /// never overrule it by score).
    pub dumbpass: bool,

    /// Resign threshold in percent. Negative selects the built-in default
    /// of 10%; zero disables resignation.
    pub resignpct: i32,

    /// Significance level for the Student-t quantile behind LCB sorting.
    pub ci_alpha: f32,

    /// A child needs more than `lcb_min_visit_ratio * max_child_visits`
    /// visits before its LCB participates in move ordering.
    pub lcb_min_visit_ratio: f32,

    /// Safety margin subtracted from the clock, in centiseconds.
    pub lagbuffer_cs: i32,

    /// Node budget for the whole tree. Expansion throttles as the live
    /// node count approaches this and halts at the limit.
    pub max_tree_size: usize,

    /// Playout budget per `think` call.
    pub max_playouts: i32,

    /// Root visit budget per `think` call.
    pub max_visits: i32,

    /// Stop-controller policy.
    pub timemanage: TimeManagement,

    /// Emit per-candidate analysis every this many centiseconds.
    /// Zero disables analysis output.
    pub analyze_interval_cs: i32,

    /// Root moves excluded from the search (analysis restriction).
    #[serde(skip)]
    pub analyze_avoid_list: Vec<Move>,

    /// Always include at least this many candidates in analysis output,
    /// even if unvisited.
    pub analyze_post_move_count: usize,

    /// Suppress periodic progress output.
    pub quiet: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_threads: default_num_threads(),
            puct: 0.5,
            logpuct: 0.015,
            logconst: 1.7,
            fpu_reduction: 0.25,
            fpu_root_reduction: 0.25,
            random_cnt: 0,
            random_temp: 1.0,
            random_min_visits: 1,
            noise: false,
            dumbpass: false,
            resignpct: -1,
            ci_alpha: 1e-5,
            lcb_min_visit_ratio: 0.10,
            lagbuffer_cs: 100,
            max_tree_size: 50_000_000,
            max_playouts: UNLIMITED_PLAYOUTS,
            max_visits: UNLIMITED_PLAYOUTS,
            timemanage: TimeManagement::Off,
            analyze_interval_cs: 0,
            analyze_avoid_list: Vec::new(),
            analyze_post_move_count: 0,
            quiet: false,
        }
    }
}

fn default_num_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl SearchConfig {
    /// Small, single-threaded, noiseless configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            num_threads: 1,
            max_playouts: 100,
            max_visits: 100,
            quiet: true,
            ..Self::default()
        }
    }

    /// Builder: set the worker thread count.
    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    /// Builder: set the playout budget.
    pub fn with_playouts(mut self, n: i32) -> Self {
        self.max_playouts = n.min(UNLIMITED_PLAYOUTS);
        self
    }

    /// Builder: set the root visit budget.
    pub fn with_visits(mut self, n: i32) -> Self {
        self.max_visits = n.min(UNLIMITED_PLAYOUTS);
        self
    }

    /// Builder: enable root Dirichlet noise.
    pub fn with_noise(mut self, noise: bool) -> Self {
        self.noise = noise;
        self
    }

    /// Builder: set the resign threshold in percent.
    pub fn with_resignpct(mut self, pct: i32) -> Self {
        self.resignpct = pct;
        self
    }
}
