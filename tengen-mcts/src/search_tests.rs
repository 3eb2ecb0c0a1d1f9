//! End-to-end scenarios for the search driver, against real Othello and
//! scripted Go-like states.

use games_othello::OthelloState;
use tengen_core::{Color, GameState, Move, UniformEvaluator};

use crate::config::SearchConfig;
use crate::node::Node;
use crate::search::{PassFlags, Search, Trainer};
use crate::testutil::{MiniState, StubEvaluator};

fn assert_no_virtual_loss(node: &Node) {
    assert_eq!(node.virtual_loss_count(), 0);
    for child in node.children().iter() {
        if let Some(child_node) = child.node() {
            assert_no_virtual_loss(child_node);
        }
    }
}

#[test]
fn test_fresh_othello_opening() {
    let cfg = SearchConfig::for_testing().with_playouts(1);
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 1);
    let evaluator = UniformEvaluator::new();
    let mut state = OthelloState::new();

    let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);

    // One of the four legal opening moves: D3, C4, F5, E6.
    let openings = [
        Move::Vertex(19),
        Move::Vertex(26),
        Move::Vertex(37),
        Move::Vertex(44),
    ];
    assert!(openings.contains(&mv), "unexpected opening {mv:?}");

    let root = search.root();
    let children = root.children();
    assert_eq!(children.len(), 4);
    assert!(children.iter().all(|c| c.get_policy() > 0.0));
}

#[test]
fn test_forced_pass_in_othello() {
    let mut cells = [0u8; 64];
    cells[0] = 1;
    cells[63] = 2;
    let mut state = OthelloState::from_board(cells, Color::Black);

    let cfg = SearchConfig::for_testing().with_playouts(4);
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 2);
    let evaluator = UniformEvaluator::new();

    let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    assert_eq!(mv, Move::Pass);

    let root = search.root();
    let children = root.children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].get_move(), Move::Pass);
    assert!((children[0].get_policy() - 1.0).abs() < 1e-6);
}

#[test]
fn test_tree_reuse_across_moves() {
    let cfg = SearchConfig::for_testing().with_playouts(64);
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 3);
    let evaluator = UniformEvaluator::new();
    let mut state = OthelloState::new();

    let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    assert_eq!(search.reused_nodes(), 0);

    // The host applies the chosen move and thinks for the other side.
    state.play_move(mv);
    let reply = search.think(&mut state, &evaluator, Color::White, PassFlags::NONE);

    assert!(search.reused_nodes() > 0, "tree reuse did not fire");
    assert!(search.root().get_visits() >= 1);
    assert!(state.is_move_legal(Color::White, reply));
}

#[test]
fn test_komi_change_defeats_reuse() {
    let cfg = SearchConfig::for_testing().with_playouts(32);
    let mut search: Search<MiniState> = Search::with_seed(cfg, 4);
    let evaluator = StubEvaluator::uniform(0.5);

    let mut state = MiniState::othello(&[1, 2, 3]);
    search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);

    // Same position, different komi: the old tree must not be reused.
    let mut changed = state.clone().with_komi_shift(1.0);
    search.think(&mut changed, &evaluator, Color::Black, PassFlags::NONE);
    assert_eq!(search.reused_nodes(), 0);
}

#[test]
fn test_self_play_returns_legal_moves() {
    let cfg = SearchConfig::for_testing().with_playouts(24);
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 5);
    let evaluator = UniformEvaluator::new();
    let mut state = OthelloState::new();

    for _ in 0..8 {
        let color = state.to_move();
        let mv = search.think(&mut state, &evaluator, color, PassFlags::NONE);
        assert!(
            state.is_move_legal(color, mv) || mv == Move::Pass,
            "illegal move {mv:?} for {color:?}"
        );
        state.play_move(mv);
    }
}

#[test]
fn test_virtual_loss_balanced_after_think() {
    let cfg = SearchConfig::for_testing()
        .with_playouts(200)
        .with_threads(4);
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 6);
    let evaluator = UniformEvaluator::new();
    let mut state = OthelloState::new();

    search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    assert_no_virtual_loss(search.root());
}

#[test]
fn test_two_passes_short_circuit_to_score() {
    // The game is already over: the root must not expand and the engine
    // passes.
    let mut state = MiniState::othello(&[5, 6]).with_passes(2);
    let cfg = SearchConfig::for_testing();
    let mut search: Search<MiniState> = Search::with_seed(cfg, 7);
    let evaluator = StubEvaluator::uniform(0.5);

    let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    assert_eq!(mv, Move::Pass);
    assert!(!search.root().has_children());
    assert_eq!(evaluator.eval_count(), 0);
}

#[test]
fn test_resign_on_hopeless_eval() {
    // Go, move 100, network winrate 5%: below the default 10% threshold.
    let mut state = MiniState::go(&[0, 1, 2]).with_movenum(100).with_score(-30.0);
    let cfg = SearchConfig::for_testing().with_playouts(60);
    let mut search: Search<MiniState> = Search::with_seed(cfg, 8);
    let evaluator = StubEvaluator::black_winrate(0.05);

    let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    assert_eq!(mv, Move::Resign);
}

#[test]
fn test_noresign_flag_blocks_resignation() {
    let mut state = MiniState::go(&[0, 1, 2]).with_movenum(100).with_score(-30.0);
    let cfg = SearchConfig::for_testing().with_playouts(60);
    let mut search: Search<MiniState> = Search::with_seed(cfg, 9);
    let evaluator = StubEvaluator::black_winrate(0.05);

    let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NORESIGN);
    assert_ne!(mv, Move::Resign);
}

#[test]
fn test_no_resign_in_early_game() {
    // Same hopeless eval, but move 20 on a 19x19 is before the resign
    // threshold of intersections / 4.
    let mut state = MiniState::go(&[0, 1, 2]).with_movenum(20).with_score(-30.0);
    let cfg = SearchConfig::for_testing().with_playouts(60);
    let mut search: Search<MiniState> = Search::with_seed(cfg, 10);
    let evaluator = StubEvaluator::black_winrate(0.05);

    let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    assert_ne!(mv, Move::Resign);
}

#[test]
fn test_superko_child_removed_at_root() {
    let mut state = MiniState::go(&[100, 101, 102]).with_superko_after(&[101]);
    let cfg = SearchConfig::for_testing().with_playouts(40);
    let mut search: Search<MiniState> = Search::with_seed(cfg, 11);
    let evaluator = StubEvaluator::uniform(0.5);

    let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    assert_ne!(mv, Move::Vertex(101));
    assert!(search
        .root()
        .children()
        .iter()
        .all(|c| c.get_move() != Move::Vertex(101)));
}

#[test]
fn test_nopass_prefers_board_move() {
    // Pass is the only "real" candidate, but NOPASS forces an alternative
    // when one exists.
    let mut cells = [0u8; 64];
    cells[0] = 1;
    cells[63] = 2;
    let mut state = OthelloState::from_board(cells, Color::Black);
    let cfg = SearchConfig::for_testing().with_playouts(4);
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 12);
    let evaluator = UniformEvaluator::new();

    // No board move exists here, so even NOPASS must pass.
    let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NOPASS);
    assert_eq!(mv, Move::Pass);
}

#[test]
fn test_drained_evaluator_returns_pass() {
    let mut state = OthelloState::new();
    let cfg = SearchConfig::for_testing();
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 13);
    let evaluator = UniformEvaluator::new();
    tengen_core::Evaluator::<OthelloState>::drain_evals(&evaluator);

    // Root preparation cannot evaluate; the search degrades to a pass.
    let mv = search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    assert_eq!(mv, Move::Pass);
}

#[test]
fn test_explain_last_think() {
    let cfg = SearchConfig::for_testing().with_playouts(16);
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 14);
    let evaluator = UniformEvaluator::new();
    let mut state = OthelloState::new();

    assert!(search.explain_last_think().is_empty());
    search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    let summary = search.explain_last_think();
    assert!(summary.starts_with("move 0, B => "));
    assert!(summary.contains("Playouts:"));
}

#[test]
fn test_ponder_runs_and_stops_on_limits() {
    let cfg = SearchConfig::for_testing().with_playouts(50);
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 15);
    let evaluator = UniformEvaluator::new();
    let mut state = OthelloState::new();

    search.ponder(&mut state, &evaluator);
    assert!(search.root().get_visits() >= 1);
    assert!(search.playouts() >= 50);
}

#[test]
fn test_ponder_honors_stop_token() {
    // Unlimited playouts: only the stop token can end this ponder.
    let cfg = SearchConfig::for_testing()
        .with_playouts(crate::config::UNLIMITED_PLAYOUTS)
        .with_visits(crate::config::UNLIMITED_PLAYOUTS);
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 16);
    let evaluator = UniformEvaluator::new();
    let mut state = OthelloState::new();

    let token = search.stop_token();
    let setter = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(60));
        token.store(true, std::sync::atomic::Ordering::Release);
    });

    search.ponder(&mut state, &evaluator);
    setter.join().unwrap();
    assert!(search.root().get_visits() >= 1);
}

#[test]
fn test_trainer_record_fires_once_per_think() {
    struct CountingTrainer(std::sync::Arc<std::sync::atomic::AtomicUsize>);

    impl Trainer<OthelloState> for CountingTrainer {
        fn record(&mut self, _state: &OthelloState, root: &Node) {
            assert!(root.get_visits() >= 1);
            self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let cfg = SearchConfig::for_testing().with_playouts(16);
    let mut search: Search<OthelloState> = Search::with_seed(cfg, 17);
    search.set_trainer(Box::new(CountingTrainer(std::sync::Arc::clone(&calls))));
    let evaluator = UniformEvaluator::new();
    let mut state = OthelloState::new();

    search.think(&mut state, &evaluator, Color::Black, PassFlags::NONE);
    search.ponder(&mut state, &evaluator);

    // think records, ponder does not.
    assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 1);
}
