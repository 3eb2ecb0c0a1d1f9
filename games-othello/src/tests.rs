use super::*;

fn v(x: usize, y: usize) -> Move {
    Move::Vertex((y * BOARD_SIZE + x) as u16)
}

fn legal_vertices(state: &OthelloState, color: Color) -> Vec<Move> {
    (0..NUM_INTERSECTIONS as u16)
        .map(Move::Vertex)
        .filter(|&mv| state.is_move_legal(color, mv))
        .collect()
}

#[test]
fn test_initial_position() {
    let state = OthelloState::new();
    assert_eq!(state.count(Color::Black), 2);
    assert_eq!(state.count(Color::White), 2);
    assert_eq!(state.to_move(), Color::Black);
    assert_eq!(state.movenum(), 0);
    assert_eq!(state.passes(), 0);
}

#[test]
fn test_opening_moves() {
    let state = OthelloState::new();
    let legal = legal_vertices(&state, Color::Black);
    // D3, C4, F5, E6 in board coordinates.
    assert_eq!(legal, vec![v(3, 2), v(2, 3), v(5, 4), v(4, 5)]);
    // Pass is illegal while disc moves exist.
    assert!(!state.is_move_legal(Color::Black, Move::Pass));
}

#[test]
fn test_flips_along_line() {
    let mut state = OthelloState::new();
    state.play_move(v(3, 2)); // black D3 flips D4
    assert_eq!(state.count(Color::Black), 4);
    assert_eq!(state.count(Color::White), 1);
    assert_eq!(state.to_move(), Color::White);
    assert_eq!(state.passes(), 0);
    assert_eq!(state.last_move(), Some(v(3, 2)));
}

#[test]
fn test_forced_pass_position() {
    // A lone black disc and a far-away white one: neither side can flip.
    let mut cells = [0u8; NUM_INTERSECTIONS];
    cells[0] = 1;
    cells[63] = 2;
    let state = OthelloState::from_board(cells, Color::Black);

    assert!(!state.has_legal_moves(Color::Black));
    assert!(state.is_move_legal(Color::Black, Move::Pass));
    assert!(legal_vertices(&state, Color::Black).is_empty());
}

#[test]
fn test_pass_counting_ends_game() {
    let mut cells = [0u8; NUM_INTERSECTIONS];
    cells[0] = 1;
    cells[63] = 2;
    let mut state = OthelloState::from_board(cells, Color::Black);
    state.play_move(Move::Pass);
    assert_eq!(state.passes(), 1);
    state.play_move(Move::Pass);
    assert_eq!(state.passes(), 2);
    // One disc each, komi decides.
    assert!((state.final_score() - (-KOMI)).abs() < 1e-6);
}

#[test]
fn test_undo_and_forward_roundtrip() {
    let mut state = OthelloState::new();
    let before_hash = state.hash();
    state.play_move(v(3, 2));
    state.play_move(v(2, 2)); // white C3 flips D4... legal reply
    let after_hash = state.hash();
    assert_eq!(state.movenum(), 2);

    state.undo_move();
    state.undo_move();
    assert_eq!(state.movenum(), 0);
    assert_eq!(state.hash(), before_hash);
    assert_eq!(state.to_move(), Color::Black);

    state.forward_move();
    state.forward_move();
    assert_eq!(state.movenum(), 2);
    assert_eq!(state.hash(), after_hash);
}

#[test]
fn test_hash_depends_on_side_to_move() {
    let a = OthelloState::new();
    let mut b = OthelloState::new();
    b.set_to_move(Color::White);
    assert_ne!(a.hash(), b.hash());
}

#[test]
fn test_hash_is_positional() {
    // The same position reached through history equals a fresh board.
    let mut played = OthelloState::new();
    played.play_move(v(3, 2));
    played.undo_move();
    assert_eq!(played.hash(), OthelloState::new().hash());
}

#[test]
fn test_play_truncates_redo_branch() {
    let mut state = OthelloState::new();
    state.play_move(v(3, 2));
    state.undo_move();
    // A different move replaces the old future.
    state.play_move(v(2, 3));
    assert_eq!(state.movenum(), 1);
    assert_eq!(state.last_move(), Some(v(2, 3)));
    // forward_move has nothing left to replay.
    state.forward_move();
    assert_eq!(state.movenum(), 1);
}

#[test]
fn test_final_score_counts_komi() {
    let state = OthelloState::new();
    // Two discs each: komi tips it to White.
    assert!((state.final_score() - (-KOMI)).abs() < 1e-6);
}
