use connect4_solver::bitboard::{BitBoard, Player};
use connect4_solver::{HEIGHT, WIDTH};
use proptest::prelude::*;

use std::collections::HashMap;

/// Plays the columns picked by `choices` until the game ends, returning every position seen
fn playout(choices: &[usize]) -> Vec<BitBoard> {
    let mut board = BitBoard::new();
    let mut positions = vec![board];
    for &choice in choices {
        if board.is_terminal() {
            break;
        }
        let legal = (0..WIDTH).filter(|&c| board.playable(c)).collect::<Vec<_>>();
        board.play(legal[choice % legal.len()]);
        positions.push(board);
    }
    positions
}

fn column_heights(board: &BitBoard) -> [usize; WIDTH] {
    let mut heights = [0; WIDTH];
    for (column, height) in heights.iter_mut().enumerate() {
        *height = (board.board_mask() & BitBoard::column_mask(column)).count_ones() as usize;
    }
    heights
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

    #[test]
    fn prop_masks_stay_disjoint(choices in prop::collection::vec(0usize..WIDTH, 0..=WIDTH * HEIGHT)) {
        for board in playout(&choices) {
            let one = board.player_mask(Player::One);
            let two = board.player_mask(Player::Two);
            prop_assert_eq!(one & two, 0);
            prop_assert_eq!((one | two).count_ones() as usize, board.num_moves());
            prop_assert_eq!(one.count_ones() as usize, (board.num_moves() + 1) / 2);
            prop_assert!(column_heights(&board).iter().all(|&h| h <= HEIGHT));
        }
    }

    #[test]
    fn prop_winning_move_matches_play(choices in prop::collection::vec(0usize..WIDTH, 0..=WIDTH * HEIGHT)) {
        for board in playout(&choices) {
            if board.is_terminal() {
                continue;
            }
            for column in (0..WIDTH).filter(|&c| board.playable(c)) {
                let mut next = board;
                next.play(column);
                prop_assert_eq!(board.check_winning_move(column), next.has_winner());
                // the parent position is left untouched
                prop_assert_eq!(next.num_moves(), board.num_moves() + 1);
            }
        }
    }

    #[test]
    fn prop_search_order_lists_legal_columns(choices in prop::collection::vec(0usize..WIDTH, 0..=WIDTH * HEIGHT)) {
        for board in playout(&choices) {
            let mut order = board.search_order().collect::<Vec<_>>();
            order.sort_unstable();
            let legal = (0..WIDTH).filter(|&c| board.playable(c)).collect::<Vec<_>>();
            prop_assert_eq!(order, legal);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_keys_are_unique(games in prop::collection::vec(prop::collection::vec(0usize..WIDTH, 0..=WIDTH * HEIGHT), 1..16)) {
        // the same key must always map back to the same tiles
        let mut seen: HashMap<u64, [u64; 2]> = HashMap::new();
        for choices in &games {
            for board in playout(choices) {
                let masks = board.player_masks();
                let previous = *seen.entry(board.key()).or_insert(masks);
                prop_assert_eq!(previous, masks);
            }
        }
    }
}
