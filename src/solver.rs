//! An agent to solve the game of Connect 4

use log::debug;
use rayon::prelude::*;

use crate::{bitboard::*, transposition_table::*, HEIGHT, WIDTH};

use std::cmp::Ordering;
use std::sync::Arc;

/// Score window used by weak solving, which only separates wins, losses and draws
pub const WEAK_SCORE_BOUND: i32 = 3;

/// Search settings for a `Solver`
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SolverConfig {
    /// Only prove the sign of the score. Scores within `WEAK_SCORE_BOUND` of a draw are
    /// still exact, larger margins are reported as a bound with the correct sign
    pub weak: bool,
    /// Maximum number of plies to search. `None` searches until every cell is filled,
    /// which is required for exact results
    pub depth: Option<usize>,
}

impl SolverConfig {
    pub fn weak() -> Self {
        Self {
            weak: true,
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// An agent to solve Connect 4 positions
///
/// # Notes
/// This agent uses a classical game tree search with various optimisations to
/// find the mathematically best move(s) in any position, thus 'solving' the game
///
/// # Position Scoring
/// A position is scored by how far a forced win is from the end of the game for the player
/// to move. If the first player wins with their final placed tile (their 21st tile in a 7x6
/// board) the score of the empty board is 1, or -1 if the the second player wins with their
/// final tile. Earlier wins have scores further from 0, up to 18/-18, where a player wins with
/// their 4th tile. A drawn position has a score of 0
///
/// # Sharing a transposition table
/// Depth limited searches store horizon scores in the table as if they were exact. A table
/// shared between solvers should only be used for exhaustive searches, or for searches whose
/// depth budgets all end on the same ply.
#[derive(Clone)]
pub struct Solver {
    board: BitBoard,

    /// The number of nodes searched by this `Solver` so far (for diagnostics only)
    pub node_count: usize,
    transposition_table: Arc<TranspositionTable>,
    config: SolverConfig,
}

impl Solver {
    /// Creates a new `Solver` from a bitboard
    pub fn new(board: BitBoard) -> Self {
        Self::new_with_transposition_table(
            board,
            Arc::new(TranspositionTable::new(DEFAULT_TABLE_CAPACITY)),
        )
    }

    /// Creates a new `Solver` from a bitboard with a given transposition table
    pub fn new_with_transposition_table(
        board: BitBoard,
        transposition_table: Arc<TranspositionTable>,
    ) -> Self {
        Self {
            board,
            node_count: 0,
            transposition_table,
            config: SolverConfig::default(),
        }
    }

    /// Replaces the search settings of an existing `Solver`
    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn board(&self) -> &BitBoard {
        &self.board
    }

    pub fn config(&self) -> SolverConfig {
        self.config
    }

    pub fn transposition_table(&self) -> &Arc<TranspositionTable> {
        &self.transposition_table
    }

    /// Performs game tree search
    ///
    /// Returns the score of the position (see [Position Scoring]) together with the
    /// column that produced it. Scores are fail-soft: a result at or below `alpha` is an
    /// upper bound of the true score, one at or above `beta` is a lower bound.
    ///
    /// [Position Scoring]: #position-scoring
    fn negamax(
        &mut self,
        board: BitBoard,
        mut alpha: i32,
        mut beta: i32,
        depth: usize,
    ) -> (i32, Option<usize>) {
        self.node_count += 1;

        // search horizon
        if depth == 0 {
            return (0, None);
        }

        // try to fetch the score or a bound of it from the transposition table
        let key = board.key();
        if let Some(entry) = self.transposition_table.get(key) {
            match entry.bound {
                Bound::Exact => return (entry.score, entry.column),
                Bound::Lower => {
                    alpha = alpha.max(entry.score);
                    if alpha >= beta {
                        // prune the exploration
                        return (entry.score, entry.column);
                    }
                }
                Bound::Upper => {
                    beta = beta.min(entry.score);
                    if alpha >= beta {
                        // prune the exploration
                        return (entry.score, entry.column);
                    }
                }
            }
        }

        // check for draw
        if board.is_full() {
            return (0, board.last_move());
        }

        // the previous player has already won
        if board.has_winner() {
            return (-board.win_score(), board.last_move());
        }

        // check for next-move win for current player
        let moves = board.search_order();
        for column in moves {
            if board.check_winning_move(column) {
                return (board.win_score(), Some(column));
            }
        }

        // without an immediate win, the best case is winning with the next tile after that
        let max = ((WIDTH * HEIGHT - 1 - board.num_moves()) / 2) as i32;
        if beta > max {
            // clamp beta to calculated upper bound
            beta = max;
            // if the upper bound is lower than alpha, we can prune the exploration
            if alpha >= beta {
                return (beta, None);
            }
        }

        // search the next level of the tree
        let mut best_score = i32::MIN;
        let mut best_move = None;
        let mut improved = false;
        for column in moves {
            let mut next = board;
            next.play(column);
            // the search window is flipped for the other player
            let (score, _) = self.negamax(next, -beta, -alpha, depth - 1);
            let score = -score;
            // if a child node's score is better than beta, we can prune the tree
            // here because a perfect opponent will not pick this branch
            if score >= beta {
                // save a lower bound of the score
                self.transposition_table
                    .put(key, Entry::lower(score, Some(column)));
                return (score, Some(column));
            }
            if score > alpha {
                alpha = score;
                improved = true;
            }
            if score > best_score {
                best_score = score;
                best_move = Some(column);
            }
        }

        // every child was searched, so an improved alpha is exact and anything else is
        // an upper bound
        let entry = if improved {
            Entry::exact(alpha, best_move)
        } else {
            Entry::upper(alpha, best_move)
        };
        self.transposition_table.put(key, entry);
        (alpha, best_move)
    }

    /// Calculate the score and best move of the current position with iterative deepening
    ///
    /// Returns `None` as the move only when the game is already over.
    pub fn solve(&mut self) -> (i32, Option<usize>) {
        let board = self.board;
        if let Some(score) = board.terminal_score() {
            return (score, None);
        }

        let empty_cells = WIDTH * HEIGHT - board.num_moves();
        let depth = self.config.depth.unwrap_or(empty_cells);

        let (mut min, mut max) = if self.config.weak {
            (-WEAK_SCORE_BOUND, WEAK_SCORE_BOUND)
        } else {
            (
                -(empty_cells as i32) / 2,
                (WIDTH * HEIGHT + 1 - board.num_moves()) as i32 / 2,
            )
        };

        // a failed-high probe proves its move reaches at least the new lower bound,
        // failed-low probes only offer a fallback
        let mut best_move = None;
        let mut fallback_move = None;
        // iteratively narrow the search window for iterative deepening
        while min < max {
            let mut mid = min + (max - min) / 2;
            // tweak the search value for both negative and positive searches
            if mid <= 0 && min / 2 < mid {
                mid = min / 2
            } else if mid >= 0 && max / 2 > mid {
                mid = max / 2
            }

            debug!(
                "probing {} in [{}, {}], depth {}/{}, {} nodes so far",
                mid, min, max, depth, empty_cells, self.node_count
            );

            // use a null-window to determine if the actual score is greater or less that mid
            let (r, column) = self.negamax(board, mid, mid + 1, depth);

            // r is not necessarily the exact true score, but its value indicates
            // whether the true score is above or below the search target
            if r <= mid {
                // actual score <= mid
                max = r;
                fallback_move = column.or(fallback_move);
            } else {
                // actual score > mid
                min = r;
                best_move = column.or(best_move);
            }
        }

        let best_move = best_move
            .or(fallback_move)
            .or_else(|| board.search_order().next());
        debug!(
            "solved with score {} and move {:?} after {} nodes, {} table entries",
            min,
            best_move,
            self.node_count,
            self.transposition_table.len()
        );
        // min and max should be equal here
        (min, best_move)
    }

    /// Scores every column of the current position, solving the columns in parallel
    ///
    /// Unplayable columns are `None`. All workers share this solver's transposition table.
    pub fn analyse(&self) -> [Option<i32>; WIDTH] {
        let mut scores = [None; WIDTH];
        scores
            .par_iter_mut()
            .enumerate()
            .filter(|(column, _)| self.board.playable(*column) && !self.board.is_terminal())
            .for_each(|(column, score)| {
                if self.board.check_winning_move(column) {
                    *score = Some(self.board.win_score());
                    return;
                }
                let mut next = self.board;
                next.play(column);
                let config = SolverConfig {
                    depth: self.config.depth.map(|depth| depth.saturating_sub(1)),
                    ..self.config
                };
                let mut solver =
                    Solver::new_with_transposition_table(next, Arc::clone(&self.transposition_table))
                        .with_config(config);
                // scores are from the point of view of the player to move
                *score = Some(-solver.solve().0);
            });
        debug!("column scores: {:?}", scores);
        scores
    }

    /// Converts a position score to a win distance in a single player's moves
    pub fn score_to_win_distance(&self, score: i32) -> usize {
        match score.cmp(&0) {
            Ordering::Equal => WIDTH * HEIGHT - self.board.num_moves(),
            Ordering::Greater => {
                (WIDTH * HEIGHT / 2 + 1 - score as usize) - self.board.num_moves() / 2
            }
            Ordering::Less => {
                (WIDTH * HEIGHT / 2 + 1) - (-score as usize) - self.board.num_moves() / 2
            }
        }
    }
}

/// Solves `board` with a fresh transposition table
///
/// `depth` bounds the number of plies searched, pass the number of empty cells for an
/// exact result. Returns the score for the player to move and the best column.
pub fn solve(board: &BitBoard, weak: bool, depth: usize) -> (i32, Option<usize>) {
    let config = SolverConfig {
        weak,
        depth: Some(depth),
    };
    Solver::new(*board).with_config(config).solve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn exact_score(moves: &str) -> Result<i32> {
        Ok(Solver::new(BitBoard::from_moves(moves)?).solve().0)
    }

    #[test]
    fn immediate_win() -> Result<()> {
        let board = BitBoard::from_moves("112233")?;
        let (score, best_move) = solve(&board, false, WIDTH * HEIGHT - board.num_moves());
        assert_eq!(score, (WIDTH * HEIGHT + 1 - 6) as i32 / 2);
        assert_eq!(best_move, Some(3));
        assert!(board.check_winning_move(3));
        Ok(())
    }

    #[test]
    fn finished_games() -> Result<()> {
        let mut board = BitBoard::from_moves("112233")?;
        board.play(3);
        assert_eq!(Solver::new(board).solve(), (-board.win_score(), None));
        Ok(())
    }

    #[test]
    fn best_move_keeps_the_score() -> Result<()> {
        for moves in ["2252576253462244111563365343671351441", "7422341735647741166133573473242566"] {
            let board = BitBoard::from_moves(moves)?;
            let (score, best_move) = Solver::new(board).solve();
            let column = best_move.expect("position is not over");

            if board.check_winning_move(column) {
                assert_eq!(score, board.win_score());
            } else {
                let mut next = board;
                next.play(column);
                assert_eq!(-Solver::new(next).solve().0, score);
            }
        }
        Ok(())
    }

    #[test]
    fn weak_solve_keeps_sign() -> Result<()> {
        for moves in ["2252576253462244111563365343671351441", "7422341735647741166133573473242566", "112233"] {
            let exact = exact_score(moves)?;
            let board = BitBoard::from_moves(moves)?;
            let (weak, _) = Solver::new(board).with_config(SolverConfig::weak()).solve();
            assert_eq!(weak.signum(), exact.signum());
            if exact.abs() < WEAK_SCORE_BOUND {
                assert_eq!(weak, exact);
            }
        }
        Ok(())
    }

    #[test]
    fn depth_limited_search_returns_playable_move() {
        let board = BitBoard::new();
        let (_, best_move) = solve(&board, false, 6);
        let column = best_move.expect("empty board has moves");
        assert!(board.playable(column));
    }

    #[test]
    fn analyse_matches_child_solves() -> Result<()> {
        let board = BitBoard::from_moves("7422341735647741166133573473242566")?;
        let solver = Solver::new(board);
        let scores = solver.analyse();

        for column in 0..WIDTH {
            match scores[column] {
                None => assert!(!board.playable(column)),
                Some(score) => {
                    let mut next = board;
                    next.play(column);
                    assert_eq!(score, -Solver::new(next).solve().0);
                }
            }
        }
        let best = scores.iter().flatten().max().copied();
        assert_eq!(best, Some(exact_score("7422341735647741166133573473242566")?));
        Ok(())
    }

    #[test]
    fn win_distance() -> Result<()> {
        let solver = Solver::new(BitBoard::from_moves("112233")?);
        // winning with the fourth tile
        assert_eq!(solver.score_to_win_distance(18), 1);
        assert_eq!(solver.score_to_win_distance(0), 36);
        Ok(())
    }
}
