use anyhow::{anyhow, Result};

use std::fmt;

use crate::{HEIGHT, WIDTH};

mod static_masks {
    use crate::{HEIGHT, WIDTH};

    pub const fn bottom_mask() -> u64 {
        let mut mask = 0;
        let mut column = 0;
        while column < WIDTH {
            mask |= 1 << (column * (HEIGHT + 1));
            column += 1;
        }
        mask
    }
    pub const fn full_board_mask() -> u64 {
        bottom_mask() * ((1 << HEIGHT as u64) - 1)
    }
}

/// Shifts between neighbouring cells along each line direction:
/// vertical, diagonal `\`, horizontal and diagonal `/`
pub const LINE_SHIFTS: [usize; 4] = [1, HEIGHT, HEIGHT + 1, HEIGHT + 2];

/// Returns a slice ordering the columns from the middle outwards, as
/// the middle columns are often better moves
pub const fn move_order() -> [usize; WIDTH] {
    let mut move_order = [0; WIDTH];
    let mut i = 0;
    while i < WIDTH {
        move_order[i] = (WIDTH / 2) + (i % 2) * (i / 2 + 1) - (1 - i % 2) * (i / 2);
        i += 1;
    }
    move_order
}

pub const MOVE_ORDER: [usize; WIDTH] = move_order();

/// One of the two sides, player one always moves first
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn index(self) -> usize {
        match self {
            Player::One => 0,
            Player::Two => 1,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Cell {
    PlayerOne,
    PlayerTwo,
    Empty,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl From<Player> for Cell {
    fn from(player: Player) -> Self {
        match player {
            Player::One => Cell::PlayerOne,
            Player::Two => Cell::PlayerTwo,
        }
    }
}

/// Candidate moves ordered by heuristic score, best first
#[derive(Copy, Clone)]
pub struct MoveSorter {
    size: usize,
    // column and score
    moves: [(usize, i32); WIDTH],
}

impl MoveSorter {
    pub fn new() -> Self {
        Self {
            size: 0,
            moves: [(0, 0); WIDTH],
        }
    }
    pub fn push(&mut self, column: usize, score: i32) {
        let mut pos = self.size;
        self.size += 1;
        // equal scores keep insertion order, so later pushes are popped first
        while pos != 0 && self.moves[pos - 1].1 > score {
            self.moves[pos] = self.moves[pos - 1];
            pos -= 1;
        }
        self.moves[pos] = (column, score);
    }
    pub fn len(&self) -> usize {
        self.size
    }
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Default for MoveSorter {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for MoveSorter {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        match self.size {
            0 => None,
            _ => {
                self.size -= 1;
                Some(self.moves[self.size].0)
            }
        }
    }
}

/// A Connect 4 position packed into one bitmask per player
///
/// Each column uses `HEIGHT + 1` bits, bottom cell first. The extra guard bit on
/// top of every column is never set, which keeps shifted line patterns from
/// running from the top of one column into the bottom of the next.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct BitBoard {
    // tiles of player one and player two
    player_masks: [u64; 2],
    num_moves: usize,
    last_move: Option<usize>,
}

impl BitBoard {
    pub fn new() -> Self {
        Self {
            player_masks: [0, 0],
            num_moves: 0,
            last_move: None,
        }
    }

    /// Builds a position from a string of 1-indexed column digits, e.g. `"4453"`
    pub fn from_moves<S: AsRef<str>>(moves: S) -> Result<Self> {
        let mut board = Self::new();

        for column_char in moves.as_ref().chars() {
            // only play available moves
            match column_char.to_digit(10).map(|c| c as usize) {
                Some(column @ 1..=WIDTH) => {
                    let column = column - 1;
                    if !board.playable(column) {
                        return Err(anyhow!("Invalid move, column {} full", column + 1));
                    }
                    // abort if the position is won at any point
                    if board.check_winning_move(column) {
                        return Err(anyhow!("Invalid position, game is over"));
                    }
                    board.play(column);
                }
                _ => return Err(anyhow!("could not parse '{}' as a valid move", column_char)),
            }
        }
        Ok(board)
    }

    pub fn player_mask(&self, player: Player) -> u64 {
        self.player_masks[player.index()]
    }

    pub fn player_masks(&self) -> [u64; 2] {
        self.player_masks
    }

    /// Mask of all tiles
    pub fn board_mask(&self) -> u64 {
        self.player_masks[0] | self.player_masks[1]
    }

    pub fn current_player(&self) -> Player {
        if self.num_moves % 2 == 0 {
            Player::One
        } else {
            Player::Two
        }
    }

    pub fn num_moves(&self) -> usize {
        self.num_moves
    }

    pub fn last_move(&self) -> Option<usize> {
        self.last_move
    }

    pub fn top_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1) + (HEIGHT - 1))
    }

    pub fn bottom_mask(column: usize) -> u64 {
        1 << (column * (HEIGHT + 1))
    }

    pub fn column_mask(column: usize) -> u64 {
        ((1 << HEIGHT) - 1) << (column * (HEIGHT + 1))
    }

    pub fn is_full(&self) -> bool {
        self.num_moves == WIDTH * HEIGHT
    }

    pub fn playable(&self, column: usize) -> bool {
        column < WIDTH && !self.is_full() && Self::top_mask(column) & self.board_mask() == 0
    }

    /// Drops a tile for the current player into `column`
    ///
    /// The column must be playable, this is not checked in release builds.
    pub fn play(&mut self, column: usize) {
        debug_assert!(self.playable(column), "column {} is not playable", column);
        let current = self.current_player();
        let board_mask = self.board_mask();
        // the carry from the bottom bit lands on the first free cell of the column
        let new_mask = board_mask | (board_mask + Self::bottom_mask(column));
        self.player_masks[current.index()] = self.player_mask(current.opponent()) ^ new_mask;
        self.num_moves += 1;
        self.last_move = Some(column);
    }

    /// The cell a tile dropped into `column` would occupy
    fn move_bitmap(&self, column: usize) -> u64 {
        (self.board_mask() + Self::bottom_mask(column)) & Self::column_mask(column)
    }

    /// Checks a single player's tiles for four in a row in any direction
    pub fn connected_four(tiles: u64) -> bool {
        LINE_SHIFTS.iter().any(|&shift| {
            // mark all runs of 2
            let m = tiles & (tiles >> shift);
            // check for runs of 2 * (runs of 2)
            m & (m >> (2 * shift)) != 0
        })
    }

    /// Whether the player who made the last move has connected four
    pub fn has_winner(&self) -> bool {
        Self::connected_four(self.player_mask(self.current_player().opponent()))
    }

    pub fn winner(&self) -> Option<Player> {
        if self.has_winner() {
            Some(self.current_player().opponent())
        } else {
            None
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.is_full() || self.has_winner()
    }

    /// Checks whether adding a tile in `column` to `player_mask` connects four,
    /// without modifying the board
    pub fn is_winning_move(&self, column: usize, player_mask: u64) -> bool {
        Self::connected_four(player_mask | self.move_bitmap(column))
    }

    /// Checks whether the current player wins by playing `column`
    pub fn check_winning_move(&self, column: usize) -> bool {
        self.is_winning_move(column, self.player_mask(self.current_player()))
    }

    // create a bitmap of open squares that complete alignments for `player_mask`
    fn winning_positions(player_mask: u64, board_mask: u64) -> u64 {
        // vertical
        // find the top ends of 3-alignemnts
        let mut r = (player_mask << 1) & (player_mask << 2) & (player_mask << 3);

        for &shift in &LINE_SHIFTS[1..] {
            let mut p = (player_mask << shift) & (player_mask << (2 * shift));
            // find the right ends of 3-alignments
            r |= p & (player_mask << (3 * shift));
            // find holes of the type ...O O _ O...
            r |= p & (player_mask >> shift);

            p = (player_mask >> shift) & (player_mask >> (2 * shift));
            // find the left ends of 3-alignments
            r |= p & (player_mask >> (3 * shift));
            // find holes of the type ...O _ O O...
            r |= p & (player_mask << shift);
        }

        r & (static_masks::full_board_mask() ^ board_mask)
    }

    /// Move ordering heuristic: how many open cells would complete a four
    /// for the current player after playing `column`
    pub fn move_score(&self, column: usize) -> i32 {
        let candidate = self.move_bitmap(column);
        Self::winning_positions(
            self.player_mask(self.current_player()) | candidate,
            self.board_mask() | candidate,
        )
        .count_ones() as i32
    }

    /// Legal columns, highest `move_score` first, ties going to the central columns
    pub fn search_order(&self) -> MoveSorter {
        let mut moves = MoveSorter::new();
        // reversing move order to put edges first reduces the amount of sorting
        // as these moves are worse on average
        for &column in MOVE_ORDER.iter().rev() {
            if self.playable(column) {
                moves.push(column, self.move_score(column));
            }
        }
        moves
    }

    /// Owner of every cell, row 0 is the bottom row
    pub fn board_state(&self) -> [[Cell; WIDTH]; HEIGHT] {
        let mut cells = [[Cell::Empty; WIDTH]; HEIGHT];
        for (row, row_cells) in cells.iter_mut().enumerate() {
            for (column, cell) in row_cells.iter_mut().enumerate() {
                let tile = 1 << (column * (HEIGHT + 1) + row);
                for &player in [Player::One, Player::Two].iter() {
                    if self.player_mask(player) & tile != 0 {
                        *cell = player.into();
                    }
                }
            }
        }
        cells
    }

    /// Score for the current player winning with their next tile, earlier wins score higher
    pub fn win_score(&self) -> i32 {
        ((WIDTH * HEIGHT + 1 - self.num_moves) / 2) as i32
    }

    /// Score of a finished game from the current player's point of view
    pub fn terminal_score(&self) -> Option<i32> {
        if self.has_winner() {
            Some(-self.win_score())
        } else if self.is_full() {
            Some(0)
        } else {
            None
        }
    }

    // key for transposition table
    pub fn key(&self) -> u64 {
        self.board_mask() + self.player_mask(self.current_player())
    }
}

impl Default for BitBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BitBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.board_state().iter().rev() {
            for cell in row.iter() {
                let symbol = match cell {
                    Cell::PlayerOne => 'X',
                    Cell::PlayerTwo => 'O',
                    Cell::Empty => '.',
                };
                write!(f, "{}", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
