//! Live games keyed by opaque session ids
//!
//! A `GameRegistry` owns every running game and enforces the rules the solver
//! leaves to its callers: columns must be in range and not full, finished games
//! accept no more moves, and the human (player one) and the engine (player two)
//! alternate turns.

use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    bitboard::{BitBoard, Cell, Player},
    solver::{Solver, SolverConfig},
    transposition_table::{TranspositionTable, DEFAULT_TABLE_CAPACITY},
    HEIGHT, WIDTH,
};

/// Search depth of the engine in a default registry
pub const BOT_SEARCH_DEPTH: usize = 10;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SessionId(u64);

impl SessionId {
    fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(Self)
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum SessionError {
    #[error("no game with id {0}")]
    UnknownSession(SessionId),

    #[error("column {0} is out of range")]
    InvalidColumn(usize),

    #[error("column {0} is full")]
    ColumnFull(usize),

    #[error("game is already over")]
    GameOver,

    #[error("it is not {0:?}'s turn")]
    WrongTurn(Player),

    #[error("engine could not find a valid move")]
    NoMoveAvailable,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum GameState {
    Playing,
    PlayerOneWin,
    PlayerTwoWin,
    Draw,
}

impl GameState {
    pub fn is_over(self) -> bool {
        self != GameState::Playing
    }
}

/// Snapshot of a game for display
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct GameView {
    /// Cells with the top row first
    pub board: [[Cell; WIDTH]; HEIGHT],
    pub state: GameState,
    pub last_move: Option<usize>,
    pub num_moves: usize,
    pub current_player: Player,
}

/// A single game in progress
#[derive(Clone, Debug, Default)]
pub struct Game {
    board: BitBoard,
}

impl Game {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board(&self) -> &BitBoard {
        &self.board
    }

    pub fn state(&self) -> GameState {
        match self.board.winner() {
            Some(Player::One) => GameState::PlayerOneWin,
            Some(Player::Two) => GameState::PlayerTwoWin,
            None if self.board.is_full() => GameState::Draw,
            None => GameState::Playing,
        }
    }

    /// Plays `column` for the player to move after validating it
    pub fn play_checked(&mut self, column: usize) -> Result<GameState, SessionError> {
        if column >= WIDTH {
            return Err(SessionError::InvalidColumn(column));
        }
        if self.state().is_over() {
            return Err(SessionError::GameOver);
        }
        if !self.board.playable(column) {
            return Err(SessionError::ColumnFull(column));
        }
        self.board.play(column);
        Ok(self.state())
    }

    /// Picks the engine's move for the player to move
    pub fn best_move(
        &self,
        config: SolverConfig,
        table: Arc<TranspositionTable>,
    ) -> Result<(i32, usize), SessionError> {
        if self.state().is_over() {
            return Err(SessionError::GameOver);
        }
        let mut solver = Solver::new_with_transposition_table(self.board, table).with_config(config);
        match solver.solve() {
            (score, Some(column)) if self.board.playable(column) => Ok((score, column)),
            _ => Err(SessionError::NoMoveAvailable),
        }
    }

    pub fn view(&self) -> GameView {
        let mut board = self.board.board_state();
        // top row first for display
        board.reverse();
        GameView {
            board,
            state: self.state(),
            last_move: self.board.last_move(),
            num_moves: self.board.num_moves(),
            current_player: self.board.current_player(),
        }
    }
}

/// Every running game, the human always plays first against the engine
pub struct GameRegistry {
    games: RwLock<HashMap<SessionId, Arc<Mutex<Game>>>>,
    config: SolverConfig,
    // shared by exhaustive engine searches across sessions
    table: Arc<TranspositionTable>,
}

impl GameRegistry {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            config,
            table: Arc::new(TranspositionTable::new(DEFAULT_TABLE_CAPACITY)),
        }
    }

    pub fn config(&self) -> SolverConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.games.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn new_game(&self) -> (SessionId, GameView) {
        let game = Game::new();
        let view = game.view();

        let mut games = self.games.write();
        let mut id = SessionId::random();
        while games.contains_key(&id) {
            id = SessionId::random();
        }
        games.insert(id, Arc::new(Mutex::new(game)));
        info!("started game {}, {} games running", id, games.len());
        (id, view)
    }

    fn game(&self, id: SessionId) -> Result<Arc<Mutex<Game>>, SessionError> {
        self.games
            .read()
            .get(&id)
            .cloned()
            .ok_or(SessionError::UnknownSession(id))
    }

    pub fn status(&self, id: SessionId) -> Result<GameView, SessionError> {
        Ok(self.game(id)?.lock().view())
    }

    /// Plays the human's move
    pub fn play_move(&self, id: SessionId, column: usize) -> Result<GameView, SessionError> {
        let game = self.game(id)?;
        let mut game = game.lock();
        if column >= WIDTH {
            return Err(SessionError::InvalidColumn(column));
        }
        if game.state().is_over() {
            return Err(SessionError::GameOver);
        }
        if game.board().current_player() != Player::One {
            return Err(SessionError::WrongTurn(Player::One));
        }
        game.play_checked(column)?;
        debug!("game {}: player move {}", id, column);
        Ok(game.view())
    }

    /// Lets the engine play its move, returning the column it chose
    pub fn bot_move(&self, id: SessionId) -> Result<(usize, GameView), SessionError> {
        let game = self.game(id)?;
        let mut game = game.lock();
        if game.state().is_over() {
            return Err(SessionError::GameOver);
        }
        if game.board().current_player() != Player::Two {
            return Err(SessionError::WrongTurn(Player::Two));
        }

        // depth limited scores depend on the root, so only exact searches share the table
        let table = match self.config.depth {
            None => Arc::clone(&self.table),
            Some(_) => Arc::new(TranspositionTable::new(DEFAULT_TABLE_CAPACITY)),
        };
        let (score, column) = game.best_move(self.config, table)?;
        game.play_checked(column)?;
        info!("game {}: engine plays {} (score {})", id, column, score);
        Ok((column, game.view()))
    }

    pub fn remove(&self, id: SessionId) -> Result<(), SessionError> {
        self.games
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(SessionError::UnknownSession(id))
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new(SolverConfig::default().with_depth(BOT_SEARCH_DEPTH))
    }
}
