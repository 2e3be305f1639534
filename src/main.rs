use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;

use std::cmp::Ordering;
use std::io::{stdin, stdout, Write};
use std::sync::Arc;

use connect4_solver::{
    bitboard::{BitBoard, Player},
    session::{Game, GameState},
    solver::{Solver, SolverConfig},
    transposition_table::{TranspositionTable, DEFAULT_TABLE_CAPACITY},
    WIDTH,
};

mod display;

#[derive(Parser, Debug)]
#[command(author, version, about = "Play or analyse Connect 4 against a perfect solver", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Only prove whether positions are won, lost or drawn
    #[arg(short, long)]
    weak: bool,

    /// Limit the search to this many plies instead of solving to the end of the game
    #[arg(long)]
    depth: Option<usize>,

    /// Number of positions kept in the transposition table
    #[arg(long, default_value_t = DEFAULT_TABLE_CAPACITY)]
    table_capacity: usize,

    /// Print the score of every column for a position given as 1-indexed moves, e.g. 4453
    #[arg(long, value_name = "MOVES")]
    analyse: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
    .target(env_logger::Target::Stderr)
    .init();

    let config = SolverConfig {
        weak: args.weak,
        depth: args.depth,
    };
    // keep the transposition table out here so we can re-use it
    let transposition_table = Arc::new(TranspositionTable::new(args.table_capacity));

    match &args.analyse {
        Some(moves) => analyse(moves, config, transposition_table),
        None => play(config, transposition_table),
    }
}

fn analyse(moves: &str, config: SolverConfig, table: Arc<TranspositionTable>) -> Result<()> {
    let board = BitBoard::from_moves(moves)?;
    print!("{}", board);

    let mut solver = Solver::new_with_transposition_table(board, table).with_config(config);
    let (score, best_move) = solver.solve();
    println!("Score: {}", score);
    if let Some(column) = best_move {
        println!("Best move: {}", column + 1);
    }

    let scores = solver.analyse();
    for (column, score) in scores.iter().enumerate() {
        match score {
            Some(score) => println!("  column {}: {}", column + 1, score),
            None => println!("  column {}: -", column + 1),
        }
    }
    Ok(())
}

/// Asks a yes/no question until a valid answer is given
fn ask(question: &str) -> Result<bool> {
    let stdin = stdin();
    loop {
        let mut buffer = String::new();
        print!("{} y/n: ", question);
        stdout().flush()?;
        stdin.read_line(&mut buffer)?;
        match buffer.to_lowercase().chars().next() {
            Some('y') => return Ok(true),
            Some('n') => return Ok(false),
            _ => println!("Unknown answer given"),
        }
    }
}

fn play(config: SolverConfig, transposition_table: Arc<TranspositionTable>) -> Result<()> {
    let mut game = Game::new();
    let stdin = stdin();

    println!("Welcome to Connect 4\n");

    let ai_players = (
        ask("Is player 1 AI controlled?")?,
        ask("Is player 2 AI controlled?")?,
    );

    // game loop
    loop {
        let view = game.view();
        display::draw(&view)?;

        match view.state {
            GameState::Playing => {
                let player_one = view.current_player == Player::One;
                let next_move =
                    // AI player
                    if (player_one && ai_players.0) || (!player_one && ai_players.1) {
                        // slow down play if both players are AI
                        if ai_players == (true, true) {
                            std::thread::sleep(std::time::Duration::new(3, 0));
                        }

                        let spinner = ProgressBar::new_spinner();
                        spinner.set_message("AI is thinking...");
                        spinner.enable_steady_tick(100);

                        // horizon scores depend on the root, so depth limited searches start fresh
                        let table = match config.depth {
                            None => Arc::clone(&transposition_table),
                            Some(_) => Arc::new(TranspositionTable::new(transposition_table.capacity())),
                        };
                        let mut solver =
                            Solver::new_with_transposition_table(*game.board(), table).with_config(config);
                        let (score, best_move) = solver.solve();
                        spinner.finish_and_clear();

                        let best_move = match best_move {
                            Some(column) => column,
                            None => anyhow::bail!("solver found no move in a running game"),
                        };

                        let win_distance = solver.score_to_win_distance(score);
                        let move_string = if win_distance == 1 { "move" } else { "moves" };
                        let (player, opponent) = if player_one { (1, 2) } else { (2, 1) };
                        match score.cmp(&0) {
                            Ordering::Greater => {
                                println!("Player {} can force a win in at most {} {}.", player, win_distance, move_string);
                            }
                            Ordering::Less => {
                                println!("Player {} can force a win in at most {} {}.", opponent, win_distance, move_string);
                            }
                            Ordering::Equal => {
                                println!("Player {} can at best force a draw, {} {} remaining", player, win_distance, move_string);
                            }
                        }

                        println!("Best move: {}", best_move + 1);
                        best_move + 1

                    // human player
                    } else {
                        print!("Move input > ");
                        stdout().flush()?;
                        let mut input_str = String::new();
                        stdin.read_line(&mut input_str)?;

                        match input_str.trim().parse::<usize>() {
                            Ok(column @ 1..=WIDTH) => column,
                            _ => {
                                println!("Invalid move: {}. Columns must be between 1 and {}", input_str.trim(), WIDTH);
                                continue;
                            }
                        }
                    };

                if let Err(err) = game.play_checked(next_move - 1) {
                    println!("{}", err);
                    // try the move again
                    continue;
                }
            }

            // end states
            GameState::PlayerOneWin => {
                println!("Player 1 wins!");
                break;
            }
            GameState::PlayerTwoWin => {
                println!("Player 2 wins!");
                break;
            }
            GameState::Draw => {
                println!("Draw!");
                break;
            }
        }
    }
    Ok(())
}
