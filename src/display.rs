use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    style::{style, Attribute, Color, PrintStyledContent},
    QueueableCommand,
};

use std::io::{stdout, Write};

use connect4_solver::{bitboard::Cell, session::GameView, HEIGHT, WIDTH};

/// Draws the board below the cursor, highlighting the last move
pub fn draw(view: &GameView) -> Result<()> {
    let mut stdout = stdout();

    let cols: String = (1..=WIDTH).map(|x| x.to_string()).collect();
    stdout.queue(PrintStyledContent(style(cols + "\n")))?;
    for _ in 0..HEIGHT {
        stdout.queue(PrintStyledContent(style("\n")))?;
    }
    stdout.flush()?;

    let (origin_x, origin_y) = crossterm::cursor::position()?;
    let top_y = origin_y - (HEIGHT as u16 - 1);

    // the highest tile of the last played column is the last move
    let last_row = view
        .last_move
        .and_then(|column| (0..HEIGHT).find(|&row| !view.board[row][column].is_empty()));

    for (row, cells) in view.board.iter().enumerate() {
        for (column, cell) in cells.iter().enumerate() {
            let symbol = if view.last_move == Some(column) && last_row == Some(row) {
                "@"
            } else {
                "O"
            };
            stdout
                .queue(MoveTo(origin_x + column as u16, top_y + row as u16))?
                .queue(PrintStyledContent(
                    style(symbol)
                        .attribute(Attribute::Bold)
                        .on(Color::DarkBlue)
                        .with(match cell {
                            Cell::PlayerOne => Color::Red,
                            Cell::PlayerTwo => Color::Yellow,
                            Cell::Empty => Color::DarkBlue,
                        }),
                ))?;
        }
    }
    stdout
        .queue(MoveTo(origin_x + WIDTH as u16, origin_y))?
        .queue(PrintStyledContent(style("\n")))?;
    stdout.flush()?;
    Ok(())
}
