#[cfg(test)]
pub mod test {
    use anyhow::{anyhow, Result};
    use std::fs::File;
    use std::io::{BufRead, BufReader};
    use std::time::{Duration, Instant};

    use crate::{bitboard::BitBoard, solver::Solver};

    /// Solves every `moves score` line of a test file and checks the scores,
    /// printing mean time and search speed
    fn run_test_file(name: &str, path: &str) -> Result<()> {
        let file = BufReader::new(File::open(path)?);

        let mut times = vec![];
        let mut posis = vec![];

        for line in file.lines() {
            let buf = line?;
            let mut test_data = buf.split_whitespace();
            let moves = match test_data.next() {
                Some(moves) => moves,
                // skip blank lines
                None => continue,
            };
            let score = test_data
                .next()
                .ok_or_else(|| anyhow!("invalid test data: {}", buf))?
                .parse::<i32>()?;

            let board = BitBoard::from_moves(moves)?;
            let mut solver = Solver::new(board);
            let start_time = Instant::now();
            let (calc, _) = solver.solve();
            let finish_time = Instant::now();
            assert_eq!(score, calc, "wrong score for {}", moves);
            times.push(finish_time - start_time);
            posis.push(solver.node_count);
        }

        println!(
            "{}\nMean time: {:.6}ms, Mean no. of positions: {}, kpos/s: {}",
            name,
            (times.iter().sum::<Duration>() / times.len() as u32).as_secs_f64() * 1000.0,
            posis.iter().sum::<usize>() as f64 / posis.len() as f64,
            posis
                .iter()
                .zip(times.iter())
                .map(|(p, t)| *p as f64 / t.as_secs_f64().max(f64::EPSILON))
                .sum::<f64>()
                / (1000.0 * posis.len() as f64)
        );
        Ok(())
    }

    #[test]
    pub fn endgame() -> Result<()> {
        run_test_file("Endgame", "test_data/endgame")
    }

    #[test]
    pub fn middlegame() -> Result<()> {
        run_test_file("Middlegame", "test_data/middlegame")
    }

    #[test]
    pub fn opening() -> Result<()> {
        run_test_file("Opening", "test_data/opening")
    }

    #[test]
    pub fn known_opening_position() -> Result<()> {
        let mut solver = Solver::new(BitBoard::from_moves("4453254545")?);
        let (calc, best) = solver.solve();
        assert_eq!(calc, -5);
        assert!(best.is_some());
        Ok(())
    }

    #[test]
    #[ignore = "solves the whole game"]
    pub fn full_search() -> Result<()> {
        let board = BitBoard::new();
        let mut solver = Solver::new(board);
        let start_time = Instant::now();
        let (calc, best) = solver.solve();
        let time = start_time.elapsed();
        let posis = solver.node_count;

        println!(
            "Full game search\n Time: {:.6}s, No. of positions: {}, kpos/s: {}",
            time.as_secs_f64(),
            posis,
            posis as f64 / (1000.0 * time.as_secs_f64())
        );
        assert_eq!(calc, 1);
        assert_eq!(best, Some(3));
        Ok(())
    }
}
