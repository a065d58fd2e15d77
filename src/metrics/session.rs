//! Counters for one visualizer session

use std::time::{Duration, Instant};

use crate::game::TerminationReason;

/// Games finished while the visualizer has been open
#[derive(Debug, Clone)]
pub struct SessionMetrics {
    opened: Instant,
    game_started: Instant,
    games: u32,
    best_score: u32,
    total_score: u64,
    last_end: Option<(u32, TerminationReason)>,
}

impl SessionMetrics {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            opened: now,
            game_started: now,
            games: 0,
            best_score: 0,
            total_score: 0,
            last_end: None,
        }
    }

    /// Restart the game clock
    pub fn start_game(&mut self) {
        self.game_started = Instant::now();
    }

    pub fn finish_game(&mut self, score: u32, reason: TerminationReason) {
        self.games += 1;
        self.total_score += u64::from(score);
        self.best_score = self.best_score.max(score);
        self.last_end = Some((score, reason));
    }

    /// Finished games
    pub fn games(&self) -> u32 {
        self.games
    }

    /// Number of the game on screen
    pub fn current_game(&self) -> u32 {
        self.games + 1
    }

    pub fn best_score(&self) -> u32 {
        self.best_score
    }

    pub fn mean_score(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.total_score as f64 / f64::from(self.games)
        }
    }

    /// Score and reason of the most recent finished game
    pub fn last_end(&self) -> Option<(u32, TerminationReason)> {
        self.last_end
    }

    pub fn game_time(&self) -> Duration {
        self.game_started.elapsed()
    }

    pub fn session_time(&self) -> Duration {
        self.opened.elapsed()
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// `mm:ss`, with minutes running past 59
pub fn format_clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_format() {
        assert_eq!(format_clock(Duration::from_millis(999)), "00:00");
        assert_eq!(format_clock(Duration::from_secs(125)), "02:05");
        assert_eq!(format_clock(Duration::from_secs(3661)), "61:01");
    }

    #[test]
    fn test_finished_games() {
        let mut metrics = SessionMetrics::new();
        assert_eq!(metrics.current_game(), 1);
        assert_eq!(metrics.mean_score(), 0.0);
        assert_eq!(metrics.last_end(), None);

        metrics.finish_game(6, TerminationReason::Tail);
        metrics.finish_game(2, TerminationReason::Steps);

        assert_eq!(metrics.games(), 2);
        assert_eq!(metrics.current_game(), 3);
        assert_eq!(metrics.best_score(), 6);
        assert!((metrics.mean_score() - 4.0).abs() < 1e-9);
        assert_eq!(metrics.last_end(), Some((2, TerminationReason::Steps)));
    }

    #[test]
    fn test_game_clock_restarts() {
        let mut metrics = SessionMetrics::new();
        std::thread::sleep(Duration::from_millis(20));
        metrics.start_game();

        assert!(metrics.game_time() < metrics.session_time());
    }
}
