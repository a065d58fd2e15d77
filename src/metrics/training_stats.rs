//! Training statistics tracking
//!
//! Rolling averages over the most recent episodes plus run-wide totals and a
//! tally of why each episode ended.

use std::collections::VecDeque;

use crate::game::TerminationReason;

/// Training statistics tracker with rolling averages
///
/// # Example
///
/// ```rust
/// use ql_snake::game::TerminationReason;
/// use ql_snake::metrics::TrainingStats;
///
/// let mut stats = TrainingStats::new(100);
/// stats.record_episode(9.7, 150, 1, TerminationReason::Tail);
///
/// assert_eq!(stats.total_episodes(), 1);
/// println!("{}", stats.format_summary());
/// ```
#[derive(Debug, Clone)]
pub struct TrainingStats {
    /// Episode rewards (rolling window)
    episode_rewards: VecDeque<f64>,

    /// Episode lengths in steps (rolling window)
    episode_lengths: VecDeque<u64>,

    /// Food eaten per episode (rolling window)
    episode_scores: VecDeque<u32>,

    /// Episodes ended per reason, in [`TerminationReason::ALL`] order
    reasons: [u64; 3],

    best_score: u32,
    total_episodes: u64,
    total_steps: u64,
    window_size: usize,
}

impl TrainingStats {
    /// Create a tracker averaging over the last `window_size` episodes
    pub fn new(window_size: usize) -> Self {
        Self {
            episode_rewards: VecDeque::with_capacity(window_size),
            episode_lengths: VecDeque::with_capacity(window_size),
            episode_scores: VecDeque::with_capacity(window_size),
            reasons: [0; 3],
            best_score: 0,
            total_episodes: 0,
            total_steps: 0,
            window_size,
        }
    }

    /// Record the completion of an episode
    ///
    /// Returns `true` when `score` beats every earlier episode.
    pub fn record_episode(
        &mut self,
        reward: f64,
        length: u64,
        score: u32,
        reason: TerminationReason,
    ) -> bool {
        Self::push_deque(&mut self.episode_rewards, reward, self.window_size);
        Self::push_deque(&mut self.episode_lengths, length, self.window_size);
        Self::push_deque(&mut self.episode_scores, score, self.window_size);
        self.reasons[reason_slot(reason)] += 1;
        self.total_episodes += 1;
        self.total_steps += length;

        let improved = score > self.best_score;
        if improved {
            self.best_score = score;
        }
        improved
    }

    pub fn mean_episode_reward(&self) -> f64 {
        if self.episode_rewards.is_empty() {
            0.0
        } else {
            self.episode_rewards.iter().sum::<f64>() / self.episode_rewards.len() as f64
        }
    }

    pub fn mean_episode_length(&self) -> f64 {
        let sum: u64 = self.episode_lengths.iter().sum();
        if self.episode_lengths.is_empty() {
            0.0
        } else {
            sum as f64 / self.episode_lengths.len() as f64
        }
    }

    pub fn mean_episode_score(&self) -> f64 {
        let sum: u64 = self.episode_scores.iter().map(|&s| u64::from(s)).sum();
        if self.episode_scores.is_empty() {
            0.0
        } else {
            sum as f64 / self.episode_scores.len() as f64
        }
    }

    /// Episodes that ended for `reason` since the tracker was created
    pub fn reason_count(&self, reason: TerminationReason) -> u64 {
        self.reasons[reason_slot(reason)]
    }

    /// Highest score seen in any episode
    pub fn best_score(&self) -> u32 {
        self.best_score
    }

    pub fn total_episodes(&self) -> u64 {
        self.total_episodes
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// One-line summary of the current statistics
    pub fn format_summary(&self) -> String {
        format!(
            "Episodes: {} | Steps: {} | Reward: {:.2} | Score: {:.2} | Len: {:.1} | Best: {} | Tail/Screen/Steps: {}/{}/{}",
            self.total_episodes,
            self.total_steps,
            self.mean_episode_reward(),
            self.mean_episode_score(),
            self.mean_episode_length(),
            self.best_score,
            self.reason_count(TerminationReason::Tail),
            self.reason_count(TerminationReason::Screen),
            self.reason_count(TerminationReason::Steps),
        )
    }

    fn push_deque<T>(deque: &mut VecDeque<T>, value: T, window_size: usize) {
        if deque.len() >= window_size {
            deque.pop_front();
        }
        deque.push_back(value);
    }
}

fn reason_slot(reason: TerminationReason) -> usize {
    match reason {
        TerminationReason::Tail => 0,
        TerminationReason::Screen => 1,
        TerminationReason::Steps => 2,
    }
}
