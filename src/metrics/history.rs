//! Per-episode training series
//!
//! Every finished training episode appends one JSON object per line to the
//! history file, together with the rolling means at that point, so reward
//! and score curves can be plotted without re-running the agent.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::TrainingStats;
use crate::game::TerminationReason;

/// One line of the history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// 1-based episode number within the run
    pub episode: u64,
    pub reward: f64,
    pub score: u32,
    pub length: u64,
    pub reason: TerminationReason,
    /// Rolling mean reward including this episode
    pub mean_reward: f64,
    /// Rolling mean score including this episode
    pub mean_score: f64,
}

impl EpisodeRecord {
    /// Record for the episode `stats` has just counted
    pub fn latest(
        stats: &TrainingStats,
        reward: f64,
        length: u64,
        score: u32,
        reason: TerminationReason,
    ) -> Self {
        Self {
            episode: stats.total_episodes(),
            reward,
            score,
            length,
            reason,
            mean_reward: stats.mean_episode_reward(),
            mean_score: stats.mean_episode_score(),
        }
    }
}

/// Appends [`EpisodeRecord`]s to a JSON Lines file
pub struct EpisodeLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl EpisodeLog {
    /// Start a fresh series at `path`, replacing any earlier run's series
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &EpisodeRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Read a series written by [`EpisodeLog`]
pub fn read_history(path: &Path) -> io::Result<Vec<EpisodeRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
