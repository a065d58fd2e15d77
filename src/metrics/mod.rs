pub mod history;
pub mod session;
pub mod training_stats;

pub use history::{EpisodeLog, EpisodeRecord, read_history};
pub use session::{SessionMetrics, format_clock};
pub use training_stats::TrainingStats;
