pub mod evaluate;
pub mod train;
pub mod visualize;

pub use evaluate::{EvaluateMode, EvaluationSummary};
pub use train::{CheckpointGuard, EpisodeOutcome, TrainConfig, TrainMode};
pub use visualize::VisualizeMode;
