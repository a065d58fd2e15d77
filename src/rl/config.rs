//! Q-learning hyperparameter configuration

use serde::{Deserialize, Serialize};

/// How epsilon shrinks after each completed training episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EpsilonDecay {
    /// Epsilon stays at its starting value
    Constant,
    /// Subtract `step` per episode
    Linear { step: f64 },
    /// Multiply by `factor` per episode
    Exponential { factor: f64 },
}

impl EpsilonDecay {
    /// Epsilon after one more episode, never below `floor` and never above `current`
    pub fn next(&self, current: f64, floor: f64) -> f64 {
        let next = match *self {
            EpsilonDecay::Constant => current,
            EpsilonDecay::Linear { step } => current - step,
            EpsilonDecay::Exponential { factor } => current * factor,
        };
        next.max(floor).min(current)
    }
}

/// Configuration for the tabular Q-learning agent
///
/// # Example
///
/// ```rust
/// use ql_snake::rl::QLearningConfig;
///
/// // Use default hyperparameters
/// let config = QLearningConfig::default();
///
/// // Or customize specific parameters
/// let config = QLearningConfig {
///     learning_rate: 0.1,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QLearningConfig {
    /// Step size α of the Bellman update
    ///
    /// Default: 0.03
    pub learning_rate: f64,

    /// Discount factor γ for future rewards
    ///
    /// Default: 0.9
    pub discount: f64,

    /// Exploration probability at the start of training
    ///
    /// Default: 0.1
    pub epsilon_start: f64,

    /// Exploration never decays below this value
    ///
    /// Default: 0.0
    pub epsilon_floor: f64,

    /// Per-episode decay policy
    ///
    /// Default: exponential with factor 0.999
    pub epsilon_decay: EpsilonDecay,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.03,
            discount: 0.9,
            epsilon_start: 0.1,
            epsilon_floor: 0.0,
            epsilon_decay: EpsilonDecay::Exponential { factor: 0.999 },
        }
    }
}

impl QLearningConfig {
    /// Validate configuration parameters
    ///
    /// # Returns
    ///
    /// `Ok(())` if all parameters are valid, `Err(String)` with an error message otherwise.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("learning_rate", self.learning_rate),
            ("discount", self.discount),
            ("epsilon_start", self.epsilon_start),
            ("epsilon_floor", self.epsilon_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} must be in [0, 1], got {value}"));
            }
        }

        if self.epsilon_floor > self.epsilon_start {
            return Err(format!(
                "epsilon_floor ({}) cannot exceed epsilon_start ({})",
                self.epsilon_floor, self.epsilon_start
            ));
        }

        match self.epsilon_decay {
            EpsilonDecay::Constant => {}
            EpsilonDecay::Linear { step } => {
                if !(step.is_finite() && step >= 0.0) {
                    return Err(format!("linear decay step must be non-negative, got {step}"));
                }
            }
            EpsilonDecay::Exponential { factor } => {
                if !(0.0..=1.0).contains(&factor) {
                    return Err(format!(
                        "exponential decay factor must be in [0, 1], got {factor}"
                    ));
                }
            }
        }

        Ok(())
    }
}
