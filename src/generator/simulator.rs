//! Reaction-time trial simulation.
//!
//! Draws reaction times from a normal distribution per condition using a
//! ChaCha8 RNG, then appends any explicitly injected trials.

use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::error::GeneratorError;
use crate::generator::Result;
use crate::trial::TrialRecord;

/// Default standard deviation of simulated reaction times in milliseconds.
const DEFAULT_RT_SD: f64 = 30.0;

/// Default number of trials per subject and condition.
const DEFAULT_TRIALS_PER_CONDITION: usize = 12;

/// A condition and the mean reaction time simulated for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionProfile {
    /// Condition identifier.
    pub name: String,
    /// Mean reaction time in milliseconds.
    pub mean_rt: f64,
}

impl ConditionProfile {
    /// Creates a condition profile.
    pub fn new(name: impl Into<String>, mean_rt: f64) -> Self {
        Self {
            name: name.into(),
            mean_rt,
        }
    }
}

/// Shape of the simulated dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Subject identifiers.
    pub subjects: Vec<String>,
    /// Conditions every subject is run under.
    pub conditions: Vec<ConditionProfile>,
    /// Trials per subject and condition.
    pub trials_per_condition: usize,
    /// Standard deviation of reaction times.
    pub rt_sd: f64,
    /// Probability that a simulated trial has no reaction time.
    pub missing_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            subjects: vec!["S01".to_string(), "S02".to_string()],
            conditions: vec![
                ConditionProfile::new("visual", 350.0),
                ConditionProfile::new("auditory", 400.0),
            ],
            trials_per_condition: DEFAULT_TRIALS_PER_CONDITION,
            rt_sd: DEFAULT_RT_SD,
            missing_rate: 0.0,
        }
    }
}

/// A trial appended verbatim after the simulated ones.
#[derive(Debug, Clone)]
struct InjectedTrial {
    subject: String,
    condition: String,
    reaction_time: Option<f64>,
}

/// Deterministic generator of raw trials.
///
/// The same seed and configuration always produce the same trials.
pub struct TrialSimulator {
    config: SimulationConfig,
    rng: ChaCha8Rng,
    injected: Vec<InjectedTrial>,
}

impl TrialSimulator {
    /// Creates a simulator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Creates a simulator drawing from the given RNG.
    pub fn with_rng(rng: ChaCha8Rng) -> Self {
        Self {
            config: SimulationConfig::default(),
            rng,
            injected: Vec::new(),
        }
    }

    /// Replaces the simulation configuration.
    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of trials per subject and condition.
    pub fn with_trials_per_condition(mut self, n: usize) -> Self {
        self.config.trials_per_condition = n;
        self
    }

    /// Sets the probability that a simulated trial has no reaction time.
    pub fn with_missing_rate(mut self, rate: f64) -> Self {
        self.config.missing_rate = rate;
        self
    }

    /// Appends a trial with a fixed reaction time after the simulated ones.
    pub fn with_injected_trial(
        mut self,
        subject: impl Into<String>,
        condition: impl Into<String>,
        reaction_time: Option<f64>,
    ) -> Self {
        self.injected.push(InjectedTrial {
            subject: subject.into(),
            condition: condition.into(),
            reaction_time,
        });
        self
    }

    /// Appends the two known-bad trials: a 9000 ms response for S01/visual
    /// and a -50 ms response for S02/auditory.
    pub fn with_sanity_checks(self) -> Self {
        self.with_injected_trial("S01", "visual", Some(9000.0))
            .with_injected_trial("S02", "auditory", Some(-50.0))
    }

    /// Generates all trials. Trial ids are sequential from 1.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError::InvalidParameter` if the standard deviation,
    /// a condition mean or the missing rate is invalid.
    pub fn generate(mut self) -> Result<Vec<TrialRecord>> {
        if !(0.0..=1.0).contains(&self.config.missing_rate) {
            return Err(GeneratorError::InvalidParameter(format!(
                "missing_rate must be between 0.0 and 1.0, got {}",
                self.config.missing_rate
            )));
        }

        let distributions = self
            .config
            .conditions
            .iter()
            .map(|c| {
                Normal::new(c.mean_rt, self.config.rt_sd).map_err(|e| {
                    GeneratorError::InvalidParameter(format!(
                        "condition '{}' (mean {}, sd {}): {}",
                        c.name, c.mean_rt, self.config.rt_sd, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut trials = Vec::with_capacity(
            self.config.subjects.len()
                * self.config.conditions.len()
                * self.config.trials_per_condition
                + self.injected.len(),
        );
        let mut next_id: u64 = 1;

        for subject in &self.config.subjects {
            for (condition, normal) in self.config.conditions.iter().zip(&distributions) {
                for _ in 0..self.config.trials_per_condition {
                    let rt = normal.sample(&mut self.rng);
                    let reaction_time = if self.config.missing_rate > 0.0
                        && self.rng.random_bool(self.config.missing_rate)
                    {
                        None
                    } else {
                        Some(rt)
                    };
                    trials.push(TrialRecord {
                        subject: subject.clone(),
                        condition: condition.name.clone(),
                        trial_id: next_id,
                        reaction_time,
                    });
                    next_id += 1;
                }
            }
        }

        for injected in self.injected {
            trials.push(TrialRecord {
                subject: injected.subject,
                condition: injected.condition,
                trial_id: next_id,
                reaction_time: injected.reaction_time,
            });
            next_id += 1;
        }

        debug!(trials = trials.len(), "Simulated raw trials");
        Ok(trials)
    }
}
