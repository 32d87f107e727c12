//! Trial data types.
//!
//! Defines the raw trial format consumed by the QC pipeline and the
//! annotation attached to each trial by trial-level quality control.

use serde::{Deserialize, Serialize};

/// A single raw trial as produced by the data source.
///
/// Records are immutable once created; quality control never edits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Subject identifier (e.g., "S01").
    pub subject: String,

    /// Condition identifier (e.g., "visual").
    pub condition: String,

    /// Unique trial identifier.
    pub trial_id: u64,

    /// Measured reaction time in milliseconds, if one was recorded.
    #[serde(default)]
    pub reaction_time: Option<f64>,
}

impl TrialRecord {
    /// Creates a trial with a recorded reaction time.
    pub fn new(
        subject: impl Into<String>,
        condition: impl Into<String>,
        trial_id: u64,
        reaction_time: f64,
    ) -> Self {
        Self {
            subject: subject.into(),
            condition: condition.into(),
            trial_id,
            reaction_time: Some(reaction_time),
        }
    }

    /// Creates a trial with no recorded reaction time.
    pub fn missing(subject: impl Into<String>, condition: impl Into<String>, trial_id: u64) -> Self {
        Self {
            subject: subject.into(),
            condition: condition.into(),
            trial_id,
            reaction_time: None,
        }
    }

    /// Returns the reaction time, treating NaN as missing.
    pub fn rt(&self) -> Option<f64> {
        self.reaction_time.filter(|rt| !rt.is_nan())
    }
}

/// Why a trial failed trial-level QC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcReason {
    /// No reaction time was recorded.
    MissingRt,
    /// The reaction time is below zero.
    NegativeRt,
    /// The reaction time is below the configured minimum.
    RtTooFast,
    /// The reaction time is above the configured maximum.
    RtTooSlow,
}

impl QcReason {
    /// All reasons, in rule evaluation order.
    pub const ALL: [QcReason; 4] = [
        QcReason::MissingRt,
        QcReason::NegativeRt,
        QcReason::RtTooFast,
        QcReason::RtTooSlow,
    ];

    /// Returns the reason code as written in outputs.
    pub fn as_str(&self) -> &'static str {
        match self {
            QcReason::MissingRt => "missing_rt",
            QcReason::NegativeRt => "negative_rt",
            QcReason::RtTooFast => "rt_too_fast",
            QcReason::RtTooSlow => "rt_too_slow",
        }
    }
}

impl std::fmt::Display for QcReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trial-level QC outcome.
///
/// The flag is true exactly when no reason is present. The fields are private
/// and the only constructors are [`QcAnnotation::valid`] and
/// [`QcAnnotation::invalid`], so no other combination can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QcAnnotation {
    qc_flag: bool,
    qc_reason: Option<QcReason>,
}

impl QcAnnotation {
    /// Annotation for a trial that passed QC.
    pub fn valid() -> Self {
        Self {
            qc_flag: true,
            qc_reason: None,
        }
    }

    /// Annotation for a trial rejected for `reason`.
    pub fn invalid(reason: QcReason) -> Self {
        Self {
            qc_flag: false,
            qc_reason: Some(reason),
        }
    }

    /// True when the trial passed QC.
    pub fn qc_flag(&self) -> bool {
        self.qc_flag
    }

    /// The rejection reason, present iff the flag is false.
    pub fn qc_reason(&self) -> Option<QcReason> {
        self.qc_reason
    }
}

/// A raw trial paired with its QC annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedTrial {
    /// The original record, unchanged.
    #[serde(flatten)]
    pub record: TrialRecord,

    /// QC outcome for the record.
    #[serde(flatten)]
    pub annotation: QcAnnotation,
}

impl AnnotatedTrial {
    /// Pairs a record with its annotation.
    pub fn new(record: TrialRecord, annotation: QcAnnotation) -> Self {
        Self { record, annotation }
    }

    /// True when the trial passed trial-level QC.
    pub fn is_valid(&self) -> bool {
        self.annotation.qc_flag()
    }

    /// Subject identifier of the underlying record.
    pub fn subject(&self) -> &str {
        &self.record.subject
    }

    /// Condition identifier of the underlying record.
    pub fn condition(&self) -> &str {
        &self.record.condition
    }

    /// Trial identifier of the underlying record.
    pub fn trial_id(&self) -> u64 {
        self.record.trial_id
    }
}
