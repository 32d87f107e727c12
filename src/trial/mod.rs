//! Trial records and their QC annotations.
//!
//! A [`TrialRecord`] is produced once by the raw-data source and never
//! changes afterwards. Quality control pairs it with a [`QcAnnotation`]
//! inside an [`AnnotatedTrial`] instead of editing or dropping it.

pub mod types;

pub use types::{AnnotatedTrial, QcAnnotation, QcReason, TrialRecord};
