//! Aggregation of the valid dataset into summary statistics.
//!
//! The [`Aggregator`] groups trials by (subject, condition) and hands each
//! group to every configured [`Statistic`]. New statistic kinds only need a
//! `Statistic` implementation.

mod aggregator;
mod statistics;

pub use aggregator::{AggregateResult, Aggregator};
pub use statistics::{statistic_for, Mean, Median, Statistic, StatisticKind, TrimmedMean};
