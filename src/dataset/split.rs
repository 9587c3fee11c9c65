//! Positional train / validation / test split
//!
//! The split operates on a batch sequence. Slices are contiguous, disjoint
//! and cover the source in its original order; no randomisation happens here
//! (samples are shuffled by the loader before batching).
//!
//! Two strategies exist:
//!
//! - [`SplitStrategy::Fractions`] computes boundaries from the observed batch
//!   count and refuses to produce an empty subset.
//! - [`SplitStrategy::FixedCounts`] takes literal batch counts with
//!   take/skip semantics. It never fails: when the source is shorter than
//!   `train + validation`, validation and/or test come out empty.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::error::{PlantDiseaseError, Result};

/// How the batch sequence is partitioned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Proportions of the observed total; the rest goes to test
    Fractions { train: f64, validation: f64 },
    /// Literal batch counts; the rest goes to test
    FixedCounts { train: usize, validation: usize },
}

/// 80 / 10 / 10 of whatever batch count is observed. This equals the fixed
/// 54 / 6 / remainder layout only for 67 batches; use
/// [`SplitStrategy::legacy`] to get that layout for any count.
impl Default for SplitStrategy {
    fn default() -> Self {
        SplitStrategy::Fractions {
            train: 0.8,
            validation: 0.1,
        }
    }
}

impl SplitStrategy {
    /// The 54 / 6 / remainder layout of the original 67-batch dataset
    pub fn legacy() -> Self {
        SplitStrategy::FixedCounts {
            train: 54,
            validation: 6,
        }
    }

    /// Check the strategy's own parameters (independent of any dataset)
    pub fn validate(&self) -> Result<()> {
        match *self {
            SplitStrategy::Fractions { train, validation } => {
                if !(train > 0.0 && train < 1.0) {
                    return Err(PlantDiseaseError::Split(format!(
                        "train fraction must be in (0, 1), got {}",
                        train
                    )));
                }
                if !(validation > 0.0 && validation < 1.0) {
                    return Err(PlantDiseaseError::Split(format!(
                        "validation fraction must be in (0, 1), got {}",
                        validation
                    )));
                }
                if train + validation >= 1.0 {
                    return Err(PlantDiseaseError::Split(format!(
                        "train + validation must leave room for a test split, got {}",
                        train + validation
                    )));
                }
                Ok(())
            }
            SplitStrategy::FixedCounts { .. } => Ok(()),
        }
    }

    /// Lengths of (train, validation, test) for a source of `total` items
    pub fn lengths(&self, total: usize) -> Result<(usize, usize, usize)> {
        self.validate()?;

        match *self {
            SplitStrategy::Fractions { train, validation } => {
                let train_len = ((total as f64 * train).round() as usize).min(total);
                let val_len = ((total as f64 * validation).floor() as usize).min(total - train_len);
                let test_len = total - train_len - val_len;

                if train_len == 0 || val_len == 0 || test_len == 0 {
                    return Err(PlantDiseaseError::Split(format!(
                        "{} batches cannot be split {:.0}/{:.0}/{:.0}: got {}/{}/{} batches",
                        total,
                        train * 100.0,
                        validation * 100.0,
                        (1.0 - train - validation) * 100.0,
                        train_len,
                        val_len,
                        test_len
                    )));
                }

                Ok((train_len, val_len, test_len))
            }
            SplitStrategy::FixedCounts { train, validation } => {
                let train_len = train.min(total);
                let val_len = validation.min(total - train_len);
                let test_len = total - train_len - val_len;

                if val_len == 0 || test_len == 0 {
                    warn!(
                        "Only {} batches for a {}/{} fixed split: validation={}, test={}",
                        total, train, validation, val_len, test_len
                    );
                }

                Ok((train_len, val_len, test_len))
            }
        }
    }
}

/// Three disjoint, contiguous subsequences of one source
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit<T> {
    pub train: Vec<T>,
    pub validation: Vec<T>,
    pub test: Vec<T>,
}

impl<T> DatasetSplit<T> {
    /// Partition `items` by position according to `strategy`
    pub fn from_sequence(items: Vec<T>, strategy: &SplitStrategy) -> Result<Self> {
        let (train_len, val_len, test_len) = strategy.lengths(items.len())?;

        let mut iter = items.into_iter();
        let train: Vec<T> = iter.by_ref().take(train_len).collect();
        let validation: Vec<T> = iter.by_ref().take(val_len).collect();
        let test: Vec<T> = iter.collect();
        debug_assert_eq!(test.len(), test_len);

        debug!(
            "Split {} items into train={} validation={} test={}",
            train.len() + validation.len() + test.len(),
            train.len(),
            validation.len(),
            test.len()
        );

        Ok(Self {
            train,
            validation,
            test,
        })
    }

    pub fn lens(&self) -> (usize, usize, usize) {
        (self.train.len(), self.validation.len(), self.test.len())
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

impl<T> std::fmt::Display for DatasetSplit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (train, val, test) = self.lens();
        write!(f, "train={} validation={} test={} (batches)", train, val, test)
    }
}
