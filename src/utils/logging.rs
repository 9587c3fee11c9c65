//! Logging Module
//!
//! Structured logging with `tracing`: a filtered fmt subscriber for the CLI
//! and an epoch-level training logger.

use std::time::Instant;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::error::{PlantDiseaseError, Result};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for this crate's own events
    pub level: tracing::Level,
    /// Level for Burn and other dependencies
    pub dependency_level: tracing::Level,
    /// Show module paths
    pub include_target: bool,
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            dependency_level: tracing::Level::WARN,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Debug output for this crate, info for dependencies
    pub fn verbose() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            dependency_level: tracing::Level::INFO,
            include_target: true,
            ..Self::default()
        }
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self {
            level: tracing::Level::ERROR,
            dependency_level: tracing::Level::ERROR,
            ..Self::default()
        }
    }

    /// Filter directive, e.g. `warn,plant_disease=info`
    pub fn directive(&self) -> String {
        format!(
            "{},plant_disease={}",
            self.dependency_level.as_str().to_lowercase(),
            self.level.as_str().to_lowercase()
        )
    }

    /// `RUST_LOG` wins over the preset when it is set and parses
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
    }
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_ansi(config.ansi_colors)
                .with_target(config.include_target),
        )
        .with(config.filter())
        .try_init()
        .map_err(|e| PlantDiseaseError::Config(format!("Failed to initialize logger: {e}")))
}

/// Training progress logger
pub struct TrainingLogger {
    epoch: usize,
    total_epochs: usize,
    epoch_start: Instant,
    training_start: Instant,
}

impl TrainingLogger {
    pub fn new(total_epochs: usize) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            epoch_start: Instant::now(),
            training_start: Instant::now(),
        }
    }

    /// Log start of an epoch (zero-based index)
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = Instant::now();

        tracing::info!("Epoch {}/{} started", epoch + 1, self.total_epochs);
    }

    /// Log end of an epoch with train and validation metrics
    pub fn end_epoch(&self, train_loss: f64, train_accuracy: f64, val_loss: f64, val_accuracy: f64) {
        let epoch_time = self.epoch_start.elapsed();
        let total_time = self.training_start.elapsed();

        let epochs_remaining = self.total_epochs.saturating_sub(self.epoch + 1);
        let avg_epoch_time = total_time.as_secs_f64() / (self.epoch + 1) as f64;
        let eta_secs = epochs_remaining as f64 * avg_epoch_time;

        tracing::info!(
            "Epoch {}/{} completed in {:.1}s | loss: {:.4} | accuracy: {:.2}% | val_loss: {:.4} | val_accuracy: {:.2}% | ETA: {}",
            self.epoch + 1,
            self.total_epochs,
            epoch_time.as_secs_f64(),
            train_loss,
            train_accuracy * 100.0,
            val_loss,
            val_accuracy * 100.0,
            super::format_duration(eta_secs)
        );
    }

    /// Log training completion
    pub fn log_complete(&self, final_val_accuracy: f64) {
        let total_time = self.training_start.elapsed();

        tracing::info!(
            "Training complete: {} epochs in {} | final val_accuracy: {:.2}%",
            self.total_epochs,
            super::format_duration(total_time.as_secs_f64()),
            final_val_accuracy * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_directives() {
        assert_eq!(LogConfig::default().directive(), "warn,plant_disease=info");
        assert_eq!(LogConfig::verbose().directive(), "info,plant_disease=debug");
        assert_eq!(LogConfig::quiet().directive(), "error,plant_disease=error");
    }

    #[test]
    fn test_training_logger_tracks_epoch() {
        let mut logger = TrainingLogger::new(10);
        logger.start_epoch(3);
        assert_eq!(logger.epoch, 3);
        logger.end_epoch(0.5, 0.8, 0.6, 0.75);
    }
}
