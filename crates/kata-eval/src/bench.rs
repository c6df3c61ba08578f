//! Time-budgeted benchmarking of a call expression.
//!
//! The solution source is loaded once; the call program is then run
//! repeatedly in that same context, each sample timed with [`Instant`].

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sandbox::{parse_program, ExecutionError, Sandbox, SOLUTION_FILE};

/// z-score for a two-sided 95% interval.
const Z_95: f64 = 1.96;

/// Sampling limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Aggregate wall-clock budget, in milliseconds.
    pub budget_ms: u64,
    pub min_samples: usize,
    pub max_samples: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            budget_ms: 250,
            min_samples: 1,
            max_samples: 10_000,
        }
    }
}

impl BenchmarkConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

/// Summary statistics over the collected samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStats {
    /// Sample mean, seconds.
    pub mean_s: f64,
    pub samples: usize,
    /// Sample standard deviation, seconds.
    pub std_dev_s: f64,
    /// Relative margin of error, percent.
    pub rme: f64,
}

impl BenchmarkStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self {
                mean_s: 0.0,
                samples: 0,
                std_dev_s: 0.0,
                rme: 0.0,
            };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let std_dev = if n > 1 {
            let variance =
                samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };
        let sem = std_dev / (n as f64).sqrt();
        let rme = if mean > 0.0 {
            Z_95 * sem / mean * 100.0
        } else {
            0.0
        };
        Self {
            mean_s: mean,
            samples: n,
            std_dev_s: std_dev,
            rme,
        }
    }
}

impl Sandbox {
    /// Measure the mean run time of `call` after loading `source`.
    ///
    /// Takes at least `min_samples` samples and stops once the budget is
    /// spent or `max_samples` is reached. Any throw ends the run with an
    /// error.
    pub fn benchmark(
        &self,
        source: &str,
        call: &str,
        config: &BenchmarkConfig,
    ) -> Result<BenchmarkStats, ExecutionError> {
        let program = parse_program(SOLUTION_FILE, source)?;
        let call_program = parse_program("call.js", call)?;
        let mut interpreter = self.interpreter();
        interpreter.run(&program)?;

        let budget = config.budget();
        let max_samples = config.max_samples.max(1);
        let started = Instant::now();
        let mut samples = Vec::new();
        loop {
            interpreter.reset_gas();
            let sample_start = Instant::now();
            interpreter.run(&call_program)?;
            samples.push(sample_start.elapsed().as_secs_f64());
            // Keep memory flat over long runs.
            interpreter.take_logs();
            let taken = samples.len();
            if taken >= max_samples || (taken >= config.min_samples && started.elapsed() >= budget)
            {
                break;
            }
        }

        let stats = BenchmarkStats::from_samples(&samples);
        debug!(
            call,
            samples = stats.samples,
            mean_s = stats.mean_s,
            rme = stats.rme,
            "benchmark finished"
        );
        Ok(stats)
    }
}
