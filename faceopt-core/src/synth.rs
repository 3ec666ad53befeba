//! Result synthesizers.
//!
//! The runner asks a [`ResultSynthesizer`] for the final metrics once every
//! step has completed. The default one draws random values inside each
//! metric's plausible range; a real evaluator can be plugged in without
//! touching the runner.

use rand::Rng;

use crate::error::Result;
use crate::types::{Metric, ModelResults, Session};

/// Produces the aggregate metrics for a finished session
pub trait ResultSynthesizer: Send + Sync {
    fn synthesize(&self, session: &Session) -> Result<ModelResults>;
}

/// Uniform random metrics within [`Metric::range`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSynthesizer;

impl RandomSynthesizer {
    /// Draw one set of results with the given generator
    pub fn draw<R: Rng>(rng: &mut R) -> ModelResults {
        let mut sample = |metric: Metric| {
            let (min, max) = metric.range();
            rng.gen_range(min..=max)
        };

        ModelResults {
            precision: sample(Metric::Precision),
            recall: sample(Metric::Recall),
            f1_score: sample(Metric::F1Score),
            mean_average_precision: sample(Metric::MeanAveragePrecision),
            accuracy: sample(Metric::Accuracy),
            loss: sample(Metric::Loss),
            training_time: sample(Metric::TrainingTime),
            model_size: sample(Metric::ModelSize),
            inference_time: sample(Metric::InferenceTime),
        }
    }
}

impl ResultSynthesizer for RandomSynthesizer {
    fn synthesize(&self, session: &Session) -> Result<ModelResults> {
        let results = Self::draw(&mut rand::thread_rng());
        tracing::debug!(
            session_id = %session.id,
            f1 = results.f1_score,
            map = results.mean_average_precision,
            "Synthesized results"
        );
        Ok(results)
    }
}

/// Always returns the same results
#[derive(Debug, Clone, Copy)]
pub struct FixedSynthesizer(pub ModelResults);

impl ResultSynthesizer for FixedSynthesizer {
    fn synthesize(&self, _session: &Session) -> Result<ModelResults> {
        Ok(self.0)
    }
}
