//! Side-by-side comparison of model configurations.

use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::synth::ResultSynthesizer;
use crate::types::{Metric, ModelComparison, ModelResults, OptimizationConfig, Session, SessionStatus};

/// Quality band of a metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Good,
    Fair,
    Poor,
    Unrated,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::Fair => "fair",
            Rating::Poor => "poor",
            Rating::Unrated => "-",
        }
    }
}

/// `(good, fair)` lower bounds for rated metrics
fn thresholds(metric: Metric) -> Option<(f64, f64)> {
    match metric {
        Metric::Precision => Some((0.90, 0.80)),
        Metric::Recall => Some((0.85, 0.75)),
        Metric::F1Score => Some((0.87, 0.80)),
        Metric::MeanAveragePrecision => Some((0.85, 0.75)),
        Metric::Accuracy => Some((0.90, 0.80)),
        _ => None,
    }
}

/// Rate a metric value against the comparison thresholds
pub fn rate(metric: Metric, value: f64) -> Rating {
    match thresholds(metric) {
        Some((good, _)) if value >= good => Rating::Good,
        Some((_, fair)) if value >= fair => Rating::Fair,
        Some(_) => Rating::Poor,
        None => Rating::Unrated,
    }
}

/// Ordered list of compared models
#[derive(Debug, Default, Clone)]
pub struct ComparisonBoard {
    entries: Vec<ModelComparison>,
    added: usize,
}

impl ComparisonBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model with known results; returns its id
    pub fn add(
        &mut self,
        name: impl Into<String>,
        config: OptimizationConfig,
        results: ModelResults,
    ) -> String {
        self.added += 1;
        let id = format!("cmp_{}", uuid::Uuid::new_v4().simple());
        self.entries.push(ModelComparison {
            id: id.clone(),
            name: name.into(),
            config,
            results,
            timestamp: Utc::now(),
        });
        id
    }

    /// Add a model whose results come from `synthesizer`; named `Model N`
    pub fn add_synthesized(
        &mut self,
        config: OptimizationConfig,
        synthesizer: &dyn ResultSynthesizer,
    ) -> Result<String> {
        let probe = Session {
            id: format!("comparison_{}", self.added + 1),
            config: config.clone(),
            status: SessionStatus::Completed,
            steps: Vec::new(),
            started_at: None,
            ended_at: None,
            results: None,
        };
        let results = synthesizer.synthesize(&probe)?;
        let name = format!("Model {}", self.added + 1);
        Ok(self.add(name, config, results))
    }

    /// Add the results of a completed session; `None` if it has none
    pub fn add_session(&mut self, name: impl Into<String>, session: &Session) -> Option<String> {
        let results = session.results?;
        Some(self.add(name, session.config.clone(), results))
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[ModelComparison] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry with the highest F1 score; the earliest wins ties
    pub fn best(&self) -> Option<&ModelComparison> {
        self.entries.iter().fold(None, |best, current| match best {
            Some(b) if b.results.f1_score >= current.results.f1_score => Some(b),
            _ => Some(current),
        })
    }

    /// Largest inference time on the board, for relative bars
    pub fn max_inference_time(&self) -> Option<f64> {
        self.entries
            .iter()
            .map(|entry| entry.results.inference_time)
            .fold(None, |max, value| Some(max.map_or(value, |m: f64| m.max(value))))
    }
}
