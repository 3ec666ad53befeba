//! Core domain types for faceopt
//!
//! These types describe one simulated optimization run of the face-detection
//! model and everything the presentation layers read from it.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One end-to-end run of the simulated pipeline |
//! | **Step** | One named stage of a Session with its own status, progress and log trace |
//! | **Results** | Synthesized quality/performance metrics attached to a completed Session |
//! | **Config** | The caller-supplied [`OptimizationConfig`], stored verbatim and echoed back |
//!
//! Nothing in here is computed from real data. Results are produced by a
//! [`crate::synth::ResultSynthesizer`] and every step log line comes from the
//! static [`crate::catalog`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Configuration payload
// ============================================

/// Configuration of one optimization run.
///
/// The runner never interprets these fields; they are passed through to the
/// session, echoed back on completion and written into exported documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationConfig {
    pub data_balancing: DataBalancing,
    pub model: ModelParams,
    pub dataset: DatasetSplit,
}

/// Data-balancing parameters (technique names are free-form)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataBalancing {
    pub oversampling_technique: String,
    pub undersampling_technique: String,
    pub oversampling_ratio: f64,
    pub undersampling_ratio: f64,
}

/// Model hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParams {
    pub learning_rate: f64,
    pub batch_size: u32,
    pub epochs: u32,
    pub optimizer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub augmentation: Option<bool>,
}

/// Train/validation/test split ratios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSplit {
    pub train_split: f64,
    pub validation_split: f64,
    pub test_split: f64,
}

impl DatasetSplit {
    /// Sum of the three ratios
    pub fn total(&self) -> f64 {
        self.train_split + self.validation_split + self.test_split
    }

    /// Advisory check: ratios are non-negative and sum to 1.0 within 0.01.
    ///
    /// The runner does not enforce this.
    pub fn is_balanced(&self) -> bool {
        self.train_split >= 0.0
            && self.validation_split >= 0.0
            && self.test_split >= 0.0
            && (self.total() - 1.0).abs() <= 0.01
    }
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            data_balancing: DataBalancing {
                oversampling_technique: "SMOTE".to_string(),
                undersampling_technique: "RandomUnderSampler".to_string(),
                oversampling_ratio: 1.5,
                undersampling_ratio: 0.8,
            },
            model: ModelParams {
                learning_rate: 0.001,
                batch_size: 32,
                epochs: 50,
                optimizer: "Adam".to_string(),
                architecture: None,
                input_size: None,
                augmentation: None,
            },
            dataset: DatasetSplit {
                train_split: 0.7,
                validation_split: 0.2,
                test_split: 0.1,
            },
        }
    }
}

impl OptimizationConfig {
    /// Preset used when adding a model to the comparison board
    pub fn comparison_preset() -> Self {
        let mut config = Self::default();
        config.model.architecture = Some("MobileNetV3".to_string());
        config.model.input_size = Some(416);
        config.model.augmentation = Some(true);
        config
    }
}

// ============================================
// Session & Steps
// ============================================

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }

    /// `completed` and `error` are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Error)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One stage of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Catalog identifier (e.g. `balancing`)
    pub id: String,
    /// Display name
    pub name: String,
    pub status: StepStatus,
    /// 0-100, non-decreasing while running
    pub progress: u8,
    /// Timestamped log lines, append-only
    pub logs: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Step {
    /// A fresh `pending` step with no progress and no logs
    pub fn pending(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: StepStatus::Pending,
            progress: 0,
            logs: Vec::new(),
            started_at: None,
            ended_at: None,
            error: None,
        }
    }
}

/// One end-to-end run of the simulated pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub config: OptimizationConfig,
    pub status: SessionStatus,
    /// Fixed cardinality and order for the lifetime of the session
    pub steps: Vec<Step>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Present only once the session is `completed`
    pub results: Option<ModelResults>,
}

impl Session {
    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Index and value of the step currently `running`, if any
    pub fn active_step(&self) -> Option<(usize, &Step)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, step)| step.status == StepStatus::Running)
    }

    /// Mean progress across all steps (0-100)
    pub fn overall_progress(&self) -> u8 {
        if self.steps.is_empty() {
            return 0;
        }
        let sum: u32 = self.steps.iter().map(|s| u32::from(s.progress)).sum();
        (sum / self.steps.len() as u32) as u8
    }

    /// Wall time between start and end (or `now` while still running)
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        let start = self.started_at?;
        Some(self.ended_at.unwrap_or(now) - start)
    }

    /// Number of steps that reached `completed`
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }
}

// ============================================
// Results
// ============================================

/// Named metrics reported for a completed session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Precision,
    Recall,
    F1Score,
    MeanAveragePrecision,
    Accuracy,
    Loss,
    TrainingTime,
    ModelSize,
    InferenceTime,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::Precision,
        Metric::Recall,
        Metric::F1Score,
        Metric::MeanAveragePrecision,
        Metric::Accuracy,
        Metric::Loss,
        Metric::TrainingTime,
        Metric::ModelSize,
        Metric::InferenceTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::F1Score => "f1Score",
            Metric::MeanAveragePrecision => "mAP",
            Metric::Accuracy => "accuracy",
            Metric::Loss => "loss",
            Metric::TrainingTime => "trainingTime",
            Metric::ModelSize => "modelSize",
            Metric::InferenceTime => "inferenceTime",
        }
    }

    /// Plausible `(min, max)` range for synthesized values
    pub fn range(&self) -> (f64, f64) {
        match self {
            Metric::Precision => (0.87, 0.97),
            Metric::Recall => (0.84, 0.94),
            Metric::F1Score => (0.85, 0.95),
            Metric::MeanAveragePrecision => (0.82, 0.92),
            Metric::Accuracy => (0.88, 0.97),
            Metric::Loss => (0.05, 0.25),
            // minutes
            Metric::TrainingTime => (30.0, 180.0),
            // bytes
            Metric::ModelSize => (3.0 * MIB, 12.0 * MIB),
            // milliseconds
            Metric::InferenceTime => (8.0, 30.0),
        }
    }

    /// True for metrics that are ratios in 0..=1
    pub fn is_ratio(&self) -> bool {
        !matches!(
            self,
            Metric::TrainingTime | Metric::ModelSize | Metric::InferenceTime
        )
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const MIB: f64 = 1024.0 * 1024.0;

/// Synthesized aggregate metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelResults {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1Score")]
    pub f1_score: f64,
    #[serde(rename = "mAP")]
    pub mean_average_precision: f64,
    pub accuracy: f64,
    pub loss: f64,
    /// Minutes
    #[serde(rename = "trainingTime")]
    pub training_time: f64,
    /// Bytes
    #[serde(rename = "modelSize")]
    pub model_size: f64,
    /// Milliseconds per image
    #[serde(rename = "inferenceTime")]
    pub inference_time: f64,
}

impl ModelResults {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Precision => self.precision,
            Metric::Recall => self.recall,
            Metric::F1Score => self.f1_score,
            Metric::MeanAveragePrecision => self.mean_average_precision,
            Metric::Accuracy => self.accuracy,
            Metric::Loss => self.loss,
            Metric::TrainingTime => self.training_time,
            Metric::ModelSize => self.model_size,
            Metric::InferenceTime => self.inference_time,
        }
    }

    /// First metric (if any) outside its documented range
    pub fn validate(&self) -> Option<Metric> {
        Metric::ALL.into_iter().find(|metric| {
            let value = self.get(*metric);
            let (min, max) = metric.range();
            !value.is_finite() || value < min || value > max
        })
    }

    /// Model size in MiB, for display
    pub fn model_size_mib(&self) -> f64 {
        self.model_size / MIB
    }
}

// ============================================
// Detection & comparison records
// ============================================

/// Axis-aligned box around one detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
    pub label: String,
}

/// Outcome of one simulated detection pass over an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub image: String,
    pub detections: Vec<BoundingBox>,
    /// Milliseconds
    pub processing_time: f64,
    /// Mean confidence across detections
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// A named model configuration with its results, as listed on the comparison board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub id: String,
    pub name: String,
    pub config: OptimizationConfig,
    pub results: ModelResults,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midpoint_results() -> ModelResults {
        let mid = |m: Metric| {
            let (min, max) = m.range();
            (min + max) / 2.0
        };
        ModelResults {
            precision: mid(Metric::Precision),
            recall: mid(Metric::Recall),
            f1_score: mid(Metric::F1Score),
            mean_average_precision: mid(Metric::MeanAveragePrecision),
            accuracy: mid(Metric::Accuracy),
            loss: mid(Metric::Loss),
            training_time: mid(Metric::TrainingTime),
            model_size: mid(Metric::ModelSize),
            inference_time: mid(Metric::InferenceTime),
        }
    }

    #[test]
    fn test_default_config_matches_dashboard_preset() {
        let config = OptimizationConfig::default();
        assert_eq!(config.data_balancing.oversampling_technique, "SMOTE");
        assert_eq!(config.model.batch_size, 32);
        assert!(config.model.architecture.is_none());
        assert!(config.dataset.is_balanced());
    }

    #[test]
    fn test_config_serializes_camel_case() {
        let json = serde_json::to_value(OptimizationConfig::comparison_preset()).unwrap();
        assert_eq!(json["dataBalancing"]["oversamplingRatio"], 1.5);
        assert_eq!(json["model"]["inputSize"], 416);
        assert_eq!(json["dataset"]["validationSplit"], 0.2);
    }

    #[test]
    fn test_optional_model_fields_are_omitted() {
        let json = serde_json::to_value(OptimizationConfig::default()).unwrap();
        assert!(json["model"].get("architecture").is_none());
        assert!(json["model"].get("augmentation").is_none());
    }

    #[test]
    fn test_split_balance_is_advisory() {
        let split = DatasetSplit {
            train_split: 0.8,
            validation_split: 0.3,
            test_split: 0.1,
        };
        assert!(!split.is_balanced());
        assert!((split.total() - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_results_validate_detects_out_of_range() {
        let mut results = midpoint_results();
        assert_eq!(results.validate(), None);

        results.recall = 1.5;
        assert_eq!(results.validate(), Some(Metric::Recall));
    }

    #[test]
    fn test_results_serialize_dashboard_keys() {
        let json = serde_json::to_value(midpoint_results()).unwrap();
        for metric in Metric::ALL {
            assert!(json.get(metric.as_str()).is_some(), "missing {metric}");
        }
    }

    #[test]
    fn test_session_helpers() {
        let mut steps = vec![Step::pending("a", "A"), Step::pending("b", "B")];
        steps[0].status = StepStatus::Completed;
        steps[0].progress = 100;
        steps[1].status = StepStatus::Running;
        steps[1].progress = 40;

        let session = Session {
            id: "opt_test".to_string(),
            config: OptimizationConfig::default(),
            status: SessionStatus::Running,
            steps,
            started_at: Some(Utc::now()),
            ended_at: None,
            results: None,
        };

        assert!(session.is_running());
        assert_eq!(session.active_step().map(|(i, _)| i), Some(1));
        assert_eq!(session.overall_progress(), 70);
        assert_eq!(session.completed_steps(), 1);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(SessionStatus::default(), SessionStatus::Idle);
        assert_eq!(StepStatus::Running.to_string(), "running");
        assert!(SessionStatus::Error.is_terminal());
        assert!(!StepStatus::Pending.is_terminal());
    }
}
