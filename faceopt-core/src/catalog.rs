//! Static step catalog for the optimization pipeline.
//!
//! Each entry fixes a step's identity and the scripted log lines the runner
//! emits while the step is running.

use crate::types::Step;

/// One stage of the pipeline and its log script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub script: &'static [&'static str],
}

/// Script used for steps that declare no lines of their own
pub const FALLBACK_SCRIPT: &[&str] = &["Processing...", "Done!"];

impl StepDefinition {
    /// The lines emitted for this step, never empty
    pub fn lines(&self) -> &'static [&'static str] {
        if self.script.is_empty() {
            FALLBACK_SCRIPT
        } else {
            self.script
        }
    }

    pub fn to_step(&self) -> Step {
        Step::pending(self.id, self.name)
    }
}

/// The six-stage face-detection optimization pipeline
pub const DEFAULT_CATALOG: &[StepDefinition] = &[
    StepDefinition {
        id: "setup",
        name: "Model Setup & Analysis",
        script: &[
            "Downloading RetinaFace-Ghost model...",
            "Loading MobileNetV3 pre-trained weights...",
            "Analyzing model architecture...",
            "Evaluating baseline performance...",
            "Setup complete!",
        ],
    },
    StepDefinition {
        id: "dataset",
        name: "Dataset Preparation",
        script: &[
            "Loading face detection dataset...",
            "Analyzing class distribution...",
            "Splitting dataset (train/val/test)...",
            "Building data pipeline...",
            "Dataset ready!",
        ],
    },
    StepDefinition {
        id: "balancing",
        name: "Data Balancing",
        script: &[
            "Applying SMOTE oversampling...",
            "Applying undersampling...",
            "Balancing class distribution...",
            "Validating balanced dataset...",
            "Data balancing complete!",
        ],
    },
    StepDefinition {
        id: "training",
        name: "Model Fine-tuning",
        script: &[
            "Setting up transfer learning...",
            "Configuring optimizer and learning rate...",
            "Starting model fine-tuning...",
            "Monitoring training metrics...",
            "Fine-tuning complete!",
        ],
    },
    StepDefinition {
        id: "evaluation",
        name: "Performance Evaluation",
        script: &[
            "Computing precision and recall...",
            "Computing F1-score and mAP...",
            "Analyzing confusion matrix...",
            "Comparing against baseline...",
            "Evaluation complete!",
        ],
    },
    StepDefinition {
        id: "deployment",
        name: "Model Deployment",
        script: &[
            "Converting model to deployment format...",
            "Optimizing inference speed...",
            "Setting up model serving...",
            "Testing API endpoints...",
            "Deployment complete!",
        ],
    },
];

/// Build the initial (all `pending`) step list for a catalog
pub fn initial_steps(catalog: &[StepDefinition]) -> Vec<Step> {
    catalog.iter().map(StepDefinition::to_step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepStatus;

    #[test]
    fn test_default_catalog_shape() {
        assert_eq!(DEFAULT_CATALOG.len(), 6);
        let ids: Vec<_> = DEFAULT_CATALOG.iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            ["setup", "dataset", "balancing", "training", "evaluation", "deployment"]
        );
        assert!(DEFAULT_CATALOG.iter().all(|d| d.lines().len() == 5));
    }

    #[test]
    fn test_empty_script_uses_fallback() {
        let def = StepDefinition {
            id: "extra",
            name: "Extra",
            script: &[],
        };
        assert_eq!(def.lines(), FALLBACK_SCRIPT);
    }

    #[test]
    fn test_initial_steps_are_pending() {
        let steps = initial_steps(DEFAULT_CATALOG);
        assert_eq!(steps.len(), DEFAULT_CATALOG.len());
        for step in &steps {
            assert_eq!(step.status, StepStatus::Pending);
            assert_eq!(step.progress, 0);
            assert!(step.logs.is_empty());
        }
    }
}
