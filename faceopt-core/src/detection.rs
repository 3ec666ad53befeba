//! Simulated face detection for the model testing screen.
//!
//! No model is involved: boxes, confidences and timings are random.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::clock::Clock;
use crate::types::{BoundingBox, TestResult};

/// Produces random detections after a simulated processing delay
#[derive(Clone)]
pub struct DetectionSimulator {
    clock: Arc<dyn Clock>,
}

impl DetectionSimulator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// "Detect" faces in `image` (a path or URL, used only as a label)
    pub async fn detect(&self, image: &str) -> TestResult {
        let delay = Duration::from_millis(rand::thread_rng().gen_range(2000..=5000));
        self.clock.sleep(delay).await;

        let result = Self::generate(&mut rand::thread_rng(), image, self.clock.now());
        tracing::debug!(
            image,
            faces = result.detections.len(),
            confidence = result.confidence,
            "Simulated detection"
        );
        result
    }

    /// Build a random result without waiting
    pub fn generate<R: Rng>(
        rng: &mut R,
        image: &str,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> TestResult {
        let count = rng.gen_range(1..=3);
        let detections: Vec<BoundingBox> = (0..count)
            .map(|_| BoundingBox {
                x: rng.gen_range(0.0..400.0),
                y: rng.gen_range(0.0..300.0),
                width: rng.gen_range(80.0..200.0),
                height: rng.gen_range(100.0..250.0),
                confidence: rng.gen_range(0.7..=1.0),
                label: "face".to_string(),
            })
            .collect();

        let confidence =
            detections.iter().map(|d| d.confidence).sum::<f64>() / detections.len() as f64;

        TestResult {
            id: format!("test_{}", uuid::Uuid::new_v4().simple()),
            image: image.to_string(),
            detections,
            processing_time: rng.gen_range(15.0..50.0),
            confidence,
            timestamp,
        }
    }
}
