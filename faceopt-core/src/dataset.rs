//! Reference statistics of the face-detection dataset shown on the preview screen.

use serde::Serialize;

use crate::types::DatasetSplit;

/// Image and label counts of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStats {
    pub total_images: u64,
    pub train_images: u64,
    pub val_images: u64,
    pub test_images: u64,
    pub total_faces: u64,
    pub background_samples: u64,
}

/// Image counts for a configured split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub train: u64,
    pub validation: u64,
    pub test: u64,
}

impl DatasetStats {
    pub fn reference() -> Self {
        Self {
            total_images: 15_420,
            train_images: 10_794,
            val_images: 3_084,
            test_images: 1_542,
            total_faces: 18_650,
            background_samples: 45_230,
        }
    }

    pub fn avg_faces_per_image(&self) -> f64 {
        if self.total_images == 0 {
            return 0.0;
        }
        self.total_faces as f64 / self.total_images as f64
    }

    /// Share of face samples among all labelled samples
    pub fn face_ratio(&self) -> f64 {
        let total = self.total_faces + self.background_samples;
        if total == 0 {
            return 0.0;
        }
        self.total_faces as f64 / total as f64
    }

    /// Project the image count over `split`.
    ///
    /// Ratios are normalized by their sum so an unbalanced split still
    /// accounts for every image; the test partition takes the rounding rest.
    pub fn split_counts(&self, split: &DatasetSplit) -> SplitCounts {
        let clamp = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        let train = clamp(split.train_split);
        let validation = clamp(split.validation_split);
        let total_ratio = train + validation + clamp(split.test_split);
        if total_ratio == 0.0 {
            return SplitCounts {
                train: 0,
                validation: 0,
                test: self.total_images,
            };
        }

        let images = self.total_images as f64;
        let train = ((train / total_ratio) * images).round() as u64;
        let validation = (((validation / total_ratio) * images).round() as u64)
            .min(self.total_images.saturating_sub(train));
        SplitCounts {
            train,
            validation,
            test: self.total_images - train - validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OptimizationConfig;

    #[test]
    fn test_reference_split_matches_default_config() {
        let stats = DatasetStats::reference();
        let counts = stats.split_counts(&OptimizationConfig::default().dataset);

        assert_eq!(counts.train, stats.train_images);
        assert_eq!(counts.validation, stats.val_images);
        assert_eq!(counts.test, stats.test_images);
    }

    #[test]
    fn test_split_counts_cover_all_images() {
        let stats = DatasetStats::reference();
        let split = DatasetSplit {
            train_split: 0.6,
            validation_split: 0.6,
            test_split: 0.3,
        };
        let counts = stats.split_counts(&split);
        assert_eq!(counts.train + counts.validation + counts.test, stats.total_images);
    }

    #[test]
    fn test_degenerate_split() {
        let stats = DatasetStats::reference();
        let split = DatasetSplit {
            train_split: 0.0,
            validation_split: -1.0,
            test_split: 0.0,
        };
        assert_eq!(stats.split_counts(&split).test, stats.total_images);
    }

    #[test]
    fn test_averages() {
        let stats = DatasetStats::reference();
        assert!((stats.avg_faces_per_image() - 1.21).abs() < 0.01);
        assert!(stats.face_ratio() > 0.0 && stats.face_ratio() < 1.0);
    }
}
