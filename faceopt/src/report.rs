//! Terminal formatting of sessions, configurations and comparison boards

use chrono::{DateTime, Utc};
use faceopt_core::comparison::{rate, ComparisonBoard, Rating};
use faceopt_core::{Metric, ModelResults, OptimizationConfig, Session, StepStatus, TestResult};

pub fn print_session(session: &Session, now: DateTime<Utc>) {
    println!("Session {}: {}", session.id, session.status);
    if let Some(elapsed) = session.elapsed(now) {
        println!("  Duration: {}", format_duration(elapsed));
    }
    println!(
        "  Steps:    {}/{} completed",
        session.completed_steps(),
        session.steps.len()
    );

    for step in &session.steps {
        let marker = match step.status {
            StepStatus::Completed => "✓",
            StepStatus::Running => "…",
            StepStatus::Error => "✗",
            StepStatus::Pending => " ",
        };
        match &step.error {
            Some(error) => println!("  [{marker}] {} ({error})", step.name),
            None => println!("  [{marker}] {}", step.name),
        }
    }

    if let Some(results) = &session.results {
        println!();
        println!("Results:");
        print_results(results, "  ");
    }
}

pub fn print_results(results: &ModelResults, indent: &str) {
    for metric in Metric::ALL {
        let rating = rate(metric, results.get(metric));
        let suffix = match rating {
            Rating::Unrated => String::new(),
            rating => format!("  ({})", rating.as_str()),
        };
        println!(
            "{indent}{:<14} {}{suffix}",
            metric.as_str(),
            format_metric(metric, results)
        );
    }
}

fn format_metric(metric: Metric, results: &ModelResults) -> String {
    let value = results.get(metric);
    match metric {
        Metric::Loss => format!("{value:.4}"),
        Metric::TrainingTime => format!("{value:.0} min"),
        Metric::ModelSize => format!("{:.1} MiB", results.model_size_mib()),
        Metric::InferenceTime => format!("{value:.1} ms"),
        _ => format!("{:.1}%", value * 100.0),
    }
}

fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.num_milliseconds() as f64 / 1000.0)
    }
}

pub fn print_config(config: &OptimizationConfig) {
    let balancing = &config.data_balancing;
    println!("Data balancing:");
    println!(
        "  Oversampling:  {} (ratio {})",
        balancing.oversampling_technique, balancing.oversampling_ratio
    );
    println!(
        "  Undersampling: {} (ratio {})",
        balancing.undersampling_technique, balancing.undersampling_ratio
    );

    let model = &config.model;
    println!("Model:");
    if let Some(architecture) = &model.architecture {
        println!("  Architecture:  {architecture}");
    }
    println!("  Learning rate: {}", model.learning_rate);
    println!("  Batch size:    {}", model.batch_size);
    println!("  Epochs:        {}", model.epochs);
    println!("  Optimizer:     {}", model.optimizer);
    if let Some(size) = model.input_size {
        println!("  Input size:    {size}");
    }
    if let Some(augmentation) = model.augmentation {
        println!("  Augmentation:  {}", if augmentation { "on" } else { "off" });
    }

    let split = &config.dataset;
    println!("Dataset split:");
    println!(
        "  Train/Val/Test: {}/{}/{}",
        split.train_split, split.validation_split, split.test_split
    );
}

pub fn print_detection(result: &TestResult) {
    println!(
        "{}: {} face(s), mean confidence {:.1}%, {:.1} ms",
        result.image,
        result.detections.len(),
        result.confidence * 100.0,
        result.processing_time
    );
    for (i, detection) in result.detections.iter().enumerate() {
        println!(
            "  #{} {} at ({:.0}, {:.0}) {:.0}x{:.0}, {:.1}%",
            i + 1,
            detection.label,
            detection.x,
            detection.y,
            detection.width,
            detection.height,
            detection.confidence * 100.0
        );
    }
}

pub fn print_board(board: &ComparisonBoard) {
    if board.is_empty() {
        println!("No models to compare");
        return;
    }

    for entry in board.entries() {
        let architecture = entry
            .config
            .model
            .architecture
            .as_deref()
            .unwrap_or("RetinaFace-Ghost");
        println!(
            "{} [{}, lr {}, batch {}]",
            entry.name, architecture, entry.config.model.learning_rate, entry.config.model.batch_size
        );
        print_results(&entry.results, "  ");
        println!();
    }

    if let Some(best) = board.best() {
        println!(
            "Best model: {} (F1 {:.1}%)",
            best.name,
            best.results.f1_score * 100.0
        );
    }
    if let Some(max) = board.max_inference_time() {
        println!("Slowest inference: {max:.1} ms");
    }
}
