//! `faceopt run`: drive one session and stream it to the terminal

use anyhow::{anyhow, Context, Result};
use faceopt_core::{
    Clock, Config, JobRunner, OptimizationConfig, Session, SessionStatus, SessionView,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{clock_for, report};

pub async fn cmd_run(
    config: &Config,
    optimization: OptimizationConfig,
    fast: bool,
    json: bool,
) -> Result<()> {
    let runner = JobRunner::builder()
        .clock(clock_for(fast))
        .timing(config.runner)
        .build()
        .context("failed to create runner")?;
    let mut view = SessionView::attach(&runner);

    let stopper = runner.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping...");
        stopper.stop();
    })
    .context("failed to set Ctrl+C handler")?;

    let Some(session_id) = view.request_start(optimization) else {
        let message = view.error().unwrap_or_else(|| "unknown error".to_string());
        return Err(anyhow!("failed to start optimization: {message}"));
    };
    tracing::info!(session_id = %session_id, fast, "Run started");

    let steps = runner.catalog().len() as u64;
    let pb = ProgressBar::new(steps * 100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            .context("invalid progress bar template")?
            .progress_chars("#>-"),
    );
    if json {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let mut printer = LogPrinter::default();
    if let Some(session) = view.session() {
        render(&pb, &mut printer, &session, json);
    }
    while let Some(session) = view.changed().await {
        render(&pb, &mut printer, &session, json);
        if !session.is_running() {
            break;
        }
    }
    runner.wait().await;
    pb.finish_and_clear();

    let session = view
        .session()
        .context("runner finished without a session")?;

    if json {
        let text = serde_json::to_string_pretty(&session).context("failed to encode session")?;
        println!("{text}");
    } else {
        report::print_session(&session, runner.clock().now());
    }

    tracing::info!(session_id = %session.id, status = %session.status, "Run finished");

    match session.status {
        SessionStatus::Completed => Ok(()),
        _ => {
            let reason = session
                .steps
                .iter()
                .find_map(|step| step.error.as_deref())
                .unwrap_or("session did not complete");
            Err(anyhow!("optimization {} ended in error: {reason}", session.id))
        }
    }
}

/// Tracks how many log lines of each step were already printed
#[derive(Default)]
struct LogPrinter {
    printed: Vec<usize>,
}

impl LogPrinter {
    fn print_new(&mut self, pb: &ProgressBar, session: &Session) {
        self.printed.resize(session.steps.len(), 0);
        for (step, printed) in session.steps.iter().zip(self.printed.iter_mut()) {
            if step.logs.len() <= *printed {
                continue;
            }
            // ProgressBar::println drops lines while the bar is hidden
            pb.suspend(|| {
                if *printed == 0 {
                    println!("== {} ==", step.name);
                }
                for line in step.logs.iter().skip(*printed) {
                    println!("  {line}");
                }
            });
            *printed = step.logs.len();
        }
    }
}

fn render(pb: &ProgressBar, printer: &mut LogPrinter, session: &Session, json: bool) {
    let total: u64 = session.steps.iter().map(|s| u64::from(s.progress)).sum();
    pb.set_position(total);
    match session.active_step() {
        Some((_, step)) => pb.set_message(step.name.clone()),
        None => pb.set_message(session.status.to_string()),
    }
    pb.tick();

    if !json {
        printer.print_new(pb, session);
    }
}
