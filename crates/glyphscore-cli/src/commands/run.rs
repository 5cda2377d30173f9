//! The `glyphscore run` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use glyphscore_core::config::load_config_from;
use glyphscore_core::engine::{CalibrationEngine, CalibrationEngineConfig, ProgressReporter};
use glyphscore_core::parser;
use glyphscore_core::report::{CalibrationReport, CaseOutcome};
use glyphscore_core::Evaluator;

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_case_start(&self, case_id: &str) {
        eprintln!("  Starting: {case_id}");
    }

    fn on_case_complete(&self, outcome: &CaseOutcome) {
        let status = if outcome.met_expectations() {
            "OK"
        } else {
            "MISS"
        };
        let score = outcome
            .score()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        eprintln!(
            "  Done: {} score {score} [{status}] ({}ms)",
            outcome.case_id, outcome.duration_ms
        );
        for violation in &outcome.violations {
            eprintln!("    - {violation}");
        }
    }

    fn on_case_error(&self, case_id: &str, error: &str) {
        eprintln!("  ERROR: {case_id}: {error}");
    }

    fn on_set_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} evaluated, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    calibration_path: PathBuf,
    parallelism: usize,
    output: PathBuf,
    filter: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(parallelism >= 1, "parallelism must be at least 1");

    let config = load_config_from(config_path.as_deref())?;

    let mut sets = parser::load_calibration_path(&calibration_path)?;
    anyhow::ensure!(
        !sets.is_empty(),
        "no calibration sets found in {}",
        calibration_path.display()
    );

    if let Some(filter_tags) = &filter {
        let tags: Vec<String> = filter_tags.split(',').map(|s| s.trim().to_string()).collect();
        for set in &mut sets {
            set.retain_tags(&tags);
        }
    }

    let engine = CalibrationEngine::new(
        Evaluator::new(config),
        CalibrationEngineConfig { parallelism },
    );
    let reporter = ConsoleReporter;

    std::fs::create_dir_all(&output)?;

    for set in &sets {
        eprintln!(
            "glyphscore v{}: running {} calibration cases from {}",
            env!("CARGO_PKG_VERSION"),
            set.cases.len(),
            set.name
        );
        eprintln!();

        let report = engine.run(set, &reporter).await?;

        print_summary(&report);

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
        let path = output.join(format!("report-{}-{timestamp}.json", set.id));
        report.save_json(&path)?;
        eprintln!("Results saved to: {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &CalibrationReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Case", "Score", "Correct", "Confidence", "Expectations"]);

    for outcome in &report.outcomes {
        let (score, correct, confidence) = match &outcome.result {
            Some(r) if r.is_empty_drawing() => ("empty".to_string(), "no", "-".to_string()),
            Some(r) => (
                r.overall_score.to_string(),
                if r.is_correct { "yes" } else { "no" },
                format!("{:.2}", r.confidence),
            ),
            None => ("error".to_string(), "-", "-".to_string()),
        };
        let expectations = if outcome.met_expectations() {
            "met"
        } else {
            "MISSED"
        };
        table.add_row(vec![
            Cell::new(&outcome.case_id),
            Cell::new(score),
            Cell::new(correct),
            Cell::new(confidence),
            Cell::new(expectations),
        ]);
    }

    let stats = &report.aggregate;
    eprintln!("\n{table}");
    eprintln!(
        "Mean score {:.1}, pass rate {:.1}%, expectations met {}/{}",
        stats.mean_score,
        stats.pass_rate * 100.0,
        stats.expectations_met,
        stats.total_cases
    );
}
