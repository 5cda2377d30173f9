//! Calibration batch engine.
//!
//! Runs every case of a calibration set through the evaluator, with bounded
//! parallelism. Scoring is CPU-bound, so each case runs on the blocking pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::EvalError;
use crate::evaluator::Evaluator;
use crate::model::{CalibrationCase, CalibrationSet, EvaluationRequest, EvaluationResult};
use crate::preprocess::RawImage;
use crate::report::{CalibrationReport, CalibrationSetSummary, CaseOutcome};
use crate::statistics::compute_aggregate_stats;

/// Configuration for the calibration engine.
#[derive(Debug, Clone)]
pub struct CalibrationEngineConfig {
    /// Maximum concurrent evaluations.
    pub parallelism: usize,
}

impl Default for CalibrationEngineConfig {
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_case_start(&self, case_id: &str);
    fn on_case_complete(&self, outcome: &CaseOutcome);
    fn on_case_error(&self, case_id: &str, error: &str);
    fn on_set_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_case_start(&self, _: &str) {}
    fn on_case_complete(&self, _: &CaseOutcome) {}
    fn on_case_error(&self, _: &str, _: &str) {}
    fn on_set_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Runs calibration sets against one evaluator configuration.
pub struct CalibrationEngine {
    evaluator: Arc<Evaluator>,
    config: CalibrationEngineConfig,
}

impl CalibrationEngine {
    pub fn new(evaluator: Evaluator, config: CalibrationEngineConfig) -> Self {
        Self {
            evaluator: Arc::new(evaluator),
            config,
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Evaluate every case in the set and collect the outcomes into a report.
    ///
    /// Per-case failures (unreadable images, evaluation errors) are recorded
    /// on the outcome; they do not abort the run.
    pub async fn run(
        &self,
        set: &CalibrationSet,
        progress: &dyn ProgressReporter,
    ) -> Result<CalibrationReport> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        tracing::info!(
            set = %set.id,
            cases = set.cases.len(),
            parallelism = self.config.parallelism,
            "starting calibration run"
        );

        let mut futures = FuturesUnordered::new();

        for (index, case) in set.cases.iter().enumerate() {
            let evaluator = Arc::clone(&self.evaluator);
            let semaphore = Arc::clone(&semaphore);
            let case = case.clone();

            futures.push(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| anyhow::anyhow!("semaphore closed"))?;

                progress.on_case_start(&case.id);
                let case_start = Instant::now();
                let case_id = case.id.clone();
                let tags = case.tags.clone();
                let expectations = case.expectations.clone();

                let evaluated =
                    tokio::task::spawn_blocking(move || evaluate_case(&evaluator, &case))
                        .await
                        .map_err(|e| anyhow::anyhow!("evaluation task failed: {e}"))?;

                let (result, error, violations) = match evaluated {
                    Ok(result) => {
                        let violations = expectations.violations(&result);
                        (Some(result), None, violations)
                    }
                    Err(e) => (None, Some(e.to_string()), vec![]),
                };

                anyhow::Ok((
                    index,
                    CaseOutcome {
                        case_id,
                        tags,
                        result,
                        error,
                        violations,
                        duration_ms: case_start.elapsed().as_millis() as u64,
                    },
                ))
            });
        }

        let total = futures.len();
        let mut indexed = Vec::with_capacity(total);
        let mut completed = 0usize;
        let mut failed = 0usize;

        while let Some(next) = futures.next().await {
            let (index, outcome) = next?;
            match &outcome.error {
                None => {
                    progress.on_case_complete(&outcome);
                    completed += 1;
                }
                Some(e) => {
                    tracing::error!(case_id = %outcome.case_id, "case failed: {e}");
                    progress.on_case_error(&outcome.case_id, e);
                    failed += 1;
                }
            }
            indexed.push((index, outcome));
        }

        let elapsed = start.elapsed();
        progress.on_set_complete(total, completed, failed, elapsed);

        indexed.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<CaseOutcome> = indexed.into_iter().map(|(_, o)| o).collect();
        let aggregate = compute_aggregate_stats(&outcomes);

        tracing::info!(
            set = %set.id,
            completed,
            failed,
            expectations_met = aggregate.expectations_met,
            elapsed_ms = elapsed.as_millis() as u64,
            "calibration run finished"
        );

        Ok(CalibrationReport {
            id: run_id,
            created_at: chrono::Utc::now(),
            calibration_set: CalibrationSetSummary {
                id: set.id.clone(),
                name: set.name.clone(),
                case_count: set.cases.len(),
            },
            config: self.evaluator.config().clone(),
            outcomes,
            aggregate,
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}

fn evaluate_case(
    evaluator: &Evaluator,
    case: &CalibrationCase,
) -> Result<EvaluationResult, EvalError> {
    let user = RawImage::open(&case.user_image)?;
    let reference = RawImage::open(&case.reference_image)?;

    let mut request = EvaluationRequest::new(user, reference).with_meta(case.meta.clone());
    if let Some(score) = case.passing_score {
        request = request.with_passing_score(score);
    }
    evaluator.evaluate(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CharacterMeta, Expectations};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// A thick plus sign, offset by `dx` pixels.
    fn write_cross(path: &Path, dx: i64) {
        let img = image::GrayImage::from_fn(128, 128, |x, y| {
            let (x, y) = (x as i64 - dx, y as i64);
            let vertical = (59..69).contains(&x) && (24..104).contains(&y);
            let horizontal = (24..104).contains(&x) && (59..69).contains(&y);
            image::Luma([if vertical || horizontal { 0 } else { 255 }])
        });
        img.save(path).unwrap();
    }

    fn write_blank(path: &Path) {
        image::GrayImage::from_pixel(128, 128, image::Luma([255]))
            .save(path)
            .unwrap();
    }

    fn case(
        id: &str,
        user: PathBuf,
        reference: PathBuf,
        expectations: Expectations,
    ) -> CalibrationCase {
        CalibrationCase {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            user_image: user,
            reference_image: reference,
            meta: CharacterMeta::new("十", "kanji-1"),
            passing_score: None,
            tags: vec!["kanji".into()],
            expectations,
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        started: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
        summary: Mutex<Option<(usize, usize, usize)>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn on_case_start(&self, case_id: &str) {
            self.started.lock().unwrap().push(case_id.into());
        }
        fn on_case_complete(&self, _: &CaseOutcome) {}
        fn on_case_error(&self, case_id: &str, _: &str) {
            self.errors.lock().unwrap().push(case_id.into());
        }
        fn on_set_complete(&self, total: usize, completed: usize, failed: usize, _: Duration) {
            *self.summary.lock().unwrap() = Some((total, completed, failed));
        }
    }

    #[tokio::test]
    async fn runs_cases_and_keeps_case_order() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("ref.png");
        let shifted = dir.path().join("shifted.png");
        let blank = dir.path().join("blank.png");
        write_cross(&reference, 0);
        write_cross(&shifted, 30);
        write_blank(&blank);

        let set = CalibrationSet {
            id: "engine-test".into(),
            name: "Engine test".into(),
            description: String::new(),
            cases: vec![
                case(
                    "identity",
                    reference.clone(),
                    reference.clone(),
                    Expectations {
                        min_score: Some(95),
                        expect_correct: Some(true),
                        ..Default::default()
                    },
                ),
                case(
                    "shifted",
                    shifted,
                    reference.clone(),
                    Expectations {
                        max_score: Some(80),
                        ..Default::default()
                    },
                ),
                case(
                    "blank",
                    blank,
                    reference.clone(),
                    Expectations {
                        expect_empty: Some(true),
                        max_score: Some(0),
                        ..Default::default()
                    },
                ),
                case(
                    "missing",
                    dir.path().join("nope.png"),
                    reference,
                    Expectations::default(),
                ),
            ],
        };

        let engine = CalibrationEngine::new(
            Evaluator::default(),
            CalibrationEngineConfig { parallelism: 2 },
        );
        let reporter = RecordingReporter::default();
        let report = engine.run(&set, &reporter).await.unwrap();

        let ids: Vec<_> = report.outcomes.iter().map(|o| o.case_id.as_str()).collect();
        assert_eq!(ids, vec!["identity", "shifted", "blank", "missing"]);

        let identity = &report.outcomes[0];
        assert!(identity.met_expectations(), "{:?}", identity.violations);
        assert!(identity.score().unwrap() >= 95);

        assert!(report.outcomes[1].met_expectations(), "{:?}", report.outcomes[1]);
        assert!(report.outcomes[2].result.as_ref().unwrap().is_empty_drawing());
        assert!(report.outcomes[2].met_expectations());

        let missing = &report.outcomes[3];
        assert!(missing.result.is_none());
        assert!(missing.error.is_some());
        assert!(!missing.met_expectations());

        assert_eq!(report.aggregate.total_cases, 4);
        assert_eq!(report.aggregate.errors, 1);
        assert_eq!(report.aggregate.expectations_met, 3);
        assert_eq!(report.calibration_set.case_count, 4);

        assert_eq!(reporter.started.lock().unwrap().len(), 4);
        assert_eq!(*reporter.errors.lock().unwrap(), vec!["missing".to_string()]);
        assert_eq!(*reporter.summary.lock().unwrap(), Some((4, 3, 1)));
    }

    #[tokio::test]
    async fn violated_expectations_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("ref.png");
        write_cross(&reference, 0);

        let mut strict = case(
            "too-strict",
            reference.clone(),
            reference,
            Expectations {
                max_score: Some(10),
                ..Default::default()
            },
        );
        strict.passing_score = Some(100);

        let set = CalibrationSet {
            id: "strict".into(),
            name: "Strict".into(),
            description: String::new(),
            cases: vec![strict],
        };

        let engine =
            CalibrationEngine::new(Evaluator::default(), CalibrationEngineConfig::default());
        let report = engine.run(&set, &NoopReporter).await.unwrap();

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.violations.len(), 1);
        assert!(outcome.violations[0].contains("above max_score 10"));
        assert_eq!(report.aggregate.expectations_met, 0);
    }

    #[tokio::test]
    async fn empty_set_produces_empty_report() {
        let set = CalibrationSet {
            id: "empty".into(),
            name: "Empty".into(),
            description: String::new(),
            cases: vec![],
        };
        let engine =
            CalibrationEngine::new(Evaluator::default(), CalibrationEngineConfig::default());
        let report = engine.run(&set, &NoopReporter).await.unwrap();
        assert!(report.outcomes.is_empty());
        assert_eq!(report.aggregate.total_cases, 0);
    }
}
