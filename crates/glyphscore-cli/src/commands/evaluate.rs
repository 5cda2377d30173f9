//! The `glyphscore evaluate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use glyphscore_core::config::load_config_from;
use glyphscore_core::feedback::ScoreBand;
use glyphscore_core::{CharacterMeta, EvaluationRequest, EvaluationResult, Evaluator, RawImage};

use crate::EvaluateFormat;

pub struct EvaluateArgs {
    pub user: PathBuf,
    pub reference: PathBuf,
    pub character_id: Option<String>,
    pub lesson_id: Option<String>,
    pub passing_score: Option<u32>,
    pub config: Option<PathBuf>,
    pub format: EvaluateFormat,
}

pub fn execute(args: EvaluateArgs) -> Result<()> {
    if let Some(score) = args.passing_score {
        anyhow::ensure!(score <= 100, "passing score must be between 0 and 100");
    }

    let config = load_config_from(args.config.as_deref())?;
    let evaluator = Evaluator::new(config);

    let user = RawImage::open(&args.user).context("failed to load user drawing")?;
    let reference = RawImage::open(&args.reference).context("failed to load reference image")?;

    let mut request = EvaluationRequest::new(user, reference).with_meta(CharacterMeta {
        character_id: args.character_id,
        lesson_id: args.lesson_id,
    });
    if let Some(score) = args.passing_score {
        request = request.with_passing_score(score);
    }

    let result = evaluator
        .evaluate(request)
        .context("evaluation failed")?;

    match args.format {
        EvaluateFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        EvaluateFormat::Text => print_result(&result),
    }

    Ok(())
}

fn print_result(result: &EvaluationResult) {
    if result.is_empty_drawing() {
        println!("Score: 0/100 (empty drawing)");
        println!("{}", result.feedback_message);
        for tip in &result.improvement_tips {
            println!("  - {tip}");
        }
        return;
    }

    let verdict = if result.is_correct { "PASS" } else { "FAIL" };
    println!(
        "Score: {}/100 ({}, {verdict}, confidence {:.2})",
        result.overall_score,
        ScoreBand::from_score(result.overall_score),
        result.confidence
    );

    let b = &result.breakdown;
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Score"]);
    for (name, value) in [
        ("Shape", b.shape_accuracy),
        ("Edge match", b.edge_match),
        ("Alignment", b.alignment_accuracy),
        ("Proportion", b.proportion_accuracy),
    ] {
        table.add_row(vec![Cell::new(name), Cell::new(format!("{value:.2}"))]);
    }
    println!("{table}");

    println!("{}", result.feedback_message);
    for tip in &result.improvement_tips {
        println!("  - {tip}");
    }
    if let Some(line) = &result.encouragement {
        println!("{line}");
    }
}
