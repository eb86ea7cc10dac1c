use std::env;
use std::fs;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;

use exam_grader::core::config::parse_percent;
use exam_grader::core::telemetry;
use exam_grader::grading::{
    grade_submission, PassPolicy, Question, SubmittedAnswer, DEFAULT_PASS_THRESHOLD_PERCENT,
};

#[derive(Debug, PartialEq)]
struct Args {
    exam_path: String,
    answers_path: String,
    threshold: f64,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("grade-file: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_stderr_tracing("warn")?;

    let args = parse_args(env::args().skip(1), env::var("PASS_THRESHOLD_PERCENT").ok())?;

    let questions: Vec<Question> = read_json(&args.exam_path)?;
    let answers: Vec<SubmittedAnswer> = read_json(&args.answers_path)?;
    tracing::debug!(
        exam = %args.exam_path,
        questions = questions.len(),
        answers = answers.len(),
        threshold = args.threshold,
        "Grading file"
    );

    let result = grade_submission(&questions, &answers, &PassPolicy::new(args.threshold))
        .map_err(|err| {
            tracing::warn!(question_id = %err.question_id(), error = %err, "Submission rejected");
            anyhow!("submission rejected: {err}")
        })?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let payload = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&payload).with_context(|| format!("Invalid JSON in {path}"))
}

/// `--threshold` overrides `PASS_THRESHOLD_PERCENT`; a malformed value from either is an error,
/// a blank variable counts as unset.
fn parse_args<I>(args: I, env_threshold: Option<String>) -> Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut exam_path = None;
    let mut answers_path = None;
    let mut threshold = match env_threshold.filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => parse_percent("PASS_THRESHOLD_PERCENT", raw)?,
        None => DEFAULT_PASS_THRESHOLD_PERCENT,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--exam" => {
                exam_path = Some(args.next().ok_or_else(|| anyhow!("--exam missing value"))?);
            }
            "--answers" => {
                answers_path = Some(args.next().ok_or_else(|| anyhow!("--answers missing value"))?);
            }
            "--threshold" => {
                let raw = args.next().ok_or_else(|| anyhow!("--threshold missing value"))?;
                threshold = parse_percent("--threshold", raw)?;
            }
            _ => return Err(anyhow!("Unknown argument: {arg}")),
        }
    }

    Ok(Args {
        exam_path: exam_path.ok_or_else(|| anyhow!("--exam is required"))?,
        answers_path: answers_path.ok_or_else(|| anyhow!("--answers is required"))?,
        threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn threshold_defaults_then_env_then_flag() {
        let base = args(&["--exam", "exam.json", "--answers", "answers.json"]);

        let parsed = parse_args(base.clone(), None).unwrap();
        assert_eq!(parsed.threshold, DEFAULT_PASS_THRESHOLD_PERCENT);
        assert_eq!(parsed.exam_path, "exam.json");

        let parsed = parse_args(base.clone(), Some("70%".into())).unwrap();
        assert_eq!(parsed.threshold, 70.0);
        let parsed = parse_args(base.clone(), Some("  ".into())).unwrap();
        assert_eq!(parsed.threshold, DEFAULT_PASS_THRESHOLD_PERCENT);

        let mut with_flag = base;
        with_flag.extend(args(&["--threshold", "80"]));
        assert_eq!(parse_args(with_flag, Some("70".into())).unwrap().threshold, 80.0);
    }

    #[test]
    fn malformed_env_threshold_is_an_error() {
        let base = args(&["--exam", "exam.json", "--answers", "answers.json"]);

        for raw in ["sixty", "150", "NaN"] {
            let err = parse_args(base.clone(), Some(raw.into())).unwrap_err();
            assert!(
                err.to_string().contains("PASS_THRESHOLD_PERCENT"),
                "{raw:?} should name the variable, got {err}"
            );
        }
    }

    #[test]
    fn malformed_flag_threshold_is_an_error() {
        let raw = args(&["--exam", "e", "--answers", "a", "--threshold", "-5"]);
        assert!(parse_args(raw, None).is_err());
        assert!(parse_args(args(&["--exam", "e"]), None).is_err());
        assert!(parse_args(args(&["--exam", "e", "--answers", "a", "--verbose"]), None).is_err());
    }
}
