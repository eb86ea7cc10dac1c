use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::grading::QuestionType;
use crate::schemas::{AssemblyMode, ExamDraft};
use crate::services::exam_assembly::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Worker,
    ImportQuestions { path: PathBuf },
    AssembleExam { admin_id: String, draft: ExamDraft },
    ListExams { search: Option<String>, page: u32, limit: u32 },
    ExamResults { admin_id: String, exam_id: String },
}

pub const USAGE: &str = "\
usage: exam-grader [worker]
       exam-grader import-questions <path>
       exam-grader assemble-exam --admin <id> --title <title> \
(--questions <id,id,..> | --random <n> [--type <type>] [--seed <seed>])
       exam-grader list-exams [--search <text>] [--page <n>] [--limit <n>]
       exam-grader exam-results --admin <id> --exam <id>";

/// Parses the arguments that follow the program name.
pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Worker);
    };

    match command.as_str() {
        "worker" => {
            if let Some(extra) = args.next() {
                return Err(anyhow!("Unknown argument: {extra}"));
            }
            Ok(Command::Worker)
        }
        "import-questions" => {
            let path = args.next().ok_or_else(|| anyhow!("import-questions needs a file path"))?;
            if let Some(extra) = args.next() {
                return Err(anyhow!("Unknown argument: {extra}"));
            }
            Ok(Command::ImportQuestions { path: PathBuf::from(path) })
        }
        "assemble-exam" => parse_assemble(args),
        "list-exams" => parse_list_exams(args),
        "exam-results" => parse_exam_results(args),
        other => Err(anyhow!("Unknown command: {other}")),
    }
}

fn parse_assemble(mut args: impl Iterator<Item = String>) -> Result<Command> {
    let mut admin_id = None;
    let mut title = None;
    let mut question_ids: Option<Vec<String>> = None;
    let mut count: Option<usize> = None;
    let mut question_type = None;
    let mut seed = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--admin" => {
                admin_id = Some(args.next().ok_or_else(|| anyhow!("--admin missing value"))?);
            }
            "--title" => {
                title = Some(args.next().ok_or_else(|| anyhow!("--title missing value"))?);
            }
            "--questions" => {
                let raw = args.next().ok_or_else(|| anyhow!("--questions missing value"))?;
                question_ids = Some(
                    raw.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
            }
            "--random" => {
                let raw = args.next().ok_or_else(|| anyhow!("--random missing value"))?;
                count = Some(raw.parse().with_context(|| format!("invalid --random: {raw}"))?);
            }
            "--type" => {
                let raw = args.next().ok_or_else(|| anyhow!("--type missing value"))?;
                question_type = Some(raw.parse::<QuestionType>().map_err(|err| anyhow!(err))?);
            }
            "--seed" => {
                let raw = args.next().ok_or_else(|| anyhow!("--seed missing value"))?;
                seed = Some(raw.parse().with_context(|| format!("invalid --seed: {raw}"))?);
            }
            _ => return Err(anyhow!("Unknown argument: {arg}")),
        }
    }

    let admin_id = admin_id.ok_or_else(|| anyhow!("--admin is required"))?;
    let title = title.ok_or_else(|| anyhow!("--title is required"))?;

    let mode = match (question_ids, count) {
        (Some(question_ids), None) => {
            if question_type.is_some() || seed.is_some() {
                return Err(anyhow!("--type and --seed only apply to --random"));
            }
            AssemblyMode::Fixed { question_ids }
        }
        (None, Some(count)) => AssemblyMode::Random { count, question_type, seed },
        (Some(_), Some(_)) => return Err(anyhow!("use either --questions or --random, not both")),
        (None, None) => return Err(anyhow!("one of --questions or --random is required")),
    };

    Ok(Command::AssembleExam { admin_id, draft: ExamDraft::new(title, mode) })
}

fn parse_list_exams(mut args: impl Iterator<Item = String>) -> Result<Command> {
    let mut search = None;
    let mut page = 1;
    let mut limit = DEFAULT_PAGE_SIZE;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--search" => {
                search = Some(args.next().ok_or_else(|| anyhow!("--search missing value"))?);
            }
            "--page" => {
                let raw = args.next().ok_or_else(|| anyhow!("--page missing value"))?;
                page = raw.parse().with_context(|| format!("invalid --page: {raw}"))?;
            }
            "--limit" => {
                let raw = args.next().ok_or_else(|| anyhow!("--limit missing value"))?;
                limit = raw.parse().with_context(|| format!("invalid --limit: {raw}"))?;
            }
            _ => return Err(anyhow!("Unknown argument: {arg}")),
        }
    }

    Ok(Command::ListExams { search, page, limit })
}

fn parse_exam_results(mut args: impl Iterator<Item = String>) -> Result<Command> {
    let mut admin_id = None;
    let mut exam_id = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--admin" => {
                admin_id = Some(args.next().ok_or_else(|| anyhow!("--admin missing value"))?);
            }
            "--exam" => {
                exam_id = Some(args.next().ok_or_else(|| anyhow!("--exam missing value"))?);
            }
            _ => return Err(anyhow!("Unknown argument: {arg}")),
        }
    }

    Ok(Command::ExamResults {
        admin_id: admin_id.ok_or_else(|| anyhow!("--admin is required"))?,
        exam_id: exam_id.ok_or_else(|| anyhow!("--exam is required"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command> {
        parse_args(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_to_worker() {
        assert_eq!(parse(&[]).unwrap(), Command::Worker);
        assert_eq!(parse(&["worker"]).unwrap(), Command::Worker);
    }

    #[test]
    fn parses_import_path() {
        assert_eq!(
            parse(&["import-questions", "bank.json"]).unwrap(),
            Command::ImportQuestions { path: PathBuf::from("bank.json") }
        );
        assert!(parse(&["import-questions"]).is_err());
    }

    #[test]
    fn parses_fixed_assembly() {
        let command =
            parse(&["assemble-exam", "--admin", "u1", "--title", "Finals", "--questions", "a, b,c"])
                .unwrap();

        let expected = ExamDraft::new(
            "Finals",
            AssemblyMode::Fixed { question_ids: vec!["a".into(), "b".into(), "c".into()] },
        );
        assert_eq!(command, Command::AssembleExam { admin_id: "u1".into(), draft: expected });
    }

    #[test]
    fn parses_random_assembly() {
        let command = parse(&[
            "assemble-exam",
            "--title",
            "Quiz",
            "--admin",
            "u1",
            "--random",
            "10",
            "--type",
            "short-answer",
            "--seed",
            "99",
        ])
        .unwrap();

        let Command::AssembleExam { draft, .. } = command else {
            panic!("expected assemble-exam");
        };
        assert_eq!(
            draft.mode,
            AssemblyMode::Random {
                count: 10,
                question_type: Some(QuestionType::ShortAnswer),
                seed: Some(99)
            }
        );
    }

    #[test]
    fn rejects_conflicting_or_missing_modes() {
        assert!(parse(&["assemble-exam", "--admin", "u1", "--title", "T"]).is_err());
        assert!(parse(&[
            "assemble-exam",
            "--admin",
            "u1",
            "--title",
            "T",
            "--questions",
            "a",
            "--random",
            "2"
        ])
        .is_err());
        assert!(parse(&["assemble-exam", "--admin", "u1", "--title", "T", "--random", "x"]).is_err());
        assert!(parse(&["grade"]).is_err());
    }

    #[test]
    fn parses_exam_listing_and_results() {
        assert_eq!(
            parse(&["list-exams"]).unwrap(),
            Command::ListExams { search: None, page: 1, limit: DEFAULT_PAGE_SIZE }
        );
        assert_eq!(
            parse(&["list-exams", "--search", "bio", "--page", "2", "--limit", "5"]).unwrap(),
            Command::ListExams { search: Some("bio".into()), page: 2, limit: 5 }
        );
        assert!(parse(&["list-exams", "--page", "two"]).is_err());

        assert_eq!(
            parse(&["exam-results", "--exam", "e1", "--admin", "u1"]).unwrap(),
            Command::ExamResults { admin_id: "u1".into(), exam_id: "e1".into() }
        );
        assert!(parse(&["exam-results", "--exam", "e1"]).is_err());
    }
}
