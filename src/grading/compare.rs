use std::collections::BTreeSet;

use super::error::GradingError;
use super::model::{AnswerKey, GradedAnswer, MatchPair, Question, Selected, SubmittedAnswer};

/// Grades one answer against the question it names.
///
/// Scoring is all-or-nothing: `points` when correct, `0` otherwise.
pub fn grade_answer(
    question: &Question,
    answer: &SubmittedAnswer,
) -> Result<GradedAnswer, GradingError> {
    question.validate()?;

    if answer.question_id != question.id {
        return Err(GradingError::UnknownQuestion { question_id: answer.question_id.clone() });
    }

    let is_correct = is_correct(question, &answer.selected)?;
    let score = if is_correct { question.points } else { 0.0 };

    Ok(GradedAnswer {
        question_id: answer.question_id.clone(),
        selected: answer.selected.clone(),
        is_correct,
        score,
    })
}

fn is_correct(question: &Question, selected: &Selected) -> Result<bool, GradingError> {
    match &question.key {
        AnswerKey::SingleChoice { correct_answers, .. }
        | AnswerKey::TrueFalse { correct_answers, .. } => {
            let value = expect_text(question, selected)?;
            Ok(correct_answers.first().is_some_and(|correct| correct == value))
        }
        AnswerKey::MultipleChoice { correct_answers, .. } => {
            let values = selected.as_choices().ok_or_else(|| malformed(question, selected))?;
            Ok(same_set(values, correct_answers))
        }
        AnswerKey::FillBlank { blank_answer } => {
            let value = expect_text(question, selected)?;
            Ok(value.to_lowercase() == blank_answer.to_lowercase())
        }
        AnswerKey::ShortAnswer { keywords } => {
            let value = expect_text(question, selected)?;
            Ok(keyword_threshold_met(value, keywords))
        }
        AnswerKey::Matching { matching_pairs } => {
            let pairs = selected.as_pairs().ok_or_else(|| malformed(question, selected))?;
            Ok(pairs_match_in_order(pairs, matching_pairs))
        }
    }
}

fn expect_text<'a>(question: &Question, selected: &'a Selected) -> Result<&'a str, GradingError> {
    selected.as_text().ok_or_else(|| malformed(question, selected))
}

fn malformed(question: &Question, selected: &Selected) -> GradingError {
    let expected = match question.key {
        AnswerKey::MultipleChoice { .. } => "list of strings",
        AnswerKey::Matching { .. } => "list of pairs",
        _ => "text",
    };
    GradingError::MalformedAnswer {
        question_id: question.id.clone(),
        expected,
        actual: selected.shape(),
    }
}

fn same_set(selected: &[String], correct: &[String]) -> bool {
    let selected: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
    let correct: BTreeSet<&str> = correct.iter().map(String::as_str).collect();
    selected == correct
}

/// At least half of the keywords must appear (case-insensitively) in the answer.
fn keyword_threshold_met(answer: &str, keywords: &[String]) -> bool {
    let answer = answer.to_lowercase();
    let matches =
        keywords.iter().filter(|keyword| answer.contains(&keyword.to_lowercase())).count();
    matches as f64 >= keywords.len() as f64 / 2.0
}

// Positional on purpose: the same pairs submitted in another order are graded incorrect.
fn pairs_match_in_order(selected: &[MatchPair], reference: &[MatchPair]) -> bool {
    selected.len() == reference.len() && selected.iter().zip(reference).all(|(a, b)| a == b)
}
