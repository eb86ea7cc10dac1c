use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::compare::grade_answer;
use super::error::GradingError;
use super::model::{ExamResult, Question, SubmittedAnswer};

pub const DEFAULT_PASS_THRESHOLD_PERCENT: f64 = 50.0;

/// Minimum percentage of the exam's total points needed to pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassPolicy {
    pub threshold_percent: f64,
}

impl PassPolicy {
    pub fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }

    pub fn is_passing(&self, total_score: f64, max_score: f64) -> bool {
        if max_score <= 0.0 {
            return false;
        }
        total_score / max_score * 100.0 >= self.threshold_percent
    }
}

impl Default for PassPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PASS_THRESHOLD_PERCENT)
    }
}

/// Grades a full submission against the exam's question list.
///
/// Answers keep their submission order. `max_score` covers every question in the exam,
/// answered or not, so every question is validated up front. Any unknown or repeated question
/// id aborts the whole submission.
pub fn grade_submission(
    questions: &[Question],
    answers: &[SubmittedAnswer],
    policy: &PassPolicy,
) -> Result<ExamResult, GradingError> {
    let mut by_id: HashMap<&str, &Question> = HashMap::with_capacity(questions.len());
    for question in questions {
        question.validate()?;
        if by_id.insert(question.id.as_str(), question).is_some() {
            return Err(GradingError::InvalidQuestion {
                question_id: question.id.clone(),
                reason: "listed more than once in the exam".to_string(),
            });
        }
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(answers.len());
    let mut graded = Vec::with_capacity(answers.len());
    for answer in answers {
        let question = by_id.get(answer.question_id.as_str()).ok_or_else(|| {
            GradingError::UnknownQuestion { question_id: answer.question_id.clone() }
        })?;
        if !seen.insert(answer.question_id.as_str()) {
            return Err(GradingError::DuplicateAnswer { question_id: answer.question_id.clone() });
        }
        graded.push(grade_answer(question, answer)?);
    }

    let max_score: f64 = questions.iter().map(|question| question.points).sum();
    let total_score: f64 = graded.iter().map(|answer| answer.score).sum();

    if max_score <= 0.0 {
        tracing::warn!(questions = questions.len(), "Exam carries no points; marking as not passed");
    }
    let passed = policy.is_passing(total_score, max_score);

    Ok(ExamResult { answers: graded, total_score, max_score, passed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::model::{AnswerKey, MatchPair, Selected};

    fn fill(id: &str, points: f64, answer: &str) -> Question {
        Question::new(id, points, AnswerKey::FillBlank { blank_answer: answer.into() })
    }

    fn text(id: &str, value: &str) -> SubmittedAnswer {
        SubmittedAnswer::new(id, Selected::Text(value.into()))
    }

    fn exam() -> Vec<Question> {
        vec![fill("q1", 1.0, "one"), fill("q2", 2.0, "two"), fill("q3", 3.0, "three")]
    }

    #[test]
    fn partial_submission_counts_all_points_toward_max() {
        let answers = vec![text("q1", "one"), text("q2", "TWO")];
        let result = grade_submission(&exam(), &answers, &PassPolicy::default()).expect("grade");

        assert_eq!(result.total_score, 3.0);
        assert_eq!(result.max_score, 6.0);
        assert!(result.passed);
        assert_eq!(result.answers.len(), 2);
    }

    #[test]
    fn answers_keep_submission_order() {
        let answers = vec![text("q3", "three"), text("q1", "wrong")];
        let result = grade_submission(&exam(), &answers, &PassPolicy::default()).expect("grade");

        let ids: Vec<&str> = result.answers.iter().map(|a| a.question_id.as_str()).collect();
        assert_eq!(ids, ["q3", "q1"]);
        assert!(result.answers[0].is_correct);
        assert!(!result.answers[1].is_correct);
        assert_eq!(result.total_score, 3.0);
    }

    #[test]
    fn unknown_question_rejects_whole_submission() {
        let answers = vec![text("q1", "one"), text("q9", "nine")];
        let err = grade_submission(&exam(), &answers, &PassPolicy::default()).unwrap_err();
        assert_eq!(err, GradingError::UnknownQuestion { question_id: "q9".into() });
    }

    #[test]
    fn repeated_answer_is_rejected() {
        let answers = vec![text("q3", "three"), text("q3", "three")];
        let err = grade_submission(&exam(), &answers, &PassPolicy::default()).unwrap_err();
        assert_eq!(err, GradingError::DuplicateAnswer { question_id: "q3".into() });
    }

    #[test]
    fn duplicate_question_in_exam_is_invalid() {
        let questions = vec![fill("q1", 1.0, "one"), fill("q1", 1.0, "one")];
        let err = grade_submission(&questions, &[], &PassPolicy::default()).unwrap_err();
        assert!(matches!(err, GradingError::InvalidQuestion { .. }));
    }

    #[test]
    fn invalid_unanswered_question_rejects_submission() {
        for points in [-5.0, 0.0, f64::NAN] {
            let questions = vec![fill("ok", 10.0, "yes"), fill("bad", points, "no")];
            let answers = vec![text("ok", "yes")];
            let err = grade_submission(&questions, &answers, &PassPolicy::default()).unwrap_err();
            assert!(
                matches!(
                    err,
                    GradingError::InvalidQuestion { ref question_id, .. } if question_id == "bad"
                ),
                "points {points} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn below_threshold_fails() {
        let answers = vec![text("q1", "one"), text("q2", "nope"), text("q3", "nope")];
        let result = grade_submission(&exam(), &answers, &PassPolicy::default()).expect("grade");
        assert_eq!(result.total_score, 1.0);
        assert!(!result.passed);
    }

    #[test]
    fn threshold_is_configurable() {
        let answers = vec![text("q1", "one"), text("q2", "two")];
        let strict = PassPolicy::new(75.0);
        let result = grade_submission(&exam(), &answers, &strict).expect("grade");
        assert!(!result.passed);

        let lenient = PassPolicy::new(10.0);
        let result = grade_submission(&exam(), &answers[..1], &lenient).expect("grade");
        assert!(result.passed);
    }

    #[test]
    fn empty_exam_never_passes() {
        let result = grade_submission(&[], &[], &PassPolicy::new(0.0)).expect("grade");
        assert_eq!(result.max_score, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn empty_submission_scores_zero() {
        let result = grade_submission(&exam(), &[], &PassPolicy::default()).expect("grade");
        assert_eq!(result.total_score, 0.0);
        assert_eq!(result.max_score, 6.0);
        assert!(!result.passed);
        assert!(result.answers.is_empty());
    }

    #[test]
    fn mixed_question_types() {
        let questions = vec![
            Question::new(
                "choice",
                1.0,
                AnswerKey::SingleChoice {
                    options: vec!["x".into(), "y".into()],
                    correct_answers: vec!["x".into()],
                },
            ),
            Question::new(
                "pairs",
                1.0,
                AnswerKey::Matching {
                    matching_pairs: vec![MatchPair::new("A", "1"), MatchPair::new("B", "2")],
                },
            ),
        ];
        let answers = vec![
            SubmittedAnswer::new("choice", Selected::Text("x".into())),
            SubmittedAnswer::new(
                "pairs",
                Selected::Pairs(vec![MatchPair::new("B", "2"), MatchPair::new("A", "1")]),
            ),
        ];
        let result = grade_submission(&questions, &answers, &PassPolicy::default()).expect("grade");
        assert_eq!(result.total_score, 1.0);
        assert!(result.passed);
        assert_eq!(result.correct_count(), 1);
    }
}
