use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::grading::{AnswerKey, MatchPair};

pub const DEFAULT_POINTS: f64 = 1.0;
pub const DEFAULT_ALLOWED_TIME_SECONDS: i32 = 60;

/// Question-bank payload, as accepted by create/update and the JSON import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewQuestion {
    #[validate(
        length(min = 1, max = 2000, message = "text must contain 1..=2000 characters"),
        custom(function = "not_blank")
    )]
    pub text: String,
    #[serde(default = "default_points")]
    #[validate(range(exclusive_min = 0.0, max = 1000.0, message = "points must be in (0, 1000]"))]
    pub points: f64,
    #[serde(default = "default_allowed_time")]
    #[serde(alias = "allowedTime")]
    #[validate(range(min = 1, max = 86400, message = "allowed_time_seconds must be in 1..=86400"))]
    pub allowed_time_seconds: i32,
    #[serde(flatten)]
    #[validate(custom(function = "validate_answer_key"))]
    pub answer_key: AnswerKey,
}

fn default_points() -> f64 {
    DEFAULT_POINTS
}

fn default_allowed_time() -> i32 {
    DEFAULT_ALLOWED_TIME_SECONDS
}

fn invalid(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Owned(message))
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid("blank", "value must not be blank".to_string()));
    }
    Ok(())
}

fn check_strings(field: &str, values: &[String]) -> Result<(), ValidationError> {
    if values.iter().any(|value| value.trim().is_empty()) {
        return Err(invalid("blank", format!("{field} must not contain blank entries")));
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = values.iter().find(|value| !seen.insert(value.as_str())) {
        return Err(invalid("duplicate", format!("{field} contains '{duplicate}' twice")));
    }
    Ok(())
}

fn check_choices(
    options: &[String],
    correct_answers: &[String],
    exactly_one: bool,
) -> Result<(), ValidationError> {
    if options.len() < 2 {
        return Err(invalid("options", "at least two options are required".to_string()));
    }
    check_strings("options", options)?;
    check_strings("correct_answers", correct_answers)?;

    if exactly_one && correct_answers.len() != 1 {
        return Err(invalid(
            "correct_answers",
            format!("exactly one correct answer is required, got {}", correct_answers.len()),
        ));
    }
    if correct_answers.is_empty() {
        return Err(invalid(
            "correct_answers",
            "at least one correct answer is required".to_string(),
        ));
    }
    if let Some(unknown) = correct_answers.iter().find(|answer| !options.contains(answer)) {
        return Err(invalid(
            "correct_answers",
            format!("correct answer '{unknown}' is not one of the options"),
        ));
    }
    Ok(())
}

fn check_pairs(pairs: &[MatchPair]) -> Result<(), ValidationError> {
    if pairs.is_empty() {
        return Err(invalid("matching_pairs", "at least one pair is required".to_string()));
    }
    if pairs.iter().any(|pair| pair.left.trim().is_empty() || pair.right.trim().is_empty()) {
        return Err(invalid("blank", "matching pairs must not have blank sides".to_string()));
    }
    let mut lefts = HashSet::new();
    if let Some(pair) = pairs.iter().find(|pair| !lefts.insert(pair.left.as_str())) {
        return Err(invalid("duplicate", format!("left item '{}' appears twice", pair.left)));
    }
    Ok(())
}

/// Answer-key rules enforced when a question enters the bank.
pub(crate) fn validate_answer_key(key: &AnswerKey) -> Result<(), ValidationError> {
    match key {
        AnswerKey::SingleChoice { options, correct_answers } => {
            check_choices(options, correct_answers, true)
        }
        AnswerKey::MultipleChoice { options, correct_answers } => {
            check_choices(options, correct_answers, false)
        }
        AnswerKey::TrueFalse { options, correct_answers } => {
            if options.len() != 2 || options[0] != "true" || options[1] != "false" {
                return Err(invalid(
                    "options",
                    "true-false options must be exactly [\"true\", \"false\"]".to_string(),
                ));
            }
            check_choices(options, correct_answers, true)
        }
        AnswerKey::FillBlank { blank_answer } => {
            if blank_answer.trim().is_empty() {
                return Err(invalid("blank_answer", "blank_answer must not be blank".to_string()));
            }
            Ok(())
        }
        AnswerKey::ShortAnswer { keywords } => {
            if keywords.is_empty() {
                return Err(invalid("keywords", "at least one keyword is required".to_string()));
            }
            check_strings("keywords", keywords)
        }
        AnswerKey::Matching { matching_pairs } => check_pairs(matching_pairs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> NewQuestion {
        serde_json::from_value(value).expect("payload should deserialize")
    }

    #[test]
    fn applies_defaults_for_points_and_time() {
        let question = parse(json!({
            "text": "Capital of France?",
            "type": "fill-blank",
            "blank_answer": "Paris"
        }));

        assert_eq!(question.points, DEFAULT_POINTS);
        assert_eq!(question.allowed_time_seconds, DEFAULT_ALLOWED_TIME_SECONDS);
        assert!(question.validate().is_ok());
    }

    #[test]
    fn accepts_camel_case_allowed_time() {
        let question = parse(json!({
            "text": "Pick one",
            "allowedTime": 120,
            "type": "single-choice",
            "options": ["a", "b"],
            "correct_answers": ["a"]
        }));

        assert_eq!(question.allowed_time_seconds, 120);
        assert!(question.validate().is_ok());
    }

    #[test]
    fn rejects_blank_text_and_bad_points() {
        let mut question = parse(json!({
            "text": "   ",
            "points": 0,
            "type": "short-answer",
            "keywords": ["ownership"]
        }));
        let errors = question.validate().expect_err("blank text and zero points");
        let fields = errors.field_errors();
        assert!(fields.contains_key("text"));
        assert!(fields.contains_key("points"));

        question.text = "Explain borrowing".to_string();
        question.points = 1000.5;
        assert!(question.validate().is_err());
        question.points = 1000.0;
        assert!(question.validate().is_ok());
    }

    #[test]
    fn rejects_correct_answer_outside_options() {
        let question = parse(json!({
            "text": "Pick the primes",
            "type": "multiple-choice",
            "options": ["2", "3", "4"],
            "correct_answers": ["2", "5"]
        }));

        let errors = question.validate().expect_err("5 is not an option");
        assert!(errors.to_string().contains("'5' is not one of the options"));
    }

    #[test]
    fn single_choice_needs_two_options_and_one_answer() {
        let too_few = AnswerKey::SingleChoice {
            options: vec!["a".into()],
            correct_answers: vec!["a".into()],
        };
        assert!(validate_answer_key(&too_few).is_err());

        let two_answers = AnswerKey::SingleChoice {
            options: vec!["a".into(), "b".into()],
            correct_answers: vec!["a".into(), "b".into()],
        };
        assert!(validate_answer_key(&two_answers).is_err());
    }

    #[test]
    fn true_false_options_are_fixed() {
        let swapped = AnswerKey::TrueFalse {
            options: vec!["yes".into(), "no".into()],
            correct_answers: vec!["yes".into()],
        };
        assert!(validate_answer_key(&swapped).is_err());

        let canonical = AnswerKey::TrueFalse {
            options: vec!["true".into(), "false".into()],
            correct_answers: vec!["false".into()],
        };
        assert!(validate_answer_key(&canonical).is_ok());
    }

    #[test]
    fn keywords_and_pairs_must_be_present_and_distinct() {
        assert!(validate_answer_key(&AnswerKey::ShortAnswer { keywords: vec![] }).is_err());
        assert!(validate_answer_key(&AnswerKey::ShortAnswer {
            keywords: vec!["heap".into(), " ".into()]
        })
        .is_err());

        let repeated_left = AnswerKey::Matching {
            matching_pairs: vec![MatchPair::new("a", "1"), MatchPair::new("a", "2")],
        };
        assert!(validate_answer_key(&repeated_left).is_err());

        let ok = AnswerKey::Matching {
            matching_pairs: vec![MatchPair::new("a", "1"), MatchPair::new("b", "1")],
        };
        assert!(validate_answer_key(&ok).is_ok());
    }
}
