//! Answer-grading engine.
//!
//! Pure, synchronous functions over in-memory values: no I/O and no shared state, so calls for
//! different submissions can run in parallel freely. Persistence and the one-result-per-student
//! rule live with the caller.

mod aggregate;
mod compare;
mod error;
mod model;

pub use aggregate::{grade_submission, PassPolicy, DEFAULT_PASS_THRESHOLD_PERCENT};
pub use compare::grade_answer;
pub use error::GradingError;
pub use model::{
    AnswerKey, ExamResult, GradedAnswer, MatchPair, Question, QuestionType, Selected,
    SubmittedAnswer,
};
