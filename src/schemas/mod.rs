pub mod exam;
pub mod question;

pub use exam::{AssemblyMode, ExamDraft};
pub use question::NewQuestion;
