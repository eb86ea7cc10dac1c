pub mod exam_assembly;
pub mod question_bank;
pub mod result_report;
pub mod submission;
