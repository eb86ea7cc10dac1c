pub(crate) mod grading;
pub(crate) mod scheduler;
