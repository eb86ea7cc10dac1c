pub(crate) mod exams;
pub(crate) mod questions;
pub(crate) mod results;
pub(crate) mod submissions;
pub(crate) mod users;
