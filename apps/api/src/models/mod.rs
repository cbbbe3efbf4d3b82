pub mod opportunity;
pub mod student;
pub mod tracker;
