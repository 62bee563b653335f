pub mod curriculum;
pub mod problems;
pub mod progress;
pub mod users;
