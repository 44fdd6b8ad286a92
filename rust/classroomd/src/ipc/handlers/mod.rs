pub mod assignments;
pub mod attendance;
pub mod checkin;
pub mod classes;
pub mod core;
pub mod homework;
pub mod setup;
pub mod students;
