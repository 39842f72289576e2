pub mod alerts;
pub mod attendance;
pub mod core;
pub mod schedules;
pub mod students;
pub mod subjects;
pub mod teachers;
