pub mod attendance;
pub mod backup_exchange;
pub mod core;
pub mod dashboard;
pub mod logs;
pub mod reports;
pub mod students;
