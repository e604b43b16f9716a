//! Attendance rules and the operations handlers call into.

pub mod agent;
pub mod attendance;
pub mod office;
pub mod report;
pub mod scan;
pub mod schedule;
pub mod scope;
pub mod user;
