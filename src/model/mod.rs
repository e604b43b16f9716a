pub mod agent;
pub mod attendance;
pub mod office;
pub mod role;
pub mod user;
