pub mod attendance;
pub mod role;
pub mod status;
pub mod student;
pub mod user;
