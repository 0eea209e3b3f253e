pub mod announcement;
pub mod attendance;
pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod form;
pub mod grade;
pub mod message;
pub mod progression;
pub mod student;
pub mod tenant;
pub mod user;
