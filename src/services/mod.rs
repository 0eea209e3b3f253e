pub mod announcements;
pub mod attendance;
pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod forms;
pub mod grades;
pub mod messaging;
pub mod metrics;
pub mod policy;
pub mod progression;
pub mod realtime;
pub mod students;
pub mod subscriptions;
pub mod tenants;
pub mod users;
