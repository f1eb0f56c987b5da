pub mod accounts;
pub mod admin;
pub mod appointments;
pub mod events;
pub mod feedback;
pub mod goals;
pub mod grievances;
pub mod messages;
pub mod notifications;
pub mod schedule;
pub mod status;
pub mod students;
pub mod tasks;
