pub mod appointments;
pub mod chat;
pub mod communities;
pub mod doctors;
pub mod health;
pub mod threads;
pub mod users;
