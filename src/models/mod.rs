pub mod appointment;
pub mod availability;
pub mod community;
pub mod conversation;
pub mod enums;
pub mod thread;
pub mod user;

pub use appointment::*;
pub use availability::*;
pub use community::*;
pub use conversation::*;
pub use thread::*;
pub use user::*;
