pub mod conversation;
pub mod feedback;
pub mod resume;
pub mod user;
