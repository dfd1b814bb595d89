pub mod application;
pub mod job;
pub mod user;

pub use application::{ApplicationRow, ProcessingStatus};
pub use job::JobRow;
pub use user::UserRow;
