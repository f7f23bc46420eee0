pub mod models;
pub mod pool;
pub mod repository;

pub use models::{AuthSession, ChatRole, ChatSession, ChatTurn, FileRecord, PasswordResetToken, User};
pub use pool::DbPool;
pub use repository::Repository;
