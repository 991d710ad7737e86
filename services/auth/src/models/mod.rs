//! Authentication service models

pub mod session;
pub mod user;

// Re-export for convenience
pub use session::SessionRecord;
pub use user::{LoginCredentials, NewUser, RegisterInput, User, UserResponse};
