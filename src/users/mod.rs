pub mod onboarding;
pub mod repo;
pub mod repo_types;

pub use repo::UserStore;
pub use repo_types::{StoreError, User};
