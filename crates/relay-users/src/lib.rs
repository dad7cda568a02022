pub mod auth;
pub mod credential;
pub mod db;
pub mod error;
pub mod identity;
pub mod resolver;
pub mod types;

pub use credential::{issue as issue_credential, verify as verify_credential};
pub use error::{Result, UserError};
pub use resolver::{ContactResolver, ResolvedContact};
pub use types::{Credential, NewUser, User};
