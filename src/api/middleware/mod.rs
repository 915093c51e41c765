pub mod auth;

pub use auth::{Access, AccessTokens, access_middleware};
