// Authentication and authorization

pub mod errors;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod tokens;

pub use errors::*;
pub use jwt::*;
pub use middleware::*;
pub use models::*;
pub use password::*;
pub use service::*;
