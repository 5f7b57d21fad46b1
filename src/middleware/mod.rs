pub mod auth;
pub mod errors;
pub mod json;
pub mod response;

pub use auth::{Authenticated, OptionalUser};
pub use errors::{normalize_errors, not_found};
pub use json::{DocumentBody, JsonBody};
pub use response::{wrap_data, ApiResponse, ApiResult};
