pub mod password;
pub mod reset;
pub mod token;

pub use password::{Argon2Hasher, PasswordError, PasswordHasher};
pub use reset::{hash_token, ResetTicket};
pub use token::{Claims, TokenError, TokenIssuer};
