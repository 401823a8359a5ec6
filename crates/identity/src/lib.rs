//! User identities and session tokens.
//!
//! Identities live in a sled tree keyed by username, with argon2 password
//! hashes. Sessions are stateless blake3-MAC'd tokens carried in a cookie;
//! logout simply clears the cookie.

pub mod errors;
pub mod session;
pub mod store;

pub use errors::IdentityError;
pub use session::SessionKeeper;
pub use store::{User, UserStore};
