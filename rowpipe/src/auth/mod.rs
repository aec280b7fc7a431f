//! Authentication: bearer-token verification and password hashing (§4.4, §7).
//!
//! - [`current_user`]: the `CurrentUser` extractor, verifying the bearer
//!   token on every request and loading the current (active) user.
//! - [`session`]: JWT creation/verification.
//! - [`password`]: Argon2 password hashing for the login and admin-bootstrap paths.

pub mod current_user;
pub mod password;
pub mod session;
