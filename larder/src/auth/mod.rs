//! Passwordless authentication: magic-link tokens, session tokens, and the
//! request extractor that resolves the session cookie to a user.
//!
//! Login flow state machine:
//!
//! ```text
//! Requested -> (email sent) -> Pending -> (link visited within 15 min) -> Consumed -> Session Active
//! Pending -> (link visited after 15 min) -> Expired
//! Pending -> (link reused) -> Expired   (indistinguishable from expiry, by design)
//! ```

pub mod current_user;
pub mod magic_link;
pub mod session;

pub use current_user::CurrentUser;
pub use magic_link::MagicLinkStore;
pub use session::SessionStore;
