//! Credential models shared by the store, the refresh coordinator, and the login flow.

pub mod credential;
pub mod secret;

pub use credential::*;
pub use secret::*;
