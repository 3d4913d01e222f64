//! Token values handed out by the identity provider and helpers to inspect them.

pub mod claims;
pub mod pair;
pub mod secret;
