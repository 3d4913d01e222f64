//! Session identifiers, token secrets, and access-token expiry checks.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{claims::*, pair::*, secret::*};
