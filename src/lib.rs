//! Session-scoped token refresh coordination for backend-for-frontend services.
//!
//! The crate centers on three pieces:
//!
//! - [`auth`] decodes access-token claims to decide, without a network call, whether a token is
//!   still usable.
//! - [`flows::RefreshCoordinator`] guarantees at most one upstream refresh per session at a time,
//!   sharing the outcome with every concurrent caller.
//! - [`flows::SessionBroker::dispatch`] attaches bearer tokens to a batch of API requests, peeks
//!   at the first response for a `401`, and transparently refreshes and reissues the batch.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod provider;
pub mod redirect;
pub mod session;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
