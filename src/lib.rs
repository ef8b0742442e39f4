//! OIDC client identity for services: discovers an identity provider, keeps bearer tokens fresh,
//! verifies inbound tokens against the provider's JWKS, and carries the result over the
//! `OAUTHBEARER` SASL mechanism with an optional Diffie-Hellman confidentiality layer.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod bearer;
pub mod client;
pub mod error;
pub mod http;
pub mod issuer;
pub mod jwks;
pub mod login;
pub mod memo;
pub mod obs;
pub mod renew;
pub mod sasl;
pub mod token;

#[cfg(test)] mod testing;

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

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
