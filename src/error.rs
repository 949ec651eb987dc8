//! Error types shared by the data source, backends and configuration loader.

use thiserror::Error;

/// Why a topology or health request failed.
///
/// Delivered to subscribers through the `FetchError` event; never fatal.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FetchError {
	/// The request never produced a response (offline, CORS, aborted).
	#[error("network error: {0}")]
	Network(String),

	/// The backend answered with a non-success status.
	#[error("backend returned HTTP {status} for {url}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Request URL, for the log line.
		url: String,
	},

	/// The response body was not the expected JSON shape.
	#[error("malformed response: {0}")]
	Decode(String),

	/// The configured source has nothing to offer (e.g. missing snapshot element).
	#[error("graph source unavailable: {0}")]
	Unavailable(String),
}

impl From<serde_json::Error> for FetchError {
	fn from(err: serde_json::Error) -> Self {
		FetchError::Decode(err.to_string())
	}
}

/// Problems reading the embedded application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The config element held invalid JSON.
	#[error("invalid config: {0}")]
	Parse(#[from] serde_json::Error),

	/// A field parsed but its value cannot be used.
	#[error("invalid value for `{field}`: {reason}")]
	Invalid {
		/// Offending field name.
		field: &'static str,
		/// What is wrong with it.
		reason: String,
	},
}
