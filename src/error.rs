//! Error taxonomy for the graph engine.

use thiserror::Error;

/// Result alias used by every engine operation.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised by engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
	/// Input rejected before any network call.
	#[error("{0}")]
	Validation(String),

	/// A build was requested while one is already running for the graph.
	#[error("a build is already in progress for graph {0}")]
	BuildInFlight(String),

	/// The request never produced a response (offline, CORS, aborted).
	#[error("network error: {0}")]
	Network(String),

	/// The request timed out and was aborted.
	#[error("request timed out after {0}ms")]
	Timeout(u32),

	/// The backend answered with a non-2xx status.
	#[error("server error {status}: {message}")]
	Server {
		/// HTTP status code.
		status: u16,
		/// Body text or status text.
		message: String,
	},

	/// The response body could not be decoded.
	#[error("unexpected response: {0}")]
	Decode(String),

	/// The graph record is unknown to the client or the backend.
	#[error("graph not found: {0}")]
	GraphNotFound(String),

	/// The backend build job ended in `error`.
	#[error("build failed: {message}")]
	JobFailed {
		/// Graph whose build failed.
		graph_id: String,
		/// Message from the graph record.
		message: String,
	},
}

/// User-facing error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
	/// Rejected client-side.
	Validation,
	/// Network or server hiccup; retrying may help.
	Transient,
	/// Terminal build failure tied to the graph record.
	JobFailure,
}

impl GraphError {
	/// Create a validation error.
	pub fn validation(msg: impl Into<String>) -> Self {
		Self::Validation(msg.into())
	}

	/// Taxonomy bucket of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Validation(_) | Self::BuildInFlight(_) => ErrorKind::Validation,
			Self::JobFailed { .. } => ErrorKind::JobFailure,
			Self::Network(_)
			| Self::Timeout(_)
			| Self::Server { .. }
			| Self::Decode(_)
			| Self::GraphNotFound(_) => ErrorKind::Transient,
		}
	}

	/// Banner model for this error.
	pub fn to_notice(&self) -> Notice {
		Notice::new(self.kind(), self.to_string())
	}
}

impl From<serde_json::Error> for GraphError {
	fn from(err: serde_json::Error) -> Self {
		Self::Decode(err.to_string())
	}
}

/// A message shown as a banner or toast.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
	/// Category, drives styling.
	pub kind: ErrorKind,
	/// Text shown to the user.
	pub message: String,
	/// Whether the user can close it. Job failures stay until the graph changes.
	pub dismissible: bool,
}

impl Notice {
	/// Build a notice; job failures are never dismissible.
	pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
			dismissible: kind != ErrorKind::JobFailure,
		}
	}
}
