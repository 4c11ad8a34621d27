use thiserror::Error;

/// Failure of a dataset, metrics or transaction request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
	/// The request never produced a response.
	#[error("transport failure: {0}")]
	Transport(String),
	/// The server answered with a non-success status.
	#[error("HTTP {0}")]
	Status(u16),
	/// The payload could not be decoded.
	#[error("malformed payload: {0}")]
	Malformed(String),
	/// The caller supplied input that was rejected before any request.
	#[error("invalid input: {0}")]
	InvalidInput(String),
	/// The request succeeded but nothing matched.
	#[error("not found: {0}")]
	NotFound(String),
}

impl FetchError {
	/// Whether another attempt could plausibly succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Transport(_) => true,
			Self::Status(code) => *code >= 500 || *code == 429,
			Self::Malformed(_) | Self::InvalidInput(_) | Self::NotFound(_) => false,
		}
	}
}

impl From<serde_json::Error> for FetchError {
	fn from(err: serde_json::Error) -> Self {
		Self::Malformed(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_transient_failures_retry() {
		assert!(FetchError::Transport("reset".into()).is_retryable());
		assert!(FetchError::Status(503).is_retryable());
		assert!(FetchError::Status(429).is_retryable());
		assert!(!FetchError::Status(404).is_retryable());
		assert!(!FetchError::NotFound("T0P7R96NFJWBBSTZ".into()).is_retryable());
		assert!(!FetchError::InvalidInput("abc".into()).is_retryable());
		assert!(!FetchError::Malformed("eof".into()).is_retryable());
	}

	#[test]
	fn json_errors_become_malformed() {
		let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
		assert!(matches!(FetchError::from(err), FetchError::Malformed(_)));
	}
}
