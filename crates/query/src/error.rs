//! Error types for option loading and cycle failures.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading [`crate::QueryOptions`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading an options file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or an unknown/mistyped key.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),
}

/// Why a cycle did not produce a value of its own.
///
/// Cycle errors are recovered inside the pipeline (fallback to the default
/// result, or no change for updates). They surface only in logs and in
/// [`crate::QueryEvent::CycleCompleted`].
#[derive(Debug, Error)]
pub enum CycleError {
	#[error("fetch failed: {0:#}")]
	Fetch(anyhow::Error),

	#[error("update operation failed: {0:#}")]
	Update(anyhow::Error),

	#[error("{stage} panicked: {message}")]
	Panicked { stage: Stage, message: String },

	#[error("{stage} task failed to join: {message}")]
	Join { stage: Stage, message: String },
}

/// Which caller-supplied future a [`CycleError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Fetch,
	Update,
}

impl std::fmt::Display for Stage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			Stage::Fetch => "fetch",
			Stage::Update => "update operation",
		})
	}
}

impl CycleError {
	pub(crate) fn failed(stage: Stage, err: anyhow::Error) -> Self {
		match stage {
			Stage::Fetch => Self::Fetch(err),
			Stage::Update => Self::Update(err),
		}
	}

	/// Returns the stage that failed.
	pub fn stage(&self) -> Stage {
		match self {
			Self::Fetch(_) => Stage::Fetch,
			Self::Update(_) => Stage::Update,
			Self::Panicked { stage, .. } | Self::Join { stage, .. } => *stage,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fetch_error_display_includes_context_chain() {
		let err = anyhow::anyhow!("connection reset").context("GET /users");
		let cycle = CycleError::failed(Stage::Fetch, err);
		assert_eq!(cycle.to_string(), "fetch failed: GET /users: connection reset");
		assert_eq!(cycle.stage(), Stage::Fetch);
	}

	#[test]
	fn panic_display_names_stage() {
		let cycle = CycleError::Panicked {
			stage: Stage::Update,
			message: "boom".into(),
		};
		assert_eq!(cycle.to_string(), "update operation panicked: boom");
	}
}
