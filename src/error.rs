//! Repository error taxonomy
//!
//! Every operation returns [`RepositoryResult`]. Validation failures that
//! concern individual fields are aggregated into a single
//! [`RepositoryError::ContentFieldValidation`] carrying one [`FieldError`]
//! per offending (field, language) pair.

use thiserror::Error;

/// A single field-level validation failure.
///
/// Collected across every field and every translation touched by an
/// operation before the aggregate error is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
	/// Field definition identifier
	pub identifier: String,

	/// Language code of the offending translation
	pub language: String,

	/// Human-readable description of the violation
	pub message: String,
}

impl std::fmt::Display for FieldError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"'{}' ({}): {}",
			self.identifier, self.language, self.message
		)
	}
}

/// Repository-level errors
#[derive(Error, Debug)]
pub enum RepositoryError {
	/// Entity does not exist at the queried coordinate
	#[error("Could not find '{what}' with identifier '{identifier}'")]
	NotFound {
		/// Kind of entity that was looked up
		what: &'static str,
		/// Identifier used in the lookup
		identifier: String,
	},

	/// The permission resolver denied the module/function for the actor
	#[error("The current user is not authorized to perform '{function}' in module '{module}'")]
	Unauthorized {
		/// Policy module, e.g. `content`
		module: &'static str,
		/// Policy function, e.g. `publish`
		function: &'static str,
	},

	/// Operation is structurally illegal in the current lifecycle state
	#[error("Bad state: {0}")]
	BadState(String),

	/// Malformed input at the API boundary
	#[error("Argument '{argument}' is invalid: {reason}")]
	InvalidArgument {
		/// Name of the offending argument
		argument: String,
		/// Why it was rejected
		reason: String,
	},

	/// Aggregate of per-field, per-language business-rule violations
	#[error("Content fields did not validate ({} error(s))", .0.len())]
	ContentFieldValidation(Vec<FieldError>),

	/// Structural create/update error not tied to a specific field
	#[error("Content validation failed: {0}")]
	ContentValidation(String),
}

impl RepositoryError {
	/// Shorthand for [`RepositoryError::NotFound`]
	pub fn not_found(what: &'static str, identifier: impl std::fmt::Display) -> Self {
		RepositoryError::NotFound {
			what,
			identifier: identifier.to_string(),
		}
	}

	/// Shorthand for [`RepositoryError::InvalidArgument`]
	pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
		RepositoryError::InvalidArgument {
			argument: argument.into(),
			reason: reason.into(),
		}
	}
}

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;
