//! Permission resolution seam
//!
//! The repository consults a [`PermissionResolver`] before every state
//! check, using `module`/`function` policy naming. The resolver is an
//! external collaborator; the repository only cares about authorized or
//! not, and reports the exact module/function pair on denial.

use crate::model::UserReference;
use async_trait::async_trait;
use uuid::Uuid;

/// Policy module covering all repository operations.
pub const MODULE_CONTENT: &str = "content";

/// Policy function names consumed by the repository.
pub mod functions {
	/// Loading content, locations, relations and running searches
	pub const READ: &str = "read";
	/// Creating content, drafts and copies
	pub const CREATE: &str = "create";
	/// Updating drafts, metadata, locations and relations
	pub const EDIT: &str = "edit";
	/// Publishing a draft
	pub const PUBLISH: &str = "publish";
	/// Deleting content, versions and translations
	pub const REMOVE: &str = "remove";
	/// Reading non-published versions and draft listings
	pub const VERSIONREAD: &str = "versionread";
	/// Hiding and revealing content and locations
	pub const HIDE: &str = "hide";
}

/// Decides whether a user may perform a module/function, optionally
/// scoped to a single content item.
#[async_trait]
pub trait PermissionResolver: Send + Sync {
	/// Whether `user` may perform `module`/`function`. `object` narrows
	/// the check to a specific content item where one is in play.
	async fn can(
		&self,
		user: &UserReference,
		module: &str,
		function: &str,
		object: Option<Uuid>,
	) -> bool;

	/// Groups the user belongs to, consumed by the user-metadata search
	/// criterion. Defaults to none.
	async fn groups_of(&self, _user: &UserReference) -> Vec<Uuid> {
		Vec::new()
	}
}

/// Resolver that authorizes everything. The default for repositories
/// constructed without an explicit resolver.
pub struct AllowAll;

#[async_trait]
impl PermissionResolver for AllowAll {
	async fn can(
		&self,
		_user: &UserReference,
		_module: &str,
		_function: &str,
		_object: Option<Uuid>,
	) -> bool {
		true
	}
}
