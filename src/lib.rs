//! In-process versioned content repository.
//!
//! Content items carry immutable numbered versions moving through a
//! Draft → Published → Archived lifecycle, with at most one published
//! version per item. Published items are placed in a hierarchical
//! location tree with materialized paths and propagated visibility,
//! linked through a directed relation graph, and queryable through a
//! composable criterion algebra.
//!
//! # Example
//!
//! ```no_run
//! use content_repository::prelude::*;
//! use uuid::Uuid;
//!
//! # async fn demo() -> RepositoryResult<()> {
//! let repo = Repository::new();
//! let actor = UserReference::new(Uuid::new_v4());
//!
//! let article = ContentType::new(
//! 	"article",
//! 	vec![FieldDefinition::new("title", "text_line").required(None)],
//! );
//! let type_id = article.id;
//! repo.register_content_type(article);
//!
//! let create = ContentCreateStruct::new(type_id, "eng-GB")
//! 	.set_field("title", Value::Text("Hello".into()));
//! let draft = repo
//! 	.content()
//! 	.create_content(&actor, create, vec![LocationCreateStruct::new(None)])
//! 	.await?;
//! let published = repo
//! 	.content()
//! 	.publish_version(&actor, draft.info.id, draft.version.version_no, None)
//! 	.await?;
//! assert_eq!(published.version.status, VersionStatus::Published);
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency and transactions
//!
//! The repository is cheap to clone and safe to share across tasks; all
//! state sits behind a single lock and guards never cross an `.await`.
//! [`transaction()`] scopes a batch of operations so that an error rolls
//! every mutation back.
//!
//! [`transaction()`]: crate::transaction::transaction

pub mod content;
pub mod error;
pub mod field;
pub mod hooks;
pub mod location;
pub mod model;
pub mod permission;
pub mod relation;
pub mod repository;
pub mod search;
pub mod transaction;

mod store;
mod version;

pub use error::{FieldError, RepositoryError, RepositoryResult};
pub use repository::{Repository, RepositoryBuilder, RepositoryConfig};

/// Common imports for working with the repository.
pub mod prelude {
	pub use crate::content::ContentService;
	pub use crate::error::{FieldError, RepositoryError, RepositoryResult};
	pub use crate::field::{ContentType, FieldDefinition, FieldTypeRegistry, Value};
	pub use crate::location::LocationService;
	pub use crate::model::{
		Content, ContentCreateStruct, ContentInfo, ContentMetadataUpdateStruct,
		ContentUpdateStruct, DraftListItem, Field, FieldInput, Location, LocationCreateStruct,
		LocationSortField, Relation, RelationKind, SortDirection, UserReference, VersionInfo,
		VersionStatus,
	};
	pub use crate::permission::{AllowAll, PermissionResolver};
	pub use crate::relation::{RelationList, RelationService};
	pub use crate::repository::{Repository, RepositoryBuilder, RepositoryConfig};
	pub use crate::search::{
		CompareOp, Criterion, DateTarget, Query, RelationOp, SearchHit, SearchResult,
		SearchService, SortClause, SortTarget, UserTarget,
	};
	pub use crate::transaction::transaction;
}
