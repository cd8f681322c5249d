//! Core data model
//!
//! Item-level metadata ([`ContentInfo`]), per-version metadata
//! ([`VersionInfo`]), tree placements ([`Location`]), directed links
//! ([`Relation`]) and the parameter structs used by the services.

use crate::field::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Reference to an acting user. Passed explicitly to every operation;
/// the repository holds no process-global current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserReference {
	/// User id
	pub id: Uuid,
}

impl UserReference {
	/// Wrap a user id.
	pub fn new(id: Uuid) -> Self {
		Self { id }
	}
}

/// Version lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionStatus {
	/// Editable working copy
	Draft,
	/// The one live version of the item
	Published,
	/// Superseded by a later publish
	Archived,
}

/// Item-level metadata, independent of any version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentInfo {
	/// Unique content id
	pub id: Uuid,

	/// Content type this item instantiates
	pub content_type_id: Uuid,

	/// Display name, denormalized from the main-language name field
	pub name: String,

	/// Section the item is assigned to
	pub section_id: Option<Uuid>,

	/// The published version, or the latest version if none is published
	pub current_version_no: u32,

	/// Globally unique remote id
	pub remote_id: String,

	/// Owning user
	pub owner_id: Uuid,

	/// Main language code
	pub main_language: String,

	/// Main location; `None` until the first publish
	pub main_location_id: Option<Uuid>,

	/// Whether language-less requests may fall back to the main language
	pub always_available: bool,

	/// Whether the item has ever been published and currently is
	pub published: bool,

	/// First publish instant; never overwritten by republishing
	pub published_date: Option<DateTime<Utc>>,

	/// Last mutation instant
	pub modification_date: DateTime<Utc>,

	/// Explicit item-level hidden flag, mirrored onto all locations
	pub is_hidden: bool,
}

/// Metadata for one revision of a content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
	/// Owning content item
	pub content_id: Uuid,

	/// Monotonically increasing version number, starting at 1
	pub version_no: u32,

	/// Lifecycle state
	pub status: VersionStatus,

	/// User who created this version
	pub creator_id: Uuid,

	/// Creation instant
	pub creation_date: DateTime<Utc>,

	/// Last mutation instant
	pub modification_date: DateTime<Utc>,

	/// Language the version was initially created in
	pub initial_language: String,

	/// Translations present on this version, sorted
	pub languages: Vec<String>,

	/// Display name per language
	pub names: HashMap<String, String>,

	/// When each translation was first added to the item. Backs the
	/// required-since exemption for fields made required later.
	pub language_added: HashMap<String, DateTime<Utc>>,
}

impl VersionInfo {
	/// Whether the version carries the given translation.
	pub fn has_language(&self, language: &str) -> bool {
		self.languages.iter().any(|l| l == language)
	}
}

/// One translated field value, as returned on a [`Content`] aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
	/// Field definition identifier
	pub identifier: String,

	/// Language code
	pub language: String,

	/// Typed value
	pub value: Value,
}

/// Aggregate view of a content item at one version: item metadata,
/// version metadata and the (possibly language-filtered) fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
	/// Item-level metadata
	pub info: ContentInfo,

	/// Version metadata
	pub version: VersionInfo,

	/// Field values, sorted by identifier then language
	pub fields: Vec<Field>,
}

impl Content {
	/// Value of a field in a given language, if present.
	pub fn field(&self, identifier: &str, language: &str) -> Option<&Value> {
		self.fields
			.iter()
			.find(|f| f.identifier == identifier && f.language == language)
			.map(|f| &f.value)
	}
}

/// A placement of a content item in the location tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
	/// Unique location id
	pub id: Uuid,

	/// Content item placed here
	pub content_id: Uuid,

	/// Parent location; `None` for top-level locations
	pub parent_id: Option<Uuid>,

	/// Materialized path: parent path followed by own id and `/`
	pub path: String,

	/// Tree depth; top-level locations have depth 1
	pub depth: u32,

	/// Manual sort priority
	pub priority: i32,

	/// Default sort field for children listings
	pub sort_field: LocationSortField,

	/// Default sort order for children listings
	pub sort_order: SortDirection,

	/// Explicit per-node hidden flag
	pub hidden: bool,

	/// Derived: hidden, or any ancestor hidden
	pub invisible: bool,

	/// Globally unique remote id
	pub remote_id: String,
}

/// Default sort field of a location's children listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LocationSortField {
	/// By item name
	#[default]
	Name,
	/// By location priority
	Priority,
	/// By publication date
	Published,
	/// By modification date
	Modified,
	/// By materialized path
	Path,
}

/// Ascending or descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDirection {
	/// Ascending
	#[default]
	Ascending,
	/// Descending
	Descending,
}

/// How a relation between two content items was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
	/// Explicitly added editorial relation
	Common,
	/// Derived from a relation-capable field value
	Field,
	/// Asset usage
	Asset,
	/// Embedded in rich content
	Embed,
}

/// A directed link from one content item's version to another item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
	/// Unique relation id
	pub id: Uuid,

	/// Source content item
	pub source_content_id: Uuid,

	/// Source version the relation belongs to
	pub source_version_no: u32,

	/// Destination content item
	pub destination_content_id: Uuid,

	/// How the relation was established
	pub kind: RelationKind,

	/// For field relations, the originating field definition identifier
	pub source_field: Option<String>,
}

/// One field assignment inside a create or update struct.
#[derive(Debug, Clone)]
pub struct FieldInput {
	/// Field definition identifier
	pub identifier: String,

	/// Language; `None` means the struct's initial language
	pub language: Option<String>,

	/// Value to set
	pub value: Value,
}

/// Parameters for creating the first draft of a new content item.
#[derive(Debug, Clone)]
pub struct ContentCreateStruct {
	/// Content type of the new item
	pub content_type_id: Uuid,

	/// Language the item starts in
	pub initial_language: String,

	/// Caller-supplied remote id; generated when `None`
	pub remote_id: Option<String>,

	/// Section assignment
	pub section_id: Option<Uuid>,

	/// Whether language-less requests fall back to the main language
	pub always_available: bool,

	/// Field assignments
	pub fields: Vec<FieldInput>,
}

impl ContentCreateStruct {
	/// Start a create struct for a content type and initial language.
	pub fn new(content_type_id: Uuid, initial_language: impl Into<String>) -> Self {
		Self {
			content_type_id,
			initial_language: initial_language.into(),
			remote_id: None,
			section_id: None,
			always_available: false,
			fields: Vec::new(),
		}
	}

	/// Assign a field value in the initial language.
	pub fn set_field(mut self, identifier: impl Into<String>, value: Value) -> Self {
		self.fields.push(FieldInput {
			identifier: identifier.into(),
			language: None,
			value,
		});
		self
	}

	/// Assign a field value in an explicit language.
	pub fn set_field_in(
		mut self,
		identifier: impl Into<String>,
		language: impl Into<String>,
		value: Value,
	) -> Self {
		self.fields.push(FieldInput {
			identifier: identifier.into(),
			language: Some(language.into()),
			value,
		});
		self
	}

	/// Set the remote id.
	pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
		self.remote_id = Some(remote_id.into());
		self
	}
}

/// Parameters for updating a draft version.
#[derive(Debug, Clone, Default)]
pub struct ContentUpdateStruct {
	/// New initial language for the draft, if changed
	pub initial_language: Option<String>,

	/// Field assignments, merged onto the draft's existing fields
	pub fields: Vec<FieldInput>,
}

impl ContentUpdateStruct {
	/// Empty update struct.
	pub fn new() -> Self {
		Self::default()
	}

	/// Assign a field value in the draft's initial language.
	pub fn set_field(mut self, identifier: impl Into<String>, value: Value) -> Self {
		self.fields.push(FieldInput {
			identifier: identifier.into(),
			language: None,
			value,
		});
		self
	}

	/// Assign a field value in an explicit language.
	pub fn set_field_in(
		mut self,
		identifier: impl Into<String>,
		language: impl Into<String>,
		value: Value,
	) -> Self {
		self.fields.push(FieldInput {
			identifier: identifier.into(),
			language: Some(language.into()),
			value,
		});
		self
	}
}

/// Parameters for mutating item-level metadata without creating a version.
#[derive(Debug, Clone, Default)]
pub struct ContentMetadataUpdateStruct {
	/// New remote id; must not collide with another item
	pub remote_id: Option<String>,

	/// New main language; must be a translation of the current version
	pub main_language: Option<String>,

	/// New always-available flag
	pub always_available: Option<bool>,

	/// Override the modification date
	pub modification_date: Option<DateTime<Utc>>,

	/// Override the published date
	pub published_date: Option<DateTime<Utc>>,

	/// New denormalized display name
	pub name: Option<String>,

	/// New main location; must belong to the item
	pub main_location_id: Option<Uuid>,
}

impl ContentMetadataUpdateStruct {
	/// Whether no field is set at all.
	pub fn is_empty(&self) -> bool {
		self.remote_id.is_none()
			&& self.main_language.is_none()
			&& self.always_available.is_none()
			&& self.modification_date.is_none()
			&& self.published_date.is_none()
			&& self.name.is_none()
			&& self.main_location_id.is_none()
	}
}

/// Parameters for placing content in the location tree. Declared at
/// content-create time these stay pending until the first publish.
#[derive(Debug, Clone)]
pub struct LocationCreateStruct {
	/// Parent location; `None` creates a top-level location
	pub parent_id: Option<Uuid>,

	/// Manual sort priority
	pub priority: i32,

	/// Create the location hidden
	pub hidden: bool,

	/// Caller-supplied remote id; generated when `None`
	pub remote_id: Option<String>,

	/// Default sort field for children listings
	pub sort_field: LocationSortField,

	/// Default sort order for children listings
	pub sort_order: SortDirection,
}

impl LocationCreateStruct {
	/// Place under the given parent (or top level for `None`).
	pub fn new(parent_id: Option<Uuid>) -> Self {
		Self {
			parent_id,
			priority: 0,
			hidden: false,
			remote_id: None,
			sort_field: LocationSortField::default(),
			sort_order: SortDirection::default(),
		}
	}
}

/// Entry in a draft listing. Items the caller may not read versions of
/// appear as placeholders so counts stay correct.
#[derive(Debug, Clone)]
pub enum DraftListItem {
	/// A readable draft
	Draft(VersionInfo),
	/// Placeholder for a draft the caller is not authorized to read
	Unauthorized {
		/// Policy module that denied the access
		module: &'static str,
		/// Policy function that denied the access
		function: &'static str,
		/// Content item the draft belongs to
		content_id: Uuid,
	},
}
