//! In-memory aggregate state
//!
//! [`StoreState`] holds every persisted entity behind the repository. The
//! whole state is `Clone`; the transaction boundary snapshots it on
//! `begin` and restores the snapshot on `rollback`, which also gives
//! in-transaction reads the mutated state for free.

use crate::error::{RepositoryError, RepositoryResult};
use crate::field::Value;
use crate::model::{
	ContentInfo, Location, LocationCreateStruct, Relation, VersionInfo, VersionStatus,
};
use std::collections::HashMap;
use uuid::Uuid;

/// A version together with its field payload and the translations removed
/// from it while it was a draft (replayed as alias history on publish).
#[derive(Debug, Clone)]
pub(crate) struct VersionRecord {
	pub info: VersionInfo,
	pub fields: HashMap<(String, String), Value>,
	pub removed_translations: Vec<String>,
}

/// The entire persisted state of a repository instance.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
	pub contents: HashMap<Uuid, ContentInfo>,
	pub versions: HashMap<Uuid, Vec<VersionRecord>>,
	pub locations: HashMap<Uuid, Location>,
	pub relations: Vec<Relation>,
	pub pending_locations: HashMap<Uuid, Vec<LocationCreateStruct>>,
}

impl StoreState {
	pub fn content(&self, id: Uuid) -> RepositoryResult<&ContentInfo> {
		self.contents
			.get(&id)
			.ok_or_else(|| RepositoryError::not_found("content", id))
	}

	pub fn content_mut(&mut self, id: Uuid) -> RepositoryResult<&mut ContentInfo> {
		self.contents
			.get_mut(&id)
			.ok_or_else(|| RepositoryError::not_found("content", id))
	}

	pub fn content_by_remote_id(&self, remote_id: &str) -> RepositoryResult<&ContentInfo> {
		self.contents
			.values()
			.find(|c| c.remote_id == remote_id)
			.ok_or_else(|| RepositoryError::not_found("content", remote_id))
	}

	/// Whether another item already uses this remote id.
	pub fn remote_id_taken(&self, remote_id: &str, except: Option<Uuid>) -> bool {
		self.contents
			.values()
			.any(|c| c.remote_id == remote_id && Some(c.id) != except)
	}

	pub fn versions_of(&self, content_id: Uuid) -> RepositoryResult<&Vec<VersionRecord>> {
		self.versions
			.get(&content_id)
			.filter(|v| !v.is_empty())
			.ok_or_else(|| RepositoryError::not_found("content", content_id))
	}

	pub fn version(&self, content_id: Uuid, version_no: u32) -> RepositoryResult<&VersionRecord> {
		self.versions
			.get(&content_id)
			.and_then(|versions| versions.iter().find(|v| v.info.version_no == version_no))
			.ok_or_else(|| {
				RepositoryError::not_found("version", format!("{}/{}", content_id, version_no))
			})
	}

	pub fn version_mut(
		&mut self,
		content_id: Uuid,
		version_no: u32,
	) -> RepositoryResult<&mut VersionRecord> {
		self.versions
			.get_mut(&content_id)
			.and_then(|versions| {
				versions
					.iter_mut()
					.find(|v| v.info.version_no == version_no)
			})
			.ok_or_else(|| {
				RepositoryError::not_found("version", format!("{}/{}", content_id, version_no))
			})
	}

	/// The currently published version of an item, if any.
	pub fn published_version(&self, content_id: Uuid) -> Option<&VersionRecord> {
		self.versions
			.get(&content_id)?
			.iter()
			.find(|v| v.info.status == VersionStatus::Published)
	}

	pub fn has_published_version(&self, content_id: Uuid) -> bool {
		self.published_version(content_id).is_some()
	}

	/// Next version number for an item: max existing + 1, or 1.
	pub fn next_version_no(&self, content_id: Uuid) -> u32 {
		self.versions
			.get(&content_id)
			.and_then(|versions| versions.iter().map(|v| v.info.version_no).max())
			.map_or(1, |n| n + 1)
	}

	pub fn location(&self, id: Uuid) -> RepositoryResult<&Location> {
		self.locations
			.get(&id)
			.ok_or_else(|| RepositoryError::not_found("location", id))
	}

	pub fn location_by_remote_id(&self, remote_id: &str) -> RepositoryResult<&Location> {
		self.locations
			.values()
			.find(|l| l.remote_id == remote_id)
			.ok_or_else(|| RepositoryError::not_found("location", remote_id))
	}

	pub fn location_remote_id_taken(&self, remote_id: &str) -> bool {
		self.locations.values().any(|l| l.remote_id == remote_id)
	}

	/// Locations of a content item, sorted by path.
	pub fn locations_of_content(&self, content_id: Uuid) -> Vec<Location> {
		let mut locations: Vec<Location> = self
			.locations
			.values()
			.filter(|l| l.content_id == content_id)
			.cloned()
			.collect();
		locations.sort_by(|a, b| a.path.cmp(&b.path));
		locations
	}

	/// Ids of every location in the subtree rooted at `path`, inclusive.
	pub fn subtree_ids(&self, path: &str) -> Vec<Uuid> {
		let mut ids: Vec<(String, Uuid)> = self
			.locations
			.values()
			.filter(|l| l.path.starts_with(path))
			.map(|l| (l.path.clone(), l.id))
			.collect();
		ids.sort();
		ids.into_iter().map(|(_, id)| id).collect()
	}

	/// Recompute `invisible` for the subtree rooted at `root_id`, walking
	/// top-down so each node sees its parent's already-recomputed state.
	pub fn recompute_visibility(&mut self, root_id: Uuid) {
		let Some(root) = self.locations.get(&root_id) else {
			return;
		};
		let parent_invisible = root
			.parent_id
			.and_then(|pid| self.locations.get(&pid))
			.is_some_and(|p| p.invisible);
		let path = root.path.clone();
		for id in self.subtree_ids(&path) {
			let node_parent_invisible = if id == root_id {
				parent_invisible
			} else {
				self.locations
					.get(&id)
					.and_then(|n| n.parent_id)
					.and_then(|pid| self.locations.get(&pid))
					.is_some_and(|p| p.invisible)
			};
			if let Some(node) = self.locations.get_mut(&id) {
				node.invisible = node.hidden || node_parent_invisible;
			}
		}
	}

	/// Drop every relation touching the given version of an item.
	pub fn remove_version_relations(&mut self, content_id: Uuid, version_no: u32) {
		self.relations.retain(|r| {
			!(r.source_content_id == content_id && r.source_version_no == version_no)
		});
	}

	/// Drop every relation with the item at either endpoint.
	pub fn remove_content_relations(&mut self, content_id: Uuid) {
		self.relations
			.retain(|r| r.source_content_id != content_id && r.destination_content_id != content_id);
	}
}

/// Offset/limit slice over an already-ordered collection.
pub(crate) fn paginate<T: Clone>(items: &[T], offset: usize, limit: usize) -> Vec<T> {
	items.iter().skip(offset).take(limit).cloned().collect()
}
