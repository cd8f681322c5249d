//! Location tree
//!
//! Hierarchical placements of published content. Paths are materialized
//! (`/parent-ids…/own-id/`) and recomputed on move; visibility splits
//! into the explicit per-node `hidden` flag and the derived `invisible`
//! state, which is true whenever the node or any ancestor is hidden.

use crate::content::build_content;
use crate::error::{RepositoryError, RepositoryResult};
use crate::model::{Content, Location, LocationCreateStruct, UserReference};
use crate::permission::functions;
use crate::repository::RepositoryInner;
use crate::store::paginate;
use std::sync::Arc;
use uuid::Uuid;

/// Operations on the location tree.
pub struct LocationService {
	inner: Arc<RepositoryInner>,
}

impl LocationService {
	pub(crate) fn new(inner: Arc<RepositoryInner>) -> Self {
		Self { inner }
	}

	/// Place published content at a new location. Unpublished content
	/// cannot be placed explicitly; its pending locations materialize on
	/// publish.
	pub async fn create_location(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		create: LocationCreateStruct,
	) -> RepositoryResult<Location> {
		self.inner
			.require(actor, functions::EDIT, Some(content_id))
			.await?;

		let location = {
			let mut state = self.inner.state.write();
			let info = state.content(content_id)?.clone();
			if !info.published {
				return Err(RepositoryError::BadState(
					"content item is not published".to_string(),
				));
			}
			if let Some(parent_id) = create.parent_id {
				state.location(parent_id)?;
			}
			if let Some(remote_id) = &create.remote_id
				&& state.location_remote_id_taken(remote_id)
			{
				return Err(RepositoryError::invalid_argument(
					"remote_id",
					format!("location remote id '{}' already exists", remote_id),
				));
			}

			let id = Uuid::new_v4();
			let (path, depth) = match create.parent_id.and_then(|pid| state.locations.get(&pid)) {
				Some(parent) => (format!("{}{}/", parent.path, id), parent.depth + 1),
				None => (format!("/{}/", id), 1),
			};
			let location = Location {
				id,
				content_id,
				parent_id: create.parent_id,
				path,
				depth,
				priority: create.priority,
				sort_field: create.sort_field,
				sort_order: create.sort_order,
				hidden: create.hidden || info.is_hidden,
				invisible: false,
				remote_id: create
					.remote_id
					.unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
			};
			state.locations.insert(id, location);
			state.recompute_visibility(id);

			if state.content(content_id)?.main_location_id.is_none() {
				state.content_mut(content_id)?.main_location_id = Some(id);
			}
			state.location(id)?.clone()
		};

		tracing::debug!(location_id = %location.id, content_id = %content_id, "location created");
		Ok(location)
	}

	/// Load a location by id.
	pub async fn load_location(
		&self,
		actor: &UserReference,
		location_id: Uuid,
	) -> RepositoryResult<Location> {
		self.inner.require(actor, functions::READ, None).await?;
		let state = self.inner.state.read();
		Ok(state.location(location_id)?.clone())
	}

	/// Load a location by remote id.
	pub async fn load_location_by_remote_id(
		&self,
		actor: &UserReference,
		remote_id: &str,
	) -> RepositoryResult<Location> {
		self.inner.require(actor, functions::READ, None).await?;
		let state = self.inner.state.read();
		Ok(state.location_by_remote_id(remote_id)?.clone())
	}

	/// All locations of a content item, ordered by path.
	pub async fn load_locations_of_content(
		&self,
		actor: &UserReference,
		content_id: Uuid,
	) -> RepositoryResult<Vec<Location>> {
		self.inner
			.require(actor, functions::READ, Some(content_id))
			.await?;
		let state = self.inner.state.read();
		state.content(content_id)?;
		Ok(state.locations_of_content(content_id))
	}

	/// Direct children of a location, ordered by path.
	pub async fn load_children(
		&self,
		actor: &UserReference,
		location_id: Uuid,
	) -> RepositoryResult<Vec<Location>> {
		self.inner.require(actor, functions::READ, None).await?;
		let state = self.inner.state.read();
		state.location(location_id)?;
		let mut children: Vec<Location> = state
			.locations
			.values()
			.filter(|l| l.parent_id == Some(location_id))
			.cloned()
			.collect();
		children.sort_by(|a, b| a.path.cmp(&b.path));
		Ok(children)
	}

	/// The content aggregate placed at a location.
	pub async fn load_content_at(
		&self,
		actor: &UserReference,
		location_id: Uuid,
	) -> RepositoryResult<Content> {
		let content_id = {
			let state = self.inner.state.read();
			state.location(location_id)?.content_id
		};
		self.inner
			.require(actor, functions::READ, Some(content_id))
			.await?;
		let state = self.inner.state.read();
		let current = state.content(content_id)?.current_version_no;
		build_content(&state, content_id, current, None)
	}

	/// Move a subtree under a new parent. Paths and depths of every
	/// descendant are recomputed; moving a node under itself or one of
	/// its descendants fails.
	pub async fn move_subtree(
		&self,
		actor: &UserReference,
		location_id: Uuid,
		new_parent_id: Option<Uuid>,
	) -> RepositoryResult<Location> {
		self.inner.require(actor, functions::EDIT, None).await?;

		let location = {
			let mut state = self.inner.state.write();
			let moving = state.location(location_id)?.clone();
			let (parent_path, parent_depth) = match new_parent_id {
				Some(parent_id) => {
					let parent = state.location(parent_id)?;
					if parent.path.starts_with(&moving.path) {
						return Err(RepositoryError::invalid_argument(
							"new_parent_id",
							"cannot move a location into its own subtree",
						));
					}
					(parent.path.clone(), parent.depth)
				}
				None => ("/".to_string(), 0),
			};

			let old_prefix = moving.path.clone();
			let new_prefix = format!("{}{}/", parent_path, moving.id);
			let depth_delta = (parent_depth + 1) as i64 - moving.depth as i64;

			for id in state.subtree_ids(&old_prefix) {
				if let Some(node) = state.locations.get_mut(&id) {
					node.path = format!("{}{}", new_prefix, &node.path[old_prefix.len()..]);
					node.depth = (node.depth as i64 + depth_delta) as u32;
				}
			}
			if let Some(node) = state.locations.get_mut(&location_id) {
				node.parent_id = new_parent_id;
			}
			state.recompute_visibility(location_id);
			state.location(location_id)?.clone()
		};

		tracing::debug!(location_id = %location_id, "subtree moved");
		Ok(location)
	}

	/// Hide a location. The node and every descendant become invisible.
	pub async fn hide_location(
		&self,
		actor: &UserReference,
		location_id: Uuid,
	) -> RepositoryResult<Location> {
		self.set_hidden(actor, location_id, true).await
	}

	/// Clear a location's hidden flag. Descendants that are hidden in
	/// their own right, or that sit under another hidden ancestor, stay
	/// invisible.
	pub async fn unhide_location(
		&self,
		actor: &UserReference,
		location_id: Uuid,
	) -> RepositoryResult<Location> {
		self.set_hidden(actor, location_id, false).await
	}

	async fn set_hidden(
		&self,
		actor: &UserReference,
		location_id: Uuid,
		hidden: bool,
	) -> RepositoryResult<Location> {
		self.inner.require(actor, functions::HIDE, None).await?;

		let location = {
			let mut state = self.inner.state.write();
			state.location(location_id)?;
			if let Some(node) = state.locations.get_mut(&location_id) {
				node.hidden = hidden;
			}
			state.recompute_visibility(location_id);
			state.location(location_id)?.clone()
		};

		let content_id = location.content_id;
		self.inner.search_index_hooks.index_content(content_id).await;
		self.inner.search_index_hooks.commit().await;
		tracing::debug!(location_id = %location_id, hidden, "location visibility changed");
		Ok(location)
	}

	/// Change a location's manual sort priority.
	pub async fn update_priority(
		&self,
		actor: &UserReference,
		location_id: Uuid,
		priority: i32,
	) -> RepositoryResult<Location> {
		self.inner.require(actor, functions::EDIT, None).await?;
		let mut state = self.inner.state.write();
		state.location(location_id)?;
		if let Some(node) = state.locations.get_mut(&location_id) {
			node.priority = priority;
		}
		Ok(state.location(location_id)?.clone())
	}

	/// Delete a location and its whole subtree. Content items losing
	/// their main location fall back to another remaining location.
	pub async fn delete_location(
		&self,
		actor: &UserReference,
		location_id: Uuid,
	) -> RepositoryResult<()> {
		self.inner.require(actor, functions::REMOVE, None).await?;

		{
			let mut state = self.inner.state.write();
			let path = state.location(location_id)?.path.clone();
			let removed = state.subtree_ids(&path);
			let affected: Vec<Uuid> = removed
				.iter()
				.filter_map(|id| state.locations.get(id).map(|l| l.content_id))
				.collect();
			for id in &removed {
				state.locations.remove(id);
			}
			for content_id in affected {
				let is_main_gone = state
					.contents
					.get(&content_id)
					.and_then(|c| c.main_location_id)
					.is_some_and(|id| !state.locations.contains_key(&id));
				if is_main_gone {
					let replacement = state.locations_of_content(content_id).first().map(|l| l.id);
					if let Some(info) = state.contents.get_mut(&content_id) {
						info.main_location_id = replacement;
					}
				}
			}
		}

		tracing::debug!(location_id = %location_id, "location subtree deleted");
		Ok(())
	}

	/// Total number of locations in the tree.
	pub async fn count_all_locations(&self, actor: &UserReference) -> RepositoryResult<u64> {
		self.inner.require(actor, functions::READ, None).await?;
		let state = self.inner.state.read();
		Ok(state.locations.len() as u64)
	}

	/// Flat pagination over the whole tree, ordered by path.
	pub async fn load_all_locations(
		&self,
		actor: &UserReference,
		offset: usize,
		limit: usize,
	) -> RepositoryResult<Vec<Location>> {
		self.inner.require(actor, functions::READ, None).await?;
		let state = self.inner.state.read();
		let mut all: Vec<Location> = state.locations.values().cloned().collect();
		all.sort_by(|a, b| a.path.cmp(&b.path));
		Ok(paginate(&all, offset, limit))
	}
}
