//! Relation graph
//!
//! Directed edges between content items. Common relations are added and
//! removed on draft versions; field relations are derived from
//! relation-capable field values and never mutated directly. Queried
//! relations are filtered by version status: an edge is visible only
//! while the appropriate endpoint has a published version.

use crate::error::{RepositoryError, RepositoryResult};
use crate::model::{Relation, RelationKind, UserReference};
use crate::permission::functions;
use crate::repository::RepositoryInner;
use crate::store::paginate;
use crate::version::ensure_draft;
use std::sync::Arc;
use uuid::Uuid;

/// A page of relations with the filtered total.
#[derive(Debug, Clone)]
pub struct RelationList {
	/// The requested slice
	pub items: Vec<Relation>,

	/// Total number of visible relations, ignoring pagination
	pub total_count: u64,
}

/// Operations on the relation graph.
pub struct RelationService {
	inner: Arc<RepositoryInner>,
}

impl RelationService {
	pub(crate) fn new(inner: Arc<RepositoryInner>) -> Self {
		Self { inner }
	}

	/// Add a common relation from a draft version to another item.
	pub async fn add_relation(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		version_no: u32,
		destination_content_id: Uuid,
	) -> RepositoryResult<Relation> {
		self.inner
			.require(actor, functions::EDIT, Some(content_id))
			.await?;

		let relation = {
			let mut state = self.inner.state.write();
			let record = state.version(content_id, version_no)?;
			ensure_draft(record)?;
			state.content(destination_content_id)?;

			let relation = Relation {
				id: Uuid::new_v4(),
				source_content_id: content_id,
				source_version_no: version_no,
				destination_content_id,
				kind: RelationKind::Common,
				source_field: None,
			};
			state.relations.push(relation.clone());
			relation
		};

		tracing::debug!(
			source = %content_id,
			destination = %destination_content_id,
			"relation added"
		);
		Ok(relation)
	}

	/// Remove a common relation from a draft version. Fails with
	/// `InvalidArgument` when no matching common relation exists.
	pub async fn delete_relation(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		version_no: u32,
		destination_content_id: Uuid,
	) -> RepositoryResult<()> {
		self.inner
			.require(actor, functions::EDIT, Some(content_id))
			.await?;

		let mut state = self.inner.state.write();
		let record = state.version(content_id, version_no)?;
		ensure_draft(record)?;

		let before = state.relations.len();
		state.relations.retain(|r| {
			!(r.source_content_id == content_id
				&& r.source_version_no == version_no
				&& r.destination_content_id == destination_content_id
				&& r.kind == RelationKind::Common)
		});
		if state.relations.len() == before {
			return Err(RepositoryError::invalid_argument(
				"destination_content_id",
				"there is no common relation to the given content item",
			));
		}
		Ok(())
	}

	/// Relations going out of one version, filtered to destinations that
	/// have a published version.
	pub async fn load_relation_list(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		version_no: u32,
		kind: Option<RelationKind>,
		offset: usize,
		limit: usize,
	) -> RepositoryResult<RelationList> {
		self.inner
			.require(actor, functions::READ, Some(content_id))
			.await?;
		let state = self.inner.state.read();
		state.version(content_id, version_no)?;
		let visible = outgoing(&state, content_id, version_no, kind);
		Ok(RelationList {
			total_count: visible.len() as u64,
			items: paginate(&visible, offset, limit),
		})
	}

	/// Count of visible outgoing relations; always equals the total of
	/// [`load_relation_list`].
	pub async fn count_relations(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		version_no: u32,
		kind: Option<RelationKind>,
	) -> RepositoryResult<u64> {
		self.inner
			.require(actor, functions::READ, Some(content_id))
			.await?;
		let state = self.inner.state.read();
		state.version(content_id, version_no)?;
		Ok(outgoing(&state, content_id, version_no, kind).len() as u64)
	}

	/// Relations pointing into an item from published source versions.
	pub async fn load_reverse_relation_list(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		kind: Option<RelationKind>,
		offset: usize,
		limit: usize,
	) -> RepositoryResult<RelationList> {
		self.inner
			.require(actor, functions::READ, Some(content_id))
			.await?;
		let state = self.inner.state.read();
		state.content(content_id)?;
		let visible = incoming(&state, content_id, kind);
		Ok(RelationList {
			total_count: visible.len() as u64,
			items: paginate(&visible, offset, limit),
		})
	}

	/// Count of visible reverse relations; always equals the total of
	/// [`load_reverse_relation_list`].
	pub async fn count_reverse_relations(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		kind: Option<RelationKind>,
	) -> RepositoryResult<u64> {
		self.inner
			.require(actor, functions::READ, Some(content_id))
			.await?;
		let state = self.inner.state.read();
		state.content(content_id)?;
		Ok(incoming(&state, content_id, kind).len() as u64)
	}
}

fn outgoing(
	state: &crate::store::StoreState,
	content_id: Uuid,
	version_no: u32,
	kind: Option<RelationKind>,
) -> Vec<Relation> {
	let mut relations: Vec<Relation> = state
		.relations
		.iter()
		.filter(|r| r.source_content_id == content_id && r.source_version_no == version_no)
		.filter(|r| kind.is_none_or(|k| r.kind == k))
		.filter(|r| state.has_published_version(r.destination_content_id))
		.cloned()
		.collect();
	relations.sort_by(|a, b| {
		a.destination_content_id
			.cmp(&b.destination_content_id)
			.then_with(|| a.id.cmp(&b.id))
	});
	relations
}

fn incoming(
	state: &crate::store::StoreState,
	content_id: Uuid,
	kind: Option<RelationKind>,
) -> Vec<Relation> {
	let mut relations: Vec<Relation> = state
		.relations
		.iter()
		.filter(|r| r.destination_content_id == content_id)
		.filter(|r| kind.is_none_or(|k| r.kind == k))
		.filter(|r| {
			// Only edges owned by the source's published version count
			state
				.published_version(r.source_content_id)
				.is_some_and(|v| v.info.version_no == r.source_version_no)
		})
		.cloned()
		.collect();
	relations.sort_by(|a, b| {
		a.source_content_id
			.cmp(&b.source_content_id)
			.then_with(|| a.id.cmp(&b.id))
	});
	relations
}
