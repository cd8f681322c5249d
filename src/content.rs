//! Content aggregate store
//!
//! Create/update/publish/delete operations on content items and their
//! versions, translation removal, copying, hiding and draft listings.
//! Every operation consults the permission resolver first, then the
//! version state machine, and only then mutates state. Field validation
//! is two-phase: structural mismatches fail immediately as
//! `InvalidArgument`, business-rule violations are collected across all
//! fields and languages into one `ContentFieldValidation` aggregate.

use crate::error::{RepositoryError, RepositoryResult};
use crate::field::{ContentType, Value, collect_required_errors};
use crate::model::{
	Content, ContentCreateStruct, ContentInfo, ContentMetadataUpdateStruct, ContentUpdateStruct,
	DraftListItem, Field, FieldInput, Location, LocationCreateStruct, Relation, RelationKind,
	UserReference, VersionInfo, VersionStatus,
};
use crate::permission::functions;
use crate::repository::RepositoryInner;
use crate::store::{StoreState, VersionRecord, paginate};
use crate::version::{archive_published, enforce_retention, ensure_draft, merge_selected_languages};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Operations on content items and their versions.
pub struct ContentService {
	inner: Arc<RepositoryInner>,
}

impl ContentService {
	pub(crate) fn new(inner: Arc<RepositoryInner>) -> Self {
		Self { inner }
	}

	/// Create a new content item as a version-1 draft.
	///
	/// Declared locations stay pending until the first publish. Fails
	/// with `InvalidArgument` on a duplicate remote id and with
	/// `ContentFieldValidation` when required fields are missing; in
	/// both cases nothing is persisted.
	pub async fn create_content(
		&self,
		actor: &UserReference,
		create: ContentCreateStruct,
		locations: Vec<LocationCreateStruct>,
	) -> RepositoryResult<Content> {
		self.inner.require(actor, functions::CREATE, None).await?;

		let content_type = self.inner.content_type(create.content_type_id)?;
		if create.initial_language.is_empty() {
			return Err(RepositoryError::ContentValidation(
				"no initial language code given".to_string(),
			));
		}

		let fields = resolve_field_inputs(
			&self.inner,
			&content_type,
			&create.initial_language,
			&create.fields,
		)?;

		let now = Utc::now();
		let mut languages: Vec<String> = fields.keys().map(|(_, lang)| lang.clone()).collect();
		languages.push(create.initial_language.clone());
		languages.sort();
		languages.dedup();
		let language_added: HashMap<_, _> =
			languages.iter().map(|lang| (lang.clone(), now)).collect();

		let mut errors = Vec::new();
		collect_required_errors(
			&content_type,
			&languages,
			&language_added,
			&fields,
			&mut errors,
		);
		for ((identifier, language), value) in &fields {
			if let Some(definition) = content_type.field_definition(identifier) {
				self.inner
					.field_types
					.collect_rule_errors(definition, language, value, &mut errors);
			}
		}
		if !errors.is_empty() {
			return Err(RepositoryError::ContentFieldValidation(errors));
		}

		let id = Uuid::new_v4();
		let content = {
			let mut state = self.inner.state.write();

			let remote_id = match create.remote_id {
				Some(remote_id) => {
					if state.remote_id_taken(&remote_id, None) {
						return Err(RepositoryError::invalid_argument(
							"remote_id",
							format!("remote id '{}' already exists", remote_id),
						));
					}
					remote_id
				}
				None => Uuid::new_v4().simple().to_string(),
			};

			let names = derive_names(&content_type, &fields);
			let info = ContentInfo {
				id,
				content_type_id: content_type.id,
				name: names.get(&create.initial_language).cloned().unwrap_or_default(),
				section_id: create.section_id,
				current_version_no: 1,
				remote_id,
				owner_id: actor.id,
				main_language: create.initial_language.clone(),
				main_location_id: None,
				always_available: create.always_available,
				published: false,
				published_date: None,
				modification_date: now,
				is_hidden: false,
			};
			let record = VersionRecord {
				info: VersionInfo {
					content_id: id,
					version_no: 1,
					status: VersionStatus::Draft,
					creator_id: actor.id,
					creation_date: now,
					modification_date: now,
					initial_language: create.initial_language.clone(),
					languages,
					names,
					language_added,
				},
				fields,
				removed_translations: Vec::new(),
			};

			state.contents.insert(id, info.clone());
			state.versions.insert(id, vec![record]);
			if !locations.is_empty() {
				state.pending_locations.insert(id, locations);
			}
			sync_field_relations(&mut state, id, 1);

			build_content(&state, id, 1, None)?
		};

		tracing::info!(content_id = %id, "content created");
		Ok(content)
	}

	/// Create a new draft from an existing version (the published one by
	/// default). Fields, translations and relations of the source are
	/// carried over.
	pub async fn create_content_draft(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		from_version_no: Option<u32>,
	) -> RepositoryResult<Content> {
		self.inner
			.require(actor, functions::CREATE, Some(content_id))
			.await?;

		let now = Utc::now();
		let content = {
			let mut state = self.inner.state.write();
			let info = state.content(content_id)?.clone();

			let source_no = match from_version_no {
				Some(no) => no,
				None => state
					.published_version(content_id)
					.map(|v| v.info.version_no)
					.unwrap_or(info.current_version_no),
			};
			let source = state.version(content_id, source_no)?.clone();
			let new_no = state.next_version_no(content_id);

			let record = VersionRecord {
				info: VersionInfo {
					content_id,
					version_no: new_no,
					status: VersionStatus::Draft,
					creator_id: actor.id,
					creation_date: now,
					modification_date: now,
					initial_language: source.info.initial_language.clone(),
					languages: source.info.languages.clone(),
					names: source.info.names.clone(),
					language_added: source.info.language_added.clone(),
				},
				fields: source.fields.clone(),
				removed_translations: Vec::new(),
			};

			let copied: Vec<Relation> = state
				.relations
				.iter()
				.filter(|r| {
					r.source_content_id == content_id && r.source_version_no == source_no
				})
				.map(|r| Relation {
					id: Uuid::new_v4(),
					source_version_no: new_no,
					..r.clone()
				})
				.collect();
			state.relations.extend(copied);

			if let Some(versions) = state.versions.get_mut(&content_id) {
				versions.push(record);
			}

			build_content(&state, content_id, new_no, None)?
		};

		tracing::debug!(content_id = %content_id, version_no = content.version.version_no, "draft created");
		Ok(content)
	}

	/// Merge field changes into a draft. Fails with `BadState` on any
	/// non-draft version; item-level metadata is never touched.
	pub async fn update_content(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		version_no: u32,
		update: ContentUpdateStruct,
	) -> RepositoryResult<Content> {
		self.inner
			.require(actor, functions::EDIT, Some(content_id))
			.await?;

		let now = Utc::now();
		let content = {
			let mut state = self.inner.state.write();
			let info = state.content(content_id)?.clone();
			let content_type = self.inner.content_type(info.content_type_id)?;

			let record = state.version(content_id, version_no)?;
			ensure_draft(record)?;

			let default_language = update
				.initial_language
				.clone()
				.unwrap_or_else(|| record.info.initial_language.clone());
			let incoming =
				resolve_field_inputs(&self.inner, &content_type, &default_language, &update.fields)?;

			let mut fields = record.fields.clone();
			let mut languages = record.info.languages.clone();
			let mut language_added = record.info.language_added.clone();
			for ((identifier, language), value) in incoming {
				if !languages.iter().any(|l| l == &language) {
					languages.push(language.clone());
					language_added.entry(language.clone()).or_insert(now);
				}
				fields.insert((identifier, language), value);
			}
			languages.sort();

			let mut errors = Vec::new();
			collect_required_errors(
				&content_type,
				&languages,
				&language_added,
				&fields,
				&mut errors,
			);
			for ((identifier, language), value) in &fields {
				if let Some(definition) = content_type.field_definition(identifier) {
					self.inner
						.field_types
						.collect_rule_errors(definition, language, value, &mut errors);
				}
			}
			if !errors.is_empty() {
				return Err(RepositoryError::ContentFieldValidation(errors));
			}

			let names = derive_names(&content_type, &fields);
			let record = state.version_mut(content_id, version_no)?;
			record.fields = fields;
			record.info.languages = languages;
			record.info.language_added = language_added;
			record.info.names = names;
			record.info.modification_date = now;
			if let Some(language) = update.initial_language {
				record.info.initial_language = language;
			}
			sync_field_relations(&mut state, content_id, version_no);

			build_content(&state, content_id, version_no, None)?
		};

		tracing::debug!(content_id = %content_id, version_no, "draft updated");
		Ok(content)
	}

	/// Publish a draft.
	///
	/// The previously published version (if any) is archived in the same
	/// mutation, pending locations declared at create time materialize,
	/// and the retention limit evicts the oldest archived versions.
	/// `published_date` is set on first publish only. With
	/// `selected_languages` only those translations are taken from the
	/// draft; everything else keeps its previously published value.
	pub async fn publish_version(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		version_no: u32,
		selected_languages: Option<Vec<String>>,
	) -> RepositoryResult<Content> {
		self.inner
			.require(actor, functions::PUBLISH, Some(content_id))
			.await?;

		let now = Utc::now();
		let (content, location_ids, languages, archived_translations) = {
			let mut state = self.inner.state.write();
			let info = state.content(content_id)?.clone();
			let content_type = self.inner.content_type(info.content_type_id)?;

			let record = state.version(content_id, version_no)?;
			ensure_draft(record)?;

			let mut errors = Vec::new();
			collect_required_errors(
				&content_type,
				&record.info.languages,
				&record.info.language_added,
				&record.fields,
				&mut errors,
			);
			for ((identifier, language), value) in &record.fields {
				if let Some(definition) = content_type.field_definition(identifier) {
					self.inner
						.field_types
						.collect_rule_errors(definition, language, value, &mut errors);
				}
			}
			if !errors.is_empty() {
				return Err(RepositoryError::ContentFieldValidation(errors));
			}

			// Validate pending locations before mutating anything
			let pending = state
				.pending_locations
				.get(&content_id)
				.cloned()
				.unwrap_or_default();
			for create in &pending {
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
			}

			if let Some(selected) = &selected_languages {
				merge_selected_languages(
					&mut state,
					content_id,
					version_no,
					selected,
					&info.main_language,
				)?;
			}

			archive_published(&mut state, content_id, version_no, now);

			let record = state.version_mut(content_id, version_no)?;
			record.info.status = VersionStatus::Published;
			record.info.modification_date = now;
			let names = record.info.names.clone();
			let languages = record.info.languages.clone();
			let archived_translations = std::mem::take(&mut record.removed_translations);

			let is_hidden = info.is_hidden;
			let content_info = state.content_mut(content_id)?;
			content_info.current_version_no = version_no;
			content_info.published = true;
			if content_info.published_date.is_none() {
				content_info.published_date = Some(now);
			}
			content_info.modification_date = now;
			if let Some(name) = names.get(&content_info.main_language) {
				content_info.name = name.clone();
			}

			state.pending_locations.remove(&content_id);
			let mut new_locations = Vec::new();
			for create in pending {
				let location = materialize_location(&mut state, content_id, &create, is_hidden);
				new_locations.push(location.id);
				state.locations.insert(location.id, location);
			}
			for id in &new_locations {
				state.recompute_visibility(*id);
			}
			if state.content(content_id)?.main_location_id.is_none()
				&& let Some(first) = new_locations.first().copied()
			{
				state.content_mut(content_id)?.main_location_id = Some(first);
			}

			enforce_retention(
				&mut state,
				content_id,
				self.inner.config.version_history_limit,
			);

			let content = build_content(&state, content_id, version_no, None)?;
			let all_locations: Vec<Uuid> = state
				.locations_of_content(content_id)
				.into_iter()
				.map(|l| l.id)
				.collect();
			(content, all_locations, languages, archived_translations)
		};

		for location_id in &location_ids {
			self.inner
				.url_alias_hooks
				.published(*location_id, &languages)
				.await;
		}
		for language in &archived_translations {
			self.inner
				.url_alias_hooks
				.translation_archived(&location_ids, language)
				.await;
		}
		self.inner.search_index_hooks.index_content(content_id).await;
		self.inner.search_index_hooks.commit().await;

		tracing::info!(content_id = %content_id, version_no, "version published");
		Ok(content)
	}

	/// Mutate item-level metadata without creating a version. Fails with
	/// `InvalidArgument` when the struct has nothing set or the new
	/// remote id collides with another item.
	pub async fn update_content_metadata(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		update: ContentMetadataUpdateStruct,
	) -> RepositoryResult<Content> {
		self.inner
			.require(actor, functions::EDIT, Some(content_id))
			.await?;

		if update.is_empty() {
			return Err(RepositoryError::invalid_argument(
				"metadata_update",
				"no fields are set on the update struct",
			));
		}

		let now = Utc::now();
		let content = {
			let mut state = self.inner.state.write();
			let info = state.content(content_id)?.clone();

			if let Some(remote_id) = &update.remote_id
				&& state.remote_id_taken(remote_id, Some(content_id))
			{
				return Err(RepositoryError::invalid_argument(
					"remote_id",
					format!("remote id '{}' already exists", remote_id),
				));
			}
			if let Some(language) = &update.main_language {
				let current = state.version(content_id, info.current_version_no)?;
				if !current.info.has_language(language) {
					return Err(RepositoryError::invalid_argument(
						"main_language",
						format!("'{}' is not a translation of the content item", language),
					));
				}
			}
			if let Some(location_id) = update.main_location_id {
				let location = state.location(location_id)?;
				if location.content_id != content_id {
					return Err(RepositoryError::invalid_argument(
						"main_location_id",
						"location does not belong to the content item",
					));
				}
			}

			let info = state.content_mut(content_id)?;
			if let Some(remote_id) = update.remote_id {
				info.remote_id = remote_id;
			}
			if let Some(language) = update.main_language {
				info.main_language = language;
			}
			if let Some(always_available) = update.always_available {
				info.always_available = always_available;
			}
			if let Some(published_date) = update.published_date {
				info.published_date = Some(published_date);
			}
			if let Some(name) = update.name {
				info.name = name;
			}
			if let Some(location_id) = update.main_location_id {
				info.main_location_id = Some(location_id);
			}
			info.modification_date = update.modification_date.unwrap_or(now);
			let current = info.current_version_no;

			build_content(&state, content_id, current, None)?
		};

		tracing::debug!(content_id = %content_id, "metadata updated");
		Ok(content)
	}

	/// Duplicate a content item (all versions, or one) into a fresh item
	/// with a generated remote id and a new main location under the
	/// target. Ownership follows `RepositoryConfig::copy_retains_owner`.
	pub async fn copy_content(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		target: LocationCreateStruct,
		version_no: Option<u32>,
	) -> RepositoryResult<Content> {
		self.inner
			.require(actor, functions::CREATE, Some(content_id))
			.await?;

		let now = Utc::now();
		let new_id = Uuid::new_v4();
		let content = {
			let mut state = self.inner.state.write();
			let source_info = state.content(content_id)?.clone();

			let mut records: Vec<VersionRecord> = match version_no {
				Some(no) => {
					let mut record = state.version(content_id, no)?.clone();
					record.info.version_no = 1;
					vec![record]
				}
				None => state.versions_of(content_id)?.clone(),
			};

			for record in &mut records {
				record.info.content_id = new_id;
			}
			let copied_relations: Vec<Relation> = state
				.relations
				.iter()
				.filter(|r| r.source_content_id == content_id)
				.filter(|r| match version_no {
					Some(no) => r.source_version_no == no,
					None => true,
				})
				.map(|r| Relation {
					id: Uuid::new_v4(),
					source_content_id: new_id,
					source_version_no: if version_no.is_some() {
						1
					} else {
						r.source_version_no
					},
					..r.clone()
				})
				.collect();

			let published_no = records
				.iter()
				.find(|r| r.info.status == VersionStatus::Published)
				.map(|r| r.info.version_no);
			let current_no = published_no.unwrap_or_else(|| {
				records.iter().map(|r| r.info.version_no).max().unwrap_or(1)
			});
			let published = published_no.is_some();

			let owner_id = if self.inner.config.copy_retains_owner {
				source_info.owner_id
			} else {
				actor.id
			};

			let info = ContentInfo {
				id: new_id,
				content_type_id: source_info.content_type_id,
				name: source_info.name.clone(),
				section_id: source_info.section_id,
				current_version_no: current_no,
				remote_id: Uuid::new_v4().simple().to_string(),
				owner_id,
				main_language: source_info.main_language.clone(),
				main_location_id: None,
				always_available: source_info.always_available,
				published,
				published_date: if published { source_info.published_date } else { None },
				modification_date: now,
				is_hidden: false,
			};

			state.contents.insert(new_id, info);
			state.versions.insert(new_id, records);
			state.relations.extend(copied_relations);

			if published {
				if let Some(parent_id) = target.parent_id {
					state.location(parent_id)?;
				}
				let location = materialize_location(&mut state, new_id, &target, false);
				let location_id = location.id;
				state.locations.insert(location_id, location);
				state.recompute_visibility(location_id);
				state.content_mut(new_id)?.main_location_id = Some(location_id);
			} else {
				state.pending_locations.insert(new_id, vec![target]);
			}

			build_content(&state, new_id, current_no, None)?
		};

		if content.info.published {
			self.inner.search_index_hooks.index_content(new_id).await;
			self.inner.search_index_hooks.commit().await;
		}
		tracing::info!(source = %content_id, copy = %new_id, "content copied");
		Ok(content)
	}

	/// Hide a content item: sets the item flag and the `hidden` flag of
	/// every location of the item, with invisibility propagating to
	/// descendants.
	pub async fn hide_content(&self, actor: &UserReference, content_id: Uuid) -> RepositoryResult<()> {
		self.set_content_hidden(actor, content_id, true).await
	}

	/// Reveal a content item. Locations whose ancestors remain hidden
	/// stay invisible; hidden-ness is positional.
	pub async fn reveal_content(
		&self,
		actor: &UserReference,
		content_id: Uuid,
	) -> RepositoryResult<()> {
		self.set_content_hidden(actor, content_id, false).await
	}

	async fn set_content_hidden(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		hidden: bool,
	) -> RepositoryResult<()> {
		self.inner
			.require(actor, functions::HIDE, Some(content_id))
			.await?;

		{
			let mut state = self.inner.state.write();
			state.content_mut(content_id)?.is_hidden = hidden;
			state.content_mut(content_id)?.modification_date = Utc::now();
			let location_ids: Vec<Uuid> = state
				.locations_of_content(content_id)
				.into_iter()
				.map(|l| l.id)
				.collect();
			for id in &location_ids {
				if let Some(location) = state.locations.get_mut(id) {
					location.hidden = hidden;
				}
			}
			for id in &location_ids {
				state.recompute_visibility(*id);
			}
		}

		self.inner.search_index_hooks.index_content(content_id).await;
		self.inner.search_index_hooks.commit().await;
		tracing::debug!(content_id = %content_id, hidden, "content visibility changed");
		Ok(())
	}

	/// Delete a content item: every version, every location subtree of
	/// the item and every relation with the item at either endpoint.
	pub async fn delete_content(
		&self,
		actor: &UserReference,
		content_id: Uuid,
	) -> RepositoryResult<()> {
		self.inner
			.require(actor, functions::REMOVE, Some(content_id))
			.await?;

		{
			let mut state = self.inner.state.write();
			state.content(content_id)?;

			let roots = state.locations_of_content(content_id);
			for root in roots {
				for id in state.subtree_ids(&root.path) {
					state.locations.remove(&id);
				}
			}
			// Items whose main location sat inside a removed subtree
			let orphaned: Vec<Uuid> = state
				.contents
				.values()
				.filter(|c| {
					c.main_location_id
						.is_some_and(|id| !state.locations.contains_key(&id))
				})
				.map(|c| c.id)
				.collect();
			for id in orphaned {
				let replacement = state.locations_of_content(id).first().map(|l| l.id);
				if let Some(info) = state.contents.get_mut(&id) {
					info.main_location_id = replacement;
				}
			}

			state.versions.remove(&content_id);
			state.pending_locations.remove(&content_id);
			state.remove_content_relations(content_id);
			state.contents.remove(&content_id);
		}

		self.inner.search_index_hooks.remove_content(content_id).await;
		self.inner.search_index_hooks.commit().await;
		tracing::info!(content_id = %content_id, "content deleted");
		Ok(())
	}

	/// Delete a single version. The published version cannot be deleted;
	/// deleting the last remaining version is permitted and leaves the
	/// item unloadable.
	pub async fn delete_version(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		version_no: u32,
	) -> RepositoryResult<()> {
		self.inner
			.require(actor, functions::REMOVE, Some(content_id))
			.await?;

		{
			let mut state = self.inner.state.write();
			let record = state.version(content_id, version_no)?;
			if record.info.status == VersionStatus::Published {
				return Err(RepositoryError::BadState(format!(
					"version {} is currently published",
					version_no
				)));
			}
			if let Some(versions) = state.versions.get_mut(&content_id) {
				versions.retain(|v| v.info.version_no != version_no);
			}
			state.remove_version_relations(content_id, version_no);

			let remaining_max = state
				.versions
				.get(&content_id)
				.and_then(|versions| versions.iter().map(|v| v.info.version_no).max());
			if let Some(max) = remaining_max {
				let info = state.content_mut(content_id)?;
				if info.current_version_no == version_no {
					info.current_version_no = max;
				}
			}
		}

		tracing::debug!(content_id = %content_id, version_no, "version deleted");
		Ok(())
	}

	/// Remove a translation from every version of the item. The main
	/// translation cannot be removed; a version whose only translation
	/// is removed is deleted entirely.
	pub async fn delete_translation(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		language: &str,
	) -> RepositoryResult<()> {
		self.inner
			.require(actor, functions::REMOVE, Some(content_id))
			.await?;

		let location_ids = {
			let mut state = self.inner.state.write();
			let info = state.content(content_id)?.clone();
			if info.main_language == language {
				return Err(RepositoryError::BadState(format!(
					"'{}' is the main translation of the content item",
					language
				)));
			}
			let present = state
				.versions_of(content_id)?
				.iter()
				.any(|v| v.info.has_language(language));
			if !present {
				return Err(RepositoryError::invalid_argument(
					"language",
					format!("'{}' is not a translation of the content item", language),
				));
			}

			let doomed: Vec<u32> = state
				.versions_of(content_id)?
				.iter()
				.filter(|v| v.info.languages == vec![language.to_string()])
				.map(|v| v.info.version_no)
				.collect();
			for version_no in &doomed {
				state.remove_version_relations(content_id, *version_no);
			}
			if let Some(versions) = state.versions.get_mut(&content_id) {
				versions.retain(|v| !doomed.contains(&v.info.version_no));
				for record in versions.iter_mut() {
					if record.info.has_language(language) {
						strip_translation(record, language);
					}
				}
			}

			let remaining_max = state
				.versions
				.get(&content_id)
				.and_then(|versions| versions.iter().map(|v| v.info.version_no).max());
			let current_survives = state.versions.get(&content_id).is_some_and(|versions| {
				versions
					.iter()
					.any(|v| v.info.version_no == info.current_version_no)
			});
			let info = state.content_mut(content_id)?;
			info.modification_date = Utc::now();
			if let Some(max) = remaining_max
				&& !current_survives
			{
				info.current_version_no = max;
			}

			state
				.locations_of_content(content_id)
				.into_iter()
				.map(|l| l.id)
				.collect::<Vec<_>>()
		};

		self.inner
			.url_alias_hooks
			.translation_removed(&location_ids, language)
			.await;
		tracing::info!(content_id = %content_id, language, "translation deleted");
		Ok(())
	}

	/// Remove a translation from a single draft. Fails with `BadState`
	/// when the version is not a draft, when the language is the main
	/// translation, or when it is the draft's only translation.
	pub async fn delete_translation_from_draft(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		version_no: u32,
		language: &str,
	) -> RepositoryResult<()> {
		self.inner
			.require(actor, functions::EDIT, Some(content_id))
			.await?;

		{
			let mut state = self.inner.state.write();
			let info = state.content(content_id)?.clone();
			let record = state.version(content_id, version_no)?;
			ensure_draft(record)?;
			if info.main_language == language {
				return Err(RepositoryError::BadState(format!(
					"'{}' is the main translation of the content item",
					language
				)));
			}
			if !record.info.has_language(language) {
				return Err(RepositoryError::invalid_argument(
					"language",
					format!("'{}' is not a translation of the draft", language),
				));
			}
			if record.info.languages.len() == 1 {
				return Err(RepositoryError::BadState(format!(
					"'{}' is the only translation of the draft",
					language
				)));
			}

			let record = state.version_mut(content_id, version_no)?;
			strip_translation(record, language);
			record.removed_translations.push(language.to_string());
			record.info.modification_date = Utc::now();
		}

		tracing::debug!(content_id = %content_id, version_no, language, "translation removed from draft");
		Ok(())
	}

	/// Load a content aggregate by id.
	///
	/// With `languages` the fields are filtered to the requested
	/// translations; when none is present the main language is used for
	/// always-available items, otherwise the load fails with `NotFound`.
	/// Drafts are readable by their creator or `versionread` holders.
	/// Archived versions require `versionread` once the configured grace
	/// period after archiving has passed.
	pub async fn load_content(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		languages: Option<&[String]>,
		version_no: Option<u32>,
	) -> RepositoryResult<Content> {
		self.inner
			.require(actor, functions::READ, Some(content_id))
			.await?;
		self.load_content_gated(actor, content_id, languages, version_no)
			.await
	}

	/// Load a content aggregate by remote id.
	pub async fn load_content_by_remote_id(
		&self,
		actor: &UserReference,
		remote_id: &str,
		languages: Option<&[String]>,
		version_no: Option<u32>,
	) -> RepositoryResult<Content> {
		// Gate before resolving so denial never reveals whether the
		// remote id exists
		self.inner.require(actor, functions::READ, None).await?;
		let content_id = {
			let state = self.inner.state.read();
			state.content_by_remote_id(remote_id)?.id
		};
		self.load_content(actor, content_id, languages, version_no)
			.await
	}

	/// Load item-level metadata.
	pub async fn load_content_info(
		&self,
		actor: &UserReference,
		content_id: Uuid,
	) -> RepositoryResult<ContentInfo> {
		self.inner
			.require(actor, functions::READ, Some(content_id))
			.await?;
		let state = self.inner.state.read();
		state.versions_of(content_id)?;
		Ok(state.content(content_id)?.clone())
	}

	/// Load item-level metadata by remote id.
	pub async fn load_content_info_by_remote_id(
		&self,
		actor: &UserReference,
		remote_id: &str,
	) -> RepositoryResult<ContentInfo> {
		self.inner.require(actor, functions::READ, None).await?;
		let content_id = {
			let state = self.inner.state.read();
			state.content_by_remote_id(remote_id)?.id
		};
		self.load_content_info(actor, content_id).await
	}

	/// Load one version's metadata. Non-published versions require
	/// `versionread` (or draft creatorship).
	pub async fn load_version_info(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		version_no: Option<u32>,
	) -> RepositoryResult<VersionInfo> {
		self.inner
			.require(actor, functions::READ, Some(content_id))
			.await?;
		let (info, status, creator) = {
			let state = self.inner.state.read();
			let no = version_no.unwrap_or(state.content(content_id)?.current_version_no);
			let record = state.version(content_id, no)?;
			(
				record.info.clone(),
				record.info.status,
				record.info.creator_id,
			)
		};
		if status != VersionStatus::Published && creator != actor.id {
			self.inner
				.require(actor, functions::VERSIONREAD, Some(content_id))
				.await?;
		}
		Ok(info)
	}

	/// Load all versions of an item, ordered by version number.
	pub async fn load_versions(
		&self,
		actor: &UserReference,
		content_id: Uuid,
	) -> RepositoryResult<Vec<VersionInfo>> {
		self.inner
			.require(actor, functions::VERSIONREAD, Some(content_id))
			.await?;
		let state = self.inner.state.read();
		let mut versions: Vec<VersionInfo> = state
			.versions_of(content_id)?
			.iter()
			.map(|v| v.info.clone())
			.collect();
		versions.sort_by_key(|v| v.version_no);
		Ok(versions)
	}

	/// Number of drafts owned by the given user (the actor by default).
	/// Unauthorized items still count.
	pub async fn count_content_drafts(
		&self,
		actor: &UserReference,
		of_user: Option<&UserReference>,
	) -> RepositoryResult<u64> {
		self.inner.require(actor, functions::VERSIONREAD, None).await?;
		let user = of_user.unwrap_or(actor);
		let state = self.inner.state.read();
		Ok(collect_drafts(&state, user).len() as u64)
	}

	/// Paginated draft listing for the given user (the actor by
	/// default). Items the actor cannot `versionread` appear as
	/// [`DraftListItem::Unauthorized`] placeholders rather than being
	/// omitted, so the total count stays correct.
	pub async fn load_content_draft_list(
		&self,
		actor: &UserReference,
		of_user: Option<&UserReference>,
		offset: usize,
		limit: usize,
	) -> RepositoryResult<Vec<DraftListItem>> {
		self.inner.require(actor, functions::VERSIONREAD, None).await?;
		let user = of_user.unwrap_or(actor);
		let drafts = {
			let state = self.inner.state.read();
			paginate(&collect_drafts(&state, user), offset, limit)
		};

		let mut items = Vec::with_capacity(drafts.len());
		for info in drafts {
			let readable = self
				.inner
				.permissions
				.can(
					actor,
					crate::permission::MODULE_CONTENT,
					functions::VERSIONREAD,
					Some(info.content_id),
				)
				.await;
			if readable {
				items.push(DraftListItem::Draft(info));
			} else {
				items.push(DraftListItem::Unauthorized {
					module: crate::permission::MODULE_CONTENT,
					function: functions::VERSIONREAD,
					content_id: info.content_id,
				});
			}
		}
		Ok(items)
	}

	async fn load_content_gated(
		&self,
		actor: &UserReference,
		content_id: Uuid,
		languages: Option<&[String]>,
		version_no: Option<u32>,
	) -> RepositoryResult<Content> {
		let (status, creator, archived_at, resolved_no) = {
			let state = self.inner.state.read();
			let info = state.content(content_id)?;
			state.versions_of(content_id)?;
			let no = version_no.unwrap_or(info.current_version_no);
			let record = state.version(content_id, no)?;
			(
				record.info.status,
				record.info.creator_id,
				record.info.modification_date,
				no,
			)
		};

		match status {
			VersionStatus::Published => {}
			VersionStatus::Draft => {
				if creator != actor.id {
					self.inner
						.require(actor, functions::VERSIONREAD, Some(content_id))
						.await?;
				}
			}
			VersionStatus::Archived => {
				let within_grace =
					Utc::now() - archived_at <= self.inner.config.version_grace_period;
				if !within_grace {
					self.inner
						.require(actor, functions::VERSIONREAD, Some(content_id))
						.await?;
				}
			}
		}

		let state = self.inner.state.read();
		build_content(&state, content_id, resolved_no, languages)
	}
}

/// Resolve field inputs against the content type: default the language,
/// reject unknown identifiers and non-translatable language overrides,
/// and run the structural phase.
fn resolve_field_inputs(
	inner: &RepositoryInner,
	content_type: &ContentType,
	default_language: &str,
	inputs: &[FieldInput],
) -> RepositoryResult<HashMap<(String, String), Value>> {
	let mut fields = HashMap::new();
	for input in inputs {
		let definition = content_type
			.field_definition(&input.identifier)
			.ok_or_else(|| {
				RepositoryError::invalid_argument(
					format!("fields[{}]", input.identifier),
					format!(
						"content type '{}' has no such field definition",
						content_type.identifier
					),
				)
			})?;
		let language = input
			.language
			.clone()
			.unwrap_or_else(|| default_language.to_string());
		if !definition.translatable && language != default_language {
			return Err(RepositoryError::invalid_argument(
				format!("fields[{}]", input.identifier),
				"field is not translatable",
			));
		}
		inner
			.field_types
			.check_structure(definition, &language, &input.value)?;
		fields.insert((input.identifier.clone(), language), input.value.clone());
	}
	Ok(fields)
}

/// Per-language display names from the content type's name field.
fn derive_names(
	content_type: &ContentType,
	fields: &HashMap<(String, String), Value>,
) -> HashMap<String, String> {
	fields
		.iter()
		.filter(|((identifier, _), _)| *identifier == content_type.name_field)
		.filter_map(|((_, language), value)| {
			value.as_text().map(|text| (language.clone(), text.to_string()))
		})
		.collect()
}

/// Recompute FIELD-kind relations of a version from its relation-capable
/// field values. Field relations are derived, never added directly.
fn sync_field_relations(state: &mut StoreState, content_id: Uuid, version_no: u32) {
	state.relations.retain(|r| {
		!(r.source_content_id == content_id
			&& r.source_version_no == version_no
			&& r.kind == RelationKind::Field)
	});
	let Ok(record) = state.version(content_id, version_no) else {
		return;
	};
	let mut derived = Vec::new();
	for ((identifier, _), value) in &record.fields {
		if let Value::RelationList(ids) = value {
			for destination in ids {
				let duplicate = derived.iter().any(|r: &Relation| {
					r.destination_content_id == *destination
						&& r.source_field.as_deref() == Some(identifier)
				});
				if !duplicate {
					derived.push(Relation {
						id: Uuid::new_v4(),
						source_content_id: content_id,
						source_version_no: version_no,
						destination_content_id: *destination,
						kind: RelationKind::Field,
						source_field: Some(identifier.clone()),
					});
				}
			}
		}
	}
	state.relations.extend(derived);
}

/// Build a new location row; path and depth derive from the parent at
/// creation time.
fn materialize_location(
	state: &mut StoreState,
	content_id: Uuid,
	create: &LocationCreateStruct,
	content_hidden: bool,
) -> Location {
	let id = Uuid::new_v4();
	let (path, depth) = match create.parent_id.and_then(|pid| state.locations.get(&pid)) {
		Some(parent) => (format!("{}{}/", parent.path, id), parent.depth + 1),
		None => (format!("/{}/", id), 1),
	};
	Location {
		id,
		content_id,
		parent_id: create.parent_id,
		path,
		depth,
		priority: create.priority,
		sort_field: create.sort_field,
		sort_order: create.sort_order,
		hidden: create.hidden || content_hidden,
		invisible: false,
		remote_id: create
			.remote_id
			.clone()
			.unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
	}
}

/// Strip one translation from a version record.
fn strip_translation(record: &mut VersionRecord, language: &str) {
	record.fields.retain(|(_, lang), _| lang != language);
	record.info.languages.retain(|l| l != language);
	record.info.names.remove(language);
	record.info.language_added.remove(language);
}

/// Drafts created by `user`, newest first.
fn collect_drafts(state: &StoreState, user: &UserReference) -> Vec<VersionInfo> {
	let mut drafts: Vec<VersionInfo> = state
		.versions
		.values()
		.flatten()
		.filter(|v| v.info.status == VersionStatus::Draft && v.info.creator_id == user.id)
		.map(|v| v.info.clone())
		.collect();
	drafts.sort_by(|a, b| {
		b.modification_date
			.cmp(&a.modification_date)
			.then_with(|| a.content_id.cmp(&b.content_id))
			.then_with(|| a.version_no.cmp(&b.version_no))
	});
	drafts
}

/// Assemble the aggregate view, applying the prioritized-language filter
/// with always-available fallback.
pub(crate) fn build_content(
	state: &StoreState,
	content_id: Uuid,
	version_no: u32,
	languages: Option<&[String]>,
) -> RepositoryResult<Content> {
	let info = state.content(content_id)?.clone();
	let record = state.version(content_id, version_no)?;

	let selected: Option<Vec<String>> = match languages {
		None => None,
		Some(requested) => {
			let present: Vec<String> = requested
				.iter()
				.filter(|lang| record.info.has_language(lang))
				.cloned()
				.collect();
			if !present.is_empty() {
				Some(present)
			} else if info.always_available {
				Some(vec![info.main_language.clone()])
			} else {
				return Err(RepositoryError::not_found(
					"translation",
					requested.join(", "),
				));
			}
		}
	};

	let mut fields: Vec<Field> = record
		.fields
		.iter()
		.filter(|((_, language), _)| {
			selected
				.as_ref()
				.is_none_or(|langs| langs.iter().any(|l| l == language))
		})
		.map(|((identifier, language), value)| Field {
			identifier: identifier.clone(),
			language: language.clone(),
			value: value.clone(),
		})
		.collect();
	fields.sort_by(|a, b| {
		a.identifier
			.cmp(&b.identifier)
			.then_with(|| a.language.cmp(&b.language))
	});

	Ok(Content {
		info,
		version: record.info.clone(),
		fields,
	})
}
