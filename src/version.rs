//! Version lifecycle state machine
//!
//! Draft → Published → Archived. At most one version of an item is
//! published at a time; publishing archives the predecessor in the same
//! mutation. Retention is bounded: publishing past the configured limit
//! evicts the oldest archived versions.

use crate::error::{RepositoryError, RepositoryResult};
use crate::model::VersionStatus;
use crate::store::{StoreState, VersionRecord};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Guard: the operation only applies to drafts.
pub(crate) fn ensure_draft(record: &VersionRecord) -> RepositoryResult<()> {
	match record.info.status {
		VersionStatus::Draft => Ok(()),
		VersionStatus::Published => Err(RepositoryError::BadState(format!(
			"version {} is already published",
			record.info.version_no
		))),
		VersionStatus::Archived => Err(RepositoryError::BadState(format!(
			"version {} is not a draft",
			record.info.version_no
		))),
	}
}

/// Transition the currently published version (if any, and if it is not
/// `except_version_no`) to archived.
pub(crate) fn archive_published(
	state: &mut StoreState,
	content_id: Uuid,
	except_version_no: u32,
	now: DateTime<Utc>,
) {
	if let Some(versions) = state.versions.get_mut(&content_id) {
		for record in versions.iter_mut() {
			if record.info.status == VersionStatus::Published
				&& record.info.version_no != except_version_no
			{
				record.info.status = VersionStatus::Archived;
				record.info.modification_date = now;
				tracing::debug!(
					content_id = %content_id,
					version_no = record.info.version_no,
					"version archived"
				);
			}
		}
	}
}

/// Evict the oldest archived versions so that no more than `limit`
/// published + archived versions remain. Drafts never count against the
/// limit and are never evicted.
pub(crate) fn enforce_retention(state: &mut StoreState, content_id: Uuid, limit: usize) {
	let Some(versions) = state.versions.get_mut(&content_id) else {
		return;
	};
	loop {
		let retained = versions
			.iter()
			.filter(|v| v.info.status != VersionStatus::Draft)
			.count();
		if retained <= limit {
			break;
		}
		let Some(oldest_no) = versions
			.iter()
			.filter(|v| v.info.status == VersionStatus::Archived)
			.map(|v| v.info.version_no)
			.min()
		else {
			break;
		};
		versions.retain(|v| v.info.version_no != oldest_no);
		tracing::warn!(
			content_id = %content_id,
			version_no = oldest_no,
			"archived version evicted by retention limit"
		);
		state
			.relations
			.retain(|r| !(r.source_content_id == content_id && r.source_version_no == oldest_no));
	}
}

/// Apply "publish with selected languages" semantics to a draft before
/// it transitions to published.
///
/// The published result starts from the currently published translations
/// and takes only the selected languages from the draft. A selected
/// language absent from the draft is a no-op for that language. Without
/// a previously published version the draft is simply narrowed to the
/// selected languages (the main language is always kept).
pub(crate) fn merge_selected_languages(
	state: &mut StoreState,
	content_id: Uuid,
	draft_version_no: u32,
	selected: &[String],
	main_language: &str,
) -> RepositoryResult<()> {
	let published = state
		.published_version(content_id)
		.map(|p| (p.info.clone(), p.fields.clone()));

	let draft = state.version_mut(content_id, draft_version_no)?;

	// Base: the published translations, or just the draft's main
	// language when nothing was published before
	let (mut fields, mut names, mut languages) = match &published {
		Some((info, fields)) => (fields.clone(), info.names.clone(), info.languages.clone()),
		None => {
			let fields = draft
				.fields
				.iter()
				.filter(|((_, lang), _)| lang == main_language)
				.map(|(key, value)| (key.clone(), value.clone()))
				.collect();
			let names = draft
				.info
				.names
				.iter()
				.filter(|(lang, _)| lang.as_str() == main_language)
				.map(|(lang, name)| (lang.clone(), name.clone()))
				.collect();
			(fields, names, vec![main_language.to_string()])
		}
	};

	for language in selected {
		if !draft.info.has_language(language) {
			// Selected but not touched by the draft: keep published value
			continue;
		}
		fields.retain(|(_, lang), _| lang != language);
		for ((identifier, lang), value) in &draft.fields {
			if lang == language {
				fields.insert((identifier.clone(), lang.clone()), value.clone());
			}
		}
		if let Some(name) = draft.info.names.get(language) {
			names.insert(language.clone(), name.clone());
		}
		if !languages.iter().any(|l| l == language) {
			languages.push(language.clone());
		}
	}
	languages.sort();

	draft.fields = fields;
	draft.info.names = names;
	draft.info.languages = languages;
	Ok(())
}
