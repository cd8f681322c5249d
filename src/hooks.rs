//! External lifecycle hooks
//!
//! The repository does not compute URL aliases and does not assume a
//! synchronous search index. Both concerns are notified through these
//! seams; the bundled in-memory search engine reads the store directly,
//! so the no-op implementations are sufficient for self-contained use.

use async_trait::async_trait;
use uuid::Uuid;

/// Notified when locations gain or lose language/path pairs.
#[async_trait]
pub trait UrlAliasHooks: Send + Sync {
	/// A version was published at these locations for these languages.
	async fn published(&self, location_id: Uuid, languages: &[String]);

	/// A translation was removed from the whole item; aliases for the
	/// language on these locations must be purged.
	async fn translation_removed(&self, location_ids: &[Uuid], language: &str);

	/// A translation removed from a draft went live on publish; aliases
	/// for the language become history instead of being deleted.
	async fn translation_archived(&self, location_ids: &[Uuid], language: &str);
}

/// Notified when content changes in ways a search index must observe.
#[async_trait]
pub trait SearchIndexHooks: Send + Sync {
	/// (Re-)index an item after publish, hide or reveal.
	async fn index_content(&self, content_id: Uuid);

	/// Drop an item from the index after deletion.
	async fn remove_content(&self, content_id: Uuid);

	/// Flush pending index work so queries observe the changes.
	async fn commit(&self);
}

/// No-op alias hooks.
pub struct NullUrlAliasHooks;

#[async_trait]
impl UrlAliasHooks for NullUrlAliasHooks {
	async fn published(&self, _location_id: Uuid, _languages: &[String]) {}

	async fn translation_removed(&self, _location_ids: &[Uuid], _language: &str) {}

	async fn translation_archived(&self, _location_ids: &[Uuid], _language: &str) {}
}

/// No-op index hooks.
pub struct NullSearchIndexHooks;

#[async_trait]
impl SearchIndexHooks for NullSearchIndexHooks {
	async fn index_content(&self, _content_id: Uuid) {}

	async fn remove_content(&self, _content_id: Uuid) {}

	async fn commit(&self) {}
}
