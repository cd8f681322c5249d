//! Repository facade
//!
//! Entry point tying the stores together: configuration, content-type
//! registration, the transaction boundary and factory accessors for each
//! sub-service. All state sits behind one [`parking_lot::RwLock`]; lock
//! guards never cross an `.await`.

use crate::content::ContentService;
use crate::error::{RepositoryError, RepositoryResult};
use crate::field::{ContentType, FieldTypeRegistry};
use crate::hooks::{NullSearchIndexHooks, NullUrlAliasHooks, SearchIndexHooks, UrlAliasHooks};
use crate::location::LocationService;
use crate::model::UserReference;
use crate::permission::{AllowAll, MODULE_CONTENT, PermissionResolver};
use crate::relation::RelationService;
use crate::search::SearchService;
use crate::store::StoreState;
use chrono::Duration;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use uuid::Uuid;

/// Engine-level knobs.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
	/// Maximum published + archived versions retained per item.
	/// Publishing beyond the limit evicts the oldest archived versions.
	pub version_history_limit: usize,

	/// Window during which a just-archived version stays readable with
	/// plain read permission, checked against wall clock at read time.
	pub version_grace_period: Duration,

	/// Whether copies keep the source owner instead of being reassigned
	/// to the acting user.
	pub copy_retains_owner: bool,
}

impl Default for RepositoryConfig {
	fn default() -> Self {
		Self {
			version_history_limit: 6,
			version_grace_period: Duration::seconds(30),
			copy_retains_owner: false,
		}
	}
}

pub(crate) struct RepositoryInner {
	pub config: RepositoryConfig,
	pub state: RwLock<StoreState>,
	pub snapshot: Mutex<Option<StoreState>>,
	pub content_types: DashMap<Uuid, ContentType>,
	pub field_types: FieldTypeRegistry,
	pub permissions: Arc<dyn PermissionResolver>,
	pub url_alias_hooks: Arc<dyn UrlAliasHooks>,
	pub search_index_hooks: Arc<dyn SearchIndexHooks>,
}

impl RepositoryInner {
	/// Permission gate. Runs before any state check so denial never
	/// leaks entity existence.
	pub async fn require(
		&self,
		actor: &UserReference,
		function: &'static str,
		object: Option<Uuid>,
	) -> RepositoryResult<()> {
		if self
			.permissions
			.can(actor, MODULE_CONTENT, function, object)
			.await
		{
			Ok(())
		} else {
			Err(RepositoryError::Unauthorized {
				module: MODULE_CONTENT,
				function,
			})
		}
	}

	pub fn content_type(&self, id: Uuid) -> RepositoryResult<ContentType> {
		self.content_types
			.get(&id)
			.map(|ct| ct.clone())
			.ok_or_else(|| RepositoryError::not_found("content type", id))
	}

	pub fn content_type_by_identifier(&self, identifier: &str) -> Option<ContentType> {
		self.content_types
			.iter()
			.find(|ct| ct.identifier == identifier)
			.map(|ct| ct.clone())
	}
}

/// The repository facade. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Repository {
	pub(crate) inner: Arc<RepositoryInner>,
}

impl Repository {
	/// Repository with default configuration, an allow-all permission
	/// resolver and no-op hooks.
	pub fn new() -> Self {
		RepositoryBuilder::new().build()
	}

	/// Repository with explicit configuration.
	pub fn with_config(config: RepositoryConfig) -> Self {
		RepositoryBuilder::new().config(config).build()
	}

	/// Start building a customized repository.
	pub fn builder() -> RepositoryBuilder {
		RepositoryBuilder::new()
	}

	/// Content aggregate operations.
	pub fn content(&self) -> ContentService {
		ContentService::new(Arc::clone(&self.inner))
	}

	/// Location tree operations.
	pub fn locations(&self) -> LocationService {
		LocationService::new(Arc::clone(&self.inner))
	}

	/// Relation graph operations.
	pub fn relations(&self) -> RelationService {
		RelationService::new(Arc::clone(&self.inner))
	}

	/// Query/search execution.
	pub fn search(&self) -> SearchService {
		SearchService::new(Arc::clone(&self.inner))
	}

	/// Register a content type schema. Types are repository-global and
	/// not transactional.
	pub fn register_content_type(&self, content_type: ContentType) {
		self.inner
			.content_types
			.insert(content_type.id, content_type);
	}

	/// The field-type validator registry, for registering custom types.
	pub fn field_types(&self) -> &FieldTypeRegistry {
		&self.inner.field_types
	}

	/// Open a transaction. Nested transactions are not supported.
	pub async fn begin_transaction(&self) -> RepositoryResult<()> {
		let mut snapshot = self.inner.snapshot.lock();
		if snapshot.is_some() {
			return Err(RepositoryError::BadState(
				"a transaction is already in progress".to_string(),
			));
		}
		*snapshot = Some(self.inner.state.read().clone());
		tracing::debug!("transaction started");
		Ok(())
	}

	/// Commit the open transaction, making its mutations permanent.
	pub async fn commit(&self) -> RepositoryResult<()> {
		let mut snapshot = self.inner.snapshot.lock();
		if snapshot.take().is_none() {
			return Err(RepositoryError::BadState(
				"no transaction in progress".to_string(),
			));
		}
		tracing::debug!("transaction committed");
		Ok(())
	}

	/// Roll the open transaction back, restoring the pre-transaction
	/// state. Never happens implicitly; a failed operation leaves the
	/// transaction open for the caller to roll back.
	pub async fn rollback(&self) -> RepositoryResult<()> {
		let mut snapshot = self.inner.snapshot.lock();
		let Some(saved) = snapshot.take() else {
			return Err(RepositoryError::BadState(
				"no transaction in progress".to_string(),
			));
		};
		*self.inner.state.write() = saved;
		tracing::debug!("transaction rolled back");
		Ok(())
	}
}

impl Default for Repository {
	fn default() -> Self {
		Self::new()
	}
}

/// Builder for a [`Repository`] with non-default collaborators.
pub struct RepositoryBuilder {
	config: RepositoryConfig,
	permissions: Arc<dyn PermissionResolver>,
	url_alias_hooks: Arc<dyn UrlAliasHooks>,
	search_index_hooks: Arc<dyn SearchIndexHooks>,
}

impl RepositoryBuilder {
	/// Builder with default collaborators.
	pub fn new() -> Self {
		Self {
			config: RepositoryConfig::default(),
			permissions: Arc::new(AllowAll),
			url_alias_hooks: Arc::new(NullUrlAliasHooks),
			search_index_hooks: Arc::new(NullSearchIndexHooks),
		}
	}

	/// Override the configuration.
	pub fn config(mut self, config: RepositoryConfig) -> Self {
		self.config = config;
		self
	}

	/// Install a permission resolver.
	pub fn permission_resolver(mut self, resolver: Arc<dyn PermissionResolver>) -> Self {
		self.permissions = resolver;
		self
	}

	/// Install URL alias lifecycle hooks.
	pub fn url_alias_hooks(mut self, hooks: Arc<dyn UrlAliasHooks>) -> Self {
		self.url_alias_hooks = hooks;
		self
	}

	/// Install search index hooks.
	pub fn search_index_hooks(mut self, hooks: Arc<dyn SearchIndexHooks>) -> Self {
		self.search_index_hooks = hooks;
		self
	}

	/// Build the repository.
	pub fn build(self) -> Repository {
		Repository {
			inner: Arc::new(RepositoryInner {
				config: self.config,
				state: RwLock::new(StoreState::default()),
				snapshot: Mutex::new(None),
				content_types: DashMap::new(),
				field_types: FieldTypeRegistry::with_builtins(),
				permissions: self.permissions,
				url_alias_hooks: self.url_alias_hooks,
				search_index_hooks: self.search_index_hooks,
			}),
		}
	}
}

impl Default for RepositoryBuilder {
	fn default() -> Self {
		Self::new()
	}
}
