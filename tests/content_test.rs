//! Tests for content creation, editing and metadata

use async_trait::async_trait;
use content_repository::error::RepositoryError;
use content_repository::field::{ContentType, FieldDefinition, Value};
use content_repository::model::{
	ContentCreateStruct, ContentMetadataUpdateStruct, ContentUpdateStruct, DraftListItem,
	LocationCreateStruct, UserReference, VersionStatus,
};
use content_repository::permission::PermissionResolver;
use content_repository::repository::Repository;
use rstest::rstest;
use std::sync::Arc;
use uuid::Uuid;

fn article_type() -> ContentType {
	ContentType::new(
		"article",
		vec![
			FieldDefinition::new("title", "text_line").required(None),
			FieldDefinition::new("body", "text_line"),
			FieldDefinition::new("rating", "integer"),
		],
	)
}

fn repo_with_article() -> (Repository, Uuid) {
	let repo = Repository::new();
	let article = article_type();
	let type_id = article.id;
	repo.register_content_type(article);
	(repo, type_id)
}

fn actor() -> UserReference {
	UserReference::new(Uuid::new_v4())
}

#[rstest]
#[tokio::test]
async fn test_create_content_starts_as_draft_v1() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()));
	let content = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	assert_eq!(content.version.version_no, 1);
	assert_eq!(content.version.status, VersionStatus::Draft);
	assert!(!content.info.published);
	assert!(content.info.published_date.is_none());
	assert_eq!(content.info.name, "Hello");
	assert_eq!(content.info.owner_id, actor.id);
}

#[rstest]
#[tokio::test]
async fn test_create_content_collects_all_field_errors() {
	let repo = Repository::new();
	let article = ContentType::new(
		"article",
		vec![
			FieldDefinition::new("title", "text_line").required(None),
			FieldDefinition::new("subtitle", "text_line").required(None),
		],
	);
	let type_id = article.id;
	repo.register_content_type(article);
	let actor = actor();

	// Both required fields missing: one aggregate with two entries
	let create = ContentCreateStruct::new(type_id, "eng-GB");
	let result = repo.content().create_content(&actor, create, vec![]).await;

	match result {
		Err(RepositoryError::ContentFieldValidation(errors)) => {
			assert_eq!(errors.len(), 2);
		}
		other => panic!("expected ContentFieldValidation, got {:?}", other),
	}
}

#[rstest]
#[tokio::test]
async fn test_create_content_rejects_wrong_value_type() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Integer(42));
	let result = repo.content().create_content(&actor, create, vec![]).await;

	assert!(matches!(
		result,
		Err(RepositoryError::InvalidArgument { .. })
	));
}

#[rstest]
#[tokio::test]
async fn test_create_content_rejects_unknown_field() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()))
		.set_field("nonexistent", Value::Text("x".into()));
	let result = repo.content().create_content(&actor, create, vec![]).await;

	assert!(matches!(
		result,
		Err(RepositoryError::InvalidArgument { .. })
	));
}

#[rstest]
#[tokio::test]
async fn test_create_content_rejects_duplicate_remote_id() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let first = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("First".into()))
		.with_remote_id("shared-remote");
	repo.content()
		.create_content(&actor, first, vec![])
		.await
		.unwrap();

	let second = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Second".into()))
		.with_remote_id("shared-remote");
	let result = repo.content().create_content(&actor, second, vec![]).await;

	assert!(matches!(
		result,
		Err(RepositoryError::InvalidArgument { .. })
	));
}

#[rstest]
#[tokio::test]
async fn test_update_draft_merges_fields() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()))
		.set_field("body", Value::Text("Original body".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	// Update only the title: the body must survive
	let update = ContentUpdateStruct::new().set_field("title", Value::Text("Updated".into()));
	let updated = repo
		.content()
		.update_content(&actor, draft.info.id, 1, update)
		.await
		.unwrap();

	assert_eq!(
		updated.field("title", "eng-GB"),
		Some(&Value::Text("Updated".into()))
	);
	assert_eq!(
		updated.field("body", "eng-GB"),
		Some(&Value::Text("Original body".into()))
	);
	// Item-level metadata is untouched until publish
	assert_eq!(updated.info.name, "Hello");
	assert_eq!(
		updated.version.names.get("eng-GB").map(String::as_str),
		Some("Updated")
	);

	let published = repo
		.content()
		.publish_version(&actor, draft.info.id, 1, None)
		.await
		.unwrap();
	assert_eq!(published.info.name, "Updated");
}

#[rstest]
#[tokio::test]
async fn test_update_adds_translation() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	let update = ContentUpdateStruct::new().set_field_in(
		"title",
		"ger-DE",
		Value::Text("Hallo".into()),
	);
	let updated = repo
		.content()
		.update_content(&actor, draft.info.id, 1, update)
		.await
		.unwrap();

	assert!(updated.version.has_language("eng-GB"));
	assert!(updated.version.has_language("ger-DE"));
	assert_eq!(
		updated.field("title", "ger-DE"),
		Some(&Value::Text("Hallo".into()))
	);
}

#[rstest]
#[tokio::test]
async fn test_update_published_version_is_bad_state() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();
	repo.content()
		.publish_version(&actor, draft.info.id, 1, None)
		.await
		.unwrap();

	let update = ContentUpdateStruct::new().set_field("title", Value::Text("Nope".into()));
	let result = repo
		.content()
		.update_content(&actor, draft.info.id, 1, update)
		.await;

	assert!(matches!(result, Err(RepositoryError::BadState(_))));
}

#[rstest]
#[tokio::test]
async fn test_required_since_exempts_older_translations() {
	let repo = Repository::new();
	let actor = actor();

	// "title" optional at first
	let mut article = ContentType::new(
		"article",
		vec![
			FieldDefinition::new("title", "text_line"),
			FieldDefinition::new("body", "text_line"),
		],
	);
	let type_id = article.id;
	repo.register_content_type(article.clone());

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("body", Value::Text("No title yet".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	// Tighten the schema afterwards: title required from now on
	article.field_definitions[0] = FieldDefinition::new("title", "text_line")
		.required(Some(chrono::Utc::now()));
	repo.register_content_type(article);

	// eng-GB predates the requirement, so editing the body still works
	let update = ContentUpdateStruct::new().set_field("body", Value::Text("Edited".into()));
	let result = repo
		.content()
		.update_content(&actor, draft.info.id, 1, update)
		.await;
	assert!(result.is_ok());

	// A brand-new translation must satisfy the requirement
	let update = ContentUpdateStruct::new().set_field_in(
		"body",
		"ger-DE",
		Value::Text("Neu".into()),
	);
	let result = repo
		.content()
		.update_content(&actor, draft.info.id, 1, update)
		.await;
	assert!(matches!(
		result,
		Err(RepositoryError::ContentFieldValidation(_))
	));
}

#[rstest]
#[tokio::test]
async fn test_metadata_update_empty_struct_is_invalid() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	let result = repo
		.content()
		.update_content_metadata(&actor, draft.info.id, ContentMetadataUpdateStruct::default())
		.await;

	assert!(matches!(
		result,
		Err(RepositoryError::InvalidArgument { .. })
	));
}

#[rstest]
#[tokio::test]
async fn test_metadata_update_main_language_must_be_translation() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	let update = ContentMetadataUpdateStruct {
		main_language: Some("fre-FR".to_string()),
		..Default::default()
	};
	let result = repo
		.content()
		.update_content_metadata(&actor, draft.info.id, update)
		.await;

	assert!(matches!(
		result,
		Err(RepositoryError::InvalidArgument { .. })
	));
}

#[rstest]
#[tokio::test]
async fn test_metadata_update_rejects_taken_remote_id() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let first = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("First".into()))
		.with_remote_id("claimed-remote");
	repo.content()
		.create_content(&actor, first, vec![])
		.await
		.unwrap();
	let second = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Second".into()));
	let victim = repo
		.content()
		.create_content(&actor, second, vec![])
		.await
		.unwrap();

	// Another item already owns the remote id
	let update = ContentMetadataUpdateStruct {
		remote_id: Some("claimed-remote".to_string()),
		..Default::default()
	};
	let result = repo
		.content()
		.update_content_metadata(&actor, victim.info.id, update)
		.await;

	assert!(matches!(
		result,
		Err(RepositoryError::InvalidArgument { .. })
	));
	// The victim keeps its own remote id
	let info = repo
		.content()
		.load_content_info(&actor, victim.info.id)
		.await
		.unwrap();
	assert_ne!(info.remote_id, "claimed-remote");
}

#[rstest]
#[tokio::test]
async fn test_metadata_update_remote_id() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	let update = ContentMetadataUpdateStruct {
		remote_id: Some("fresh-remote".to_string()),
		..Default::default()
	};
	let updated = repo
		.content()
		.update_content_metadata(&actor, draft.info.id, update)
		.await
		.unwrap();

	assert_eq!(updated.info.remote_id, "fresh-remote");
	let by_remote = repo
		.content()
		.load_content_by_remote_id(&actor, "fresh-remote", None, None)
		.await
		.unwrap();
	assert_eq!(by_remote.info.id, draft.info.id);
}

#[rstest]
#[tokio::test]
async fn test_copy_published_content_gets_fresh_identity() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Original".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![LocationCreateStruct::new(None)])
		.await
		.unwrap();
	let published = repo
		.content()
		.publish_version(&actor, draft.info.id, 1, None)
		.await
		.unwrap();

	let copier = UserReference::new(Uuid::new_v4());
	let target = LocationCreateStruct::new(published.info.main_location_id);
	let copy = repo
		.content()
		.copy_content(&copier, published.info.id, target, None)
		.await
		.unwrap();

	assert_ne!(copy.info.id, published.info.id);
	assert_ne!(copy.info.remote_id, published.info.remote_id);
	// Default config reassigns ownership to the acting user
	assert_eq!(copy.info.owner_id, copier.id);
	assert_eq!(
		copy.field("title", "eng-GB"),
		Some(&Value::Text("Original".into()))
	);
}

#[rstest]
#[tokio::test]
async fn test_copy_single_version_renumbers_to_one() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("v1".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![LocationCreateStruct::new(None)])
		.await
		.unwrap();
	repo.content()
		.publish_version(&actor, draft.info.id, 1, None)
		.await
		.unwrap();

	// Second version published on top
	let v2 = repo
		.content()
		.create_content_draft(&actor, draft.info.id, None)
		.await
		.unwrap();
	let update = ContentUpdateStruct::new().set_field("title", Value::Text("v2".into()));
	repo.content()
		.update_content(&actor, draft.info.id, v2.version.version_no, update)
		.await
		.unwrap();
	let published = repo
		.content()
		.publish_version(&actor, draft.info.id, v2.version.version_no, None)
		.await
		.unwrap();

	// Copy only version 2: the copy starts over at version 1
	let target = LocationCreateStruct::new(published.info.main_location_id);
	let copy = repo
		.content()
		.copy_content(&actor, draft.info.id, target, Some(2))
		.await
		.unwrap();

	assert_eq!(copy.info.current_version_no, 1);
	assert_eq!(
		copy.field("title", "eng-GB"),
		Some(&Value::Text("v2".into()))
	);
}

#[rstest]
#[tokio::test]
async fn test_delete_content_removes_locations_and_versions() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Doomed".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![LocationCreateStruct::new(None)])
		.await
		.unwrap();
	let published = repo
		.content()
		.publish_version(&actor, draft.info.id, 1, None)
		.await
		.unwrap();
	let location_id = published.info.main_location_id.unwrap();

	repo.content()
		.delete_content(&actor, published.info.id)
		.await
		.unwrap();

	let info = repo.content().load_content_info(&actor, published.info.id).await;
	assert!(matches!(info, Err(RepositoryError::NotFound { .. })));
	let location = repo.locations().load_location(&actor, location_id).await;
	assert!(matches!(location, Err(RepositoryError::NotFound { .. })));
}

#[rstest]
#[tokio::test]
async fn test_hide_content_hides_every_location() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![LocationCreateStruct::new(None)])
		.await
		.unwrap();
	let published = repo
		.content()
		.publish_version(&actor, draft.info.id, 1, None)
		.await
		.unwrap();
	// Second placement
	repo.locations()
		.create_location(&actor, published.info.id, LocationCreateStruct::new(None))
		.await
		.unwrap();

	repo.content()
		.hide_content(&actor, published.info.id)
		.await
		.unwrap();

	let info = repo
		.content()
		.load_content_info(&actor, published.info.id)
		.await
		.unwrap();
	assert!(info.is_hidden);
	let locations = repo
		.locations()
		.load_locations_of_content(&actor, published.info.id)
		.await
		.unwrap();
	assert_eq!(locations.len(), 2);
	assert!(locations.iter().all(|l| l.hidden && l.invisible));

	// Reveal restores visibility everywhere
	repo.content()
		.reveal_content(&actor, published.info.id)
		.await
		.unwrap();
	let locations = repo
		.locations()
		.load_locations_of_content(&actor, published.info.id)
		.await
		.unwrap();
	assert!(locations.iter().all(|l| !l.hidden && !l.invisible));
}

struct DenyVersionRead;

#[async_trait]
impl PermissionResolver for DenyVersionRead {
	async fn can(
		&self,
		_user: &UserReference,
		_module: &str,
		function: &str,
		object: Option<Uuid>,
	) -> bool {
		// Deny per-object versionread so draft listings degrade to
		// placeholders instead of shrinking
		!(function == "versionread" && object.is_some())
	}
}

#[rstest]
#[tokio::test]
async fn test_draft_list_keeps_unauthorized_placeholders() {
	let repo = Repository::builder()
		.permission_resolver(Arc::new(DenyVersionRead))
		.build();
	let article = article_type();
	let type_id = article.id;
	repo.register_content_type(article);
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hidden draft".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	let count = repo.content().count_content_drafts(&actor, None).await.unwrap();
	let list = repo
		.content()
		.load_content_draft_list(&actor, None, 0, 10)
		.await
		.unwrap();

	// Counts and list length agree; the entry is a placeholder
	assert_eq!(count, 1);
	assert_eq!(list.len(), 1);
	match &list[0] {
		DraftListItem::Unauthorized {
			module,
			function,
			content_id,
		} => {
			assert_eq!(*module, "content");
			assert_eq!(*function, "versionread");
			assert_eq!(*content_id, draft.info.id);
		}
		other => panic!("expected placeholder, got {:?}", other),
	}
}

#[rstest]
#[tokio::test]
async fn test_unauthorized_error_names_module_and_function() {
	struct DenyAll;

	#[async_trait]
	impl PermissionResolver for DenyAll {
		async fn can(
			&self,
			_user: &UserReference,
			_module: &str,
			_function: &str,
			_object: Option<Uuid>,
		) -> bool {
			false
		}
	}

	let repo = Repository::builder()
		.permission_resolver(Arc::new(DenyAll))
		.build();
	let article = article_type();
	let type_id = article.id;
	repo.register_content_type(article);
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()));
	let result = repo.content().create_content(&actor, create, vec![]).await;

	match result {
		Err(err @ RepositoryError::Unauthorized { .. }) => {
			let message = err.to_string();
			assert!(message.contains("'create'"));
			assert!(message.contains("'content'"));
		}
		other => panic!("expected Unauthorized, got {:?}", other),
	}
}

#[rstest]
#[tokio::test]
async fn test_remote_id_loads_deny_before_existence_check() {
	struct DenyAll;

	#[async_trait]
	impl PermissionResolver for DenyAll {
		async fn can(
			&self,
			_user: &UserReference,
			_module: &str,
			_function: &str,
			_object: Option<Uuid>,
		) -> bool {
			false
		}
	}

	let repo = Repository::builder()
		.permission_resolver(Arc::new(DenyAll))
		.build();
	let actor = actor();

	// A denied caller must not learn whether the remote id exists
	let content = repo
		.content()
		.load_content_by_remote_id(&actor, "no-such-remote", None, None)
		.await;
	let info = repo
		.content()
		.load_content_info_by_remote_id(&actor, "no-such-remote")
		.await;

	assert!(matches!(content, Err(RepositoryError::Unauthorized { .. })));
	assert!(matches!(info, Err(RepositoryError::Unauthorized { .. })));
}

#[rstest]
#[tokio::test]
async fn test_load_content_language_filter_and_fallback() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()))
		.set_field_in("title", "ger-DE", Value::Text("Hallo".into()));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	// Requesting ger-DE narrows the fields
	let german = repo
		.content()
		.load_content(&actor, draft.info.id, Some(&["ger-DE".to_string()]), None)
		.await
		.unwrap();
	assert_eq!(german.fields.len(), 1);
	assert_eq!(german.fields[0].language, "ger-DE");

	// A language with no translation and no always-available fallback
	let missing = repo
		.content()
		.load_content(&actor, draft.info.id, Some(&["fre-FR".to_string()]), None)
		.await;
	assert!(matches!(missing, Err(RepositoryError::NotFound { .. })));
}

#[rstest]
#[tokio::test]
async fn test_load_content_always_available_falls_back_to_main() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();

	let mut create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Hello".into()));
	create.always_available = true;
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	let fallback = repo
		.content()
		.load_content(&actor, draft.info.id, Some(&["fre-FR".to_string()]), None)
		.await
		.unwrap();

	assert_eq!(fallback.fields.len(), 1);
	assert_eq!(fallback.fields[0].language, "eng-GB");
}
