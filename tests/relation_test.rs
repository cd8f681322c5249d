//! Tests for the relation graph and its publication-status filtering

use content_repository::error::RepositoryError;
use content_repository::field::{ContentType, FieldDefinition, Value};
use content_repository::model::{
	ContentCreateStruct, ContentUpdateStruct, LocationCreateStruct, RelationKind, UserReference,
};
use content_repository::repository::Repository;
use rstest::rstest;
use uuid::Uuid;

fn article_type() -> ContentType {
	ContentType::new(
		"article",
		vec![
			FieldDefinition::new("title", "text_line").required(None),
			FieldDefinition::new("related", "relation_list"),
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

async fn draft_article(repo: &Repository, type_id: Uuid, actor: &UserReference, title: &str) -> Uuid {
	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text(title.into()));
	repo.content()
		.create_content(actor, create, vec![LocationCreateStruct::new(None)])
		.await
		.unwrap()
		.info
		.id
}

async fn published_article(
	repo: &Repository,
	type_id: Uuid,
	actor: &UserReference,
	title: &str,
) -> Uuid {
	let id = draft_article(repo, type_id, actor, title).await;
	repo.content().publish_version(actor, id, 1, None).await.unwrap();
	id
}

#[rstest]
#[tokio::test]
async fn test_add_relation_to_draft() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();
	let source = draft_article(&repo, type_id, &actor, "Source").await;
	let destination = published_article(&repo, type_id, &actor, "Destination").await;

	let relation = repo
		.relations()
		.add_relation(&actor, source, 1, destination)
		.await
		.unwrap();

	assert_eq!(relation.kind, RelationKind::Common);
	assert_eq!(relation.source_content_id, source);
	assert_eq!(relation.destination_content_id, destination);
}

#[rstest]
#[tokio::test]
async fn test_add_relation_to_published_version_is_bad_state() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();
	let source = published_article(&repo, type_id, &actor, "Source").await;
	let destination = published_article(&repo, type_id, &actor, "Destination").await;

	let result = repo
		.relations()
		.add_relation(&actor, source, 1, destination)
		.await;

	assert!(matches!(result, Err(RepositoryError::BadState(_))));
}

#[rstest]
#[tokio::test]
async fn test_delete_missing_relation_is_invalid_argument() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();
	let source = draft_article(&repo, type_id, &actor, "Source").await;
	let destination = published_article(&repo, type_id, &actor, "Destination").await;

	let result = repo
		.relations()
		.delete_relation(&actor, source, 1, destination)
		.await;

	assert!(matches!(
		result,
		Err(RepositoryError::InvalidArgument { .. })
	));
}

#[rstest]
#[tokio::test]
async fn test_relations_to_unpublished_destination_are_invisible() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();
	let source = draft_article(&repo, type_id, &actor, "Source").await;
	let destination = draft_article(&repo, type_id, &actor, "Never published").await;

	repo.relations()
		.add_relation(&actor, source, 1, destination)
		.await
		.unwrap();

	// Edge exists but the destination has no published version
	let list = repo
		.relations()
		.load_relation_list(&actor, source, 1, None, 0, 10)
		.await
		.unwrap();
	assert_eq!(list.total_count, 0);
	assert!(list.items.is_empty());

	// Publishing the destination makes the edge visible
	repo.content()
		.publish_version(&actor, destination, 1, None)
		.await
		.unwrap();
	let list = repo
		.relations()
		.load_relation_list(&actor, source, 1, None, 0, 10)
		.await
		.unwrap();
	assert_eq!(list.total_count, 1);
}

#[rstest]
#[tokio::test]
async fn test_count_matches_list_total() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();
	let source = draft_article(&repo, type_id, &actor, "Source").await;
	let first = published_article(&repo, type_id, &actor, "First").await;
	let second = published_article(&repo, type_id, &actor, "Second").await;

	repo.relations()
		.add_relation(&actor, source, 1, first)
		.await
		.unwrap();
	repo.relations()
		.add_relation(&actor, source, 1, second)
		.await
		.unwrap();

	let count = repo
		.relations()
		.count_relations(&actor, source, 1, None)
		.await
		.unwrap();
	let list = repo
		.relations()
		.load_relation_list(&actor, source, 1, None, 0, 1)
		.await
		.unwrap();

	// Pagination shrinks the slice, never the total
	assert_eq!(count, 2);
	assert_eq!(list.total_count, 2);
	assert_eq!(list.items.len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_field_relations_derived_from_relation_list_value() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();
	let target = published_article(&repo, type_id, &actor, "Target").await;

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Source".into()))
		.set_field("related", Value::RelationList(vec![target]));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	let list = repo
		.relations()
		.load_relation_list(&actor, draft.info.id, 1, Some(RelationKind::Field), 0, 10)
		.await
		.unwrap();

	assert_eq!(list.total_count, 1);
	assert_eq!(list.items[0].source_field.as_deref(), Some("related"));
	assert_eq!(list.items[0].destination_content_id, target);
}

#[rstest]
#[tokio::test]
async fn test_field_relations_follow_field_updates() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();
	let old_target = published_article(&repo, type_id, &actor, "Old").await;
	let new_target = published_article(&repo, type_id, &actor, "New").await;

	let create = ContentCreateStruct::new(type_id, "eng-GB")
		.set_field("title", Value::Text("Source".into()))
		.set_field("related", Value::RelationList(vec![old_target]));
	let draft = repo
		.content()
		.create_content(&actor, create, vec![])
		.await
		.unwrap();

	let update = ContentUpdateStruct::new()
		.set_field("related", Value::RelationList(vec![new_target]));
	repo.content()
		.update_content(&actor, draft.info.id, 1, update)
		.await
		.unwrap();

	let list = repo
		.relations()
		.load_relation_list(&actor, draft.info.id, 1, Some(RelationKind::Field), 0, 10)
		.await
		.unwrap();

	assert_eq!(list.total_count, 1);
	assert_eq!(list.items[0].destination_content_id, new_target);
}

#[rstest]
#[tokio::test]
async fn test_reverse_relations_only_from_published_source_versions() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();
	let destination = published_article(&repo, type_id, &actor, "Destination").await;
	let source = draft_article(&repo, type_id, &actor, "Source").await;

	repo.relations()
		.add_relation(&actor, source, 1, destination)
		.await
		.unwrap();

	// Draft-owned edges do not show up in reverse listings
	let reverse = repo
		.relations()
		.load_reverse_relation_list(&actor, destination, None, 0, 10)
		.await
		.unwrap();
	assert_eq!(reverse.total_count, 0);

	repo.content()
		.publish_version(&actor, source, 1, None)
		.await
		.unwrap();
	let reverse = repo
		.relations()
		.load_reverse_relation_list(&actor, destination, None, 0, 10)
		.await
		.unwrap();
	assert_eq!(reverse.total_count, 1);
	assert_eq!(reverse.items[0].source_content_id, source);
}

#[rstest]
#[tokio::test]
async fn test_reverse_relations_ignore_superseded_versions() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();
	let destination = published_article(&repo, type_id, &actor, "Destination").await;
	let source = draft_article(&repo, type_id, &actor, "Source").await;

	repo.relations()
		.add_relation(&actor, source, 1, destination)
		.await
		.unwrap();
	repo.content()
		.publish_version(&actor, source, 1, None)
		.await
		.unwrap();

	// v2 drops the relation and takes over as the published version
	repo.content()
		.create_content_draft(&actor, source, None)
		.await
		.unwrap();
	repo.relations()
		.delete_relation(&actor, source, 2, destination)
		.await
		.unwrap();
	repo.content()
		.publish_version(&actor, source, 2, None)
		.await
		.unwrap();

	let reverse = repo
		.relations()
		.load_reverse_relation_list(&actor, destination, None, 0, 10)
		.await
		.unwrap();
	assert_eq!(reverse.total_count, 0);
}

#[rstest]
#[tokio::test]
async fn test_new_draft_inherits_relations() {
	let (repo, type_id) = repo_with_article();
	let actor = actor();
	let destination = published_article(&repo, type_id, &actor, "Destination").await;
	let source = draft_article(&repo, type_id, &actor, "Source").await;

	repo.relations()
		.add_relation(&actor, source, 1, destination)
		.await
		.unwrap();
	repo.content()
		.publish_version(&actor, source, 1, None)
		.await
		.unwrap();

	let draft = repo
		.content()
		.create_content_draft(&actor, source, None)
		.await
		.unwrap();
	let list = repo
		.relations()
		.load_relation_list(&actor, source, draft.version.version_no, None, 0, 10)
		.await
		.unwrap();

	assert_eq!(list.total_count, 1);
	assert_eq!(list.items[0].destination_content_id, destination);
}
