//! Scoped transaction helper
//!
//! [`transaction`] wraps a closure in begin/commit/rollback: commit on
//! `Ok`, rollback on `Err`, original error propagated. This replaces
//! manual try/rollback/rethrow at call sites; the raw
//! [`Repository::begin_transaction`] API remains available for callers
//! that need explicit control.

use crate::error::RepositoryResult;
use crate::repository::Repository;
use std::future::Future;

/// Run `f` inside a transaction.
///
/// The closure receives a clone of the repository (clones share state,
/// so mutations made inside the closure are observed by reads in the
/// same transaction). On `Ok` the transaction commits; on `Err` it rolls
/// back and the closure's error is returned unchanged.
///
/// ```rust,ignore
/// let content = transaction(&repo, |repo| async move {
///     let content = repo.content().create_content(&actor, create, vec![]).await?;
///     repo.content().publish_version(&actor, content.info.id, 1, None).await?;
///     Ok(content)
/// })
/// .await?;
/// ```
pub async fn transaction<T, F, Fut>(repo: &Repository, f: F) -> RepositoryResult<T>
where
	F: FnOnce(Repository) -> Fut,
	Fut: Future<Output = RepositoryResult<T>>,
{
	repo.begin_transaction().await?;
	match f(repo.clone()).await {
		Ok(value) => {
			repo.commit().await?;
			Ok(value)
		}
		Err(error) => {
			// Restore state, then surface the original failure
			let _ = repo.rollback().await;
			Err(error)
		}
	}
}
