//! Query/search engine
//!
//! Structured queries over the content and location facets. A query
//! carries cheap boolean `filter` criteria, scored `query` criteria,
//! sort clauses and pagination. Criteria form a composable boolean
//! algebra; field access is multilingual-aware, restricted to the
//! caller's prioritized language list with an optional always-available
//! fallback to the item's main language.

use crate::error::{RepositoryError, RepositoryResult};
use crate::field::{ContentType, Value};
use crate::model::{Content, ContentInfo, Location, SortDirection, UserReference};
use crate::permission::functions;
use crate::repository::RepositoryInner;
use crate::store::VersionRecord;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Comparison applied by value-bearing criteria.
#[derive(Debug, Clone)]
pub enum CompareOp {
	/// Equal to
	Eq(Value),
	/// Equal to any of
	In(Vec<Value>),
	/// Strictly less than
	Lt(Value),
	/// Less than or equal
	Lte(Value),
	/// Strictly greater than
	Gt(Value),
	/// Greater than or equal
	Gte(Value),
	/// Inclusive range
	Between(Value, Value),
	/// Substring match on text values
	Contains(Value),
}

/// Which date of the item a [`Criterion::DateMetadata`] targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTarget {
	/// First publication
	Created,
	/// Last modification
	Modified,
}

/// Which user of the item a [`Criterion::UserMetadata`] targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserTarget {
	/// Item owner
	Owner,
	/// Creator of the current version
	Modifier,
	/// Groups the owner belongs to
	Group,
}

/// Set semantics of a [`Criterion::FieldRelation`].
#[derive(Debug, Clone)]
pub enum RelationOp {
	/// Any of the listed ids is related
	In(Vec<Uuid>),
	/// All of the listed ids are related
	Contains(Vec<Uuid>),
}

/// Composable query criterion.
#[derive(Debug, Clone)]
pub enum Criterion {
	/// All inner criteria match
	LogicalAnd(Vec<Criterion>),
	/// At least one inner criterion matches
	LogicalOr(Vec<Criterion>),
	/// Inner criterion does not match
	LogicalNot(Box<Criterion>),
	/// Content id is one of
	ContentId(Vec<Uuid>),
	/// Content type id is one of
	ContentTypeId(Vec<Uuid>),
	/// Content type identifier is one of
	ContentTypeIdentifier(Vec<String>),
	/// Section id is one of
	SectionId(Vec<Uuid>),
	/// Content remote id is one of
	RemoteId(Vec<String>),
	/// Any location of the item is one of
	LocationId(Vec<Uuid>),
	/// Any location's parent is one of
	ParentLocationId(Vec<Uuid>),
	/// Any location sits inside one of the given path subtrees
	Subtree(Vec<String>),
	/// Any location is an ancestor of one of the given paths
	Ancestor(Vec<String>),
	/// Typed comparison on a translatable field
	Field {
		/// Field definition identifier
		identifier: String,
		/// Comparison to apply
		op: CompareOp,
	},
	/// Relation-capable field references the given ids
	FieldRelation {
		/// Field definition identifier
		identifier: String,
		/// Any-of or all-of semantics
		op: RelationOp,
	},
	/// Comparison on item dates
	DateMetadata {
		/// Which date
		target: DateTarget,
		/// Comparison to apply; values must be [`Value::Date`]
		op: CompareOp,
	},
	/// Match on item users
	UserMetadata {
		/// Which user facet
		target: UserTarget,
		/// Ids to match
		ids: Vec<Uuid>,
	},
	/// Great-circle distance threshold on a map-location field
	MapLocationDistance {
		/// Field definition identifier
		identifier: String,
		/// Reference latitude in degrees
		latitude: f64,
		/// Reference longitude in degrees
		longitude: f64,
		/// Comparison on the distance in kilometres; values must be
		/// [`Value::Float`]
		op: CompareOp,
	},
	/// Fuzzy term match over searchable text fields
	FullText(String),
	/// Matches nothing; short-circuits without touching the store
	MatchNone,
}

/// Sort target of a [`SortClause`].
#[derive(Debug, Clone)]
pub enum SortTarget {
	/// By content id
	ContentId,
	/// By denormalized item name
	ContentName,
	/// By first publication date
	DatePublished,
	/// By last modification date
	DateModified,
	/// By section id
	SectionId,
	/// By a scalar field value
	Field {
		/// Field definition identifier
		identifier: String,
		/// Fixed language, or `None` for the query's language list
		language: Option<String>,
	},
	/// By location depth (the matched location, or the main location
	/// for content queries)
	LocationDepth,
	/// By location priority
	LocationPriority,
	/// By materialized location path
	LocationPath,
}

/// One ordering instruction.
#[derive(Debug, Clone)]
pub struct SortClause {
	/// What to sort by
	pub target: SortTarget,

	/// Ascending or descending
	pub direction: SortDirection,
}

impl SortClause {
	/// Ascending clause.
	pub fn asc(target: SortTarget) -> Self {
		Self {
			target,
			direction: SortDirection::Ascending,
		}
	}

	/// Descending clause.
	pub fn desc(target: SortTarget) -> Self {
		Self {
			target,
			direction: SortDirection::Descending,
		}
	}
}

/// A structured query over content or locations.
#[derive(Debug, Clone)]
pub struct Query {
	/// Unscored boolean criteria
	pub filter: Option<Criterion>,

	/// Scored criteria (full-text and friends)
	pub query: Option<Criterion>,

	/// Ordering, applied in sequence
	pub sort_clauses: Vec<SortClause>,

	/// Skip this many hits
	pub offset: usize,

	/// Return at most this many hits
	pub limit: usize,

	/// Whether to compute the total count
	pub perform_count: bool,

	/// Prioritized language list for field resolution
	pub languages: Vec<String>,

	/// Fall back to the main language of always-available items
	pub use_always_available: bool,
}

impl Default for Query {
	fn default() -> Self {
		Self {
			filter: None,
			query: None,
			sort_clauses: Vec::new(),
			offset: 0,
			limit: 25,
			perform_count: true,
			languages: Vec::new(),
			use_always_available: true,
		}
	}
}

impl Query {
	/// Empty query with default pagination.
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the filter criterion.
	pub fn with_filter(mut self, criterion: Criterion) -> Self {
		self.filter = Some(criterion);
		self
	}

	/// Set the scored query criterion.
	pub fn with_query(mut self, criterion: Criterion) -> Self {
		self.query = Some(criterion);
		self
	}

	/// Append a sort clause.
	pub fn sorted_by(mut self, clause: SortClause) -> Self {
		self.sort_clauses.push(clause);
		self
	}

	/// Set offset and limit.
	pub fn slice(mut self, offset: usize, limit: usize) -> Self {
		self.offset = offset;
		self.limit = limit;
		self
	}

	/// Set the prioritized language list.
	pub fn in_languages(mut self, languages: Vec<String>) -> Self {
		self.languages = languages;
		self
	}
}

/// One search hit.
#[derive(Debug, Clone)]
pub struct SearchHit<T> {
	/// Matched entity
	pub item: T,

	/// Relevance score; 0 for pure-filter matches
	pub score: f32,

	/// Language that produced the match, for translation-aware queries
	pub matched_language: Option<String>,
}

/// An ordered result set.
#[derive(Debug, Clone)]
pub struct SearchResult<T> {
	/// Hits in sort order, sliced to offset/limit
	pub hits: Vec<SearchHit<T>>,

	/// Total matches; `None` when the query skipped counting
	pub total_count: Option<u64>,
}

/// Query execution over the repository state.
pub struct SearchService {
	inner: Arc<RepositoryInner>,
}

impl SearchService {
	pub(crate) fn new(inner: Arc<RepositoryInner>) -> Self {
		Self { inner }
	}

	/// Run a content query: matches published content items.
	pub async fn find_content(
		&self,
		actor: &UserReference,
		query: Query,
	) -> RepositoryResult<SearchResult<Content>> {
		self.inner.require(actor, functions::READ, None).await?;
		self.validate_targets(&query)?;

		if is_match_none(&query) {
			return Ok(empty_result(&query));
		}

		let groups = self.prefetch_groups(&query).await?;
		let types = self.type_map();
		let state = self.inner.state.read();

		let mut matched: Vec<(ScoredId, Vec<SortKey>)> = Vec::new();
		for info in state.contents.values() {
			if !info.published {
				continue;
			}
			let Some(record) = state.published_version(info.id) else {
				continue;
			};
			let locations = state.locations_of_content(info.id);
			let location_refs: Vec<&Location> = locations.iter().collect();
			let ctx = EvalContext {
				info,
				record,
				locations: &location_refs,
				types: &types,
				groups: &groups,
				languages: &query.languages,
				use_always_available: query.use_always_available,
			};
			let Some(outcome) = match_query(&query, &ctx) else {
				continue;
			};
			let keys = sort_keys(&query.sort_clauses, &ctx, None)?;
			matched.push((
				ScoredId {
					content_id: info.id,
					location_id: None,
					score: outcome.score,
					language: outcome.language,
				},
				keys,
			));
		}

		order_hits(&mut matched, &query.sort_clauses);
		let total = matched.len() as u64;
		let page = paginate_scored(matched, query.offset, query.limit);

		let mut hits = Vec::with_capacity(page.len());
		for scored in page {
			let info = state.content(scored.content_id)?;
			let content =
				crate::content::build_content(&state, info.id, info.current_version_no, None)?;
			hits.push(SearchHit {
				item: content,
				score: scored.score,
				matched_language: scored.language,
			});
		}
		Ok(SearchResult {
			hits,
			total_count: query.perform_count.then_some(total),
		})
	}

	/// Run a location query: matches individual locations of published
	/// content. Location criteria apply to the candidate location
	/// itself rather than to any location of the item.
	pub async fn find_locations(
		&self,
		actor: &UserReference,
		query: Query,
	) -> RepositoryResult<SearchResult<Location>> {
		self.inner.require(actor, functions::READ, None).await?;
		self.validate_targets(&query)?;

		if is_match_none(&query) {
			return Ok(empty_result(&query));
		}

		let groups = self.prefetch_groups(&query).await?;
		let types = self.type_map();
		let state = self.inner.state.read();

		let mut matched: Vec<(ScoredId, Vec<SortKey>)> = Vec::new();
		for location in state.locations.values() {
			let Ok(info) = state.content(location.content_id) else {
				continue;
			};
			if !info.published {
				continue;
			}
			let Some(record) = state.published_version(info.id) else {
				continue;
			};
			let candidate = [location];
			let ctx = EvalContext {
				info,
				record,
				locations: &candidate,
				types: &types,
				groups: &groups,
				languages: &query.languages,
				use_always_available: query.use_always_available,
			};
			let Some(outcome) = match_query(&query, &ctx) else {
				continue;
			};
			let keys = sort_keys(&query.sort_clauses, &ctx, Some(location))?;
			matched.push((
				ScoredId {
					content_id: info.id,
					location_id: Some(location.id),
					score: outcome.score,
					language: outcome.language,
				},
				keys,
			));
		}

		order_hits(&mut matched, &query.sort_clauses);
		let total = matched.len() as u64;
		let page = paginate_scored(matched, query.offset, query.limit);

		let mut hits = Vec::with_capacity(page.len());
		for scored in page {
			if let Some(location_id) = scored.location_id {
				hits.push(SearchHit {
					item: state.location(location_id)?.clone(),
					score: scored.score,
					matched_language: scored.language,
				});
			}
		}
		Ok(SearchResult {
			hits,
			total_count: query.perform_count.then_some(total),
		})
	}

	/// Convenience wrapper requiring exactly one match.
	pub async fn find_single(
		&self,
		actor: &UserReference,
		criterion: Criterion,
	) -> RepositoryResult<Content> {
		let result = self
			.find_content(
				actor,
				Query::new().with_filter(criterion).slice(0, 2),
			)
			.await?;
		match result.total_count {
			Some(1) => {}
			Some(0) => {
				return Err(RepositoryError::invalid_argument(
					"criterion",
					"no content item matches the criterion",
				));
			}
			_ => {
				return Err(RepositoryError::invalid_argument(
					"criterion",
					"more than one content item matches the criterion",
				));
			}
		}
		result
			.hits
			.into_iter()
			.next()
			.map(|hit| hit.item)
			.ok_or_else(|| RepositoryError::invalid_argument("criterion", "no match"))
	}

	/// Reject field/sort targets that resolve to no searchable field
	/// definition across the registered content types.
	fn validate_targets(&self, query: &Query) -> RepositoryResult<()> {
		let mut targets = Vec::new();
		if let Some(criterion) = &query.filter {
			collect_field_targets(criterion, &mut targets);
		}
		if let Some(criterion) = &query.query {
			collect_field_targets(criterion, &mut targets);
		}
		for clause in &query.sort_clauses {
			if let SortTarget::Field { identifier, .. } = &clause.target {
				targets.push(identifier.clone());
			}
		}
		for identifier in targets {
			let searchable = self.inner.content_types.iter().any(|ct| {
				ct.field_definition(&identifier)
					.is_some_and(|d| d.searchable)
			});
			if !searchable {
				return Err(RepositoryError::invalid_argument(
					"criterion",
					format!("'{}' is not a searchable field", identifier),
				));
			}
		}
		Ok(())
	}

	async fn prefetch_groups(
		&self,
		query: &Query,
	) -> RepositoryResult<HashMap<Uuid, Vec<Uuid>>> {
		let wants_groups = query
			.filter
			.iter()
			.chain(query.query.iter())
			.any(contains_group_criterion);
		let mut groups = HashMap::new();
		if wants_groups {
			let owners: Vec<Uuid> = {
				let state = self.inner.state.read();
				state.contents.values().map(|c| c.owner_id).collect()
			};
			for owner in owners {
				if !groups.contains_key(&owner) {
					let memberships = self
						.inner
						.permissions
						.groups_of(&UserReference::new(owner))
						.await;
					groups.insert(owner, memberships);
				}
			}
		}
		Ok(groups)
	}

	fn type_map(&self) -> HashMap<Uuid, ContentType> {
		self.inner
			.content_types
			.iter()
			.map(|entry| (*entry.key(), entry.value().clone()))
			.collect()
	}
}

struct ScoredId {
	content_id: Uuid,
	location_id: Option<Uuid>,
	score: f32,
	language: Option<String>,
}

struct EvalContext<'a> {
	info: &'a ContentInfo,
	record: &'a VersionRecord,
	locations: &'a [&'a Location],
	types: &'a HashMap<Uuid, ContentType>,
	groups: &'a HashMap<Uuid, Vec<Uuid>>,
	languages: &'a [String],
	use_always_available: bool,
}

struct MatchOutcome {
	score: f32,
	language: Option<String>,
}

fn is_match_none(query: &Query) -> bool {
	matches!(query.filter, Some(Criterion::MatchNone))
		|| matches!(query.query, Some(Criterion::MatchNone))
}

fn empty_result<T>(query: &Query) -> SearchResult<T> {
	SearchResult {
		hits: Vec::new(),
		total_count: query.perform_count.then_some(0),
	}
}

fn match_query(query: &Query, ctx: &EvalContext<'_>) -> Option<MatchOutcome> {
	let filter_outcome = match &query.filter {
		Some(criterion) => Some(evaluate(criterion, ctx)?),
		None => None,
	};
	let query_outcome = match &query.query {
		Some(criterion) => Some(evaluate(criterion, ctx)?),
		None => None,
	};
	// Scores come from the scored part only; filters contribute 0
	let score = query_outcome.as_ref().map_or(0.0, |o| o.score);
	let language = query_outcome
		.and_then(|o| o.language)
		.or(filter_outcome.and_then(|o| o.language));
	Some(MatchOutcome { score, language })
}

fn evaluate(criterion: &Criterion, ctx: &EvalContext<'_>) -> Option<MatchOutcome> {
	match criterion {
		Criterion::LogicalAnd(inner) => {
			let mut score = 0.0;
			let mut language = None;
			for criterion in inner {
				let outcome = evaluate(criterion, ctx)?;
				score += outcome.score;
				language = language.or(outcome.language);
			}
			Some(MatchOutcome { score, language })
		}
		Criterion::LogicalOr(inner) => {
			let mut best: Option<MatchOutcome> = None;
			for criterion in inner {
				if let Some(outcome) = evaluate(criterion, ctx) {
					let better = best.as_ref().is_none_or(|b| outcome.score > b.score);
					if better {
						best = Some(outcome);
					}
				}
			}
			best
		}
		Criterion::LogicalNot(inner) => match evaluate(inner, ctx) {
			Some(_) => None,
			None => Some(MatchOutcome {
				score: 0.0,
				language: None,
			}),
		},
		Criterion::ContentId(ids) => flag(ids.contains(&ctx.info.id)),
		Criterion::ContentTypeId(ids) => flag(ids.contains(&ctx.info.content_type_id)),
		Criterion::ContentTypeIdentifier(identifiers) => {
			let matches = ctx
				.types
				.get(&ctx.info.content_type_id)
				.is_some_and(|ct| identifiers.iter().any(|i| *i == ct.identifier));
			flag(matches)
		}
		Criterion::SectionId(ids) => {
			flag(ctx.info.section_id.is_some_and(|id| ids.contains(&id)))
		}
		Criterion::RemoteId(ids) => flag(ids.iter().any(|r| *r == ctx.info.remote_id)),
		Criterion::LocationId(ids) => {
			flag(ctx.locations.iter().any(|l| ids.contains(&l.id)))
		}
		Criterion::ParentLocationId(ids) => flag(
			ctx.locations
				.iter()
				.any(|l| l.parent_id.is_some_and(|p| ids.contains(&p))),
		),
		Criterion::Subtree(paths) => flag(ctx.locations.iter().any(|l| {
			paths.iter().any(|prefix| l.path.starts_with(prefix.as_str()))
		})),
		Criterion::Ancestor(paths) => flag(ctx.locations.iter().any(|l| {
			paths
				.iter()
				.any(|path| path.starts_with(&l.path) && *path != l.path)
		})),
		Criterion::Field { identifier, op } => {
			let (value, language) = resolve_field(ctx, identifier)?;
			flag(compare(op, value)).map(|outcome| MatchOutcome {
				language: Some(language),
				..outcome
			})
		}
		Criterion::FieldRelation { identifier, op } => {
			let (value, _) = resolve_field(ctx, identifier)?;
			let Value::RelationList(related) = value else {
				return None;
			};
			let matches = match op {
				RelationOp::In(ids) => ids.iter().any(|id| related.contains(id)),
				RelationOp::Contains(ids) => ids.iter().all(|id| related.contains(id)),
			};
			flag(matches)
		}
		Criterion::DateMetadata { target, op } => {
			let date = match target {
				DateTarget::Created => ctx.info.published_date?,
				DateTarget::Modified => ctx.info.modification_date,
			};
			flag(compare(op, &Value::Date(date)))
		}
		Criterion::UserMetadata { target, ids } => {
			let matches = match target {
				UserTarget::Owner => ids.contains(&ctx.info.owner_id),
				UserTarget::Modifier => ids.contains(&ctx.record.info.creator_id),
				UserTarget::Group => ctx
					.groups
					.get(&ctx.info.owner_id)
					.is_some_and(|memberships| {
						ids.iter().any(|id| memberships.contains(id))
					}),
			};
			flag(matches)
		}
		Criterion::MapLocationDistance {
			identifier,
			latitude,
			longitude,
			op,
		} => {
			let (value, _) = resolve_field(ctx, identifier)?;
			let Value::MapLocation {
				latitude: field_lat,
				longitude: field_lon,
				..
			} = value
			else {
				return None;
			};
			let distance = haversine_km(*latitude, *longitude, *field_lat, *field_lon);
			flag(compare(op, &Value::Float(distance)))
		}
		Criterion::FullText(text) => full_text_match(text, ctx),
		Criterion::MatchNone => None,
	}
}

fn flag(matches: bool) -> Option<MatchOutcome> {
	matches.then_some(MatchOutcome {
		score: 0.0,
		language: None,
	})
}

/// Resolve a field value under the prioritized language list.
///
/// The first requested language carrying the field wins; with no
/// requested languages the main language is tried first, then the
/// remaining translations in sorted order. When no requested language
/// matches, always-available items fall back to the main language,
/// everything else is excluded.
fn resolve_field<'a>(
	ctx: &'a EvalContext<'_>,
	identifier: &str,
) -> Option<(&'a Value, String)> {
	let lookup = |language: &str| {
		ctx.record
			.fields
			.get(&(identifier.to_string(), language.to_string()))
			.map(|value| (value, language.to_string()))
	};

	if ctx.languages.is_empty() {
		if let Some(found) = lookup(&ctx.info.main_language) {
			return Some(found);
		}
		for language in &ctx.record.info.languages {
			if let Some(found) = lookup(language) {
				return Some(found);
			}
		}
		return None;
	}

	for language in ctx.languages {
		if let Some(found) = lookup(language) {
			return Some(found);
		}
	}
	if ctx.use_always_available && ctx.info.always_available {
		return lookup(&ctx.info.main_language);
	}
	None
}

fn compare(op: &CompareOp, value: &Value) -> bool {
	match op {
		CompareOp::Eq(expected) => value == expected,
		CompareOp::In(candidates) => candidates.iter().any(|c| c == value),
		CompareOp::Lt(bound) => cmp_values(value, bound).is_some_and(|o| o.is_lt()),
		CompareOp::Lte(bound) => cmp_values(value, bound).is_some_and(|o| o.is_le()),
		CompareOp::Gt(bound) => cmp_values(value, bound).is_some_and(|o| o.is_gt()),
		CompareOp::Gte(bound) => cmp_values(value, bound).is_some_and(|o| o.is_ge()),
		CompareOp::Between(low, high) => {
			cmp_values(value, low).is_some_and(|o| o.is_ge())
				&& cmp_values(value, high).is_some_and(|o| o.is_le())
		}
		CompareOp::Contains(needle) => match (value, needle) {
			(Value::Text(haystack), Value::Text(needle)) => {
				haystack.to_lowercase().contains(&needle.to_lowercase())
			}
			_ => false,
		},
	}
}

fn cmp_values(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
	match (a, b) {
		(Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
		(Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
		(Value::Integer(a), Value::Float(b)) => Some((*a as f64).total_cmp(b)),
		(Value::Float(a), Value::Integer(b)) => Some(a.total_cmp(&(*b as f64))),
		(Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
		(Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
		_ => None,
	}
}

/// Term match over the searchable text fields of the resolved language.
/// Exact word hits score 2, prefix hits score 1, summed over terms and
/// occurrences; the best-scoring translation wins.
fn full_text_match(text: &str, ctx: &EvalContext<'_>) -> Option<MatchOutcome> {
	let terms: Vec<String> = text
		.split_whitespace()
		.map(|t| t.to_lowercase())
		.filter(|t| !t.is_empty())
		.collect();
	if terms.is_empty() {
		return None;
	}
	let content_type = ctx.types.get(&ctx.info.content_type_id);

	let candidate_languages: Vec<String> = if ctx.languages.is_empty() {
		ctx.record.info.languages.clone()
	} else {
		let mut present: Vec<String> = ctx
			.languages
			.iter()
			.filter(|l| ctx.record.info.has_language(l))
			.cloned()
			.collect();
		if present.is_empty() && ctx.use_always_available && ctx.info.always_available {
			present.push(ctx.info.main_language.clone());
		}
		present
	};

	let mut best: Option<MatchOutcome> = None;
	for language in candidate_languages {
		let mut score = 0.0;
		for ((identifier, lang), value) in &ctx.record.fields {
			if *lang != language {
				continue;
			}
			let searchable = content_type
				.and_then(|ct| ct.field_definition(identifier))
				.is_none_or(|d| d.searchable);
			if !searchable {
				continue;
			}
			let Some(text) = value.as_text() else {
				continue;
			};
			let lowered = text.to_lowercase();
			for word in lowered.split(|c: char| !c.is_alphanumeric()) {
				if word.is_empty() {
					continue;
				}
				for term in &terms {
					if word == *term {
						score += 2.0;
					} else if word.starts_with(term.as_str()) {
						score += 1.0;
					}
				}
			}
		}
		if score > 0.0 {
			let better = best.as_ref().is_none_or(|b| score > b.score);
			if better {
				best = Some(MatchOutcome {
					score,
					language: Some(language),
				});
			}
		}
	}
	best
}

fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
	const EARTH_RADIUS_KM: f64 = 6371.0;
	let d_lat = (lat2 - lat1).to_radians();
	let d_lon = (lon2 - lon1).to_radians();
	let a = (d_lat / 2.0).sin().powi(2)
		+ lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
	2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

fn collect_field_targets(criterion: &Criterion, targets: &mut Vec<String>) {
	match criterion {
		Criterion::LogicalAnd(inner) | Criterion::LogicalOr(inner) => {
			for criterion in inner {
				collect_field_targets(criterion, targets);
			}
		}
		Criterion::LogicalNot(inner) => collect_field_targets(inner, targets),
		Criterion::Field { identifier, .. }
		| Criterion::FieldRelation { identifier, .. }
		| Criterion::MapLocationDistance { identifier, .. } => {
			targets.push(identifier.clone());
		}
		_ => {}
	}
}

fn contains_group_criterion(criterion: &Criterion) -> bool {
	match criterion {
		Criterion::LogicalAnd(inner) | Criterion::LogicalOr(inner) => {
			inner.iter().any(contains_group_criterion)
		}
		Criterion::LogicalNot(inner) => contains_group_criterion(inner),
		Criterion::UserMetadata { target, .. } => *target == UserTarget::Group,
		_ => false,
	}
}

/// Comparable sort key; missing values order last in either direction.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
	Missing,
	Int(i64),
	Float(f64),
	Text(String),
	Date(DateTime<Utc>),
	Id(Uuid),
}

fn cmp_keys(a: &SortKey, b: &SortKey) -> std::cmp::Ordering {
	use std::cmp::Ordering;
	match (a, b) {
		(SortKey::Missing, SortKey::Missing) => Ordering::Equal,
		(SortKey::Missing, _) => Ordering::Greater,
		(_, SortKey::Missing) => Ordering::Less,
		(SortKey::Int(a), SortKey::Int(b)) => a.cmp(b),
		(SortKey::Float(a), SortKey::Float(b)) => a.total_cmp(b),
		(SortKey::Int(a), SortKey::Float(b)) => (*a as f64).total_cmp(b),
		(SortKey::Float(a), SortKey::Int(b)) => a.total_cmp(&(*b as f64)),
		(SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
		(SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
		(SortKey::Id(a), SortKey::Id(b)) => a.cmp(b),
		_ => Ordering::Equal,
	}
}

fn sort_keys(
	clauses: &[SortClause],
	ctx: &EvalContext<'_>,
	location: Option<&Location>,
) -> RepositoryResult<Vec<SortKey>> {
	let location = location.or_else(|| {
		ctx.info
			.main_location_id
			.and_then(|id| ctx.locations.iter().find(|l| l.id == id).copied())
			.or_else(|| ctx.locations.first().copied())
	});

	clauses
		.iter()
		.map(|clause| {
			Ok(match &clause.target {
				SortTarget::ContentId => SortKey::Id(ctx.info.id),
				SortTarget::ContentName => SortKey::Text(ctx.info.name.clone()),
				SortTarget::DatePublished => ctx
					.info
					.published_date
					.map_or(SortKey::Missing, SortKey::Date),
				SortTarget::DateModified => SortKey::Date(ctx.info.modification_date),
				SortTarget::SectionId => {
					ctx.info.section_id.map_or(SortKey::Missing, SortKey::Id)
				}
				SortTarget::Field {
					identifier,
					language,
				} => field_sort_key(ctx, identifier, language.as_deref())?,
				SortTarget::LocationDepth => location
					.map_or(SortKey::Missing, |l| SortKey::Int(l.depth as i64)),
				SortTarget::LocationPriority => location
					.map_or(SortKey::Missing, |l| SortKey::Int(l.priority as i64)),
				SortTarget::LocationPath => {
					location.map_or(SortKey::Missing, |l| SortKey::Text(l.path.clone()))
				}
			})
		})
		.collect()
}

fn field_sort_key(
	ctx: &EvalContext<'_>,
	identifier: &str,
	language: Option<&str>,
) -> RepositoryResult<SortKey> {
	let resolved = match language {
		Some(language) => ctx
			.record
			.fields
			.get(&(identifier.to_string(), language.to_string()))
			.map(|value| (value, language.to_string())),
		None => resolve_field(ctx, identifier),
	};
	let Some((value, _)) = resolved else {
		return Ok(SortKey::Missing);
	};
	match value {
		Value::Text(text) => Ok(SortKey::Text(text.clone())),
		Value::Integer(n) => Ok(SortKey::Int(*n)),
		Value::Float(f) => Ok(SortKey::Float(*f)),
		Value::Date(d) => Ok(SortKey::Date(*d)),
		Value::Boolean(b) => Ok(SortKey::Int(*b as i64)),
		Value::Empty => Ok(SortKey::Missing),
		Value::MapLocation { .. } | Value::RelationList(_) => {
			Err(RepositoryError::invalid_argument(
				"sort_clause",
				format!("field '{}' is not a scalar sort target", identifier),
			))
		}
	}
}

fn order_hits(matched: &mut [(ScoredId, Vec<SortKey>)], clauses: &[SortClause]) {
	matched.sort_by(|(a_scored, a_keys), (b_scored, b_keys)| {
		for (index, clause) in clauses.iter().enumerate() {
			let a_key = a_keys.get(index).unwrap_or(&SortKey::Missing);
			let b_key = b_keys.get(index).unwrap_or(&SortKey::Missing);
			// Missing keys stay last regardless of direction
			let ordering = match (a_key, b_key) {
				(SortKey::Missing, SortKey::Missing) => std::cmp::Ordering::Equal,
				(SortKey::Missing, _) => std::cmp::Ordering::Greater,
				(_, SortKey::Missing) => std::cmp::Ordering::Less,
				_ => match clause.direction {
					SortDirection::Ascending => cmp_keys(a_key, b_key),
					SortDirection::Descending => cmp_keys(b_key, a_key),
				},
			};
			if ordering != std::cmp::Ordering::Equal {
				return ordering;
			}
		}
		// Score descending, id ascending as the stable tail
		b_scored
			.score
			.total_cmp(&a_scored.score)
			.then_with(|| a_scored.content_id.cmp(&b_scored.content_id))
			.then_with(|| a_scored.location_id.cmp(&b_scored.location_id))
	});
}

fn paginate_scored(
	matched: Vec<(ScoredId, Vec<SortKey>)>,
	offset: usize,
	limit: usize,
) -> Vec<ScoredId> {
	matched
		.into_iter()
		.skip(offset)
		.take(limit)
		.map(|(scored, _)| scored)
		.collect()
}
