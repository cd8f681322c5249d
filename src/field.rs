//! Field values, content-type schema and field-type validation
//!
//! Field values are a closed variant type rather than free-form runtime
//! properties: a content item's payload is a map from
//! `(field identifier, language code)` to [`Value`], validated against the
//! [`FieldDefinition`]s of the item's [`ContentType`].
//!
//! Validation runs in two phases. The structural phase rejects values whose
//! variant does not match the field type at all (surfaced as
//! `InvalidArgument`). The business phase collects every rule violation
//! (required, length, range) across all fields and languages into a single
//! `ContentFieldValidation` aggregate.

use crate::error::{FieldError, RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
	/// Single line of text
	Text(String),
	/// Signed integer
	Integer(i64),
	/// Floating point number
	Float(f64),
	/// Checkbox
	Boolean(bool),
	/// Point in time
	Date(DateTime<Utc>),
	/// Geographic position
	MapLocation {
		/// Latitude in degrees
		latitude: f64,
		/// Longitude in degrees
		longitude: f64,
		/// Free-form address label
		address: String,
	},
	/// References to other content items (relation-capable field type)
	RelationList(Vec<Uuid>),
	/// Absent value
	Empty,
}

impl Value {
	/// Whether the value counts as empty for required-field checks.
	pub fn is_empty(&self) -> bool {
		match self {
			Value::Empty => true,
			Value::Text(s) => s.is_empty(),
			Value::RelationList(ids) => ids.is_empty(),
			_ => false,
		}
	}

	/// Text content, if this is a scalar renderable as a name or
	/// full-text source.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Text(s) => Some(s),
			_ => None,
		}
	}
}

/// Definition of a single field on a content type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
	/// Field identifier, unique within the content type
	pub identifier: String,

	/// Field type identifier, resolved through the [`FieldTypeRegistry`]
	pub field_type: String,

	/// Whether a non-empty value is required in every declared language
	pub required: bool,

	/// When requiredness was introduced. Translations that existed before
	/// this instant are exempt from the required check.
	pub required_since: Option<DateTime<Utc>>,

	/// Whether the field may be targeted by search criteria and sorts
	pub searchable: bool,

	/// Whether the field carries one value per language
	pub translatable: bool,

	/// Type-specific constraint settings, interpreted by the validator
	pub constraints: JsonValue,
}

impl FieldDefinition {
	/// Create a definition with no constraints.
	pub fn new(identifier: impl Into<String>, field_type: impl Into<String>) -> Self {
		Self {
			identifier: identifier.into(),
			field_type: field_type.into(),
			required: false,
			required_since: None,
			searchable: true,
			translatable: true,
			constraints: JsonValue::Null,
		}
	}

	/// Mark the field required as of `since`.
	pub fn required(mut self, since: Option<DateTime<Utc>>) -> Self {
		self.required = true;
		self.required_since = since;
		self
	}

	/// Exclude the field from search.
	pub fn not_searchable(mut self) -> Self {
		self.searchable = false;
		self
	}

	/// Attach constraint settings.
	pub fn with_constraints(mut self, constraints: JsonValue) -> Self {
		self.constraints = constraints;
		self
	}
}

/// Schema object describing a content type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentType {
	/// Unique id
	pub id: Uuid,

	/// Human-oriented identifier, e.g. `article`
	pub identifier: String,

	/// Identifier of the field whose text value names the item
	pub name_field: String,

	/// Field definitions
	pub field_definitions: Vec<FieldDefinition>,
}

impl ContentType {
	/// Create a content type. The first field definition doubles as the
	/// name field unless overridden.
	pub fn new(identifier: impl Into<String>, field_definitions: Vec<FieldDefinition>) -> Self {
		let name_field = field_definitions
			.first()
			.map(|d| d.identifier.clone())
			.unwrap_or_default();
		Self {
			id: Uuid::new_v4(),
			identifier: identifier.into(),
			name_field,
			field_definitions,
		}
	}

	/// Look up a field definition by identifier.
	pub fn field_definition(&self, identifier: &str) -> Option<&FieldDefinition> {
		self.field_definitions
			.iter()
			.find(|d| d.identifier == identifier)
	}
}

/// Failure reported by a field-type validator.
#[derive(Debug, Clone)]
pub enum FieldTypeError {
	/// The value variant does not match the field type at all
	Type {
		/// Variant the field type accepts
		expected: &'static str,
	},
	/// The value is the right shape but violates a business rule
	Rule(String),
}

/// Validates raw values for one field type.
///
/// Implementations must treat [`Value::Empty`] as structurally valid;
/// requiredness is enforced by the store, not by individual validators.
pub trait FieldTypeValidator: Send + Sync {
	/// Check `value` against `definition`.
	fn validate(&self, definition: &FieldDefinition, value: &Value) -> Result<(), FieldTypeError>;
}

/// Registry of field-type validators keyed by field type identifier.
pub struct FieldTypeRegistry {
	validators: dashmap::DashMap<String, Arc<dyn FieldTypeValidator>>,
}

impl FieldTypeRegistry {
	/// Create a registry pre-populated with the builtin field types:
	/// `text_line`, `integer`, `checkbox`, `date`, `map_location` and
	/// `relation_list`.
	pub fn with_builtins() -> Self {
		let registry = Self {
			validators: dashmap::DashMap::new(),
		};
		registry.register("text_line", Arc::new(TextLineValidator));
		registry.register("integer", Arc::new(IntegerValidator));
		registry.register("checkbox", Arc::new(CheckboxValidator));
		registry.register("date", Arc::new(DateValidator));
		registry.register("map_location", Arc::new(MapLocationValidator));
		registry.register("relation_list", Arc::new(RelationListValidator));
		registry
	}

	/// Register a validator for a field type identifier.
	pub fn register(&self, field_type: impl Into<String>, validator: Arc<dyn FieldTypeValidator>) {
		self.validators.insert(field_type.into(), validator);
	}

	/// Resolve the validator for a field type.
	pub fn get(&self, field_type: &str) -> Option<Arc<dyn FieldTypeValidator>> {
		self.validators.get(field_type).map(|v| Arc::clone(&v))
	}

	/// Run the structural phase for one value. A type mismatch or an
	/// unregistered field type is an `InvalidArgument`.
	pub fn check_structure(
		&self,
		definition: &FieldDefinition,
		language: &str,
		value: &Value,
	) -> RepositoryResult<()> {
		let validator = self.get(&definition.field_type).ok_or_else(|| {
			RepositoryError::invalid_argument(
				"field_type",
				format!("no validator registered for '{}'", definition.field_type),
			)
		})?;
		match validator.validate(definition, value) {
			Err(FieldTypeError::Type { expected }) => Err(RepositoryError::invalid_argument(
				format!("fields[{}][{}]", definition.identifier, language),
				format!(
					"value does not match field type '{}' (expected {})",
					definition.field_type, expected
				),
			)),
			// Rule violations belong to the business phase
			_ => Ok(()),
		}
	}

	/// Run the business phase for one value, appending violations to
	/// `errors` instead of failing fast.
	pub fn collect_rule_errors(
		&self,
		definition: &FieldDefinition,
		language: &str,
		value: &Value,
		errors: &mut Vec<FieldError>,
	) {
		if let Some(validator) = self.get(&definition.field_type)
			&& let Err(FieldTypeError::Rule(message)) = validator.validate(definition, value)
		{
			errors.push(FieldError {
				identifier: definition.identifier.clone(),
				language: language.to_string(),
				message,
			});
		}
	}
}

impl Default for FieldTypeRegistry {
	fn default() -> Self {
		Self::with_builtins()
	}
}

/// Required-field check for one version's merged field map.
///
/// A translation is exempt from a definition's required check when the
/// translation was first added before `required_since` — requiredness
/// introduced later must not invalidate pre-existing translations.
pub fn collect_required_errors(
	content_type: &ContentType,
	languages: &[String],
	language_added: &HashMap<String, DateTime<Utc>>,
	fields: &HashMap<(String, String), Value>,
	errors: &mut Vec<FieldError>,
) {
	for definition in &content_type.field_definitions {
		if !definition.required {
			continue;
		}
		for language in languages {
			if let (Some(since), Some(added)) =
				(definition.required_since, language_added.get(language))
				&& *added < since
			{
				continue;
			}
			let key = (definition.identifier.clone(), language.clone());
			let missing = fields.get(&key).is_none_or(Value::is_empty);
			if missing {
				errors.push(FieldError {
					identifier: definition.identifier.clone(),
					language: language.clone(),
					message: "required field has no value".to_string(),
				});
			}
		}
	}
}

struct TextLineValidator;

impl FieldTypeValidator for TextLineValidator {
	fn validate(&self, definition: &FieldDefinition, value: &Value) -> Result<(), FieldTypeError> {
		let text = match value {
			Value::Empty => return Ok(()),
			Value::Text(text) => text,
			_ => return Err(FieldTypeError::Type { expected: "Text" }),
		};
		let min = definition.constraints["min_length"].as_u64();
		let max = definition.constraints["max_length"].as_u64();
		if let Some(min) = min
			&& (text.chars().count() as u64) < min
		{
			return Err(FieldTypeError::Rule(format!(
				"text is shorter than {} characters",
				min
			)));
		}
		if let Some(max) = max
			&& (text.chars().count() as u64) > max
		{
			return Err(FieldTypeError::Rule(format!(
				"text is longer than {} characters",
				max
			)));
		}
		Ok(())
	}
}

struct IntegerValidator;

impl FieldTypeValidator for IntegerValidator {
	fn validate(&self, definition: &FieldDefinition, value: &Value) -> Result<(), FieldTypeError> {
		let n = match value {
			Value::Empty => return Ok(()),
			Value::Integer(n) => *n,
			_ => {
				return Err(FieldTypeError::Type {
					expected: "Integer",
				});
			}
		};
		if let Some(min) = definition.constraints["min"].as_i64()
			&& n < min
		{
			return Err(FieldTypeError::Rule(format!("value is below {}", min)));
		}
		if let Some(max) = definition.constraints["max"].as_i64()
			&& n > max
		{
			return Err(FieldTypeError::Rule(format!("value is above {}", max)));
		}
		Ok(())
	}
}

struct CheckboxValidator;

impl FieldTypeValidator for CheckboxValidator {
	fn validate(&self, _definition: &FieldDefinition, value: &Value) -> Result<(), FieldTypeError> {
		match value {
			Value::Empty | Value::Boolean(_) => Ok(()),
			_ => Err(FieldTypeError::Type {
				expected: "Boolean",
			}),
		}
	}
}

struct DateValidator;

impl FieldTypeValidator for DateValidator {
	fn validate(&self, _definition: &FieldDefinition, value: &Value) -> Result<(), FieldTypeError> {
		match value {
			Value::Empty | Value::Date(_) => Ok(()),
			_ => Err(FieldTypeError::Type { expected: "Date" }),
		}
	}
}

struct MapLocationValidator;

impl FieldTypeValidator for MapLocationValidator {
	fn validate(&self, _definition: &FieldDefinition, value: &Value) -> Result<(), FieldTypeError> {
		match value {
			Value::Empty => Ok(()),
			Value::MapLocation {
				latitude,
				longitude,
				..
			} => {
				if !(-90.0..=90.0).contains(latitude) {
					return Err(FieldTypeError::Rule(
						"latitude must be between -90 and 90".to_string(),
					));
				}
				if !(-180.0..=180.0).contains(longitude) {
					return Err(FieldTypeError::Rule(
						"longitude must be between -180 and 180".to_string(),
					));
				}
				Ok(())
			}
			_ => Err(FieldTypeError::Type {
				expected: "MapLocation",
			}),
		}
	}
}

struct RelationListValidator;

impl FieldTypeValidator for RelationListValidator {
	fn validate(&self, _definition: &FieldDefinition, value: &Value) -> Result<(), FieldTypeError> {
		match value {
			Value::Empty | Value::RelationList(_) => Ok(()),
			_ => Err(FieldTypeError::Type {
				expected: "RelationList",
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn text_line_length_constraints() {
		let registry = FieldTypeRegistry::with_builtins();
		let definition = FieldDefinition::new("title", "text_line")
			.with_constraints(json!({"min_length": 3, "max_length": 5}));

		let mut errors = Vec::new();
		registry.collect_rule_errors(&definition, "eng-GB", &Value::Text("ok".into()), &mut errors);
		registry.collect_rule_errors(
			&definition,
			"eng-GB",
			&Value::Text("too long".into()),
			&mut errors,
		);
		registry.collect_rule_errors(&definition, "eng-GB", &Value::Text("fine".into()), &mut errors);

		assert_eq!(errors.len(), 2);
	}

	#[test]
	fn structural_mismatch_is_invalid_argument() {
		let registry = FieldTypeRegistry::with_builtins();
		let definition = FieldDefinition::new("title", "text_line");

		let result = registry.check_structure(&definition, "eng-GB", &Value::Integer(7));

		assert!(matches!(
			result,
			Err(RepositoryError::InvalidArgument { .. })
		));
	}

	#[test]
	fn required_check_honors_required_since() {
		let since = Utc::now();
		let content_type = ContentType::new(
			"article",
			vec![FieldDefinition::new("title", "text_line").required(Some(since))],
		);

		let mut language_added = HashMap::new();
		language_added.insert("eng-GB".to_string(), since - chrono::Duration::days(1));
		language_added.insert("ger-DE".to_string(), since + chrono::Duration::days(1));

		let fields = HashMap::new();
		let mut errors = Vec::new();
		collect_required_errors(
			&content_type,
			&["eng-GB".to_string(), "ger-DE".to_string()],
			&language_added,
			&fields,
			&mut errors,
		);

		// eng-GB predates requiredness, ger-DE does not
		assert_eq!(errors.len(), 1);
		assert_eq!(errors[0].language, "ger-DE");
	}
}
