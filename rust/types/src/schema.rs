use indexmap::IndexMap;
use recordindex_error::{ErrorCodes, RecordIndexError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// Property names shared by every field definition.
pub const ATTR_FIELD_NAME: &str = "name";
pub const ATTR_TYPE: &str = "type";
pub const ATTR_INDEXED: &str = "indexed";
pub const ATTR_STORED: &str = "stored";

// Fields the engine maintains on its own.
pub const FIELD_ID: &str = "id";
pub const FIELD_VERSION: &str = "_version_";
pub const FIELD_TIMESTAMP: &str = "_timestamp";

/// The value type of an indexed field. Anything the engine knows beyond the
/// primitive types is carried verbatim in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Boolean => "boolean",
            FieldType::Other(name) => name,
        }
    }
}

impl From<&str> for FieldType {
    fn from(value: &str) -> Self {
        match value {
            "string" => FieldType::String,
            "int" => FieldType::Int,
            "long" => FieldType::Long,
            "float" => FieldType::Float,
            "double" => FieldType::Double,
            "boolean" => FieldType::Boolean,
            other => FieldType::Other(other.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        FieldType::from(value.as_str())
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SchemaFieldError {
    #[error("Fields must have an attribute called 'name'")]
    MissingName,
    #[error("Field '{field}' has an invalid value for '{property}': {value}")]
    InvalidProperty {
        field: String,
        property: String,
        value: Value,
    },
}

impl RecordIndexError for SchemaFieldError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// A single field definition: its name, value type, the two flags every
/// field carries and any engine-specific properties.
///
/// Only the name is mandatory. A definition without a type is passed on as
/// is and the engine decides whether it accepts it.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaField {
    name: String,
    field_type: Option<FieldType>,
    indexed: Option<bool>,
    stored: Option<bool>,
    properties: IndexMap<String, Value>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: impl Into<FieldType>) -> Self {
        SchemaField {
            name: name.into(),
            field_type: Some(field_type.into()),
            indexed: None,
            stored: None,
            properties: IndexMap::new(),
        }
    }

    /// A definition carrying nothing but its name.
    pub fn untyped(name: impl Into<String>) -> Self {
        SchemaField {
            name: name.into(),
            field_type: None,
            indexed: None,
            stored: None,
            properties: IndexMap::new(),
        }
    }

    pub fn with_indexed(mut self, indexed: bool) -> Self {
        self.indexed = Some(indexed);
        self
    }

    pub fn with_stored(mut self, stored: bool) -> Self {
        self.stored = Some(stored);
        self
    }

    /// Attaches an engine-specific property. The reserved keys are routed to
    /// their typed slots so that two equal definitions always compare equal.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            ATTR_FIELD_NAME => {
                if let Value::String(name) = value {
                    self.name = name;
                }
            }
            ATTR_TYPE => {
                if let Value::String(field_type) = value {
                    self.field_type = Some(FieldType::from(field_type));
                }
            }
            ATTR_INDEXED => self.indexed = value.as_bool(),
            ATTR_STORED => self.stored = value.as_bool(),
            _ => {
                self.properties.insert(key, value);
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> Option<&FieldType> {
        self.field_type.as_ref()
    }

    pub fn indexed(&self) -> Option<bool> {
        self.indexed
    }

    pub fn stored(&self) -> Option<bool> {
        self.stored
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    /// Flattens the definition into the property object the engine's schema
    /// API expects.
    pub fn to_properties(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(ATTR_FIELD_NAME.to_string(), Value::from(self.name.clone()));
        if let Some(field_type) = &self.field_type {
            map.insert(ATTR_TYPE.to_string(), Value::from(field_type.as_str()));
        }
        if let Some(indexed) = self.indexed {
            map.insert(ATTR_INDEXED.to_string(), Value::Bool(indexed));
        }
        if let Some(stored) = self.stored {
            map.insert(ATTR_STORED.to_string(), Value::Bool(stored));
        }
        for (key, value) in &self.properties {
            map.insert(key.clone(), value.clone());
        }
        map
    }

    pub fn from_properties(mut properties: Map<String, Value>) -> Result<Self, SchemaFieldError> {
        let name = match properties.remove(ATTR_FIELD_NAME) {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            _ => return Err(SchemaFieldError::MissingName),
        };
        let field_type = match properties.remove(ATTR_TYPE) {
            None => None,
            Some(Value::String(field_type)) if !field_type.trim().is_empty() => {
                Some(FieldType::from(field_type))
            }
            Some(value) => {
                return Err(SchemaFieldError::InvalidProperty {
                    field: name,
                    property: ATTR_TYPE.to_string(),
                    value,
                })
            }
        };
        let indexed = take_flag(&name, ATTR_INDEXED, &mut properties)?;
        let stored = take_flag(&name, ATTR_STORED, &mut properties)?;
        Ok(SchemaField {
            name,
            field_type,
            indexed,
            stored,
            properties: properties.into_iter().collect(),
        })
    }
}

fn take_flag(
    field: &str,
    property: &str,
    properties: &mut Map<String, Value>,
) -> Result<Option<bool>, SchemaFieldError> {
    match properties.remove(property) {
        None => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(flag)),
        Some(Value::String(flag)) if flag == "true" => Ok(Some(true)),
        Some(Value::String(flag)) if flag == "false" => Ok(Some(false)),
        Some(value) => Err(SchemaFieldError::InvalidProperty {
            field: field.to_string(),
            property: property.to_string(),
            value,
        }),
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SchemaParseError {
    #[error("Property '{property}' of field #{position} is not a key:value pair")]
    MissingSeparator { position: usize, property: String },
    #[error("Field #{position} has a property with an empty key")]
    EmptyKey { position: usize },
    #[error("Field #{position} defines '{key}' more than once")]
    DuplicateProperty { position: usize, key: String },
    #[error("Field #{position} has no 'name' property")]
    MissingName { position: usize },
    #[error("Field '{0}' is defined more than once")]
    DuplicateField(String),
    #[error(transparent)]
    Field(#[from] SchemaFieldError),
}

impl RecordIndexError for SchemaParseError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// The fields of a collection and its unique key.
///
/// Fields keep their insertion order so that diffs and update batches come
/// out deterministically; equality ignores that order.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    unique_key: String,
    fields: IndexMap<String, SchemaField>,
}

impl Default for Schema {
    fn default() -> Self {
        Schema {
            unique_key: FIELD_ID.to_string(),
            fields: IndexMap::new(),
        }
    }
}

impl Schema {
    /// A blank unique key falls back to [`FIELD_ID`].
    pub fn new(
        unique_key: impl Into<String>,
        fields: impl IntoIterator<Item = SchemaField>,
    ) -> Self {
        let unique_key = unique_key.into();
        let unique_key = if unique_key.trim().is_empty() {
            FIELD_ID.to_string()
        } else {
            unique_key
        };
        Schema {
            unique_key,
            fields: fields
                .into_iter()
                .map(|field| (field.name().to_string(), field))
                .collect(),
        }
    }

    pub fn with_fields(fields: impl IntoIterator<Item = SchemaField>) -> Self {
        Schema::new(FIELD_ID, fields)
    }

    /// Builds a schema from what the engine reports: a unique key and one
    /// property object per field.
    pub fn from_remote(
        unique_key: impl Into<String>,
        fields: Vec<Map<String, Value>>,
    ) -> Result<Self, SchemaFieldError> {
        let fields = fields
            .into_iter()
            .map(SchemaField::from_properties)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Schema::new(unique_key, fields))
    }

    /// Parses the declarative schema string attached to a table definition:
    /// comma-separated fields, each a whitespace-separated list of
    /// `key:value` pairs.
    ///
    /// ```
    /// use recordindex_types::{FieldType, Schema};
    ///
    /// let schema = Schema::parse(
    ///     Some("id"),
    ///     "name:price type:double indexed:true stored:true, name:symbol type:string",
    /// )
    /// .unwrap();
    /// assert_eq!(schema.len(), 2);
    /// assert_eq!(
    ///     schema.field("price").unwrap().field_type(),
    ///     Some(&FieldType::Double)
    /// );
    /// ```
    pub fn parse(primary_key: Option<&str>, schema: &str) -> Result<Self, SchemaParseError> {
        let mut parsed = Schema::new(primary_key.unwrap_or_default(), []);
        let definitions = schema
            .split(',')
            .map(str::trim)
            .filter(|definition| !definition.is_empty());
        for (position, definition) in definitions.enumerate() {
            let field = parse_field(position, definition)?;
            if parsed.contains_field(field.name()) {
                return Err(SchemaParseError::DuplicateField(field.name().to_string()));
            }
            parsed.add_field(field);
        }
        Ok(parsed)
    }

    pub fn unique_key(&self) -> &str {
        &self.unique_key
    }

    /// Returns an owned copy of the field map.
    pub fn fields(&self) -> IndexMap<String, SchemaField> {
        self.fields.clone()
    }

    pub fn field(&self, name: &str) -> Option<SchemaField> {
        self.fields.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.values()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Inserts or overwrites a field, returning the definition it replaced.
    pub fn add_field(&mut self, field: SchemaField) -> Option<SchemaField> {
        self.fields.insert(field.name().to_string(), field)
    }

    /// Fields of `self` overlaid by the fields of `newer`; the unique key is
    /// taken from `newer`.
    pub fn merged_with(&self, newer: &Schema) -> Schema {
        let mut merged = Schema {
            unique_key: newer.unique_key.clone(),
            fields: self.fields.clone(),
        };
        for field in newer.iter() {
            merged.add_field(field.clone());
        }
        merged
    }

    /// True for the fields a destructive rebuild must never drop.
    pub fn is_protected(&self, name: &str) -> bool {
        name == self.unique_key || name == FIELD_VERSION
    }
}

fn parse_field(position: usize, definition: &str) -> Result<SchemaField, SchemaParseError> {
    let mut properties = Map::new();
    for property in definition.split_whitespace() {
        let (key, value) =
            property
                .split_once(':')
                .ok_or_else(|| SchemaParseError::MissingSeparator {
                    position,
                    property: property.to_string(),
                })?;
        if key.is_empty() {
            return Err(SchemaParseError::EmptyKey { position });
        }
        if properties.contains_key(key) {
            return Err(SchemaParseError::DuplicateProperty {
                position,
                key: key.to_string(),
            });
        }
        let value = match key {
            ATTR_FIELD_NAME | ATTR_TYPE => Value::from(value),
            _ => parse_scalar(value),
        };
        properties.insert(key.to_string(), value);
    }
    if !properties.contains_key(ATTR_FIELD_NAME) {
        return Err(SchemaParseError::MissingName { position });
    }
    Ok(SchemaField::from_properties(properties)?)
}

fn parse_scalar(value: &str) -> Value {
    match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => value
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(value)),
    }
}
