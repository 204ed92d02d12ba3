use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::error::DbError;
use crate::value::{get_path, Document};

pub type MigrationStrategy = std::sync::Arc<dyn Fn(Document) -> Result<Document, String> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrimaryKey {
    Single(String),
    Compound(Vec<String>),
}

impl PrimaryKey {
    pub fn fields(&self) -> Vec<String> {
        match self {
            PrimaryKey::Single(f) => vec![f.clone()],
            PrimaryKey::Compound(fs) => fs.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IndexDef {
    pub name: String,
    pub fields: Vec<String>,
}

impl IndexDef {
    pub fn new(fields: Vec<String>) -> Self {
        let name = fields.join("_");
        Self { name, fields }
    }

    pub fn named(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self { name: name.into(), fields }
    }
}

#[derive(Clone)]
pub struct Schema {
    pub primary_key: PrimaryKey,
    pub rev_field: String,
    pub json_schema: Option<Value>,
    pub indexes: Vec<IndexDef>,
    pub encrypted_fields: HashSet<String>,
    pub migrations: BTreeMap<u32, MigrationStrategy>,
    pub version: u32,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            primary_key: PrimaryKey::Single("id".to_string()),
            rev_field: "_rev".to_string(),
            json_schema: None,
            indexes: Vec::new(),
            encrypted_fields: HashSet::new(),
            migrations: BTreeMap::new(),
            version: 0,
        }
    }
}

impl Schema {
    /// Extract the primary-key string for `doc`. Compound keys serialize
    /// as a JSON array of their component values.
    pub fn extract_key(&self, doc: &Document) -> Result<String, DbError> {
        match &self.primary_key {
            PrimaryKey::Single(field) => {
                let v = doc.get(field).ok_or_else(|| DbError::Validation {
                    path: field.clone(),
                    message: "primary key field is required".to_string(),
                })?;
                Ok(value_to_key_string(v))
            }
            PrimaryKey::Compound(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                for f in fields {
                    let v = doc.get(f).ok_or_else(|| DbError::Validation {
                        path: f.clone(),
                        message: "primary key field is required".to_string(),
                    })?;
                    values.push(v.clone());
                }
                Ok(serde_json::to_string(&Value::Array(values))
                    .expect("json arrays always serialize"))
            }
        }
    }

    /// Walk the JSON-Schema's `properties`, applying any `default` for
    /// fields absent from `doc`. Recurses into nested object schemas.
    pub fn apply_defaults(&self, doc: &mut Document) {
        if let Some(schema) = &self.json_schema {
            apply_defaults_recursive(schema, doc);
        }
    }

    /// Validate `doc` against the JSON-Schema blob, if one is configured.
    /// Absent schema is a no-op, not an error (see SPEC_FULL.md §4.3).
    pub fn validate(&self, doc: &Document) -> Result<(), DbError> {
        let Some(schema) = &self.json_schema else {
            return Ok(());
        };
        let compiled = jsonschema::JSONSchema::compile(schema).map_err(|e| DbError::Validation {
            path: String::new(),
            message: format!("invalid schema: {e}"),
        })?;
        let instance = Value::Object(doc.clone());
        if let Err(mut errors) = compiled.validate(&instance) {
            let first = errors.next().expect("validate() returned Err with no errors");
            return Err(DbError::Validation {
                path: first.instance_path.to_string(),
                message: first.to_string(),
            });
        }
        Ok(())
    }

    /// Reject updates that change a field flagged `final` in the schema.
    pub fn enforce_final_fields(&self, old: &Document, new: &Document) -> Result<(), DbError> {
        let Some(schema) = &self.json_schema else {
            return Ok(());
        };
        let Some(props) = schema.get("properties").and_then(|p| p.as_object()) else {
            return Ok(());
        };
        for (field, def) in props {
            let is_final = def.get("final").and_then(|v| v.as_bool()).unwrap_or(false);
            if !is_final {
                continue;
            }
            if old.get(field) != new.get(field) {
                return Err(DbError::FinalField { field: field.clone() });
            }
        }
        Ok(())
    }
}

fn apply_defaults_recursive(schema: &Value, doc: &mut Document) {
    let Some(props) = schema.get("properties").and_then(|p| p.as_object()) else {
        return;
    };
    for (field, def) in props {
        if !doc.contains_key(field) {
            if let Some(default) = def.get("default") {
                doc.insert(field.clone(), default.clone());
            }
        }
        if def.get("type").and_then(|t| t.as_str()) == Some("object") {
            if let Some(Value::Object(nested)) = doc.get_mut(field) {
                apply_defaults_recursive(def, nested);
            }
        }
    }
}

fn value_to_key_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read a nested field path out of a document for index/encryption
/// purposes, delegating to the shared path-walking helper.
pub fn field_value<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    get_path(doc, path)
}
