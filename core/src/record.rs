use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::Value;

/// Field name → value map of a record (everything except the id)
pub type Fields = BTreeMap<String, Value>;

/// Name of the identity field. It is never stored in [`Fields`].
pub const ID_FIELD: &str = "id";

/// Stable identifier of a record. Opaque text; freshly assigned ids are ULIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// A fresh, unique id
    pub fn generate() -> Self { RecordId(ulid::Ulid::new().to_string()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self { RecordId(s.to_string()) }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self { RecordId(s) }
}

impl From<&RecordId> for RecordId {
    fn from(id: &RecordId) -> Self { id.clone() }
}

/// One entity instance: an immutable id plus mutable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    #[serde(flatten)]
    fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self { Self { id: id.into(), fields: Fields::new() } }

    pub fn from_parts(id: impl Into<RecordId>, mut fields: Fields) -> Self {
        fields.remove(ID_FIELD);
        Self { id: id.into(), fields }
    }

    /// Builder-style field assignment
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn id(&self) -> &RecordId { &self.id }

    pub fn get(&self, field: &str) -> Option<&Value> { self.fields.get(field) }

    /// Like [`Record::get`], but the identity field resolves to the id as a string.
    /// Filtering, sorting and facet counts read fields through this.
    pub fn value(&self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            return Some(Value::String(self.id.0.clone()));
        }
        self.fields.get(field).cloned()
    }

    pub fn fields(&self) -> &Fields { &self.fields }

    pub fn into_fields(self) -> Fields { self.fields }

    /// Set one field. Writes to the identity field are ignored.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        if field != ID_FIELD {
            self.fields.insert(field, value.into());
        }
    }

    /// Merge `patch` into this record, skipping the identity field. Returns whether anything changed.
    pub fn merge(&mut self, patch: &Fields) -> bool {
        let mut changed = false;
        for (name, value) in patch {
            if name == ID_FIELD {
                continue;
            }
            if self.fields.get(name) != Some(value) {
                self.fields.insert(name.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }
}

/// A record that has not been stored yet. The id is optional; the store assigns one when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl RecordDraft {
    pub fn new() -> Self { Self::default() }

    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        if field != ID_FIELD {
            self.fields.insert(field, value.into());
        }
        self
    }

    /// Materialize into a record, generating an id when none was supplied
    pub fn into_record(self) -> Record {
        let id = self.id.unwrap_or_else(RecordId::generate);
        Record::from_parts(id, self.fields)
    }
}

impl From<Record> for RecordDraft {
    fn from(record: Record) -> Self { RecordDraft { id: Some(record.id), fields: record.fields } }
}

/// Build a [`Fields`] map: `fields! { "name" => "Adli Destek", "isActive" => false }`
#[macro_export]
macro_rules! fields {
    () => { $crate::record::Fields::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::record::Fields::new();
        $( fields.insert(::std::string::String::from($name), $crate::value::Value::from($value)); )+
        fields
    }};
}
