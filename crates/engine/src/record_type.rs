//! Record type registration: how a declared record type's id and indexes
//! are derived from its decoded value (spec §3.1 "Record", §4.5).
//!
//! Records are represented uniformly as [`FieldValue::Array`] — the same
//! dynamically-typed value SPARQL evaluation already uses (spec §4.11.2)
//! — so one `rmp-serde` encode/decode pair and one [`IndexDefinition`]
//! implementation cover every declared record type, instead of requiring
//! a generic parameter per type the way a statically-typed model would.

use recordgraph_core::error::{RecordGraphError, Result};
use recordgraph_core::keyspace::Subspace;
use recordgraph_core::value::FieldValue;
use recordgraph_storage::IndexDefinition;
use std::sync::Arc;

/// An index whose key expressions are a fixed list of field positions
/// within a record's `Array` — the "ordered list of key expressions (field
/// paths)" spec §3.1 describes.
pub struct FieldPathIndex {
    name: String,
    field_positions: Vec<usize>,
}

impl FieldPathIndex {
    /// Construct an index named `name` over the fields at `field_positions`
    /// (in declaration order) of each record's top-level array.
    pub fn new(name: impl Into<String>, field_positions: Vec<usize>) -> Self {
        Self { name: name.into(), field_positions }
    }
}

impl IndexDefinition<FieldValue> for FieldPathIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn key_expressions(&self, record: &FieldValue) -> Vec<Vec<FieldValue>> {
        let FieldValue::Array(fields) = record else {
            return Vec::new();
        };
        let values: Option<Vec<FieldValue>> =
            self.field_positions.iter().map(|&i| fields.get(i).cloned()).collect();
        match values {
            Some(v) => vec![v],
            None => Vec::new(),
        }
    }
}

/// A declared record type: its name, which field positions make up its id
/// tuple, and the indexes a write session must maintain for it.
pub struct RecordType {
    name: String,
    id_fields: Vec<usize>,
    indexes: Vec<Arc<dyn IndexDefinition<FieldValue> + Send + Sync>>,
}

impl RecordType {
    /// Declare a record type named `name` whose id is the tuple of fields
    /// at `id_fields` within each record's top-level array.
    pub fn new(name: impl Into<String>, id_fields: Vec<usize>) -> Self {
        Self { name: name.into(), id_fields, indexes: Vec::new() }
    }

    /// Register an index this type's write path must maintain.
    pub fn with_index(mut self, index: Arc<dyn IndexDefinition<FieldValue> + Send + Sync>) -> Self {
        self.indexes.push(index);
        self
    }

    /// This type's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The indexes declared for this type.
    pub fn indexes(&self) -> &[Arc<dyn IndexDefinition<FieldValue> + Send + Sync>] {
        &self.indexes
    }

    /// Derive a record's id tuple from its decoded value.
    pub fn id_of(&self, record: &FieldValue) -> Result<Vec<FieldValue>> {
        let FieldValue::Array(fields) = record else {
            return Err(RecordGraphError::IncompatibleLiteralType("record is not an array".into()));
        };
        self.id_fields
            .iter()
            .map(|&i| {
                fields
                    .get(i)
                    .cloned()
                    .ok_or_else(|| RecordGraphError::IncompatibleLiteralType(format!("missing id field {i}")))
            })
            .collect()
    }

    /// The subspace `R/<typeName>` record bytes are stored under.
    pub fn subspace(&self) -> Subspace {
        Subspace::new(b"R".to_vec()).child(&self.name)
    }
}

/// Serialize a decoded record to its opaque on-disk representation.
pub fn encode(record: &FieldValue) -> Result<Vec<u8>> {
    rmp_serde::to_vec(record).map_err(|e| RecordGraphError::Storage(format!("record encode failed: {e}")))
}

/// Deserialize a record from its opaque on-disk representation.
pub fn decode(bytes: &[u8]) -> Result<FieldValue> {
    rmp_serde::from_slice(bytes).map_err(|e| RecordGraphError::Storage(format!("record decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_of_extracts_declared_fields() {
        let rt = RecordType::new("user", vec![0]);
        let record = FieldValue::Array(vec![FieldValue::String("alice".into()), FieldValue::Int64(30)]);
        assert_eq!(rt.id_of(&record).unwrap(), vec![FieldValue::String("alice".into())]);
    }

    #[test]
    fn field_path_index_projects_fields() {
        let idx = FieldPathIndex::new("by_email", vec![1]);
        let record = FieldValue::Array(vec![
            FieldValue::String("alice".into()),
            FieldValue::String("alice@example.com".into()),
        ]);
        assert_eq!(idx.key_expressions(&record), vec![vec![FieldValue::String("alice@example.com".into())]]);
    }

    #[test]
    fn encode_decode_round_trips() {
        let record = FieldValue::Array(vec![FieldValue::Int64(1), FieldValue::Null]);
        let bytes = encode(&record).unwrap();
        assert_eq!(decode(&bytes).unwrap(), record);
    }
}
