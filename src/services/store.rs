use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Conjunction of equality predicates used to locate a single document.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    fields: Vec<(String, Value)>,
}

impl Filter {
    pub fn by(field: &str, value: impl Into<Value>) -> Self {
        Self {
            fields: vec![(field.to_string(), value.into())],
        }
    }

    pub fn and(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.push((field.to_string(), value.into()));
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub(crate) fn matches(&self, doc: &Value) -> bool {
        self.fields.iter().all(|(k, v)| doc.get(k) == Some(v))
    }
}

/// One atomic field mutation. A store backend must apply a whole
/// `Mutation` without interleaving with concurrent updates to the same
/// document; callers never read-modify-write a shared field themselves.
#[derive(Debug, Clone)]
pub enum MutationOp {
    Set {
        path: String,
        value: Value,
    },
    /// Applied only when an upsert creates the document. Lets
    /// provisioning set defaults without clobbering existing fields.
    SetOnInsert {
        path: String,
        value: Value,
    },
    /// Array append, duplicates allowed.
    Push {
        path: String,
        value: Value,
    },
    /// Array append iff the value is absent (set semantics).
    AddToSet {
        path: String,
        value: Value,
    },
    /// Remove every occurrence of the value from the array.
    Pull {
        path: String,
        value: Value,
    },
    /// Numeric add; a missing counter starts from 0.
    Inc {
        path: String,
        by: i64,
    },
    /// Increment a counter inside one element of an array, where the
    /// element is selected by `key_field == key`. Keying by identifier
    /// instead of position keeps the increment correct when a concurrent
    /// append shifts array indices.
    IncMatched {
        array: String,
        key_field: String,
        key: Value,
        path: String,
        by: i64,
    },
}

/// Ordered list of operators applied as one atomic document update.
#[derive(Debug, Clone, Default)]
pub struct Mutation {
    ops: Vec<MutationOp>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.ops.push(MutationOp::Set {
            path: path.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn set_on_insert(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.ops.push(MutationOp::SetOnInsert {
            path: path.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn push(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.ops.push(MutationOp::Push {
            path: path.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn add_to_set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.ops.push(MutationOp::AddToSet {
            path: path.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn pull(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.ops.push(MutationOp::Pull {
            path: path.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn inc(mut self, path: &str, by: i64) -> Self {
        self.ops.push(MutationOp::Inc {
            path: path.to_string(),
            by,
        });
        self
    }

    pub fn inc_matched(
        mut self,
        array: &str,
        key_field: &str,
        key: impl Into<Value>,
        path: &str,
        by: i64,
    ) -> Self {
        self.ops.push(MutationOp::IncMatched {
            array: array.to_string(),
            key_field: key_field.to_string(),
            key: key.into(),
            path: path.to_string(),
            by,
        });
        self
    }

    pub fn ops(&self) -> &[MutationOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every operator to a JSON document in order. Used by the
    /// in-memory backend and by the upsert-create path, where the
    /// document is still private to the caller.
    pub(crate) fn apply_to(&self, doc: &mut Value, inserting: bool) {
        for op in &self.ops {
            match op {
                MutationOp::Set { path, value } => {
                    *entry_mut(doc, path) = value.clone();
                }
                MutationOp::SetOnInsert { path, value } => {
                    if inserting {
                        *entry_mut(doc, path) = value.clone();
                    }
                }
                MutationOp::Push { path, value } => {
                    let slot = entry_mut(doc, path);
                    if !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Value::Array(arr) = slot {
                        arr.push(value.clone());
                    }
                }
                MutationOp::AddToSet { path, value } => {
                    let slot = entry_mut(doc, path);
                    if !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Value::Array(arr) = slot {
                        if !arr.contains(value) {
                            arr.push(value.clone());
                        }
                    }
                }
                MutationOp::Pull { path, value } => {
                    if let Some(arr) = entry_mut(doc, path).as_array_mut() {
                        arr.retain(|v| v != value);
                    }
                }
                MutationOp::Inc { path, by } => {
                    let slot = entry_mut(doc, path);
                    let current = slot.as_i64().unwrap_or(0);
                    *slot = json!(current + by);
                }
                MutationOp::IncMatched {
                    array,
                    key_field,
                    key,
                    path,
                    by,
                } => {
                    if let Some(elements) = entry_mut(doc, array).as_array_mut() {
                        if let Some(elem) = elements
                            .iter_mut()
                            .find(|e| e.get(key_field) == Some(key))
                        {
                            let slot = entry_mut(elem, path);
                            let current = slot.as_i64().unwrap_or(0);
                            *slot = json!(current + by);
                        }
                    }
                }
            }
        }
    }
}

/// Walk a dotted path, creating intermediate objects, and return the
/// final slot.
fn entry_mut<'a>(doc: &'a mut Value, path: &str) -> &'a mut Value {
    let mut current = doc;
    for segment in path.split('.') {
        if !current.is_object() {
            *current = json!({});
        }
        current = current
            .as_object_mut()
            .expect("current is an object")
            .entry(segment.to_string())
            .or_insert(Value::Null);
    }
    current
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Create a document matching the filter merged with the mutation
    /// when nothing matches.
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        Self { upsert: true }
    }
}

/// Typed wrapper over a document collection. `Ok(None)` is the
/// normalized "not found" outcome; `Err` means the store call itself
/// failed and any side effect must be treated as ambiguous.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn fetch_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>>;

    /// Atomically apply `mutation` to the single document matching
    /// `filter` and return the post-update document.
    async fn apply_update(
        &self,
        collection: &str,
        filter: &Filter,
        mutation: &Mutation,
        options: UpdateOptions,
    ) -> Result<Option<Value>>;
}

/// In-process document store. Every call takes the collection lock, so
/// each update is a single serialized atomic step, the same atomicity
/// unit the SurrealDB backend gets from single-statement updates. Used
/// by the test suite and handy for local development.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    fail_update_on: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing upsert semantics.
    pub async fn insert(&self, collection: &str, mut doc: Value) {
        if let Value::Object(map) = &mut doc {
            map.entry("id".to_string())
                .or_insert_with(|| json!(format!("{}:{}", collection, Uuid::new_v4())));
        }
        self.collections
            .lock()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(doc);
    }

    /// Make the next `apply_update` against `collection` fail. Lets
    /// tests exercise the partial-write paths of the dual-write
    /// operations.
    pub async fn inject_update_failure(&self, collection: &str) {
        *self.fail_update_on.lock().await = Some(collection.to_string());
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn fetch_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)))
            .cloned())
    }

    async fn apply_update(
        &self,
        collection: &str,
        filter: &Filter,
        mutation: &Mutation,
        options: UpdateOptions,
    ) -> Result<Option<Value>> {
        {
            let mut fail_on = self.fail_update_on.lock().await;
            if fail_on.as_deref() == Some(collection) {
                *fail_on = None;
                return Err(AppError::Store(format!(
                    "injected update failure on {}",
                    collection
                )));
            }
        }

        let mut collections = self.collections.lock().await;
        let docs = collections.entry(collection.to_string()).or_default();

        if let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) {
            mutation.apply_to(doc, false);
            return Ok(Some(doc.clone()));
        }

        if !options.upsert {
            return Ok(None);
        }

        let mut doc = json!({ "id": format!("{}:{}", collection, Uuid::new_v4()) });
        for (field, value) in filter.fields() {
            doc[field] = value.clone();
        }
        mutation.apply_to(&mut doc, true);
        docs.push(doc.clone());
        Ok(Some(doc))
    }
}
