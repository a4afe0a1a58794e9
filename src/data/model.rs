//! Single-entity attribute store with change tracking and REST sync.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::data::error::{DataError, FieldErrors};
use crate::data::path;
use crate::data::schema::ModelDef;
use crate::data::transport::{Method, RestTransport};
use crate::events::{EventBus, ListenerId};

/// Options for attribute writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Suppress `change` / `change:<attr>` events.
    pub silent: bool,
}

impl SetOptions {
    pub fn silent() -> Self {
        Self { silent: true }
    }
}

struct ModelState {
    attributes: Map<String, Value>,
    snapshot: Map<String, Value>,
    errors: FieldErrors,
    loading: bool,
}

struct ModelInner {
    cid: String,
    def: Arc<ModelDef>,
    transport: Arc<dyn RestTransport>,
    bus: EventBus,
    state: Mutex<ModelState>,
}

/// Shared handle to one model. Clones refer to the same entity.
///
/// Events (on [`Model::bus`]): `change:<path>`, `change`, `invalid`,
/// `request`, `sync`, `error`, `destroy`.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

/// Non-owning handle, used by views that observe a model they don't own.
#[derive(Clone)]
pub struct WeakModel {
    inner: Weak<ModelInner>,
}

impl WeakModel {
    pub fn upgrade(&self) -> Option<Model> {
        self.inner.upgrade().map(|inner| Model { inner })
    }
}

impl Model {
    /// New model with the definition's defaults overlaid by `attributes`.
    /// The snapshot starts equal to the attributes, so a new model is clean.
    pub fn new(def: Arc<ModelDef>, transport: Arc<dyn RestTransport>, attributes: Value) -> Self {
        let mut merged = def.defaults().clone();
        if let Value::Object(map) = attributes {
            path::merge(&mut merged, map);
        }

        Self {
            inner: Arc::new(ModelInner {
                cid: uuid::Uuid::new_v4().to_string(),
                def,
                transport,
                bus: EventBus::new(),
                state: Mutex::new(ModelState {
                    snapshot: merged.clone(),
                    attributes: merged,
                    errors: FieldErrors::new(),
                    loading: false,
                }),
            }),
        }
    }

    /// Client-side id, unique per handle even before the model is persisted.
    pub fn cid(&self) -> &str {
        &self.inner.cid
    }

    pub fn def(&self) -> &Arc<ModelDef> {
        &self.inner.def
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn downgrade(&self) -> WeakModel {
        WeakModel {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same model.
    pub fn ptr_eq(&self, other: &Model) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        path::get_in(&self.inner.state.lock().attributes, path).cloned()
    }

    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_some_and(|v| !v.is_null())
    }

    /// Value of the identity attribute, if set and non-null.
    pub fn id(&self) -> Option<Value> {
        self.get(self.inner.def.identity_attribute())
            .filter(|id| !id.is_null())
    }

    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.inner.state.lock().attributes.clone())
    }

    /// The last known server representation.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.inner.state.lock().snapshot.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().loading
    }

    pub fn errors(&self) -> FieldErrors {
        self.inner.state.lock().errors.clone()
    }

    pub fn error_for(&self, field: &str) -> Option<Vec<String>> {
        self.inner.state.lock().errors.get(field).cloned()
    }

    pub fn clear_errors(&self) {
        self.inner.state.lock().errors.clear();
    }

    /// Write one value. Returns whether anything changed (deep comparison).
    pub fn set(&self, path: &str, value: Value, options: SetOptions) -> bool {
        let mut patch = Map::new();
        patch.insert(path.to_string(), value);
        !self.set_many(patch, options).is_empty()
    }

    /// Write several dotted paths at once; fires `change:<path>` for each
    /// changed path and then a single `change`. Returns the changed paths.
    pub fn set_many(&self, values: Map<String, Value>, options: SetOptions) -> Vec<String> {
        let mut changes = Vec::new();
        {
            let mut state = self.inner.state.lock();
            for (key, value) in values {
                let previous = path::get_in(&state.attributes, &key).cloned();
                if previous.as_ref() == Some(&value) {
                    continue;
                }
                path::set_in(&mut state.attributes, &key, value.clone());
                changes.push((key, value, previous.unwrap_or(Value::Null)));
            }
        }

        let changed: Vec<String> = changes.iter().map(|(key, _, _)| key.clone()).collect();
        if !options.silent {
            self.emit_changes(changes);
        }
        changed
    }

    /// Remove an attribute.
    pub fn unset(&self, path: &str, options: SetOptions) -> bool {
        let previous = path::remove_in(&mut self.inner.state.lock().attributes, path);
        match previous {
            Some(previous) => {
                if !options.silent {
                    self.emit_changes(vec![(path.to_string(), Value::Null, previous)]);
                }
                true
            }
            None => false,
        }
    }

    fn emit_changes(&self, changes: Vec<(String, Value, Value)>) {
        if changes.is_empty() {
            return;
        }
        let id = self.id().unwrap_or(Value::Null);
        let mut summary = Map::new();
        for (key, value, previous) in changes {
            self.inner.bus.emit(
                &format!("change:{}", key),
                json!({ "attribute": key, "value": value, "previous": previous, "id": id }),
            );
            summary.insert(key, value);
        }
        self.inner.bus.emit(
            "change",
            json!({ "changes": summary, "id": id, "cid": self.inner.cid }),
        );
    }

    /// True iff any attribute differs from the snapshot by deep value.
    pub fn is_dirty(&self) -> bool {
        let state = self.inner.state.lock();
        state.attributes != state.snapshot
    }

    /// Top-level attributes that differ from the snapshot. Attributes removed
    /// since the snapshot appear as `null`.
    pub fn changed_attributes(&self) -> Map<String, Value> {
        let state = self.inner.state.lock();
        let mut diff = Map::new();
        for (key, value) in &state.attributes {
            if state.snapshot.get(key) != Some(value) {
                diff.insert(key.clone(), value.clone());
            }
        }
        for key in state.snapshot.keys() {
            if !state.attributes.contains_key(key) {
                diff.insert(key.clone(), Value::Null);
            }
        }
        diff
    }

    /// Discard local edits, restoring the snapshot.
    pub fn revert(&self, options: SetOptions) {
        let changes: Vec<(String, Value, Value)> = {
            let mut state = self.inner.state.lock();
            let mut changes = Vec::new();
            for (key, value) in &state.snapshot {
                let current = state.attributes.get(key).cloned().unwrap_or(Value::Null);
                if &current != value {
                    changes.push((key.clone(), value.clone(), current));
                }
            }
            for (key, value) in &state.attributes {
                if !state.snapshot.contains_key(key) {
                    changes.push((key.clone(), Value::Null, value.clone()));
                }
            }
            state.attributes = state.snapshot.clone();
            changes
        };
        if !options.silent {
            self.emit_changes(changes);
        }
    }

    /// Run the definition's rules, replacing the error map.
    pub fn validate(&self) -> bool {
        let errors = {
            let mut state = self.inner.state.lock();
            let errors = self.inner.def.validate(&state.attributes);
            state.errors = errors.clone();
            errors
        };
        if errors.is_empty() {
            return true;
        }
        self.inner.bus.emit("invalid", json!({ "errors": errors }));
        false
    }

    pub fn build_url(&self, id: Option<&Value>) -> String {
        self.inner.def.build_url(id)
    }

    /// GET the member URL and adopt the server's representation.
    pub async fn fetch(&self) -> Result<(), DataError> {
        let id = self.require_id()?;
        let url = self.build_url(Some(&id));
        let data = self.request(Method::Get, &url, None).await?;
        self.adopt(data);
        Ok(())
    }

    /// Persist the model.
    ///
    /// Without an identity this POSTs every attribute and adopts the returned
    /// id. With one, it PUTs only the diff against the snapshot plus the
    /// definition's bookkeeping fields; a clean model sends nothing.
    ///
    /// Returns whether a request was issued.
    pub async fn save(&self) -> Result<bool, DataError> {
        if self.inner.def.has_rules() && !self.validate() {
            return Err(DataError::Validation(self.errors()));
        }

        let data = match self.id() {
            None => {
                let body = self.to_json();
                let url = self.build_url(None);
                self.request(Method::Post, &url, Some(body)).await?
            }
            Some(id) => {
                let mut body = self.changed_attributes();
                if body.is_empty() {
                    tracing::debug!(model = %self.inner.def.name(), "Save skipped: nothing changed");
                    return Ok(false);
                }
                for field in self.inner.def.bookkeeping_fields() {
                    if let Some(value) = self.get(field) {
                        body.insert(field.clone(), value);
                    }
                }
                let url = self.build_url(Some(&id));
                self.request(Method::Put, &url, Some(Value::Object(body))).await?
            }
        };

        self.adopt(data);
        Ok(true)
    }

    /// DELETE the member URL. A model that was never persisted is destroyed
    /// locally without a request.
    pub async fn destroy(&self) -> Result<(), DataError> {
        if let Some(id) = self.id() {
            let url = self.build_url(Some(&id));
            self.request(Method::Delete, &url, None).await?;
        }
        self.inner.bus.emit(
            "destroy",
            json!({ "id": self.id().unwrap_or(Value::Null), "cid": self.inner.cid }),
        );
        Ok(())
    }

    fn require_id(&self) -> Result<Value, DataError> {
        self.id().ok_or_else(|| DataError::MissingIdentity {
            model: self.inner.def.name().to_string(),
        })
    }

    /// One transport round trip with `loading` held for its duration.
    async fn request(&self, method: Method, url: &str, body: Option<Value>) -> Result<Value, DataError> {
        self.inner.state.lock().loading = true;
        scopeguard::defer! {
            self.inner.state.lock().loading = false;
        }

        self.inner
            .bus
            .emit("request", json!({ "method": method.as_str(), "url": url }));

        let result = self
            .inner
            .transport
            .request(method, url, body.as_ref(), None)
            .await
            .and_then(|response| response.into_result());

        match result {
            Ok(data) => {
                self.inner.state.lock().errors.clear();
                Ok(data)
            }
            Err(err) => {
                tracing::warn!(
                    model = %self.inner.def.name(),
                    method = method.as_str(),
                    url = %url,
                    error = %err,
                    "Model request failed"
                );
                self.inner.state.lock().errors = err.field_errors();
                self.inner
                    .bus
                    .emit("error", json!({ "message": err.to_string(), "errors": err.field_errors() }));
                Err(err)
            }
        }
    }

    /// Merge the server's representation over the attributes and make it the
    /// new snapshot.
    fn adopt(&self, data: Value) {
        if let Value::Object(map) = data {
            self.set_many(map, SetOptions::default());
        }
        {
            let mut state = self.inner.state.lock();
            state.snapshot = state.attributes.clone();
        }
        self.inner.bus.emit("sync", self.to_json());
    }

    /// Subscribe to this model's events.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.bus.on(event, listener)
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("def", &self.inner.def.name())
            .field("cid", &self.inner.cid)
            .field("attributes", &self.inner.state.lock().attributes)
            .finish()
    }
}
