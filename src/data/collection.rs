//! Ordered, paginated set of models synced against a list endpoint.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::data::error::{DataError, FieldErrors};
use crate::data::model::{Model, SetOptions};
use crate::data::path;
use crate::data::schema::{identity_key, ModelDef};
use crate::data::transport::{QueryParams, RestTransport};
use crate::events::{EventBus, ListenerId};

/// Pagination metadata returned by list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub per_page: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u64,
}

/// Input accepted by [`Collection::add`].
pub enum AddInput {
    Data(Value),
    Model(Model),
    Many(Vec<AddInput>),
}

impl From<Value> for AddInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => AddInput::Many(items.into_iter().map(AddInput::Data).collect()),
            other => AddInput::Data(other),
        }
    }
}

impl From<Model> for AddInput {
    fn from(model: Model) -> Self {
        AddInput::Model(model)
    }
}

impl From<Vec<Model>> for AddInput {
    fn from(models: Vec<Model>) -> Self {
        AddInput::Many(models.into_iter().map(AddInput::Model).collect())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddOptions {
    pub silent: bool,
    /// Insert position; appends when `None`.
    pub at: Option<usize>,
}

/// Target of [`Collection::remove`].
pub enum ModelRef {
    Model(Model),
    Id(Value),
}

impl From<Model> for ModelRef {
    fn from(model: Model) -> Self {
        ModelRef::Model(model)
    }
}

impl From<&Model> for ModelRef {
    fn from(model: &Model) -> Self {
        ModelRef::Model(model.clone())
    }
}

impl From<Value> for ModelRef {
    fn from(id: Value) -> Self {
        ModelRef::Id(id)
    }
}

/// Filter for [`Collection::where_`].
pub enum Where {
    /// Every listed (dotted) attribute equals the given value.
    Attrs(Map<String, Value>),
    Predicate(Box<dyn Fn(&Model) -> bool>),
}

impl Where {
    pub fn attrs(value: Value) -> Self {
        match value {
            Value::Object(map) => Where::Attrs(map),
            _ => Where::Attrs(Map::new()),
        }
    }

    pub fn predicate<F: Fn(&Model) -> bool + 'static>(check: F) -> Self {
        Where::Predicate(Box::new(check))
    }

    fn matches(&self, model: &Model) -> bool {
        match self {
            Where::Attrs(attrs) => attrs
                .iter()
                .all(|(path, expected)| model.get(path).as_ref() == Some(expected)),
            Where::Predicate(check) => check(model),
        }
    }
}

struct Member {
    model: Model,
    forward: ListenerId,
}

struct CollectionState {
    members: Vec<Member>,
    pagination: Pagination,
    params: QueryParams,
    errors: FieldErrors,
    loading: bool,
}

struct CollectionInner {
    def: Arc<ModelDef>,
    endpoint: String,
    transport: Arc<dyn RestTransport>,
    bus: EventBus,
    state: Mutex<CollectionState>,
}

/// Shared handle to an ordered set of models of one [`ModelDef`].
///
/// Events: `reset`, `add`, `remove`, `change` (forwarded from members),
/// `request`, `error`.
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

impl Collection {
    pub fn new(def: Arc<ModelDef>, transport: Arc<dyn RestTransport>) -> Self {
        let endpoint = def.endpoint().to_string();
        Self::with_endpoint(def, transport, endpoint)
    }

    /// Collection whose list endpoint differs from the model endpoint
    /// (e.g. `/users/7/posts` for `Post` models).
    pub fn with_endpoint(
        def: Arc<ModelDef>,
        transport: Arc<dyn RestTransport>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(CollectionInner {
                def,
                endpoint: endpoint.into(),
                transport,
                bus: EventBus::new(),
                state: Mutex::new(CollectionState {
                    members: Vec::new(),
                    pagination: Pagination::default(),
                    params: QueryParams::new(),
                    errors: FieldErrors::new(),
                    loading: false,
                }),
            }),
        }
    }

    pub fn def(&self) -> &Arc<ModelDef> {
        &self.inner.def
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn models(&self) -> Vec<Model> {
        self.inner
            .state
            .lock()
            .members
            .iter()
            .map(|m| m.model.clone())
            .collect()
    }

    pub fn at(&self, index: usize) -> Option<Model> {
        self.inner
            .state
            .lock()
            .members
            .get(index)
            .map(|m| m.model.clone())
    }

    pub fn pagination(&self) -> Pagination {
        self.inner.state.lock().pagination.clone()
    }

    pub fn errors(&self) -> FieldErrors {
        self.inner.state.lock().errors.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().loading
    }

    /// Identity lookup (`5` and `"5"` match the same member).
    pub fn get(&self, id: &Value) -> Option<Model> {
        let key = identity_key(id);
        self.models()
            .into_iter()
            .find(|m| m.id().is_some_and(|mid| identity_key(&mid) == key))
    }

    /// Linear scan; fine for page-sized sets.
    pub fn where_(&self, filter: Where) -> Vec<Model> {
        self.models()
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect()
    }

    pub fn find<F: Fn(&Model) -> bool>(&self, check: F) -> Option<Model> {
        self.models().into_iter().find(|m| check(m))
    }

    /// Value at `path` for every member, `null` where missing.
    pub fn pluck(&self, path: &str) -> Vec<Value> {
        self.models()
            .iter()
            .map(|m| m.get(path).unwrap_or(Value::Null))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.models().iter().map(Model::to_json).collect())
    }

    /// Add plain data, a model, or many of either.
    ///
    /// Plain data is wrapped in the collection's model definition. A member
    /// with the same identity absorbs the new attributes instead of being
    /// duplicated. Returns the affected models in input order.
    pub fn add(&self, input: impl Into<AddInput>, options: AddOptions) -> Result<Vec<Model>, DataError> {
        let mut flat = Vec::new();
        flatten(input.into(), &mut flat);

        let mut models = Vec::with_capacity(flat.len());
        for item in flat {
            models.push(self.adopt_input(item)?);
        }

        let mut affected = Vec::with_capacity(models.len());
        let mut position = options.at;
        for model in models {
            if let Some(existing) = model.id().and_then(|id| self.get(&id)) {
                if !existing.ptr_eq(&model) {
                    if let Value::Object(attrs) = model.to_json() {
                        existing.set_many(attrs, SetOptions { silent: options.silent });
                    }
                }
                affected.push(existing);
                continue;
            }

            let forward = self.forward_changes(&model);
            let index = {
                let mut state = self.inner.state.lock();
                let index = position
                    .map(|at| at.min(state.members.len()))
                    .unwrap_or(state.members.len());
                state.members.insert(
                    index,
                    Member {
                        model: model.clone(),
                        forward,
                    },
                );
                index
            };
            position = position.map(|_| index + 1);

            if !options.silent {
                self.inner.bus.emit(
                    "add",
                    json!({ "id": model.id().unwrap_or(Value::Null), "cid": model.cid(), "index": index }),
                );
            }
            affected.push(model);
        }
        Ok(affected)
    }

    fn adopt_input(&self, item: AddInput) -> Result<Model, DataError> {
        match item {
            AddInput::Model(model) => {
                if model.def().name() != self.inner.def.name() {
                    return Err(DataError::SchemaMismatch {
                        expected: self.inner.def.name().to_string(),
                        found: model.def().name().to_string(),
                    });
                }
                Ok(model)
            }
            AddInput::Data(Value::Object(map)) => Ok(self.build(Value::Object(map))),
            AddInput::Data(other) => Err(DataError::Decode(format!(
                "cannot build a '{}' model from {}",
                self.inner.def.name(),
                other
            ))),
            AddInput::Many(_) => Err(DataError::Decode("nested add input".to_string())),
        }
    }

    fn build(&self, attributes: Value) -> Model {
        Model::new(self.inner.def.clone(), self.inner.transport.clone(), attributes)
    }

    fn forward_changes(&self, model: &Model) -> ListenerId {
        let bus = self.inner.bus.clone();
        let cid = model.cid().to_string();
        model.on("change", move |payload| {
            bus.emit(
                "change",
                json!({
                    "id": payload.get("id").cloned().unwrap_or(Value::Null),
                    "cid": cid,
                    "changes": payload.get("changes").cloned().unwrap_or(Value::Null),
                }),
            );
            Ok(())
        })
    }

    /// Remove a member by handle or identity. Fires `remove`.
    pub fn remove(&self, target: impl Into<ModelRef>) -> Option<Model> {
        let target = target.into();
        let removed = {
            let mut state = self.inner.state.lock();
            let index = state.members.iter().position(|m| match &target {
                ModelRef::Model(model) => m.model.ptr_eq(model),
                ModelRef::Id(id) => m
                    .model
                    .id()
                    .is_some_and(|mid| identity_key(&mid) == identity_key(id)),
            })?;
            (index, state.members.remove(index))
        };

        let (index, member) = removed;
        member.model.bus().off("change", Some(member.forward));
        self.inner.bus.emit(
            "remove",
            json!({
                "id": member.model.id().unwrap_or(Value::Null),
                "cid": member.model.cid(),
                "index": index,
            }),
        );
        Some(member.model)
    }

    /// GET the list endpoint and replace every member and the pagination.
    ///
    /// On failure the previous members stay in place and the error map is
    /// populated.
    pub async fn fetch(&self, params: Option<QueryParams>) -> Result<(), DataError> {
        let params = params.unwrap_or_default();
        self.inner.state.lock().loading = true;
        scopeguard::defer! {
            self.inner.state.lock().loading = false;
        }

        self.inner
            .bus
            .emit("request", json!({ "url": self.inner.endpoint, "params": params }));

        let result = self
            .inner
            .transport
            .get(&self.inner.endpoint, Some(&params))
            .await
            .and_then(|response| response.into_result())
            .and_then(parse_list);

        let (items, pagination) = match result {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(
                    collection = %self.inner.def.name(),
                    endpoint = %self.inner.endpoint,
                    error = %err,
                    "Collection fetch failed"
                );
                self.inner.state.lock().errors = err.field_errors();
                self.inner
                    .bus
                    .emit("error", json!({ "message": err.to_string(), "errors": err.field_errors() }));
                return Err(err);
            }
        };

        let mut fresh: Vec<Model> = Vec::with_capacity(items.len());
        for item in items {
            let model = self.build(item);
            let duplicate = model.id().and_then(|id| {
                let key = identity_key(&id);
                fresh
                    .iter()
                    .find(|m| m.id().is_some_and(|mid| identity_key(&mid) == key))
                    .cloned()
            });
            match duplicate {
                Some(existing) => {
                    if let Value::Object(attrs) = model.to_json() {
                        existing.set_many(attrs, SetOptions::silent());
                    }
                }
                None => fresh.push(model),
            }
        }

        let members: Vec<Member> = fresh
            .into_iter()
            .map(|model| Member {
                forward: self.forward_changes(&model),
                model,
            })
            .collect();

        let previous = {
            let mut state = self.inner.state.lock();
            state.errors.clear();
            state.params = params;
            state.pagination = pagination.clone();
            std::mem::replace(&mut state.members, members)
        };
        for member in previous {
            member.model.bus().off("change", Some(member.forward));
        }

        self.inner.bus.emit(
            "reset",
            json!({ "count": self.len(), "pagination": pagination }),
        );
        Ok(())
    }

    pub fn has_more(&self) -> bool {
        let pagination = self.pagination();
        pagination.page < pagination.total_pages
    }

    /// Fetch the page after the current one with the same parameters.
    pub async fn fetch_next(&self) -> Result<bool, DataError> {
        if !self.has_more() {
            return Ok(false);
        }
        let (mut params, page) = {
            let state = self.inner.state.lock();
            (state.params.clone(), state.pagination.page)
        };
        params.insert("page".to_string(), (page + 1).to_string());
        self.fetch(Some(params)).await?;
        Ok(true)
    }
}

fn flatten(input: AddInput, out: &mut Vec<AddInput>) {
    match input {
        AddInput::Many(items) => {
            for item in items {
                flatten(item, out);
            }
        }
        AddInput::Data(Value::Array(items)) => {
            for item in items {
                flatten(AddInput::Data(item), out);
            }
        }
        other => out.push(other),
    }
}

/// Accepts a bare array or `{items|data: [...], pagination|meta: {...}}`.
fn parse_list(data: Value) -> Result<(Vec<Value>, Pagination), DataError> {
    match data {
        Value::Array(items) => {
            let count = items.len() as u64;
            let pagination = Pagination {
                page: 1,
                per_page: count,
                total: count,
                total_pages: 1,
            };
            Ok((items, pagination))
        }
        Value::Object(mut map) => {
            let items = match map.remove("items").or_else(|| map.remove("data")) {
                Some(Value::Array(items)) => items,
                _ => return Err(DataError::Decode("list response without items".to_string())),
            };
            let pagination = map
                .remove("pagination")
                .or_else(|| map.remove("meta"))
                .and_then(|meta| serde_json::from_value::<Pagination>(meta).ok())
                .unwrap_or_else(|| {
                    let count = items.len() as u64;
                    Pagination {
                        page: 1,
                        per_page: count,
                        total: count,
                        total_pages: 1,
                    }
                });
            Ok((items, pagination))
        }
        other => Err(DataError::Decode(format!(
            "expected a list, got {}",
            path::display(&other)
        ))),
    }
}
