//! Typed surfaces over the backend collections.
//!
//! One [`ResourceClient`] per [`Resource`] covers list, get and the three
//! writes; every write invalidates the resource's collection.

pub mod forms;

pub use forms::FormMode;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::{
    CacheEntry, Invalidation, MutationIntent, OptimisticUpdate, PollHandle, QueryCache,
    QueryOptions, ResourceKey,
};
use crate::error::{ClientError, ValidationError};
use crate::types::id_to_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Leads,
    Projects,
    Telecallers,
    Banks,
    DocumentUploads,
    Users,
    Notifications,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Leads,
        Resource::Projects,
        Resource::Telecallers,
        Resource::Banks,
        Resource::DocumentUploads,
        Resource::Users,
        Resource::Notifications,
    ];

    /// Collection endpoint
    pub const fn path(&self) -> &'static str {
        match self {
            Resource::Leads => "/api/leads",
            Resource::Projects => "/api/projects",
            Resource::Telecallers => "/api/telecallers",
            Resource::Banks => "/api/banks",
            Resource::DocumentUploads => "/api/document-uploads",
            Resource::Users => "/api/users",
            Resource::Notifications => "/api/notifications",
        }
    }

    /// Name of the array in the collection envelope
    pub const fn collection_field(&self) -> &'static str {
        match self {
            Resource::Leads => "leads",
            Resource::Projects => "projects",
            Resource::Telecallers => "telecallers",
            Resource::Banks => "banks",
            Resource::DocumentUploads => "documentUploads",
            Resource::Users => "users",
            Resource::Notifications => "notifications",
        }
    }

    /// Users and projects are created through role-scoped endpoints
    pub const fn create_path(&self) -> &'static str {
        match self {
            Resource::Users => "/register/user",
            Resource::Projects => "/project/add",
            other => other.path(),
        }
    }

    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path(), id.trim())
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Resource::Leads => "Lead",
            Resource::Projects => "Project",
            Resource::Telecallers => "Telecaller",
            Resource::Banks => "Bank",
            Resource::DocumentUploads => "Document",
            Resource::Users => "User",
            Resource::Notifications => "Notification",
        }
    }

    /// Shared, concurrently edited collections that dashboards keep refreshed
    pub const fn polls_by_default(&self) -> bool {
        matches!(
            self,
            Resource::Leads | Resource::Telecallers | Resource::DocumentUploads | Resource::Notifications
        )
    }

    /// Accepts plural and singular names, kebab or camel case
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "leads" | "lead" => Some(Resource::Leads),
            "projects" | "project" => Some(Resource::Projects),
            "telecallers" | "telecaller" => Some(Resource::Telecallers),
            "banks" | "bank" => Some(Resource::Banks),
            "documentuploads" | "documentupload" | "documents" | "document" => {
                Some(Resource::DocumentUploads)
            }
            "users" | "user" => Some(Resource::Users),
            "notifications" | "notification" => Some(Resource::Notifications),
            _ => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_field())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::from_name(s).ok_or_else(|| {
            let known: Vec<_> = Resource::ALL.iter().map(|r| r.collection_field()).collect();
            format!("unknown resource '{}' (expected one of: {})", s, known.join(", "))
        })
    }
}

/// One page of a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection {
    pub items: Vec<Value>,
    pub total: u64,
}

impl Collection {
    /// Accepts `{ <field>: [...], total }`, a bare array, or the same under `data`
    pub fn from_response(resource: Resource, body: &Value) -> Result<Self, ClientError> {
        let field = resource.collection_field();
        let envelope = data_envelope(resource, body).unwrap_or(body);

        let items = match envelope {
            Value::Array(items) => items.clone(),
            Value::Object(map) => match map.get(field) {
                Some(Value::Array(items)) => items.clone(),
                _ => {
                    return Err(ClientError::Decode(format!(
                        "expected '{}' array in {} response",
                        field,
                        resource.path()
                    )))
                }
            },
            _ => {
                return Err(ClientError::Decode(format!(
                    "unexpected {} response shape",
                    resource.path()
                )))
            }
        };

        let total = envelope
            .get("total")
            .or_else(|| body.get("total"))
            .and_then(Value::as_u64)
            .unwrap_or(items.len() as u64);

        Ok(Self { items, total })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Value> {
        self.items.iter().find(|item| has_id(item, id))
    }
}

/// The `data` wrapper around a collection, when the collection is not at the top level
fn data_envelope(resource: Resource, body: &Value) -> Option<&Value> {
    match body.get("data") {
        Some(data) if body.get(resource.collection_field()).is_none() => Some(data),
        _ => None,
    }
}

fn item_count(resource: Resource, body: &Value) -> Option<usize> {
    match body {
        Value::Array(items) => Some(items.len()),
        other => other
            .get(resource.collection_field())
            .and_then(Value::as_array)
            .map(Vec::len),
    }
}

fn has_id(item: &Value, id: &str) -> bool {
    ["id", "_id"]
        .iter()
        .filter_map(|field| item.get(field))
        .filter_map(id_to_string)
        .any(|candidate| candidate == id)
}

/// Numeric ids go over the wire as numbers, anything else as a string
fn id_value(id: &str) -> Value {
    let id = id.trim();
    id.parse::<u64>().map(Value::from).unwrap_or_else(|_| json!(id))
}

fn require_id(resource: Resource, id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::new(format!("{} id is required", resource.label()))
            .with_field("id", "Id is required"));
    }
    Ok(())
}

/// Rewrites the collection array inside cached data, whatever its envelope
fn map_collection<F>(resource: Resource, data: Option<&Value>, f: F) -> Value
where
    F: Fn(Vec<Value>) -> Vec<Value>,
{
    let Some(data) = data else {
        return Value::Null;
    };
    if let (Some(inner), Value::Object(map)) = (data_envelope(resource, data), data) {
        let before = item_count(resource, inner).unwrap_or(0);
        let inner = map_collection(resource, Some(inner), f);
        let removed = before.saturating_sub(item_count(resource, &inner).unwrap_or(before)) as u64;

        let mut map = map.clone();
        if let Some(total) = map.get("total").and_then(Value::as_u64) {
            map.insert("total".to_string(), json!(total.saturating_sub(removed)));
        }
        map.insert("data".to_string(), inner);
        return Value::Object(map);
    }

    match data {
        Value::Array(items) => Value::Array(f(items.clone())),
        Value::Object(map) => {
            let mut map = map.clone();
            let field = resource.collection_field();
            if let Some(Value::Array(items)) = map.remove(field) {
                let before = items.len();
                let items = f(items);
                let removed = before.saturating_sub(items.len()) as u64;
                if let Some(total) = map.get("total").and_then(Value::as_u64) {
                    map.insert("total".to_string(), json!(total.saturating_sub(removed)));
                }
                map.insert(field.to_string(), Value::Array(items));
            }
            Value::Object(map)
        }
        other => other.clone(),
    }
}

#[derive(Clone)]
pub struct ResourceClient {
    cache: QueryCache,
    resource: Resource,
    poll_interval: Option<Duration>,
}

impl ResourceClient {
    pub fn new(cache: QueryCache, resource: Resource) -> Self {
        Self {
            cache,
            resource,
            poll_interval: None,
        }
    }

    /// Keeps listed collections of polling resources refreshed at `interval`
    pub fn with_polling(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn list_key(&self, filters: &BTreeMap<String, String>) -> ResourceKey {
        ResourceKey::new(self.resource.path()).with_filters(filters)
    }

    /// Cache entry for the filtered collection, including stale data on error
    pub async fn list_entry(&self, filters: &BTreeMap<String, String>) -> CacheEntry {
        let mut options = QueryOptions::default();
        if self.resource.polls_by_default() {
            if let Some(interval) = self.poll_interval {
                options = options.refresh_every(interval);
            }
        }
        self.cache.read_with(self.list_key(filters), options).await
    }

    pub async fn list(&self, filters: &BTreeMap<String, String>) -> Result<Collection, ClientError> {
        let data = self.list_entry(filters).await.into_result()?;
        Collection::from_response(self.resource, &data)
    }

    pub async fn get(&self, id: &str) -> Result<Arc<Value>, ClientError> {
        require_id(self.resource, id)?;
        self.cache.fetch(self.resource.item_path(id)).await
    }

    pub async fn create(&self, body: Value) -> Result<Value, ClientError> {
        forms::validate(self.resource, &body, FormMode::Create)?;
        let intent = MutationIntent::post(self.resource.create_path(), body)
            .invalidates_prefix(self.resource.path());
        self.cache.mutate(intent).await
    }

    pub async fn update(&self, id: &str, body: Value) -> Result<Value, ClientError> {
        require_id(self.resource, id)?;
        forms::validate(self.resource, &body, FormMode::Update)?;
        let intent = MutationIntent::put(self.resource.item_path(id), body)
            .invalidates_prefix(self.resource.path());
        self.cache.mutate(intent).await
    }

    /// Removes the item from the cached unfiltered list straight away and
    /// restores it if the server refuses
    pub async fn delete(&self, id: &str) -> Result<Value, ClientError> {
        require_id(self.resource, id)?;
        let mut intent = MutationIntent::delete(self.resource.item_path(id))
            .invalidates_prefix(self.resource.path());

        let key = ResourceKey::new(self.resource.path());
        if self.is_cached(&key) {
            let resource = self.resource;
            let id = id.trim().to_string();
            intent = intent.optimistic(OptimisticUpdate::new(key, move |data| {
                map_collection(resource, data, |items| {
                    items.into_iter().filter(|item| !has_id(item, &id)).collect()
                })
            }));
        }
        self.cache.mutate(intent).await
    }

    /// Refreshes the filtered collection every `interval` until the handle is dropped
    pub fn watch(&self, filters: &BTreeMap<String, String>, interval: Duration) -> PollHandle {
        self.cache.poll(self.list_key(filters), interval)
    }

    pub fn invalidate(&self) -> usize {
        self.cache.invalidate(Invalidation::prefix(self.resource.path()))
    }

    fn is_cached(&self, key: &ResourceKey) -> bool {
        self.cache
            .peek(key)
            .is_some_and(|entry| entry.data.is_some())
    }
}

/// Lead-specific workflows on top of the generic client
#[derive(Clone)]
pub struct LeadClient {
    inner: ResourceClient,
}

impl LeadClient {
    pub fn new(cache: QueryCache) -> Self {
        Self {
            inner: ResourceClient::new(cache, Resource::Leads),
        }
    }

    pub fn from_client(inner: ResourceClient) -> Self {
        Self { inner }
    }

    pub fn client(&self) -> &ResourceClient {
        &self.inner
    }

    pub fn assign_path(lead_id: &str) -> String {
        format!("{}/assign", Resource::Leads.item_path(lead_id))
    }

    /// Hands the lead to a telecaller; the cached lead list shows the new
    /// assignee immediately and every lead query is refetched afterwards
    pub async fn assign(&self, lead_id: &str, telecaller_id: &str) -> Result<Value, ClientError> {
        require_id(Resource::Leads, lead_id)?;
        if telecaller_id.trim().is_empty() {
            return Err(ValidationError::new(forms::INVALID_FORM_MESSAGE)
                .with_field("assignedToId", "Telecaller is required")
                .into());
        }

        let assignee = id_value(telecaller_id);
        let mut intent = MutationIntent::post(
            Self::assign_path(lead_id),
            json!({ "assignedToId": assignee.clone() }),
        )
        .invalidates_prefix(Resource::Leads.path());

        let key = ResourceKey::new(Resource::Leads.path());
        if self.inner.is_cached(&key) {
            let lead_id = lead_id.trim().to_string();
            intent = intent.optimistic(OptimisticUpdate::new(key, move |data| {
                map_collection(Resource::Leads, data, |items| {
                    items
                        .into_iter()
                        .map(|mut item| {
                            if has_id(&item, &lead_id) {
                                if let Some(lead) = item.as_object_mut() {
                                    lead.insert("assignedToId".to_string(), assignee.clone());
                                }
                            }
                            item
                        })
                        .collect()
                })
            }));
        }

        tracing::info!(lead_id, telecaller_id, "assigning lead");
        self.inner.cache.mutate(intent).await
    }
}
