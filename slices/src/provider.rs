use crate::convert::endpoint_slice_from_endpoints;
use crate::Error;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Endpoints;
use k8s_openapi::api::discovery::v1::{EndpointPort, EndpointSlice};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Patch, PatchParams, PostParams};
use kube::Api;
use log::{debug, info};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Read and write access to EndpointSlices in a single namespace.
#[async_trait]
pub trait SliceClient: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<EndpointSlice>, Error>;

    async fn create(&self, slice: &EndpointSlice) -> Result<EndpointSlice, Error>;

    /// Applies a JSON merge patch to the named slice.
    async fn patch(&self, name: &str, patch: &Value) -> Result<EndpointSlice, Error>;
}

#[async_trait]
impl SliceClient for Api<EndpointSlice> {
    async fn get(&self, name: &str) -> Result<Option<EndpointSlice>, Error> {
        Ok(self.get_opt(name).await?)
    }

    async fn create(&self, slice: &EndpointSlice) -> Result<EndpointSlice, Error> {
        Ok(Api::create(self, &PostParams::default(), slice).await?)
    }

    async fn patch(&self, name: &str, patch: &Value) -> Result<EndpointSlice, Error> {
        Ok(Api::patch(self, name, &PatchParams::default(), &Patch::Merge(patch)).await?)
    }
}

/// Namespace and name of an object.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub namespace: String,
    pub name: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            name: "kubernetes".to_string(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Patched,
    Unchanged,
}

/// Fetches the slice named by `identity`, or starts from an empty one, runs
/// `mutate` over it and writes the result back.
///
/// Existing slices are written with a JSON merge patch holding only the fields
/// `mutate` changed, pinned to the resource version that was read. A writer
/// that got there first turns into [`Error::Conflict`].
pub async fn create_or_patch<C, F>(
    client: &C,
    identity: &Identity,
    mutate: F,
) -> Result<OperationResult, Error>
where
    C: SliceClient + ?Sized,
    F: FnOnce(&mut EndpointSlice),
{
    let Some(current) = client.get(&identity.name).await? else {
        let mut slice = EndpointSlice {
            metadata: ObjectMeta {
                namespace: Some(identity.namespace.clone()),
                name: Some(identity.name.clone()),
                ..Default::default()
            },
            ..Default::default()
        };
        mutate(&mut slice);
        client.create(&slice).await?;
        info!("Created EndpointSlice {}", identity);
        return Ok(OperationResult::Created);
    };

    let mut desired = current.clone();
    mutate(&mut desired);

    let before = serde_json::to_value(&current).map_err(Error::Patch)?;
    let after = serde_json::to_value(&desired).map_err(Error::Patch)?;
    let Some(mut patch) = merge_patch(&before, &after) else {
        debug!("EndpointSlice {} is up to date", identity);
        return Ok(OperationResult::Unchanged);
    };

    if let (Value::Object(fields), Some(version)) =
        (&mut patch, current.metadata.resource_version.as_ref())
    {
        if let Value::Object(metadata) = fields
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()))
        {
            metadata.insert("resourceVersion".to_string(), Value::from(version.as_str()));
        }
    }

    client.patch(&identity.name, &patch).await?;
    info!("Patched EndpointSlice {}", identity);
    Ok(OperationResult::Patched)
}

/// Computes the RFC 7386 merge patch turning `current` into `desired`, or
/// `None` when they are equal.
fn merge_patch(current: &Value, desired: &Value) -> Option<Value> {
    match (current, desired) {
        (Value::Object(current), Value::Object(desired)) => {
            let mut patch = Map::new();
            for (key, value) in desired {
                match current.get(key) {
                    Some(old) => {
                        if let Some(change) = merge_patch(old, value) {
                            patch.insert(key.clone(), change);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), value.clone());
                    }
                }
            }
            for key in current.keys().filter(|k| !desired.contains_key(*k)) {
                patch.insert(key.clone(), Value::Null);
            }
            (!patch.is_empty()).then_some(Value::Object(patch))
        }
        (current, desired) if current == desired => None,
        (_, desired) => Some(desired.clone()),
    }
}

/// Mirrors Endpoints into `discovery.k8s.io/v1` EndpointSlices.
#[derive(Clone, Copy, Debug, Default)]
pub struct V1Provider;

impl V1Provider {
    pub fn api_version(&self) -> &'static str {
        <EndpointSlice as k8s_openapi::Resource>::API_VERSION
    }

    pub fn kind(&self) -> &'static str {
        <EndpointSlice as k8s_openapi::Resource>::KIND
    }

    /// Writes the slice derived from `endpoints` to `identity`.
    ///
    /// Labels, address type, ports and endpoints are replaced as a whole. Any
    /// other field of an existing slice is left alone. Ports are written the
    /// way the API server stores them, so an unchanged input never patches.
    pub async fn sync<C>(
        &self,
        client: &C,
        identity: &Identity,
        endpoints: &Endpoints,
    ) -> Result<OperationResult, Error>
    where
        C: SliceClient + ?Sized,
    {
        let derived = endpoint_slice_from_endpoints(endpoints);
        create_or_patch(client, identity, move |slice| {
            slice.metadata.labels = derived.metadata.labels;
            slice.address_type = derived.address_type;
            slice.ports = derived.ports.map(with_server_defaults);
            slice.endpoints = derived.endpoints;
        })
        .await
    }
}

/// Fills in what the API server defaults on EndpointSlice ports: an empty
/// name and the TCP protocol.
fn with_server_defaults(ports: Vec<EndpointPort>) -> Vec<EndpointPort> {
    ports
        .into_iter()
        .map(|port| EndpointPort {
            name: port.name.or_else(|| Some(String::new())),
            protocol: port.protocol.or_else(|| Some("TCP".to_string())),
            ..port
        })
        .collect()
}
