use k8s_openapi::api::core::v1::Endpoints;
use k8s_openapi::api::discovery::v1::EndpointSlice;
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use slices::Identity;
use std::fmt::Debug;

pub mod watcher;

/// A namespaced API object that can be watched.
pub trait Object:
    Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug + Send + 'static
{
}

impl<T> Object for T where
    T: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug + Send + 'static
{
}

pub fn endpoints(client: Client, source: &Identity) -> Api<Endpoints> {
    Api::namespaced(client, &source.namespace)
}

pub fn endpoint_slices(client: Client, target: &Identity) -> Api<EndpointSlice> {
    Api::namespaced(client, &target.namespace)
}
