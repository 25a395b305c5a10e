use crate::address::AddressType;
use k8s_openapi::api::core::v1::{EndpointAddress, Endpoints};
use k8s_openapi::api::discovery::v1::{Endpoint, EndpointConditions, EndpointPort, EndpointSlice};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Label tying an EndpointSlice to the Service it belongs to.
pub const LABEL_SERVICE_NAME: &str = "kubernetes.io/service-name";

/// Generates an EndpointSlice from an Endpoints resource.
///
/// Only the first subset is looked at, and only addresses of a single family
/// end up in the slice. The family is IPv6 when every ready and not ready
/// address of that subset is IPv6, IPv4 otherwise.
pub fn endpoint_slice_from_endpoints(endpoints: &Endpoints) -> EndpointSlice {
    let service_name = endpoints.metadata.name.clone().unwrap_or_default();
    let mut slice = EndpointSlice {
        metadata: ObjectMeta {
            name: endpoints.metadata.name.clone(),
            labels: Some(BTreeMap::from([(
                LABEL_SERVICE_NAME.to_string(),
                service_name,
            )])),
            ..Default::default()
        },
        address_type: AddressType::Ipv4.to_string(),
        ..Default::default()
    };

    // TODO: dual stack would need one slice per family instead of filtering.
    let Some(subset) = endpoints.subsets.as_ref().and_then(|s| s.first()) else {
        return slice;
    };

    let ports: Vec<EndpointPort> = subset
        .ports
        .iter()
        .flatten()
        .map(|port| EndpointPort {
            port: Some(port.port),
            name: port.name.clone(),
            protocol: port.protocol.clone(),
            ..Default::default()
        })
        .collect();
    if !ports.is_empty() {
        slice.ports = Some(ports);
    }

    let ready = subset.addresses.as_deref().unwrap_or_default();
    let not_ready = subset.not_ready_addresses.as_deref().unwrap_or_default();

    let address_type = AddressType::of_all(ready.iter().chain(not_ready).map(|a| a.ip.as_str()));
    slice.address_type = address_type.to_string();
    slice.endpoints = endpoints_from_addresses(ready, address_type, true)
        .chain(endpoints_from_addresses(not_ready, address_type, false))
        .collect();

    slice
}

/// Maps the addresses matching `address_type` to endpoints, keeping order.
fn endpoints_from_addresses(
    addresses: &[EndpointAddress],
    address_type: AddressType,
    ready: bool,
) -> impl Iterator<Item = Endpoint> + '_ {
    addresses
        .iter()
        .filter(move |address| AddressType::of(&address.ip) == address_type)
        .map(move |address| endpoint_from_address(address, ready))
}

fn endpoint_from_address(address: &EndpointAddress, ready: bool) -> Endpoint {
    Endpoint {
        addresses: vec![address.ip.clone()],
        conditions: Some(EndpointConditions {
            ready: Some(ready),
            ..Default::default()
        }),
        target_ref: address.target_ref.clone(),
        node_name: address.node_name.clone(),
        ..Default::default()
    }
}
