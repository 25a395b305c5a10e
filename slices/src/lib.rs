//! Mirroring of legacy `Endpoints` into `discovery.k8s.io/v1` EndpointSlices.

pub mod address;
pub mod convert;
mod error;
pub mod provider;

pub use address::AddressType;
pub use convert::{endpoint_slice_from_endpoints, LABEL_SERVICE_NAME};
pub use error::Error;
pub use provider::{create_or_patch, Identity, OperationResult, SliceClient, V1Provider};
