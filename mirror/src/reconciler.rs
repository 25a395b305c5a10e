use futures_util::future::BoxFuture;
use k8s_openapi::api::core::v1::Endpoints;
use log::warn;
use slices::{Identity, OperationResult, SliceClient, V1Provider};
use std::sync::Arc;

/// Keeps the target EndpointSlice in step with the watched Endpoints.
pub struct Reconciler<C> {
    client: C,
    target: Identity,
    conflict_retries: u32,
    provider: V1Provider,
}

impl<C> Reconciler<C>
where
    C: SliceClient + 'static,
{
    pub fn new(client: C, target: Identity, conflict_retries: u32) -> Self {
        Self {
            client,
            target,
            conflict_retries,
            provider: V1Provider,
        }
    }

    /// Syncs the slice, starting over from a fresh read on every conflict
    /// until `conflict_retries` is used up.
    pub async fn reconcile(&self, endpoints: &Endpoints) -> Result<OperationResult, slices::Error> {
        let mut attempt = 0;
        loop {
            match self.provider.sync(&self.client, &self.target, endpoints).await {
                Err(e) if e.is_conflict() && attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(
                        "Conflict writing EndpointSlice {} (attempt {}/{}): {}",
                        self.target, attempt, self.conflict_retries, e
                    );
                }
                result => return result,
            }
        }
    }

    pub fn update(
        self: Arc<Self>,
    ) -> impl Fn(Endpoints) -> BoxFuture<'static, Result<(), anyhow::Error>> + Send + Sync + 'static
    {
        move |endpoints| -> BoxFuture<'static, Result<(), anyhow::Error>> {
            let reconciler = self.clone();
            Box::pin(async move {
                reconciler.reconcile(&endpoints).await?;
                Ok::<_, anyhow::Error>(())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::{EndpointAddress, EndpointSubset};
    use k8s_openapi::api::discovery::v1::EndpointSlice;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Holds an existing slice and fails the first `conflicts` patches.
    struct ContendedClient {
        conflicts: Mutex<u32>,
        patches: Mutex<u32>,
    }

    impl ContendedClient {
        fn new(conflicts: u32) -> Self {
            Self {
                conflicts: Mutex::new(conflicts),
                patches: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl SliceClient for ContendedClient {
        async fn get(&self, _name: &str) -> Result<Option<EndpointSlice>, slices::Error> {
            Ok(Some(EndpointSlice {
                metadata: ObjectMeta {
                    name: Some("kubernetes".to_string()),
                    namespace: Some("default".to_string()),
                    resource_version: Some("1".to_string()),
                    ..Default::default()
                },
                address_type: "IPv4".to_string(),
                ..Default::default()
            }))
        }

        async fn create(&self, _slice: &EndpointSlice) -> Result<EndpointSlice, slices::Error> {
            unreachable!("slice already exists")
        }

        async fn patch(&self, _name: &str, _patch: &Value) -> Result<EndpointSlice, slices::Error> {
            *self.patches.lock().unwrap() += 1;
            let mut conflicts = self.conflicts.lock().unwrap();
            if *conflicts > 0 {
                *conflicts -= 1;
                return Err(slices::Error::Conflict("the object has been modified".to_string()));
            }
            Ok(EndpointSlice::default())
        }
    }

    fn endpoints() -> Endpoints {
        Endpoints {
            metadata: ObjectMeta {
                name: Some("kubernetes".to_string()),
                ..Default::default()
            },
            subsets: Some(vec![EndpointSubset {
                addresses: Some(vec![EndpointAddress {
                    ip: "10.0.0.1".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }]),
        }
    }

    #[tokio::test]
    async fn retries_conflicts() {
        let reconciler = Reconciler::new(ContendedClient::new(2), Identity::default(), 3);
        let result = reconciler.reconcile(&endpoints()).await.unwrap();
        assert_eq!(result, OperationResult::Patched);
        assert_eq!(*reconciler.client.patches.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retries() {
        let reconciler = Reconciler::new(ContendedClient::new(5), Identity::default(), 2);
        let err = reconciler.reconcile(&endpoints()).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(*reconciler.client.patches.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn update_reports_errors() {
        let reconciler = Arc::new(Reconciler::new(ContendedClient::new(1), Identity::default(), 0));
        let update = reconciler.clone().update();
        assert!(update(endpoints()).await.is_err());
        assert!(update(endpoints()).await.is_ok());
    }
}
