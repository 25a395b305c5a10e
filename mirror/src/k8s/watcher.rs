use crate::k8s::Object;
use anyhow::anyhow;
use futures_util::future::BoxFuture;
use futures_util::TryStreamExt;
use k8s_openapi::api::core::v1::Endpoints;
use kube::runtime::watcher::Event;
use kube::runtime::{watcher, WatchStreamExt};
use kube::Api;
use log::{debug, error, info};
use std::pin::pin;
use tokio::select;
use tokio::sync::{mpsc, watch};

pub type ShutdownWatch = watch::Receiver<bool>;

/// Watches a single Endpoints object and hands every observed version of it
/// to `update`.
pub struct Service<F>
where
    F: Fn(Endpoints) -> BoxFuture<'static, Result<(), anyhow::Error>> + Send + Sync + 'static,
{
    api: Api<Endpoints>,
    name: String,
    update: F,
}

impl<F> Service<F>
where
    F: Fn(Endpoints) -> BoxFuture<'static, Result<(), anyhow::Error>> + Send + Sync + 'static,
{
    pub fn new(api: Api<Endpoints>, name: &str, update: F) -> Self {
        Self {
            api,
            name: name.to_string(),
            update,
        }
    }

    pub async fn run(&self, mut shutdown: ShutdownWatch) -> Result<(), anyhow::Error> {
        info!("Starting Endpoints watch service for '{}'", self.name);

        let config = watcher::Config::default().fields(&format!("metadata.name={}", self.name));
        let mut watch = create(self.api.clone(), config);

        loop {
            select! {
                _ = shutdown.changed() => {
                    info!("Stopping Endpoints watch service");
                    return Ok(());
                }
                event = watch.recv() => match event {
                    Some(event) => {
                        debug!("Received a watch event");

                        for endpoints in to_sync(event) {
                            if let Err(e) = (self.update)(endpoints).await {
                                error!("Error mirroring Endpoints '{}': {}", self.name, e);
                            }
                        }
                    },
                    None => return Err(anyhow!("Endpoints watch stream for '{}' ended", self.name)),
                }
            }
        }
    }
}

/// Versions of the watched object an event asks to mirror. Deletions leave
/// the EndpointSlice in place, so they yield nothing.
fn to_sync(event: Event<Endpoints>) -> Vec<Endpoints> {
    match event {
        Event::Deleted(endpoints) => {
            info!(
                "Endpoints '{}' deleted, leaving its EndpointSlice in place",
                endpoints.metadata.name.unwrap_or_default()
            );
            vec![]
        }
        Event::Applied(endpoints) => {
            vec![endpoints]
        }
        Event::Restarted(endpoints) => {
            endpoints
        }
    }
}

pub fn create<T: Object>(api: Api<T>, config: watcher::Config) -> mpsc::Receiver<Event<T>> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let stream = watcher(api, config).default_backoff();
        let mut stream = pin!(stream);
        loop {
            match stream.try_next().await {
                Ok(Some(event)) => {
                    if tx.send(event).await.is_err() {
                        debug!("Watch receiver dropped, stopping stream");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Unable to read from stream: {}", e);
                }
            }
        }
    });
    rx
}
