use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("EndpointSlice was modified concurrently: {0}")]
    Conflict(String),

    #[error("Kubernetes API request failed: {0}")]
    Kube(kube::Error),

    #[error("Unable to build EndpointSlice patch: {0}")]
    Patch(serde_json::Error),
}

impl Error {
    /// Conflicts are safe to retry after re-reading the object.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(response) if response.code == 409 => {
                Error::Conflict(response.message)
            }
            e => Error::Kube(e),
        }
    }
}
