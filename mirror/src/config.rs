use serde::Deserialize;
use slices::Identity;
use std::fs::File;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to read config file: {0}")]
    IO(std::io::Error),

    #[error("Unable to deserialize config file: {0}")]
    Parse(serde_yml::Error),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Endpoints object to watch.
    pub source: Identity,
    /// EndpointSlice object to keep in sync.
    pub target: Identity,
    pub conflict_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: Identity::default(),
            target: Identity::default(),
            conflict_retries: 3,
        }
    }
}

pub fn load(filename: &str) -> Result<Config, Error> {
    let file = File::open(filename).map_err(Error::IO)?;
    serde_yml::from_reader(file).map_err(Error::Parse)
}
