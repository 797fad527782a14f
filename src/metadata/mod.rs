use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Aliases, ContainerRecord};

pub mod rancher;
pub use rancher::RancherMetadata;

/// Failure to obtain a usable response from the metadata service.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("status_code: {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait MetadataSource {
    /// Full container inventory for this cycle.
    async fn fetch_containers(&self) -> Result<Vec<ContainerRecord>, FetchError>;

    /// Alias hostnames per stack.  A service without aliases yields an
    /// empty map rather than an error.
    async fn fetch_aliases(&self) -> Result<Aliases, FetchError>;
}
