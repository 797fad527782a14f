use super::{FetchError, MetadataSource};
use crate::types::{Aliases, ContainerRecord};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

/// Client for the Rancher metadata service.
pub struct RancherMetadata {
    client: Client,
    base_url: String,
}

impl RancherMetadata {
    pub fn new(api_host: &str, api_version: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            base_url: base_url(api_host, api_version),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the body.  `Ok(None)` means 404 and is only
    /// returned when `allow_missing` is set.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        allow_missing: bool,
    ) -> Result<Option<T>, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);

        let transport = |source: reqwest::Error| FetchError::Transport {
            url: url.clone(),
            source,
        };
        let response = self.client.get(url.as_str()).send().await.map_err(transport)?;

        let status = response.status();
        if allow_missing && status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|source| FetchError::Decode { url, source })
    }
}

#[async_trait]
impl MetadataSource for RancherMetadata {
    async fn fetch_containers(&self) -> Result<Vec<ContainerRecord>, FetchError> {
        Ok(self
            .get_json::<Vec<ContainerRecord>>("containers", false)
            .await?
            .unwrap_or_default())
    }

    async fn fetch_aliases(&self) -> Result<Aliases, FetchError> {
        let raw = self
            .get_json::<HashMap<String, Option<Vec<String>>>>("self/service/metadata/aliases", true)
            .await?
            .unwrap_or_default();

        Ok(raw
            .into_iter()
            .map(|(stack, names)| (stack, names.unwrap_or_default().into_iter().collect()))
            .collect())
    }
}

fn base_url(api_host: &str, api_version: &str) -> String {
    let host = api_host.trim_end_matches('/');
    let version = api_version.trim_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}/{}", host, version)
    } else {
        format!("http://{}/{}", host, version)
    }
}
