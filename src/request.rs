use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::block::BlockId;
use crate::config::LookupConfig;
use crate::{Error, Result};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT_JSON: &str = "application/json, text/plain, */*";
const THEMATIC_SEARCH_PARCELS: &str = "1";

/// Something that can look a parcel identifier up in the registry.
///
/// `Ok(None)` means the registry explicitly has nothing for the identifier.
/// Lookups are read-only and idempotent.
#[async_trait]
pub trait ParcelLookup: Send + Sync {
    async fn lookup(&self, cad_num: &str) -> Result<Option<Value>>;
}

#[async_trait]
impl<T: ParcelLookup + ?Sized> ParcelLookup for Arc<T> {
    async fn lookup(&self, cad_num: &str) -> Result<Option<Value>> {
        (**self).lookup(cad_num).await
    }
}

/// Client of the public registry search endpoint.
#[derive(Debug, Clone)]
pub struct NspdClient {
    client: Client,
    search_url: Url,
    referer: HeaderValue,
}

impl NspdClient {
    pub fn new(config: &LookupConfig, block: &BlockId) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        let search_url = Url::parse(&config.search_url)
            .map_err(|e| Error::Config(format!("search url '{}': {e}", config.search_url)))?;
        let referer = Url::parse_with_params(&config.map_url, [("kadastr", block.as_str())])
            .map_err(|e| Error::Config(format!("map url '{}': {e}", config.map_url)))?;
        let referer = HeaderValue::from_str(referer.as_str())
            .map_err(|e| Error::Config(format!("referer header: {e}")))?;

        Ok(Self {
            client,
            search_url,
            referer,
        })
    }
}

#[async_trait]
impl ParcelLookup for NspdClient {
    /// Requests the search endpoint for `cad_num` and returns the JSON payload.
    async fn lookup(&self, cad_num: &str) -> Result<Option<Value>> {
        let cache_buster = Utc::now().timestamp_millis().to_string();
        let res = self
            .client
            .get(self.search_url.clone())
            .query(&[
                ("query", cad_num),
                ("thematicSearchId", THEMATIC_SEARCH_PARCELS),
                ("_", cache_buster.as_str()),
            ])
            .header(REFERER, self.referer.clone())
            .send()
            .await?;

        match res.status() {
            StatusCode::OK => Ok(Some(res.json().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                cad_num: cad_num.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referer_carries_encoded_block() {
        let block: BlockId = "77:01:0001001".parse().unwrap();
        let client = NspdClient::new(&LookupConfig::default(), &block).unwrap();
        assert_eq!(
            client.referer.to_str().unwrap(),
            "https://nspd.gov.ru/map?kadastr=77%3A01%3A0001001"
        );
    }

    #[test]
    fn bad_search_url_is_a_config_error() {
        let block: BlockId = "77:01:0001001".parse().unwrap();
        let config = LookupConfig {
            search_url: "not a url".into(),
            ..LookupConfig::default()
        };
        assert!(matches!(
            NspdClient::new(&config, &block),
            Err(Error::Config(_))
        ));
    }
}
