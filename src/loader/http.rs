//! HTTP transport for the geometry backend.
//!
//! - `POST {base}/geometry/view` with a [`ViewRegion`] body returns the
//!   matching geometry, either as ids or as inline entries
//! - `GET {base}/geometry/{id}` returns one [`GeometryEntry`]

use std::time::Duration;

use log::debug;
use reqwest::{Client, Response, Url};
use serde::Deserialize;

use super::{GeometryEntry, GeometrySource, RegionItem, ViewRegion};
use crate::error::LoadError;

/// Geometry source backed by a `reqwest` client.
///
/// Must be used from within a tokio runtime; [`super::LoaderTask`] provides one.
#[derive(Debug, Clone)]
pub struct HttpGeometrySource {
    client: Client,
    base: Url,
}

impl HttpGeometrySource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LoadError> {
        let base = Url::parse(base_url)
            .map_err(|e| LoadError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(LoadError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    pub fn region_url(&self) -> Url {
        self.endpoint(&["geometry", "view"])
    }

    /// Entry URL; the id is percent-encoded as a single path segment
    pub fn entry_url(&self, id: &str) -> Url {
        self.endpoint(&["geometry", id])
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` rejects cannot-be-a-base URLs, so path segments are always available
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl GeometrySource for HttpGeometrySource {
    async fn fetch_region(&self, region: &ViewRegion) -> Result<Vec<RegionItem>, LoadError> {
        let url = self.region_url();
        debug!("POST {url}");
        let response = self.client.post(url).json(region).send().await?;
        let body = ensure_success(response).await?.text().await?;
        parse_region_items(&body)
    }

    async fn fetch_entry(&self, id: &str) -> Result<GeometryEntry, LoadError> {
        let url = self.entry_url(id);
        debug!("GET {url}");
        let response = self.client.get(url).send().await?;
        let body = ensure_success(response).await?.text().await?;
        let mut entry: GeometryEntry = serde_json::from_str(&body)?;
        entry.id = id.to_string();
        Ok(entry)
    }
}

/// Turns a non-2xx response into [`LoadError::Status`]
async fn ensure_success(response: Response) -> Result<Response, LoadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LoadError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Error bodies from the backend look like
/// `{"error": "...", "statusCode": 400}`; anything else is used verbatim.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(alias = "errorMessage")]
        error: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) => body.trim().to_string(),
    }
}

/// Accepts an array of ids (strings or integers), of inline entries, or a
/// mix. Inline entries are named `view-{index}` after their array position.
fn parse_region_items(body: &str) -> Result<Vec<RegionItem>, LoadError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawItem {
        Text(String),
        Integer(i64),
        Entry(GeometryEntry),
    }

    let items: Vec<RawItem> = serde_json::from_str(body)?;
    Ok(items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            RawItem::Text(text) => RegionItem::Id(text),
            RawItem::Integer(n) => RegionItem::Id(n.to_string()),
            RawItem::Entry(mut entry) => {
                entry.id = format!("view-{index}");
                RegionItem::Inline(entry)
            }
        })
        .collect())
}
