/// Item catalog loading: the things being dueled.
///
/// The core only sees ids. Names, classification and series live here and
/// are used for display.
use std::collections::HashMap;
use std::time::Duration;

use duelrank_core::constants::LOAD_TIMEOUT_MS;
use duelrank_core::ItemId;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to fetch catalog {url}: {message}")]
    Network { url: String, message: String },

    #[error("Catalog is not a JSON array of items: {0}")]
    Parse(String),

    #[error("Catalog contains no usable items (each needs an integer id and a name)")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub classification: Option<String>,
    pub series: Option<String>,
    pub wiki_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    #[serde(default)]
    id: Value,
    name: Option<String>,
    code: Option<String>,
    model_name: Option<String>,
    classification: Option<String>,
    series: Option<String>,
    wiki_url: Option<String>,
}

impl RawItem {
    /// `name` when present, otherwise `code` and `modelName` joined by a space.
    fn display_name(&self) -> String {
        if let Some(ref name) = self.name {
            return name.trim().to_string();
        }
        [self.code.as_deref(), self.model_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    index: HashMap<ItemId, usize>,
}

impl Catalog {
    /// Item ids in catalog order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn get(&self, id: ItemId) -> Option<&CatalogItem> {
        self.index.get(&id).map(|&idx| &self.items[idx])
    }

    /// Display name for `id`, falling back to `#<id>` for unknown ids.
    pub fn name_of(&self, id: ItemId) -> String {
        self.get(id).map(|item| item.name.clone()).unwrap_or_else(|| format!("#{id}"))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn push(&mut self, item: CatalogItem) -> bool {
        if self.index.contains_key(&item.id) {
            return false;
        }
        self.index.insert(item.id, self.items.len());
        self.items.push(item);
        true
    }
}

/// Parse a catalog document.
///
/// Entries without an integer id or a non-empty display name are skipped.
/// Repeated ids keep the first entry.
pub fn parse_catalog(text: &str) -> Result<Catalog, CatalogError> {
    let entries: Vec<Value> =
        serde_json::from_str(text).map_err(|e| CatalogError::Parse(e.to_string()))?;

    let mut catalog = Catalog::default();
    for (position, entry) in entries.into_iter().enumerate() {
        let raw: RawItem = match serde_json::from_value(entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping catalog entry {position}: {e}");
                continue;
            }
        };

        let Some(id) = raw.id.as_i64() else {
            warn!("Skipping catalog entry {position}: id {} is not an integer", raw.id);
            continue;
        };

        let name = raw.display_name();
        if name.is_empty() {
            warn!("Skipping catalog entry {position} (id {id}): no name");
            continue;
        }

        let item = CatalogItem {
            id,
            name,
            classification: raw.classification,
            series: raw.series,
            wiki_url: raw.wiki_url,
        };
        if !catalog.push(item) {
            warn!("Skipping catalog entry {position}: duplicate id {id}");
        }
    }

    if catalog.is_empty() {
        return Err(CatalogError::Empty);
    }
    Ok(catalog)
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

async fn fetch_remote(url: &str) -> Result<String, CatalogError> {
    let network = |message: String| CatalogError::Network { url: url.to_string(), message };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(LOAD_TIMEOUT_MS))
        .build()
        .map_err(|e| network(e.to_string()))?;

    debug!("Fetching catalog from {url}");
    let response = client.get(url).send().await.map_err(|e| network(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(network(format!("HTTP {status}")));
    }
    response.text().await.map_err(|e| network(e.to_string()))
}

/// Load a catalog from a local path or an http(s) URL.
pub async fn load_catalog(source: &str) -> Result<Catalog, CatalogError> {
    let text = if is_remote(source) {
        fetch_remote(source).await?
    } else {
        tokio::fs::read_to_string(source).await.map_err(|e| CatalogError::Read {
            path: source.to_string(),
            source: e,
        })?
    };

    let catalog = parse_catalog(&text)?;
    info!(items = catalog.len(), "Loaded catalog from {source}");
    Ok(catalog)
}
