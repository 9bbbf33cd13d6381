use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use image::RgbaImage;
use once_cell::sync::Lazy;

use super::source::TileSource;
use crate::core::config::TileLoaderConfig;
use crate::core::geo::TileCoord;
use crate::{MapError, Result};

/// Shared async HTTP client with the default User-Agent and timeout, so that
/// public tile servers (e.g. OpenStreetMap) don't reject the request.
/// Building the client once avoids TLS and connection pool setup per tile.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    build_client(&TileLoaderConfig::default()).expect("failed to build reqwest async client")
});

fn build_client(config: &TileLoaderConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .pool_max_idle_per_host(config.max_concurrent)
        .build()?)
}

/// Anything that can turn a tile URL into encoded image bytes.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches tiles over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTileFetcher {
    client: reqwest::Client,
}

impl HttpTileFetcher {
    pub fn new(config: &TileLoaderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
        })
    }
}

impl Default for HttpTileFetcher {
    fn default() -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
        }
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MapError::Tile(format!("HTTP {} for {}", response.status(), url)));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Serves preloaded tiles from memory, for offline rendering and tests.
///
/// URLs that were never inserted fail like a 404 would.
#[derive(Debug, Default)]
pub struct MemoryTileFetcher {
    tiles: HashMap<String, Vec<u8>>,
    requests: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MemoryTileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, data: Vec<u8>) {
        self.tiles.insert(url.into(), data);
    }

    pub fn with_tile(mut self, url: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(url, data);
        self
    }

    /// Number of fetches issued so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// URLs requested so far, in request order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requested.lock().map(|urls| urls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TileFetcher for MemoryTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.requested.lock() {
            urls.push(url.to_string());
        }
        self.tiles
            .get(url)
            .cloned()
            .ok_or_else(|| MapError::Tile(format!("no tile at {}", url)))
    }
}

/// Settled result of one tile request.
#[derive(Debug)]
pub struct TileOutcome {
    /// Coordinate as requested (unwrapped), used for placement
    pub coord: TileCoord,
    pub image: Result<RgbaImage>,
}

/// Fans out tile requests and waits until every one of them has settled.
#[derive(Clone)]
pub struct TileLoader {
    fetcher: Arc<dyn TileFetcher>,
    config: TileLoaderConfig,
}

impl TileLoader {
    pub fn new(fetcher: Arc<dyn TileFetcher>, config: TileLoaderConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &TileLoaderConfig {
        &self.config
    }

    /// Loads every coordinate concurrently (up to `max_concurrent` in flight)
    /// and returns one outcome per coordinate once all have finished.
    ///
    /// A failing tile never affects the others. Outcomes come back in
    /// completion order.
    pub async fn load_all(&self, source: &dyn TileSource, coords: Vec<TileCoord>) -> Vec<TileOutcome> {
        let limit = self.config.max_concurrent.max(1);
        log::debug!("loading {} tiles, {} in flight", coords.len(), limit);

        stream::iter(coords)
            .map(|coord| async move {
                let image = self.load_one(source, coord).await;
                if let Err(e) = &image {
                    log::warn!("skipping tile {:?}: {}", coord, e);
                }
                TileOutcome { coord, image }
            })
            .buffer_unordered(limit)
            .collect()
            .await
    }

    async fn load_one(&self, source: &dyn TileSource, coord: TileCoord) -> Result<RgbaImage> {
        let wrapped = coord.wrapped();
        // Rows past the poles do not exist; fail without a request.
        if !wrapped.is_valid() {
            return Err(MapError::Tile(format!(
                "row {} outside 0..{} at zoom {}",
                wrapped.y,
                wrapped.tiles_per_axis(),
                wrapped.z
            )));
        }

        let url = source.url(wrapped);
        log::debug!("fetch tile {:?} from {}", wrapped, url);
        let data = self.fetcher.fetch(&url).await?;
        Ok(image::load_from_memory(&data)?.to_rgba8())
    }
}
