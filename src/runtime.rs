//! Map runtime loading.
//!
//! The map needs two resources before anything can be drawn: a tile-layer
//! descriptor (the "script") and a map style (the "stylesheet"). Both are
//! registered in a shared [`Document`] keyed by a fixed id, so any number of
//! pickers can mount against the same loader without duplicating them. The
//! [`RuntimeLoader`] fetches and parses them once per process and hands every
//! caller the same [`MapRuntime`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::models::Coordinate;

pub const STYLESHEET_ID: &str = "map-style";
pub const SCRIPT_ID: &str = "map-runtime";

const BUNDLED_PREFIX: &str = "bundled:";

pub const BUNDLED_STYLE: &str = r#"
outline = [70, 90, 110]
marker_symbol = "●"
marker = [230, 57, 70]
popup_fg = [20, 20, 20]
popup_bg = [240, 240, 230]
high_detail_zoom = 5
"#;

pub const BUNDLED_LAYER: &str = r#"
url_template = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"
subdomains = ["a", "b", "c"]
attribution = "© OpenStreetMap contributors"
max_zoom = 19
"#;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to fetch {id} from {href}: {source}")]
    Fetch {
        id: &'static str,
        href: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no bundled resource named {0}")]
    UnknownBundle(String),
    #[error("invalid {id}: {source}")]
    Parse {
        id: &'static str,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Stylesheet,
    Script,
}

/// A resource registered in the shared [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: &'static str,
    pub kind: ResourceKind,
    pub href: String,
}

impl Resource {
    pub fn stylesheet(href: impl Into<String>) -> Self {
        Self {
            id: STYLESHEET_ID,
            kind: ResourceKind::Stylesheet,
            href: href.into(),
        }
    }

    pub fn script(href: impl Into<String>) -> Self {
        Self {
            id: SCRIPT_ID,
            kind: ResourceKind::Script,
            href: href.into(),
        }
    }
}

/// Process-wide registry of injected resources. Write-once per id.
#[derive(Debug, Default)]
pub struct Document {
    head: Mutex<Vec<Resource>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().iter().any(|r| r.id == id)
    }

    /// Appends `resource` unless one with the same id is already present.
    /// Returns whether it was appended.
    pub fn inject(&self, resource: Resource) -> bool {
        let mut head = self.lock();
        if head.iter().any(|r| r.id == resource.id) {
            return false;
        }
        head.push(resource);
        true
    }

    pub fn remove(&self, id: &str) {
        self.lock().retain(|r| r.id != id);
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Resource>> {
        self.head.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Retrieves the raw contents of a resource.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, resource: &Resource) -> Result<String, RuntimeError>;
}

/// Serves `bundled:` hrefs from the binary and anything else from disk.
#[derive(Debug, Default, Clone)]
pub struct BundledFetcher;

#[async_trait]
impl ResourceFetcher for BundledFetcher {
    async fn fetch(&self, resource: &Resource) -> Result<String, RuntimeError> {
        if let Some(name) = resource.href.strip_prefix(BUNDLED_PREFIX) {
            return match name {
                "style" => Ok(BUNDLED_STYLE.to_string()),
                "layer" => Ok(BUNDLED_LAYER.to_string()),
                other => Err(RuntimeError::UnknownBundle(other.to_string())),
            };
        }
        tokio::fs::read_to_string(&resource.href)
            .await
            .map_err(|source| RuntimeError::Fetch {
                id: resource.id,
                href: resource.href.clone(),
                source,
            })
    }
}

/// Where the loader takes its two resources from.
#[derive(Debug, Clone, Default)]
pub struct RuntimeSources {
    pub style_path: Option<PathBuf>,
    pub layer_path: Option<PathBuf>,
}

impl RuntimeSources {
    fn stylesheet(&self) -> Resource {
        Resource::stylesheet(href_for(&self.style_path, "style"))
    }

    fn script(&self) -> Resource {
        Resource::script(href_for(&self.layer_path, "layer"))
    }
}

fn href_for(path: &Option<PathBuf>, bundle: &str) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => format!("{BUNDLED_PREFIX}{bundle}"),
    }
}

/// Colors are plain RGB triples so the style file stays UI-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapStyle {
    pub outline: [u8; 3],
    pub marker_symbol: String,
    pub marker: [u8; 3],
    pub popup_fg: [u8; 3],
    pub popup_bg: [u8; 3],
    /// Zoom level from which the high resolution coastline is drawn.
    pub high_detail_zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub url_template: String,
    pub subdomains: Vec<String>,
    pub attribution: String,
    pub max_zoom: u8,
}

impl TileLayer {
    /// Web-Mercator tile column and row containing `coord` at `zoom`.
    pub fn tile_index(coord: Coordinate, zoom: u8) -> (u32, u32) {
        let n = 2f64.powi(i32::from(zoom));
        let max = n - 1.0;
        let lat = coord.lat.clamp(-85.051_128_78, 85.051_128_78).to_radians();
        let x = ((coord.lng + 180.0) / 360.0 * n).floor().clamp(0.0, max);
        let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n)
            .floor()
            .clamp(0.0, max);
        (x as u32, y as u32)
    }

    /// Expands the XYZ template for the tile containing `coord`.
    pub fn tile_url(&self, coord: Coordinate, zoom: u8) -> String {
        let zoom = zoom.min(self.max_zoom);
        let (x, y) = Self::tile_index(coord, zoom);
        let subdomain = if self.subdomains.is_empty() {
            ""
        } else {
            self.subdomains[(x as usize + y as usize) % self.subdomains.len()].as_str()
        };
        self.url_template
            .replace("{s}", subdomain)
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

/// Everything the map needs once loaded. Immutable and shared.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRuntime {
    pub style: MapStyle,
    pub layer: TileLayer,
}

/// Loads the map runtime at most once per process.
pub struct RuntimeLoader {
    document: Arc<Document>,
    fetcher: Arc<dyn ResourceFetcher>,
    sources: RuntimeSources,
    runtime: OnceCell<Arc<MapRuntime>>,
}

impl RuntimeLoader {
    pub fn new(
        document: Arc<Document>,
        fetcher: Arc<dyn ResourceFetcher>,
        sources: RuntimeSources,
    ) -> Self {
        Self {
            document,
            fetcher,
            sources,
            runtime: OnceCell::new(),
        }
    }

    /// A loader backed by the bundled resources only.
    pub fn bundled() -> Self {
        Self::new(
            Arc::new(Document::new()),
            Arc::new(BundledFetcher),
            RuntimeSources::default(),
        )
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn is_loaded(&self) -> bool {
        self.runtime.initialized()
    }

    /// The runtime, if a previous load already completed.
    pub fn loaded(&self) -> Option<Arc<MapRuntime>> {
        self.runtime.get().cloned()
    }

    /// Resolves once the runtime is available. Concurrent callers share a
    /// single load; a failed load leaves nothing cached, so a later call
    /// starts over.
    pub async fn ensure_loaded(&self) -> Result<Arc<MapRuntime>, RuntimeError> {
        if let Some(runtime) = self.runtime.get() {
            debug!("Map runtime already present");
            return Ok(Arc::clone(runtime));
        }
        self.runtime
            .get_or_try_init(|| self.load())
            .await
            .map(Arc::clone)
    }

    async fn load(&self) -> Result<Arc<MapRuntime>, RuntimeError> {
        let stylesheet = self.sources.stylesheet();
        let script = self.sources.script();

        if self.document.inject(stylesheet.clone()) {
            info!("Injected map stylesheet from {}", stylesheet.href);
        }
        if self.document.inject(script.clone()) {
            info!("Injected map runtime from {}", script.href);
        }

        match self.fetch_runtime(&stylesheet, &script).await {
            Ok(runtime) => {
                info!("Map runtime ready");
                Ok(Arc::new(runtime))
            }
            Err(e) => {
                // The script entry is dropped so a remount injects it again.
                self.document.remove(SCRIPT_ID);
                warn!("Map runtime failed to load: {}", e);
                Err(e)
            }
        }
    }

    async fn fetch_runtime(
        &self,
        stylesheet: &Resource,
        script: &Resource,
    ) -> Result<MapRuntime, RuntimeError> {
        let style_src = self.fetcher.fetch(stylesheet).await?;
        let layer_src = self.fetcher.fetch(script).await?;
        let style = toml::from_str(&style_src).map_err(|source| RuntimeError::Parse {
            id: STYLESHEET_ID,
            source,
        })?;
        let layer = toml::from_str(&layer_src).map_err(|source| RuntimeError::Parse {
            id: SCRIPT_ID,
            source,
        })?;
        Ok(MapRuntime { style, layer })
    }
}
