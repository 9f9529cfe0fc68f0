//! The location picker: one map, one marker, click or fly-to to select.
//!
//! [`LocationPicker`] owns all mutable state for a single picker instance and
//! is driven from one event loop. Work that has to wait (runtime loading, the
//! settle delay before a buffered fly-to, reverse geocoding) runs on spawned
//! tasks which report back through a [`PickerEvent`] channel. The loop feeds
//! those events to [`LocationPicker::handle_event`], so every state change
//! happens on the loop, one event at a time.
//!
//! ```text
//! Unloaded --mount--> Loading --runtime ready--> Ready
//!     \__________________\______________________\__destroy--> Destroyed
//! ```
//!
//! A fly-to requested before `Ready` is buffered in a single slot (newest
//! wins) and replayed exactly once after the map is initialized, whatever
//! happens during the settle delay. Each reverse-geocode
//! carries a ticket; only the completion matching the latest ticket may touch
//! the marker or reach the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use crate::config::PickerConfig;
use crate::geocode::{Address, Resolver};
use crate::models::{Coordinate, FlyRequest, MarkerState, SelectionOrigin, SelectionResult};
use crate::runtime::{MapRuntime, RuntimeLoader};
use crate::viewport::Viewport;

/// Called once per completed selection.
pub type LocationSelectHandler = Box<dyn FnMut(SelectionResult) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unloaded,
    Loading,
    Ready,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickerOptions {
    pub initial_position: Option<Coordinate>,
    pub default_center: Coordinate,
    pub default_zoom: u8,
    pub fly_zoom: u8,
    pub fly_duration: Duration,
    pub settle_delay: Duration,
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self::from(&PickerConfig::default())
    }
}

impl From<&PickerConfig> for PickerOptions {
    fn from(config: &PickerConfig) -> Self {
        Self {
            initial_position: None,
            default_center: config.default_center,
            default_zoom: config.default_zoom,
            fly_zoom: config.fly_zoom,
            fly_duration: config.fly_duration(),
            settle_delay: config.settle_delay(),
        }
    }
}

impl PickerOptions {
    pub fn with_initial_position(mut self, position: Option<Coordinate>) -> Self {
        self.initial_position = position;
        self
    }
}

/// Completions posted back to the event loop by the picker's own tasks.
#[derive(Debug)]
pub enum PickerEvent {
    RuntimeReady(Arc<MapRuntime>),
    RuntimeFailed(String),
    /// Replay of a fly-to buffered before the map was ready.
    ReplayFly(Coordinate),
    Resolved {
        ticket: u64,
        coord: Coordinate,
        address: Address,
    },
}

/// The live map. Its existence is what routes clicks into the picker.
struct MapInstance {
    runtime: Arc<MapRuntime>,
    viewport: Viewport,
}

pub struct LocationPicker {
    options: PickerOptions,
    loader: Arc<RuntimeLoader>,
    resolver: Resolver,
    tx: UnboundedSender<PickerEvent>,
    phase: Phase,
    map: Option<MapInstance>,
    marker: Option<MarkerState>,
    pending: Option<Coordinate>,
    last_token: Option<u64>,
    ticket: u64,
    alive: Arc<AtomicBool>,
    on_select: Option<LocationSelectHandler>,
}

impl LocationPicker {
    pub fn new(
        options: PickerOptions,
        loader: Arc<RuntimeLoader>,
        resolver: Resolver,
        tx: UnboundedSender<PickerEvent>,
    ) -> Self {
        Self {
            options,
            loader,
            resolver,
            tx,
            phase: Phase::Unloaded,
            map: None,
            marker: None,
            pending: None,
            last_token: None,
            ticket: 0,
            alive: Arc::new(AtomicBool::new(true)),
            on_select: None,
        }
    }

    pub fn on_location_select(&mut self, handler: impl FnMut(SelectionResult) + Send + 'static) {
        self.on_select = Some(Box::new(handler));
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True until the map exists; drives the "Loading Map..." overlay.
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Unloaded | Phase::Loading)
    }

    pub fn marker(&self) -> Option<&MarkerState> {
        self.marker.as_ref()
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.map.as_ref().map(|m| &m.viewport)
    }

    pub fn viewport_mut(&mut self) -> Option<&mut Viewport> {
        self.map.as_mut().map(|m| &mut m.viewport)
    }

    pub fn runtime(&self) -> Option<&Arc<MapRuntime>> {
        self.map.as_ref().map(|m| &m.runtime)
    }

    pub fn pending_fly(&self) -> Option<Coordinate> {
        self.pending
    }

    /// Starts loading the map runtime. If another mount already loaded it the
    /// map is initialized right away.
    pub fn mount(&mut self) {
        if self.phase != Phase::Unloaded {
            return;
        }
        self.phase = Phase::Loading;

        if let Some(runtime) = self.loader.loaded() {
            self.initialize(runtime);
            return;
        }

        info!("Loading map runtime");
        let loader = Arc::clone(&self.loader);
        let tx = self.tx.clone();
        let alive = Arc::clone(&self.alive);
        tokio::spawn(async move {
            let event = match loader.ensure_loaded().await {
                Ok(runtime) => PickerEvent::RuntimeReady(runtime),
                Err(e) => PickerEvent::RuntimeFailed(e.to_string()),
            };
            if alive.load(Ordering::Acquire) {
                let _ = tx.send(event);
            }
        });
    }

    /// Creates the map instance. A second call, or a call after teardown,
    /// does nothing.
    pub fn initialize(&mut self, runtime: Arc<MapRuntime>) {
        if self.map.is_some() || self.phase == Phase::Destroyed {
            return;
        }

        let center = self
            .options
            .initial_position
            .unwrap_or(self.options.default_center);
        self.map = Some(MapInstance {
            runtime,
            viewport: Viewport::new(center, self.options.default_zoom),
        });
        self.phase = Phase::Ready;
        info!("Map ready at {} zoom {}", center, self.options.default_zoom);

        if let Some(coord) = self.pending.take() {
            debug!("Replaying buffered fly-to {}", coord);
            let delay = self.options.settle_delay;
            let tx = self.tx.clone();
            let alive = Arc::clone(&self.alive);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if alive.load(Ordering::Acquire) {
                    let _ = tx.send(PickerEvent::ReplayFly(coord));
                }
            });
        }
    }

    /// Applies an external fly-to request. A request whose token matches the
    /// previous one is ignored, non-finite coordinates are ignored, and before
    /// the map is ready the request replaces whatever is buffered.
    pub fn fly_to(&mut self, request: FlyRequest) {
        if self.phase == Phase::Destroyed {
            return;
        }
        if !request.coord.is_finite() {
            debug!("Ignoring fly-to with non-numeric coordinates");
            return;
        }
        if self.last_token == Some(request.token) {
            return;
        }
        self.last_token = Some(request.token);

        if self.phase == Phase::Ready {
            self.apply_fly_to(request.coord);
        } else if let Some(previous) = self.pending.replace(request.coord) {
            debug!("Buffered fly-to {} replaced by {}", previous, request.coord);
        }
    }

    /// A pointer click on the map. Ignored unless the map is ready.
    pub fn click(&mut self, coord: Coordinate) {
        if self.phase != Phase::Ready {
            return;
        }
        self.place_marker(coord, Some(SelectionOrigin::Click.fallback_label(coord)));
        self.dispatch_resolve(coord, SelectionOrigin::Click);
    }

    /// Advances the viewport animation. Returns true while it is running.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.viewport_mut().map_or(false, |vp| vp.advance(now))
    }

    pub fn handle_event(&mut self, event: PickerEvent) {
        if self.phase == Phase::Destroyed {
            debug!("Picker destroyed, dropping {:?}", event);
            return;
        }

        match event {
            PickerEvent::RuntimeReady(runtime) => self.initialize(runtime),
            PickerEvent::RuntimeFailed(reason) => {
                error!("Map runtime unavailable: {}", reason);
            }
            PickerEvent::ReplayFly(coord) => {
                if self.phase == Phase::Ready {
                    self.apply_fly_to(coord);
                }
            }
            PickerEvent::Resolved {
                ticket,
                coord,
                address,
            } => self.complete_selection(ticket, coord, address),
        }
    }

    /// Releases the map and silences every task still in flight.
    pub fn destroy(&mut self) {
        if self.phase == Phase::Destroyed {
            return;
        }
        self.alive.store(false, Ordering::Release);
        self.map = None;
        self.marker = None;
        self.pending = None;
        self.phase = Phase::Destroyed;
        info!("Picker destroyed");
    }

    fn apply_fly_to(&mut self, coord: Coordinate) {
        let (zoom, duration) = (self.options.fly_zoom, self.options.fly_duration);
        if let Some(vp) = self.viewport_mut() {
            vp.fly_to(coord, zoom, duration, Instant::now());
        }
        self.place_marker(coord, Some(SelectionOrigin::FlyTo.fallback_label(coord)));
        self.dispatch_resolve(coord, SelectionOrigin::FlyTo);
    }

    fn place_marker(&mut self, coord: Coordinate, popup: Option<String>) {
        match self.marker.as_mut() {
            Some(marker) => {
                marker.position = coord;
                marker.popup = popup;
            }
            None => {
                self.marker = Some(MarkerState {
                    position: coord,
                    popup,
                })
            }
        }
    }

    fn dispatch_resolve(&mut self, coord: Coordinate, origin: SelectionOrigin) {
        self.ticket += 1;
        let ticket = self.ticket;
        let resolver = self.resolver.clone();
        let tx = self.tx.clone();
        let alive = Arc::clone(&self.alive);
        tokio::spawn(async move {
            let address = resolver.resolve(coord, origin).await;
            if !alive.load(Ordering::Acquire) {
                debug!("Picker gone, discarding address for {}", coord);
                return;
            }
            let _ = tx.send(PickerEvent::Resolved {
                ticket,
                coord,
                address,
            });
        });
    }

    fn complete_selection(&mut self, ticket: u64, coord: Coordinate, address: Address) {
        let current = self.marker.as_ref().map(|m| m.position);
        if ticket != self.ticket || current != Some(coord) {
            debug!("Discarding stale address for {}", coord);
            return;
        }

        if address.is_resolved() {
            if let Some(marker) = self.marker.as_mut() {
                marker.popup = Some(address.text().to_string());
            }
        }

        let result = SelectionResult {
            lat: coord.lat,
            lng: coord.lng,
            address: address.into_string(),
        };
        info!("Selected {} -> {}", coord, result.address);
        if let Some(handler) = self.on_select.as_mut() {
            handler(result);
        }
    }
}

impl Drop for LocationPicker {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}
