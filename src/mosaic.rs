//! One mosaic instance.
//!
//! A [`Mosaic`] owns its framebuffer, interaction state and generation
//! counter, and shares the asset source and tile cache with other
//! instances. Loading runs the whole pipeline for one generation:
//!
//! ```text
//! ManifestLoader ─▶ TileSourceStrategy::plan ─▶ LoadScheduler::run ─▶ Compositor::draw
//!                                                    │
//!                                                    └──▶ TileCache (read first, write behind)
//! ```
//!
//! Pointer events drive the [`ZoomOverlay`], which renders from the same
//! decoded cells the compositor drew.

use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;
use tracing::{info, warn};

use crate::error::{ManifestError, TileError};
use crate::format::FormatNegotiator;
use crate::io::AssetSource;
use crate::manifest::{ManifestLayout, ManifestLoader, TileManifest};
use crate::render::{
    pixelate, Bounds, Compositor, PointerEvent, ViewportInteractionState, ZoomOverlay,
    ZOOM_AREA_SIZE,
};
use crate::schedule::{
    DeviceProfile, GenerationCounter, LoadPolicy, LoadScheduler, RenderBudget, ScheduleReport,
    TileSourceStrategy,
};
use crate::tile::{TileCache, TileCodec};

/// Default pixelation block size for the plain-image fallback.
pub const DEFAULT_PIXEL_SIZE: u32 = 8;

/// Presentation settings for one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicOptions {
    /// Display box width in display pixels
    pub display_width: u32,

    /// Display box height in display pixels
    pub display_height: u32,

    pub device: DeviceProfile,

    /// Render from tiles; when off only the pixelated fallback is shown
    pub mosaic_mode: bool,

    /// Block size of the pixelated fallback
    pub pixel_size: u32,

    /// Fraction of the mosaic shown by the zoom overlay
    pub zoom_area: f64,
}

impl MosaicOptions {
    pub fn new(display_width: u32, display_height: u32) -> Self {
        Self {
            display_width,
            display_height,
            device: DeviceProfile::default(),
            mosaic_mode: true,
            pixel_size: DEFAULT_PIXEL_SIZE,
            zoom_area: ZOOM_AREA_SIZE,
        }
    }

    pub fn with_device(mut self, device: DeviceProfile) -> Self {
        self.device = device;
        self
    }
}

/// What an instance currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MosaicState {
    /// Nothing loaded for the current generation
    Idle,

    /// Mosaic rendered (possibly with missing cells)
    Ready,

    /// Mosaic disabled; the plain image is shown instead
    Fallback { reason: String },
}

/// Outcome of one [`Mosaic::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub generation: u64,

    /// Manifest shape, when a manifest was loaded
    pub layout: Option<ManifestLayout>,

    /// Framebuffer size
    pub width: u32,
    pub height: u32,

    /// Grid cells drawn this generation
    pub drawn: usize,

    /// Grid cells in the manifest
    pub cells: usize,

    pub schedule: ScheduleReport,
}

/// Stops an instance's outstanding load from another task.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    generations: GenerationCounter,
}

impl CancelHandle {
    /// Invalidate the current generation. Work already in flight finishes
    /// but is neither drawn nor cached.
    pub fn cancel(&self) {
        self.generations.advance();
    }
}

// =============================================================================
// Mosaic
// =============================================================================

/// A progressive tiled-image renderer bound to one manifest.
pub struct Mosaic {
    source: Arc<dyn AssetSource>,
    cache: Arc<TileCache>,
    loader: ManifestLoader,
    negotiator: FormatNegotiator,
    options: MosaicOptions,
    generations: GenerationCounter,
    manifest: Option<Arc<TileManifest>>,
    compositor: Option<Compositor>,
    overlay: ZoomOverlay,
    state: MosaicState,
}

impl Mosaic {
    /// Create an idle instance. Nothing is fetched until [`load`](Self::load).
    pub fn new(source: Arc<dyn AssetSource>, cache: Arc<TileCache>, options: MosaicOptions) -> Self {
        let overlay = ZoomOverlay::new(display_bounds(&options)).with_zoom_area(options.zoom_area);
        Self {
            source,
            cache,
            loader: ManifestLoader::new(),
            negotiator: FormatNegotiator::detect(),
            options,
            generations: GenerationCounter::new(),
            manifest: None,
            compositor: None,
            overlay,
            state: MosaicState::Idle,
        }
    }

    pub fn with_loader(mut self, loader: ManifestLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_negotiator(mut self, negotiator: FormatNegotiator) -> Self {
        self.negotiator = negotiator;
        self
    }

    pub fn options(&self) -> &MosaicOptions {
        &self.options
    }

    pub fn state(&self) -> &MosaicState {
        &self.state
    }

    pub fn manifest(&self) -> Option<&TileManifest> {
        self.manifest.as_deref()
    }

    pub fn compositor(&self) -> Option<&Compositor> {
        self.compositor.as_ref()
    }

    /// Base framebuffer, once a generation has loaded.
    pub fn framebuffer(&self) -> Option<&RgbaImage> {
        self.compositor.as_ref().map(Compositor::framebuffer)
    }

    pub fn generation(&self) -> u64 {
        self.generations.current()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            generations: self.generations.clone(),
        }
    }

    /// Load the manifest and every tile for a new generation.
    pub async fn load(&mut self) -> Result<LoadReport, ManifestError> {
        self.load_with_progress(|_| {}).await
    }

    /// Like [`load`](Self::load), calling `progress` after every draw.
    ///
    /// # Errors
    ///
    /// Returns the manifest error that switched the instance to its
    /// fallback state. Tile failures never surface here.
    pub async fn load_with_progress<F>(&mut self, mut progress: F) -> Result<LoadReport, ManifestError>
    where
        F: FnMut(&Compositor),
    {
        let token = self.generations.advance();
        self.compositor = None;
        self.state = MosaicState::Idle;

        let mut report = LoadReport {
            generation: token.generation(),
            ..LoadReport::default()
        };

        if !self.options.mosaic_mode {
            self.state = MosaicState::Fallback {
                reason: "mosaic mode disabled".to_string(),
            };
            return Ok(report);
        }

        let manifest = match self.loader.load(self.source.as_ref()).await {
            Ok(manifest) => Arc::new(manifest),
            Err(e) => {
                warn!(generation = token.generation(), "Mosaic disabled: {}", e);
                self.manifest = None;
                self.state = MosaicState::Fallback {
                    reason: e.to_string(),
                };
                return Err(e);
            }
        };

        let budget = RenderBudget::compute(
            self.options.display_width,
            self.options.display_height,
            &self.options.device,
        );
        let strategy = TileSourceStrategy::for_manifest(&manifest);
        let tasks = strategy.plan(&manifest, &self.negotiator);
        let policy = LoadPolicy::for_strategy(strategy, self.options.device.class);
        info!(
            generation = token.generation(),
            layout = manifest.layout.name(),
            tasks = tasks.len(),
            width = budget.width,
            height = budget.height,
            "Loading mosaic"
        );

        let mut compositor = Compositor::new(
            budget.width,
            budget.height,
            manifest.canvas_width,
            manifest.canvas_height,
        );
        compositor.set_smoothing(self.overlay.is_hovering());

        let scheduler = LoadScheduler::new(Arc::clone(&self.source), Arc::clone(&self.cache), policy);
        let schedule = scheduler
            .run(tasks, &token, |loaded| {
                if compositor.draw(&loaded) > 0 {
                    progress(&compositor);
                }
            })
            .await;

        report.layout = Some(manifest.layout);
        report.width = compositor.width();
        report.height = compositor.height();
        report.drawn = compositor.drawn_count();
        report.cells = manifest.cell_count();
        report.schedule = schedule;

        if token.is_current() {
            self.manifest = Some(manifest);
            self.compositor = Some(compositor);
            self.state = MosaicState::Ready;
        }
        Ok(report)
    }

    /// Change the display box. Invalidates the framebuffer; call
    /// [`load`](Self::load) again to redraw.
    pub fn resize(&mut self, display_width: u32, display_height: u32) {
        self.options.display_width = display_width;
        self.options.display_height = display_height;
        self.overlay.set_bounds(display_bounds(&self.options));
        self.reset();
    }

    /// Set where the mosaic sits in client coordinates, for pointer
    /// normalization.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.overlay.set_bounds(bounds);
    }

    /// Drop the current generation's framebuffer and stop its load.
    pub fn reset(&mut self) {
        self.generations.advance();
        self.compositor = None;
        self.state = MosaicState::Idle;
    }

    /// Feed a pointer event. Returns whether the overlay needs redrawing.
    pub fn handle_pointer(&mut self, event: PointerEvent, now: Instant) -> bool {
        let changed = self.overlay.handle(event, now);
        self.sync_smoothing();
        changed
    }

    /// Advance interaction timers (touch dwell).
    pub fn tick(&mut self, now: Instant) -> bool {
        let changed = self.overlay.tick(now);
        self.sync_smoothing();
        changed
    }

    pub fn interaction(&self) -> ViewportInteractionState {
        self.overlay.interaction()
    }

    pub fn overlay(&self) -> &ZoomOverlay {
        &self.overlay
    }

    /// Render the zoom overlay at the display size, if hovering.
    pub fn overlay_image(&self) -> Option<RgbaImage> {
        let compositor = self.compositor.as_ref()?;
        self.overlay.render(
            compositor,
            self.options.display_width,
            self.options.display_height,
        )
    }

    /// Fetch the plain image `name` and pixelate it to the display size.
    pub async fn fallback_image(&self, name: &str) -> Result<RgbaImage, TileError> {
        let bytes = self
            .source
            .fetch(name)
            .await
            .map_err(|source| TileError::FetchFailed {
                name: name.to_string(),
                source,
            })?;
        let image = TileCodec::new().decode(name, &bytes)?;
        Ok(pixelate(
            &image,
            self.options.display_width,
            self.options.display_height,
            self.options.pixel_size,
        ))
    }

    fn sync_smoothing(&mut self) {
        let hovering = self.overlay.is_hovering();
        if let Some(compositor) = self.compositor.as_mut() {
            compositor.set_smoothing(hovering);
        }
    }
}

impl Drop for Mosaic {
    fn drop(&mut self) {
        self.generations.advance();
    }
}

fn display_bounds(options: &MosaicOptions) -> Bounds {
    Bounds::from_size(options.display_width as f64, options.display_height as f64)
}
