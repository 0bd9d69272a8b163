use std::collections::{BTreeMap, HashSet};
use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::sprite_state::{RenderMode, SpriteCanvases, ThingSprite};
use crate::app::Viewport;
use crate::canvas::{Canvas, CanvasFactory, Rgba, SoftwareCanvasFactory};
use crate::geometry::{Bounds, Positionable};
use crate::quadrants::{Quadrant, QuadsKeeper};
use crate::sprites::{
    DecodedSprite, SpriteDecoder, SpriteDirection, SpriteError, SpriteMultiple, SpritePart,
};
use crate::things::{Thing, ThingStore};

/// Produces the sprite key a Thing is decoded under.
pub type KeyGenerator = Box<dyn Fn(&Thing) -> String>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositorSettings {
    /// Converts composite band sizes from tile units to pixels.
    pub unitsize: f64,
    /// The background is static; refills never repaint it.
    pub no_refill: bool,
    /// Composites whose tile area is below this are pre-rendered into one canvas.
    pub sprite_cache_cutoff: f64,
    /// Only every Nth refill call draws.
    pub framerate_skip: u32,
    /// Things with opacity below this are not drawn.
    pub epsilon: f32,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            unitsize: 1.0,
            no_refill: false,
            sprite_cache_cutoff: 0.0,
            framerate_skip: 1,
            epsilon: 0.007,
        }
    }
}

#[derive(Debug, Error)]
pub enum DrawError {
    #[error("framerate_skip must be at least 1")]
    ZeroFramerateSkip,
    #[error("unitsize must be positive, got {0}")]
    InvalidUnitsize(f64),
    #[error("failed to set sprite '{key}'")]
    Sprite {
        key: String,
        #[source]
        source: SpriteError,
    },
}

/// What one refill call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefillStats {
    pub quadrants_redrawn: usize,
    pub things_drawn: usize,
    pub skipped_frame: bool,
}

impl RefillStats {
    fn skipped() -> Self {
        Self {
            skipped_frame: true,
            ..Self::default()
        }
    }
}

/// Draw position of a Thing's top edge, including its visual offset.
pub fn get_top(thing: &Thing) -> f64 {
    thing.top() + thing.offset_y
}

pub fn get_right(thing: &Thing) -> f64 {
    thing.right() + thing.offset_x
}

pub fn get_bottom(thing: &Thing) -> f64 {
    thing.bottom() + thing.offset_y
}

pub fn get_left(thing: &Thing) -> f64 {
    thing.left() + thing.offset_x
}

/// Right and bottom limits for pattern fills, in the target canvas's coordinates.
#[derive(Debug, Clone, Copy)]
struct PatternClip {
    right: f64,
    bottom: f64,
}

impl PatternClip {
    fn unbounded() -> Self {
        Self {
            right: f64::INFINITY,
            bottom: f64::INFINITY,
        }
    }
}

/// Incremental sprite compositor.
///
/// Owns the primary canvas (what ends up on screen) and a background canvas. Things are
/// rasterized once into private canvases on first draw and then blitted or pattern-tiled onto
/// either the primary canvas directly ([`Compositor::refill_global_canvas`]) or onto Quadrant
/// canvases that are only repainted when changed ([`Compositor::refill_quadrants`]).
pub struct Compositor {
    settings: CompositorSettings,
    viewport: Viewport,
    canvas: Canvas,
    background: Canvas,
    background_color: Option<Rgba>,
    decoder: Box<dyn SpriteDecoder>,
    canvas_factory: Box<dyn CanvasFactory>,
    generate_object_key: KeyGenerator,
    frames_drawn: u64,
    warned_missing_sprite_keys: HashSet<String>,
}

impl fmt::Debug for Compositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("settings", &self.settings)
            .field("viewport", &self.viewport)
            .field("frames_drawn", &self.frames_drawn)
            .finish_non_exhaustive()
    }
}

impl Compositor {
    pub fn new(
        settings: CompositorSettings,
        viewport: Viewport,
        decoder: Box<dyn SpriteDecoder>,
    ) -> Result<Self, DrawError> {
        Self::with_canvas_factory(settings, viewport, decoder, Box::new(SoftwareCanvasFactory))
    }

    pub fn with_canvas_factory(
        settings: CompositorSettings,
        viewport: Viewport,
        decoder: Box<dyn SpriteDecoder>,
        canvas_factory: Box<dyn CanvasFactory>,
    ) -> Result<Self, DrawError> {
        if settings.framerate_skip == 0 {
            return Err(DrawError::ZeroFramerateSkip);
        }
        if !(settings.unitsize > 0.0 && settings.unitsize.is_finite()) {
            return Err(DrawError::InvalidUnitsize(settings.unitsize));
        }
        let (width, height) = viewport.pixel_size();
        Ok(Self {
            settings,
            viewport,
            canvas: canvas_factory.create_canvas(width, height),
            background: canvas_factory.create_canvas(width, height),
            background_color: None,
            decoder,
            canvas_factory,
            generate_object_key: Box::new(|thing: &Thing| thing.to_string()),
            frames_drawn: 0,
            warned_missing_sprite_keys: HashSet::new(),
        })
    }

    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Replaces the screen info and returns whether the screen size changed.
    ///
    /// A size change reallocates the primary canvas blank, so whatever was on screen has to be
    /// redrawn in full. A solid background is repainted at the new size; an installed
    /// background canvas is kept as is.
    pub fn set_viewport(&mut self, viewport: Viewport) -> bool {
        let resized = viewport.pixel_size() != self.viewport.pixel_size();
        self.viewport = viewport;
        if resized {
            let (width, height) = viewport.pixel_size();
            self.canvas = self.canvas_factory.create_canvas(width, height);
            if let Some(color) = self.background_color {
                self.background = self.canvas_factory.create_canvas(width, height);
                self.set_background(color);
            }
            info!(width, height, "compositor_resized");
        }
        resized
    }

    /// The primary canvas.
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn background(&self) -> &Canvas {
        &self.background
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn set_generate_object_key(&mut self, generate: impl Fn(&Thing) -> String + 'static) {
        self.generate_object_key = Box::new(generate);
    }

    pub fn set_no_refill(&mut self, no_refill: bool) {
        self.settings.no_refill = no_refill;
    }

    pub fn set_framerate_skip(&mut self, framerate_skip: u32) -> Result<(), DrawError> {
        if framerate_skip == 0 {
            return Err(DrawError::ZeroFramerateSkip);
        }
        self.settings.framerate_skip = framerate_skip;
        Ok(())
    }

    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.settings.epsilon = epsilon;
    }

    pub fn set_sprite_cache_cutoff(&mut self, cutoff: f64) {
        self.settings.sprite_cache_cutoff = cutoff;
    }

    /// Paints the background canvas a solid color.
    pub fn set_background(&mut self, color: Rgba) {
        let width = self.background.width() as f64;
        let height = self.background.height() as f64;
        self.background.clear_rect(0.0, 0.0, width, height);
        self.background.fill_rect(color, 0.0, 0.0, width, height);
        self.background_color = Some(color);
        debug!(?color, "background_filled");
    }

    /// Installs a pre-painted background. It is drawn at the screen origin.
    pub fn set_background_canvas(&mut self, background: Canvas) {
        self.background = background;
        self.background_color = None;
    }

    /// Decodes the Thing's sprite and rasterizes it into the Thing's private canvas(es).
    ///
    /// A key the decoder does not know is logged once and leaves the Thing without a sprite, so
    /// it draws nothing. Other decode failures are returned.
    pub fn set_thing_sprite(&mut self, thing: &mut Thing) -> Result<(), DrawError> {
        let key = (self.generate_object_key)(thing);
        let decoded = match self.decoder.decode(&key, thing) {
            Ok(decoded) => decoded,
            Err(SpriteError::UnknownSprite { .. }) => {
                if self.warned_missing_sprite_keys.insert(key.clone()) {
                    warn!(sprite_key = %key, thing = thing.title(), "sprite_missing");
                }
                thing.sprite = None;
                return Ok(());
            }
            Err(source) => return Err(DrawError::Sprite { key, source }),
        };

        match decoded {
            DecodedSprite::Single(pixels) => self.refill_thing_canvas_single(thing, &pixels),
            DecodedSprite::Multiple(sprite) => self.refill_thing_canvas_multiple(thing, &sprite),
        }
        debug!(
            sprite_key = %key,
            composite = thing.sprite().is_some_and(ThingSprite::is_composite),
            "thing_sprite_set"
        );
        Ok(())
    }

    /// Copies a decoded single sprite into a fresh canvas of the Thing's sprite size.
    /// Degenerate Things are left without a sprite.
    pub fn refill_thing_canvas_single(&self, thing: &mut Thing, pixels: &[u8]) {
        if thing.width() < 1.0 || thing.height() < 1.0 {
            return;
        }
        let canvas = self.raster_canvas(
            thing.sprite_width_pixels(),
            thing.sprite_height_pixels(),
            pixels,
        );
        thing.sprite = Some(ThingSprite::single(canvas, footprint_pixels(thing)));
    }

    /// Rasterizes every part of a composite into its own tile canvas. Composites whose tile
    /// area is under the cache cutoff are also assembled once into a cached canvas; larger ones
    /// are assembled live on every draw.
    pub fn refill_thing_canvas_multiple(&self, thing: &mut Thing, sprite: &SpriteMultiple) {
        let tile_width = thing.sprite_width_pixels();
        let tile_height = thing.sprite_height_pixels();
        let parts: BTreeMap<SpritePart, Canvas> = sprite
            .parts()
            .map(|(part, pixels)| (part, self.raster_canvas(tile_width, tile_height, pixels)))
            .collect();
        let canvases = SpriteCanvases::new(sprite.direction(), sprite.layout(), parts);

        let render = if thing.width() * thing.height() < self.settings.sprite_cache_cutoff {
            let (width, height) = footprint_pixels(thing);
            let mut cached = self.canvas_factory.create_canvas(width, height);
            draw_multiple(
                &mut cached,
                &canvases,
                thing,
                0.0,
                0.0,
                1.0,
                self.settings.unitsize,
                PatternClip::unbounded(),
            );
            RenderMode::Cached(cached)
        } else {
            RenderMode::Live
        };
        thing.sprite = Some(ThingSprite::composite(
            render,
            canvases,
            footprint_pixels(thing),
        ));
    }

    /// Draws a Thing onto `target` at its screen position, culled against the screen.
    /// Returns whether anything was drawn.
    pub fn draw_thing_on_context(
        &mut self,
        target: &mut Canvas,
        thing: &mut Thing,
    ) -> Result<bool, DrawError> {
        let cull = self.viewport.screen_bounds();
        self.draw_thing_at(target, thing, 0.0, 0.0, &cull)
    }

    /// Draws a Thing into a Quadrant's canvas at its position relative to the Quadrant,
    /// culled against the Quadrant's box.
    pub fn draw_thing_on_quadrant(
        &mut self,
        quadrant: &mut Quadrant,
        thing: &mut Thing,
    ) -> Result<bool, DrawError> {
        let (bounds, _, canvas) = quadrant.redraw_parts();
        let bounds = *bounds;
        self.draw_thing_at(canvas, thing, bounds.left(), bounds.top(), &bounds)
    }

    /// Full redraw: background, then every Thing of every group in group order.
    pub fn refill_global_canvas(
        &mut self,
        things: &mut ThingStore,
    ) -> Result<RefillStats, DrawError> {
        self.frames_drawn += 1;
        if self.frames_drawn % u64::from(self.settings.framerate_skip) != 0 {
            return Ok(RefillStats::skipped());
        }

        let mut primary = std::mem::replace(&mut self.canvas, Canvas::new(0, 0));
        let result = self.paint_global(&mut primary, things);
        self.canvas = primary;
        result
    }

    /// Frame-skipped dirty-rectangle refill across every Quadrant row.
    pub fn refill_quadrant_groups(
        &mut self,
        keeper: &mut QuadsKeeper,
        things: &mut ThingStore,
    ) -> Result<RefillStats, DrawError> {
        self.frames_drawn += 1;
        if self.frames_drawn % u64::from(self.settings.framerate_skip) != 0 {
            return Ok(RefillStats::skipped());
        }
        self.refill_quadrants(keeper, things)
    }

    /// Repaints every changed, on-screen Quadrant and copies it over its area of the primary
    /// canvas. Unchanged or off-screen Quadrants are left alone.
    pub fn refill_quadrants(
        &mut self,
        keeper: &mut QuadsKeeper,
        things: &mut ThingStore,
    ) -> Result<RefillStats, DrawError> {
        let mut stats = RefillStats::default();
        let order: Vec<_> = keeper
            .rows()
            .iter()
            .flat_map(|row| row.quadrants().iter().copied())
            .collect();
        let width = self.viewport.width();
        let height = self.viewport.height();

        for id in order {
            let Some(quadrant) = keeper.quadrant_mut(id) else {
                continue;
            };
            let on_screen = quadrant.top() < height
                && quadrant.right() > 0.0
                && quadrant.bottom() > 0.0
                && quadrant.left() < width;
            if !quadrant.changed || !on_screen {
                continue;
            }
            stats.things_drawn += self.refill_quadrant(quadrant, things)?;
            stats.quadrants_redrawn += 1;
            let (left, top) = (quadrant.left(), quadrant.top());
            let source = quadrant.canvas();
            // copy, not blend: transparent quadrant pixels clear what was there
            self.canvas
                .clear_rect(left, top, source.width() as f64, source.height() as f64);
            self.canvas.draw_image(source, left, top);
        }
        Ok(stats)
    }

    /// Repaints one Quadrant's canvas: background region, then member Things back to front by
    /// group. Clears the Quadrant's changed flag and returns how many Things were drawn.
    pub fn refill_quadrant(
        &mut self,
        quadrant: &mut Quadrant,
        things: &mut ThingStore,
    ) -> Result<usize, DrawError> {
        let (bounds, groups, canvas) = quadrant.redraw_parts();
        let bounds = *bounds;
        let width = canvas.width() as f64;
        let height = canvas.height() as f64;

        canvas.clear_rect(0.0, 0.0, width, height);
        if !self.settings.no_refill {
            canvas.draw_image_region(
                &self.background,
                bounds.left(),
                bounds.top(),
                width,
                height,
                0.0,
                0.0,
                width,
                height,
            );
        }

        let mut drawn = 0;
        for group in groups {
            for id in group.things() {
                let Some(thing) = things.get_mut(*id) else {
                    continue;
                };
                if self.draw_thing_at(canvas, thing, bounds.left(), bounds.top(), &bounds)? {
                    drawn += 1;
                }
            }
        }
        quadrant.changed = false;
        Ok(drawn)
    }

    fn paint_global(
        &mut self,
        primary: &mut Canvas,
        things: &mut ThingStore,
    ) -> Result<RefillStats, DrawError> {
        if !self.settings.no_refill {
            let width = primary.width() as f64;
            let height = primary.height() as f64;
            primary.clear_rect(0.0, 0.0, width, height);
            primary.draw_image(&self.background, 0.0, 0.0);
        }

        let cull = self.viewport.screen_bounds();
        let mut stats = RefillStats::default();
        for group in things.groups_mut() {
            for thing in group.things_mut() {
                if self.draw_thing_at(primary, thing, 0.0, 0.0, &cull)? {
                    stats.things_drawn += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Shared draw path. `origin_left`/`origin_top` is the target canvas's position on screen;
    /// `cull` is the screen rectangle the target covers.
    fn draw_thing_at(
        &mut self,
        target: &mut Canvas,
        thing: &mut Thing,
        origin_left: f64,
        origin_top: f64,
        cull: &Bounds,
    ) -> Result<bool, DrawError> {
        if thing.hidden
            || thing.opacity < self.settings.epsilon
            || thing.width() < 1.0
            || thing.height() < 1.0
        {
            return Ok(false);
        }
        let top = get_top(thing);
        let left = get_left(thing);
        if top > cull.bottom()
            || get_right(thing) < cull.left()
            || get_bottom(thing) < cull.top()
            || left > cull.right()
        {
            return Ok(false);
        }

        if let Some(sprite) = &thing.sprite {
            if sprite.footprint() != footprint_pixels(thing) {
                debug!(thing = thing.title(), "thing_sprite_resized");
                thing.sprite = None;
            }
        }
        if thing.sprite.is_none() {
            self.set_thing_sprite(thing)?;
        }
        let Some(sprite) = thing.sprite.as_ref() else {
            return Ok(false);
        };

        let left = left - origin_left;
        let top = top - origin_top;
        let clip = PatternClip {
            right: self.viewport.width() - origin_left,
            bottom: self.viewport.height() - origin_top,
        };
        match sprite.render() {
            RenderMode::Cached(canvas) => draw_single(target, canvas, thing, left, top, clip),
            RenderMode::Live => {
                let Some(canvases) = sprite.canvases() else {
                    return Ok(false);
                };
                draw_multiple(
                    target,
                    canvases,
                    thing,
                    left,
                    top,
                    thing.opacity,
                    self.settings.unitsize,
                    clip,
                );
            }
        }
        Ok(true)
    }

    fn raster_canvas(&self, width: u32, height: u32, pixels: &[u8]) -> Canvas {
        let mut canvas = self.canvas_factory.create_canvas(width, height);
        let mut image = canvas.get_image_data();
        self.decoder.memcpy_u8(pixels, image.data_mut());
        canvas.put_image_data(&image, 0, 0);
        canvas
    }
}

fn footprint_width(thing: &Thing) -> f64 {
    thing.bounds().right() - thing.bounds().left()
}

fn footprint_height(thing: &Thing) -> f64 {
    thing.bounds().bottom() - thing.bounds().top()
}

fn footprint_pixels(thing: &Thing) -> (u32, u32) {
    (
        pixel_length(footprint_width(thing)),
        pixel_length(footprint_height(thing)),
    )
}

fn pixel_length(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

fn draw_single(
    target: &mut Canvas,
    canvas: &Canvas,
    thing: &Thing,
    left: f64,
    top: f64,
    clip: PatternClip,
) {
    if thing.repeat {
        draw_pattern(
            target,
            canvas,
            left,
            top,
            footprint_width(thing),
            footprint_height(thing),
            thing.opacity,
            clip,
        );
        return;
    }

    let translucent = thing.opacity != 1.0;
    if translucent {
        target.set_global_alpha(thing.opacity);
    }
    if thing.scale == 1.0 {
        target.draw_image(canvas, left, top);
    } else {
        target.draw_image_scaled(
            canvas,
            left,
            top,
            canvas.width() as f64 * thing.scale,
            canvas.height() as f64 * thing.scale,
        );
    }
    if translucent {
        target.set_global_alpha(1.0);
    }
}

/// Assembles a composite from its part canvases. Edges and corners tile at native resolution;
/// the middle tiles too unless the layout asks for it to stretch. Missing parts are skipped.
#[allow(clippy::too_many_arguments)]
fn draw_multiple(
    target: &mut Canvas,
    canvases: &SpriteCanvases,
    thing: &Thing,
    left: f64,
    top: f64,
    opacity: f32,
    unitsize: f64,
    clip: PatternClip,
) {
    let layout = canvases.layout();
    let tile_width = thing.sprite_width_pixels() as f64;
    let tile_height = thing.sprite_height_pixels() as f64;
    let band = |size: Option<f64>, tile: f64| size.map_or(tile, |units| units * unitsize);

    let mut area_top = top;
    let mut area_left = left;
    let mut area_right = left + footprint_width(thing);
    let mut area_bottom = top + footprint_height(thing);

    let pattern = |target: &mut Canvas, part: SpritePart, x: f64, y: f64, w: f64, h: f64| {
        if let Some(source) = canvases.part(part) {
            draw_pattern(target, source, x, y, w, h, opacity, clip);
        }
    };

    match canvases.direction() {
        SpriteDirection::Vertical => {
            if canvases.part(SpritePart::Bottom).is_some() {
                let size = band(layout.bottom_height, tile_height).min(area_bottom - area_top);
                pattern(
                    target,
                    SpritePart::Bottom,
                    area_left,
                    area_bottom - size,
                    area_right - area_left,
                    size,
                );
                area_bottom -= size;
            }
            if canvases.part(SpritePart::Top).is_some() {
                let size = band(layout.top_height, tile_height).min(area_bottom - area_top);
                pattern(
                    target,
                    SpritePart::Top,
                    area_left,
                    area_top,
                    area_right - area_left,
                    size,
                );
                area_top += size;
            }
        }
        SpriteDirection::Horizontal => {
            if canvases.part(SpritePart::Left).is_some() {
                let size = band(layout.left_width, tile_width).min(area_right - area_left);
                pattern(
                    target,
                    SpritePart::Left,
                    area_left,
                    area_top,
                    size,
                    area_bottom - area_top,
                );
                area_left += size;
            }
            if canvases.part(SpritePart::Right).is_some() {
                let size = band(layout.right_width, tile_width).min(area_right - area_left);
                pattern(
                    target,
                    SpritePart::Right,
                    area_right - size,
                    area_top,
                    size,
                    area_bottom - area_top,
                );
                area_right -= size;
            }
        }
        SpriteDirection::Corners => {
            let top_band = band(layout.top_height, tile_height);
            let bottom_band = band(layout.bottom_height, tile_height);
            let left_band = band(layout.left_width, tile_width);
            let right_band = band(layout.right_width, tile_width);
            let inner_height = (area_bottom - area_top - top_band - bottom_band).max(0.0);
            let inner_width = (area_right - area_left - left_band - right_band).max(0.0);

            pattern(target, SpritePart::TopLeft, area_left, area_top, left_band, top_band);
            pattern(
                target,
                SpritePart::Left,
                area_left,
                area_top + top_band,
                left_band,
                inner_height,
            );
            pattern(
                target,
                SpritePart::BottomLeft,
                area_left,
                area_bottom - bottom_band,
                left_band,
                bottom_band,
            );
            pattern(
                target,
                SpritePart::Top,
                area_left + left_band,
                area_top,
                inner_width,
                top_band,
            );
            pattern(
                target,
                SpritePart::TopRight,
                area_right - right_band,
                area_top,
                right_band,
                top_band,
            );
            pattern(
                target,
                SpritePart::Right,
                area_right - right_band,
                area_top + top_band,
                right_band,
                inner_height,
            );
            pattern(
                target,
                SpritePart::BottomRight,
                area_right - right_band,
                area_bottom - bottom_band,
                right_band,
                bottom_band,
            );
            pattern(
                target,
                SpritePart::Bottom,
                area_left + left_band,
                area_bottom - bottom_band,
                inner_width,
                bottom_band,
            );

            area_top += top_band;
            area_bottom -= bottom_band;
            area_left += left_band;
            area_right -= right_band;
        }
    }

    let Some(middle) = canvases.part(SpritePart::Middle) else {
        return;
    };
    if area_top >= area_bottom || area_left >= area_right {
        return;
    }
    if layout.middle_stretch {
        target.set_global_alpha(opacity);
        target.draw_image_scaled(
            middle,
            area_left,
            area_top,
            area_right - area_left,
            area_bottom - area_top,
        );
        target.set_global_alpha(1.0);
    } else {
        draw_pattern(
            target,
            middle,
            area_left,
            area_top,
            area_right - area_left,
            area_bottom - area_top,
            opacity,
            clip,
        );
    }
}

/// Tiles `source` over a rectangle, clipped to the clip edges. The translation is always undone
/// and global alpha reset to 1, even when nothing is filled.
#[allow(clippy::too_many_arguments)]
fn draw_pattern(
    target: &mut Canvas,
    source: &Canvas,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    opacity: f32,
    clip: PatternClip,
) {
    target.set_global_alpha(opacity);
    target.translate(left, top);
    target.fill_rect_pattern(
        source,
        0.0,
        0.0,
        width.min(clip.right - left),
        height.min(clip.bottom - top),
    );
    target.translate(-left, -top);
    target.set_global_alpha(1.0);
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;
    use crate::canvas::TRANSPARENT;
    use crate::quadrants::QuadsKeeperSettings;
    use crate::sprites::{PixelBuffer, SpriteLayout};

    const RED: Rgba = [255, 0, 0, 255];
    const GREEN: Rgba = [0, 255, 0, 255];
    const BLUE: Rgba = [0, 0, 255, 255];
    const WHITE: Rgba = [255, 255, 255, 255];
    const BLACK: Rgba = [0, 0, 0, 255];

    struct StubDecoder {
        sprites: HashMap<String, DecodedSprite>,
        calls: Rc<Cell<usize>>,
    }

    impl SpriteDecoder for StubDecoder {
        fn decode(&mut self, key: &str, _thing: &Thing) -> Result<DecodedSprite, SpriteError> {
            self.calls.set(self.calls.get() + 1);
            self.sprites
                .get(key)
                .cloned()
                .ok_or_else(|| SpriteError::UnknownSprite {
                    key: key.to_string(),
                })
        }
    }

    fn solid(width: u32, height: u32, color: Rgba) -> PixelBuffer {
        color.repeat((width * height) as usize)
    }

    fn compositor_with(
        settings: CompositorSettings,
        width: f64,
        height: f64,
        sprites: Vec<(&str, DecodedSprite)>,
    ) -> (Compositor, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let decoder = StubDecoder {
            sprites: sprites
                .into_iter()
                .map(|(key, sprite)| (key.to_string(), sprite))
                .collect(),
            calls: Rc::clone(&calls),
        };
        let compositor = Compositor::new(settings, Viewport::new(width, height), Box::new(decoder))
            .expect("compositor");
        (compositor, calls)
    }

    fn column(canvas: &Canvas, x: u32) -> Vec<Rgba> {
        (0..canvas.height())
            .map(|y| canvas.pixel(x, y).expect("pixel in range"))
            .collect()
    }

    fn row(canvas: &Canvas, y: u32) -> Vec<Rgba> {
        (0..canvas.width())
            .map(|x| canvas.pixel(x, y).expect("pixel in range"))
            .collect()
    }

    fn index_all(keeper: &mut QuadsKeeper, store: &mut ThingStore) {
        for group in store.groups_mut() {
            let name = group.name().to_string();
            keeper
                .determine_all_quadrants(&name, group.things_mut())
                .expect("index");
        }
    }

    #[test]
    fn zero_framerate_skip_is_rejected() {
        let settings = CompositorSettings {
            framerate_skip: 0,
            ..CompositorSettings::default()
        };
        let decoder = StubDecoder {
            sprites: HashMap::new(),
            calls: Rc::default(),
        };
        assert!(matches!(
            Compositor::new(settings, Viewport::new(4.0, 4.0), Box::new(decoder)),
            Err(DrawError::ZeroFramerateSkip)
        ));
    }

    #[test]
    fn vertical_composite_middle_fills_what_the_edges_leave() {
        let sprite = SpriteMultiple::with_direction(SpriteDirection::Vertical)
            .with_layout(SpriteLayout {
                top_height: Some(4.0),
                bottom_height: Some(4.0),
                ..SpriteLayout::default()
            })
            .with_part(SpritePart::Top, solid(4, 4, RED))
            .with_part(SpritePart::Bottom, solid(4, 4, BLUE))
            .with_part(SpritePart::Middle, solid(4, 4, GREEN));
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            8.0,
            24.0,
            vec![("Pillar", DecodedSprite::Multiple(sprite))],
        );
        let mut thing = Thing::new("Pillar", "Solid", 4.0, 20.0).with_sprite_size(4.0, 4.0);
        let mut target = Canvas::new(8, 24);

        assert!(compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("draw"));

        let pixels = column(&target, 0);
        assert!(pixels[0..4].iter().all(|pixel| *pixel == RED));
        assert!(pixels[4..16].iter().all(|pixel| *pixel == GREEN));
        assert!(pixels[16..20].iter().all(|pixel| *pixel == BLUE));
        assert!(pixels[20..].iter().all(|pixel| *pixel == TRANSPARENT));
        assert_eq!(pixels.iter().filter(|pixel| **pixel == GREEN).count(), 12);
        assert_eq!(target.global_alpha(), 1.0);
        assert_eq!(target.translation(), (0.0, 0.0));
    }

    #[test]
    fn horizontal_composite_tolerates_missing_edges() {
        let sprite = SpriteMultiple::with_direction(SpriteDirection::Horizontal)
            .with_part(SpritePart::Left, solid(2, 1, RED))
            .with_part(SpritePart::Middle, solid(2, 1, GREEN));
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            8.0,
            1.0,
            vec![("Fence", DecodedSprite::Multiple(sprite))],
        );
        let mut thing = Thing::new("Fence", "Solid", 8.0, 1.0).with_sprite_size(2.0, 1.0);
        let mut target = Canvas::new(8, 1);

        compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("draw");

        assert_eq!(target.pixel(0, 0), Some(RED));
        assert_eq!(target.pixel(1, 0), Some(RED));
        assert_eq!(target.pixel(2, 0), Some(GREEN));
        assert_eq!(target.pixel(7, 0), Some(GREEN));
    }

    #[test]
    fn corners_composite_places_each_part() {
        let sprite = SpriteMultiple::with_direction(SpriteDirection::Corners)
            .with_part(SpritePart::TopLeft, solid(2, 2, RED))
            .with_part(SpritePart::TopRight, solid(2, 2, GREEN))
            .with_part(SpritePart::BottomLeft, solid(2, 2, BLUE))
            .with_part(SpritePart::BottomRight, solid(2, 2, WHITE))
            .with_part(SpritePart::Top, solid(2, 2, BLACK))
            .with_part(SpritePart::Middle, solid(2, 2, [9, 9, 9, 255]));
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            6.0,
            6.0,
            vec![("Frame", DecodedSprite::Multiple(sprite))],
        );
        let mut thing = Thing::new("Frame", "Solid", 6.0, 6.0).with_sprite_size(2.0, 2.0);
        let mut target = Canvas::new(6, 6);

        compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("draw");

        assert_eq!(target.pixel(0, 0), Some(RED));
        assert_eq!(target.pixel(5, 0), Some(GREEN));
        assert_eq!(target.pixel(0, 5), Some(BLUE));
        assert_eq!(target.pixel(5, 5), Some(WHITE));
        assert_eq!(target.pixel(3, 1), Some(BLACK));
        assert_eq!(target.pixel(3, 3), Some([9, 9, 9, 255]));
        // no left edge part
        assert_eq!(target.pixel(0, 3), Some(TRANSPARENT));
    }

    #[test]
    fn stretched_middle_scales_one_tile_across_the_band() {
        let banner = |middle_stretch| {
            SpriteMultiple::with_direction(SpriteDirection::Horizontal)
                .with_layout(SpriteLayout {
                    middle_stretch,
                    ..SpriteLayout::default()
                })
                .with_part(SpritePart::Middle, [RED, BLUE].concat())
        };
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            6.0,
            1.0,
            vec![
                ("Tiled", DecodedSprite::Multiple(banner(false))),
                ("Stretched", DecodedSprite::Multiple(banner(true))),
            ],
        );
        let mut tiled = Thing::new("Tiled", "Scenery", 6.0, 1.0).with_sprite_size(2.0, 1.0);
        let mut stretched =
            Thing::new("Stretched", "Scenery", 6.0, 1.0).with_sprite_size(2.0, 1.0);
        let mut tiled_target = Canvas::new(6, 1);
        let mut stretched_target = Canvas::new(6, 1);

        compositor
            .draw_thing_on_context(&mut tiled_target, &mut tiled)
            .expect("tiled");
        compositor
            .draw_thing_on_context(&mut stretched_target, &mut stretched)
            .expect("stretched");

        assert_eq!(row(&tiled_target, 0), vec![RED, BLUE, RED, BLUE, RED, BLUE]);
        assert_eq!(row(&stretched_target, 0), vec![RED, RED, RED, BLUE, BLUE, BLUE]);
        assert_eq!(stretched_target.global_alpha(), 1.0);
    }

    #[test]
    fn resized_composites_are_rasterized_again() {
        let sprite = SpriteMultiple::with_direction(SpriteDirection::Vertical)
            .with_part(SpritePart::Middle, solid(1, 1, GREEN));
        let (mut compositor, calls) = compositor_with(
            CompositorSettings {
                sprite_cache_cutoff: 100.0,
                ..CompositorSettings::default()
            },
            8.0,
            8.0,
            vec![("Moss", DecodedSprite::Multiple(sprite))],
        );
        let mut thing = Thing::new("Moss", "Scenery", 2.0, 2.0).with_sprite_size(1.0, 1.0);
        let mut target = Canvas::new(8, 8);
        compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("first draw");
        assert_eq!(thing.sprite().map(ThingSprite::footprint), Some((2, 2)));

        crate::geometry::set_size(&mut thing, 4.0, 3.0);
        compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("draw after resize");

        assert_eq!(calls.get(), 2);
        let cached = thing
            .sprite()
            .and_then(ThingSprite::cached_canvas)
            .expect("cached composite");
        assert_eq!((cached.width(), cached.height()), (4, 3));
        assert_eq!(target.pixel(3, 2), Some(GREEN));
        assert_eq!(target.pixel(4, 2), Some(TRANSPARENT));
    }

    #[test]
    fn nearly_invisible_things_cost_no_canvas_work() {
        let (mut compositor, calls) = compositor_with(
            CompositorSettings::default(),
            8.0,
            8.0,
            vec![("Ghost", DecodedSprite::Single(solid(1, 1, WHITE)))],
        );
        let mut thing = Thing::new("Ghost", "Character", 1.0, 1.0).with_opacity(0.001);
        let mut target = Canvas::new(8, 8);

        assert!(!compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("draw"));

        assert_eq!(target.draw_operations(), 0);
        assert_eq!(calls.get(), 0);
        assert!(thing.sprite().is_none());
    }

    #[test]
    fn hidden_and_off_screen_things_are_skipped() {
        let (mut compositor, calls) = compositor_with(
            CompositorSettings::default(),
            8.0,
            8.0,
            vec![("Rock", DecodedSprite::Single(solid(1, 1, WHITE)))],
        );
        let mut hidden = Thing::new("Rock", "Solid", 1.0, 1.0);
        hidden.hidden = true;
        let mut far = Thing::new("Rock", "Solid", 1.0, 1.0).at(20.0, 2.0);
        let mut flat = Thing::new("Rock", "Solid", 0.5, 1.0);
        let mut target = Canvas::new(8, 8);

        for thing in [&mut hidden, &mut far, &mut flat] {
            assert!(!compositor
                .draw_thing_on_context(&mut target, thing)
                .expect("draw"));
        }
        assert_eq!(calls.get(), 0);
        assert_eq!(target.draw_operations(), 0);
    }

    #[test]
    fn composite_cache_depends_on_cutoff() {
        let sprite = SpriteMultiple::with_direction(SpriteDirection::Vertical)
            .with_part(SpritePart::Middle, solid(2, 2, GREEN));
        let (mut compositor, _) = compositor_with(
            CompositorSettings {
                sprite_cache_cutoff: 50.0,
                ..CompositorSettings::default()
            },
            64.0,
            64.0,
            vec![
                ("Small", DecodedSprite::Multiple(sprite.clone())),
                ("Large", DecodedSprite::Multiple(sprite)),
            ],
        );
        let mut small = Thing::new("Small", "Solid", 7.0, 7.0).with_unitsize(2.0);
        let mut large = Thing::new("Large", "Solid", 3.0, 17.0).with_unitsize(2.0);

        compositor.set_thing_sprite(&mut small).expect("small");
        compositor.set_thing_sprite(&mut large).expect("large");

        let small_sprite = small.sprite().expect("small sprite");
        assert_eq!(small_sprite.num_sprites(), 0);
        let cached = small_sprite.cached_canvas().expect("cached composite");
        assert_eq!((cached.width(), cached.height()), (14, 14));

        let large_sprite = large.sprite().expect("large sprite");
        assert_eq!(large_sprite.num_sprites(), 0);
        assert!(matches!(large_sprite.render(), RenderMode::Live));
        assert!(large_sprite.canvases().is_some());
    }

    #[test]
    fn single_sprites_are_cached_once() {
        let (mut compositor, calls) = compositor_with(
            CompositorSettings::default(),
            4.0,
            4.0,
            vec![("Coin", DecodedSprite::Single(solid(1, 1, GREEN)))],
        );
        let mut thing = Thing::new("Coin", "Item", 1.0, 1.0).at(1.0, 1.0);
        let mut target = Canvas::new(4, 4);

        compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("first draw");
        compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("second draw");

        assert_eq!(calls.get(), 1);
        assert_eq!(thing.sprite().map(ThingSprite::num_sprites), Some(1));
        assert_eq!(target.pixel(1, 1), Some(GREEN));

        thing.add_class("shiny");
        assert!(thing.sprite().is_none());
    }

    #[test]
    fn repeating_patterns_stop_at_the_screen_edge() {
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            10.0,
            1.0,
            vec![("Road", DecodedSprite::Single(solid(1, 1, BLUE)))],
        );
        let mut thing = Thing::new("Road", "Scenery", 10.0, 1.0)
            .with_sprite_size(1.0, 1.0)
            .at(6.0, 0.0)
            .repeating();
        let mut target = Canvas::new(20, 1);

        compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("draw");

        assert_eq!(target.pixel(5, 0), Some(TRANSPARENT));
        assert_eq!(target.pixel(6, 0), Some(BLUE));
        assert_eq!(target.pixel(9, 0), Some(BLUE));
        assert_eq!(target.pixel(10, 0), Some(TRANSPARENT));
        assert_eq!(target.translation(), (0.0, 0.0));
    }

    #[test]
    fn opacity_is_restored_after_a_blit() {
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            1.0,
            1.0,
            vec![("Glass", DecodedSprite::Single(solid(1, 1, RED)))],
        );
        let mut thing = Thing::new("Glass", "Solid", 1.0, 1.0).with_opacity(0.5);
        let mut target = Canvas::new(1, 1);
        target.fill_rect(BLACK, 0.0, 0.0, 1.0, 1.0);

        compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("draw");

        assert_eq!(target.pixel(0, 0), Some([128, 0, 0, 255]));
        assert_eq!(target.global_alpha(), 1.0);
    }

    #[test]
    fn offsets_move_the_drawing_not_the_box() {
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            4.0,
            6.0,
            vec![("Shadow", DecodedSprite::Single(solid(1, 1, BLACK)))],
        );
        let mut thing = Thing::new("Shadow", "Scenery", 1.0, 1.0);
        thing.offset_x = 2.0;
        thing.offset_y = 3.0;
        let mut target = Canvas::new(4, 6);

        compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("draw");

        assert_eq!(get_top(&thing), 3.0);
        assert_eq!(get_bottom(&thing), 4.0);
        assert_eq!(get_left(&thing), 2.0);
        assert_eq!(get_right(&thing), 3.0);
        assert_eq!(target.pixel(2, 3), Some(BLACK));
        assert_eq!(target.pixel(0, 0), Some(TRANSPARENT));
        assert_eq!(thing.top(), 0.0);
    }

    #[test]
    fn scale_stretches_single_blits() {
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            4.0,
            4.0,
            vec![("Balloon", DecodedSprite::Single(solid(1, 1, RED)))],
        );
        let mut thing = Thing::new("Balloon", "Item", 1.0, 1.0);
        thing.scale = 2.0;
        let mut target = Canvas::new(4, 4);

        compositor
            .draw_thing_on_context(&mut target, &mut thing)
            .expect("draw");

        assert_eq!(target.pixel(1, 1), Some(RED));
        assert_eq!(target.pixel(2, 2), Some(TRANSPARENT));
    }

    #[test]
    fn unknown_sprites_draw_nothing() {
        let (mut compositor, calls) =
            compositor_with(CompositorSettings::default(), 4.0, 4.0, Vec::new());
        let mut thing = Thing::new("Mystery", "Item", 1.0, 1.0);
        let mut target = Canvas::new(4, 4);

        for _ in 0..2 {
            assert!(!compositor
                .draw_thing_on_context(&mut target, &mut thing)
                .expect("missing sprites are not errors"));
        }
        assert_eq!(calls.get(), 2);
        assert_eq!(target.draw_operations(), 0);
    }

    #[test]
    fn custom_keys_select_the_sprite() {
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            2.0,
            2.0,
            vec![("door-open", DecodedSprite::Single(solid(1, 1, GREEN)))],
        );
        compositor.set_generate_object_key(|thing| format!("door-{}", thing.classes().join("-")));
        let mut thing = Thing::new("Door", "Solid", 1.0, 1.0).with_class("open");

        compositor.set_thing_sprite(&mut thing).expect("sprite");
        assert!(thing.sprite().is_some());
    }

    #[test]
    fn framerate_skip_draws_every_nth_refill() {
        let (mut compositor, _) = compositor_with(
            CompositorSettings {
                framerate_skip: 2,
                ..CompositorSettings::default()
            },
            2.0,
            2.0,
            vec![("Dot", DecodedSprite::Single(solid(1, 1, RED)))],
        );
        let mut store = ThingStore::new(&["Solid"]);
        store
            .add(Thing::new("Dot", "Solid", 1.0, 1.0))
            .expect("dot");

        let first = compositor.refill_global_canvas(&mut store).expect("first");
        assert!(first.skipped_frame);
        assert_eq!(compositor.canvas().pixel(0, 0), Some(TRANSPARENT));

        let second = compositor.refill_global_canvas(&mut store).expect("second");
        assert!(!second.skipped_frame);
        assert_eq!(second.things_drawn, 1);
        assert_eq!(compositor.canvas().pixel(0, 0), Some(RED));
        assert_eq!(compositor.frames_drawn(), 2);
    }

    #[test]
    fn later_groups_draw_on_top() {
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            2.0,
            2.0,
            vec![
                ("Floor", DecodedSprite::Single(solid(2, 2, BLUE))),
                ("Hero", DecodedSprite::Single(solid(1, 1, RED))),
            ],
        );
        compositor.set_background(WHITE);
        let mut store = ThingStore::new(&["Scenery", "Character"]);
        store
            .add(Thing::new("Hero", "Character", 1.0, 1.0))
            .expect("hero");
        store
            .add(Thing::new("Floor", "Scenery", 2.0, 2.0))
            .expect("floor");

        compositor.refill_global_canvas(&mut store).expect("refill");

        assert_eq!(compositor.canvas().pixel(0, 0), Some(RED));
        assert_eq!(compositor.canvas().pixel(1, 1), Some(BLUE));
    }

    #[test]
    fn no_refill_keeps_the_background_out_of_both_paths() {
        let (mut compositor, _) = compositor_with(
            CompositorSettings {
                no_refill: true,
                ..CompositorSettings::default()
            },
            8.0,
            8.0,
            vec![("Dot", DecodedSprite::Single(solid(1, 1, RED)))],
        );
        compositor.set_background(WHITE);
        let mut keeper =
            QuadsKeeper::new(QuadsKeeperSettings::new(2, 2, 4.0, 4.0, &["Solid"])).expect("keeper");
        keeper.reset_quadrants();
        let mut store = ThingStore::new(&["Solid"]);
        store
            .add(Thing::new("Dot", "Solid", 1.0, 1.0).at(1.0, 1.0))
            .expect("dot");
        index_all(&mut keeper, &mut store);

        compositor.refill_global_canvas(&mut store).expect("global");
        assert_eq!(compositor.canvas().pixel(1, 1), Some(RED));
        assert_eq!(compositor.canvas().pixel(6, 6), Some(TRANSPARENT));

        let stats = compositor
            .refill_quadrants(&mut keeper, &mut store)
            .expect("quadrants");
        assert_eq!(stats.quadrants_redrawn, 4);
        assert_eq!(compositor.canvas().pixel(1, 1), Some(RED));
        assert_eq!(compositor.canvas().pixel(6, 6), Some(TRANSPARENT));
        assert_eq!(compositor.background().pixel(6, 6), Some(WHITE));
    }

    #[test]
    fn quadrant_refill_only_repaints_changed_quadrants() {
        let (mut compositor, _) = compositor_with(
            CompositorSettings::default(),
            8.0,
            8.0,
            vec![("Block", DecodedSprite::Single(solid(2, 2, RED)))],
        );
        compositor.set_background(WHITE);
        let mut keeper =
            QuadsKeeper::new(QuadsKeeperSettings::new(2, 2, 4.0, 4.0, &["Solid"])).expect("keeper");
        keeper.reset_quadrants();
        let mut store = ThingStore::new(&["Solid"]);
        store
            .add(Thing::new("Block", "Solid", 2.0, 2.0).at(1.0, 1.0))
            .expect("block");
        index_all(&mut keeper, &mut store);

        let first = compositor
            .refill_quadrants(&mut keeper, &mut store)
            .expect("first refill");
        assert_eq!(first.quadrants_redrawn, 4);
        assert_eq!(first.things_drawn, 1);
        assert_eq!(compositor.canvas().pixel(1, 1), Some(RED));
        assert_eq!(compositor.canvas().pixel(6, 6), Some(WHITE));

        let second = compositor
            .refill_quadrants(&mut keeper, &mut store)
            .expect("second refill");
        assert_eq!(second, RefillStats::default());
    }
}
