use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::Viewport;
use crate::canvas::Canvas;
use crate::drawing::{Compositor, DrawError, RefillStats};
use crate::geometry::{shift_horiz, shift_vert};
use crate::quadrants::{QuadsError, QuadsKeeper};
use crate::things::{Thing, ThingId, ThingStore, ThingStoreError};

/// Which refill the frame driver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPath {
    /// Dirty-rectangle redraw of changed Quadrants only.
    #[default]
    Quadrants,
    /// Naive full redraw of every Thing.
    Global,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Quadrants(#[from] QuadsError),
    #[error(transparent)]
    Draw(#[from] DrawError),
    #[error(transparent)]
    Things(#[from] ThingStoreError),
}

/// Frame driver owning the Things, the Quadrant grid, and the compositor.
///
/// Call order each frame is fixed: movement and scrolling first, then [`Stage::tick`] re-indexes
/// every group and refills the primary canvas.
#[derive(Debug)]
pub struct Stage {
    things: ThingStore,
    quadrants: QuadsKeeper,
    compositor: Compositor,
    render_path: RenderPath,
    ticks: u64,
}

impl Stage {
    /// Builds the Thing groups from the grid's group names and resets the grid, which fires the
    /// grid's `on_add` callback for the initial box.
    pub fn new(mut quadrants: QuadsKeeper, compositor: Compositor) -> Self {
        let things = ThingStore::new(quadrants.group_names());
        quadrants.reset_quadrants();
        info!(
            rows = quadrants.num_rows(),
            cols = quadrants.num_cols(),
            groups = quadrants.group_names().len(),
            width = compositor.viewport().width(),
            height = compositor.viewport().height(),
            "stage_ready"
        );
        Self {
            things,
            quadrants,
            compositor,
            render_path: RenderPath::default(),
            ticks: 0,
        }
    }

    pub fn with_render_path(mut self, render_path: RenderPath) -> Self {
        self.render_path = render_path;
        self
    }

    pub fn render_path(&self) -> RenderPath {
        self.render_path
    }

    /// Switching paths invalidates every Quadrant so the next quadrant refill covers the screen.
    pub fn set_render_path(&mut self, render_path: RenderPath) {
        self.render_path = render_path;
        self.quadrants.mark_all_changed();
    }

    pub fn things(&self) -> &ThingStore {
        &self.things
    }

    pub fn things_mut(&mut self) -> &mut ThingStore {
        &mut self.things
    }

    pub fn quadrants(&self) -> &QuadsKeeper {
        &self.quadrants
    }

    pub fn quadrants_mut(&mut self) -> &mut QuadsKeeper {
        &mut self.quadrants
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }

    pub fn viewport(&self) -> &Viewport {
        self.compositor.viewport()
    }

    /// The primary canvas as of the last refill.
    pub fn canvas(&self) -> &Canvas {
        self.compositor.canvas()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Registers a Thing and indexes it right away.
    pub fn spawn(&mut self, thing: Thing) -> Result<ThingId, StageError> {
        let id = self.things.add(thing)?;
        let thing = self
            .things
            .get_mut(id)
            .ok_or(ThingStoreError::UnknownThing(id))?;
        self.quadrants.determine_thing_quadrants(thing)?;
        Ok(id)
    }

    pub fn kill(&mut self, id: ThingId) -> Result<Thing, StageError> {
        Ok(self.things.kill(id, &mut self.quadrants)?)
    }

    /// Moves a Thing's box and marks it changed; the index catches up on the next tick.
    pub fn move_thing(&mut self, id: ThingId, dx: f64, dy: f64) -> Result<(), StageError> {
        let thing = self
            .things
            .get_mut(id)
            .ok_or(ThingStoreError::UnknownThing(id))?;
        shift_horiz(thing, dx);
        shift_vert(thing, dy);
        thing.changed = true;
        Ok(())
    }

    /// Re-indexes one Thing right away instead of waiting for the next tick, so collision
    /// lookups see its new Quadrants.
    pub fn reindex_thing(&mut self, id: ThingId) -> Result<(), StageError> {
        let thing = self
            .things
            .get_mut(id)
            .ok_or(ThingStoreError::UnknownThing(id))?;
        self.quadrants.determine_thing_quadrants(thing)?;
        Ok(())
    }

    /// Scrolls the view by `(dx, dy)` whole pixels: every Thing and the grid move the other way
    /// and every Quadrant is repainted on the next tick.
    pub fn scroll(&mut self, dx: f64, dy: f64) -> Result<(), StageError> {
        let dx = dx.trunc();
        let dy = dy.trunc();
        if dx == 0.0 && dy == 0.0 {
            return Ok(());
        }
        for thing in self.things.iter_mut() {
            shift_horiz(thing, -dx);
            shift_vert(thing, -dy);
            thing.changed = true;
        }
        self.quadrants.shift_quadrants(-dx, -dy)?;
        self.quadrants.mark_all_changed();

        let mut viewport = *self.compositor.viewport();
        viewport.shift(dx, dy);
        self.compositor.set_viewport(viewport);
        debug!(dx, dy, left = viewport.left(), top = viewport.top(), "stage_scrolled");
        Ok(())
    }

    /// Resizes the screen, keeping the world's top-left corner. A size change leaves the
    /// primary canvas blank, so every Quadrant is repainted on the next tick.
    pub fn resize(&mut self, width: f64, height: f64) {
        let mut viewport = *self.compositor.viewport();
        viewport.resize(width, height);
        if self.compositor.set_viewport(viewport) {
            self.quadrants.mark_all_changed();
        }
    }

    /// Re-indexes every group, then refills the primary canvas along the current render path.
    pub fn tick(&mut self) -> Result<RefillStats, StageError> {
        for group in self.things.groups_mut() {
            let name = group.name().to_string();
            self.quadrants
                .determine_all_quadrants(&name, group.things_mut())?;
        }

        let stats = match self.render_path {
            RenderPath::Quadrants => self
                .compositor
                .refill_quadrant_groups(&mut self.quadrants, &mut self.things)?,
            RenderPath::Global => self.compositor.refill_global_canvas(&mut self.things)?,
        };
        self.ticks += 1;
        Ok(stats)
    }
}
