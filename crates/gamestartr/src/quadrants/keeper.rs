use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;

use thiserror::Error;
use tracing::debug;

use super::quadrant::{Quadrant, QuadrantCol, QuadrantId, QuadrantRow};
use crate::canvas::{CanvasFactory, SoftwareCanvasFactory};
use crate::geometry::{Bounds, Positionable};
use crate::things::{Thing, ThingId};

/// Which way the grid grew or shrank when a row or column boundary was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeDirection {
    XInc,
    XDec,
    YInc,
    YDec,
}

impl EdgeDirection {
    pub fn name(self) -> &'static str {
        match self {
            EdgeDirection::XInc => "xInc",
            EdgeDirection::XDec => "xDec",
            EdgeDirection::YInc => "yInc",
            EdgeDirection::YDec => "yDec",
        }
    }
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives the world rectangle that was exposed (`on_add`) or hidden (`on_remove`).
pub type BoundaryCallback = Box<dyn FnMut(EdgeDirection, &Bounds)>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuadsError {
    #[error("quadrant grid needs at least one row and one column, got {rows}x{cols}")]
    EmptyGrid { rows: usize, cols: usize },
    #[error("quadrant size must be positive, got {width}x{height}")]
    InvalidQuadrantSize { width: f64, height: f64 },
    #[error("at least one group name is required")]
    NoGroups,
    #[error("group name '{0}' is listed more than once")]
    DuplicateGroup(String),
    #[error("group '{0}' is not tracked by the quadrant grid")]
    UnknownGroup(String),
    #[error("thing has not been added to a thing store")]
    UnregisteredThing,
    #[error("quadrant {0:?} does not exist")]
    UnknownQuadrant(QuadrantId),
    #[error("quadrants have not been built; call reset_quadrants first")]
    NotInitialized,
}

pub struct QuadsKeeperSettings {
    pub num_rows: usize,
    pub num_cols: usize,
    pub quadrant_width: f64,
    pub quadrant_height: f64,
    /// Partition keys every Quadrant tracks, in draw order.
    pub group_names: Vec<String>,
    pub start_left: f64,
    pub start_top: f64,
    pub on_add: Option<BoundaryCallback>,
    pub on_remove: Option<BoundaryCallback>,
}

impl QuadsKeeperSettings {
    pub fn new<S: AsRef<str>>(
        num_rows: usize,
        num_cols: usize,
        quadrant_width: f64,
        quadrant_height: f64,
        group_names: &[S],
    ) -> Self {
        Self {
            num_rows,
            num_cols,
            quadrant_width,
            quadrant_height,
            group_names: group_names
                .iter()
                .map(|name| name.as_ref().to_string())
                .collect(),
            start_left: 0.0,
            start_top: 0.0,
            on_add: None,
            on_remove: None,
        }
    }

    pub fn with_start(mut self, left: f64, top: f64) -> Self {
        self.start_left = left;
        self.start_top = top;
        self
    }

    pub fn on_add(mut self, callback: impl FnMut(EdgeDirection, &Bounds) + 'static) -> Self {
        self.on_add = Some(Box::new(callback));
        self
    }

    pub fn on_remove(mut self, callback: impl FnMut(EdgeDirection, &Bounds) + 'static) -> Self {
        self.on_remove = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for QuadsKeeperSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuadsKeeperSettings")
            .field("num_rows", &self.num_rows)
            .field("num_cols", &self.num_cols)
            .field("quadrant_width", &self.quadrant_width)
            .field("quadrant_height", &self.quadrant_height)
            .field("group_names", &self.group_names)
            .field("start_left", &self.start_left)
            .field("start_top", &self.start_top)
            .field("on_add", &self.on_add.is_some())
            .field("on_remove", &self.on_remove.is_some())
            .finish()
    }
}

/// Scrolling grid of Quadrants covering the viewport.
///
/// Rows and columns index the same Quadrants: every Quadrant appears in exactly one row and one
/// column, at matching positions. Scrolling past a full cell evicts the trailing row or column
/// and creates a fresh leading one, so the grid always holds `num_rows * num_cols` Quadrants.
pub struct QuadsKeeper {
    num_rows: usize,
    num_cols: usize,
    quadrant_width: f64,
    quadrant_height: f64,
    group_names: Vec<String>,
    start_left: f64,
    start_top: f64,
    top: f64,
    right: f64,
    bottom: f64,
    left: f64,
    offset_x: f64,
    offset_y: f64,
    rows: Vec<QuadrantRow>,
    cols: Vec<QuadrantCol>,
    quadrants: HashMap<QuadrantId, Quadrant>,
    next_quadrant_id: u64,
    canvas_factory: Box<dyn CanvasFactory>,
    on_add: Option<BoundaryCallback>,
    on_remove: Option<BoundaryCallback>,
}

impl fmt::Debug for QuadsKeeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuadsKeeper")
            .field("num_rows", &self.num_rows)
            .field("num_cols", &self.num_cols)
            .field("bounds", &(self.top, self.right, self.bottom, self.left))
            .field("offset", &(self.offset_x, self.offset_y))
            .field("quadrant_count", &self.quadrants.len())
            .finish_non_exhaustive()
    }
}

impl QuadsKeeper {
    pub fn new(settings: QuadsKeeperSettings) -> Result<Self, QuadsError> {
        Self::with_canvas_factory(settings, Box::new(SoftwareCanvasFactory))
    }

    pub fn with_canvas_factory(
        settings: QuadsKeeperSettings,
        canvas_factory: Box<dyn CanvasFactory>,
    ) -> Result<Self, QuadsError> {
        validate_settings(&settings)?;
        Ok(Self {
            num_rows: settings.num_rows,
            num_cols: settings.num_cols,
            quadrant_width: settings.quadrant_width,
            quadrant_height: settings.quadrant_height,
            group_names: settings.group_names,
            start_left: settings.start_left,
            start_top: settings.start_top,
            top: settings.start_top,
            right: settings.start_left,
            bottom: settings.start_top,
            left: settings.start_left,
            offset_x: 0.0,
            offset_y: 0.0,
            rows: Vec::new(),
            cols: Vec::new(),
            quadrants: HashMap::new(),
            next_quadrant_id: 0,
            canvas_factory,
            on_add: settings.on_add,
            on_remove: settings.on_remove,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn quadrant_width(&self) -> f64 {
        self.quadrant_width
    }

    pub fn quadrant_height(&self) -> f64 {
        self.quadrant_height
    }

    pub fn group_names(&self) -> &[String] {
        &self.group_names
    }

    pub fn start_left(&self) -> f64 {
        self.start_left
    }

    pub fn start_top(&self) -> f64 {
        self.start_top
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn offset_x(&self) -> f64 {
        self.offset_x
    }

    pub fn offset_y(&self) -> f64 {
        self.offset_y
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_pixels(
            self.left,
            self.top,
            self.right - self.left,
            self.bottom - self.top,
        )
    }

    pub fn rows(&self) -> &[QuadrantRow] {
        &self.rows
    }

    pub fn cols(&self) -> &[QuadrantCol] {
        &self.cols
    }

    pub fn quadrant_count(&self) -> usize {
        self.quadrants.len()
    }

    pub fn quadrant(&self, id: QuadrantId) -> Option<&Quadrant> {
        self.quadrants.get(&id)
    }

    pub fn quadrant_mut(&mut self, id: QuadrantId) -> Option<&mut Quadrant> {
        self.quadrants.get_mut(&id)
    }

    pub fn quadrant_at(&self, row: usize, col: usize) -> Option<&Quadrant> {
        let id = *self.rows.get(row)?.quadrants.get(col)?;
        self.quadrants.get(&id)
    }

    pub fn quadrants(&self) -> impl Iterator<Item = &Quadrant> + '_ {
        self.quadrants.values()
    }

    pub fn quadrants_mut(&mut self) -> impl Iterator<Item = &mut Quadrant> + '_ {
        self.quadrants.values_mut()
    }

    /// Rebuilds the whole grid at the configured origin. Fires `on_add` once for the full box.
    pub fn reset_quadrants(&mut self) {
        self.quadrants.clear();
        self.rows.clear();
        self.cols.clear();
        self.offset_x = 0.0;
        self.offset_y = 0.0;
        self.left = self.start_left;
        self.top = self.start_top;
        self.right = self.start_left + self.quadrant_width * self.num_cols as f64;
        self.bottom = self.start_top + self.quadrant_height * self.num_rows as f64;

        for row in 0..self.num_rows {
            self.rows.push(QuadrantRow {
                left: self.start_left,
                top: self.start_top + self.quadrant_height * row as f64,
                quadrants: Vec::with_capacity(self.num_cols),
            });
        }
        for col in 0..self.num_cols {
            self.cols.push(QuadrantCol {
                left: self.start_left + self.quadrant_width * col as f64,
                top: self.start_top,
                quadrants: Vec::with_capacity(self.num_rows),
            });
        }
        for row in 0..self.num_rows {
            for col in 0..self.num_cols {
                let id = self.create_quadrant(self.cols[col].left, self.rows[row].top);
                self.rows[row].quadrants.push(id);
                self.cols[col].quadrants.push(id);
            }
        }

        debug!(
            rows = self.num_rows,
            cols = self.num_cols,
            left = self.left,
            top = self.top,
            "quadrants_reset"
        );
        let bounds = self.bounds();
        self.fire_add(EdgeDirection::XInc, &bounds);
    }

    /// Moves every Quadrant and the grid by whole pixels (fractions truncate toward zero), then
    /// recycles rows and columns that drifted a full cell.
    pub fn shift_quadrants(&mut self, dx: f64, dy: f64) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        let dx = dx.trunc();
        let dy = dy.trunc();

        self.offset_x += dx;
        self.offset_y += dy;
        self.top += dy;
        self.right += dx;
        self.bottom += dy;
        self.left += dx;
        for row in &mut self.rows {
            row.left += dx;
            row.top += dy;
        }
        for col in &mut self.cols {
            col.left += dx;
            col.top += dy;
        }
        for quadrant in self.quadrants.values_mut() {
            quadrant.shift(dx, dy);
        }

        self.adjust_offsets()
    }

    /// Evicts and recreates one row or column per full cell of accumulated drift.
    pub fn adjust_offsets(&mut self) -> Result<(), QuadsError> {
        while self.offset_x < -self.quadrant_width {
            self.shift_quadrant_col(true)?;
            self.push_quadrant_col(true)?;
            self.offset_x += self.quadrant_width;
        }
        while self.offset_x > self.quadrant_width {
            self.pop_quadrant_col(true)?;
            self.unshift_quadrant_col(true)?;
            self.offset_x -= self.quadrant_width;
        }
        while self.offset_y < -self.quadrant_height {
            self.shift_quadrant_row(true)?;
            self.push_quadrant_row(true)?;
            self.offset_y += self.quadrant_height;
        }
        while self.offset_y > self.quadrant_height {
            self.pop_quadrant_row(true)?;
            self.unshift_quadrant_row(true)?;
            self.offset_y -= self.quadrant_height;
        }
        Ok(())
    }

    /// Appends a row below the grid.
    pub fn push_quadrant_row(&mut self, call_update: bool) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        let top = self.bottom;
        let mut row = QuadrantRow {
            left: self.left,
            top,
            quadrants: Vec::with_capacity(self.cols.len()),
        };
        for col in 0..self.cols.len() {
            let id = self.create_quadrant(self.cols[col].left, top);
            row.quadrants.push(id);
            self.cols[col].quadrants.push(id);
        }
        self.rows.push(row);
        self.bottom += self.quadrant_height;

        debug!(top, "quadrant_row_pushed");
        if call_update {
            let exposed = self.row_rect(top);
            self.fire_add(EdgeDirection::YInc, &exposed);
        }
        Ok(())
    }

    /// Removes the bottom row.
    pub fn pop_quadrant_row(&mut self, call_update: bool) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        let Some(row) = self.rows.pop() else {
            return Ok(());
        };
        for col in &mut self.cols {
            col.quadrants.pop();
        }
        self.drop_quadrants(&row.quadrants);
        self.bottom -= self.quadrant_height;

        debug!(top = row.top, "quadrant_row_popped");
        if call_update {
            let hidden = self.row_rect(row.top);
            self.fire_remove(EdgeDirection::YDec, &hidden);
        }
        Ok(())
    }

    /// Prepends a row above the grid.
    pub fn unshift_quadrant_row(&mut self, call_update: bool) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        let top = self.top - self.quadrant_height;
        let mut row = QuadrantRow {
            left: self.left,
            top,
            quadrants: Vec::with_capacity(self.cols.len()),
        };
        for col in 0..self.cols.len() {
            let id = self.create_quadrant(self.cols[col].left, top);
            row.quadrants.push(id);
            self.cols[col].quadrants.insert(0, id);
            self.cols[col].top = top;
        }
        self.rows.insert(0, row);
        self.top = top;

        debug!(top, "quadrant_row_unshifted");
        if call_update {
            let exposed = self.row_rect(top);
            self.fire_add(EdgeDirection::YDec, &exposed);
        }
        Ok(())
    }

    /// Removes the top row.
    pub fn shift_quadrant_row(&mut self, call_update: bool) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        if self.rows.is_empty() {
            return Ok(());
        }
        let row = self.rows.remove(0);
        self.top += self.quadrant_height;
        for col in &mut self.cols {
            if !col.quadrants.is_empty() {
                col.quadrants.remove(0);
            }
            col.top = self.top;
        }
        self.drop_quadrants(&row.quadrants);

        debug!(top = row.top, "quadrant_row_shifted");
        if call_update {
            let hidden = self.row_rect(row.top);
            self.fire_remove(EdgeDirection::YInc, &hidden);
        }
        Ok(())
    }

    /// Appends a column right of the grid.
    pub fn push_quadrant_col(&mut self, call_update: bool) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        let left = self.right;
        let mut col = QuadrantCol {
            left,
            top: self.top,
            quadrants: Vec::with_capacity(self.rows.len()),
        };
        for row in 0..self.rows.len() {
            let id = self.create_quadrant(left, self.rows[row].top);
            col.quadrants.push(id);
            self.rows[row].quadrants.push(id);
        }
        self.cols.push(col);
        self.right += self.quadrant_width;

        debug!(left, "quadrant_col_pushed");
        if call_update {
            let exposed = self.col_rect(left);
            self.fire_add(EdgeDirection::XInc, &exposed);
        }
        Ok(())
    }

    /// Removes the rightmost column.
    pub fn pop_quadrant_col(&mut self, call_update: bool) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        let Some(col) = self.cols.pop() else {
            return Ok(());
        };
        for row in &mut self.rows {
            row.quadrants.pop();
        }
        self.drop_quadrants(&col.quadrants);
        self.right -= self.quadrant_width;

        debug!(left = col.left, "quadrant_col_popped");
        if call_update {
            let hidden = self.col_rect(col.left);
            self.fire_remove(EdgeDirection::XDec, &hidden);
        }
        Ok(())
    }

    /// Prepends a column left of the grid.
    pub fn unshift_quadrant_col(&mut self, call_update: bool) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        let left = self.left - self.quadrant_width;
        let mut col = QuadrantCol {
            left,
            top: self.top,
            quadrants: Vec::with_capacity(self.rows.len()),
        };
        for row in 0..self.rows.len() {
            let id = self.create_quadrant(left, self.rows[row].top);
            col.quadrants.push(id);
            self.rows[row].quadrants.insert(0, id);
            self.rows[row].left = left;
        }
        self.cols.insert(0, col);
        self.left = left;

        debug!(left, "quadrant_col_unshifted");
        if call_update {
            let exposed = self.col_rect(left);
            self.fire_add(EdgeDirection::XDec, &exposed);
        }
        Ok(())
    }

    /// Removes the leftmost column.
    pub fn shift_quadrant_col(&mut self, call_update: bool) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        if self.cols.is_empty() {
            return Ok(());
        }
        let col = self.cols.remove(0);
        self.left += self.quadrant_width;
        for row in &mut self.rows {
            if !row.quadrants.is_empty() {
                row.quadrants.remove(0);
            }
            row.left = self.left;
        }
        self.drop_quadrants(&col.quadrants);

        debug!(left = col.left, "quadrant_col_shifted");
        if call_update {
            let hidden = self.col_rect(col.left);
            self.fire_remove(EdgeDirection::XInc, &hidden);
        }
        Ok(())
    }

    /// Empties `group` on every Quadrant, then re-indexes each Thing in `things`.
    pub fn determine_all_quadrants(
        &mut self,
        group: &str,
        things: &mut [Thing],
    ) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        self.ensure_group(group)?;
        for quadrant in self.quadrants.values_mut() {
            quadrant.clear_group(group);
        }
        for thing in things {
            self.determine_thing_quadrants(thing)?;
        }
        Ok(())
    }

    /// Recomputes which Quadrants `thing` overlaps.
    ///
    /// A changed Thing first marks its previous Quadrants changed so the area it left is
    /// redrawn; afterwards the Thing is no longer changed. Edges exactly on a cell boundary
    /// belong to both cells, and Things outside the grid end up in no Quadrant.
    pub fn determine_thing_quadrants(&mut self, thing: &mut Thing) -> Result<(), QuadsError> {
        self.ensure_initialized()?;
        let id = thing.id().ok_or(QuadsError::UnregisteredThing)?;
        let group = thing.group().to_string();
        self.ensure_group(&group)?;

        if thing.changed {
            self.mark_thing_quadrants_changed(thing);
        }
        for previous in std::mem::take(&mut thing.quadrants) {
            if let Some(quadrant) = self.quadrants.get_mut(&previous) {
                quadrant.remove_thing(&group, id);
            }
        }

        if let Some((rows, cols)) = self.cell_range(thing) {
            for row in rows {
                for col in cols.clone() {
                    let quadrant = self.rows[row].quadrants[col];
                    self.set_thing_in_quadrant(thing, quadrant, &group)?;
                }
            }
        }
        thing.changed = false;
        Ok(())
    }

    /// Registers `thing` with `quadrant` in both directions; a changed Thing marks the Quadrant
    /// changed.
    pub fn set_thing_in_quadrant(
        &mut self,
        thing: &mut Thing,
        quadrant: QuadrantId,
        group: &str,
    ) -> Result<(), QuadsError> {
        let id = thing.id().ok_or(QuadsError::UnregisteredThing)?;
        let target = self
            .quadrants
            .get_mut(&quadrant)
            .ok_or(QuadsError::UnknownQuadrant(quadrant))?;
        if !target.add_thing(group, id) {
            return Err(QuadsError::UnknownGroup(group.to_string()));
        }
        if thing.changed {
            target.changed = true;
        }
        if !thing.quadrants.contains(&quadrant) {
            thing.quadrants.push(quadrant);
        }
        Ok(())
    }

    pub fn mark_thing_quadrants_changed(&mut self, thing: &Thing) {
        for id in thing.quadrants() {
            if let Some(quadrant) = self.quadrants.get_mut(id) {
                quadrant.changed = true;
            }
        }
    }

    pub fn mark_all_changed(&mut self) {
        for quadrant in self.quadrants.values_mut() {
            quadrant.changed = true;
        }
    }

    /// Detaches `thing` from every Quadrant, marking them changed.
    pub fn remove_thing(&mut self, thing: &mut Thing) {
        self.mark_thing_quadrants_changed(thing);
        let Some(id) = thing.id() else {
            thing.quadrants.clear();
            return;
        };
        for quadrant in std::mem::take(&mut thing.quadrants) {
            if let Some(quadrant) = self.quadrants.get_mut(&quadrant) {
                quadrant.remove_thing(thing.group(), id);
            }
        }
    }

    /// Broad-phase lookup: distinct Things of `group` sharing at least one Quadrant with
    /// `thing`, excluding `thing` itself.
    pub fn things_sharing_quadrants(&self, thing: &Thing, group: &str) -> Vec<ThingId> {
        let mut found = Vec::new();
        for id in thing.quadrants() {
            let Some(quadrant) = self.quadrants.get(id) else {
                continue;
            };
            for other in quadrant.things(group) {
                if Some(*other) != thing.id() && !found.contains(other) {
                    found.push(*other);
                }
            }
        }
        found
    }

    fn cell_range(
        &self,
        thing: &Thing,
    ) -> Option<(RangeInclusive<usize>, RangeInclusive<usize>)> {
        if self.rows.is_empty() || self.cols.is_empty() {
            return None;
        }
        let bounds = thing.bounds();
        let top = bounds.top() + thing.tolerance_y;
        let bottom = bounds.bottom() - thing.tolerance_y;
        let left = bounds.left() + thing.tolerance_x;
        let right = bounds.right() - thing.tolerance_x;

        let row_start = ((top - self.top) / self.quadrant_height).floor().max(0.0);
        let row_end = ((bottom - self.top) / self.quadrant_height)
            .floor()
            .min((self.rows.len() - 1) as f64);
        let col_start = ((left - self.left) / self.quadrant_width).floor().max(0.0);
        let col_end = ((right - self.left) / self.quadrant_width)
            .floor()
            .min((self.cols.len() - 1) as f64);

        if !(row_start <= row_end && col_start <= col_end) {
            return None;
        }
        Some((
            row_start as usize..=row_end as usize,
            col_start as usize..=col_end as usize,
        ))
    }

    fn create_quadrant(&mut self, left: f64, top: f64) -> QuadrantId {
        self.next_quadrant_id += 1;
        let id = QuadrantId(self.next_quadrant_id);
        let canvas = self.canvas_factory.create_canvas(
            canvas_dimension(self.quadrant_width),
            canvas_dimension(self.quadrant_height),
        );
        let bounds = Bounds::from_pixels(left, top, self.quadrant_width, self.quadrant_height);
        self.quadrants
            .insert(id, Quadrant::new(id, bounds, canvas, &self.group_names));
        id
    }

    fn drop_quadrants(&mut self, ids: &[QuadrantId]) {
        for id in ids {
            self.quadrants.remove(id);
        }
    }

    fn row_rect(&self, top: f64) -> Bounds {
        Bounds::from_pixels(self.left, top, self.right - self.left, self.quadrant_height)
    }

    fn col_rect(&self, left: f64) -> Bounds {
        Bounds::from_pixels(left, self.top, self.quadrant_width, self.bottom - self.top)
    }

    fn fire_add(&mut self, direction: EdgeDirection, bounds: &Bounds) {
        if let Some(callback) = self.on_add.as_mut() {
            callback(direction, bounds);
        }
    }

    fn fire_remove(&mut self, direction: EdgeDirection, bounds: &Bounds) {
        if let Some(callback) = self.on_remove.as_mut() {
            callback(direction, bounds);
        }
    }

    fn ensure_initialized(&self) -> Result<(), QuadsError> {
        if self.rows.is_empty() {
            return Err(QuadsError::NotInitialized);
        }
        Ok(())
    }

    fn ensure_group(&self, group: &str) -> Result<(), QuadsError> {
        if self.group_names.iter().any(|name| name == group) {
            Ok(())
        } else {
            Err(QuadsError::UnknownGroup(group.to_string()))
        }
    }
}

fn canvas_dimension(value: f64) -> u32 {
    value.ceil() as u32
}

fn validate_settings(settings: &QuadsKeeperSettings) -> Result<(), QuadsError> {
    if settings.num_rows == 0 || settings.num_cols == 0 {
        return Err(QuadsError::EmptyGrid {
            rows: settings.num_rows,
            cols: settings.num_cols,
        });
    }
    if !(settings.quadrant_width > 0.0 && settings.quadrant_height > 0.0)
        || !settings.quadrant_width.is_finite()
        || !settings.quadrant_height.is_finite()
    {
        return Err(QuadsError::InvalidQuadrantSize {
            width: settings.quadrant_width,
            height: settings.quadrant_height,
        });
    }
    if settings.group_names.is_empty() {
        return Err(QuadsError::NoGroups);
    }
    for (index, name) in settings.group_names.iter().enumerate() {
        if settings.group_names[..index].contains(name) {
            return Err(QuadsError::DuplicateGroup(name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::canvas::Canvas;
    use crate::things::ThingStore;

    type EventLog = Rc<RefCell<Vec<(EdgeDirection, Bounds)>>>;

    fn grid(rows: usize, cols: usize) -> (QuadsKeeper, EventLog, EventLog) {
        let added: EventLog = Rc::default();
        let removed: EventLog = Rc::default();
        let add_log = Rc::clone(&added);
        let remove_log = Rc::clone(&removed);
        let settings = QuadsKeeperSettings::new(rows, cols, 200.0, 200.0, &["Scenery", "Solid"])
            .on_add(move |direction, bounds| add_log.borrow_mut().push((direction, *bounds)))
            .on_remove(move |direction, bounds| {
                remove_log.borrow_mut().push((direction, *bounds))
            });
        let mut keeper = QuadsKeeper::new(settings).expect("keeper");
        keeper.reset_quadrants();
        (keeper, added, removed)
    }

    fn registered(store: &mut ThingStore, thing: Thing) -> ThingId {
        store.add(thing).expect("add thing")
    }

    fn assert_indices_consistent(keeper: &QuadsKeeper) {
        assert_eq!(keeper.rows().len(), keeper.num_rows());
        assert_eq!(keeper.cols().len(), keeper.num_cols());
        assert_eq!(keeper.quadrant_count(), keeper.num_rows() * keeper.num_cols());
        for (r, row) in keeper.rows().iter().enumerate() {
            assert_eq!(row.quadrants().len(), keeper.num_cols());
            for (c, id) in row.quadrants().iter().enumerate() {
                assert_eq!(keeper.cols()[c].quadrants()[r], *id);
                let quadrant = keeper.quadrant(*id).expect("indexed quadrant exists");
                assert_eq!(quadrant.left(), keeper.cols()[c].left());
                assert_eq!(quadrant.top(), row.top());
            }
        }
    }

    #[test]
    fn settings_are_validated() {
        let empty = QuadsKeeperSettings::new(0, 3, 10.0, 10.0, &["Solid"]);
        assert!(matches!(
            QuadsKeeper::new(empty),
            Err(QuadsError::EmptyGrid { rows: 0, cols: 3 })
        ));
        let flat = QuadsKeeperSettings::new(2, 2, 0.0, 10.0, &["Solid"]);
        assert!(matches!(
            QuadsKeeper::new(flat),
            Err(QuadsError::InvalidQuadrantSize { .. })
        ));
        let twice = QuadsKeeperSettings::new(2, 2, 10.0, 10.0, &["Solid", "Solid"]);
        assert!(matches!(
            QuadsKeeper::new(twice),
            Err(QuadsError::DuplicateGroup(name)) if name == "Solid"
        ));
        let none = QuadsKeeperSettings::new(2, 2, 10.0, 10.0, &[] as &[&str]);
        assert!(matches!(QuadsKeeper::new(none), Err(QuadsError::NoGroups)));
    }

    #[test]
    fn operations_before_reset_report_not_initialized() {
        let settings = QuadsKeeperSettings::new(2, 2, 10.0, 10.0, &["Solid"]);
        let mut keeper = QuadsKeeper::new(settings).expect("keeper");
        assert_eq!(keeper.shift_quadrants(5.0, 0.0), Err(QuadsError::NotInitialized));
        assert_eq!(keeper.push_quadrant_row(true), Err(QuadsError::NotInitialized));
    }

    #[test]
    fn reset_builds_grid_and_reports_whole_box() {
        let (keeper, added, removed) = grid(2, 3);
        assert_indices_consistent(&keeper);
        assert_eq!(keeper.bounds(), Bounds::from_pixels(0.0, 0.0, 600.0, 400.0));

        let added = added.borrow();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].0, EdgeDirection::XInc);
        assert_eq!(added[0].1, keeper.bounds());
        assert!(removed.borrow().is_empty());
        assert!(keeper.quadrants().all(|quadrant| quadrant.changed));
        assert!(keeper
            .quadrants()
            .all(|quadrant| quadrant.canvas().width() == 200 && quadrant.canvas().height() == 200));
    }

    #[test]
    fn scrolling_past_one_column_recycles_exactly_once() {
        let (mut keeper, added, removed) = grid(3, 3);
        added.borrow_mut().clear();
        let original: Vec<QuadrantId> = keeper.cols()[1].quadrants().to_vec();

        keeper.shift_quadrants(-250.0, 0.0).expect("shift");

        assert_eq!(keeper.offset_x(), -50.0);
        assert_eq!(keeper.left(), -50.0);
        assert_eq!(keeper.right(), 550.0);
        assert_indices_consistent(&keeper);
        assert_eq!(keeper.cols()[0].quadrants(), original.as_slice());

        let removed = removed.borrow();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, EdgeDirection::XInc);
        assert_eq!(removed[0].1, Bounds::from_pixels(-250.0, 0.0, 200.0, 600.0));

        let added = added.borrow();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].0, EdgeDirection::XInc);
        assert_eq!(added[0].1, Bounds::from_pixels(350.0, 0.0, 200.0, 600.0));
    }

    #[test]
    fn large_jumps_recycle_once_per_cell() {
        let (mut keeper, added, removed) = grid(2, 2);
        added.borrow_mut().clear();

        keeper.shift_quadrants(0.0, 650.0).expect("shift");

        assert_eq!(keeper.offset_y(), 50.0);
        assert_eq!(removed.borrow().len(), 3);
        assert!(removed
            .borrow()
            .iter()
            .all(|(direction, _)| *direction == EdgeDirection::YDec));
        assert_eq!(added.borrow().len(), 3);
        assert!(added
            .borrow()
            .iter()
            .all(|(direction, _)| *direction == EdgeDirection::YDec));
        assert_indices_consistent(&keeper);
        assert_eq!(keeper.top(), 50.0);
        assert_eq!(keeper.bottom(), 450.0);
    }

    #[test]
    fn fractional_shifts_truncate_toward_zero() {
        let (mut keeper, _, _) = grid(2, 2);
        keeper.shift_quadrants(-3.9, 2.7).expect("shift");
        assert_eq!(keeper.offset_x(), -3.0);
        assert_eq!(keeper.offset_y(), 2.0);
        assert_eq!(keeper.left(), -3.0);
    }

    #[test]
    fn quadrant_ids_are_never_reused() {
        let (mut keeper, _, _) = grid(2, 2);
        let before: Vec<QuadrantId> = keeper.quadrants().map(Quadrant::id).collect();
        keeper.shift_quadrants(-201.0, 0.0).expect("shift");
        let created: Vec<QuadrantId> = keeper.cols()[1].quadrants().to_vec();
        assert!(created.iter().all(|id| !before.contains(id)));
    }

    #[test]
    fn each_recycled_quadrant_allocates_one_canvas() {
        struct CountingFactory(Rc<Cell<usize>>);
        impl CanvasFactory for CountingFactory {
            fn create_canvas(&self, width: u32, height: u32) -> Canvas {
                self.0.set(self.0.get() + 1);
                Canvas::new(width, height)
            }
        }

        let created = Rc::new(Cell::new(0));
        let settings = QuadsKeeperSettings::new(2, 3, 50.0, 50.0, &["Solid"]);
        let mut keeper = QuadsKeeper::with_canvas_factory(
            settings,
            Box::new(CountingFactory(Rc::clone(&created))),
        )
        .expect("keeper");
        keeper.reset_quadrants();
        assert_eq!(created.get(), 6);
        keeper.shift_quadrants(0.0, -60.0).expect("shift");
        assert_eq!(created.get(), 9);
    }

    #[test]
    fn boundary_edges_belong_to_both_quadrants() {
        let (mut keeper, _, _) = grid(2, 2);
        let mut store = ThingStore::new(&["Scenery", "Solid"]);
        let id = registered(&mut store, Thing::new("Block", "Solid", 10.0, 10.0).at(190.0, 50.0));
        let thing = store.get_mut(id).expect("block");

        keeper.determine_thing_quadrants(thing).expect("index");

        assert_eq!(thing.num_quadrants(), 2);
        for quadrant in thing.quadrants() {
            let quadrant = keeper.quadrant(*quadrant).expect("quadrant");
            assert!(quadrant.contains(id));
            assert_eq!(quadrant.things("Solid"), &[id]);
        }
        assert!(!thing.changed);
    }

    #[test]
    fn tolerance_shrinks_the_indexed_box() {
        let (mut keeper, _, _) = grid(2, 2);
        let mut store = ThingStore::new(&["Scenery", "Solid"]);
        let thing = Thing::new("Block", "Solid", 20.0, 20.0)
            .at(195.0, 50.0)
            .with_tolerance(6.0, 0.0);
        let id = registered(&mut store, thing);
        let thing = store.get_mut(id).expect("block");

        keeper.determine_thing_quadrants(thing).expect("index");

        assert_eq!(thing.quadrants(), &keeper.rows()[0].quadrants()[1..2]);
    }

    #[test]
    fn reindexing_an_unmoved_thing_is_idempotent() {
        let (mut keeper, _, _) = grid(3, 3);
        let mut store = ThingStore::new(&["Scenery", "Solid"]);
        let id = registered(&mut store, Thing::new("Wall", "Solid", 300.0, 50.0).at(100.0, 180.0));
        let thing = store.get_mut(id).expect("wall");

        keeper.determine_thing_quadrants(thing).expect("first");
        let first = thing.quadrants().to_vec();
        keeper.determine_thing_quadrants(thing).expect("second");

        assert_eq!(thing.quadrants(), first.as_slice());
        assert_eq!(first.len(), 6);
        let listed = keeper
            .quadrants()
            .filter(|quadrant| quadrant.contains(id))
            .count();
        assert_eq!(listed, first.len());
        assert!(keeper
            .quadrants()
            .all(|quadrant| quadrant.num_things("Solid") <= 1));
    }

    #[test]
    fn moving_a_thing_leaves_its_old_quadrants_dirty_and_empty() {
        let (mut keeper, _, _) = grid(2, 2);
        let mut store = ThingStore::new(&["Scenery", "Solid"]);
        let id = registered(&mut store, Thing::new("Box", "Solid", 10.0, 10.0).at(20.0, 20.0));
        let thing = store.get_mut(id).expect("box");
        keeper.determine_thing_quadrants(thing).expect("index");
        let old = thing.quadrants()[0];
        for quadrant in keeper.quadrants_mut() {
            quadrant.changed = false;
        }

        crate::geometry::shift_horiz(thing, 300.0);
        thing.changed = true;
        keeper.determine_thing_quadrants(thing).expect("reindex");

        let old_quadrant = keeper.quadrant(old).expect("old quadrant");
        assert!(old_quadrant.changed);
        assert!(!old_quadrant.contains(id));
        let new = thing.quadrants()[0];
        assert_ne!(new, old);
        assert!(keeper.quadrant(new).expect("new quadrant").changed);
    }

    #[test]
    fn things_outside_the_grid_get_no_quadrants() {
        let (mut keeper, _, _) = grid(2, 2);
        let mut store = ThingStore::new(&["Scenery", "Solid"]);
        let id = registered(&mut store, Thing::new("Far", "Solid", 10.0, 10.0).at(900.0, -300.0));
        let thing = store.get_mut(id).expect("far");

        keeper.determine_thing_quadrants(thing).expect("index");

        assert_eq!(thing.num_quadrants(), 0);
        assert!(keeper.quadrants().all(|quadrant| !quadrant.contains(id)));
    }

    #[test]
    fn determine_all_rebuilds_one_group() {
        let (mut keeper, _, _) = grid(2, 2);
        let mut store = ThingStore::new(&["Scenery", "Solid"]);
        registered(&mut store, Thing::new("Grass", "Scenery", 400.0, 400.0));
        registered(&mut store, Thing::new("Rock", "Solid", 10.0, 10.0).at(250.0, 250.0));

        for group in store.groups_mut() {
            let name = group.name().to_string();
            keeper
                .determine_all_quadrants(&name, group.things_mut())
                .expect("index group");
        }

        assert!(keeper
            .quadrants()
            .all(|quadrant| quadrant.num_things("Scenery") == 1));
        assert_eq!(
            keeper
                .quadrants()
                .filter(|quadrant| quadrant.num_things("Solid") == 1)
                .count(),
            1
        );
        let mut empty: [Thing; 0] = [];
        assert_eq!(
            keeper.determine_all_quadrants("Water", &mut empty),
            Err(QuadsError::UnknownGroup("Water".to_string()))
        );
    }

    #[test]
    fn unregistered_things_are_rejected() {
        let (mut keeper, _, _) = grid(2, 2);
        let mut loose = Thing::new("Loose", "Solid", 1.0, 1.0);
        assert_eq!(
            keeper.determine_thing_quadrants(&mut loose),
            Err(QuadsError::UnregisteredThing)
        );
    }

    #[test]
    fn neighbours_are_found_through_shared_quadrants() {
        let (mut keeper, _, _) = grid(2, 2);
        let mut store = ThingStore::new(&["Scenery", "Solid"]);
        let a = registered(&mut store, Thing::new("A", "Solid", 10.0, 10.0).at(10.0, 10.0));
        let b = registered(&mut store, Thing::new("B", "Solid", 10.0, 10.0).at(150.0, 150.0));
        let c = registered(&mut store, Thing::new("C", "Solid", 10.0, 10.0).at(300.0, 300.0));
        for id in [a, b, c] {
            let thing = store.get_mut(id).expect("thing");
            keeper.determine_thing_quadrants(thing).expect("index");
        }

        let thing_a = store.get(a).expect("a");
        assert_eq!(keeper.things_sharing_quadrants(thing_a, "Solid"), vec![b]);
    }

    #[test]
    fn killing_a_thing_detaches_it_everywhere() {
        let (mut keeper, _, _) = grid(2, 2);
        let mut store = ThingStore::new(&["Scenery", "Solid"]);
        let id = registered(&mut store, Thing::new("Crate", "Solid", 20.0, 20.0).at(190.0, 190.0));
        let thing = store.get_mut(id).expect("crate");
        keeper.determine_thing_quadrants(thing).expect("index");
        assert_eq!(thing.num_quadrants(), 4);
        keeper.quadrants_mut().for_each(|quadrant| quadrant.changed = false);

        let dead = store.kill(id, &mut keeper).expect("kill");

        assert_eq!(dead.num_quadrants(), 0);
        assert!(store.get(id).is_none());
        assert!(keeper.quadrants().all(|quadrant| !quadrant.contains(id) && quadrant.changed));
    }
}
