use std::fmt;

use crate::drawing::ThingSprite;
use crate::geometry::{Bounds, Positionable};
use crate::quadrants::QuadrantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThingId(pub u64);

/// A drawable, collidable game object.
///
/// The bounding box is only reachable through [`Positionable`] and the box utilities in
/// [`crate::geometry`]. Quadrant membership is a list of non-owning [`QuadrantId`] handles
/// maintained by [`crate::quadrants::QuadsKeeper`].
#[derive(Debug)]
pub struct Thing {
    id: Option<ThingId>,
    title: String,
    classes: Vec<String>,
    group: String,
    bounds: Bounds,
    sprite_width: f64,
    sprite_height: f64,
    pub hidden: bool,
    pub opacity: f32,
    pub changed: bool,
    pub repeat: bool,
    pub scale: f64,
    /// Visual offset applied when drawing; does not move the bounding box.
    pub offset_x: f64,
    pub offset_y: f64,
    /// Shrinks the box by this many pixels per side when assigning quadrants.
    pub tolerance_x: f64,
    pub tolerance_y: f64,
    pub(crate) quadrants: Vec<QuadrantId>,
    pub(crate) sprite: Option<ThingSprite>,
}

impl Thing {
    /// New Thing at the origin. `width` and `height` are in tile units; the sprite is one tile
    /// of the same size unless overridden.
    pub fn new(title: &str, group: &str, width: f64, height: f64) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            classes: Vec::new(),
            group: group.to_string(),
            bounds: Bounds::new(0.0, 0.0, width, height, 1.0),
            sprite_width: width,
            sprite_height: height,
            hidden: false,
            opacity: 1.0,
            changed: true,
            repeat: false,
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            tolerance_x: 0.0,
            tolerance_y: 0.0,
            quadrants: Vec::new(),
            sprite: None,
        }
    }

    pub fn with_unitsize(mut self, unitsize: f64) -> Self {
        self.bounds = Bounds::new(
            self.bounds.left(),
            self.bounds.top(),
            self.bounds.width(),
            self.bounds.height(),
            unitsize,
        );
        self
    }

    pub fn at(mut self, left: f64, top: f64) -> Self {
        self.bounds.set_left(left);
        self.bounds.set_top(top);
        self
    }

    pub fn with_sprite_size(mut self, width: f64, height: f64) -> Self {
        self.sprite_width = width;
        self.sprite_height = height;
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_tolerance(mut self, tolerance_x: f64, tolerance_y: f64) -> Self {
        self.tolerance_x = tolerance_x;
        self.tolerance_y = tolerance_y;
        self
    }

    pub fn id(&self) -> Option<ThingId> {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: ThingId) {
        self.id = Some(id);
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|existing| existing == class)
    }

    /// Adds a class; the sprite is re-decoded on the next draw.
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        self.classes.push(class.to_string());
        self.invalidate_sprite();
    }

    pub fn remove_class(&mut self, class: &str) {
        let before = self.classes.len();
        self.classes.retain(|existing| existing != class);
        if self.classes.len() != before {
            self.invalidate_sprite();
        }
    }

    /// Drops the rasterized sprite so the next draw decodes it again.
    pub fn invalidate_sprite(&mut self) {
        self.sprite = None;
        self.changed = true;
    }

    pub fn sprite(&self) -> Option<&ThingSprite> {
        self.sprite.as_ref()
    }

    pub fn unitsize(&self) -> f64 {
        self.bounds.unitsize()
    }

    pub fn sprite_width(&self) -> f64 {
        self.sprite_width
    }

    pub fn sprite_height(&self) -> f64 {
        self.sprite_height
    }

    pub fn sprite_width_pixels(&self) -> u32 {
        to_pixels(self.sprite_width * self.unitsize())
    }

    pub fn sprite_height_pixels(&self) -> u32 {
        to_pixels(self.sprite_height * self.unitsize())
    }

    pub fn quadrants(&self) -> &[QuadrantId] {
        &self.quadrants
    }

    pub fn num_quadrants(&self) -> usize {
        self.quadrants.len()
    }

    pub fn top(&self) -> f64 {
        self.bounds.top()
    }

    pub fn right(&self) -> f64 {
        self.bounds.right()
    }

    pub fn bottom(&self) -> f64 {
        self.bounds.bottom()
    }

    pub fn left(&self) -> f64 {
        self.bounds.left()
    }

    pub fn width(&self) -> f64 {
        self.bounds.width()
    }

    pub fn height(&self) -> f64 {
        self.bounds.height()
    }
}

fn to_pixels(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

impl Positionable for Thing {
    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn bounds_mut(&mut self) -> &mut Bounds {
        &mut self.bounds
    }
}

/// The default sprite key: the title followed by each class, space separated.
impl fmt::Display for Thing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)?;
        for class in &self.classes {
            write!(f, " {class}")?;
        }
        Ok(())
    }
}
