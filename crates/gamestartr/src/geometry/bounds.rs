/// Axis-aligned box in screen pixels.
///
/// `width` and `height` are in tile units; `right` and `bottom` are always derived as
/// `left + width * unitsize` and `top + height * unitsize`. Fields are private so the only way to
/// move or resize a box is through the setters below, which keep that relation intact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    top: f64,
    right: f64,
    bottom: f64,
    left: f64,
    width: f64,
    height: f64,
    unitsize: f64,
}

impl Bounds {
    pub fn new(left: f64, top: f64, width: f64, height: f64, unitsize: f64) -> Self {
        Self {
            top,
            right: left + width * unitsize,
            bottom: top + height * unitsize,
            left,
            width,
            height,
            unitsize,
        }
    }

    /// Box measured directly in pixels (unitsize 1).
    pub fn from_pixels(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(left, top, width, height, 1.0)
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

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn unitsize(&self) -> f64 {
        self.unitsize
    }

    pub fn unit_width(&self) -> f64 {
        self.width * self.unitsize
    }

    pub fn unit_height(&self) -> f64 {
        self.height * self.unitsize
    }

    pub fn mid_x(&self) -> f64 {
        self.left + self.unit_width() / 2.0
    }

    pub fn mid_y(&self) -> f64 {
        self.top + self.unit_height() / 2.0
    }

    pub fn shift_horiz(&mut self, dx: f64) {
        self.left += dx;
        self.right += dx;
    }

    pub fn shift_vert(&mut self, dy: f64) {
        self.top += dy;
        self.bottom += dy;
    }

    pub fn set_top(&mut self, top: f64) {
        self.top = top;
        self.bottom = top + self.unit_height();
    }

    pub fn set_right(&mut self, right: f64) {
        self.right = right;
        self.left = right - self.unit_width();
    }

    pub fn set_bottom(&mut self, bottom: f64) {
        self.bottom = bottom;
        self.top = bottom - self.unit_height();
    }

    pub fn set_left(&mut self, left: f64) {
        self.left = left;
        self.right = left + self.unit_width();
    }

    /// Resizes around the current top-left corner.
    pub fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.right = self.left + self.unit_width();
        self.bottom = self.top + self.unit_height();
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }
}

/// Anything with a bounding box: Things, Quadrants, the quadrant grid itself.
pub trait Positionable {
    fn bounds(&self) -> &Bounds;
    fn bounds_mut(&mut self) -> &mut Bounds;
}

impl Positionable for Bounds {
    fn bounds(&self) -> &Bounds {
        self
    }

    fn bounds_mut(&mut self) -> &mut Bounds {
        self
    }
}

pub fn shift_horiz<T: Positionable + ?Sized>(entity: &mut T, dx: f64) {
    entity.bounds_mut().shift_horiz(dx);
}

pub fn shift_vert<T: Positionable + ?Sized>(entity: &mut T, dy: f64) {
    entity.bounds_mut().shift_vert(dy);
}

pub fn set_top<T: Positionable + ?Sized>(entity: &mut T, top: f64) {
    entity.bounds_mut().set_top(top);
}

pub fn set_right<T: Positionable + ?Sized>(entity: &mut T, right: f64) {
    entity.bounds_mut().set_right(right);
}

pub fn set_bottom<T: Positionable + ?Sized>(entity: &mut T, bottom: f64) {
    entity.bounds_mut().set_bottom(bottom);
}

pub fn set_left<T: Positionable + ?Sized>(entity: &mut T, left: f64) {
    entity.bounds_mut().set_left(left);
}

pub fn set_size<T: Positionable + ?Sized>(entity: &mut T, width: f64, height: f64) {
    entity.bounds_mut().set_size(width, height);
}

pub fn set_mid_x<T: Positionable + ?Sized>(entity: &mut T, x: f64) {
    let half_width = entity.bounds().unit_width() / 2.0;
    set_left(entity, x - half_width);
}

pub fn set_mid_y<T: Positionable + ?Sized>(entity: &mut T, y: f64) {
    let half_height = entity.bounds().unit_height() / 2.0;
    set_top(entity, y - half_height);
}

pub fn set_mid<T: Positionable + ?Sized>(entity: &mut T, x: f64, y: f64) {
    set_mid_x(entity, x);
    set_mid_y(entity, y);
}

pub fn get_mid_x<T: Positionable + ?Sized>(entity: &T) -> f64 {
    entity.bounds().mid_x()
}

pub fn get_mid_y<T: Positionable + ?Sized>(entity: &T) -> f64 {
    entity.bounds().mid_y()
}

/// Moves the midpoint toward `x`, by at most `max_distance` when given.
pub fn slide_to_x<T: Positionable + ?Sized>(entity: &mut T, x: f64, max_distance: Option<f64>) {
    let delta = clamped_step(x - get_mid_x(entity), max_distance);
    if delta != 0.0 {
        shift_horiz(entity, delta);
    }
}

/// Moves the midpoint toward `y`, by at most `max_distance` when given.
pub fn slide_to_y<T: Positionable + ?Sized>(entity: &mut T, y: f64, max_distance: Option<f64>) {
    let delta = clamped_step(y - get_mid_y(entity), max_distance);
    if delta != 0.0 {
        shift_vert(entity, delta);
    }
}

fn clamped_step(distance: f64, max_distance: Option<f64>) -> f64 {
    let limit = max_distance.map_or(f64::INFINITY, f64::abs);
    if distance > 0.0 {
        distance.min(limit)
    } else if distance < 0.0 {
        distance.max(-limit)
    } else {
        0.0
    }
}
