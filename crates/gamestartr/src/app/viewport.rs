use crate::geometry::Bounds;

/// Screen size plus the world rectangle currently shown.
///
/// Things live in screen coordinates (scrolling moves the Things, not the camera), so drawing
/// culls against `0..width` and `0..height`. The world edges track how far the view has scrolled
/// and are what map spawners compare against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    width: f64,
    height: f64,
    top: f64,
    right: f64,
    bottom: f64,
    left: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            top: 0.0,
            right: width,
            bottom: height,
            left: 0.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
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

    pub fn pixel_size(&self) -> (u32, u32) {
        (to_pixel_dimension(self.width), to_pixel_dimension(self.height))
    }

    /// The screen rectangle in screen coordinates.
    pub fn screen_bounds(&self) -> Bounds {
        Bounds::from_pixels(0.0, 0.0, self.width, self.height)
    }

    /// The world rectangle currently on screen.
    pub fn world_bounds(&self) -> Bounds {
        Bounds::from_pixels(self.left, self.top, self.width, self.height)
    }

    /// Moves the world window by `(dx, dy)`.
    pub fn shift(&mut self, dx: f64, dy: f64) {
        self.left += dx;
        self.right += dx;
        self.top += dy;
        self.bottom += dy;
    }

    /// Keeps the world top-left corner and changes the screen size.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.right = self.left + width;
        self.bottom = self.top + height;
    }
}

fn to_pixel_dimension(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.ceil() as u32
    } else {
        0
    }
}
