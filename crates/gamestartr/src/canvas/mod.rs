mod blend;
mod surface;

pub use surface::{Canvas, CanvasFactory, ImageData, Rgba, SoftwareCanvasFactory};

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];
