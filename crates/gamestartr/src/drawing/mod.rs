mod compositor;
mod sprite_state;

pub use compositor::{
    get_bottom, get_left, get_right, get_top, Compositor, CompositorSettings, DrawError,
    KeyGenerator, RefillStats,
};
pub use sprite_state::{RenderMode, SpriteCanvases, ThingSprite};
