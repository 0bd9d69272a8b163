mod bounds;
mod collision;

pub use bounds::{
    get_mid_x, get_mid_y, set_bottom, set_left, set_mid, set_mid_x, set_mid_y, set_right,
    set_size, set_top, shift_horiz, shift_vert, slide_to_x, slide_to_y, Bounds, Positionable,
};
pub use collision::{is_thing_above, is_within, quadrant_things, things_overlap, things_touch};
