mod keeper;
mod quadrant;

pub use keeper::{BoundaryCallback, EdgeDirection, QuadsError, QuadsKeeper, QuadsKeeperSettings};
pub use quadrant::{Quadrant, QuadrantCol, QuadrantGroup, QuadrantId, QuadrantRow};
