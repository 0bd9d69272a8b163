use super::bounds::Positionable;
use crate::quadrants::QuadsKeeper;
use crate::things::{Thing, ThingId};

/// Boxes overlap or share an edge.
pub fn things_touch<A, B>(a: &A, b: &B) -> bool
where
    A: Positionable + ?Sized,
    B: Positionable + ?Sized,
{
    let (a, b) = (a.bounds(), b.bounds());
    a.left() <= b.right() && a.right() >= b.left() && a.top() <= b.bottom() && a.bottom() >= b.top()
}

/// Boxes overlap with positive area; shared edges do not count.
pub fn things_overlap<A, B>(a: &A, b: &B) -> bool
where
    A: Positionable + ?Sized,
    B: Positionable + ?Sized,
{
    a.bounds().intersects(b.bounds())
}

/// `a` is resting on or above `b`: its vertical midpoint is above `b`'s top and the two
/// overlap horizontally.
pub fn is_thing_above<A, B>(a: &A, b: &B) -> bool
where
    A: Positionable + ?Sized,
    B: Positionable + ?Sized,
{
    let (a, b) = (a.bounds(), b.bounds());
    a.mid_y() < b.top() && a.left() < b.right() && a.right() > b.left()
}

pub fn is_within<A, B>(inner: &A, outer: &B) -> bool
where
    A: Positionable + ?Sized,
    B: Positionable + ?Sized,
{
    let (inner, outer) = (inner.bounds(), outer.bounds());
    inner.left() >= outer.left()
        && inner.right() <= outer.right()
        && inner.top() >= outer.top()
        && inner.bottom() <= outer.bottom()
}

/// Broad-phase collision candidates: Things of `group` sharing a Quadrant with `thing`.
/// Only as fresh as the last time `thing` was indexed.
pub fn quadrant_things(keeper: &QuadsKeeper, thing: &Thing, group: &str) -> Vec<ThingId> {
    keeper.things_sharing_quadrants(thing, group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;

    #[test]
    fn shared_edge_touches_but_does_not_overlap() {
        let a = Bounds::from_pixels(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::from_pixels(10.0, 0.0, 10.0, 10.0);
        assert!(things_touch(&a, &b));
        assert!(!things_overlap(&a, &b));
    }

    #[test]
    fn separated_boxes_neither_touch_nor_overlap() {
        let a = Bounds::from_pixels(0.0, 0.0, 10.0, 10.0);
        let b = Bounds::from_pixels(0.0, 10.5, 10.0, 10.0);
        assert!(!things_touch(&a, &b));
        assert!(!things_overlap(&a, &b));
    }

    #[test]
    fn above_requires_horizontal_overlap() {
        let floor = Bounds::from_pixels(0.0, 20.0, 40.0, 8.0);
        let standing = Bounds::from_pixels(10.0, 12.0, 8.0, 8.0);
        let beside = Bounds::from_pixels(60.0, 12.0, 8.0, 8.0);
        assert!(is_thing_above(&standing, &floor));
        assert!(!is_thing_above(&beside, &floor));
        assert!(!is_thing_above(&floor, &standing));
    }

    #[test]
    fn within_is_inclusive_of_edges() {
        let outer = Bounds::from_pixels(0.0, 0.0, 32.0, 32.0);
        assert!(is_within(&outer, &outer));
        assert!(is_within(&Bounds::from_pixels(4.0, 4.0, 8.0, 8.0), &outer));
        assert!(!is_within(&Bounds::from_pixels(30.0, 4.0, 8.0, 8.0), &outer));
    }
}
