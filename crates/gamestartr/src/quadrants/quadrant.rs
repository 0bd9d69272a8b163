use crate::canvas::Canvas;
use crate::geometry::Bounds;
use crate::things::ThingId;

/// Handle to a Quadrant owned by a [`super::QuadsKeeper`]. Handles are never reused, so a handle
/// to an evicted Quadrant simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuadrantId(pub u64);

/// Member Things of one group within a Quadrant.
#[derive(Debug, Clone)]
pub struct QuadrantGroup {
    name: String,
    things: Vec<ThingId>,
}

impl QuadrantGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn things(&self) -> &[ThingId] {
        &self.things
    }
}

/// One cell of the scrolling grid with its own off-screen canvas.
#[derive(Debug)]
pub struct Quadrant {
    id: QuadrantId,
    bounds: Bounds,
    pub changed: bool,
    canvas: Canvas,
    groups: Vec<QuadrantGroup>,
}

impl Quadrant {
    pub(crate) fn new(
        id: QuadrantId,
        bounds: Bounds,
        canvas: Canvas,
        group_names: &[String],
    ) -> Self {
        Self {
            id,
            bounds,
            changed: true,
            canvas,
            groups: group_names
                .iter()
                .map(|name| QuadrantGroup {
                    name: name.clone(),
                    things: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn id(&self) -> QuadrantId {
        self.id
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
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

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Groups in draw order.
    pub fn groups(&self) -> &[QuadrantGroup] {
        &self.groups
    }

    pub fn things(&self, group: &str) -> &[ThingId] {
        self.group(group).map(QuadrantGroup::things).unwrap_or(&[])
    }

    pub fn num_things(&self, group: &str) -> usize {
        self.things(group).len()
    }

    pub fn contains(&self, thing: ThingId) -> bool {
        self.groups.iter().any(|group| group.things.contains(&thing))
    }

    fn group(&self, name: &str) -> Option<&QuadrantGroup> {
        self.groups.iter().find(|group| group.name == name)
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut QuadrantGroup> {
        self.groups.iter_mut().find(|group| group.name == name)
    }

    /// Returns false when `group` is not tracked by this Quadrant.
    pub(crate) fn add_thing(&mut self, group: &str, thing: ThingId) -> bool {
        match self.group_mut(group) {
            Some(members) => {
                if !members.things.contains(&thing) {
                    members.things.push(thing);
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_thing(&mut self, group: &str, thing: ThingId) {
        if let Some(members) = self.group_mut(group) {
            members.things.retain(|member| *member != thing);
        }
    }

    pub(crate) fn clear_group(&mut self, group: &str) {
        if let Some(members) = self.group_mut(group) {
            members.things.clear();
        }
    }

    pub(crate) fn shift(&mut self, dx: f64, dy: f64) {
        self.bounds.shift_horiz(dx);
        self.bounds.shift_vert(dy);
    }

    /// Borrows the member lists and the canvas separately for a redraw.
    pub(crate) fn redraw_parts(&mut self) -> (&Bounds, &[QuadrantGroup], &mut Canvas) {
        (&self.bounds, &self.groups, &mut self.canvas)
    }
}

/// A row of the grid, left to right. Shares its Quadrants with the columns.
#[derive(Debug, Clone)]
pub struct QuadrantRow {
    pub(crate) left: f64,
    pub(crate) top: f64,
    pub(crate) quadrants: Vec<QuadrantId>,
}

impl QuadrantRow {
    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn quadrants(&self) -> &[QuadrantId] {
        &self.quadrants
    }
}

/// A column of the grid, top to bottom. Shares its Quadrants with the rows.
#[derive(Debug, Clone)]
pub struct QuadrantCol {
    pub(crate) left: f64,
    pub(crate) top: f64,
    pub(crate) quadrants: Vec<QuadrantId>,
}

impl QuadrantCol {
    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn quadrants(&self) -> &[QuadrantId] {
        &self.quadrants
    }
}
