use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use super::thing::{Thing, ThingId};
use crate::quadrants::QuadsKeeper;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThingStoreError {
    #[error("thing group '{0}' is not one of the configured group names")]
    UnknownGroup(String),
    #[error("thing {0:?} is not in the store")]
    UnknownThing(ThingId),
}

/// One group container; draw order within a group is insertion order.
#[derive(Debug)]
pub struct ThingGroup {
    name: String,
    things: Vec<Thing>,
}

impl ThingGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn things(&self) -> &[Thing] {
        &self.things
    }

    /// Mutable access for in-place updates. Reordering the slice makes id lookups fall back to
    /// scanning the group.
    pub fn things_mut(&mut self) -> &mut [Thing] {
        &mut self.things
    }
}

/// Where a Thing lives: its group and its position within that group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    group: usize,
    index: usize,
}

/// Owns every live Thing, partitioned into a fixed, ordered set of groups. Earlier groups draw
/// underneath later ones. Lookups by id go straight to the Thing's slot.
#[derive(Debug)]
pub struct ThingStore {
    groups: Vec<ThingGroup>,
    slots: HashMap<ThingId, Slot>,
    next_id: u64,
}

impl ThingStore {
    pub fn new<S: AsRef<str>>(group_names: &[S]) -> Self {
        Self {
            groups: group_names
                .iter()
                .map(|name| ThingGroup {
                    name: name.as_ref().to_string(),
                    things: Vec::new(),
                })
                .collect(),
            slots: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn add(&mut self, mut thing: Thing) -> Result<ThingId, ThingStoreError> {
        let group_index = self
            .groups
            .iter()
            .position(|group| group.name == thing.group())
            .ok_or_else(|| ThingStoreError::UnknownGroup(thing.group().to_string()))?;
        self.next_id += 1;
        let id = ThingId(self.next_id);
        thing.assign_id(id);
        thing.changed = true;
        let things = &mut self.groups[group_index].things;
        let slot = Slot {
            group: group_index,
            index: things.len(),
        };
        things.push(thing);
        self.slots.insert(id, slot);
        Ok(id)
    }

    pub fn get(&self, id: ThingId) -> Option<&Thing> {
        let slot = self.locate(id)?;
        self.groups[slot.group].things.get(slot.index)
    }

    pub fn get_mut(&mut self, id: ThingId) -> Option<&mut Thing> {
        let slot = self.locate(id)?;
        self.groups[slot.group].things.get_mut(slot.index)
    }

    /// The Thing's current slot. The recorded slot is checked first; if the caller reordered
    /// the group, the group is scanned instead.
    fn locate(&self, id: ThingId) -> Option<Slot> {
        let slot = *self.slots.get(&id)?;
        let things = &self.groups[slot.group].things;
        if things.get(slot.index).and_then(Thing::id) == Some(id) {
            return Some(slot);
        }
        let index = things.iter().position(|thing| thing.id() == Some(id))?;
        Some(Slot { index, ..slot })
    }

    pub fn groups(&self) -> &[ThingGroup] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut [ThingGroup] {
        &mut self.groups
    }

    pub fn group(&self, name: &str) -> Option<&ThingGroup> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut ThingGroup> {
        self.groups.iter_mut().find(|group| group.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thing> + '_ {
        self.groups.iter().flat_map(|group| group.things.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Thing> + '_ {
        self.groups.iter_mut().flat_map(|group| group.things.iter_mut())
    }

    /// Removes a Thing from every Quadrant it occupies (marking them changed so the vacated
    /// area redraws) and from its group, returning it.
    pub fn kill(
        &mut self,
        id: ThingId,
        quadrants: &mut QuadsKeeper,
    ) -> Result<Thing, ThingStoreError> {
        let slot = self.locate(id).ok_or(ThingStoreError::UnknownThing(id))?;
        self.slots.remove(&id);
        let group = &mut self.groups[slot.group];
        let mut thing = group.things.remove(slot.index);
        for (index, later) in group.things.iter().enumerate().skip(slot.index) {
            if let Some(later_id) = later.id() {
                self.slots.insert(later_id, Slot { index, ..slot });
            }
        }
        quadrants.remove_thing(&mut thing);
        debug!(thing = ?id, title = thing.title(), "thing_killed");
        Ok(thing)
    }
}
