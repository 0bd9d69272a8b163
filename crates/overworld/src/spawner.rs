use std::cell::RefCell;
use std::rc::Rc;

use gamestartr::geometry::things_overlap;
use gamestartr::{Bounds, EdgeDirection, QuadsKeeperSettings, Stage, StageError, Thing, ThingId};
use tracing::debug;

use crate::settings::{OverworldConfig, TILE};

#[derive(Debug, Clone, Copy, PartialEq)]
enum BoundaryKind {
    Revealed,
    Evicted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BoundaryEvent {
    kind: BoundaryKind,
    direction: EdgeDirection,
    bounds: Bounds,
}

type EventQueue = Rc<RefCell<Vec<BoundaryEvent>>>;

/// Places scenery in grid area the Quadrant grid reveals and removes it again when that area is
/// evicted, so only the neighbourhood of the screen is ever populated.
///
/// Boundary callbacks only queue events; [`MapSpawner::apply`] turns them into spawns and kills
/// once the stage is free to mutate. Placement is a pure function of the world tile, so an area
/// that scrolls back into view regenerates identically.
#[derive(Debug)]
pub struct MapSpawner {
    config: OverworldConfig,
    events: EventQueue,
    spawned: Vec<ThingId>,
    keep_clear: Bounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpawnReport {
    pub spawned: usize,
    pub killed: usize,
}

impl MapSpawner {
    /// `keep_clear` is a world rectangle where no solid scenery is placed (the hero's start).
    pub fn new(config: OverworldConfig, keep_clear: Bounds) -> Self {
        Self {
            config,
            events: Rc::default(),
            spawned: Vec::new(),
            keep_clear,
        }
    }

    /// Installs the boundary callbacks that feed this spawner.
    pub fn attach(&self, settings: QuadsKeeperSettings) -> QuadsKeeperSettings {
        let on_add = Rc::clone(&self.events);
        let on_remove = Rc::clone(&self.events);
        settings
            .on_add(move |direction, bounds| {
                on_add.borrow_mut().push(BoundaryEvent {
                    kind: BoundaryKind::Revealed,
                    direction,
                    bounds: *bounds,
                });
            })
            .on_remove(move |direction, bounds| {
                on_remove.borrow_mut().push(BoundaryEvent {
                    kind: BoundaryKind::Evicted,
                    direction,
                    bounds: *bounds,
                });
            })
    }

    pub fn live_things(&self) -> usize {
        self.spawned.len()
    }

    /// Handles every queued boundary event in order. Event boxes are in screen coordinates as
    /// of the moment they fired, which is still current as long as this runs right after the
    /// scroll that produced them.
    pub fn apply(&mut self, stage: &mut Stage) -> Result<SpawnReport, StageError> {
        let events = std::mem::take(&mut *self.events.borrow_mut());
        let mut report = SpawnReport::default();
        for event in events {
            let world = to_world(&event.bounds, stage);
            match event.kind {
                BoundaryKind::Revealed => {
                    report.spawned += self.populate(stage, &world)?;
                }
                BoundaryKind::Evicted => {
                    report.killed += self.clear(stage, &event.bounds)?;
                }
            }
            debug!(
                direction = %event.direction,
                kind = ?event.kind,
                left = world.left(),
                top = world.top(),
                "map_boundary_handled"
            );
        }
        Ok(report)
    }

    fn populate(&mut self, stage: &mut Stage, world: &Bounds) -> Result<usize, StageError> {
        let origin_left = stage.viewport().left();
        let origin_top = stage.viewport().top();
        let mut count = 0;
        for (tile_x, tile_y) in tiles_in(world) {
            let Some(thing) = self.scenery_for(tile_x, tile_y) else {
                continue;
            };
            let thing = thing.at(
                tile_x as f64 * TILE - origin_left,
                tile_y as f64 * TILE - origin_top,
            );
            self.spawned.push(stage.spawn(thing)?);
            count += 1;
        }
        Ok(count)
    }

    /// Kills spawned Things whose top-left corner lies in `screen` (half-open), matching how
    /// [`tiles_in`] assigns tiles to revealed areas.
    fn clear(&mut self, stage: &mut Stage, screen: &Bounds) -> Result<usize, StageError> {
        let mut doomed = Vec::new();
        self.spawned.retain(|id| {
            let inside = stage.things().get(*id).is_some_and(|thing| {
                thing.left() >= screen.left()
                    && thing.left() < screen.right()
                    && thing.top() >= screen.top()
                    && thing.top() < screen.bottom()
            });
            if inside {
                doomed.push(*id);
            }
            !inside
        });
        for id in &doomed {
            stage.kill(*id)?;
        }
        Ok(doomed.len())
    }

    fn scenery_for(&self, tile_x: i64, tile_y: i64) -> Option<Thing> {
        let roll = tile_hash(self.config.seed, tile_x, tile_y) % 100;
        let (world_x, world_y) = (tile_x as f64 * TILE, tile_y as f64 * TILE);
        let tile_box = Bounds::from_pixels(world_x, world_y, TILE, TILE);
        let clear = things_overlap(&tile_box, &self.keep_clear);

        let mut threshold = self.config.flower_percent;
        if roll < threshold {
            return Some(Thing::new("Flowers", "Scenery", TILE, TILE));
        }
        threshold += self.config.tree_percent;
        if roll < threshold {
            return (!clear)
                .then(|| Thing::new("Tree", "Solid", TILE, TILE).with_tolerance(2.0, 2.0));
        }
        threshold += self.config.rock_percent;
        if roll < threshold {
            return (!clear).then(|| Thing::new("Rock", "Solid", TILE, TILE));
        }
        threshold += self.config.fence_percent;
        if roll < threshold {
            return (!clear).then(|| {
                Thing::new("Fence", "Solid", TILE * 3.0, TILE).with_sprite_size(TILE, TILE)
            });
        }
        threshold += self.config.pond_percent;
        if roll < threshold {
            return (!clear).then(|| {
                Thing::new("Pond", "Solid", TILE * 3.0, TILE * 2.0).with_sprite_size(TILE, TILE)
            });
        }
        None
    }
}

fn to_world(screen: &Bounds, stage: &Stage) -> Bounds {
    Bounds::from_pixels(
        screen.left() + stage.viewport().left(),
        screen.top() + stage.viewport().top(),
        screen.width(),
        screen.height(),
    )
}

/// Tiles whose top-left corner lies in `world`, half-open on the right and bottom.
fn tiles_in(world: &Bounds) -> impl Iterator<Item = (i64, i64)> {
    let first_x = (world.left() / TILE).ceil() as i64;
    let end_x = (world.right() / TILE).ceil() as i64;
    let first_y = (world.top() / TILE).ceil() as i64;
    let end_y = (world.bottom() / TILE).ceil() as i64;
    (first_y..end_y).flat_map(move |y| (first_x..end_x).map(move |x| (x, y)))
}

fn tile_hash(seed: u64, tile_x: i64, tile_y: i64) -> u64 {
    let mut value = seed
        ^ (tile_x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (tile_y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    value ^= value >> 30;
    value = value.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    value ^= value >> 27;
    value = value.wrapping_mul(0x94D0_49BB_1331_11EB);
    value ^ (value >> 31)
}
