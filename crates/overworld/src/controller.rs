use gamestartr::geometry::{quadrant_things, things_overlap};
use gamestartr::{InputState, Stage, StageController, StageError, ThingId};
use tracing::debug;

use crate::art::Facing;
use crate::spawner::MapSpawner;

/// The camera scrolls once the hero gets closer than this to a screen edge.
pub const CAMERA_MARGIN: f64 = 64.0;

const SOLID_GROUP: &str = "Solid";

#[derive(Debug)]
pub struct OverworldController {
    hero: ThingId,
    spawner: MapSpawner,
    speed: f64,
    remainder: (f64, f64),
    facing: Facing,
}

impl OverworldController {
    /// `speed` is in pixels per second. The hero is expected to carry the `down` class.
    pub fn new(hero: ThingId, spawner: MapSpawner, speed: f64) -> Self {
        Self {
            hero,
            spawner,
            speed,
            remainder: (0.0, 0.0),
            facing: Facing::Down,
        }
    }

    /// Whole pixels to move this tick; fractions carry over so slow speeds still move.
    fn whole_step(&mut self, direction: (f64, f64), dt: f64) -> (f64, f64) {
        let x = direction.0 * self.speed * dt + self.remainder.0;
        let y = direction.1 * self.speed * dt + self.remainder.1;
        let step = (x.trunc(), y.trunc());
        self.remainder = if direction == (0.0, 0.0) {
            (0.0, 0.0)
        } else {
            (x - step.0, y - step.1)
        };
        step
    }

    /// Moves the hero along one axis, backing out again if it lands inside a solid.
    fn try_move(&mut self, stage: &mut Stage, dx: f64, dy: f64) -> Result<bool, StageError> {
        if dx == 0.0 && dy == 0.0 {
            return Ok(false);
        }
        stage.move_thing(self.hero, dx, dy)?;
        stage.reindex_thing(self.hero)?;
        if !self.blocked(stage) {
            return Ok(true);
        }
        stage.move_thing(self.hero, -dx, -dy)?;
        stage.reindex_thing(self.hero)?;
        debug!(dx, dy, "hero_blocked");
        Ok(false)
    }

    fn blocked(&self, stage: &Stage) -> bool {
        let Some(hero) = stage.things().get(self.hero) else {
            return false;
        };
        quadrant_things(stage.quadrants(), hero, SOLID_GROUP)
            .into_iter()
            .filter_map(|id| stage.things().get(id))
            .any(|solid| things_overlap(hero, solid))
    }

    fn face(&mut self, stage: &mut Stage, facing: Facing) {
        if facing == self.facing {
            return;
        }
        if let Some(hero) = stage.things_mut().get_mut(self.hero) {
            hero.remove_class(self.facing.class());
            hero.add_class(facing.class());
            self.facing = facing;
            debug!(facing = facing.class(), "hero_turned");
        }
    }

    /// Scrolls just far enough to put the hero back inside the camera margins.
    fn follow(&self, stage: &mut Stage) -> Result<(), StageError> {
        let Some(hero) = stage.things().get(self.hero) else {
            return Ok(());
        };
        let width = stage.viewport().width();
        let height = stage.viewport().height();
        let dx = edge_overshoot(hero.left(), hero.right(), width);
        let dy = edge_overshoot(hero.top(), hero.bottom(), height);
        stage.scroll(dx, dy)
    }
}

fn edge_overshoot(low: f64, high: f64, extent: f64) -> f64 {
    if low < CAMERA_MARGIN {
        low - CAMERA_MARGIN
    } else if high > extent - CAMERA_MARGIN {
        high - (extent - CAMERA_MARGIN)
    } else {
        0.0
    }
}

impl StageController for OverworldController {
    fn update(
        &mut self,
        stage: &mut Stage,
        input: &InputState,
        fixed_dt_seconds: f32,
    ) -> Result<(), StageError> {
        let direction = input.direction();
        let (dx, dy) = self.whole_step(direction, f64::from(fixed_dt_seconds));
        self.try_move(stage, dx, 0.0)?;
        self.try_move(stage, 0.0, dy)?;
        if let Some(facing) = Facing::from_direction(direction.0, direction.1) {
            self.face(stage, facing);
        }

        self.follow(stage)?;
        let report = self.spawner.apply(stage)?;
        if report.spawned > 0 || report.killed > 0 {
            debug!(
                spawned = report.spawned,
                killed = report.killed,
                live = self.spawner.live_things(),
                "map_streamed"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use gamestartr::{
        Bounds, Compositor, CompositorSettings, InputAction, QuadsKeeper, QuadsKeeperSettings,
        SpriteLibrary, Thing, Viewport,
    };

    use super::*;
    use crate::settings::OverworldConfig;

    fn empty_map() -> MapSpawner {
        let config = OverworldConfig {
            tree_percent: 0,
            rock_percent: 0,
            flower_percent: 0,
            fence_percent: 0,
            pond_percent: 0,
            ..OverworldConfig::default()
        };
        MapSpawner::new(config, Bounds::from_pixels(0.0, 0.0, 0.0, 0.0))
    }

    fn stage_for(spawner: &MapSpawner) -> Stage {
        let settings = QuadsKeeperSettings::new(8, 8, 32.0, 32.0, &["Scenery", "Solid", "Hero"])
            .with_start(-32.0, -32.0);
        let keeper = QuadsKeeper::new(spawner.attach(settings)).expect("keeper");
        let compositor = Compositor::new(
            CompositorSettings::default(),
            Viewport::new(192.0, 192.0),
            Box::new(SpriteLibrary::new()),
        )
        .expect("compositor");
        Stage::new(keeper, compositor)
    }

    fn holding(action: InputAction) -> InputState {
        let mut input = InputState::default();
        input.set(action, true);
        input
    }

    fn hero_at(stage: &mut Stage, left: f64, top: f64) -> ThingId {
        stage
            .spawn(
                Thing::new("Hero", "Hero", 16.0, 16.0)
                    .with_class(Facing::Down.class())
                    .at(left, top),
            )
            .expect("hero")
    }

    fn hero_box(stage: &Stage, hero: ThingId) -> (f64, f64) {
        let hero = stage.things().get(hero).expect("hero");
        (hero.left(), hero.top())
    }

    #[test]
    fn fractional_speed_carries_over_between_ticks() {
        let mut spawner = empty_map();
        let mut stage = stage_for(&spawner);
        spawner.apply(&mut stage).expect("populate");
        let hero = hero_at(&mut stage, 80.0, 80.0);
        let mut controller = OverworldController::new(hero, spawner, 10.0);
        let input = holding(InputAction::MoveRight);

        controller.update(&mut stage, &input, 0.25).expect("first");
        assert_eq!(hero_box(&stage, hero), (82.0, 80.0));
        controller.update(&mut stage, &input, 0.25).expect("second");
        assert_eq!(hero_box(&stage, hero), (85.0, 80.0));
    }

    #[test]
    fn solids_block_movement() {
        let mut spawner = empty_map();
        let mut stage = stage_for(&spawner);
        spawner.apply(&mut stage).expect("populate");
        let hero = hero_at(&mut stage, 64.0, 64.0);
        stage
            .spawn(Thing::new("Rock", SOLID_GROUP, 16.0, 16.0).at(104.0, 64.0))
            .expect("rock");
        let mut controller = OverworldController::new(hero, spawner, 64.0);
        let input = holding(InputAction::MoveRight);

        controller.update(&mut stage, &input, 0.25).expect("free step");
        assert_eq!(hero_box(&stage, hero), (80.0, 64.0));
        controller.update(&mut stage, &input, 0.25).expect("blocked step");
        assert_eq!(hero_box(&stage, hero), (80.0, 64.0));

        controller
            .update(&mut stage, &holding(InputAction::MoveDown), 0.25)
            .expect("down");
        assert_eq!(hero_box(&stage, hero), (80.0, 80.0));
    }

    #[test]
    fn facing_swaps_the_hero_class() {
        let mut spawner = empty_map();
        let mut stage = stage_for(&spawner);
        spawner.apply(&mut stage).expect("populate");
        let hero = hero_at(&mut stage, 80.0, 80.0);
        let mut controller = OverworldController::new(hero, spawner, 64.0);

        controller
            .update(&mut stage, &holding(InputAction::MoveLeft), 0.25)
            .expect("left");

        let thing = stage.things().get(hero).expect("hero");
        assert_eq!(controller.facing, Facing::Left);
        assert_eq!(thing.to_string(), "Hero left");
    }

    #[test]
    fn camera_scrolls_when_the_hero_nears_an_edge() {
        let mut spawner = empty_map();
        let mut stage = stage_for(&spawner);
        spawner.apply(&mut stage).expect("populate");
        let hero = hero_at(&mut stage, 104.0, 80.0);
        let mut controller = OverworldController::new(hero, spawner, 64.0);

        controller
            .update(&mut stage, &holding(InputAction::MoveRight), 0.25)
            .expect("move");

        assert_eq!(hero_box(&stage, hero), (112.0, 80.0));
        assert_eq!(stage.viewport().left(), 8.0);
    }

    #[test]
    fn standing_still_leaves_the_view_alone() {
        let mut spawner = empty_map();
        let mut stage = stage_for(&spawner);
        spawner.apply(&mut stage).expect("populate");
        let hero = hero_at(&mut stage, 88.0, 88.0);
        let mut controller = OverworldController::new(hero, spawner, 64.0);

        controller
            .update(&mut stage, &InputState::default(), 0.25)
            .expect("idle");

        assert_eq!(hero_box(&stage, hero), (88.0, 88.0));
        assert_eq!(stage.viewport().left(), 0.0);
        assert_eq!(controller.facing, Facing::Down);
    }
}
