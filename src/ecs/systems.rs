use bevy_ecs::prelude::{Resource, Schedule};
use bevy_ecs::schedule::IntoSystemConfigs;

mod animation;
mod batching;

pub use animation::*;
pub use batching::*;

/// Host-driven animation time.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct SpriteClock {
    pub elapsed: f64,
    pub delta: f32,
}

impl SpriteClock {
    pub fn advance(&mut self, dt: f32) {
        self.delta = dt.max(0.0);
        self.elapsed += f64::from(self.delta);
    }
}

/// Registers the sprite pipeline: frame selection, then commit, then batch collection.
///
/// The chain puts a command flush between commit and collection, so texture group reassignments recorded
/// during commit are visible to the collector in the same run.
pub fn add_sprite_systems(schedule: &mut Schedule) {
    schedule.add_systems(
        (
            (sys_advance_sprite_clocks, sys_orient_sprite_frames),
            sys_commit_sprite_frames,
            sys_collect_sprite_batches,
        )
            .chain(),
    );
}
