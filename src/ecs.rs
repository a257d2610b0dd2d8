pub mod attach;
pub mod profiler;
pub mod systems;
mod types;
mod world;

pub use attach::{
    attach_animation, attach_orientation_animation, attach_sprite, remove_animation, sequence_to_360,
};
pub use profiler::{SystemProfiler, SystemTimingSummary};
pub use systems::{add_sprite_systems, SpriteClock};
pub use types::*;
pub use world::SpriteWorld;
