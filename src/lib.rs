//! Instanced 2D sprite batching with frame- and orientation-driven animation on `bevy_ecs`.
//!
//! Sprites are cached once into a shared table ([`sprites::SpriteCache`]), attached to entities as static
//! sprites or frame sequences ([`ecs::attach`]), animated by a two-phase select/commit schedule
//! ([`ecs::add_sprite_systems`]) and collected into per-texture [`batch::SpriteBatches`] that the
//! [`renderer`] draws with one instanced indirect call per texture.

pub mod app;
pub mod batch;
pub mod cli;
pub mod config;
pub mod ecs;
pub mod error;
pub mod renderer;
pub mod sprites;
pub mod time;

pub use app::{run, run_with_overrides, App};
pub use batch::{InstanceRecord, SpriteBatch, SpriteBatches};
pub use ecs::{RepeatMode, SpriteWorld};
pub use error::{Result, SpriteError};
pub use sprites::{CachedSprite, SpriteAsset, SpriteCache, SpriteInfo, SpriteRect, TextureSource};
