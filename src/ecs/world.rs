use super::*;
use crate::batch::SpriteBatches;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::sprites::{CachedSprite, SpriteAsset, SpriteCache};
use bevy_ecs::prelude::{Entity, Schedule, World};
use glam::Vec3;

// ---------- World container ----------
pub struct SpriteWorld {
    pub world: World,
    schedule: Schedule,
}

impl Default for SpriteWorld {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl SpriteWorld {
    pub fn new(cache: CacheConfig) -> Self {
        Self::with_cache(SpriteCache::new(cache))
    }

    /// Builds a world around an existing cache, e.g. one shared with an asset loader thread.
    pub fn with_cache(cache: SpriteCache) -> Self {
        let mut world = World::new();
        world.insert_resource(SpriteClock::default());
        world.insert_resource(cache);
        world.insert_resource(SpriteBatches::default());
        world.insert_resource(SystemProfiler::default());

        let mut schedule = Schedule::default();
        add_sprite_systems(&mut schedule);
        Self { world, schedule }
    }

    pub fn cache(&self) -> &SpriteCache {
        self.world.resource::<SpriteCache>()
    }

    pub fn cache_sprite(&self, asset: &SpriteAsset) -> Result<CachedSprite> {
        self.cache().cache(asset)
    }

    pub fn cache_sprites(&self, assets: &[SpriteAsset]) -> Result<Vec<CachedSprite>> {
        self.cache().cache_all(assets)
    }

    /// Clears the cache and forgets every batch group. Entities still holding handles keep them; re-attach
    /// sprites before the next update.
    pub fn clear_cache(&mut self) {
        self.cache().clear();
        self.world.resource_mut::<SpriteBatches>().clear();
    }

    pub fn spawn(&mut self, translation: Vec3) -> Entity {
        self.world.spawn((Translation(translation), Rotation::default())).id()
    }

    pub fn spawn_sprite(&mut self, sprite: CachedSprite, translation: Vec3) -> Result<Entity> {
        let entity = self.spawn(translation);
        if let Err(err) = attach_sprite(&mut self.world, entity, sprite) {
            self.world.despawn(entity);
            return Err(err);
        }
        Ok(entity)
    }

    pub fn spawn_animated(
        &mut self,
        frames: &[CachedSprite],
        fps: f32,
        repeat: RepeatMode,
        translation: Vec3,
    ) -> Result<Entity> {
        let entity = self.spawn(translation);
        if let Err(err) = attach_animation(&mut self.world, entity, frames, fps, repeat) {
            self.world.despawn(entity);
            return Err(err);
        }
        Ok(entity)
    }

    pub fn spawn_oriented(&mut self, frames: &[CachedSprite], translation: Vec3) -> Result<Entity> {
        let entity = self.spawn(translation);
        if let Err(err) = attach_orientation_animation(&mut self.world, entity, frames) {
            self.world.despawn(entity);
            return Err(err);
        }
        Ok(entity)
    }

    pub fn attach_sprite(&mut self, entity: Entity, sprite: CachedSprite) -> Result<()> {
        attach_sprite(&mut self.world, entity, sprite)
    }

    pub fn attach_animation(
        &mut self,
        entity: Entity,
        frames: &[CachedSprite],
        fps: f32,
        repeat: RepeatMode,
    ) -> Result<()> {
        attach_animation(&mut self.world, entity, frames, fps, repeat)
    }

    pub fn attach_orientation_animation(&mut self, entity: Entity, frames: &[CachedSprite]) -> Result<()> {
        attach_orientation_animation(&mut self.world, entity, frames)
    }

    pub fn remove_animation(&mut self, entity: Entity) -> Result<bool> {
        remove_animation(&mut self.world, entity)
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity)
    }

    /// Advances the clock by `dt` seconds and runs selection, commit and batch collection.
    pub fn update(&mut self, dt: f32) {
        self.world.resource_mut::<SpriteClock>().advance(dt);
        self.schedule.run(&mut self.world);
    }

    pub fn elapsed(&self) -> f64 {
        self.world.resource::<SpriteClock>().elapsed
    }

    pub fn batches(&self) -> &SpriteBatches {
        self.world.resource::<SpriteBatches>()
    }

    pub fn system_timings(&self) -> Vec<SystemTimingSummary> {
        self.world.resource::<SystemProfiler>().summaries()
    }

    pub fn set_translation(&mut self, entity: Entity, translation: Vec3) -> bool {
        match self.world.get_mut::<Translation>(entity) {
            Some(mut current) => {
                current.0 = translation;
                true
            }
            None => false,
        }
    }

    pub fn set_rotation(&mut self, entity: Entity, radians: f32) -> bool {
        match self.world.get_mut::<Rotation>(entity) {
            Some(mut current) => {
                *current = Rotation::from_angle(radians);
                true
            }
            None => false,
        }
    }

    pub fn set_scale(&mut self, entity: Entity, scale: f32) -> bool {
        let Ok(mut entity_mut) = self.world.get_entity_mut(entity) else {
            return false;
        };
        entity_mut.insert(Scale(scale));
        true
    }

    pub fn set_flip(&mut self, entity: Entity, x: bool, y: bool) -> bool {
        let Ok(mut entity_mut) = self.world.get_entity_mut(entity) else {
            return false;
        };
        entity_mut.insert(SpriteFlip { x, y });
        true
    }

    /// Frame currently on screen, `None` for static sprites or before the first update.
    pub fn current_frame(&self, entity: Entity) -> Option<usize> {
        self.world.get::<SpriteAnimation>(entity).and_then(|animation| animation.current_frame)
    }

    pub fn visible_sprite(&self, entity: Entity) -> Option<VisibleSprite> {
        self.world.get::<VisibleSprite>(entity).copied()
    }

    pub fn texture_group(&self, entity: Entity) -> Option<u32> {
        self.world.get::<TextureGroup>(entity).map(|group| group.0)
    }
}
