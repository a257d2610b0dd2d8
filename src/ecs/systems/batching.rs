use crate::batch::{pack_instance, SpriteBatches};
use crate::ecs::profiler::SystemProfiler;
use crate::ecs::{OrientedFrames, Rotation, Scale, SpriteFlip, TextureGroup, Translation, VisibleSprite};
use crate::sprites::SpriteCache;
use bevy_ecs::prelude::{Query, Res, ResMut};
use bevy_ecs::query::Has;

type BatchedSprite<'a> = (
    &'a TextureGroup,
    &'a VisibleSprite,
    Option<&'a Translation>,
    Option<&'a Rotation>,
    Option<&'a Scale>,
    Option<&'a SpriteFlip>,
    Has<OrientedFrames>,
);

pub fn sys_collect_sprite_batches(
    mut profiler: ResMut<SystemProfiler>,
    cache: Res<SpriteCache>,
    mut batches: ResMut<SpriteBatches>,
    sprites: Query<BatchedSprite>,
) {
    let _span = profiler.scope("sys_collect_sprite_batches");
    let table = cache.read();
    batches.begin_frame();
    for (group, visible, translation, rotation, scale, flip, oriented) in &sprites {
        debug_assert_eq!(group.0, visible.texture, "texture group lags behind visible sprite");
        let Some(info) = table.get(visible.sprite) else {
            continue;
        };
        let translation = translation.map(|t| t.0).unwrap_or_default();
        // Oriented sprites already show their facing through the frame itself.
        let angle = match rotation {
            Some(rotation) if !oriented => rotation.facing_angle(),
            _ => 0.0,
        };
        let scale = scale.copied().unwrap_or_default().0;
        let flip = flip.copied().unwrap_or_default();
        batches.push(group.0, pack_instance(info, translation, angle, scale, flip));
    }
}
