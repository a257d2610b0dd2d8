//! Binding cached sprites to entities.
//!
//! Attaching validates everything up front: on error the entity is left untouched. On success the entity
//! immediately shows its first frame and sits in that frame's texture group, so it batches correctly even
//! before the next schedule run.

use super::{
    OrientedFrames, PendingFrame, RepeatMode, Rotation, SpriteAnimation, SpriteSequence, TextureGroup,
    Translation, VisibleSprite,
};
use crate::error::{Result, SpriteError};
use crate::sprites::{CachedSprite, SpriteCache};
use bevy_ecs::prelude::{Entity, World};

fn resolve_textures(world: &World, frames: &[CachedSprite]) -> Result<Vec<u32>> {
    let cache = world
        .get_resource::<SpriteCache>()
        .ok_or_else(|| SpriteError::invalid("world has no sprite cache"))?;
    let table = cache.read();
    frames
        .iter()
        .map(|&sprite| {
            table.texture_of(sprite).ok_or_else(|| {
                SpriteError::invalid(format!("sprite {} is not in the cache ({} cached)", sprite.raw(), table.len()))
            })
        })
        .collect()
}

fn ensure_entity(world: &World, entity: Entity) -> Result<()> {
    if world.get_entity(entity).is_err() {
        return Err(SpriteError::invalid(format!("entity {entity} does not exist")));
    }
    Ok(())
}

/// Shows a single static sprite, replacing any animation the entity had.
pub fn attach_sprite(world: &mut World, entity: Entity, sprite: CachedSprite) -> Result<()> {
    ensure_entity(world, entity)?;
    let texture = resolve_textures(world, &[sprite])?[0];
    let mut entity_mut = world.entity_mut(entity);
    entity_mut.remove::<(SpriteAnimation, PendingFrame, SpriteSequence, OrientedFrames)>();
    entity_mut.insert((VisibleSprite { sprite, texture }, TextureGroup(texture)));
    if !entity_mut.contains::<Translation>() {
        entity_mut.insert(Translation::default());
    }
    if !entity_mut.contains::<Rotation>() {
        entity_mut.insert(Rotation::default());
    }
    Ok(())
}

/// Plays `frames` at `fps` frames per second. An `fps` of zero pins the entity to its first frame.
///
/// Attaching again replaces the previous sequence and restarts from frame 0.
pub fn attach_animation(
    world: &mut World,
    entity: Entity,
    frames: &[CachedSprite],
    fps: f32,
    repeat: RepeatMode,
) -> Result<()> {
    ensure_entity(world, entity)?;
    if !fps.is_finite() || fps < 0.0 {
        return Err(SpriteError::out_of_range(format!("fps must be finite and non-negative, got {fps}")));
    }
    if frames.is_empty() {
        return Err(SpriteError::out_of_range("animation needs at least one frame"));
    }
    let textures = resolve_textures(world, frames)?;
    let first = VisibleSprite { sprite: frames[0], texture: textures[0] };

    let mut entity_mut = world.entity_mut(entity);
    entity_mut.remove::<OrientedFrames>();
    entity_mut.insert((
        SpriteSequence(frames.to_vec()),
        SpriteAnimation::new(frames.len(), fps, repeat),
        PendingFrame(0),
        first,
        TextureGroup(first.texture),
    ));
    if !entity_mut.contains::<Translation>() {
        entity_mut.insert(Translation::default());
    }
    if !entity_mut.contains::<Rotation>() {
        entity_mut.insert(Rotation::default());
    }
    log::trace!("[sprites] {entity} animates {} frames at {fps} fps ({})", frames.len(), repeat.as_str());
    Ok(())
}

/// Picks the frame from the entity's facing angle every update instead of from the clock.
///
/// `frames` are the directions going counter-clockwise from +X; see [`sequence_to_360`] for converting a
/// clockwise sheet.
pub fn attach_orientation_animation(world: &mut World, entity: Entity, frames: &[CachedSprite]) -> Result<()> {
    attach_animation(world, entity, frames, 0.0, RepeatMode::Loop)?;
    world.entity_mut(entity).insert(OrientedFrames);
    Ok(())
}

/// Strips animation components, leaving the last shown frame on screen. Returns whether anything was removed.
pub fn remove_animation(world: &mut World, entity: Entity) -> Result<bool> {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return Err(SpriteError::invalid(format!("entity {entity} does not exist")));
    };
    let had_animation = entity_mut.contains::<SpriteAnimation>();
    entity_mut.remove::<(SpriteAnimation, PendingFrame, SpriteSequence, OrientedFrames)>();
    Ok(had_animation)
}

/// Reorders a clockwise direction sheet whose first entry faces up (+Y) into the counter-clockwise-from-+X
/// layout orientation animations expect.
///
/// The input length must be a non-zero multiple of four so the +X direction lands on an entry.
pub fn sequence_to_360<T: Clone>(frames: &[T]) -> Result<Vec<T>> {
    let len = frames.len();
    if len == 0 || len % 4 != 0 {
        return Err(SpriteError::invalid(format!(
            "direction sheet length must be a non-zero multiple of 4, got {len}"
        )));
    }
    let start = len / 4;
    let mut out = Vec::with_capacity(len);
    out.extend(frames[..=start].iter().rev().cloned());
    out.extend(frames[start + 1..].iter().rev().cloned());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_to_360_rotates_clockwise_sheet() {
        let sheet = ["up", "right", "down", "left"];
        let reordered = sequence_to_360(&sheet).unwrap();
        assert_eq!(reordered, vec!["right", "up", "left", "down"]);
    }

    #[test]
    fn sequence_to_360_rejects_bad_lengths() {
        assert!(sequence_to_360::<u8>(&[]).is_err());
        assert!(sequence_to_360(&[1, 2, 3]).is_err());
        assert!(sequence_to_360(&[1, 2, 3, 4, 5, 6]).is_err());
    }
}
