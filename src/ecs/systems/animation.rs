use super::SpriteClock;
use crate::ecs::profiler::SystemProfiler;
use crate::ecs::{
    OrientedFrames, PendingFrame, Rotation, SpriteAnimation, SpriteSequence, TextureGroup, VisibleSprite,
};
use crate::sprites::SpriteCache;
use bevy_ecs::prelude::{DetectChangesMut, Entity, ParallelCommands, Query, Res, ResMut, With, Without};
use std::f32::consts::TAU;

/// Moves the schedule of a time-driven animation forward.
///
/// Returns the frame to show next when the entity's frame is due at `elapsed`, `None` otherwise. The first
/// call arms the schedule at `elapsed`, so a fresh animation picks its first frame immediately. At most one
/// frame is advanced per call.
pub fn advance_clock(animation: &mut SpriteAnimation, elapsed: f64) -> Option<usize> {
    if animation.is_static() {
        return None;
    }
    let due = *animation.next_frame_due.get_or_insert(elapsed);
    if elapsed < due {
        return None;
    }
    animation.next_frame_due = Some(due + f64::from(animation.frame_delay));
    Some(animation.following_frame())
}

/// Maps a facing angle (radians, any range) onto a sequence of `frame_count` directions laid out
/// counter-clockwise from +X.
pub fn orientation_frame(angle: f32, frame_count: usize) -> usize {
    if frame_count <= 1 {
        return 0;
    }
    let angle = angle.rem_euclid(TAU);
    let frame = (angle / TAU * frame_count as f32).round() as usize;
    frame % frame_count
}

pub fn sys_advance_sprite_clocks(
    mut profiler: ResMut<SystemProfiler>,
    clock: Res<SpriteClock>,
    mut animations: Query<(&mut SpriteAnimation, &mut PendingFrame), Without<OrientedFrames>>,
) {
    let _span = profiler.scope("sys_advance_sprite_clocks");
    let elapsed = clock.elapsed;
    animations.par_iter_mut().for_each(|(mut animation, mut pending)| {
        if animation.is_static() {
            return;
        }
        if let Some(frame) = advance_clock(&mut animation, elapsed) {
            pending.set_if_neq(PendingFrame(frame));
        }
    });
}

pub fn sys_orient_sprite_frames(
    mut profiler: ResMut<SystemProfiler>,
    mut sprites: Query<(&SpriteAnimation, &Rotation, &mut PendingFrame), With<OrientedFrames>>,
) {
    let _span = profiler.scope("sys_orient_sprite_frames");
    sprites.par_iter_mut().for_each(|(animation, rotation, mut pending)| {
        let frame = orientation_frame(rotation.facing_angle(), animation.frame_count);
        pending.set_if_neq(PendingFrame(frame));
    });
}

/// Applies pending frames. Texture group changes are recorded as commands and land at the next flush.
pub fn sys_commit_sprite_frames(
    mut profiler: ResMut<SystemProfiler>,
    cache: Res<SpriteCache>,
    par_commands: ParallelCommands,
    mut sprites: Query<(Entity, &mut SpriteAnimation, &PendingFrame, &SpriteSequence, &mut VisibleSprite)>,
) {
    let _span = profiler.scope("sys_commit_sprite_frames");
    let table = cache.read();
    sprites.par_iter_mut().for_each(|(entity, mut animation, pending, sequence, mut visible)| {
        if animation.current_frame == Some(pending.0) {
            return;
        }
        let Some(sprite) = sequence.get(pending.0) else {
            debug_assert!(false, "pending frame {} outside sequence of {}", pending.0, sequence.len());
            return;
        };
        let Some(info) = table.get(sprite) else {
            debug_assert!(false, "sprite {} missing from cache", sprite.raw());
            return;
        };
        animation.current_frame = Some(pending.0);
        visible.sprite = sprite;
        if visible.texture != info.texture {
            visible.texture = info.texture;
            let group = TextureGroup(info.texture);
            par_commands.command_scope(|mut commands| {
                commands.entity(entity).try_insert(group);
            });
        }
    });
}
