//! Per-texture instance batches.
//!
//! Every visible sprite becomes one [`InstanceRecord`] inside the batch of its texture group. Batches are
//! rebuilt from scratch every frame but the batch objects themselves are kept once a group has been seen, so
//! a group that temporarily empties out keeps its GPU buffers.

use crate::ecs::SpriteFlip;
use crate::sprites::SpriteInfo;
use bevy_ecs::prelude::Resource;
use glam::{Vec2, Vec3, Vec4};
use std::collections::BTreeMap;

/// GPU layout of one sprite instance, four `vec4<f32>` rows:
///
/// | row | x      | y      | z        | w        |
/// |-----|--------|--------|----------|----------|
/// | 0   | pos.x  | pos.y  | pos.z    | rotation |
/// | 1   | uv.min.x | uv.min.y | uv.max.x | uv.max.y |
/// | 2   | size.x | size.y | offset.x | offset.y |
/// | 3   | flip.x | flip.y | scale    | unused   |
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRecord {
    pub rows: [[f32; 4]; 4],
}

impl InstanceRecord {
    pub const FLOATS: usize = 16;
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn position(&self) -> Vec3 {
        let [x, y, z, _] = self.rows[0];
        Vec3::new(x, y, z)
    }

    pub fn rotation(&self) -> f32 {
        self.rows[0][3]
    }

    pub fn uv(&self) -> Vec4 {
        Vec4::from_array(self.rows[1])
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.rows[2][0], self.rows[2][1])
    }

    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.rows[2][2], self.rows[2][3])
    }

    /// Flip multipliers, `-1.0` on a flipped axis.
    pub fn flip(&self) -> Vec2 {
        Vec2::new(self.rows[3][0], self.rows[3][1])
    }

    pub fn scale(&self) -> f32 {
        self.rows[3][2]
    }
}

/// Packs the instance record for a sprite at `translation`, rotated by `rotation` radians about Z.
pub fn pack_instance(
    info: &SpriteInfo,
    translation: Vec3,
    rotation: f32,
    scale: f32,
    flip: SpriteFlip,
) -> InstanceRecord {
    let flip_x = if flip.x { -1.0 } else { 1.0 };
    let flip_y = if flip.y { -1.0 } else { 1.0 };
    InstanceRecord {
        rows: [
            [translation.x, translation.y, translation.z, rotation],
            info.uv.to_array(),
            [info.size.x, info.size.y, info.offset.x, info.offset.y],
            [flip_x, flip_y, scale, 0.0],
        ],
    }
}

#[derive(Clone, Debug, Default)]
pub struct SpriteBatch {
    texture: u32,
    instances: Vec<InstanceRecord>,
}

impl SpriteBatch {
    fn new(texture: u32) -> Self {
        Self { texture, instances: Vec::new() }
    }

    pub fn texture(&self) -> u32 {
        self.texture
    }

    pub fn instances(&self) -> &[InstanceRecord] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Instance batches keyed by texture index, in ascending texture order.
#[derive(Resource, Default, Debug)]
pub struct SpriteBatches {
    batches: BTreeMap<u32, SpriteBatch>,
}

impl SpriteBatches {
    /// Empties every batch while keeping the groups (and their allocations) alive.
    pub fn begin_frame(&mut self) {
        for batch in self.batches.values_mut() {
            batch.instances.clear();
        }
    }

    pub fn push(&mut self, texture: u32, record: InstanceRecord) {
        self.batches
            .entry(texture)
            .or_insert_with(|| {
                log::debug!("[batch] new texture group {texture}");
                SpriteBatch::new(texture)
            })
            .instances
            .push(record);
    }

    pub fn get(&self, texture: u32) -> Option<&SpriteBatch> {
        self.batches.get(&texture)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpriteBatch> + '_ {
        self.batches.values()
    }

    pub fn non_empty(&self) -> impl Iterator<Item = &SpriteBatch> + '_ {
        self.batches.values().filter(|batch| !batch.is_empty())
    }

    pub fn group_count(&self) -> usize {
        self.batches.len()
    }

    pub fn total_instances(&self) -> usize {
        self.batches.values().map(SpriteBatch::len).sum()
    }

    /// Forgets every group, e.g. after the sprite cache was cleared.
    pub fn clear(&mut self) {
        self.batches.clear();
    }
}
