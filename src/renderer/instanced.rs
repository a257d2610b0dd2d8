//! Per-texture-group GPU buffers for instanced sprite drawing.
//!
//! Every texture group owns an indirect-args buffer and an instance buffer. Instance buffers only grow; a
//! group that empties out keeps its buffers and simply issues no draw.

use crate::batch::{InstanceRecord, SpriteBatches};
use crate::error::Result;
use std::collections::BTreeMap;

/// Index count of the shared unit quad.
pub const QUAD_INDEX_COUNT: u32 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawArgs {
    pub index_count: u32,
    pub instance_count: u32,
}

impl DrawArgs {
    pub fn quads(instance_count: u32) -> Self {
        Self { index_count: QUAD_INDEX_COUNT, instance_count }
    }
}

/// GPU submission surface needed by [`InstancedRenderer`].
pub trait SpriteGpu {
    type Buffer;

    fn create_args_buffer(&mut self, texture: u32) -> Result<Self::Buffer>;
    /// Allocates room for `capacity` instance records.
    fn create_instance_buffer(&mut self, texture: u32, capacity: usize) -> Result<Self::Buffer>;
    fn write_args(&mut self, buffer: &Self::Buffer, args: DrawArgs);
    fn write_instances(&mut self, buffer: &Self::Buffer, instances: &[InstanceRecord]);
}

pub struct GroupBuffers<B> {
    pub args: B,
    pub data: B,
    pub capacity: usize,
    pub instance_count: u32,
}

/// One instanced draw ready for encoding.
pub struct GroupDraw<'a, B> {
    pub texture: u32,
    pub args: &'a B,
    pub data: &'a B,
    pub instance_count: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrepareStats {
    pub groups_drawn: usize,
    pub instances_uploaded: usize,
    pub groups_skipped: usize,
    pub buffers_grown: usize,
}

pub struct InstancedRenderer<B> {
    groups: BTreeMap<u32, GroupBuffers<B>>,
    min_capacity: usize,
}

impl<B> InstancedRenderer<B> {
    pub fn new(min_capacity: usize) -> Self {
        Self { groups: BTreeMap::new(), min_capacity: min_capacity.max(1) }
    }

    /// Uploads this frame's batches. A group whose buffers cannot be allocated draws nothing this frame and is
    /// retried on the next call.
    pub fn prepare<G>(&mut self, gpu: &mut G, batches: &SpriteBatches) -> PrepareStats
    where
        G: SpriteGpu<Buffer = B>,
    {
        let mut stats = PrepareStats::default();
        for group in self.groups.values_mut() {
            group.instance_count = 0;
        }

        for batch in batches.non_empty() {
            let texture = batch.texture();
            let instances = batch.instances();
            let Ok(count) = u32::try_from(instances.len()) else {
                log::warn!("[batch] texture group {texture} has too many instances; skipping");
                stats.groups_skipped += 1;
                continue;
            };
            match self.ensure_group(gpu, texture, instances.len()) {
                Ok(grown) => {
                    if grown {
                        stats.buffers_grown += 1;
                    }
                }
                Err(err) => {
                    log::warn!("[batch] skipping texture group {texture} this frame: {err}");
                    stats.groups_skipped += 1;
                    continue;
                }
            }
            let Some(group) = self.groups.get_mut(&texture) else {
                continue;
            };
            gpu.write_args(&group.args, DrawArgs::quads(count));
            gpu.write_instances(&group.data, instances);
            group.instance_count = count;
            stats.groups_drawn += 1;
            stats.instances_uploaded += instances.len();
        }
        stats
    }

    /// Makes sure `texture` has buffers large enough for `count` records. Returns whether a new instance
    /// buffer was allocated.
    fn ensure_group<G>(&mut self, gpu: &mut G, texture: u32, count: usize) -> Result<bool>
    where
        G: SpriteGpu<Buffer = B>,
    {
        let capacity = count.max(self.min_capacity);
        match self.groups.get_mut(&texture) {
            Some(group) if group.capacity >= count => Ok(false),
            Some(group) => {
                let data = gpu.create_instance_buffer(texture, capacity)?;
                log::debug!("[batch] group {texture} instance buffer {} -> {capacity}", group.capacity);
                group.data = data;
                group.capacity = capacity;
                Ok(true)
            }
            None => {
                let args = gpu.create_args_buffer(texture)?;
                let data = gpu.create_instance_buffer(texture, capacity)?;
                log::debug!("[batch] group {texture} allocated with capacity {capacity}");
                self.groups.insert(texture, GroupBuffers { args, data, capacity, instance_count: 0 });
                Ok(true)
            }
        }
    }

    /// Groups with instances this frame, in texture order.
    pub fn draws(&self) -> impl Iterator<Item = GroupDraw<'_, B>> + '_ {
        self.groups.iter().filter(|(_, group)| group.instance_count > 0).map(|(&texture, group)| GroupDraw {
            texture,
            args: &group.args,
            data: &group.data,
            instance_count: group.instance_count,
        })
    }

    pub fn capacity(&self, texture: u32) -> Option<usize> {
        self.groups.get(&texture).map(|group| group.capacity)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullGpu;

    impl SpriteGpu for NullGpu {
        type Buffer = ();

        fn create_args_buffer(&mut self, _texture: u32) -> Result<()> {
            Ok(())
        }

        fn create_instance_buffer(&mut self, _texture: u32, _capacity: usize) -> Result<()> {
            Ok(())
        }

        fn write_args(&mut self, _buffer: &(), _args: DrawArgs) {}

        fn write_instances(&mut self, _buffer: &(), _instances: &[InstanceRecord]) {}
    }

    #[test]
    fn min_capacity_is_never_zero() {
        let mut renderer = InstancedRenderer::new(0);
        let mut batches = SpriteBatches::default();
        batches.push(0, InstanceRecord::default());
        renderer.prepare(&mut NullGpu, &batches);
        assert_eq!(renderer.capacity(0), Some(1));
    }

    #[test]
    fn groups_without_batches_stop_drawing() {
        let mut renderer = InstancedRenderer::new(4);
        let mut batches = SpriteBatches::default();
        batches.push(5, InstanceRecord::default());
        renderer.prepare(&mut NullGpu, &batches);
        assert_eq!(renderer.draws().count(), 1);

        batches.clear();
        renderer.prepare(&mut NullGpu, &batches);
        assert_eq!(renderer.draws().count(), 0);
        assert_eq!(renderer.capacity(5), Some(4));
    }
}
