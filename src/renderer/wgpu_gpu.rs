use super::instanced::{DrawArgs, SpriteGpu};
use crate::batch::InstanceRecord;
use crate::error::{Result, SpriteError};
use wgpu::util::DrawIndexedIndirectArgs;

const ARGS_SIZE: u64 = std::mem::size_of::<DrawIndexedIndirectArgs>() as u64;

/// [`SpriteGpu`] over a live wgpu device.
pub struct WgpuSpriteGpu<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
}

impl<'a> WgpuSpriteGpu<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self { device, queue }
    }

    fn allocate(&self, texture: u32, label: &str, size: u64, usage: wgpu::BufferUsages) -> Result<wgpu::Buffer> {
        if size > self.device.limits().max_buffer_size {
            return Err(SpriteError::GpuAllocation { texture, requested: size });
        }
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            log::warn!("[batch] {label} allocation of {size} bytes failed: {err}");
            return Err(SpriteError::GpuAllocation { texture, requested: size });
        }
        Ok(buffer)
    }
}

impl SpriteGpu for WgpuSpriteGpu<'_> {
    type Buffer = wgpu::Buffer;

    fn create_args_buffer(&mut self, texture: u32) -> Result<wgpu::Buffer> {
        self.allocate(
            texture,
            "Sprite Draw Args",
            ARGS_SIZE,
            wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
        )
    }

    fn create_instance_buffer(&mut self, texture: u32, capacity: usize) -> Result<wgpu::Buffer> {
        let size = (capacity as u64).saturating_mul(InstanceRecord::SIZE);
        self.allocate(
            texture,
            "Sprite Instance Buffer",
            size,
            wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        )
    }

    fn write_args(&mut self, buffer: &wgpu::Buffer, args: DrawArgs) {
        let indirect = DrawIndexedIndirectArgs {
            index_count: args.index_count,
            instance_count: args.instance_count,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        };
        self.queue.write_buffer(buffer, 0, indirect.as_bytes());
    }

    fn write_instances(&mut self, buffer: &wgpu::Buffer, instances: &[InstanceRecord]) {
        self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(instances));
    }
}
