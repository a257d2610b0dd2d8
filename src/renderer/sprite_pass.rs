use std::collections::{HashMap, HashSet};

use glam::Mat4;
use wgpu::util::DeviceExt;

use super::instanced::{InstancedRenderer, PrepareStats, QUAD_INDEX_COUNT};
use super::wgpu_gpu::WgpuSpriteGpu;
use crate::batch::{InstanceRecord, SpriteBatches};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
}

const QUAD_VERTICES: [[f32; 5]; 4] = [
    [-0.5, 0.5, 0.0, 0.0, 0.0],
    [0.5, 0.5, 0.0, 1.0, 0.0],
    [0.5, -0.5, 0.0, 1.0, 1.0],
    [-0.5, -0.5, 0.0, 0.0, 1.0],
];
const QUAD_INDICES: [u16; QUAD_INDEX_COUNT as usize] = [0, 1, 2, 0, 2, 3];

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![2 => Float32x4, 3 => Float32x4, 4 => Float32x4, 5 => Float32x4];

/// Instanced sprite pipeline: one indirect draw per texture group.
pub struct SpritePass {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    globals_buf: wgpu::Buffer,
    globals_bg: wgpu::BindGroup,
    texture_bgl: wgpu::BindGroupLayout,
    texture_bind_groups: HashMap<u32, wgpu::BindGroup>,
    missing_textures: HashSet<u32>,
    instances: InstancedRenderer<wgpu::Buffer>,
}

impl SpritePass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, min_instance_capacity: usize) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sprite Instanced Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../assets/shaders/sprite_instanced.wgsl").into()),
        });

        let globals_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Globals BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sprite Globals Buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sprite Globals BG"),
            layout: &globals_bgl,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: globals_buf.as_entire_binding() }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Texture BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sprite Quad VB"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sprite Quad IB"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&globals_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sprite Instanced Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 5]>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            wgpu::VertexAttribute {
                                shader_location: 0,
                                format: wgpu::VertexFormat::Float32x3,
                                offset: 0,
                            },
                            wgpu::VertexAttribute {
                                shader_location: 1,
                                format: wgpu::VertexFormat::Float32x2,
                                offset: 12,
                            },
                        ],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: InstanceRecord::SIZE,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &INSTANCE_ATTRIBUTES,
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState { topology: wgpu::PrimitiveTopology::TriangleList, ..Default::default() },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            globals_buf,
            globals_bg,
            texture_bgl,
            texture_bind_groups: HashMap::new(),
            missing_textures: HashSet::new(),
            instances: InstancedRenderer::new(min_instance_capacity),
        }
    }

    /// Binds the texture of group `index`. Registering again replaces the previous binding.
    pub fn register_texture(
        &mut self,
        device: &wgpu::Device,
        index: u32,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sprite Texture BG"),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
            ],
        });
        self.texture_bind_groups.insert(index, bind_group);
        self.missing_textures.remove(&index);
    }

    pub fn write_globals(&self, queue: &wgpu::Queue, view_proj: Mat4) {
        let globals = Globals { view_proj: view_proj.to_cols_array_2d() };
        queue.write_buffer(&self.globals_buf, 0, bytemuck::bytes_of(&globals));
    }

    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, batches: &SpriteBatches) -> PrepareStats {
        let mut gpu = WgpuSpriteGpu::new(device, queue);
        let stats = self.instances.prepare(&mut gpu, batches);
        for draw in self.instances.draws() {
            if !self.texture_bind_groups.contains_key(&draw.texture) && self.missing_textures.insert(draw.texture) {
                log::warn!("[batch] texture group {} has no registered texture; not drawn", draw.texture);
            }
        }
        stats
    }

    /// Issues the draws prepared by [`SpritePass::prepare`]. Returns the number of draw calls.
    pub fn encode(&self, pass: &mut wgpu::RenderPass<'_>) -> usize {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.globals_bg, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

        let mut draw_calls = 0;
        for draw in self.instances.draws() {
            let Some(bind_group) = self.texture_bind_groups.get(&draw.texture) else {
                continue;
            };
            pass.set_bind_group(1, bind_group, &[]);
            pass.set_vertex_buffer(1, draw.data.slice(..));
            pass.draw_indexed_indirect(draw.args, 0);
            draw_calls += 1;
        }
        draw_calls
    }
}
