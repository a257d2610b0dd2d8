pub mod instanced;
pub mod sprite_pass;
pub mod wgpu_gpu;
mod window_surface;

use crate::batch::SpriteBatches;
use crate::config::{RendererConfig, WindowConfig};
use anyhow::{anyhow, Context, Result};
use glam::Mat4;
use std::collections::HashMap;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

pub use instanced::{DrawArgs, GroupDraw, InstancedRenderer, PrepareStats, SpriteGpu};
pub use sprite_pass::SpritePass;
pub use wgpu_gpu::WgpuSpriteGpu;
pub use window_surface::{SurfaceFrame, WindowSurface};

#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    pub prepare: PrepareStats,
    pub draw_calls: usize,
}

/// Window, device and the instanced sprite pass.
pub struct Renderer {
    surface: WindowSurface,
    sprite_pass: Option<SpritePass>,
    sampler: Option<wgpu::Sampler>,
    textures: HashMap<u32, wgpu::Texture>,
    config: RendererConfig,
}

impl Renderer {
    pub fn new(window: &WindowConfig, config: RendererConfig) -> Self {
        Self { surface: WindowSurface::new(window), sprite_pass: None, sampler: None, textures: HashMap::new(), config }
    }

    pub fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        if !self.surface.ensure_window(event_loop)? {
            return Ok(());
        }
        let device = self.surface.device()?;
        let format = self.surface.surface_format()?;
        self.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }));
        self.sprite_pass = Some(SpritePass::new(device, format, self.config.min_instance_capacity));
        Ok(())
    }

    pub fn window(&self) -> Option<&Window> {
        self.surface.window()
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.surface.size()
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.surface.resize(size);
    }

    /// Uploads RGBA8 pixels as the texture of group `index`.
    pub fn upload_texture(&mut self, index: u32, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(anyhow!("Texture {index} expects {expected} bytes, got {}", rgba.len()));
        }
        let device = self.surface.device()?;
        let queue = self.surface.queue()?;
        let extent = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Sprite Group Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(4 * width), rows_per_image: Some(height) },
            extent,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.sampler.as_ref().context("Sprite sampler missing")?;
        let pass = self.sprite_pass.as_mut().context("Sprite pass not initialized")?;
        pass.register_texture(device, index, &view, sampler);

        self.textures.insert(index, texture);
        Ok(())
    }

    /// Orthographic projection showing `half_height` world units above and below the origin.
    pub fn view_projection(&self, half_height: f32) -> Mat4 {
        let size = self.surface.size();
        let aspect = if size.height == 0 { 1.0 } else { size.width as f32 / size.height as f32 };
        let half_width = half_height * aspect;
        Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, -100.0, 100.0)
    }

    pub fn render_frame(&mut self, batches: &SpriteBatches, view_proj: Mat4) -> Result<FrameStats> {
        let frame = self.surface.acquire_surface_frame()?;
        let device = self.surface.device()?;
        let queue = self.surface.queue()?;
        let pass = self.sprite_pass.as_mut().context("Sprite pass not initialized")?;

        pass.write_globals(queue, view_proj);
        let prepare = pass.prepare(device, queue, batches);

        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Sprite Encoder") });
        let [r, g, b, a] = self.config.clear_color;
        let draw_calls = {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Sprite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.view(),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.encode(&mut render_pass)
        };
        queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(FrameStats { prepare, draw_calls })
    }
}
