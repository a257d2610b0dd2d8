use crate::config::WindowConfig;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

/// Swapchain image acquired for one sprite frame.
pub struct SurfaceFrame {
    view: wgpu::TextureView,
    texture: wgpu::SurfaceTexture,
}

impl SurfaceFrame {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn present(self) {
        self.texture.present();
    }
}

/// Everything that only exists once the window is open.
struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
}

impl Gpu {
    async fn open(window: Arc<Window>, vsync: bool) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window.clone()).context("Failed to create WGPU surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to request WGPU adapter")?;
        // Every texture group is drawn through an indirect args buffer.
        if !adapter.get_downlevel_capabilities().flags.contains(wgpu::DownlevelFlags::INDIRECT_EXECUTION) {
            return Err(anyhow!("Adapter does not support indirect draws"));
        }
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Sprite Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
            })
            .await
            .context("Failed to request WGPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: preferred_format(&caps.formats)?,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if vsync { wgpu::PresentMode::AutoVsync } else { wgpu::PresentMode::AutoNoVsync },
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "[sprites] surface {}x{} {:?} ({:?}) on {}",
            config.width,
            config.height,
            config.format,
            config.present_mode,
            adapter.get_info().name
        );
        Ok(Self { surface, device, queue, config })
    }

    fn reconfigure(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
    }
}

/// sRGB first so sprite colours are not washed out, otherwise whatever the surface lists first.
fn preferred_format(formats: &[wgpu::TextureFormat]) -> Result<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(wgpu::TextureFormat::is_srgb)
        .or_else(|| formats.first().copied())
        .context("Surface reports no supported formats")
}

/// The demo window and the device the sprite pass renders with. Both are created lazily on `resumed`.
pub struct WindowSurface {
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    size: PhysicalSize<u32>,
    title: String,
    vsync: bool,
}

impl WindowSurface {
    pub fn new(window: &WindowConfig) -> Self {
        Self {
            window: None,
            gpu: None,
            size: PhysicalSize::new(window.width, window.height),
            title: window.title.clone(),
            vsync: window.vsync,
        }
    }

    /// Opens the window and the GPU device on first call. Returns whether this call created them.
    pub fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Result<bool> {
        if self.window.is_some() {
            return Ok(false);
        }
        let attrs = Window::default_attributes().with_title(self.title.clone()).with_inner_size(self.size);
        let window = Arc::new(event_loop.create_window(attrs).context("Failed to create window")?);
        let gpu = pollster::block_on(Gpu::open(window.clone(), self.vsync))?;
        self.size = window.inner_size();
        self.gpu = Some(gpu);
        self.window = Some(window);
        Ok(true)
    }

    fn gpu(&self) -> Result<&Gpu> {
        self.gpu.as_ref().context("GPU not initialized")
    }

    pub fn device(&self) -> Result<&wgpu::Device> {
        Ok(&self.gpu()?.device)
    }

    pub fn queue(&self) -> Result<&wgpu::Queue> {
        Ok(&self.gpu()?.queue)
    }

    pub fn surface_format(&self) -> Result<wgpu::TextureFormat> {
        Ok(self.gpu()?.config.format)
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn window(&self) -> Option<&Window> {
        self.window.as_deref()
    }

    /// Records the new size; the surface is reconfigured once it has a non-zero area.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.size = size;
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.reconfigure(size);
        }
    }

    /// A lost or outdated surface is reconfigured before the error is returned, so the next frame can
    /// succeed.
    pub fn acquire_surface_frame(&mut self) -> Result<SurfaceFrame> {
        let size = self.size;
        let gpu = self.gpu.as_mut().context("GPU not initialized")?;
        match gpu.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
                Ok(SurfaceFrame { view, texture })
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.reconfigure(size);
                Err(anyhow!("Surface lost or outdated; reconfigured {}x{}", size.width, size.height))
            }
            Err(err) => Err(anyhow!("Failed to acquire surface frame: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_format_wins_over_listed_order() {
        let formats = [wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Bgra8UnormSrgb];
        assert_eq!(preferred_format(&formats).expect("format"), wgpu::TextureFormat::Bgra8UnormSrgb);
        let linear = [wgpu::TextureFormat::Rgba16Float];
        assert_eq!(preferred_format(&linear).expect("fallback"), wgpu::TextureFormat::Rgba16Float);
        assert!(preferred_format(&[]).is_err());
    }

    #[test]
    fn surface_is_unusable_until_window_opens() {
        let config = WindowConfig { width: 640, height: 360, ..WindowConfig::default() };
        let mut surface = WindowSurface::new(&config);
        assert_eq!(surface.size(), PhysicalSize::new(640, 360));
        assert!(surface.device().is_err());
        assert!(surface.acquire_surface_frame().is_err());

        surface.resize(PhysicalSize::new(0, 0));
        assert_eq!(surface.size(), PhysicalSize::new(0, 0), "minimised size is still recorded");
        assert!(surface.window().is_none());
    }
}
