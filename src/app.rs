use crate::config::{AppConfig, AppConfigOverrides};
use crate::ecs::{sequence_to_360, RepeatMode, SpriteWorld, Translation};
use crate::renderer::Renderer;
use crate::sprites::{CachedSprite, SpriteAsset, SpriteRect, TextureSource};
use crate::time::FrameTimer;
use anyhow::{Context, Result};
use bevy_ecs::prelude::Entity;
use glam::{Vec2, Vec3};
use rand::Rng;
use std::f32::consts::TAU;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};

const CELL: u32 = 32;
const HALF_HEIGHT: f32 = 12.0;
const STATS_INTERVAL: f32 = 2.0;
const CLAMP_RESTART_INTERVAL: f32 = 5.0;

struct DemoSheet {
    key: String,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    /// Clockwise from 12 o'clock, as authored.
    frames: Vec<CachedSprite>,
    /// Counter-clockwise from +X, for facing-driven sprites.
    directions: Vec<CachedSprite>,
}

struct Mover {
    entity: Entity,
    position: Vec2,
    velocity: Vec2,
    angle: f32,
    spin: f32,
    oriented: bool,
}

struct ClampedSprite {
    entity: Entity,
    frames: Vec<CachedSprite>,
    fps: f32,
}

pub struct App {
    config: AppConfig,
    renderer: Renderer,
    world: SpriteWorld,
    timer: FrameTimer,
    sheets: Vec<DemoSheet>,
    movers: Vec<Mover>,
    clamped: Vec<ClampedSprite>,
    textures_uploaded: bool,
    since_stats: f32,
    since_clamp_restart: f32,
    should_close: bool,
}

pub fn run() -> Result<()> {
    run_with_overrides(AppConfigOverrides::default())
}

pub fn run_with_overrides(overrides: AppConfigOverrides) -> Result<()> {
    let mut config = AppConfig::load_or_default("config/app.json");
    if !overrides.is_empty() {
        log::info!("[cli] overriding {}", overrides.applied_fields().join(", "));
    }
    config.apply_overrides(&overrides);
    let event_loop = EventLoop::new().context("Failed to create winit event loop")?;
    let mut app = App::new(config)?;
    event_loop.run_app(&mut app).context("Event loop execution failed")?;
    Ok(())
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let world = SpriteWorld::new(config.cache);
        let renderer = Renderer::new(&config.window, config.renderer);
        let mut app = Self {
            config,
            renderer,
            world,
            timer: FrameTimer::new(),
            sheets: Vec::new(),
            movers: Vec::new(),
            clamped: Vec::new(),
            textures_uploaded: false,
            since_stats: 0.0,
            since_clamp_restart: 0.0,
            should_close: false,
        };
        app.build_sheets()?;
        app.spawn_swarm()?;
        Ok(app)
    }

    fn build_sheets(&mut self) -> Result<()> {
        let demo = self.config.demo;
        let frame_count = (demo.frames_per_texture.max(4) as usize).next_multiple_of(4);
        for sheet_index in 0..demo.texture_count.max(1) {
            let key = format!("demo/sheet_{sheet_index}");
            let width = CELL * frame_count as u32;
            let source = TextureSource::new(key.as_str(), width, CELL);
            let assets: Vec<SpriteAsset> = (0..frame_count)
                .map(|frame| {
                    let rect = SpriteRect::new((frame as u32 * CELL) as f32, 0.0, CELL as f32, CELL as f32);
                    SpriteAsset::new(source.clone(), rect, CELL as f32)
                })
                .collect();
            let frames = self.world.cache_sprites(&assets).with_context(|| format!("Failed to cache {key}"))?;
            let directions = sequence_to_360(&frames)?;
            let pixels = direction_sheet(sheet_index, frame_count);
            self.sheets.push(DemoSheet { key, width, height: CELL, pixels, frames, directions });
        }
        log::info!(
            "[sprites] cached {} sprites over {} textures",
            self.world.cache().sprite_count(),
            self.world.cache().texture_count()
        );
        Ok(())
    }

    fn spawn_swarm(&mut self) -> Result<()> {
        let demo = self.config.demo;
        let mut rng = rand::thread_rng();
        let half_width = HALF_HEIGHT * self.config.window.width as f32 / self.config.window.height.max(1) as f32;
        for n in 0..demo.sprite_count as usize {
            let sheet = &self.sheets[n % self.sheets.len()];
            let position = Vec2::new(rng.gen_range(-half_width..half_width), rng.gen_range(-HALF_HEIGHT..HALF_HEIGHT));
            let translation = position.extend(rng.gen_range(-1.0..1.0));
            let fps = demo.fps * rng.gen_range(0.5..1.5);
            let oriented = n % 4 == 3;
            let entity = match n % 4 {
                2 => {
                    let entity =
                        self.world.spawn_animated(&sheet.frames, fps, RepeatMode::Clamp, translation)?;
                    self.clamped.push(ClampedSprite { entity, frames: sheet.frames.clone(), fps });
                    entity
                }
                3 => self.world.spawn_oriented(&sheet.directions, translation)?,
                _ if n % 7 == 0 && self.sheets.len() > 1 => {
                    // Sequence spanning two textures: the entity hops texture groups while it plays.
                    let next = &self.sheets[(n + 1) % self.sheets.len()];
                    let frames: Vec<CachedSprite> = sheet.frames.iter().chain(next.frames.iter()).copied().collect();
                    self.world.spawn_animated(&frames, fps, RepeatMode::Loop, translation)?
                }
                _ => self.world.spawn_animated(&sheet.frames, fps, RepeatMode::Loop, translation)?,
            };
            if n % 5 == 0 {
                self.world.set_flip(entity, true, false);
            }
            if n % 3 == 0 {
                self.world.set_scale(entity, rng.gen_range(0.5..1.5));
            }
            let speed: f32 = rng.gen_range(0.5..3.0);
            let heading: f32 = rng.gen_range(0.0..TAU);
            self.movers.push(Mover {
                entity,
                position,
                velocity: Vec2::from_angle(heading) * speed,
                angle: heading,
                spin: if oriented { 0.0 } else { rng.gen_range(-1.0..1.0) },
                oriented,
            });
        }
        log::info!("[sprites] spawned {} sprites", self.movers.len());
        Ok(())
    }

    fn upload_textures(&mut self) -> Result<()> {
        for sheet in &self.sheets {
            let index = self
                .world
                .cache()
                .texture_index(&sheet.key)
                .with_context(|| format!("Texture {} was never cached", sheet.key))?;
            self.renderer.upload_texture(index, sheet.width, sheet.height, &sheet.pixels)?;
        }
        self.textures_uploaded = true;
        Ok(())
    }

    fn move_swarm(&mut self, dt: f32) {
        let size = self.renderer.size();
        let half_height = HALF_HEIGHT;
        let half_width = half_height * size.width.max(1) as f32 / size.height.max(1) as f32;
        for mover in &mut self.movers {
            mover.position += mover.velocity * dt;
            if mover.position.x.abs() > half_width {
                mover.velocity.x = -mover.velocity.x;
                mover.position.x = mover.position.x.clamp(-half_width, half_width);
            }
            if mover.position.y.abs() > half_height {
                mover.velocity.y = -mover.velocity.y;
                mover.position.y = mover.position.y.clamp(-half_height, half_height);
            }
            mover.angle = if mover.oriented {
                mover.velocity.y.atan2(mover.velocity.x)
            } else {
                (mover.angle + mover.spin * dt).rem_euclid(TAU)
            };
            let z = self.world.world.get::<Translation>(mover.entity).map_or(0.0, |t| t.0.z);
            self.world.set_translation(mover.entity, Vec3::new(mover.position.x, mover.position.y, z));
            self.world.set_rotation(mover.entity, mover.angle);
        }
    }

    fn restart_clamped(&mut self) {
        for sprite in &self.clamped {
            if let Err(err) =
                self.world.attach_animation(sprite.entity, &sprite.frames, sprite.fps, RepeatMode::Clamp)
            {
                log::warn!("[sprites] restarting {} failed: {err}", sprite.entity);
            }
        }
    }

    fn frame(&mut self) -> Result<()> {
        let dt = self.timer.tick();
        self.move_swarm(dt);
        self.since_clamp_restart += dt;
        if self.since_clamp_restart >= CLAMP_RESTART_INTERVAL {
            self.since_clamp_restart = 0.0;
            self.restart_clamped();
        }
        self.world.update(dt);

        let view_proj = self.renderer.view_projection(HALF_HEIGHT);
        let stats = self.renderer.render_frame(self.world.batches(), view_proj)?;

        self.since_stats += dt;
        if self.since_stats >= STATS_INTERVAL {
            self.since_stats = 0.0;
            let slowest = self.world.system_timings().first().map(|t| format!("{} {:.3}ms", t.name, t.last_ms));
            log::info!(
                "[sprites] {:.1} fps | {} instances in {} draws | slowest system: {}",
                self.timer.fps(),
                stats.prepare.instances_uploaded,
                stats.draw_calls,
                slowest.as_deref().unwrap_or("n/a")
            );
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Err(err) = self.renderer.ensure_window(event_loop) {
            log::error!("Renderer initialization error: {err:?}");
            self.should_close = true;
            return;
        }
        if !self.textures_uploaded {
            if let Err(err) = self.upload_textures() {
                log::error!("Texture upload failed: {err:?}");
                self.should_close = true;
            }
        }
    }

    fn window_event(&mut self, _el: &ActiveEventLoop, _id: winit::window::WindowId, event: WindowEvent) {
        match &event {
            WindowEvent::CloseRequested => self.should_close = true,
            WindowEvent::Resized(size) => self.renderer.resize(*size),
            WindowEvent::KeyboardInput { event: KeyEvent { logical_key, state, .. }, .. } => {
                if let Key::Named(NamedKey::Escape) = logical_key {
                    if *state == ElementState::Pressed {
                        self.should_close = true;
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close {
            event_loop.exit();
            return;
        }
        if self.renderer.window().is_none() {
            return;
        }
        if let Err(err) = self.frame() {
            log::warn!("Frame error: {err:?}");
        }
    }
}

/// RGBA pixels for a row of direction frames, clockwise from 12 o'clock: a disc with a pointer arm.
fn direction_sheet(sheet_index: u32, frame_count: usize) -> Vec<u8> {
    let width = CELL as usize * frame_count;
    let height = CELL as usize;
    let mut pixels = vec![0u8; width * height * 4];
    let hue = sheet_index as f32 * 0.37;
    let body = [
        (128.0 + 127.0 * (hue * TAU).cos()) as u8,
        (128.0 + 127.0 * ((hue + 0.33) * TAU).cos()) as u8,
        (128.0 + 127.0 * ((hue + 0.67) * TAU).cos()) as u8,
        255,
    ];
    let center = CELL as f32 * 0.5;
    for frame in 0..frame_count {
        // Clockwise from up, in image space where y grows downwards.
        let angle = frame as f32 / frame_count as f32 * TAU;
        let arm = Vec2::new(angle.sin(), -angle.cos());
        for y in 0..height {
            for x in 0..CELL as usize {
                let p = Vec2::new(x as f32 + 0.5 - center, y as f32 + 0.5 - center);
                let along = p.dot(arm);
                let across = (p - arm * along).length();
                let color = if along > 0.0 && along < center * 0.95 && across < 2.0 {
                    [255, 255, 255, 255]
                } else if p.length() < center * 0.6 {
                    body
                } else {
                    continue;
                };
                let offset = (y * width + frame * CELL as usize + x) * 4;
                pixels[offset..offset + 4].copy_from_slice(&color);
            }
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_sheet_has_one_cell_per_frame() {
        let pixels = direction_sheet(0, 8);
        assert_eq!(pixels.len(), (CELL as usize * 8) * CELL as usize * 4);
        let centre = ((CELL as usize / 2) * CELL as usize * 8 + CELL as usize / 2) * 4;
        assert_eq!(pixels[centre + 3], 255, "cell centre should be opaque");
        assert_eq!(pixels[3], 0, "cell corner should be transparent");
    }
}
