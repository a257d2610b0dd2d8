use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "WindowConfig::default_title")]
    pub title: String,
    #[serde(default = "WindowConfig::default_width")]
    pub width: u32,
    #[serde(default = "WindowConfig::default_height")]
    pub height: u32,
    #[serde(default = "WindowConfig::default_vsync")]
    pub vsync: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub merge_duplicates: bool,
    #[serde(default = "CacheConfig::default_initial_capacity")]
    pub initial_capacity: usize,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RendererConfig {
    /// Smallest instance buffer allocated for a texture group.
    #[serde(default = "RendererConfig::default_min_instance_capacity")]
    pub min_instance_capacity: usize,
    #[serde(default = "RendererConfig::default_clear_color")]
    pub clear_color: [f64; 4],
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "DemoConfig::default_sprite_count")]
    pub sprite_count: u32,
    #[serde(default = "DemoConfig::default_fps")]
    pub fps: f32,
    #[serde(default = "DemoConfig::default_texture_count")]
    pub texture_count: u32,
    #[serde(default = "DemoConfig::default_frames_per_texture")]
    pub frames_per_texture: u32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vsync: Option<bool>,
    pub sprite_count: Option<u32>,
    pub merge_duplicates: Option<bool>,
}

impl WindowConfig {
    fn default_title() -> String {
        "Kestrel Sprite Swarm".to_string()
    }

    const fn default_width() -> u32 {
        1280
    }

    const fn default_height() -> u32 {
        720
    }

    const fn default_vsync() -> bool {
        true
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            width: Self::default_width(),
            height: Self::default_height(),
            vsync: Self::default_vsync(),
        }
    }
}

impl CacheConfig {
    const fn default_initial_capacity() -> usize {
        2048
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { merge_duplicates: false, initial_capacity: Self::default_initial_capacity() }
    }
}

impl RendererConfig {
    const fn default_min_instance_capacity() -> usize {
        256
    }

    const fn default_clear_color() -> [f64; 4] {
        [0.05, 0.06, 0.1, 1.0]
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            min_instance_capacity: Self::default_min_instance_capacity(),
            clear_color: Self::default_clear_color(),
        }
    }
}

impl DemoConfig {
    const fn default_sprite_count() -> u32 {
        10_000
    }

    const fn default_fps() -> f32 {
        12.0
    }

    const fn default_texture_count() -> u32 {
        3
    }

    const fn default_frames_per_texture() -> u32 {
        8
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            sprite_count: Self::default_sprite_count(),
            fps: Self::default_fps(),
            texture_count: Self::default_texture_count(),
            frames_per_texture: Self::default_frames_per_texture(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(vsync) = overrides.vsync {
            self.window.vsync = vsync;
        }
        if let Some(count) = overrides.sprite_count {
            self.demo.sprite_count = count;
        }
        if let Some(merge) = overrides.merge_duplicates {
            self.cache.merge_duplicates = merge;
        }
    }
}

impl AppConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.applied_fields().is_empty()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.width.is_some() {
            fields.push("width");
        }
        if self.height.is_some() {
            fields.push("height");
        }
        if self.vsync.is_some() {
            fields.push("vsync");
        }
        if self.sprite_count.is_some() {
            fields.push("sprites");
        }
        if self.merge_duplicates.is_some() {
            fields.push("merge_duplicates");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_config_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "cache": {{ "merge_duplicates": true }}, "demo": {{ "sprite_count": 64 }} }}"#)
            .expect("write config");
        let cfg = AppConfig::load(file.path()).expect("config should parse");
        assert!(cfg.cache.merge_duplicates);
        assert_eq!(cfg.cache.initial_capacity, 2048);
        assert_eq!(cfg.demo.sprite_count, 64);
        assert_eq!(cfg.window.width, 1280);
        assert_eq!(cfg.renderer.min_instance_capacity, 256);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = AppConfig::load_or_default(dir.path().join("absent.json"));
        assert_eq!(cfg.window.height, 720);
        assert!(!cfg.cache.merge_duplicates);
    }

    #[test]
    fn overrides_replace_selected_fields() {
        let mut cfg = AppConfig::default();
        let overrides = AppConfigOverrides {
            width: Some(640),
            sprite_count: Some(12),
            merge_duplicates: Some(true),
            ..Default::default()
        };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.window.width, 640);
        assert_eq!(cfg.window.height, 720);
        assert_eq!(cfg.demo.sprite_count, 12);
        assert!(cfg.cache.merge_duplicates);
        assert_eq!(overrides.applied_fields(), vec!["width", "sprites", "merge_duplicates"]);
        assert!(AppConfigOverrides::default().is_empty());
    }
}
