//! Sprite records shared by animation, batching and rendering.
//!
//! Raw sprite assets are reduced to [`SpriteInfo`] records stored in one append-only table owned by
//! [`SpriteCache`]. Everything downstream refers to a sprite through its [`CachedSprite`] handle, which is just
//! the record's position in that table.

use crate::config::CacheConfig;
use crate::error::{Result, SpriteError};
use bevy_ecs::prelude::Resource;
use glam::{Vec2, Vec4};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Compact, render-ready description of one sprite frame.
///
/// `uv` holds `(min_x, min_y, max_x, max_y)` normalised to the texture, `size` and `offset` are in world
/// units, and `texture` is the stable index assigned by the cache. Equality and hashing compare the exact bit
/// patterns of every field, which keeps `Eq` lawful for float data.
#[derive(Clone, Copy, Debug)]
pub struct SpriteInfo {
    pub uv: Vec4,
    pub size: Vec2,
    pub offset: Vec2,
    pub texture: u32,
}

impl SpriteInfo {
    fn bits(&self) -> [u32; 9] {
        [
            self.uv.x.to_bits(),
            self.uv.y.to_bits(),
            self.uv.z.to_bits(),
            self.uv.w.to_bits(),
            self.size.x.to_bits(),
            self.size.y.to_bits(),
            self.offset.x.to_bits(),
            self.offset.y.to_bits(),
            self.texture,
        ]
    }
}

impl PartialEq for SpriteInfo {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for SpriteInfo {}

impl Hash for SpriteInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Index into the cached [`SpriteInfo`] table.
///
/// Handles stay valid until [`SpriteCache::clear`]; after a clear they dangle and may alias newly cached
/// sprites.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CachedSprite(u32);

impl CachedSprite {
    /// Rebuilds a handle from a raw index, e.g. one persisted by the host.
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity and dimensions of a physical texture. Two sources are the same texture when their keys match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureSource {
    pub key: Arc<str>,
    pub width: u32,
    pub height: u32,
}

impl TextureSource {
    pub fn new(key: impl Into<Arc<str>>, width: u32, height: u32) -> Self {
        Self { key: key.into(), width, height }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureRecord {
    pub source: TextureSource,
    pub index: u32,
}

/// Pixel rectangle inside a texture, measured from the texture's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SpriteRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

/// A raw sprite as handed over by the asset system.
///
/// `pivot` is in pixels from the bottom-left corner of `rect` (y up); `rect_offset` is the trim offset of a
/// tightly packed sprite and is usually zero.
#[derive(Clone, Debug)]
pub struct SpriteAsset {
    pub texture: TextureSource,
    pub rect: SpriteRect,
    pub pivot: Vec2,
    pub pixels_per_unit: f32,
    pub rect_offset: Vec2,
}

impl SpriteAsset {
    /// Sprite pivoted on the centre of its rect.
    pub fn new(texture: TextureSource, rect: SpriteRect, pixels_per_unit: f32) -> Self {
        let pivot = rect.size() * 0.5;
        Self { texture, rect, pivot, pixels_per_unit, rect_offset: Vec2::ZERO }
    }

    pub fn with_pivot(mut self, pivot: Vec2) -> Self {
        self.pivot = pivot;
        self
    }

    pub fn with_rect_offset(mut self, offset: Vec2) -> Self {
        self.rect_offset = offset;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.texture.width == 0 || self.texture.height == 0 {
            return Err(SpriteError::invalid(format!(
                "texture '{}' has zero size {}x{}",
                self.texture.key, self.texture.width, self.texture.height
            )));
        }
        if !self.pixels_per_unit.is_finite() || self.pixels_per_unit <= 0.0 {
            return Err(SpriteError::invalid(format!(
                "pixels_per_unit must be positive, got {}",
                self.pixels_per_unit
            )));
        }
        let min = self.rect.min();
        let max = self.rect.max();
        if !min.is_finite() || !max.is_finite() || self.rect.width <= 0.0 || self.rect.height <= 0.0 {
            return Err(SpriteError::invalid(format!(
                "sprite rect on '{}' is empty or not finite: {:?}",
                self.texture.key, self.rect
            )));
        }
        if !self.pivot.is_finite() || !self.rect_offset.is_finite() {
            return Err(SpriteError::invalid("sprite pivot must be finite"));
        }
        Ok(())
    }

    /// Computes the record for this sprite given the index of its texture.
    pub fn sprite_info(&self, texture: u32) -> Result<SpriteInfo> {
        self.validate()?;
        let tex = Vec2::new(self.texture.width as f32, self.texture.height as f32);
        let min = self.rect.min() / tex;
        let max = self.rect.max() / tex;
        Ok(SpriteInfo {
            uv: Vec4::new(min.x, min.y, max.x, max.y),
            size: self.rect.size() / self.pixels_per_unit,
            offset: -(self.pivot - self.rect_offset) / self.pixels_per_unit,
            texture,
        })
    }
}

#[derive(Default)]
struct CacheState {
    infos: Vec<SpriteInfo>,
    textures: Vec<TextureRecord>,
    texture_indices: HashMap<Arc<str>, u32>,
    merged: HashMap<SpriteInfo, CachedSprite>,
    merge_duplicates: bool,
}

impl CacheState {
    fn texture_index(&mut self, source: &TextureSource) -> Result<u32> {
        if let Some(&index) = self.texture_indices.get(&source.key) {
            let known = &self.textures[index as usize].source;
            if (known.width, known.height) != (source.width, source.height) {
                return Err(SpriteError::invalid(format!(
                    "texture '{}' is {}x{} but was first cached as {}x{}",
                    source.key, source.width, source.height, known.width, known.height
                )));
            }
            return Ok(index);
        }
        let index = u32::try_from(self.textures.len())
            .map_err(|_| SpriteError::out_of_range("texture table is full"))?;
        self.textures.push(TextureRecord { source: source.clone(), index });
        self.texture_indices.insert(Arc::clone(&source.key), index);
        log::debug!("[sprites] texture '{}' registered as group {index}", source.key);
        Ok(index)
    }

    fn rebuild_merge_index(&mut self) {
        self.merged.clear();
        for (index, info) in self.infos.iter().enumerate() {
            self.merged.entry(*info).or_insert(CachedSprite(index as u32));
        }
    }
}

/// Deduplicating store of sprite records and texture indices.
///
/// Clones share the same table. Writers serialise on one lock; systems take a [`SpriteTable`] read guard once
/// per run and resolve handles through it.
#[derive(Resource, Clone)]
pub struct SpriteCache {
    state: Arc<RwLock<CacheState>>,
}

impl Default for SpriteCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl SpriteCache {
    pub fn new(config: CacheConfig) -> Self {
        let state = CacheState {
            infos: Vec::with_capacity(config.initial_capacity),
            merge_duplicates: config.merge_duplicates,
            ..CacheState::default()
        };
        Self { state: Arc::new(RwLock::new(state)) }
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read(&self) -> SpriteTable<'_> {
        SpriteTable { state: self.state.read().unwrap_or_else(PoisonError::into_inner) }
    }

    pub fn merge_duplicates(&self) -> bool {
        self.read().state.merge_duplicates
    }

    /// Merging trades cache-time work for a smaller table; it only affects sprites cached afterwards.
    pub fn set_merge_duplicates(&self, merge: bool) {
        let mut state = self.write();
        if state.merge_duplicates == merge {
            return;
        }
        state.merge_duplicates = merge;
        if merge {
            state.rebuild_merge_index();
        } else {
            state.merged.clear();
        }
    }

    pub fn cache(&self, asset: &SpriteAsset) -> Result<CachedSprite> {
        asset.validate()?;
        let mut state = self.write();
        let texture = state.texture_index(&asset.texture)?;
        let info = asset.sprite_info(texture)?;

        if state.merge_duplicates {
            if let Some(&existing) = state.merged.get(&info) {
                log::trace!("[sprites] merged duplicate of sprite {}", existing.raw());
                return Ok(existing);
            }
        }

        let handle = u32::try_from(state.infos.len())
            .map(CachedSprite)
            .map_err(|_| SpriteError::out_of_range("sprite table is full"))?;
        state.infos.push(info);
        if state.merge_duplicates {
            state.merged.insert(info, handle);
        }
        log::trace!("[sprites] cached sprite {} on texture {texture}", handle.raw());
        Ok(handle)
    }

    pub fn cache_all(&self, assets: &[SpriteAsset]) -> Result<Vec<CachedSprite>> {
        if assets.is_empty() {
            return Err(SpriteError::invalid("sprite list is empty"));
        }
        assets.iter().map(|asset| self.cache(asset)).collect()
    }

    /// Drops every record and texture. Handles issued before this call are no longer meaningful.
    pub fn clear(&self) {
        let mut state = self.write();
        log::debug!(
            "[sprites] clearing cache ({} sprites, {} textures)",
            state.infos.len(),
            state.textures.len()
        );
        state.infos.clear();
        state.textures.clear();
        state.texture_indices.clear();
        state.merged.clear();
    }

    pub fn sprite_count(&self) -> usize {
        self.read().len()
    }

    pub fn texture_count(&self) -> usize {
        self.read().state.textures.len()
    }

    pub fn info(&self, sprite: CachedSprite) -> Option<SpriteInfo> {
        self.read().get(sprite).copied()
    }

    pub fn texture(&self, index: u32) -> Option<TextureRecord> {
        self.read().state.textures.get(index as usize).cloned()
    }

    pub fn texture_index(&self, key: &str) -> Option<u32> {
        self.read().state.texture_indices.get(key).copied()
    }
}

/// Read guard over the cached records.
pub struct SpriteTable<'a> {
    state: RwLockReadGuard<'a, CacheState>,
}

impl SpriteTable<'_> {
    pub fn get(&self, sprite: CachedSprite) -> Option<&SpriteInfo> {
        self.state.infos.get(sprite.index())
    }

    pub fn texture_of(&self, sprite: CachedSprite) -> Option<u32> {
        self.get(sprite).map(|info| info.texture)
    }

    pub fn len(&self) -> usize {
        self.state.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.infos.is_empty()
    }

    pub fn textures(&self) -> &[TextureRecord] {
        &self.state.textures
    }
}
