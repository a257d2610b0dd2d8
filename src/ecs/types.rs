use crate::sprites::CachedSprite;
use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};

// ---------- Host transform inputs ----------
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Translation(pub Vec3);

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Rotation(pub Quat);
impl Default for Rotation {
    fn default() -> Self {
        Self(Quat::IDENTITY)
    }
}
impl Rotation {
    pub fn from_angle(radians: f32) -> Self {
        Self(Quat::from_rotation_z(radians))
    }

    /// Facing angle in `(-PI, PI]`: the direction the local +X axis points to after rotation.
    pub fn facing_angle(&self) -> f32 {
        let v = self.0 * Vec3::X;
        v.y.atan2(v.x)
    }
}

/// Uniform scale; entities without it render at scale 1.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Scale(pub f32);
impl Default for Scale {
    fn default() -> Self {
        Self(1.0)
    }
}

// ---------- Sprite state ----------
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RepeatMode {
    #[default]
    Loop,
    Clamp,
}

impl RepeatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loop => "loop",
            Self::Clamp => "clamp",
        }
    }
}

/// Per-entity animation schedule.
///
/// `current_frame` is `None` until the first commit; afterwards it always indexes into the entity's
/// [`SpriteSequence`]. A zero `frame_delay` marks a static sprite the clock never advances.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct SpriteAnimation {
    pub current_frame: Option<usize>,
    pub frame_count: usize,
    pub frame_delay: f32,
    pub next_frame_due: Option<f64>,
    pub repeat: RepeatMode,
}

impl SpriteAnimation {
    pub fn new(frame_count: usize, fps: f32, repeat: RepeatMode) -> Self {
        let frame_delay = if fps > 0.0 { 1.0 / fps } else { 0.0 };
        Self { current_frame: None, frame_count, frame_delay, next_frame_due: None, repeat }
    }

    pub fn is_static(&self) -> bool {
        self.frame_delay <= 0.0
    }

    /// Frame that follows the current one under the repeat policy.
    pub fn following_frame(&self) -> usize {
        let candidate = self.current_frame.map_or(0, |frame| frame + 1);
        if candidate < self.frame_count {
            return candidate;
        }
        match self.repeat {
            RepeatMode::Loop => 0,
            RepeatMode::Clamp => self.current_frame.unwrap_or(0),
        }
    }
}

/// Frame the commit stage should show next. Written by the selection systems only.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingFrame(pub usize);

#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct SpriteSequence(pub Vec<CachedSprite>);
impl SpriteSequence {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, frame: usize) -> Option<CachedSprite> {
        self.0.get(frame).copied()
    }
}

/// The sprite currently on screen. `texture` mirrors the sprite's texture so the render path and the commit
/// stage never need a table lookup to know the group.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisibleSprite {
    pub sprite: CachedSprite,
    pub texture: u32,
}

/// Texture group membership used for batching. Only rewritten through deferred commands.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureGroup(pub u32);

#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpriteFlip {
    pub x: bool,
    pub y: bool,
}

/// Frame is chosen from the entity's facing angle instead of the clock.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct OrientedFrames;
