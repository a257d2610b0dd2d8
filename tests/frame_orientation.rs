use glam::Vec3;
use kestrel_sprites::ecs::systems::orientation_frame;
use kestrel_sprites::ecs::{sequence_to_360, OrientedFrames, Rotation, SpriteAnimation};
use kestrel_sprites::{CachedSprite, SpriteAsset, SpriteError, SpriteRect, SpriteWorld, TextureSource};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

fn directions(world: &SpriteWorld, count: u32) -> Vec<CachedSprite> {
    let texture = TextureSource::new("compass", 16 * count, 16);
    let assets: Vec<_> = (0..count)
        .map(|frame| SpriteAsset::new(texture.clone(), SpriteRect::new(frame as f32 * 16.0, 0.0, 16.0, 16.0), 16.0))
        .collect();
    world.cache_sprites(&assets).expect("cache directions")
}

#[test]
fn angle_zero_is_always_frame_zero() {
    for count in 1..=32 {
        assert_eq!(orientation_frame(0.0, count), 0, "count {count}");
    }
}

#[test]
fn orientation_is_pure_and_in_range() {
    let mut angle = -3.0 * TAU;
    while angle < 3.0 * TAU {
        for count in [1, 2, 3, 4, 8, 16, 36] {
            let frame = orientation_frame(angle, count);
            assert!(frame < count, "angle {angle} count {count} gave {frame}");
            assert_eq!(frame, orientation_frame(angle, count), "same angle must give the same frame");
        }
        angle += 0.173;
    }
}

#[test]
fn frames_go_counter_clockwise_from_east() {
    assert_eq!(orientation_frame(FRAC_PI_2, 8), 2);
    assert_eq!(orientation_frame(PI, 8), 4);
    assert_eq!(orientation_frame(-FRAC_PI_2, 8), 6, "negative angles wrap into [0, 2pi)");
    assert_eq!(orientation_frame(TAU - 0.01, 8), 0, "rounding up to the count wraps to frame 0");
    assert_eq!(orientation_frame(PI / 8.0 - 0.01, 8), 0);
    assert_eq!(orientation_frame(PI / 8.0 + 0.01, 8), 1);
}

#[test]
fn oriented_entity_follows_its_rotation() {
    let mut world = SpriteWorld::default();
    let frames = directions(&world, 8);
    let entity = world.spawn_oriented(&frames, Vec3::ZERO).expect("spawn oriented");
    assert!(world.world.get::<OrientedFrames>(entity).is_some());

    world.update(0.016);
    assert_eq!(world.current_frame(entity), Some(0));

    world.set_rotation(entity, FRAC_PI_2);
    world.update(0.016);
    assert_eq!(world.current_frame(entity), Some(2));
    assert_eq!(world.visible_sprite(entity).map(|visible| visible.sprite), Some(frames[2]));

    world.set_rotation(entity, -FRAC_PI_2);
    world.update(10.0);
    assert_eq!(world.current_frame(entity), Some(6), "frame tracks orientation, not time");

    let animation = world.world.get::<SpriteAnimation>(entity).expect("animation");
    assert_eq!(animation.next_frame_due, None, "oriented sprites never use the clock");
}

#[test]
fn oriented_instances_carry_no_rotation() {
    let mut world = SpriteWorld::default();
    let frames = directions(&world, 8);
    let oriented = world.spawn_oriented(&frames, Vec3::ZERO).expect("spawn oriented");
    let spinning = world.spawn_sprite(frames[0], Vec3::X).expect("spawn sprite");
    world.set_rotation(oriented, FRAC_PI_2);
    world.set_rotation(spinning, FRAC_PI_2);
    world.update(0.016);

    let batch = world.batches().get(0).expect("compass batch");
    assert_eq!(batch.len(), 2);
    let (mut rotated, mut unrotated) = (0, 0);
    for record in batch.instances() {
        if (record.rotation() - FRAC_PI_2).abs() < 1e-5 {
            rotated += 1;
        } else if record.rotation() == 0.0 {
            unrotated += 1;
        }
    }
    assert_eq!((rotated, unrotated), (1, 1), "only the non-oriented sprite is rotated on the GPU");
}

#[test]
fn orientation_attach_switches_back_to_clock() {
    let mut world = SpriteWorld::default();
    let frames = directions(&world, 4);
    let entity = world.spawn_oriented(&frames, Vec3::ZERO).expect("spawn oriented");
    world
        .attach_animation(entity, &frames, 2.0, kestrel_sprites::RepeatMode::Loop)
        .expect("attach clock animation");
    assert!(world.world.get::<OrientedFrames>(entity).is_none());
    world.set_rotation(entity, PI);
    world.update(0.0);
    assert_eq!(world.current_frame(entity), Some(0));
    world.update(0.5);
    assert_eq!(world.current_frame(entity), Some(1));
}

#[test]
fn clockwise_sheet_becomes_counter_clockwise_from_east() {
    // Clockwise from 12 o'clock: c0 = N, c1 = NE, c2 = E, c3 = SE, c4 = S, c5 = SW, c6 = W, c7 = NW.
    let clockwise = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let reordered = sequence_to_360(&clockwise).expect("reorder");
    assert_eq!(reordered, vec!["E", "NE", "N", "NW", "W", "SW", "S", "SE"]);

    // Frame k of the reordered sheet must match the direction orientation_frame picks for angle k * 45deg.
    let headings = ["E", "NE", "N", "NW", "W", "SW", "S", "SE"];
    for (k, expected) in headings.iter().enumerate() {
        let angle = k as f32 * TAU / 8.0;
        assert_eq!(reordered[orientation_frame(angle, 8)], *expected);
    }
}

#[test]
fn sequence_to_360_requires_multiple_of_four() {
    assert!(matches!(sequence_to_360(&[0u8; 6]), Err(SpriteError::InvalidArgument(_))));
    assert!(matches!(sequence_to_360::<u8>(&[]), Err(SpriteError::InvalidArgument(_))));
    assert_eq!(sequence_to_360(&[1, 2, 3, 4]).expect("four directions"), vec![2, 1, 4, 3]);
}
