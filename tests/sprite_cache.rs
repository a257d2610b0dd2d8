use glam::{Vec2, Vec4};
use kestrel_sprites::config::CacheConfig;
use kestrel_sprites::{CachedSprite, SpriteAsset, SpriteCache, SpriteError, SpriteRect, TextureSource};
use std::collections::HashSet;
use std::thread;

fn sheet(key: &str) -> TextureSource {
    TextureSource::new(key, 64, 32)
}

fn cell(texture: &TextureSource, column: u32) -> SpriteAsset {
    SpriteAsset::new(texture.clone(), SpriteRect::new(column as f32 * 16.0, 0.0, 16.0, 16.0), 16.0)
}

fn approx(a: Vec4, b: Vec4) -> bool {
    (a - b).abs().max_element() < 1e-6
}

#[test]
fn handles_are_strictly_increasing_without_merging() {
    let cache = SpriteCache::default();
    let texture = sheet("hero");
    let first = cache.cache(&cell(&texture, 0)).expect("cache first");
    let again = cache.cache(&cell(&texture, 0)).expect("cache identical asset");
    let second = cache.cache(&cell(&texture, 1)).expect("cache second");
    assert!(first < again && again < second, "handles should grow: {first:?} {again:?} {second:?}");
    assert_eq!(cache.sprite_count(), 3);
}

#[test]
fn merging_returns_existing_handle_for_identical_info() {
    let cache = SpriteCache::new(CacheConfig { merge_duplicates: true, ..CacheConfig::default() });
    let texture = sheet("hero");
    let first = cache.cache(&cell(&texture, 2)).expect("cache first");
    let duplicate = cache.cache(&cell(&texture, 2)).expect("cache duplicate");
    let other = cache.cache(&cell(&texture, 3)).expect("cache other");
    assert_eq!(first, duplicate, "structurally identical sprite should be merged");
    assert_ne!(first, other);
    assert_eq!(cache.sprite_count(), 2);
}

#[test]
fn enabling_merge_later_indexes_existing_sprites() {
    let cache = SpriteCache::default();
    let texture = sheet("hero");
    let first = cache.cache(&cell(&texture, 0)).expect("cache first");
    cache.set_merge_duplicates(true);
    assert!(cache.merge_duplicates());
    let merged = cache.cache(&cell(&texture, 0)).expect("cache after toggle");
    assert_eq!(first, merged);
}

#[test]
fn sprites_on_one_texture_share_a_texture_record() {
    let cache = SpriteCache::default();
    let texture = sheet("shared");
    let a = cache.cache(&cell(&texture, 0)).expect("cache A");
    let b = cache.cache(&cell(&texture, 1)).expect("cache B");

    assert_eq!(cache.texture_count(), 1, "only one texture index should exist");
    let record = cache.texture(0).expect("texture record");
    assert_eq!(record.source, texture);
    assert_eq!(cache.texture_index("shared"), Some(0));

    let info_a = cache.info(a).expect("info A");
    let info_b = cache.info(b).expect("info B");
    assert_eq!(info_a.texture, info_b.texture);
    assert_ne!(info_a.uv, info_b.uv, "entries should differ in UV");
    assert_ne!(info_a, info_b);
}

#[test]
fn new_textures_get_new_indices() {
    let cache = SpriteCache::default();
    cache.cache(&cell(&sheet("a"), 0)).expect("cache a");
    let b = cache.cache(&cell(&sheet("b"), 0)).expect("cache b");
    let again = cache.cache(&cell(&sheet("a"), 1)).expect("cache a again");

    assert_eq!(cache.texture_count(), 2);
    assert_eq!(cache.info(b).map(|info| info.texture), Some(1));
    assert_eq!(cache.info(again).map(|info| info.texture), Some(0));
}

#[test]
fn same_key_with_other_dimensions_is_rejected() {
    let cache = SpriteCache::default();
    cache.cache(&cell(&sheet("a"), 0)).expect("cache a");
    let resized = SpriteAsset::new(TextureSource::new("a", 128, 128), SpriteRect::new(0.0, 0.0, 8.0, 8.0), 8.0);

    assert!(matches!(cache.cache(&resized), Err(SpriteError::InvalidArgument(_))));
    assert_eq!(cache.sprite_count(), 1, "mismatched sprite must not be stored");
    assert_eq!(cache.texture(0).expect("record a").source.width, 64);

    cache.clear();
    cache.cache(&resized).expect("a cleared cache accepts the new dimensions");
    assert_eq!(cache.texture(0).expect("record a").source.width, 128);
}

#[test]
fn sprite_info_is_normalised_and_pivot_relative() {
    let cache = SpriteCache::default();
    let texture = sheet("math");
    let centred = cache.cache(&cell(&texture, 1)).expect("cache centred");
    let info = cache.info(centred).expect("info");
    assert!(approx(info.uv, Vec4::new(0.25, 0.0, 0.5, 0.5)), "uv was {:?}", info.uv);
    assert_eq!(info.size, Vec2::ONE);
    assert_eq!(info.offset, Vec2::new(-0.5, -0.5));

    let feet = cell(&texture, 1).with_pivot(Vec2::new(8.0, 0.0));
    let info = cache.info(cache.cache(&feet).expect("cache feet")).expect("info feet");
    assert_eq!(info.offset, Vec2::new(-0.5, 0.0));

    let trimmed = cell(&texture, 1).with_pivot(Vec2::new(8.0, 8.0)).with_rect_offset(Vec2::new(4.0, 0.0));
    let info = cache.info(cache.cache(&trimmed).expect("cache trimmed")).expect("info trimmed");
    assert_eq!(info.offset, Vec2::new(-0.25, -0.5));
}

#[test]
fn clear_drops_records_and_textures() {
    let cache = SpriteCache::default();
    let texture = sheet("temp");
    let handle = cache.cache(&cell(&texture, 0)).expect("cache");
    let shared = cache.clone();
    shared.clear();

    assert_eq!(cache.sprite_count(), 0, "clones share one table");
    assert_eq!(cache.texture_count(), 0);
    assert!(cache.info(handle).is_none());
    assert!(cache.texture_index("temp").is_none());

    let fresh = cache.cache(&cell(&sheet("next"), 0)).expect("cache after clear");
    assert_eq!(fresh.raw(), 0, "indices restart after a clear");
    assert_eq!(cache.info(fresh).map(|info| info.texture), Some(0));
}

#[test]
fn invalid_assets_are_rejected() {
    let cache = SpriteCache::default();
    let texture = sheet("bad");

    let zero_ppu = SpriteAsset::new(texture.clone(), SpriteRect::new(0.0, 0.0, 16.0, 16.0), 0.0);
    assert!(matches!(cache.cache(&zero_ppu), Err(SpriteError::InvalidArgument(_))));

    let empty_rect = SpriteAsset::new(texture.clone(), SpriteRect::new(0.0, 0.0, 0.0, 16.0), 16.0);
    assert!(matches!(cache.cache(&empty_rect), Err(SpriteError::InvalidArgument(_))));

    let no_size = SpriteAsset::new(TextureSource::new("empty", 0, 0), SpriteRect::new(0.0, 0.0, 1.0, 1.0), 1.0);
    assert!(matches!(cache.cache(&no_size), Err(SpriteError::InvalidArgument(_))));

    assert!(matches!(cache.cache_all(&[]), Err(SpriteError::InvalidArgument(_))));
    assert_eq!(cache.sprite_count(), 0, "rejected assets must not be stored");
    assert_eq!(cache.texture_count(), 0, "rejected assets must not register textures");
}

#[test]
fn cache_all_preserves_order() {
    let cache = SpriteCache::default();
    let texture = sheet("run");
    let assets: Vec<_> = (0..4).map(|column| cell(&texture, column)).collect();
    let handles = cache.cache_all(&assets).expect("cache all");
    assert_eq!(handles.iter().map(|h| h.raw()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    let table = cache.read();
    assert_eq!(table.len(), 4);
    assert_eq!(table.textures().len(), 1);
    let uv_x: Vec<f32> = handles.iter().map(|&h| table.get(h).expect("info").uv.x).collect();
    assert_eq!(uv_x, vec![0.0, 0.25, 0.5, 0.75]);
}

fn cache_from_threads(cache: &SpriteCache, threads: u32, per_thread: u32, asset: &SpriteAsset) -> Vec<CachedSprite> {
    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let cache = cache.clone();
            let asset = asset.clone();
            thread::spawn(move || {
                (0..per_thread).map(|_| cache.cache(&asset).expect("cache from worker")).collect::<Vec<_>>()
            })
        })
        .collect();
    workers.into_iter().flat_map(|worker| worker.join().expect("worker panicked")).collect()
}

#[test]
fn concurrent_writers_get_unique_dense_handles() {
    let cache = SpriteCache::default();
    let asset = cell(&sheet("crowd"), 0);
    let handles = cache_from_threads(&cache, 8, 100, &asset);

    let mut raw: Vec<u32> = handles.iter().map(|handle| handle.raw()).collect();
    raw.sort_unstable();
    assert_eq!(raw, (0..800).collect::<Vec<_>>(), "every cache() call gets its own slot");
    assert_eq!(cache.sprite_count(), 800);
    assert_eq!(cache.texture_count(), 1);
}

#[test]
fn concurrent_merging_writers_share_one_handle() {
    let cache = SpriteCache::new(CacheConfig { merge_duplicates: true, ..CacheConfig::default() });
    let asset = cell(&sheet("crowd"), 0);
    let handles = cache_from_threads(&cache, 8, 100, &asset);

    let distinct: HashSet<_> = handles.iter().copied().collect();
    assert_eq!(distinct.len(), 1);
    assert_eq!(cache.sprite_count(), 1);
    assert_eq!(cache.texture_count(), 1);
}

#[test]
fn readers_see_a_stable_table_while_writers_wait() {
    let cache = SpriteCache::default();
    let texture = sheet("busy");
    cache.cache_all(&[cell(&texture, 0), cell(&texture, 1)]).expect("seed cache");

    let writer = {
        let table = cache.read();
        let writer_cache = cache.clone();
        let writer = thread::spawn(move || {
            (0..50).for_each(|column| {
                writer_cache.cache(&cell(&sheet("busy"), column % 4)).expect("cache while read");
            })
        });
        let before = table.len();
        thread::yield_now();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader_cache = cache.clone();
                thread::spawn(move || reader_cache.sprite_count())
            })
            .collect();
        assert_eq!(table.len(), before, "a held table does not change underneath its reader");
        assert_eq!(before, 2);
        drop(table);
        for reader in readers {
            let seen = reader.join().expect("reader panicked");
            assert!((2..=52).contains(&seen), "reader saw {seen} records");
        }
        writer
    };
    writer.join().expect("writer panicked");
    assert_eq!(cache.sprite_count(), 52);
}
