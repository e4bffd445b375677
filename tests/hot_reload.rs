use typed_asset_cache::handlers::image::{ImageAsset, ImageFormat, ImageHandler};
use typed_asset_cache::prelude::*;

fn setup(vfs: &MemoryVfs, backend: &HeadlessBackend) -> AssetServer {
    let config = AssetServerConfig {
        max_asset_count: 8,
        default_package_name: "game".to_string(),
    };
    AssetServer::with_builtin_handlers(config, vfs.clone(), backend.clone()).unwrap()
}

fn material_id() -> AssetIdentity {
    AssetIdentity::new("game", "rock", AssetType::Material).unwrap()
}

fn material(shader: &str, roughness: f32) -> AssetSource {
    AssetSource::Text(format!(
        r#"{{ "shader": "{shader}", "roughness": {roughness} }}"#
    ))
}

fn image_source(width: u32, height: u32) -> AssetSource {
    ImageHandler
        .serialize(&AssetData::Image(ImageAsset {
            width,
            height,
            channel_count: 1,
            format: ImageFormat::R8,
            mip_levels: 1,
            pixels: vec![7; (width * height) as usize],
            gpu_handle: None,
        }))
        .unwrap()
}

#[test]
fn test_material_reloads_in_place() {
    let vfs = MemoryVfs::new();
    let backend = HeadlessBackend::new();
    vfs.insert(material_id(), material("lit", 0.5));
    let mut server = setup(&vfs, &backend);

    let handle = server
        .load_sync(AssetRequest::new(AssetType::Material, "rock").watch(true))
        .unwrap();
    assert!(server.watch_of(&material_id()).is_some());

    assert_eq!(vfs.write_file(&material_id(), material("unlit", 0.9)), 1);
    assert_eq!(server.update(), 1);

    // Same handle, new payload
    let live = server.get(handle).unwrap().as_material().unwrap();
    assert_eq!(live.shader, "unlit");
    assert_eq!(live.roughness, 0.9);
    assert_eq!(server.handle_of(&material_id()), Some(handle));
    assert_eq!(server.reference_count(&material_id()), Some(1));
    assert_eq!(server.stats().hot_reloads, 1);
}

#[test]
fn test_failed_reload_keeps_live_payload() {
    let vfs = MemoryVfs::new();
    let backend = HeadlessBackend::new();
    vfs.insert(material_id(), material("lit", 0.5));
    let mut server = setup(&vfs, &backend);

    let handle = server
        .load_sync(AssetRequest::new(AssetType::Material, "rock").watch(true))
        .unwrap();
    vfs.write_file(&material_id(), AssetSource::Text("{ not json".to_string()));
    server.update();

    assert_eq!(server.get(handle).unwrap().as_material().unwrap().shader, "lit");
    assert_eq!(server.stats().hot_reloads, 0);

    // An out of range value is rejected the same way
    let err = {
        vfs.insert(material_id(), material("lit", 4.0));
        server.reload(&material_id()).unwrap_err()
    };
    assert_eq!(err.code(), ResultCode::ParseFailed);
    assert_eq!(server.get(handle).unwrap().as_material().unwrap().roughness, 0.5);
}

#[test]
fn test_image_reload_swaps_gpu_texture() {
    let vfs = MemoryVfs::new();
    let backend = HeadlessBackend::new();
    let sky = AssetIdentity::new("game", "sky", AssetType::Image).unwrap();
    vfs.insert(sky.clone(), image_source(2, 2));
    let mut server = setup(&vfs, &backend);

    let handle = server
        .load_sync(AssetRequest::new(AssetType::Image, "sky").watch(true))
        .unwrap();
    vfs.write_file(&sky, image_source(4, 2));
    server.update();

    let image = server.get(handle).unwrap().as_image().unwrap();
    assert_eq!((image.width, image.height), (4, 2));
    assert!(image.gpu_handle.is_some());
    assert_eq!(backend.upload_count(), 2);
    assert_eq!(backend.release_count(), 1);
    assert_eq!(backend.live_count(), 1);

    server.release(&sky);
    assert_eq!(backend.live_count(), 0);
}

#[test]
fn test_reload_unsupported_for_scene() {
    let vfs = MemoryVfs::new();
    let backend = HeadlessBackend::new();
    let level = AssetIdentity::new("game", "level1", AssetType::Scene).unwrap();
    vfs.insert_text(level.clone(), r#"{ "root": { "name": "root" } }"#);
    let mut server = setup(&vfs, &backend);

    let handle = server
        .load_sync(AssetRequest::new(AssetType::Scene, "level1").watch(true))
        .unwrap();
    vfs.write_file(&level, AssetSource::Text(r#"{ "root": { "name": "other" } }"#.to_string()));
    server.update();

    assert_eq!(server.get(handle).unwrap().as_scene().unwrap().root.name, "root");
    assert_eq!(
        server.reload(&level).unwrap_err().code(),
        ResultCode::Unsupported
    );
    assert_eq!(server.stats().hot_reloads, 0);
}

#[test]
fn test_reload_of_absent_asset() {
    let vfs = MemoryVfs::new();
    let backend = HeadlessBackend::new();
    let mut server = setup(&vfs, &backend);

    assert!(matches!(
        server.reload(&material_id()),
        Err(AssetError::NotFound(_))
    ));
}

#[test]
fn test_deleted_file_drops_watch() {
    let vfs = MemoryVfs::new();
    let backend = HeadlessBackend::new();
    vfs.insert(material_id(), material("lit", 0.5));
    let mut server = setup(&vfs, &backend);

    let handle = server
        .load_sync(AssetRequest::new(AssetType::Material, "rock").watch(true))
        .unwrap();
    assert_eq!(vfs.delete_file(&material_id()), 1);
    server.update();

    assert_eq!(server.watch_count(), 0);
    assert_eq!(vfs.watch_count(), 0);
    // The loaded asset itself is untouched
    assert_eq!(server.get(handle).unwrap().as_material().unwrap().shader, "lit");
}

#[test]
fn test_watch_survives_teardown() {
    let vfs = MemoryVfs::new();
    let backend = HeadlessBackend::new();
    vfs.insert(material_id(), material("lit", 0.5));
    let mut server = setup(&vfs, &backend);

    server
        .load_sync(AssetRequest::new(AssetType::Material, "rock").watch(true))
        .unwrap();
    server.release(&material_id());
    assert!(!server.is_resident(&material_id()));
    assert_eq!(server.watch_count(), 1);

    // Writes while nothing is resident are ignored
    vfs.write_file(&material_id(), material("unlit", 0.5));
    server.update();
    assert_eq!(server.stats().hot_reloads, 0);

    let handle = server
        .load_sync(AssetRequest::new(AssetType::Material, "rock"))
        .unwrap();
    assert_eq!(server.get(handle).unwrap().as_material().unwrap().shader, "unlit");
    assert!(server.watch_of(&material_id()).is_some());

    vfs.write_file(&material_id(), material("toon", 0.5));
    server.update();
    assert_eq!(server.get(handle).unwrap().as_material().unwrap().shader, "toon");
    assert_eq!(server.stats().hot_reloads, 1);
}

#[test]
fn test_unwatch_stops_reloads() {
    let vfs = MemoryVfs::new();
    let backend = HeadlessBackend::new();
    vfs.insert(material_id(), material("lit", 0.5));
    let mut server = setup(&vfs, &backend);

    let handle = server
        .load_sync(AssetRequest::new(AssetType::Material, "rock"))
        .unwrap();
    let first = server.watch(&material_id()).unwrap();
    let second = server.watch(&material_id()).unwrap();
    assert_eq!(first, second);
    assert_eq!(vfs.watch_count(), 1);

    assert!(server.unwatch(&material_id()));
    assert!(!server.unwatch(&material_id()));
    assert_eq!(vfs.write_file(&material_id(), material("unlit", 0.5)), 0);
    server.update();
    assert_eq!(server.get(handle).unwrap().as_material().unwrap().shader, "lit");
}

#[test]
fn test_explicit_reload_without_watch() {
    let vfs = MemoryVfs::new();
    let backend = HeadlessBackend::new();
    let notes = AssetIdentity::new("game", "notes", AssetType::Text).unwrap();
    vfs.insert_text(notes.clone(), "draft");
    let mut server = setup(&vfs, &backend);

    let handle = server
        .load_sync(AssetRequest::new(AssetType::Text, "notes"))
        .unwrap();
    vfs.insert_text(notes.clone(), "final");
    server.reload(&notes).unwrap();

    assert_eq!(server.get(handle).unwrap().as_text().unwrap().content, "final");
    let stale_generation = handle.generation();
    assert_eq!(server.handle_of(&notes).unwrap().generation(), stale_generation);
}
