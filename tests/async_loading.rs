use std::cell::{Cell, RefCell};
use std::rc::Rc;

use typed_asset_cache::prelude::*;

fn server(vfs: &MemoryVfs) -> AssetServer {
    let config = AssetServerConfig {
        max_asset_count: 8,
        default_package_name: "game".to_string(),
    };
    AssetServer::with_builtin_handlers(config, vfs.clone(), HeadlessBackend::new()).unwrap()
}

fn material_id(name: &str) -> AssetIdentity {
    AssetIdentity::new("game", name, AssetType::Material).unwrap()
}

#[test]
fn test_async_load_completes_in_update() {
    let vfs = MemoryVfs::deferred();
    vfs.insert_text(material_id("rock"), r#"{ "shader": "lit" }"#);
    let mut server = server(&vfs);

    let rx = server.request_deferred(AssetRequest::new(AssetType::Material, "rock"));
    assert!(rx.try_recv().is_err());
    assert_eq!(server.state_of(&material_id("rock")), SlotState::Loading);
    assert_eq!(server.pending_count(), 1);

    // Nothing to apply until the VFS answers
    assert_eq!(server.update(), 0);
    assert!(rx.try_recv().is_err());

    assert_eq!(vfs.flush(), 1);
    assert_eq!(server.update(), 1);
    let handle = rx.try_recv().unwrap().unwrap();
    assert_eq!(server.state_of(&material_id("rock")), SlotState::Loaded);
    assert_eq!(
        server.get(handle).unwrap().as_material().unwrap().shader,
        "lit"
    );
    assert_eq!(server.pending_count(), 0);
}

#[test]
fn test_concurrent_requests_share_one_load() {
    let vfs = MemoryVfs::deferred();
    vfs.insert_text(material_id("rock"), r#"{ "shader": "lit" }"#);
    let mut server = server(&vfs);

    let calls = Rc::new(RefCell::new(Vec::new()));
    for index in 0..3 {
        let calls = calls.clone();
        server.request(AssetRequest::new(AssetType::Material, "rock"), move |result| {
            assert!(result.is_ok());
            calls.borrow_mut().push(index);
        });
    }
    // One read issued for three requests
    assert_eq!(vfs.pending_count(), 1);
    assert!(calls.borrow().is_empty());

    vfs.flush();
    server.update();
    // Waiters run in the order they asked
    assert_eq!(*calls.borrow(), vec![0, 1, 2]);
    assert_eq!(vfs.read_count(), 1);
    assert_eq!(server.reference_count(&material_id("rock")), Some(3));

    // Later events never re-fire a continuation
    server.update();
    assert_eq!(calls.borrow().len(), 3);
}

#[test]
fn test_hit_during_async_answers_inside_call() {
    let vfs = MemoryVfs::deferred();
    vfs.insert_text(material_id("rock"), r#"{ "shader": "lit" }"#);
    let mut server = server(&vfs);

    let _ = server.request_deferred(AssetRequest::new(AssetType::Material, "rock"));
    vfs.flush();
    server.update();

    let called = Rc::new(Cell::new(false));
    let flag = called.clone();
    server.request(AssetRequest::new(AssetType::Material, "rock"), move |result| {
        assert_eq!(result.unwrap().reference_count(), 2);
        flag.set(true);
    });
    assert!(called.get());
}

#[test]
fn test_vfs_failure_reaches_every_waiter() {
    let vfs = MemoryVfs::deferred();
    let mut server = server(&vfs);

    let first = server.request_deferred(AssetRequest::new(AssetType::Material, "missing"));
    let second = server.request_deferred(AssetRequest::new(AssetType::Material, "missing"));
    vfs.flush();
    server.update();

    for rx in [first, second] {
        let err = rx.try_recv().unwrap().unwrap_err();
        assert_eq!(err.code(), ResultCode::VfsRequestFailed);
    }
    assert_eq!(server.state_of(&material_id("missing")), SlotState::Empty);
    assert_eq!(server.resident_count(), 0);
}

#[test]
fn test_load_sync_pumps_in_flight_identity() {
    let vfs = MemoryVfs::deferred();
    vfs.insert_text(material_id("rock"), r#"{ "shader": "lit" }"#);
    let mut server = server(&vfs);

    let rx = server.request_deferred(AssetRequest::new(AssetType::Material, "rock"));
    let err = server
        .load_sync(AssetRequest::new(AssetType::Material, "rock"))
        .unwrap_err();
    assert!(matches!(err, AssetError::NotLoaded(_)));

    vfs.flush();
    let handle = server
        .load_sync(AssetRequest::new(AssetType::Material, "rock"))
        .unwrap();
    assert_eq!(rx.try_recv().unwrap().unwrap(), handle);
    assert_eq!(server.reference_count(&material_id("rock")), Some(2));
}

fn font_config(face: &str) -> String {
    format!(r#"{{ "ttf_asset_name": "{face}", "faces": [{{ "size": 14.0 }}, {{ "size": 20.0, "bold": true }}] }}"#)
}

#[test]
fn test_system_font_loads_face_through_cache() {
    let vfs = MemoryVfs::deferred();
    let font = AssetIdentity::new("ui", "body", AssetType::SystemFont).unwrap();
    let face = AssetIdentity::new("ui", "sans", AssetType::Binary).unwrap();
    vfs.insert_text(font.clone(), font_config("sans"));
    vfs.insert_binary(face.clone(), vec![0, 1, 0, 0, 42]);
    let mut server = server(&vfs);

    let rx = server.request_deferred(AssetRequest::new(AssetType::SystemFont, "body").package("ui"));

    assert_eq!(server.state_of(&font), SlotState::Loading);
    assert!(!server.is_resident(&face));

    // Config read; binary faces load inline, so one pass finishes the font
    assert_eq!(vfs.flush(), 1);
    server.update();
    let handle = rx.try_recv().unwrap().unwrap();
    let loaded = server.get(handle).unwrap().as_system_font().unwrap();
    assert_eq!(loaded.faces.len(), 2);
    let face_handle = loaded.face;
    assert_eq!(server.handle_of(&face), Some(face_handle));
    assert_eq!(
        server.get(face_handle).unwrap().as_binary().unwrap().bytes,
        vec![0, 1, 0, 0, 42]
    );
    assert_eq!(server.reference_count(&face), Some(1));
    assert_eq!(server.resident_count(), 2);

    // Tearing the font down hands its face back
    server.release(&font);
    assert_eq!(server.state_of(&face), SlotState::Empty);
    assert_eq!(server.resident_count(), 0);
}

#[test]
fn test_fonts_share_one_face() {
    let vfs = MemoryVfs::new();
    let face = AssetIdentity::new("fonts", "sans", AssetType::Binary).unwrap();
    for name in ["body", "title"] {
        let font = AssetIdentity::new("ui", name, AssetType::SystemFont).unwrap();
        vfs.insert_text(font, font_config("fonts.sans"));
    }
    vfs.insert_binary(face.clone(), vec![0, 1, 0, 0, 42]);
    let mut server = server(&vfs);

    let body = server
        .load_sync(AssetRequest::new(AssetType::SystemFont, "body").package("ui"))
        .unwrap();
    let title = server
        .load_sync(AssetRequest::new(AssetType::SystemFont, "title").package("ui"))
        .unwrap();

    // Two configs and a single face read
    assert_eq!(vfs.read_count(), 3);
    let shared = server.get(body).unwrap().as_system_font().unwrap().face;
    assert_eq!(server.get(title).unwrap().as_system_font().unwrap().face, shared);
    assert_eq!(server.reference_count(&face), Some(2));

    server.release_handle(body);
    assert_eq!(server.reference_count(&face), Some(1));
    server.release_handle(title);
    assert_eq!(server.state_of(&face), SlotState::Empty);
    assert_eq!(server.resident_count(), 0);
}

#[test]
fn test_system_font_missing_face_fails_load() {
    let vfs = MemoryVfs::new();
    let font = AssetIdentity::new("ui", "body", AssetType::SystemFont).unwrap();
    vfs.insert_text(font.clone(), font_config("fonts.nope"));
    let mut server = server(&vfs);

    let rx = server.request_deferred(AssetRequest::new(AssetType::SystemFont, "body").package("ui"));
    server.update();
    let err = rx.try_recv().unwrap().unwrap_err();
    assert_eq!(err.code(), ResultCode::VfsRequestFailed);
    assert_eq!(server.state_of(&font), SlotState::Empty);
    assert_eq!(server.resident_count(), 0);
}

#[test]
fn test_face_released_when_font_fails_after_it() {
    let vfs = MemoryVfs::new();
    let face = AssetIdentity::new("fonts", "sans", AssetType::Binary).unwrap();
    // Empty face bytes are rejected once the face itself has loaded
    vfs.insert_binary(face.clone(), Vec::new());
    vfs.insert_text(
        AssetIdentity::new("ui", "body", AssetType::SystemFont).unwrap(),
        font_config("fonts.sans"),
    );
    let mut server = server(&vfs);

    let err = server
        .load_sync(AssetRequest::new(AssetType::SystemFont, "body").package("ui"))
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::ParseFailed);
    assert_eq!(server.state_of(&face), SlotState::Empty);
    assert_eq!(server.resident_count(), 0);
}

#[test]
fn test_dropped_vfs_reply_fails_the_load() {
    struct LosingVfs;

    impl Vfs for LosingVfs {
        fn request_asset(&mut self, _request: VfsRequest, reply: VfsReply) {
            drop(reply);
        }

        fn request_asset_sync(&mut self, request: &VfsRequest) -> Result<AssetSource> {
            Err(AssetError::VfsRequestFailed(request.identity.to_string()))
        }

        fn watch_file(
            &mut self,
            identity: &AssetIdentity,
            _notify: crossbeam::channel::Sender<VfsEvent>,
        ) -> Result<WatchId> {
            Err(AssetError::VfsRequestFailed(identity.to_string()))
        }

        fn unwatch_file(&mut self, _watch_id: WatchId) {}
    }

    let config = AssetServerConfig::default();
    let mut server =
        AssetServer::with_builtin_handlers(config, LosingVfs, HeadlessBackend::new()).unwrap();
    let rx = server.request_deferred(AssetRequest::new(AssetType::Scene, "level1"));
    server.update();
    assert_eq!(
        rx.try_recv().unwrap().unwrap_err().code(),
        ResultCode::VfsRequestFailed
    );
}
