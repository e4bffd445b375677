use criterion::{black_box, criterion_group, criterion_main, Criterion};
use typed_asset_cache::prelude::*;

fn server(vfs: &MemoryVfs, capacity: u32) -> AssetServer {
    let config = AssetServerConfig {
        max_asset_count: capacity,
        default_package_name: "bench".to_string(),
    };
    AssetServer::with_builtin_handlers(config, vfs.clone(), HeadlessBackend::new()).unwrap()
}

fn material_id(i: usize) -> AssetIdentity {
    AssetIdentity::new("bench", &format!("material_{i}"), AssetType::Material).unwrap()
}

fn seed(vfs: &MemoryVfs, count: usize) {
    for i in 0..count {
        vfs.insert_text(material_id(i), r#"{ "shader": "lit", "roughness": 0.5 }"#);
    }
}

fn bench_request_hit(c: &mut Criterion) {
    let vfs = MemoryVfs::new();
    seed(&vfs, 1);
    let mut server = server(&vfs, 16);
    // Keep one reference so the asset stays resident between iterations
    server
        .load_sync(AssetRequest::new(AssetType::Material, "material_0"))
        .unwrap();
    let id = material_id(0);

    c.bench_function("request_hit", |b| {
        b.iter(|| {
            server.request(
                AssetRequest::new(AssetType::Material, black_box("material_0")),
                |result| {
                    black_box(result.is_ok());
                },
            );
            server.release(&id);
        });
    });
}

fn bench_load_release(c: &mut Criterion) {
    let vfs = MemoryVfs::new();
    seed(&vfs, 1);
    let mut server = server(&vfs, 16);
    let id = material_id(0);

    c.bench_function("load_release_cycle", |b| {
        b.iter(|| {
            let handle = server
                .load_sync(AssetRequest::new(AssetType::Material, "material_0"))
                .unwrap();
            black_box(handle);
            server.release(&id);
        });
    });
}

fn bench_async_batch(c: &mut Criterion) {
    let vfs = MemoryVfs::deferred();
    seed(&vfs, 1000);
    let mut server = server(&vfs, 1024);

    c.bench_function("async_batch_1000", |b| {
        b.iter(|| {
            for i in 0..1000 {
                let _ = server.request_deferred(AssetRequest::new(
                    AssetType::Material,
                    format!("material_{i}"),
                ));
            }
            vfs.flush();
            black_box(server.update());
            for i in 0..1000 {
                server.release(&material_id(i));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_request_hit,
    bench_load_release,
    bench_async_batch
);
criterion_main!(benches);
