#![allow(dead_code, unused_imports)]

use std::time::Instant;

use typed_asset_cache::prelude::*;

#[cfg(feature = "profiling")]
fn seed(vfs: &MemoryVfs, count: usize) -> Result<()> {
    for i in 0..count {
        let id = AssetIdentity::new("bench", &format!("material_{i}"), AssetType::Material)?;
        vfs.insert_text(id, r#"{ "shader": "lit", "roughness": 0.5 }"#);
    }
    Ok(())
}

#[cfg(feature = "profiling")]
#[tracing::instrument(skip(server))]
fn profile_requests(server: &mut AssetServer, count: usize) {
    let _span = tracing::info_span!("request_loop", count = count).entered();
    for i in 0..count {
        if i % 1_000 == 0 {
            tracing::info!("Requesting asset {}/{}", i, count);
        }
        let _ = server.request_deferred(AssetRequest::new(
            AssetType::Material,
            format!("material_{i}"),
        ));
    }
    server.update();
}

#[cfg(feature = "profiling")]
fn main() -> Result<()> {
    let _guard = typed_asset_cache::profiling::init_profiling("trace.json")?;

    let vfs = MemoryVfs::new();
    seed(&vfs, 10_000)?;
    let config = AssetServerConfig {
        max_asset_count: 16_384,
        default_package_name: "bench".to_string(),
    };
    let mut server = AssetServer::with_builtin_handlers(config, vfs, HeadlessBackend::new())?;

    println!("Profiling 10k material requests...");
    let start = Instant::now();
    profile_requests(&mut server, 10_000);
    println!(
        "Loaded {} assets in: {:?}",
        server.resident_count(),
        start.elapsed()
    );
    Ok(())
}

#[cfg(not(feature = "profiling"))]
fn main() {
    println!("profile_requests binary requires --features profiling");
}
