/**
 * XFCanvas Demo Entry Point
 *
 * Runs two engines replicating through the in-memory transport, with a
 * draw -> parametric translator on the first one.
 */

#[cfg(feature = "demo")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::Arc;
    use std::time::Duration;
    use xfcanvas::shared::{Change, EngineConfig, Payload, Priority, Site, SyncError, Value};
    use xfcanvas::sync::{Engine, FnTranslator};
    use xfcanvas::transport::{memory, spawn_client};

    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    eprintln!("[STARTUP] Setting RUST_LOG={}", env_filter);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = load_config()?;
    tracing::info!("[STARTUP] Surfaces: {:?}", config.surfaces);

    let mut alpha = Engine::with_site(config.clone(), Site::new("alpha"))?;
    alpha.register_translator(Box::new(FnTranslator::new(
        "stroke-to-shape",
        |change: &Change| {
            if change.source_surface != "draw" {
                return Ok(Vec::new());
            }
            let Payload::Insert { target, .. } = &change.payload else {
                return Ok(Vec::new());
            };
            if target.is_empty() {
                return Err(SyncError::translation("stroke-to-shape", "stroke without id"));
            }
            let shape = Payload::Insert {
                target: format!("shape:{}", target),
                value: Value::map([("kind", Value::text("polyline"))]),
            };
            Ok(vec![Change::new("parametric", 1, shape)
                .with_label("shape_fitted")
                .with_priority(Priority::Derived)])
        },
    )));
    let beta = Engine::with_site(config.clone(), Site::new("beta"))?;

    let (hub, left, right) = memory::pair();
    let alpha = alpha.start_with_transport(spawn_client(Arc::new(left), &config.transport));
    let beta = beta.start_with_transport(spawn_client(Arc::new(right), &config.transport));
    let a = alpha.handle();
    let b = beta.handle();

    let settle = || tokio::time::sleep(Duration::from_millis(150));
    settle().await;
    tracing::info!("[Demo] {} peers connected", hub.peer_count());

    for i in 0..4 {
        let stroke = Payload::Insert {
            target: format!("stroke-{}", i),
            value: Value::map([("width", Value::Number(2.0 + i as f64))]),
        };
        a.create("draw", stroke).await?;
    }
    b.create(
        "code",
        Payload::Execute {
            target: "main".to_string(),
            command: "render".to_string(),
            args: Default::default(),
        },
    )
    .await?;
    settle().await;

    a.undo().await?;
    settle().await;
    a.redo().await?;
    settle().await;

    for (name, handle) in [("alpha", &a), ("beta", &b)] {
        for surface in ["draw", "parametric", "code"] {
            if let Some(state) = handle.surface(surface).await? {
                println!(
                    "{} {:<10} version {:>3} checksum {} entities {}",
                    name,
                    surface,
                    state.version,
                    state.checksum,
                    state.data.entities.len()
                );
            }
        }
    }

    let metrics = a.metrics().await?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    alpha.stop().await?;
    beta.stop().await?;
    Ok(())
}

/// Config file from `XFCANVAS_CONFIG`, else the user config dir, else defaults
#[cfg(feature = "demo")]
fn load_config() -> Result<xfcanvas::shared::EngineConfig, xfcanvas::shared::ConfigError> {
    use xfcanvas::shared::EngineConfig;

    let path = std::env::var_os("XFCANVAS_CONFIG")
        .map(std::path::PathBuf::from)
        .or_else(|| dirs::config_dir().map(|dir| dir.join("xfcanvas").join("engine.toml")));

    match path {
        Some(path) if path.exists() => {
            tracing::info!("[STARTUP] Loading config from {}", path.display());
            EngineConfig::from_file(path)
        }
        _ => Ok(EngineConfig::default()),
    }
}

#[cfg(not(feature = "demo"))]
fn main() {
    eprintln!("The demo requires the 'demo' feature to be enabled.");
    eprintln!("Run with: cargo run --bin xfcanvas-demo --features demo");
    std::process::exit(1);
}
