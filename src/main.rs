use bustrack::config::Config;
use bustrack::db::Storage;
use bustrack::router::{AppState, app_router};
use bustrack::service::{seed::seed_defaults, simulator};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;
    let seed_only = std::env::args().skip(1).any(|a| a == "--seed-only");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let cookie_secret = match cfg.basic.cookie_secret {
        Some(_) => "<set>",
        None => "<generated>",
    };
    info!(
        listen_addr = %cfg.basic.listen_addr,
        database_url = %cfg.basic.database_url,
        loglevel = %cfg.basic.loglevel,
        cookie_secret,
        insecure_cookie = cfg.basic.insecure_cookie,
        utc_offset_minutes = cfg.basic.utc_offset_minutes,
        simulator = cfg.simulator.enabled
    );

    let storage = Storage::connect(&cfg.basic.database_url).await?;
    let created = seed_defaults(&storage, &cfg.seed).await?;
    if !created.is_empty() {
        info!(accounts = ?created, "default accounts seeded");
    }
    if seed_only {
        return Ok(());
    }

    let sim = if cfg.simulator.enabled {
        Some(simulator::spawn(storage.clone(), cfg.simulator.clone()).await?)
    } else {
        None
    };

    let state = AppState::new(storage, &cfg)?;
    let app = app_router(state);

    let listener = TcpListener::bind(&cfg.basic.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c, running until killed");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
        })
        .await?;

    if let Some(sim) = sim
        && let Err(e) = sim.stop().await
    {
        warn!("{}", e);
    }
    Ok(())
}
