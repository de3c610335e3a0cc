use std::{path::Path, sync::Arc};

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod compat;
mod config;
mod model;
mod page;
mod routes;
mod service;
mod site;
mod validate;

const DEFAULT_FILTER: &str = "blog_editor=debug,tower_http=debug,info";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().ok_or("usage: blog-editor <config.toml> [build]")?;
    let build_only = match args.next().as_deref() {
        None => false,
        Some("build") => true,
        Some(other) => return Err(format!("unknown command '{}'", other).into()),
    };

    let config = config::Config::load(Path::new(&config_path))?;
    tracing::debug!("{:#?}", config);

    let store = model::database::JsonFileStore::new(config.store.data_file.to_path_buf());
    tracing::info!(path = %store.path().display(), "using post store");

    let posts = service::PostService::new(store);
    let site = config.site.map(site::Site::new).transpose()?;

    if build_only {
        let Some(site) = site else {
            return Err("config has no [site] section to build".into());
        };

        let report = site.build(&posts.list().await?).await?;
        tracing::info!(
            pages = report.pages,
            warnings = report.warnings.len(),
            "site built"
        );
        return Ok(());
    }

    let state = Arc::new(routes::AppState { posts, site });
    state.republish().await;

    let app = routes::router(state, config.net.static_dir.as_deref());

    let listener = TcpListener::bind(config.net.bind).await?;
    tracing::info!("blog editor listening at {}", config.net.proto_host);
    axum::serve(listener, app).await?;

    Ok(())
}
