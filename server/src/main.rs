//! Service entry point: load settings, assemble policies, serve.

use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use ortho_config::OrthoConfig;
use server::config::Settings;
use server::server::{run, ServerConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings =
        Settings::load_from_iter(std::env::args_os()).map_err(std::io::Error::other)?;
    let config = ServerConfig::from_settings(&settings)
        .await
        .map_err(std::io::Error::other)?;

    info!(addr = %config.bind_addr(), "starting gatehouse server");
    run(config)?.await
}
