/// LiveFrame HTTP Server
///
/// Standalone server exposing the dataframe endpoints over HTTP. Reads
/// `HOST`, `PORT` and `LIVEFRAME_BACKEND` from the environment.

use liveframe::config::ServerConfig;
use liveframe::server::run_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    // Start the server
    run_server(config).await
}
