use actix_web::{App, HttpServer, middleware::Logger, web};
use color_eyre::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use campus_auth::config::config::Config;
use campus_auth::config::routes::routes;
use campus_auth::service::auth_service::AuthService;

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let auth = web::Data::new(AuthService::from_config(&config)?);

    info!(host = %config.host, port = config.port, "starting campus-auth");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(auth.clone())
            .configure(routes)
    })
    .bind(format!("{}:{}", config.host, config.port))?
    .run()
    .await?;

    Ok(())
}
