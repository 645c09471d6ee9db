use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ldap_rest_gateway::config::AppConfig;
use ldap_rest_gateway::handlers;
use ldap_rest_gateway::openapi_config::{configure_openapi, ApiDoc};
use ldap_rest_gateway::repositories::LdapDirectoryRepository;
use ldap_rest_gateway::services::{DirectoryOptions, DirectoryService};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Bind once at startup; bad credentials are fatal
    let repository = match LdapDirectoryRepository::connect(config.ldap.clone()).await {
        Ok(repository) => repository,
        Err(e) => {
            error!(error = %e, "Directory bind failed");
            return Err(e).context("Failed to connect to the directory server");
        }
    };

    let options = DirectoryOptions::new(config.ldap.base_dn.clone()).with_filter_escaping(config.ldap.filter_escaping);
    let directory_service = web::Data::new(DirectoryService::new(Arc::new(repository), options));

    let openapi_spec = configure_openapi(ApiDoc::openapi(), &config);

    info!("LDAP REST gateway listening on http://{}", config.bind_address);
    info!("API documentation: http://{}/swagger-ui/", config.bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(directory_service.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header(),
            )
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi_spec.clone()))
            .configure(handlers::configure_routes)
    })
    .bind(config.bind_address)?
    .run()
    .await?;

    Ok(())
}
