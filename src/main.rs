use std::net::SocketAddr;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use tracing_subscriber::EnvFilter;

use plaza::config::Config;
use plaza::identity::cognito::CognitoIdp;
use plaza::identity::IdentityClient;
use plaza::routes;
use plaza::state::AppState;
use plaza::store::dynamo::DynamoBackend;
use plaza::store::like::LikeTable;
use plaza::store::post::PostTable;
use plaza::store::TableClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;

    let backend = Arc::new(DynamoBackend::new(
        &aws_config,
        config.tables.endpoint.as_deref(),
    ));
    let posts = Arc::new(PostTable::new(TableClient::new(
        config.tables.posts.as_str(),
        backend.clone(),
    )));
    let likes = Arc::new(LikeTable::new(TableClient::new(
        config.tables.likes.as_str(),
        backend,
    )));

    let identity = Arc::new(IdentityClient::new(
        config.identity.client_id.as_str(),
        config.identity.client_secret.as_str(),
        config.identity.pool_id.as_str(),
        Arc::new(CognitoIdp::new(&aws_config)),
    ));

    let addr: SocketAddr = config.addr().parse()?;
    let state = AppState::new(config, identity, posts, likes)?;

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, routes::app(state)).await?;

    Ok(())
}
