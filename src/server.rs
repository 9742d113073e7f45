use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{
    Expiry, SessionManagerLayer, cookie::SameSite, session_store::ExpiredDeletion,
};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    api::{ApiDoc, AppState, routes},
    auth::GoogleOAuth,
    config::Config,
    db,
    tutor::{AgentDescriptor, new_session_cache},
};

const EXPIRED_SESSION_SWEEP: std::time::Duration = std::time::Duration::from_secs(60);

pub struct Server {
    config: Config,
    database: SqlitePool,
}

impl Server {
    /// Open (and migrate) the configured database.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let database = db::open(&config.database)
            .await
            .with_context(|| format!("failed to open database {}", config.database.display()))?;
        Ok(Self::with_database(config, database))
    }

    pub fn with_database(config: Config, database: SqlitePool) -> Self {
        Self { config, database }
    }

    fn state(&self) -> AppState {
        let oauth = match &self.config.google {
            Some(google) => Some(Arc::new(GoogleOAuth::new(google.clone()))),
            None => {
                warn!("Google credentials not configured, login is disabled");
                None
            }
        };
        AppState {
            database: self.database.clone(),
            agent: Arc::new(AgentDescriptor::student_tutor(self.config.tutor.model.clone())),
            tutor_sessions: new_session_cache(&self.config.tutor),
            oauth,
        }
    }

    /// Routes, API docs and the cookie session layer backed by the same database.
    pub async fn router(&self) -> anyhow::Result<Router> {
        let store = SqliteStore::new(self.database.clone());
        store.migrate().await.context("failed to migrate session store")?;
        tokio::task::spawn(
            store
                .clone()
                .continuously_delete_expired(EXPIRED_SESSION_SWEEP),
        );
        let sessions = SessionManagerLayer::new(store)
            .with_secure(self.config.tls.is_some())
            // the OAuth callback is a cross-site top-level navigation
            .with_same_site(SameSite::Lax)
            .with_expiry(Expiry::OnInactivity(time::Duration::days(
                self.config.session_ttl_days,
            )));

        Ok(Router::new()
            .merge(routes().with_state(self.state()))
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .layer(sessions)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http()))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router().await?;
        let address = format!("{}:{}", self.config.host, self.config.port);
        match &self.config.tls {
            Some(tls) => {
                rustls::crypto::aws_lc_rs::default_provider()
                    .install_default()
                    .map_err(|e| {
                        anyhow::anyhow!("Failed to initialize rustls crypto provider: {:?}", e)
                    })?;
                let rustls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                    .await
                    .context("failed to load TLS certificate")?;
                let socket = tokio::net::lookup_host(&address)
                    .await?
                    .next()
                    .with_context(|| format!("cannot resolve {address}"))?;
                info!("Listening on https://{address}");
                info!("Swagger UI available at https://{address}/swagger-ui/");
                axum_server::bind_rustls(socket, rustls_config)
                    .serve(app.into_make_service())
                    .await
                    .context("server error")?;
            }
            None => {
                let listener = TcpListener::bind(&address)
                    .await
                    .with_context(|| format!("failed to bind {address}"))?;
                info!("Listening on http://{address}");
                info!("Swagger UI available at http://{address}/swagger-ui/");
                axum::serve(listener, app).await.context("server error")?;
            }
        }
        Ok(())
    }
}
