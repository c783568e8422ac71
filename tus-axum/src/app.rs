use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{head, post};
use axum::{middleware, Router};
use tokio::net::{TcpListener, ToSocketAddrs};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tus_upload::UploadEngine;

use crate::headers::{self, TUS_RESUMABLE};
use crate::middlewares::{require_tus_resumable, route_plain_options};
use crate::{handlers, TusAxumState, TusOptions};

pub struct TusAxumApp {
    pub state: TusAxumState,
    pub router: Router<()>,
}

impl Clone for TusAxumApp {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            router: self.router.clone(),
        }
    }
}

impl TusAxumApp {
    pub fn new(engine: UploadEngine, options: TusOptions) -> Self {
        let state = TusAxumState::new(engine, options);
        Self {
            router: router(state.clone()),
            state,
        }
    }

    /// Mount extra routes next to the upload routes
    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        self.listen_with_shutdown(addr, std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, letting in-flight requests finish
    pub async fn listen_with_shutdown<A, F>(self, addr: A, shutdown: F) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, base_path = %self.state.options.base_path, "tus server listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

pub fn tus(engine: UploadEngine, options: TusOptions) -> TusAxumApp {
    TusAxumApp::new(engine, options)
}

/// The tus routes plus protocol middleware.
///
/// Layer order, outermost first: `Tus-Resumable` on every response, request
/// id, tracing, CORS (preflights only for OPTIONS), then the version check.
pub fn router(state: TusAxumState) -> Router<()> {
    let base = state.options.base_path.clone();
    let collection = if base.is_empty() { "/".to_string() } else { base.clone() };
    let member = format!("{}/{{id}}", base);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(headers::exposed());

    let routes = Router::new()
        .route(&collection, post(handlers::create).options(handlers::capabilities))
        .route(
            &member,
            head(handlers::status)
                .patch(handlers::append)
                .delete(handlers::terminate),
        )
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(middleware::from_fn(require_tus_resumable))
        // bodies are streamed to storage, the upload length is the only bound
        .layer(DefaultBodyLimit::disable());

    routes
        .clone()
        .layer(cors)
        .layer(middleware::from_fn_with_state(routes, route_plain_options))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetResponseHeaderLayer::overriding(
            TUS_RESUMABLE,
            HeaderValue::from_static(tus_upload::TUS_VERSION),
        ))
}
