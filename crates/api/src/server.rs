//! axum host for command routes.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result, anyhow};
use axum::{
    Json, Router,
    body::to_bytes,
    extract::{FromRequestParts, RawPathParams, Request},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{MethodFilter, on},
};
use indexmap::IndexMap;
use omnicmd_engine::Command;
use omnicmd_registry::CommandRegistry;
use omnicmd_types::{ApiRequest, CommandError, FieldError, HttpMethod};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::form_urlencoded;

use crate::{ApiResponse, ApiRoute, to_api};

/// Default address for the API host.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Builds an axum router with one route per command, mounted under `base_path`.
///
/// Commands sharing a method and path collapse to the last one registered.
pub fn router(commands: &[Arc<Command>], base_path: &str) -> Router {
    let mut routes: IndexMap<(HttpMethod, String), ApiRoute> = IndexMap::new();
    for command in commands {
        let route = to_api(command);
        routes.insert((route.method, route.path.clone()), route);
    }

    let mut api = Router::new();
    for route in routes.into_values() {
        debug!(method = %route.method, path = %route.path, "registering API route");
        let path = route.path.clone();
        let filter = method_filter(route.method);
        let route = Arc::new(route);
        api = api.route(
            &path,
            on(filter, move |request: Request| {
                let route = Arc::clone(&route);
                async move { serve(&route, request).await }
            }),
        );
    }

    let base_path = normalize_base_path(base_path);
    match base_path {
        Some(base) => Router::new().nest(&base, api),
        None => api,
    }
}

pub fn registry_router(registry: &CommandRegistry, base_path: &str) -> Router {
    router(&registry.to_vec(), base_path)
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Delete => MethodFilter::DELETE,
    }
}

fn normalize_base_path(base_path: &str) -> Option<String> {
    let trimmed = base_path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(if trimmed.starts_with('/') { trimmed.to_string() } else { format!("/{trimmed}") })
}

/// Converts an axum request, runs the route, and renders its response.
pub async fn serve(route: &ApiRoute, request: Request) -> Response {
    match into_api_request(route.method, request).await {
        Ok(request) => into_response(route.handle(request).await),
        Err(error) => into_response(ApiResponse::error(&error)),
    }
}

async fn into_api_request(method: HttpMethod, request: Request) -> Result<ApiRequest, CommandError> {
    let (mut parts, body) = request.into_parts();
    let path_params = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .map(|params| {
            params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();
    let query = parts
        .uri
        .query()
        .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();

    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|error| CommandError::validation(vec![FieldError::new("body", error.to_string())]))?;
    let body = if bytes.is_empty() {
        None
    } else {
        let value = serde_json::from_slice::<Value>(&bytes).map_err(|error| {
            CommandError::validation(vec![FieldError::new("body", format!("Request body is not valid JSON: {error}"))])
        })?;
        Some(value)
    };

    Ok(ApiRequest {
        method,
        path: parts.uri.path().to_string(),
        query,
        body,
        path_params,
        headers,
    })
}

fn into_response(response: ApiResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            headers.insert(name, value);
        }
    }
    (status, headers, Json(response.body)).into_response()
}

/// Host configuration for the command API server.
#[derive(Debug, Clone)]
pub struct ApiServer {
    bind_address: SocketAddr,
    router: Router,
}

impl ApiServer {
    pub fn new(bind_address: SocketAddr, router: Router) -> Self {
        Self { bind_address, router }
    }

    /// Start the server and return a handle for shutdown.
    pub async fn start(self) -> Result<RunningApiServer> {
        let cancellation_token = CancellationToken::new();
        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .with_context(|| format!("bind API server to {}", self.bind_address))?;
        let bound_address = listener.local_addr()?;
        info!(address = %bound_address, "API server listening");

        let router = self.router;
        let server_handle = tokio::spawn({
            let shutdown = cancellation_token.child_token();
            async move {
                let _ = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await;
            }
        });

        Ok(RunningApiServer {
            bind_address: bound_address,
            cancellation_token,
            server_handle,
        })
    }
}

/// Runtime handle for a running API server.
#[derive(Debug)]
pub struct RunningApiServer {
    bind_address: SocketAddr,
    cancellation_token: CancellationToken,
    server_handle: JoinHandle<()>,
}

impl RunningApiServer {
    pub fn bound_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Stop the server and wait for in-flight requests to finish.
    pub async fn stop(self) -> Result<()> {
        self.cancellation_token.cancel();
        self.server_handle
            .await
            .map_err(|error| anyhow!("API server task failed: {error}"))?;
        Ok(())
    }
}

/// Parses a bind address, falling back to [`DEFAULT_BIND_ADDRESS`].
pub fn resolve_bind_address(bind_address: Option<&str>) -> Result<SocketAddr> {
    let address = bind_address.unwrap_or(DEFAULT_BIND_ADDRESS);
    address
        .parse()
        .map_err(|error| anyhow!("invalid API bind address '{address}': {error}"))
}
