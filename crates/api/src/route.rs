use std::sync::Arc;

use omnicmd_engine::Command;
use omnicmd_types::{ApiRequest, CacheControl, CommandError, ExecutionContext, HttpMethod, Interface};
use omnicmd_util::{api_path, extract_from_request};
use serde_json::{Value, json};
use tracing::{debug, warn};

/// HTTP projection of one command.
#[derive(Debug, Clone)]
pub struct ApiRoute {
    pub method: HttpMethod,
    pub path: String,
    pub cache: Option<CacheControl>,
    command: Arc<Command>,
}

/// Projects a command onto its HTTP route.
pub trait ToApiRoute {
    fn to_api(&self) -> ApiRoute;
}

impl ToApiRoute for Arc<Command> {
    fn to_api(&self) -> ApiRoute {
        to_api(self)
    }
}

pub fn to_api(command: &Arc<Command>) -> ApiRoute {
    let schema = command.metadata();
    ApiRoute {
        method: schema.api.method,
        path: api_path(schema),
        cache: schema.api.cache,
        command: command.clone(),
    }
}

/// Framework-neutral response produced by a route.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    /// `{error, details}` body with the error's mapped status.
    pub fn error(error: &CommandError) -> Self {
        Self {
            status: error.status_code(),
            headers: Vec::new(),
            body: json!({"error": error.to_string(), "details": error.details()}),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl ApiRoute {
    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    /// Extracts input from `request`, executes the command and maps the outcome.
    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        let input = extract_from_request(&request, self.command.parameters());
        let context = ExecutionContext::new(Interface::Api).with_request(request);
        debug!(method = %self.method, path = %self.path, "handling API request");

        match self.command.execute(&input, context).await {
            Ok(body) => {
                let mut response = ApiResponse::ok(body);
                if let Some(value) = self.cache.as_ref().and_then(cache_control_header) {
                    response.headers.push(("Cache-Control".to_string(), value));
                }
                response
            }
            Err(error) => {
                warn!(command = %self.command.name(), kind = error.kind(), %error, "API request failed");
                ApiResponse::error(&error)
            }
        }
    }
}

/// Renders cache directives; `revalidate` maps to `s-maxage`.
pub fn cache_control_header(cache: &CacheControl) -> Option<String> {
    let mut directives = Vec::new();
    if let Some(max_age) = cache.max_age {
        directives.push(format!("max-age={max_age}"));
    }
    if let Some(stale) = cache.stale_while_revalidate {
        directives.push(format!("stale-while-revalidate={stale}"));
    }
    if let Some(revalidate) = cache.revalidate {
        directives.push(format!("s-maxage={revalidate}"));
    }
    (!directives.is_empty()).then(|| directives.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnicmd_engine::handler_fn;
    use omnicmd_types::{ApiOptions, CommandSchema, Parameter};

    fn search() -> Arc<Command> {
        let schema = CommandSchema::new("search", "Search things")
            .param(Parameter::string("q").required())
            .param(Parameter::number("limit").with_default(10).with_min(1.0))
            .param(Parameter::boolean("exact"))
            .api(ApiOptions {
                cache: Some(CacheControl {
                    max_age: Some(60),
                    stale_while_revalidate: Some(30),
                    revalidate: None,
                }),
                ..Default::default()
            });
        Arc::new(Command::new(schema, handler_fn(|args, _| async move { Ok(args.to_json()) })).expect("command"))
    }

    #[test]
    fn projects_method_path_and_cache() {
        let route = search().to_api();
        assert_eq!(route.method, HttpMethod::Get);
        assert_eq!(route.path, "/search");
        assert!(route.cache.is_some());
    }

    #[tokio::test]
    async fn get_requests_coerce_query_strings() {
        let route = search().to_api();
        let request = ApiRequest::new(HttpMethod::Get, "/search")
            .with_query("q", "rust")
            .with_query("limit", "5")
            .with_query("exact", "1");
        let response = route.handle(request).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"q": "rust", "limit": 5, "exact": true}));
        assert_eq!(response.header("cache-control"), Some("max-age=60, stale-while-revalidate=30"));
    }

    #[tokio::test]
    async fn validation_failures_are_400_without_cache_headers() {
        let route = search().to_api();
        let response = route.handle(ApiRequest::new(HttpMethod::Get, "/search")).await;
        assert_eq!(response.status, 400);
        assert!(response.header("cache-control").is_none());
        assert_eq!(response.body["details"][0]["path"], json!("q"));
        assert!(response.body["error"].as_str().expect("message").contains("q"));
    }

    #[tokio::test]
    async fn handler_errors_map_to_their_status() {
        let command = Arc::new(
            Command::new(
                CommandSchema::new("secret", "Needs auth").api(ApiOptions {
                    method: HttpMethod::Post,
                    ..Default::default()
                }),
                handler_fn(|_, _| async { Err(CommandError::Authentication("token expired".into())) }),
            )
            .expect("command"),
        );
        let response = command.to_api().handle(ApiRequest::new(HttpMethod::Post, "/secret")).await;
        assert_eq!(response.status, 401);
        assert_eq!(response.body, json!({"error": "token expired", "details": null}));
    }

    #[test]
    fn revalidate_becomes_s_maxage() {
        let cache = CacheControl {
            max_age: None,
            stale_while_revalidate: None,
            revalidate: Some(300),
        };
        assert_eq!(cache_control_header(&cache).as_deref(), Some("s-maxage=300"));
        assert_eq!(cache_control_header(&CacheControl::default()), None);
    }
}
