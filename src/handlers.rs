use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

use crate::{
    basket::Basket,
    config::AppConfig,
    error::{AppError, BasketError},
    forward::Forwarder,
    matcher::SearchScope,
    model::{BasketConfig, RequestRecord, ResponseConfig},
    registry::BasketRegistry,
    telemetry,
};

/// Names routed to the service itself rather than to a basket.
pub const RESERVED_NAMES: [&str; 2] = ["api", "health"];

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<dyn BasketRegistry>,
    pub forwarder: Arc<Forwarder>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/baskets", get(list_baskets))
        .route(
            "/api/baskets/:name",
            get(get_basket)
                .post(create_basket)
                .put(update_basket)
                .delete(delete_basket),
        )
        .route(
            "/api/baskets/:name/requests",
            get(get_requests).delete(clear_requests),
        )
        .route(
            "/api/baskets/:name/responses/:method",
            get(get_response).put(put_response),
        )
        .route("/:name", any(capture_request))
        .route("/:name/*rest", any(capture_request))
        .with_state(state)
}

pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    max: Option<i64>,
    skip: Option<i64>,
    q: Option<String>,
    #[serde(rename = "in")]
    scope: Option<String>,
}

impl PageParams {
    /// `(max, skip)` with negative values clamped to zero.
    fn window(&self, page_size: usize) -> (usize, usize) {
        let clamp = |value: i64| usize::try_from(value.max(0)).unwrap_or(usize::MAX);
        (
            self.max.map(clamp).unwrap_or(page_size),
            self.skip.map(clamp).unwrap_or(0),
        )
    }
}

/// Basket configuration as accepted over the API; a missing capacity is
/// filled in by the service.
#[derive(Debug, Default, Deserialize)]
struct BasketConfigBody {
    #[serde(default)]
    forward_url: String,
    #[serde(default)]
    insecure_tls: bool,
    #[serde(default)]
    expand_path: bool,
    capacity: Option<usize>,
}

impl BasketConfigBody {
    fn parse(body: &Bytes) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| AppError::InvalidBody(e.to_string()))
    }

    fn into_config(self, default_capacity: usize, max_capacity: usize) -> Result<BasketConfig, AppError> {
        let capacity = self.capacity.unwrap_or(default_capacity);
        if capacity > max_capacity {
            return Err(BasketError::InvalidConfig(format!(
                "capacity may not be greater than {}",
                max_capacity
            ))
            .into());
        }
        Ok(BasketConfig {
            forward_url: self.forward_url,
            insecure_tls: self.insecure_tls,
            expand_path: self.expand_path,
            capacity,
        })
    }
}

fn request_token(headers: &HeaderMap) -> &str {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
}

fn is_master(config: &AppConfig, headers: &HeaderMap) -> bool {
    let token = request_token(headers);
    !token.is_empty() && token == config.master_token
}

async fn authorized_basket(
    state: &AppState,
    headers: &HeaderMap,
    name: &str,
) -> Result<Arc<dyn Basket>, AppError> {
    let basket = state.registry.get(name).await.ok_or(AppError::NotFound)?;
    if is_master(&state.config, headers) || basket.authorize(request_token(headers)).await {
        Ok(basket)
    } else {
        debug!(basket = name, "Rejected request with invalid token");
        Err(AppError::Unauthorized)
    }
}

pub async fn list_baskets(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Result<Response, AppError> {
    if !is_master(&state.config, &headers) {
        return Err(AppError::Unauthorized);
    }

    let (max, skip) = params.window(state.config.page_size);
    let response = match params.q.as_deref() {
        Some(query) => Json(state.registry.find_names(query, max, skip).await).into_response(),
        None => Json(state.registry.get_names(max, skip).await).into_response(),
    };
    Ok(response)
}

pub async fn create_basket(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    if RESERVED_NAMES.contains(&name.as_str()) {
        return Err(AppError::ReservedName(name));
    }

    let config = BasketConfigBody::parse(&body)?
        .into_config(state.config.default_capacity, state.config.max_capacity)?;
    let auth = state.registry.create(&name, config).await?;

    Ok((StatusCode::CREATED, Json(auth)).into_response())
}

pub async fn get_basket(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<BasketConfig>, AppError> {
    let basket = authorized_basket(&state, &headers, &name).await?;
    Ok(Json(basket.config().await))
}

pub async fn update_basket(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let basket = authorized_basket(&state, &headers, &name).await?;

    let current = basket.config().await;
    let config = BasketConfigBody::parse(&body)?
        .into_config(current.capacity, state.config.max_capacity)?;
    basket.update(config).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_basket(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    authorized_basket(&state, &headers, &name).await?;
    state.registry.delete(&name).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_requests(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Result<Response, AppError> {
    let basket = authorized_basket(&state, &headers, &name).await?;

    let (max, skip) = params.window(state.config.page_size);
    let response = match params.q.as_deref() {
        Some(query) => {
            let scope = SearchScope::parse(params.scope.as_deref().unwrap_or_default());
            Json(basket.find_requests(query, scope, max, skip).await).into_response()
        }
        None => Json(basket.get_requests(max, skip).await).into_response(),
    };
    Ok(response)
}

pub async fn clear_requests(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let basket = authorized_basket(&state, &headers, &name).await?;
    basket.clear().await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_response(
    State(state): State<AppState>,
    Path((name, method)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<ResponseConfig>, AppError> {
    let basket = authorized_basket(&state, &headers, &name).await?;
    Ok(Json(basket.get_response(&method.to_uppercase()).await))
}

pub async fn put_response(
    State(state): State<AppState>,
    Path((name, method)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let basket = authorized_basket(&state, &headers, &name).await?;

    let response: ResponseConfig =
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidBody(e.to_string()))?;
    if response.status != 0 && !(100..=599).contains(&response.status) {
        return Err(AppError::InvalidBody(format!(
            "invalid HTTP status: {}",
            response.status
        )));
    }
    basket.set_response(&method.to_uppercase(), response).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Records a request sent to a basket, hands it to the forwarder and replies
/// with the basket's configured response.
pub async fn capture_request(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request<Body>,
) -> Result<Response, AppError> {
    let name = params.get("name").cloned().unwrap_or_default();
    let basket = state.registry.get(&name).await.ok_or(AppError::NotFound)?;

    let method = request.method().to_string();
    let record = RequestRecord::from_request(request).await;
    let (stored, config) = basket.capture(record).await;
    telemetry::record_captured(&name);

    state.forwarder.dispatch(stored, config, &name);

    Ok(canned_response(basket.get_response(&method).await))
}

fn canned_response(config: ResponseConfig) -> Response {
    let status = match config.status {
        0 => StatusCode::OK,
        code => StatusCode::from_u16(code).unwrap_or_else(|_| {
            warn!(status = code, "Configured response has invalid status");
            StatusCode::OK
        }),
    };
    if config.is_template {
        debug!("Template rendering is external, replying with raw body");
    }

    let mut response = Response::new(Body::from(config.body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, values) in &config.headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in values {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(name.clone(), value);
            }
        }
    }
    response
}
