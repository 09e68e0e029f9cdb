use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use shared::{CatalogError, Order, OrderDraft, OrderStatus, Product, ProductInput, SearchField};

use crate::store::CatalogStore;
use crate::workflow::{OrderWorkflow, WorkflowError};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub workflow: Arc<OrderWorkflow>,
}

/// An order as rendered to callers: the record plus its display code.
#[derive(Debug, Serialize)]
pub struct OrderBody {
    pub code: String,
    #[serde(flatten)]
    pub order: Order,
}

impl From<Order> for OrderBody {
    fn from(order: Order) -> Self {
        Self {
            code: order.display_code(),
            order,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct FieldErrorBody {
    pub field: Option<&'static str>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse {
    pub errors: Vec<FieldErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub label: String,
    pub value: i32,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub field: SearchField,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<OrderStatus>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/orders", post(create_order).get(list_orders))
        .route(
            "/orders/:id",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/orders/:id/approve", post(approve_order))
        .route("/orders/:id/disapprove", post(disapprove_order))
        .route("/products", post(create_product).get(list_products))
        .route("/products/search", get(search_products))
        .route(
            "/products/:code",
            get(get_product).put(update_product).delete(delete_product),
        )
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        match self {
            WorkflowError::Rejected(errors) => {
                let body = ValidationErrorResponse {
                    errors: errors
                        .iter()
                        .map(|e| FieldErrorBody {
                            field: e.field(),
                            message: e.to_string(),
                        })
                        .collect(),
                };
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            WorkflowError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "Order not found".to_string(),
                }),
            )
                .into_response(),
            WorkflowError::Backend(e) => {
                error!("Order workflow error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

fn catalog_error(err: CatalogError) -> Response {
    let status = match &err {
        CatalogError::DuplicateCode(_) => StatusCode::CONFLICT,
        CatalogError::NotFound => StatusCode::NOT_FOUND,
        CatalogError::InsufficientStock { .. } => StatusCode::CONFLICT,
        CatalogError::Backend(e) => {
            error!("Catalog error: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error".to_string(),
                }),
            )
                .into_response();
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

async fn health_check() -> &'static str {
    "OK"
}

async fn create_order(
    State(state): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<OrderBody>), WorkflowError> {
    let order = state.workflow.submit_order(draft).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Vec<OrderBody>>, WorkflowError> {
    let orders = state.workflow.list_orders(params.status).await?;
    Ok(Json(orders.into_iter().map(OrderBody::from).collect()))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderBody>, WorkflowError> {
    let order = state.workflow.get_order(id).await?;
    Ok(Json(order.into()))
}

async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(draft): Json<OrderDraft>,
) -> Result<Json<OrderBody>, WorkflowError> {
    let order = state.workflow.update_order(id, draft).await?;
    Ok(Json(order.into()))
}

async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, WorkflowError> {
    state.workflow.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderBody>, WorkflowError> {
    let order = state.workflow.approve_order(id).await?;
    Ok(Json(order.into()))
}

async fn disapprove_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderBody>, WorkflowError> {
    let order = state.workflow.disapprove_order(id).await?;
    Ok(Json(order.into()))
}

async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), Response> {
    match state.catalog.create_product(input).await {
        Ok(product) => Ok((StatusCode::CREATED, Json(product))),
        Err(err) => Err(catalog_error(err)),
    }
}

async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, Response> {
    match state.catalog.list_products().await {
        Ok(products) => Ok(Json(products)),
        Err(err) => Err(catalog_error(err)),
    }
}

async fn get_product(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Product>, Response> {
    match state.catalog.get_product(&code).await {
        Ok(product) => Ok(Json(product)),
        Err(err) => Err(catalog_error(err)),
    }
}

async fn update_product(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, Response> {
    match state.catalog.update_product(&code, input).await {
        Ok(product) => Ok(Json(product)),
        Err(err) => Err(catalog_error(err)),
    }
}

async fn delete_product(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, Response> {
    match state.catalog.delete_product(&code).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(catalog_error(err)),
    }
}

async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, Response> {
    match state.catalog.search(params.field, &params.term).await {
        Ok(products) => Ok(Json(
            products
                .into_iter()
                .map(|p| SearchHit {
                    label: format!("{} ({})", p.name, p.code),
                    value: p.id,
                    name: p.name,
                    code: p.code,
                })
                .collect(),
        )),
        Err(err) => Err(catalog_error(err)),
    }
}
