//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
};

use crate::{
    domain::{AuthError, OrderId, UserId},
    infrastructure::dto::{
        conversion::order_from_request,
        http::{
            AggregateDto, ErrorResponse, HealthResponse, OrderDto, OrderStatusResponse,
            RoomSummaryDto, RoomsResponse, SubmitRatingRequest, SubmitRatingResponse,
            UpdateOrderStatusRequest, UpsertOrderRequest,
        },
    },
    ui::state::AppState,
    usecase::{OrderError, RatingError, SubmitRatingCommand},
};

/// Structured rejection returned by every endpoint
pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn reject(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(code, message)))
}

/// Unwrap a JSON body, turning axum's plain-text rejection into a structured 400
fn json_body<T>(payload: Result<Json<T>, JsonRejection>, code: &str) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|e| {
        tracing::warn!("Malformed request body: {}", e.body_text());
        reject(StatusCode::BAD_REQUEST, code, e.body_text())
    })
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        connections: state.query_usecase.connection_count().await,
    })
}

/// Debug endpoint listing every live room and its member count
pub async fn debug_rooms(State(state): State<Arc<AppState>>) -> Json<RoomsResponse> {
    let rooms = state
        .query_usecase
        .room_sizes()
        .await
        .into_iter()
        .map(|(room, members)| RoomSummaryDto {
            room_id: room.to_string(),
            members,
        })
        .collect();
    Json(RoomsResponse { rooms })
}

/// Seed or replace an order record
pub async fn upsert_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    payload: Result<Json<UpsertOrderRequest>, JsonRejection>,
) -> Result<Json<OrderDto>, ApiError> {
    let request = json_body(payload, "invalid_order")?;
    let order = order_from_request(order_id, request)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, "invalid_order", e.to_string()))?;

    match state.update_order_status_usecase.upsert(order).await {
        Ok(order) => Ok(Json(order.into())),
        Err(e) => Err(order_rejection(e)),
    }
}

/// Change an order's status and notify the order room
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    payload: Result<Json<UpdateOrderStatusRequest>, JsonRejection>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let request = json_body(payload, "invalid_order")?;
    let order_id = OrderId::new(order_id)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, "invalid_order", e.to_string()))?;

    match state
        .update_order_status_usecase
        .execute(order_id, request.status, request.metadata)
        .await
    {
        Ok((order, report)) => Ok(Json(OrderStatusResponse {
            order: order.into(),
            delivered: report.delivered,
        })),
        Err(e) => Err(order_rejection(e)),
    }
}

fn order_rejection(e: OrderError) -> ApiError {
    let status = match &e {
        OrderError::NotFound(_) => StatusCode::NOT_FOUND,
        OrderError::InvalidOrder(_) => StatusCode::BAD_REQUEST,
        OrderError::Repository(_) => StatusCode::SERVICE_UNAVAILABLE,
        OrderError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!("Order request rejected: {}", e);
    reject(status, e.code(), e.to_string())
}

/// Submit a rating as the bearer of the `Authorization` token
pub async fn submit_rating(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<SubmitRatingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitRatingResponse>), ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
        .map_err(|e| reject(StatusCode::UNAUTHORIZED, "authentication_failed", e.to_string()))?;
    let rater = state
        .principal_resolver
        .resolve(token)
        .await
        .map_err(|e| reject(StatusCode::UNAUTHORIZED, "authentication_failed", e.to_string()))?;

    let request = json_body(payload, "invalid_rating")?;
    let order_id = OrderId::new(request.order_id)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, "invalid_rating", e.to_string()))?;
    let rated_party_id = UserId::new(request.rated_party_id)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, "invalid_rating", e.to_string()))?;

    let command = SubmitRatingCommand {
        order_id,
        rater,
        rated_party_id,
        score: request.score,
        comment: request.comment,
    };
    match state.submit_rating_usecase.execute(command).await {
        Ok(receipt) => Ok((
            StatusCode::CREATED,
            Json(SubmitRatingResponse {
                rating: receipt.rating.into(),
                aggregate: receipt.aggregate.into(),
                admin_alerted: receipt.admin_alerted,
            }),
        )),
        Err(e) => {
            let status = match &e {
                RatingError::InvalidRating(_) => StatusCode::BAD_REQUEST,
                RatingError::OrderNotEligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
                RatingError::Forbidden(_) => StatusCode::FORBIDDEN,
                RatingError::DuplicateRating { .. } => StatusCode::CONFLICT,
                RatingError::Repository(_) => StatusCode::SERVICE_UNAVAILABLE,
            };
            tracing::warn!("Rating rejected: {}", e);
            Err(reject(status, e.code(), e.to_string()))
        }
    }
}

/// Get the current aggregate score of a rated party
pub async fn get_aggregate(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<AggregateDto>, ApiError> {
    let user_id = UserId::new(user_id)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, "invalid_user", e.to_string()))?;

    state
        .query_usecase
        .aggregate_for(&user_id)
        .await
        .map(|aggregate| Json(aggregate.into()))
        .map_err(|e| reject(StatusCode::SERVICE_UNAVAILABLE, "unavailable", e.to_string()))
}
