//! HTTP handlers and wire DTOs.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, ApiResult, AppState};
use crate::Amount;
use crate::engine::{NewBooking, SettleArgs, WalletAccount};
use crate::ledger::Page;
use crate::model::{Booking, BookingStatus, MoneyRequest, TransactionRecord, UserId};

/// Platform identity placed by the upstream gateway.
fn caller_id(headers: &HeaderMap) -> ApiResult<UserId> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| ApiError::unauthorized("missing or invalid x-user-id header"))
}

/// Wallet session from the Authorization header.
async fn session_user(state: &AppState, headers: &HeaderMap) -> ApiResult<UserId> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing wallet session token"))?;
    state
        .sessions
        .lock()
        .await
        .resolve(token)
        .ok_or_else(|| ApiError::unauthorized("invalid wallet session token"))
}

// --- health ---

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthOut> {
    Json(HealthOut {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// --- bookings ---

#[derive(Debug, Deserialize)]
pub struct CreateBookingIn {
    pub service_provider_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub booking_date: DateTime<Utc>,
    pub charge: f64,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingIn>,
) -> ApiResult<Json<Booking>> {
    let user = caller_id(&headers)?;
    let mut engine = state.engine.lock().await;
    let booking = engine.create_booking(
        user,
        NewBooking {
            service_provider_id: body.service_provider_id,
            title: body.title,
            description: body.description,
            booking_date: body.booking_date,
            charge: Amount::from_float(body.charge),
        },
    )?;
    Ok(Json(booking.clone()))
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<Booking>> {
    let user = caller_id(&headers)?;
    let engine = state.engine.lock().await;
    Ok(Json(engine.booking(user, id)?.clone()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusIn {
    pub status: BookingStatus,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<UpdateStatusIn>,
) -> ApiResult<Json<Booking>> {
    let user = caller_id(&headers)?;
    let mut engine = state.engine.lock().await;
    let booking = engine.update_booking_status(user, id, body.status)?;
    Ok(Json(booking.clone()))
}

// --- wallet ---

#[derive(Debug, Serialize)]
pub struct WalletOut {
    pub owner_id: UserId,
    pub balance: Amount,
    pub discount_percent: u8,
}

impl From<&WalletAccount> for WalletOut {
    fn from(wallet: &WalletAccount) -> Self {
        Self {
            owner_id: wallet.owner,
            balance: wallet.balance(),
            discount_percent: wallet.discount_percent(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PinIn {
    pub pin: String,
}

pub async fn register_wallet(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PinIn>,
) -> ApiResult<Json<WalletOut>> {
    let owner = caller_id(&headers)?;
    let mut engine = state.engine.lock().await;
    let wallet = engine.register_wallet(owner, &body.pin)?;
    Ok(Json(wallet.into()))
}

#[derive(Debug, Serialize)]
pub struct LoginOut {
    pub token: String,
}

pub async fn wallet_login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PinIn>,
) -> ApiResult<Json<LoginOut>> {
    let owner = caller_id(&headers)?;
    state.engine.lock().await.verify_pin(owner, &body.pin)?;
    let token = state.sessions.lock().await.issue(owner);
    Ok(Json(LoginOut { token }))
}

pub async fn wallet_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<WalletOut>> {
    let owner = session_user(&state, &headers).await?;
    let engine = state.engine.lock().await;
    Ok(Json(engine.wallet(owner)?.into()))
}

#[derive(Debug, Deserialize)]
pub struct DiscountIn {
    pub percent: u8,
}

pub async fn set_discount(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<DiscountIn>,
) -> ApiResult<Json<WalletOut>> {
    let owner = session_user(&state, &headers).await?;
    let mut engine = state.engine.lock().await;
    let wallet = engine.set_discount(owner, body.percent)?;
    Ok(Json(wallet.into()))
}

#[derive(Debug, Deserialize)]
pub struct DepositIn {
    pub amount: f64,
}

pub async fn deposit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<DepositIn>,
) -> ApiResult<Json<WalletOut>> {
    let owner = session_user(&state, &headers).await?;
    let mut engine = state.engine.lock().await;
    let wallet = engine.deposit(owner, Amount::from_float(body.amount))?;
    Ok(Json(wallet.into()))
}

#[derive(Debug, Deserialize)]
pub struct ResetPinIn {
    pub main_password: String,
    pub new_pin: String,
}

#[derive(Debug, Serialize)]
pub struct OkOut {
    pub ok: bool,
}

pub async fn reset_pin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ResetPinIn>,
) -> ApiResult<Json<OkOut>> {
    let owner = caller_id(&headers)?;
    let mut engine = state.engine.lock().await;
    engine.reset_pin(
        owner,
        &body.main_password,
        &body.new_pin,
        state.credentials.as_ref(),
    )?;
    Ok(Json(OkOut { ok: true }))
}

// --- money requests ---

#[derive(Debug, Deserialize)]
pub struct CreateRequestIn {
    pub booking_id: Uuid,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
}

pub async fn create_money_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateRequestIn>,
) -> ApiResult<Json<MoneyRequest>> {
    let provider = caller_id(&headers)?;
    let mut engine = state.engine.lock().await;
    let request = engine.create_request(
        provider,
        body.booking_id,
        Amount::from_float(body.amount),
        body.description,
    )?;
    Ok(Json(request.clone()))
}

pub async fn list_money_requests(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<MoneyRequest>>> {
    let user = caller_id(&headers)?;
    let engine = state.engine.lock().await;
    let requests = engine.requests_for(user).into_iter().cloned().collect();
    Ok(Json(requests))
}

// --- transactions ---

#[derive(Debug, Deserialize)]
pub struct SendMoneyIn {
    pub receiver_id: UserId,
    pub amount: Option<f64>,
    pub booking_id: Option<Uuid>,
    pub request_id: Option<Uuid>,
    pub pin: String,
    pub idempotency_key: Option<String>,
}

pub async fn send_money(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SendMoneyIn>,
) -> ApiResult<Json<TransactionRecord>> {
    let payer = caller_id(&headers)?;
    let mut engine = state.engine.lock().await;
    let record = engine.settle(
        payer,
        SettleArgs {
            receiver: body.receiver_id,
            pin: body.pin,
            amount: body.amount.map(Amount::from_float),
            booking_id: body.booking_id,
            request_id: body.request_id,
            idempotency_key: body.idempotency_key,
        },
    )?;
    Ok(Json(record.clone()))
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
    headers: HeaderMap,
) -> ApiResult<Json<Page>> {
    let user = caller_id(&headers)?;
    let engine = state.engine.lock().await;
    Ok(Json(engine.history(
        user,
        params.page.unwrap_or(1),
        params.limit.unwrap_or(20),
    )))
}

pub async fn statement_csv(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let user = caller_id(&headers)?;
    let engine = state.engine.lock().await;
    let csv = engine.statement_csv(user);
    Ok(([(header::CONTENT_TYPE, "text/csv")], csv))
}

pub async fn receipt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<String> {
    let user = caller_id(&headers)?;
    let engine = state.engine.lock().await;
    let receipt = engine.receipt(user, id, state.directory.as_ref())?;
    Ok(receipt.render())
}
