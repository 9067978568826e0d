use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::models::{TxKind, TxStatus};
use crate::db::store::{Page, TxFilter};
use crate::engine::wallet::WalletService;

use super::{auth::AuthService, utils::validate_auth_token};

type WalletState = (Arc<AuthService>, Arc<WalletService>);

#[derive(Debug, Deserialize)]
struct AmountRequest {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct VerifyTopupRequest {
    order_id: String,
    payment_id: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct TransferRequest {
    recipient_id: Uuid,
    amount: Decimal,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TxQuery {
    status: Option<TxStatus>,
    kind: Option<TxKind>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn get_wallet(
    headers: HeaderMap,
    State((auth, wallets)): State<WalletState>,
) -> Result<impl IntoResponse, Response> {
    let user_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let wallet = wallets
        .wallet(user_id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(wallet))
}

async fn deposit(
    headers: HeaderMap,
    State((auth, wallets)): State<WalletState>,
    Json(req): Json<AmountRequest>,
) -> Result<impl IntoResponse, Response> {
    let user_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let tx = wallets
        .deposit(user_id, req.amount)
        .await
        .map_err(IntoResponse::into_response)?;
    tracing::info!(user = %user_id, amount = %req.amount, "wallet deposit");
    Ok(Json(tx))
}

async fn begin_topup(
    headers: HeaderMap,
    State((auth, wallets)): State<WalletState>,
    Json(req): Json<AmountRequest>,
) -> Result<impl IntoResponse, Response> {
    let user_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let order = wallets
        .begin_topup(user_id, req.amount)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(json!({
        "order_id": order.order_id,
        "transaction": order.transaction,
    })))
}

async fn verify_topup(
    headers: HeaderMap,
    State((auth, wallets)): State<WalletState>,
    Json(req): Json<VerifyTopupRequest>,
) -> Result<impl IntoResponse, Response> {
    let user_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let tx = wallets
        .confirm_topup(user_id, &req.order_id, &req.payment_id, &req.signature)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(tx))
}

async fn transfer(
    headers: HeaderMap,
    State((auth, wallets)): State<WalletState>,
    Json(req): Json<TransferRequest>,
) -> Result<impl IntoResponse, Response> {
    let user_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let receipt = wallets
        .transfer(user_id, req.recipient_id, req.amount, req.description)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(json!({
        "debit": receipt.debit,
        "credit": receipt.credit,
    })))
}

async fn request_withdrawal(
    headers: HeaderMap,
    State((auth, wallets)): State<WalletState>,
    Json(req): Json<AmountRequest>,
) -> Result<impl IntoResponse, Response> {
    let user_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let tx = wallets
        .request_withdrawal(user_id, req.amount)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(tx))
}

async fn list_transactions(
    headers: HeaderMap,
    State((auth, wallets)): State<WalletState>,
    Query(query): Query<TxQuery>,
) -> Result<impl IntoResponse, Response> {
    let user_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let filter = TxFilter {
        status: query.status,
        kind: query.kind,
        from: query.from,
        to: query.to,
    };
    let page = Page {
        limit: query.limit,
        offset: query.offset,
    };
    let txs = wallets
        .transactions(user_id, &filter, page)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(txs))
}

pub fn wallet_routes(auth: Arc<AuthService>, wallets: Arc<WalletService>) -> Router {
    Router::new()
        .route("/wallet", get(get_wallet))
        .route("/wallet/deposit", post(deposit))
        .route("/wallet/topup", post(begin_topup))
        .route("/wallet/topup/verify", post(verify_topup))
        .route("/wallet/transfer", post(transfer))
        .route("/wallet/withdraw", post(request_withdrawal))
        .route("/wallet/transactions", get(list_transactions))
        .with_state((auth, wallets))
}
