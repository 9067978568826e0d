use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::store::WithdrawalOutcome;
use crate::engine::payout::PayoutService;
use crate::engine::wallet::WalletService;

use super::utils::require_service_token;

#[derive(Clone)]
pub struct InternalState {
    pub payouts: Arc<PayoutService>,
    pub wallets: Arc<WalletService>,
    pub trigger_token: String,
}

/// External cron caller hits this to run the weekly sweep.
async fn run_payouts(
    headers: HeaderMap,
    State(state): State<InternalState>,
) -> Result<impl IntoResponse, Response> {
    require_service_token(&headers, &state.trigger_token)
        .map_err(IntoResponse::into_response)?;
    tracing::info!("payout sweep triggered");
    let report = state
        .payouts
        .process_weekly_payouts()
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct WithdrawalCallback {
    transaction_id: Uuid,
    #[serde(flatten)]
    outcome: WithdrawalOutcome,
}

/// Callback from the external payout rail settling a pending withdrawal.
async fn confirm_withdrawal(
    headers: HeaderMap,
    State(state): State<InternalState>,
    Json(callback): Json<WithdrawalCallback>,
) -> Result<impl IntoResponse, Response> {
    require_service_token(&headers, &state.trigger_token)
        .map_err(IntoResponse::into_response)?;
    let tx = state
        .wallets
        .confirm_withdrawal(callback.transaction_id, callback.outcome)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(tx))
}

pub fn internal_routes(state: InternalState) -> Router {
    Router::new()
        .route("/internal/payouts/run", post(run_payouts))
        .route("/internal/withdrawals/confirm", post(confirm_withdrawal))
        .with_state(state)
}
