use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::store::Page;
use crate::engine::escrow::EscrowService;

use super::{auth::AuthService, utils::validate_auth_token};

type ContractState = (Arc<AuthService>, Arc<EscrowService>);

#[derive(Debug, Deserialize)]
struct CreateContractRequest {
    application_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

async fn create_contract(
    headers: HeaderMap,
    State((auth, escrow)): State<ContractState>,
    Json(req): Json<CreateContractRequest>,
) -> Result<impl IntoResponse, Response> {
    let employer_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let created = escrow
        .create_from_application(req.application_id, employer_id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(json!({
        "contract": created.contract,
        "lock_transaction": created.lock_tx,
    })))
}

async fn complete_contract(
    headers: HeaderMap,
    State((auth, escrow)): State<ContractState>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, Response> {
    let caller_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let settlement = escrow
        .complete(contract_id, caller_id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(json!({
        "contract": settlement.contract,
        "unlocked_amount": settlement.unlocked,
    })))
}

async fn terminate_contract(
    headers: HeaderMap,
    State((auth, escrow)): State<ContractState>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, Response> {
    let caller_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let settlement = escrow
        .terminate(contract_id, caller_id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(json!({
        "contract": settlement.contract,
        "unlocked_amount": settlement.unlocked,
    })))
}

async fn get_contract(
    headers: HeaderMap,
    State((auth, escrow)): State<ContractState>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, Response> {
    let caller_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let contract = escrow
        .contract_for(contract_id, caller_id)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(contract))
}

async fn list_contracts(
    headers: HeaderMap,
    State((auth, escrow)): State<ContractState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, Response> {
    let caller_id = validate_auth_token(&headers, &auth).map_err(IntoResponse::into_response)?;
    let contracts = escrow
        .contracts_of(
            caller_id,
            Page {
                limit: page.limit,
                offset: page.offset,
            },
        )
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(contracts))
}

pub fn contract_routes(auth: Arc<AuthService>, escrow: Arc<EscrowService>) -> Router {
    Router::new()
        .route("/contracts", post(create_contract).get(list_contracts))
        .route("/contracts/:id", get(get_contract))
        .route("/contracts/:id/complete", post(complete_contract))
        .route("/contracts/:id/terminate", post(terminate_contract))
        .with_state((auth, escrow))
}
