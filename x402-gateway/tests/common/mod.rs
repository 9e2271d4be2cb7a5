//! A minimal X402 resource server: one paid service, v1 terms, always settles.

#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use url::Url;
use x402_core::{
    transport::{PaymentPayload, SettlementResponse, X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER},
    types::Base64EncodedHeader,
};

pub const TX_HASH: &str = "0x5e1f0000000000000000000000000000000000000000000000000000000000bb";

#[derive(Default)]
pub struct ServerState {
    pub broken_listing: bool,
    pub paid_requests: AtomicUsize,
}

impl ServerState {
    pub fn paid(&self) -> usize {
        self.paid_requests.load(Ordering::SeqCst)
    }
}

pub struct FakeResourceServer {
    pub url: Url,
    pub state: Arc<ServerState>,
}

impl FakeResourceServer {
    pub async fn start(broken_listing: bool) -> Self {
        let state = Arc::new(ServerState {
            broken_listing,
            ..Default::default()
        });
        let app = Router::new()
            .route("/api/x402/services", get(list_services))
            .route("/api/x402/services/reward-points", post(resource))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeResourceServer {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            state,
        }
    }
}

async fn list_services(State(state): State<Arc<ServerState>>) -> Response {
    if state.broken_listing {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({
        "services": [{
            "id": "reward-points",
            "title": "Earn reward points",
            "hookType": "reward-points",
            "hookAddress": "0x00000000000000000000000000000000000000a1",
            "network": "base-sepolia",
            "settlementRouter": "0x32431D4511e061F1133520461B07eC42afF157D6",
            "usdcAddress": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "chainId": 84532,
            "supportingContracts": { "rewardToken": "0x00000000000000000000000000000000000000d4" }
        }]
    }))
    .into_response()
}

async fn resource(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    let Some(proof) = headers.get(X_PAYMENT_HEADER) else {
        return (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "x402Version": 1,
                "error": "X-PAYMENT header is required",
                "accepts": [{
                    "scheme": "exact",
                    "network": "base-sepolia",
                    "maxAmountRequired": "5000",
                    "payTo": "0x00000000000000000000000000000000000000c3",
                    "maxTimeoutSeconds": 120,
                    "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
                }]
            })),
        )
            .into_response();
    };

    state.paid_requests.fetch_add(1, Ordering::SeqCst);
    let payment: PaymentPayload = Base64EncodedHeader::from(proof.to_str().unwrap())
        .decode()
        .unwrap();
    let receipt = SettlementResponse {
        success: true,
        transaction: TX_HASH.to_string(),
        network: payment.network,
        payer: payment.payload["authorization"]["from"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        error_reason: None,
    };
    (
        [(
            X_PAYMENT_RESPONSE_HEADER.to_ascii_lowercase(),
            Base64EncodedHeader::encode(&receipt).unwrap().0,
        )],
        Json(json!({ "points": 5 })),
    )
        .into_response()
}
