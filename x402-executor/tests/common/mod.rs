//! A resource server that speaks just enough X402 to be paid.

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use url::Url;
use x402_core::{
    transport::{PaymentPayload, PaymentRequired, SettlementResponse},
    types::{Base64EncodedHeader, X402Version},
};

pub const CHAIN_ID: u64 = 84532;
pub const NETWORK: &str = "base-sepolia";
pub const USDC: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
pub const ROUTER: &str = "0x32431D4511e061F1133520461B07eC42afF157D6";
pub const HOOK: &str = "0x00000000000000000000000000000000000000a1";
pub const NFT_CONTRACT: &str = "0x00000000000000000000000000000000000000b2";
pub const MERCHANT: &str = "0x00000000000000000000000000000000000000c3";
pub const AMOUNT: &str = "10000";
pub const TX_HASH: &str = "0x5e1f0000000000000000000000000000000000000000000000000000000000aa";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Settles any payment it is sent.
    Settle,
    /// Answers every paid request with another 402.
    RejectPayment,
    /// Fails the service listing with a 500.
    BrokenListing,
    /// Lists extra entries with `null` and wrongly typed fields.
    MalformedListing,
}

pub struct ServerState {
    pub version: X402Version,
    pub behavior: Behavior,
    pub unpaid_requests: AtomicUsize,
    pub paid_requests: AtomicUsize,
    pub last_payment: Mutex<Option<PaymentPayload>>,
}

impl ServerState {
    pub fn unpaid(&self) -> usize {
        self.unpaid_requests.load(Ordering::SeqCst)
    }

    pub fn paid(&self) -> usize {
        self.paid_requests.load(Ordering::SeqCst)
    }

    pub fn last_payment(&self) -> Option<PaymentPayload> {
        self.last_payment.lock().unwrap().clone()
    }
}

pub struct FakeResourceServer {
    pub url: Url,
    pub state: Arc<ServerState>,
}

impl FakeResourceServer {
    pub async fn start(version: X402Version, behavior: Behavior) -> Self {
        let state = Arc::new(ServerState {
            version,
            behavior,
            unpaid_requests: AtomicUsize::new(0),
            paid_requests: AtomicUsize::new(0),
            last_payment: Mutex::new(None),
        });

        let app = Router::new()
            .route("/api/x402/services", get(list_services))
            .route("/api/x402/services/{id}", post(resource))
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

pub fn service_json() -> Value {
    json!({
        "id": "mint-nft",
        "title": "Random NFT Mint",
        "description": "Mint a random NFT after paying",
        "hookType": "nft-mint",
        "hookAddress": HOOK,
        "network": NETWORK,
        "settlementRouter": ROUTER,
        "usdcAddress": USDC,
        "chainId": CHAIN_ID,
        "supportingContracts": { "nftContract": NFT_CONTRACT },
        "defaults": { "paymentAmount": "0.01", "facilitatorFee": "0.001", "payTo": MERCHANT }
    })
}

pub fn free_service_json() -> Value {
    json!({
        "id": "free",
        "title": "Free sample",
        "hookType": "transfer-split",
        "network": NETWORK,
        "chainId": CHAIN_ID,
    })
}

async fn list_services(State(state): State<Arc<ServerState>>) -> Response {
    if state.behavior == Behavior::BrokenListing {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let mut services = vec![service_json(), free_service_json()];
    if state.behavior == Behavior::MalformedListing {
        services.push(json!({
            "id": "half-filled",
            "title": null,
            "hookType": null,
            "settlementRouter": 42,
            "chainId": "84532",
            "supportingContracts": null
        }));
        services.push(json!("not-an-object"));
    }
    Json(json!({ "services": services })).into_response()
}

fn payment_required(state: &ServerState) -> PaymentRequired {
    serde_json::from_value(json!({
        "x402Version": state.version,
        "error": "payment required",
        "accepts": [{
            "scheme": "exact",
            "network": NETWORK,
            "maxAmountRequired": AMOUNT,
            "description": "Random NFT Mint",
            "mimeType": "application/json",
            "payTo": ROUTER,
            "maxTimeoutSeconds": 300,
            "asset": USDC,
            "extra": { "name": "USDC", "version": "2" }
        }]
    }))
    .unwrap()
}

fn header_name(name: &str) -> HeaderName {
    HeaderName::from_bytes(name.as_bytes()).unwrap()
}

async fn resource(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if id == "free" {
        return Json(json!({ "data": "free sample" })).into_response();
    }

    let Some(proof) = headers.get(state.version.payment_header()) else {
        state.unpaid_requests.fetch_add(1, Ordering::SeqCst);
        let required = payment_required(&state);
        return match state.version {
            X402Version::V1 => (StatusCode::PAYMENT_REQUIRED, Json(required)).into_response(),
            X402Version::V2 => (
                StatusCode::PAYMENT_REQUIRED,
                [(
                    header_name(x402_core::transport::PAYMENT_REQUIRED_HEADER),
                    Base64EncodedHeader::encode(&required).unwrap().0,
                )],
            )
                .into_response(),
        };
    };

    state.paid_requests.fetch_add(1, Ordering::SeqCst);
    let payment: PaymentPayload = Base64EncodedHeader::from(proof.to_str().unwrap())
        .decode()
        .unwrap();
    let payer = payment.payload["authorization"]["from"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    *state.last_payment.lock().unwrap() = Some(payment);

    if state.behavior == Behavior::RejectPayment {
        let mut required = payment_required(&state);
        required.error = Some("insufficient funds".to_string());
        return (StatusCode::PAYMENT_REQUIRED, Json(required)).into_response();
    }

    let receipt = SettlementResponse {
        success: true,
        transaction: TX_HASH.to_string(),
        network: NETWORK.to_string(),
        payer,
        error_reason: None,
    };
    (
        [(
            header_name(state.version.settlement_header()),
            Base64EncodedHeader::encode(&receipt).unwrap().0,
        )],
        Json(json!({ "data": "minted", "tokenId": 7 })),
    )
        .into_response()
}
