//! The pay-to-access protocol, driven once per execution.
//!
//! ```text
//! Idle -> Requesting -> Settled                      (free resource)
//!                    -> PaymentRequired -> Signing -> Resubmitting -> Settled
//! any phase          -> Errored                      (one `error` event, then nothing)
//! ```
//!
//! Every phase checks for cancellation before touching the network, and signing is raced
//! against it, so a consumer that goes away while a wallet prompt is open never causes the
//! paid request to be sent.

use std::{
    fmt::Display,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use reqwest::{Response, StatusCode};
use serde_json::json;
use url::Url;
use x402_core::{
    transport::{
        EXACT_SCHEME, PAYMENT_REQUIRED_HEADER, PaymentPayload, PaymentRequired,
        PaymentRequirements, SettlementResponse,
    },
    types::{AnyJson, Base64EncodedHeader, X402Version},
};

use crate::{
    config::DEFAULT_REQUEST_TIMEOUT,
    errors::ExecutionError,
    progress::{ProgressEvent, ProgressEventKind, ProgressSink},
    service::Service,
    settlement::prepare_authorization,
    signer::{SigningError, WalletSigner},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Requesting,
    PaymentRequired,
    Signing,
    Resubmitting,
    Settled,
    Errored,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Requesting => "requesting",
            Phase::PaymentRequired => "payment-required",
            Phase::Signing => "signing",
            Phase::Resubmitting => "resubmitting",
            Phase::Settled => "settled",
            Phase::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Runs the protocol against one resource server.
#[derive(Debug, Clone)]
pub struct PaymentProtocol {
    client: reqwest::Client,
    resource_server: Url,
    request_timeout: Duration,
}

impl PaymentProtocol {
    pub fn new(client: reqwest::Client, resource_server: Url) -> Self {
        PaymentProtocol {
            client,
            resource_server,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Execute `service` once, paying with `signer`, and report through `sink`.
    ///
    /// Ends with exactly one terminal event, unless the consumer cancelled, in which case
    /// nothing more is emitted.
    pub async fn run<S: WalletSigner>(
        &self,
        service: &Service,
        query: &AnyJson,
        signer: &S,
        sink: &ProgressSink,
    ) -> Phase {
        let mut phase = Phase::Idle;
        match self.drive(service, query, signer, sink, &mut phase).await {
            Ok(()) => Phase::Settled,
            Err(ExecutionError::Cancelled) => {
                #[cfg(feature = "tracing")]
                tracing::info!(service = %service.id, %phase, "Execution cancelled");
                phase
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(service = %service.id, %phase, "Execution failed: {err}");
                let _ = sink.emit(ProgressEvent::error(err.to_string())).await;
                Phase::Errored
            }
        }
    }

    async fn drive<S: WalletSigner>(
        &self,
        service: &Service,
        query: &AnyJson,
        signer: &S,
        sink: &ProgressSink,
        phase: &mut Phase,
    ) -> Result<(), ExecutionError> {
        let url = self.resource_url(service)?;

        enter(phase, Phase::Requesting, service);
        sink.emit(ProgressEvent::new(
            ProgressEventKind::Progress,
            format!("Requesting {}", display_name(service)),
        ))
        .await?;

        let response = until_cancelled(sink, self.post(&url, query, None)).await??;
        let status = response.status();
        if status.is_success() {
            let settled = settled_payload(status, None, response).await;
            enter(phase, Phase::Settled, service);
            sink.emit(
                ProgressEvent::new(ProgressEventKind::Settled, "Resource served without payment")
                    .with_payload(settled),
            )
            .await?;
            return Ok(());
        }
        if status != StatusCode::PAYMENT_REQUIRED {
            return Err(ExecutionError::Protocol(format!(
                "Resource server responded with {status}"
            )));
        }

        enter(phase, Phase::PaymentRequired, service);
        let required = read_payment_required(response).await?;
        let version = required.x402_version;
        let requirements = required
            .select(EXACT_SCHEME, &service.network)
            .ok_or_else(|| no_matching_terms(&required, service))?
            .clone();
        sink.emit(
            ProgressEvent::new(
                ProgressEventKind::PaymentRequired,
                format!(
                    "Payment required: {} on {}",
                    requirements.max_amount_required, requirements.network
                ),
            )
            .with_payload(json!({
                "x402Version": version,
                "requirements": requirements,
            })),
        )
        .await?;

        let payer = signer.address().ok_or(SigningError::NotConnected)?;
        let request = prepare_authorization(service, &requirements, payer, now_secs())?;

        enter(phase, Phase::Signing, service);
        sink.emit(
            ProgressEvent::new(
                ProgressEventKind::Signing,
                format!("Signing payment authorization with {}", signer.mode()),
            )
            .with_payload(json!({
                "mode": signer.mode(),
                "address": payer,
            })),
        )
        .await?;
        let signed = until_cancelled(sink, signer.sign(request)).await??;

        let proof = PaymentPayload {
            x402_version: version,
            scheme: EXACT_SCHEME.to_string(),
            network: requirements.network.clone(),
            payload: serde_json::to_value(&signed)?,
        };
        let header = Base64EncodedHeader::encode(&proof)?;

        enter(phase, Phase::Resubmitting, service);
        if sink.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        let response = until_cancelled(
            sink,
            self.post(&url, query, Some((version.payment_header(), &header))),
        )
        .await??;

        let status = response.status();
        let receipt = read_settlement(&response, version);
        if !status.is_success() {
            let reason = match (&receipt, status) {
                (Some(receipt), _) if receipt.error_reason.is_some() => {
                    receipt.error_reason.clone().unwrap_or_default()
                }
                (_, StatusCode::PAYMENT_REQUIRED) => read_payment_required(response)
                    .await
                    .ok()
                    .and_then(|r| r.error)
                    .unwrap_or_else(|| "payment was not accepted".to_string()),
                _ => status.to_string(),
            };
            return Err(ExecutionError::Protocol(format!(
                "Paid request failed ({status}): {reason}"
            )));
        }

        let settled = settled_payload(status, receipt, response).await;
        enter(phase, Phase::Settled, service);
        sink.emit(
            ProgressEvent::new(ProgressEventKind::Settled, "Payment settled").with_payload(settled),
        )
        .await?;
        Ok(())
    }

    fn resource_url(&self, service: &Service) -> Result<Url, ExecutionError> {
        let mut url = self.resource_server.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ExecutionError::Configuration(format!(
                    "Resource server URL `{}` cannot carry a path",
                    self.resource_server
                ))
            })?
            .pop_if_empty()
            .extend(["api", "x402", "services", service.id.as_str()]);
        Ok(url)
    }

    async fn post(
        &self,
        url: &Url,
        query: &AnyJson,
        payment: Option<(&'static str, &Base64EncodedHeader)>,
    ) -> Result<Response, ExecutionError> {
        let mut request = self
            .client
            .post(url.clone())
            .timeout(self.request_timeout)
            .json(query);
        if let Some((name, value)) = payment {
            request = request.header(name, value.as_str());
        }
        Ok(request.send().await?)
    }
}

fn enter(phase: &mut Phase, next: Phase, service: &Service) {
    #[cfg(feature = "tracing")]
    tracing::info!(service = %service.id, from = %phase, to = %next, "Execution phase");
    #[cfg(not(feature = "tracing"))]
    let _ = service;
    *phase = next;
}

async fn until_cancelled<F: Future>(
    sink: &ProgressSink,
    future: F,
) -> Result<F::Output, ExecutionError> {
    tokio::select! {
        biased;
        _ = sink.cancelled() => Err(ExecutionError::Cancelled),
        output = future => Ok(output),
    }
}

fn display_name(service: &Service) -> &str {
    if service.title.is_empty() {
        &service.id
    } else {
        &service.title
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Terms from the `PAYMENT-REQUIRED` header when present, otherwise from the body.
async fn read_payment_required(response: Response) -> Result<PaymentRequired, ExecutionError> {
    if let Some(value) = response.headers().get(PAYMENT_REQUIRED_HEADER) {
        let raw = value.to_str().map_err(|_| {
            ExecutionError::Protocol(format!("{PAYMENT_REQUIRED_HEADER} header is not ASCII"))
        })?;
        return Base64EncodedHeader::from(raw).decode().map_err(|err| {
            ExecutionError::Protocol(format!("Invalid {PAYMENT_REQUIRED_HEADER} header: {err}"))
        });
    }

    let body = response.bytes().await?;
    if body.is_empty() {
        return Err(ExecutionError::Protocol(
            "402 response carried no payment terms".to_string(),
        ));
    }
    serde_json::from_slice(&body)
        .map_err(|err| ExecutionError::Protocol(format!("Invalid payment terms: {err}")))
}

fn no_matching_terms(required: &PaymentRequired, service: &Service) -> ExecutionError {
    if required.accepts.is_empty() {
        return ExecutionError::Protocol("Resource server offered no payment options".to_string());
    }
    let offered = required
        .accepts
        .iter()
        .map(|r: &PaymentRequirements| format!("{}/{}", r.scheme, r.network))
        .collect::<Vec<_>>()
        .join(", ");
    ExecutionError::Protocol(format!(
        "No `{EXACT_SCHEME}` payment option on {} (offered: {offered})",
        service.network
    ))
}

fn read_settlement(response: &Response, version: X402Version) -> Option<SettlementResponse> {
    let raw = response.headers().get(version.settlement_header())?.to_str().ok()?;
    match Base64EncodedHeader::from(raw).decode::<SettlementResponse>() {
        Ok(receipt) => Some(receipt),
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Ignoring unreadable settlement header: {err}");
            #[cfg(not(feature = "tracing"))]
            let _ = err;
            None
        }
    }
}

async fn settled_payload(
    status: StatusCode,
    receipt: Option<SettlementResponse>,
    response: Response,
) -> AnyJson {
    let mut payload = json!({ "status": status.as_u16() });
    if let Some(receipt) = receipt {
        payload["transaction"] = json!(receipt.transaction);
        payload["network"] = json!(receipt.network);
        payload["payer"] = json!(receipt.payer);
        payload["success"] = json!(receipt.success);
    }

    match response.bytes().await {
        Ok(body) if !body.is_empty() => {
            payload["response"] = serde_json::from_slice(&body)
                .unwrap_or_else(|_| AnyJson::String(String::from_utf8_lossy(&body).into_owned()));
        }
        _ => {}
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_url_appends_service_path() {
        let protocol = PaymentProtocol::new(
            reqwest::Client::new(),
            Url::parse("http://localhost:4021/").unwrap(),
        );
        let service = Service::builder().id("premium data").build();

        assert_eq!(
            protocol.resource_url(&service).unwrap().as_str(),
            "http://localhost:4021/api/x402/services/premium%20data"
        );
    }

    #[test]
    fn missing_network_option_names_what_was_offered() {
        let required: PaymentRequired = serde_json::from_value(json!({
            "x402Version": 1,
            "accepts": [{
                "scheme": "exact",
                "network": "solana",
                "maxAmountRequired": "1",
                "payTo": "x",
                "asset": "y",
            }],
        }))
        .unwrap();
        let service = Service::builder()
            .id("svc")
            .network("base-sepolia")
            .build();

        let err = no_matching_terms(&required, &service);
        assert!(err.to_string().contains("exact/solana"));
    }
}
