use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sandgate_core::api::{
    GatewayError, RemoteJobId, ScanFailure, ScanGateway, ScanOutcome, ScanState, ScanTarget,
    StatusReply, Verdict,
};

use super::classify;

/// The file submission also uploads the payload, so it gets a longer leash.
const SUBMIT_FILE_TIMEOUT: Duration = Duration::from_secs(60);
/// Every other call answers quickly or not at all.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

const API_KEY_HEADER: &str = "X-API-Key";

/// reqwest-backed client for the scanning service.
///
/// One access token, one TLS-verification toggle, per-request timeouts; the
/// connection is released on every exit path because the response body is
/// always drained or dropped before returning.
pub struct HttpScanGateway {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpScanGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        verify_tls: bool,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;
        let base_url = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    async fn submit_file(
        &self,
        path: &Path,
        file_name: &str,
        priority: u8,
        passwords: &[String],
    ) -> Result<RemoteJobId, GatewayError> {
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            GatewayError::Unknown(format!("could not read upload {}: {err}", path.display()))
        })?;
        let form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(bytes).file_name(file_name.to_string()),
        );

        let mut request = self
            .client
            .post(self.endpoint("scan/checkFile"))
            .header(API_KEY_HEADER, &self.api_token)
            .query(&[("async_result", "true"), ("short_result", "true")])
            .query(&[("priority", priority.to_string())])
            .timeout(SUBMIT_FILE_TIMEOUT)
            .multipart(form);
        if let Some(param) = passwords_param(passwords)? {
            request = request.query(&[("passwords_for_unpack", param)]);
        }

        debug!(file = file_name, priority, "submitting file for scanning");
        let response = request
            .send()
            .await
            .map_err(|err| classify::classify_transport(&err))?;
        read_submit_reply(response).await
    }

    async fn submit_link(
        &self,
        url: &str,
        priority: u8,
        passwords: &[String],
    ) -> Result<RemoteJobId, GatewayError> {
        let mut request = self
            .client
            .post(self.endpoint("scan/checkURL"))
            .header(API_KEY_HEADER, &self.api_token)
            .timeout(CALL_TIMEOUT)
            .json(&LinkSubmission {
                url,
                priority,
                async_result: "true",
                short_result: "true",
            });
        if let Some(param) = passwords_param(passwords)? {
            request = request.query(&[("passwords_for_unpack", param)]);
        }

        debug!(priority, "submitting link for scanning");
        let response = request
            .send()
            .await
            .map_err(|err| classify::classify_transport(&err))?;
        read_submit_reply(response).await
    }
}

#[async_trait]
impl ScanGateway for HttpScanGateway {
    fn name(&self) -> &str {
        "scan_http"
    }

    async fn submit(
        &self,
        target: &ScanTarget,
        priority: u8,
        passwords: &[String],
    ) -> Result<RemoteJobId, GatewayError> {
        match target {
            ScanTarget::File { path, file_name } => {
                self.submit_file(path, file_name, priority, passwords).await
            }
            ScanTarget::Link { url } => self.submit_link(url, priority, passwords).await,
        }
    }

    async fn get_status(&self, job_id: &str) -> Result<StatusReply, GatewayError> {
        debug!(job = job_id, "querying job status");
        let response = self
            .client
            .post(self.endpoint("scan/getStatus"))
            .header(API_KEY_HEADER, &self.api_token)
            .timeout(CALL_TIMEOUT)
            .json(&StatusQuery { scan_id: job_id })
            .send()
            .await
            .map_err(|err| classify::classify_transport(&err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| classify::classify_transport(&err))?;
        if !status.is_success() {
            return Err(classify::classify_status(status, &body));
        }
        if let Some(err) = classify::envelope_error(&body) {
            return Err(err);
        }

        let parsed: StatusEnvelope = serde_json::from_str(&body)
            .map_err(|err| GatewayError::Unknown(format!("undecodable status reply ({err}): {body}")))?;
        match parsed.data.result {
            None => Ok(StatusReply::Pending),
            Some(result) => Ok(StatusReply::Ready(outcome_from_wire(result, &body)?)),
        }
    }

    async fn healthcheck(&self) -> Result<(), GatewayError> {
        debug!("healthcheck");
        let response = self
            .client
            .post(self.endpoint("maintenance/checkHealth"))
            .header(API_KEY_HEADER, &self.api_token)
            .timeout(CALL_TIMEOUT)
            .send()
            .await
            .map_err(|err| classify::classify_transport(&err))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .map_err(|err| classify::classify_transport(&err))?;
        Err(classify::classify_status(status, &body))
    }

    fn job_link(&self, job_id: &str) -> String {
        format!("{}/tasks/{job_id}", self.base_url)
    }
}

/// Passwords travel as a URL-encoded JSON array in a query parameter; the
/// query serializer performs the encoding.
fn passwords_param(passwords: &[String]) -> Result<Option<String>, GatewayError> {
    if passwords.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(passwords)
        .map(Some)
        .map_err(|err| GatewayError::Unknown(format!("could not encode passwords: {err}")))
}

async fn read_submit_reply(response: reqwest::Response) -> Result<RemoteJobId, GatewayError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| classify::classify_transport(&err))?;
    if !status.is_success() {
        return Err(classify::classify_status(status, &body));
    }
    if let Some(err) = classify::envelope_error(&body) {
        return Err(err);
    }

    let parsed: SubmitEnvelope = serde_json::from_str(&body).unwrap_or_default();
    match parsed.data.scan_id {
        Some(id) => Ok(id),
        None => Err(GatewayError::Unknown(format!(
            "submission reply carried no job id: {body}"
        ))),
    }
}

fn outcome_from_wire(result: WireResult, body: &str) -> Result<ScanOutcome, GatewayError> {
    let state = result
        .scan_state
        .as_deref()
        .and_then(ScanState::from_wire)
        .ok_or_else(|| GatewayError::Unknown(format!("unrecognized scan state in: {body}")))?;
    let verdict = result
        .verdict
        .as_deref()
        .and_then(Verdict::from_wire)
        .ok_or_else(|| GatewayError::Unknown(format!("unrecognized verdict in: {body}")))?;
    let threat_label = result
        .threat
        .filter(|threat| !threat.is_empty())
        .unwrap_or_else(|| "benign".to_string());
    let failure = result
        .errors
        .and_then(|err| err.kind)
        .as_deref()
        .and_then(ScanFailure::from_wire);
    Ok(ScanOutcome {
        state,
        verdict,
        threat_label,
        failure,
    })
}

#[derive(Serialize)]
struct LinkSubmission<'a> {
    url: &'a str,
    priority: u8,
    async_result: &'a str,
    short_result: &'a str,
}

#[derive(Serialize)]
struct StatusQuery<'a> {
    scan_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SubmitEnvelope {
    #[serde(default)]
    data: SubmitData,
}

#[derive(Debug, Default, Deserialize)]
struct SubmitData {
    scan_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusEnvelope {
    #[serde(default)]
    data: StatusData,
}

#[derive(Debug, Default, Deserialize)]
struct StatusData {
    result: Option<WireResult>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    scan_state: Option<String>,
    verdict: Option<String>,
    threat: Option<String>,
    errors: Option<WireScanError>,
}

#[derive(Debug, Deserialize)]
struct WireScanError {
    #[serde(rename = "type")]
    kind: Option<String>,
}
