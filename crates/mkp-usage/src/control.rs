use std::fmt;

use async_trait::async_trait;
use mkp_config::settings::{UsageEnvironment, UsageSettings};
use mkp_config::ResolvedSecrets;
use reqwest::Response;
use serde::Deserialize;
use serde_json::json;

use crate::{CheckError, UsageError, UsageOperation};

/// Service-control calls the usage job makes.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Returns the check errors; empty means the operation may be reported.
    async fn check(&self, operation: &UsageOperation) -> Result<Vec<CheckError>, UsageError>;

    async fn report(&self, operation: &UsageOperation) -> Result<(), UsageError>;
}

/// REST client for `services/<service_name>:check|report`.
#[derive(Clone)]
pub struct ServiceControlClient {
    http: reqwest::Client,
    base_url: String,
    service_name: String,
    token: Option<String>,
}

impl fmt::Debug for ServiceControlClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceControlClient")
            .field("base_url", &self.base_url)
            .field("service_name", &self.service_name)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckResponse {
    #[serde(default)]
    check_errors: Vec<CheckError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportResponse {
    #[serde(default)]
    report_errors: Vec<serde_json::Value>,
}

impl ServiceControlClient {
    /// `service_name` is the name calls are addressed to (already
    /// `staging.`-prefixed when reporting to staging).
    pub fn new(
        base_url: impl Into<String>,
        service_name: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_name: service_name.into(),
            token,
        }
    }

    pub fn from_settings(
        settings: &UsageSettings,
        secrets: &ResolvedSecrets,
    ) -> Result<Self, UsageError> {
        let service = settings
            .service_name
            .as_deref()
            .ok_or_else(|| UsageError::Config("usage.service_name is not set".to_string()))?;
        let addressed = match settings.environment {
            UsageEnvironment::Prod => service.to_string(),
            UsageEnvironment::Staging => format!("staging.{service}"),
        };
        Ok(Self::new(
            settings.service_control_base_url.clone(),
            addressed,
            secrets.service_control_token.clone(),
        ))
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    async fn post(
        &self,
        op: &'static str,
        verb: &str,
        body: serde_json::Value,
    ) -> Result<Response, UsageError> {
        let url = format!("{}/v1/services/{}:{}", self.base_url, self.service_name, verb);
        let mut req = self.http.post(url).json(&body);
        if let Some(t) = &self.token {
            req = req.bearer_auth(t);
        }
        let resp = req
            .send()
            .await
            .map_err(|source| UsageError::Transport { op, source })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UsageError::Status {
                op,
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ServiceControl for ServiceControlClient {
    async fn check(&self, operation: &UsageOperation) -> Result<Vec<CheckError>, UsageError> {
        let resp = self
            .post("check", "check", json!({ "operation": operation }))
            .await?;
        let body: CheckResponse = resp
            .json()
            .await
            .map_err(|source| UsageError::Decode { op: "check", source })?;
        Ok(body.check_errors)
    }

    async fn report(&self, operation: &UsageOperation) -> Result<(), UsageError> {
        let resp = self
            .post("report", "report", json!({ "operations": [operation] }))
            .await?;
        let body: ReportResponse = resp
            .json()
            .await
            .map_err(|source| UsageError::Decode { op: "report", source })?;
        if !body.report_errors.is_empty() {
            return Err(UsageError::ReportRejected(
                serde_json::Value::Array(body.report_errors).to_string(),
            ));
        }
        Ok(())
    }
}
