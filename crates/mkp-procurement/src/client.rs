use std::fmt;

use async_trait::async_trait;
use mkp_config::settings::ProcurementSettings;
use mkp_config::ResolvedSecrets;
use mkp_schemas::{Account, Entitlement, SIGNUP_APPROVAL_NAME};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::{ProcurementApi, ProcurementError};

/// REST client for `providers/<provider_id>/...` resources.
///
/// The bearer token is supplied by the caller; it is never logged.
#[derive(Clone)]
pub struct ProcurementClient {
    http: reqwest::Client,
    base_url: String,
    provider_id: String,
    provider_name: String,
    token: Option<String>,
}

impl fmt::Debug for ProcurementClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcurementClient")
            .field("base_url", &self.base_url)
            .field("provider_name", &self.provider_name)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ProcurementClient {
    pub fn new(base_url: impl Into<String>, provider_id: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider_id: provider_id.to_string(),
            provider_name: format!("providers/{provider_id}"),
            token,
        }
    }

    pub fn from_settings(
        settings: &ProcurementSettings,
        secrets: &ResolvedSecrets,
    ) -> Result<Self, ProcurementError> {
        let provider_id = settings.provider_id.as_deref().ok_or_else(|| {
            ProcurementError::Config("procurement.provider_id is not set".to_string())
        })?;
        Ok(Self::new(
            settings.base_url.clone(),
            provider_id,
            secrets.procurement_token.clone(),
        ))
    }

    /// `providers/<provider_id>`
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn account_name(&self, account_id: &str) -> String {
        format!("{}/accounts/{}", self.provider_name, account_id)
    }

    pub fn entitlement_name(&self, entitlement_id: &str) -> String {
        format!("{}/entitlements/{}", self.provider_name, entitlement_id)
    }

    /// Reset a test account so its signup can be run again.
    pub async fn reset_account(&self, account_id: &str) -> Result<(), ProcurementError> {
        self.post("reset_account", ACCOUNTS, account_id, "reset", json!({}))
            .await
    }

    /// `{base}/v1/providers/<provider>/<collection>/<id>[:verb]`.
    ///
    /// `id` is always exactly one path segment: `/`, `?` and `#` are
    /// percent-escaped, dot segments are refused.
    fn resource_url(
        &self,
        op: &'static str,
        collection: &str,
        id: &str,
        verb: Option<&str>,
    ) -> Result<Url, ProcurementError> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(ProcurementError::InvalidResourceId {
                op,
                id: id.to_string(),
            });
        }
        let last = match verb {
            Some(v) => format!("{id}:{v}"),
            None => id.to_string(),
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ProcurementError::Config(format!("procurement.base_url {:?}: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ProcurementError::Config(format!(
                    "procurement.base_url {:?} cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend([
                "v1",
                "providers",
                self.provider_id.as_str(),
                collection,
                last.as_str(),
            ]);
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        op: &'static str,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, ProcurementError> {
        let url = self.resource_url(op, collection, id, None)?;
        let resp = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(|source| ProcurementError::Transport { op, source })?;

        if resp.status() == StatusCode::NOT_FOUND {
            tracing::debug!(op, collection, id, "procurement resource not found");
            return Ok(None);
        }
        let resp = ensure_success(op, resp).await?;
        let body = resp
            .json::<T>()
            .await
            .map_err(|source| ProcurementError::Decode { op, source })?;
        Ok(Some(body))
    }

    async fn post(
        &self,
        op: &'static str,
        collection: &str,
        id: &str,
        verb: &str,
        body: Value,
    ) -> Result<(), ProcurementError> {
        let url = self.resource_url(op, collection, id, Some(verb))?;
        let resp = self
            .authorize(self.http.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|source| ProcurementError::Transport { op, source })?;
        ensure_success(op, resp).await?;
        tracing::info!(op, collection, id, "procurement call succeeded");
        Ok(())
    }
}

async fn ensure_success(op: &'static str, resp: Response) -> Result<Response, ProcurementError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ProcurementError::Status {
        op,
        status: status.as_u16(),
        body: truncate(&body, 512),
    })
}

const ACCOUNTS: &str = "accounts";
const ENTITLEMENTS: &str = "entitlements";

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[async_trait]
impl ProcurementApi for ProcurementClient {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, ProcurementError> {
        self.get("get_account", ACCOUNTS, account_id).await
    }

    async fn approve_account(&self, account_id: &str) -> Result<(), ProcurementError> {
        self.post(
            "approve_account",
            ACCOUNTS,
            account_id,
            "approve",
            json!({ "approvalName": SIGNUP_APPROVAL_NAME }),
        )
        .await
    }

    async fn get_entitlement(
        &self,
        entitlement_id: &str,
    ) -> Result<Option<Entitlement>, ProcurementError> {
        self.get("get_entitlement", ENTITLEMENTS, entitlement_id)
            .await
    }

    async fn approve_entitlement(&self, entitlement_id: &str) -> Result<(), ProcurementError> {
        self.post(
            "approve_entitlement",
            ENTITLEMENTS,
            entitlement_id,
            "approve",
            json!({}),
        )
        .await
    }

    async fn approve_entitlement_plan_change(
        &self,
        entitlement_id: &str,
        new_plan: &str,
    ) -> Result<(), ProcurementError> {
        self.post(
            "approve_entitlement_plan_change",
            ENTITLEMENTS,
            entitlement_id,
            "approvePlanChange",
            json!({ "pendingPlanName": new_plan }),
        )
        .await
    }
}
