//! Hand-off of finished strategies to an external email function.
//!
//! Formatting and delivery happen elsewhere; this side only posts
//! `{ email, strategyData, assessmentData }` and logs the outcome.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::config::{MailerConfig, RuntimeConfig};
use crate::orchestrator::StrategyResult;
use crate::schemas::Assessment;

#[async_trait]
pub trait StrategyMailer: Send + Sync {
    async fn send(
        &self,
        email: &str,
        strategy: &StrategyResult,
        assessment: &Assessment,
    ) -> Result<()>;
}

/// Posts the strategy to a webhook (e.g. a serverless email function).
#[derive(Clone, Debug)]
pub struct WebhookMailer {
    endpoint: String,
    bearer_token: Option<String>,
    timeout: Duration,
    client: Client,
}

impl WebhookMailer {
    pub fn new(
        endpoint: impl Into<String>,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build email webhook client")?;
        Ok(Self {
            endpoint: endpoint.into(),
            bearer_token,
            timeout,
            client,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl StrategyMailer for WebhookMailer {
    async fn send(
        &self,
        email: &str,
        strategy: &StrategyResult,
        assessment: &Assessment,
    ) -> Result<()> {
        let body = json!({
            "email": email,
            "strategyData": strategy,
            "assessmentData": assessment,
        });
        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await.context("email webhook send")?;
        if !res.status().is_success() {
            let status = res.status();
            bail!(
                "email webhook returned {}: {}",
                status,
                res.text().await.unwrap_or_default()
            );
        }
        Ok(())
    }
}

/// Build the mailer for this configuration, if one is configured.
pub fn mailer_from_config(
    cfg: &MailerConfig,
    runtime: &RuntimeConfig,
) -> Option<Arc<dyn StrategyMailer>> {
    let endpoint = cfg.endpoint.as_deref()?.trim();
    if endpoint.is_empty() {
        return None;
    }
    match WebhookMailer::new(
        endpoint,
        runtime.mailer_token.clone(),
        Duration::from_millis(cfg.timeout_ms),
    ) {
        Ok(mailer) => Some(Arc::new(mailer)),
        Err(e) => {
            tracing::error!("strategy emails disabled: {:#}", e);
            None
        }
    }
}

/// Loose sanity check before handing an address to the email function.
pub fn looks_like_email(address: &str) -> bool {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Best-effort delivery: failures are logged and swallowed.
pub async fn dispatch(
    mailer: &dyn StrategyMailer,
    email: &str,
    strategy: &StrategyResult,
    assessment: &Assessment,
) -> bool {
    if !looks_like_email(email) {
        tracing::warn!("skipping strategy email: address is not valid");
        return false;
    }
    match mailer.send(email.trim(), strategy, assessment).await {
        Ok(()) => {
            tracing::info!("strategy {} handed to email function", strategy.id);
            true
        }
        Err(e) => {
            tracing::error!("failed to send strategy email: {:#}", e);
            false
        }
    }
}
