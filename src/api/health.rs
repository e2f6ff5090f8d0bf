//! One-shot server diagnostics, separate from the periodic probe the
//! connectivity monitor runs.

use crate::api::directus::DirectusClient;
use crate::api::ContentApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Fail,
}

/// Verdict plus the raw probe output, kept for display on a settings or
/// diagnostics screen.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// `<http status>:<body prefix>` from the raw endpoint hit, or
    /// `ERR:<transport error>`.
    pub detail: String,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

/// Probe the server twice: a raw endpoint hit for the detail string, then
/// the health call that decides the verdict.
pub async fn run_health_check(client: &DirectusClient) -> HealthReport {
    let detail = client.health_detail().await;
    let status = if client.health().await {
        HealthStatus::Ok
    } else {
        HealthStatus::Fail
    };

    HealthReport { status, detail }
}
