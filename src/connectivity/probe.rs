//! Probe implementations feeding the monitor.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::ContentApi;
use crate::connectivity::{NetSample, NetworkProbe};

/// Reachability probe backed by the content server's health endpoint.
///
/// A healthy answer proves both the link and the server, so both sample
/// fields move together.
pub struct ApiHealthProbe {
    api: Arc<dyn ContentApi>,
}

impl ApiHealthProbe {
    pub fn new(api: Arc<dyn ContentApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl NetworkProbe for ApiHealthProbe {
    async fn sample(&self) -> NetSample {
        let healthy = self.api.health().await;
        NetSample {
            connected: healthy,
            internet_reachable: Some(healthy),
        }
    }
}
