// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Service Credential Refresher
//!
//! Background task that keeps the service credential usable:
//!
//! - re-acquires it a refresh margin before it expires
//! - retries every `retry_interval` while none is held (startup failure,
//!   provider rejection)
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::credential::{RefreshSchedule, ServiceCredentialManager};
use crate::config::DEFAULT_CREDENTIAL_RETRY;

/// Lower bound between two successful exchanges.
const MIN_EXCHANGE_SPACING: Duration = Duration::from_secs(1);

pub struct CredentialRefresher {
    manager: Arc<ServiceCredentialManager>,
    retry_interval: Duration,
}

impl CredentialRefresher {
    pub fn new(manager: Arc<ServiceCredentialManager>) -> Self {
        Self {
            manager,
            retry_interval: DEFAULT_CREDENTIAL_RETRY,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Run the refresh loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(refresher.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            retry_secs = self.retry_interval.as_secs(),
            "Service credential refresher starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Service credential refresher shutting down");
                return;
            }

            let wait = self.step().await;
            debug!(wait_ms = wait.as_millis() as u64, "Next credential check");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {},
                _ = shutdown.cancelled() => {
                    info!("Service credential refresher shutting down");
                    return;
                }
            }
        }
    }

    /// Re-acquire if due and return the delay until the next check.
    async fn step(&self) -> Duration {
        match self.manager.refresh_schedule().await {
            RefreshSchedule::After(wait) if !wait.is_zero() => wait.min(self.retry_interval),
            // Re-checked periodically so an invalidated credential is replaced.
            RefreshSchedule::NoExpiry => self.retry_interval,
            RefreshSchedule::Missing | RefreshSchedule::After(_) => {
                match self.manager.acquire().await {
                    Ok(_) => match self.manager.refresh_schedule().await {
                        RefreshSchedule::After(wait) => {
                            wait.clamp(MIN_EXCHANGE_SPACING, self.retry_interval.max(MIN_EXCHANGE_SPACING))
                        }
                        _ => self.retry_interval,
                    },
                    Err(e) => {
                        warn!(error = %e, "Service credential refresh failed");
                        self.retry_interval
                    }
                }
            }
        }
    }
}
