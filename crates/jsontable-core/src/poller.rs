use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::PanelConfig;
use crate::error::AppError;
use crate::models::{FetchMessage, FetchReply, ReplyOutcome};
use crate::state::{ApplyOutcome, PanelState};
use crate::traits::Fetcher;

/// Events emitted by the poller for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PollerEvent<'a> {
    Started {
        url: &'a str,
        interval: Duration,
    },
    FetchStarted {
        id: &'a str,
        url: &'a str,
    },
    FetchSucceeded {
        id: &'a str,
        changed: bool,
    },
    FetchFailed {
        id: &'a str,
        error: &'a str,
    },
    Stopped {
        url: &'a str,
        cycles: u64,
    },
}

/// Trait for receiving poller events (decoupled logging).
pub trait PollerReporter: Send + Sync {
    fn report(&self, event: PollerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPollerReporter;

impl PollerReporter for TracingPollerReporter {
    fn report(&self, event: PollerEvent<'_>) {
        match event {
            PollerEvent::Started { url, interval } => {
                tracing::info!(%url, interval_ms = interval.as_millis() as u64, "Poller started");
            }
            PollerEvent::FetchStarted { id, url } => {
                tracing::debug!(%id, %url, "Fetching");
            }
            PollerEvent::FetchSucceeded { id, changed } => {
                tracing::info!(%id, %changed, "Fetch OK");
            }
            PollerEvent::FetchFailed { id, error } => {
                tracing::warn!(%id, %error, "Fetch failed");
            }
            PollerEvent::Stopped { url, cycles } => {
                tracing::info!(%url, %cycles, "Poller stopped");
            }
        }
    }
}

/// Serve one channel message: normalize, fetch, wrap in a reply.
///
/// Never fails; every error ends up in the reply's `error` field.
pub async fn exchange<F: Fetcher>(fetcher: &F, message: &FetchMessage) -> FetchReply {
    let result = match message.to_request() {
        Ok(request) => fetcher.fetch(&request).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        tracing::debug!(
            id = message.id.as_deref().unwrap_or_default(),
            kind = e.kind(),
            network = e.is_network(),
            error = %e,
            "Exchange failed"
        );
    }
    FetchReply::from_result(message, result)
}

/// Periodically fetches a panel's URL and records the outcome in its state.
///
/// Cycles never overlap: a tick that falls due while a fetch is still in
/// flight is skipped rather than queued.
pub struct PanelPoller<F: Fetcher> {
    fetcher: F,
    config: PanelConfig,
    state: PanelState,
}

impl<F: Fetcher> PanelPoller<F> {
    pub fn new(fetcher: F, config: PanelConfig, state: PanelState) -> Self {
        Self {
            fetcher,
            config,
            state,
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// Run one fetch cycle and apply its reply.
    pub async fn poll_once<R: PollerReporter>(&self, reporter: &R) -> ApplyOutcome {
        let id = Uuid::new_v4().to_string();
        let message = self.config.fetch_message(id.clone());

        reporter.report(PollerEvent::FetchStarted {
            id: &id,
            url: &self.config.url,
        });

        let reply = self.exchange(&message).await;
        let error = match &reply.outcome {
            ReplyOutcome::Error { error } => Some(error.clone()),
            ReplyOutcome::Data { .. } => None,
        };

        let outcome = self.state.apply(reply, &self.config.url);
        match outcome {
            ApplyOutcome::Updated { changed } => {
                reporter.report(PollerEvent::FetchSucceeded { id: &id, changed });
            }
            ApplyOutcome::Failed => {
                let error = error.unwrap_or_default();
                reporter.report(PollerEvent::FetchFailed { id: &id, error: &error });
            }
            ApplyOutcome::Ignored => {
                tracing::debug!(%id, "Reply ignored: URL does not match panel");
            }
        }
        outcome
    }

    /// Serve one channel message with this poller's fetcher.
    pub async fn exchange(&self, message: &FetchMessage) -> FetchReply {
        exchange(&self.fetcher, message).await
    }

    /// Run the poll loop until cancellation. The first cycle starts immediately.
    pub async fn run<R: PollerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &R,
    ) -> Result<(), AppError> {
        self.config.validate()?;

        let interval = self.config.update_interval();
        reporter.report(PollerEvent::Started {
            url: &self.config.url,
            interval,
        });

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut cycles = 0u64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel_token.cancelled() => break,
            }

            tokio::select! {
                _ = self.poll_once(reporter) => cycles += 1,
                () = cancel_token.cancelled() => break,
            }
        }

        reporter.report(PollerEvent::Stopped {
            url: &self.config.url,
            cycles,
        });
        Ok(())
    }
}
