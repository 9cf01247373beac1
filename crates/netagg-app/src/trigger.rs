//! Coalesced rebuild requests.
//!
//! The mailbox holds at most one pending request. While a request is pending,
//! or while a build it started is still collecting it, further requests are
//! answered with [`TriggerResponse::AlreadyPending`].

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Answer to a rebuild request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerResponse {
    /// A build will run soon.
    Accepted,
    /// A build is already owed; this request was merged into it.
    AlreadyPending,
    /// The scheduler has exited.
    SchedulerStopped,
}

impl TriggerResponse {
    /// Message returned to API callers.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Accepted => "new build request received",
            Self::AlreadyPending => "a build request is already pending",
            Self::SchedulerStopped => "build scheduler is not running",
        }
    }
}

/// Sending half, cloned into every caller that may request a build.
#[derive(Debug, Clone)]
pub struct BuildTrigger {
    sender: mpsc::Sender<()>,
}

/// Receiving half, owned by the scheduler.
#[derive(Debug)]
pub struct TriggerReceiver {
    receiver: mpsc::Receiver<()>,
}

/// Single-slot mailbox connecting callers to the scheduler.
#[must_use]
pub fn build_trigger() -> (BuildTrigger, TriggerReceiver) {
    let (sender, receiver) = mpsc::channel(1);
    (BuildTrigger { sender }, TriggerReceiver { receiver })
}

impl BuildTrigger {
    /// Ask for a build without waiting.
    pub fn request_build(&self) -> TriggerResponse {
        let response = match self.sender.try_send(()) {
            Ok(()) => TriggerResponse::Accepted,
            Err(TrySendError::Full(())) => TriggerResponse::AlreadyPending,
            Err(TrySendError::Closed(())) => TriggerResponse::SchedulerStopped,
        };
        debug!(response = ?response, "build requested");
        response
    }
}

impl TriggerReceiver {
    /// Wait for the next request; `None` once every [`BuildTrigger`] is gone.
    pub async fn recv(&mut self) -> Option<()> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn requests_coalesce_into_one_pending_slot() {
        let (trigger, mut receiver) = build_trigger();

        assert_eq!(trigger.request_build(), TriggerResponse::Accepted);
        for _ in 0..5 {
            assert_eq!(trigger.clone().request_build(), TriggerResponse::AlreadyPending);
        }

        assert_eq!(receiver.recv().await, Some(()));
        assert_eq!(trigger.request_build(), TriggerResponse::Accepted);
    }

    #[test]
    fn dropped_receiver_reports_stopped_scheduler() {
        let (trigger, receiver) = build_trigger();
        drop(receiver);
        assert_eq!(trigger.request_build(), TriggerResponse::SchedulerStopped);
        assert_eq!(
            TriggerResponse::SchedulerStopped.message(),
            "build scheduler is not running"
        );
    }
}
