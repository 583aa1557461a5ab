//! Team run event stream
//!
//! A team run optionally emits progress events so callers can stream
//! member activity as it happens instead of waiting for the final reply.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::team::TeamMode;

/// Progress events emitted during a team run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TeamEvent {
    /// The run was accepted and dispatch is beginning.
    RunStarted { team: String, mode: TeamMode },
    /// A member received its task.
    MemberStarted { member: String, task: String },
    /// A member produced a response.
    MemberResponded { member: String, content: String },
    /// A member failed; in consensus runs the team continues without it.
    MemberFailed { member: String, reason: String },
    /// The leader routed the query to a single member.
    Routed { member: String, reason: String },
    /// The final synthesized answer is ready.
    SynthesisReady { content: String },
}

/// Sending half held by the team; emitting is a no-op when nobody listens.
#[derive(Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::UnboundedSender<TeamEvent>>,
}

impl EventSink {
    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: TeamEvent) {
        if let Some(ref sender) = self.sender {
            // A dropped receiver just means the caller stopped listening.
            let _ = sender.send(event);
        }
    }
}

/// Receiving half handed to the caller.
pub struct TeamChannel {
    receiver: mpsc::UnboundedReceiver<TeamEvent>,
}

impl TeamChannel {
    /// Create a connected sink/channel pair.
    pub fn pair() -> (EventSink, TeamChannel) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            EventSink {
                sender: Some(sender),
            },
            TeamChannel { receiver },
        )
    }

    /// Wait for the next event; `None` once the run has finished and the
    /// sink is dropped.
    pub async fn recv(&mut self) -> Option<TeamEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking poll for a pending event.
    pub fn try_recv(&mut self) -> Option<TeamEvent> {
        self.receiver.try_recv().ok()
    }
}
