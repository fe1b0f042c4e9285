//! Foreground decision loop.
//!
//! The operator owns the inbound queue and the list of accepted peers. It runs
//! admission on what arrives and tells the routing handler, over the control
//! link, which peers to materialise and where to send.

use std::fmt;

use peerlink_channel::InboundQueue;
use peerlink_router::{ControlHandle, RoutingError};
use peerlink_topic::{Admission, DeclineReason, PeerAdmission, Topic};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::command::HELP;
use crate::{OperatorCommand, OperatorError};

/// Peers this instance accepted, in acceptance order. Indices are stable.
#[derive(Debug, Clone, Default)]
pub struct AcceptedPeers(Vec<Topic>);

impl AcceptedPeers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `peer` unless already present. Returns whether it was added.
    pub fn push(&mut self, peer: Topic) -> bool {
        if self.contains(&peer) {
            return false;
        }
        self.0.push(peer);
        true
    }

    pub fn contains(&self, peer: &Topic) -> bool {
        self.0.contains(peer)
    }

    pub fn get(&self, index: usize) -> Result<&Topic, OperatorError> {
        self.0.get(index).ok_or(OperatorError::PeerIndexOutOfRange {
            index,
            count: self.0.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.0.iter()
    }
}

/// A received payload and the verdict admission gave it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub payload: String,
    pub verdict: Admission,
    pub reason: Option<DeclineReason>,
}

impl fmt::Display for Received {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "received {:?}: {}", self.payload, self.verdict)?;
        if let Some(reason) = self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

/// What one drain did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Newly accepted peers, in arrival order.
    pub accepted: Vec<Topic>,
    /// Admissible peers that were already accepted.
    pub duplicates: Vec<Topic>,
    /// Payloads admission declined.
    pub declined: Vec<String>,
    /// Admissible peers the routing handler failed to materialise. They stay
    /// unaccepted and are retried the next time they are heard.
    pub failed: Vec<Topic>,
}

#[derive(Debug)]
pub struct Operator {
    admission: PeerAdmission,
    queue: InboundQueue,
    control: ControlHandle,
    accepted: AcceptedPeers,
}

impl Operator {
    pub fn new(local_topic: Topic, queue: InboundQueue, control: ControlHandle) -> Self {
        Self {
            admission: PeerAdmission::new(local_topic),
            queue,
            control,
            accepted: AcceptedPeers::new(),
        }
    }

    pub fn local_topic(&self) -> &Topic {
        self.admission.local()
    }

    pub fn accepted(&self) -> &AcceptedPeers {
        &self.accepted
    }

    fn classify(&self, payload: String) -> Received {
        let reason = self.admission.evaluate(&payload).err();
        Received {
            verdict: if reason.is_none() {
                Admission::Accept
            } else {
                Admission::Decline
            },
            reason,
            payload,
        }
    }

    /// Announce the local topic on the broadcast channel.
    pub async fn broadcast_self(&self) -> Result<(), OperatorError> {
        self.control
            .broadcast(self.local_topic().as_str())
            .await
            .map_err(Into::into)
    }

    /// Wait for one payload. The verdict is for display only.
    pub async fn receive_one(&mut self) -> Result<Received, OperatorError> {
        let payload = self.queue.pop().await.ok_or(OperatorError::QueueClosed)?;
        Ok(self.classify(payload))
    }

    /// Wait for exactly `n` payloads.
    pub async fn receive_many(&mut self, n: usize) -> Result<Vec<Received>, OperatorError> {
        let mut received = Vec::with_capacity(n);
        for _ in 0..n {
            received.push(self.receive_one().await?);
        }
        Ok(received)
    }

    /// Run admission over everything queued, accepting new peers in arrival
    /// order.
    pub async fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();

        for payload in self.queue.drain() {
            if self.admission.decide(&payload) == Admission::Decline {
                debug!(%payload, "declined");
                report.declined.push(payload);
                continue;
            }
            let Ok(peer) = Topic::parse(&payload) else {
                report.declined.push(payload);
                continue;
            };
            if self.accepted.contains(&peer) {
                report.duplicates.push(peer);
                continue;
            }

            match self.control.accept(peer.clone()).await {
                Ok(()) => {
                    self.accepted.push(peer.clone());
                    report.accepted.push(peer);
                }
                Err(e) => {
                    warn!(%peer, error = %e, "accept failed");
                    report.failed.push(peer);
                }
            }
        }

        report
    }

    /// Send to the accepted peer at `index`. Without a payload, sends
    /// `message from <local topic>`.
    pub async fn send_direct(
        &self,
        index: usize,
        payload: Option<String>,
    ) -> Result<Topic, OperatorError> {
        let peer = self.accepted.get(index)?.clone();
        let payload = payload.unwrap_or_else(|| format!("message from {}", self.local_topic()));
        self.control.direct(peer.clone(), payload).await?;
        Ok(peer)
    }

    /// Stop the routing service, waiting for commands already sent.
    pub async fn shutdown(&self) -> Result<(), OperatorError> {
        match self.control.shutdown().await {
            Ok(()) | Err(RoutingError::ServiceStopped) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn execute(&mut self, command: OperatorCommand) -> Result<Vec<String>, OperatorError> {
        let lines = match command {
            OperatorCommand::Broadcast => {
                self.broadcast_self().await?;
                vec![format!("announced {}", self.local_topic())]
            }
            OperatorCommand::Receive => vec![self.receive_one().await?.to_string()],
            OperatorCommand::ReceiveMany(n) => self
                .receive_many(n)
                .await?
                .iter()
                .map(ToString::to_string)
                .collect(),
            OperatorCommand::Drain => {
                let report = self.drain().await;
                let mut lines = Vec::new();
                for peer in &report.accepted {
                    lines.push(format!("accepted {peer}"));
                }
                for peer in &report.duplicates {
                    lines.push(format!("already accepted {peer}"));
                }
                for payload in &report.declined {
                    lines.push(format!("declined {payload:?}"));
                }
                for peer in &report.failed {
                    lines.push(format!("failed to accept {peer}"));
                }
                lines.push(format!("{} accepted peer(s)", self.accepted.len()));
                lines
            }
            OperatorCommand::Direct { index, payload } => {
                let peer = self.send_direct(index, payload).await?;
                vec![format!("sent to [{index}] {peer}")]
            }
            OperatorCommand::Peers if self.accepted.is_empty() => {
                vec!["no accepted peers".to_owned()]
            }
            OperatorCommand::Peers => self
                .accepted
                .iter()
                .enumerate()
                .map(|(i, peer)| format!("[{i}] {peer}"))
                .collect(),
            OperatorCommand::Help => vec![HELP.to_owned()],
            OperatorCommand::Exit => Vec::new(),
        };
        Ok(lines)
    }

    /// Read commands from `input` until `exit` or end of input, writing
    /// results to `output`. Command errors are reported and the loop goes on.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<(), OperatorError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        output
            .write_all(format!("{}\n{HELP}\n", self.local_topic()).as_bytes())
            .await?;

        loop {
            output.write_all(b"> ").await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                debug!("end of operator input");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match line.parse::<OperatorCommand>() {
                Ok(OperatorCommand::Exit) => break,
                Ok(command) => command,
                Err(e) => {
                    output.write_all(format!("{e}\n{HELP}\n").as_bytes()).await?;
                    continue;
                }
            };

            match self.execute(command).await {
                Ok(out) => {
                    for line in out {
                        output.write_all(format!("{line}\n").as_bytes()).await?;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "command failed");
                    output.write_all(format!("error: {e}\n").as_bytes()).await?;
                }
            }
        }

        self.shutdown().await?;
        output.write_all(b"bye\n").await?;
        output.flush().await?;
        Ok(())
    }
}
