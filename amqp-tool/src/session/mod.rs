//! An authenticated AMQP session: one connection, one application
//! channel and the ordered release of both.
//!
//! A session moves through
//!
//! ```text
//! Disconnected -> Connected -> Authenticated -> ChannelOpen -> QueueDeclared
//!     -> {Consuming | Publishing} -> Closing -> {Closed | Failed}
//! ```
//!
//! `Closing` can be entered from any state. Successful runs end with
//! [`Session::close`], everything else with [`Session::teardown`].
//! Both attempt to close the channel (if one was opened) and then the
//! connection, each exactly once.

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

use amqp_endpoint::Credentials;

pub(crate) mod broker;
mod error;
#[cfg(test)]
pub(crate) mod mock;

use broker::{Channel, Connection};
pub use error::{SessionError, TeardownError};

/// Channel number used for queue and message operations. Channel 0
/// carries connection-level control methods.
pub const APP_CHANNEL: u16 = 1;

/// Lifecycle states of a [`Session`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No transport yet
    Disconnected,
    /// Transport connected, not logged in
    Connected,
    /// Logged in to the vhost
    Authenticated,
    /// Application channel open
    ChannelOpen,
    /// Queue declared on the channel
    QueueDeclared,
    /// Consume loop running
    Consuming,
    /// Publish in progress
    Publishing,
    /// Releasing the channel and connection
    Closing,
    /// Ended after success
    Closed,
    /// Ended after an error
    Failed,
}

impl SessionState {
    /// True once the session has been released
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// One authenticated connection to one vhost, and the channel used on
/// it. Passed explicitly to the consumer and producer.
pub struct Session<C: Connection> {
    /// Connection to the broker
    connection: C,
    /// The application channel, once opened. Taken when closed.
    channel: Option<C::Channel>,
    /// Where we are in the lifecycle
    state: SessionState,
}

impl<C: Connection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("channel_open", &self.channel.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Session<C> {
    /// Start a session on a connected transport
    pub(crate) fn new(connection: C) -> Self {
        let mut session = Self {
            connection,
            channel: None,
            state: SessionState::Disconnected,
        };
        session.transition(SessionState::Connected);
        session
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Record a state change
    pub(crate) fn transition(&mut self, to: SessionState) {
        trace!(from = ?self.state, to = ?to, "Session state change");
        self.state = to;
    }

    /// The open application channel
    pub(crate) fn channel(&self) -> Result<&C::Channel, SessionError> {
        self.channel
            .as_ref()
            .ok_or_else(|| SessionError::channel_not_open(APP_CHANNEL))
    }

    /// Log in and open the application channel.
    ///
    /// # Errors
    ///
    /// [`SessionError::Authentication`] if the broker rejects the
    /// login, [`SessionError::Channel`] if the channel won't open.
    /// The session is left for the caller to tear down.
    pub async fn establish(
        &mut self,
        credentials: &Credentials,
        vhost: &str,
    ) -> Result<(), SessionError> {
        self.connection
            .authenticate(credentials, vhost)
            .await
            .map_err(|source| SessionError::Authentication {
                user: credentials.user().to_string(),
                vhost: vhost.to_string(),
                source,
            })?;
        self.transition(SessionState::Authenticated);
        info!(user = credentials.user(), vhost, "Authenticated.");

        let channel = self
            .connection
            .open_channel(APP_CHANNEL)
            .await
            .map_err(|source| SessionError::Channel {
                id: APP_CHANNEL,
                reason: "failed to open".to_string(),
                source: Some(source),
            })?;
        self.channel = Some(channel);
        self.transition(SessionState::ChannelOpen);
        info!(channel = APP_CHANNEL, "Channel opened.");
        Ok(())
    }

    /// Declare `queue` as durable on the application channel. Declaring
    /// an existing durable queue again is harmless.
    pub async fn declare_queue(&mut self, queue: &str) -> Result<(), SessionError> {
        self.channel()?
            .queue_declare(queue)
            .await
            .map_err(|source| SessionError::Queue {
                queue: queue.to_string(),
                source,
            })?;
        self.transition(SessionState::QueueDeclared);
        info!(queue, "Queue declared.");
        Ok(())
    }

    /// Close the channel, then the connection. Both are attempted
    /// whatever happens to the first. Returns the errors seen, in
    /// order.
    async fn release(&mut self) -> Vec<TeardownError> {
        let mut errors = Vec::new();
        self.transition(SessionState::Closing);

        match self.channel.take() {
            Some(channel) => match channel.close().await {
                Ok(()) => info!(channel = APP_CHANNEL, "Channel closed."),
                Err(e) => errors.push(TeardownError::Channel(e)),
            },
            None => debug!("No channel was opened, not closing it"),
        }

        match self.connection.close().await {
            Ok(()) => info!("Connection closed."),
            Err(e) => errors.push(TeardownError::Connection(e)),
        }
        errors
    }

    /// Close the session after the work succeeded.
    ///
    /// # Errors
    ///
    /// The first close error, after both closes were attempted. Close
    /// errors are not retried.
    pub async fn close(&mut self) -> Result<(), TeardownError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        let mut errors = self.release().await;
        for err in &errors {
            error!(error = ?err, "{}", err);
        }
        self.transition(SessionState::Closed);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.swap_remove(0))
        }
    }

    /// Best effort release after a failure. Never fails; problems
    /// closing are only logged.
    pub async fn teardown(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        for err in self.release().await {
            error!(error = ?err, "{}", err);
        }
        self.transition(SessionState::Failed);
    }

    /// Route the outcome of the session's work: success closes the
    /// session, an error tears it down and is passed back unchanged
    pub async fn finish<T>(&mut self, outcome: Result<T, SessionError>) -> Result<T, SessionError> {
        match outcome {
            Ok(value) => {
                self.close().await.map_err(SessionError::Close)?;
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "Tearing down after error");
                self.teardown().await;
                Err(err)
            }
        }
    }
}
