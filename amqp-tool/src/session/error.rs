use super::broker::BrokerError;

/// Errors that end a session. Any of these sends the session through
/// [`super::Session::teardown`].
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SessionError {
    /// The broker refused the credentials, or the connection and
    /// login handshake failed
    #[error("Failed to authenticate as '{user}' on vhost '{vhost}'")]
    Authentication {
        /// User that tried to log in
        user: String,
        /// Virtual host requested
        vhost: String,
        /// The broker error
        #[source]
        source: BrokerError,
    },

    /// The channel couldn't be opened, or was used while not open
    #[error("Channel {id} error: {reason}")]
    Channel {
        /// Channel number
        id: u16,
        /// What went wrong
        reason: String,
        /// The broker error, if the broker reported one
        #[source]
        source: Option<BrokerError>,
    },

    /// Declaring the queue failed, for example because it exists with
    /// different durability
    #[error("Failed to declare queue '{queue}'")]
    Queue {
        /// The queue name
        queue: String,
        /// The broker error
        #[source]
        source: BrokerError,
    },

    /// Subscribing to the queue or receiving from it failed
    #[error("Failed to consume from queue '{queue}'")]
    Consume {
        /// The queue name
        queue: String,
        /// The broker error
        #[source]
        source: BrokerError,
    },

    /// The message handler failed to process a delivery
    #[error("Failed to handle message {delivery_tag}")]
    Handler {
        /// Delivery that was being handled
        delivery_tag: u64,
        /// The handler error
        #[source]
        source: std::io::Error,
    },

    /// Acknowledging a delivery failed
    #[error("Failed to acknowledge message {delivery_tag}")]
    Ack {
        /// Delivery that was being acknowledged
        delivery_tag: u64,
        /// The broker error, if the broker reported one
        #[source]
        source: Option<BrokerError>,
    },

    /// The broker rejected the publish
    #[error("Failed to publish to exchange '{exchange}' with routing key '{routing_key}'")]
    Publish {
        /// Target exchange
        exchange: String,
        /// Routing key used
        routing_key: String,
        /// The broker error
        #[source]
        source: BrokerError,
    },

    /// Closing the session after success failed. The work itself was
    /// done.
    #[error("Failed to close the session cleanly")]
    Close(#[source] TeardownError),
}

/// Errors releasing the channel or connection. These are logged,
/// they never replace the error that started the teardown
#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    /// Closing the channel failed
    #[error("Error while trying to close AMQP channel")]
    Channel(#[source] BrokerError),

    /// Closing the connection failed
    #[error("Error while trying to close AMQP connection")]
    Connection(#[source] BrokerError),
}

impl SessionError {
    /// Error for an operation on a channel that isn't open
    pub(crate) fn channel_not_open(id: u16) -> Self {
        Self::Channel {
            id,
            reason: "channel is not open".to_string(),
            source: None,
        }
    }
}
