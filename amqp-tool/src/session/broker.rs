//! The broker operations a [`super::Session`] is driven through. The
//! `lapin` implementation lives in [`crate::rabbit`]; tests use
//! [`super::mock`].

use async_trait::async_trait;

use crate::message::{Next, PublishRequest};

/// Errors returned by broker operations
pub type BrokerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A transport connection to one broker. Authentication happens on
/// top of it, after which channels may be opened.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Channel type opened on this connection
    type Channel: Channel;

    /// Log in as `user` to `vhost`
    async fn authenticate(
        &mut self,
        credentials: &amqp_endpoint::Credentials,
        vhost: &str,
    ) -> Result<(), BrokerError>;

    /// Open the channel numbered `id`
    async fn open_channel(&mut self, id: u16) -> Result<Self::Channel, BrokerError>;

    /// Close the connection. This runs on the control channel (0)
    async fn close(&mut self) -> Result<(), BrokerError>;
}

/// An open channel on a [`Connection`]
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stream of deliveries produced by [`Channel::basic_consume`]
    type Deliveries: Deliveries;

    /// Declare a durable queue named `queue`
    async fn queue_declare(&self, queue: &str) -> Result<(), BrokerError>;

    /// Subscribe to `queue` as `consumer_tag`
    async fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<Self::Deliveries, BrokerError>;

    /// Acknowledge exactly one delivery
    async fn basic_ack(&self, delivery_tag: u64) -> Result<(), BrokerError>;

    /// Send a message without waiting for any confirmation
    async fn basic_publish(&self, request: &PublishRequest) -> Result<(), BrokerError>;

    /// Close the channel
    async fn close(&self) -> Result<(), BrokerError>;
}

/// Messages arriving on one consumer subscription
#[async_trait]
pub trait Deliveries: Send {
    /// Wait for the next delivery. Returns [`Next::Closed`] once the
    /// broker ends the subscription
    async fn next(&mut self) -> Result<Next, BrokerError>;
}
