use async_trait::async_trait;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

use amqp_endpoint::{Credentials, Opener};
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
};

use super::{delivery, LapinDeliveries, RabbitError, REPLY_SUCCESS};
use crate::message::PublishRequest;
use crate::session::broker::{BrokerError, Channel, Connection};

/// [`Connection`] backed by a `lapin` connection. The TCP/TLS
/// connection and the login handshake happen together in
/// [`Connection::authenticate`].
pub struct LapinConnection {
    /// Makes the underlying connection
    opener: Opener,
    /// The open connection, once logged in
    connection: Option<lapin::Connection>,
}

impl std::fmt::Debug for LapinConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LapinConnection")
            .field("opener", &self.opener)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

impl LapinConnection {
    /// A connection that will be made by `opener`
    pub fn new(opener: Opener) -> Self {
        Self {
            opener,
            connection: None,
        }
    }
}

#[async_trait]
impl Connection for LapinConnection {
    type Channel = LapinChannel;

    async fn authenticate(
        &mut self,
        credentials: &Credentials,
        vhost: &str,
    ) -> Result<(), BrokerError> {
        let connection = self.opener.authenticate(credentials, vhost).await?;
        self.connection = Some(connection);
        Ok(())
    }

    async fn open_channel(&mut self, id: u16) -> Result<LapinChannel, BrokerError> {
        let connection = self
            .connection
            .as_ref()
            .ok_or(RabbitError::NotAuthenticated)?;
        let channel = connection.create_channel().await?;
        // lapin numbers channels itself. The first one on a fresh
        // connection is 1.
        if channel.id() != id {
            warn!(requested = id, opened = channel.id(), "Opened a different channel number");
        }
        Ok(LapinChannel { channel })
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        match self.connection.take() {
            Some(connection) if connection.status().connected() => {
                connection.close(REPLY_SUCCESS, "closing").await?;
            }
            Some(_) => debug!("Connection was already closed"),
            None => debug!("Never logged in, no connection to close"),
        }
        Ok(())
    }
}

/// [`Channel`] backed by a `lapin` channel
#[derive(Debug)]
pub struct LapinChannel {
    /// The lapin channel
    channel: lapin::Channel,
}

#[async_trait]
impl Channel for LapinChannel {
    type Deliveries = LapinDeliveries;

    async fn queue_declare(&self, queue: &str) -> Result<(), BrokerError> {
        let opts = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };
        let declared = self
            .channel
            .queue_declare(queue, opts, FieldTable::default())
            .await?;
        debug!(
            queue = declared.name().as_str(),
            messages = declared.message_count(),
            consumers = declared.consumer_count(),
            "Declared"
        );
        Ok(())
    }

    async fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<LapinDeliveries, BrokerError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(LapinDeliveries::new(consumer, consumer_tag))
    }

    async fn basic_ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions { multiple: false })
            .await?;
        Ok(())
    }

    async fn basic_publish(&self, request: &PublishRequest) -> Result<(), BrokerError> {
        // Confirms are not enabled on this channel, so the returned
        // confirm is never waited on
        let _confirm = self
            .channel
            .basic_publish(
                request.exchange(),
                request.routing_key(),
                BasicPublishOptions::default(),
                request.body(),
                delivery::basic_properties(request.properties()),
            )
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if self.channel.status().connected() {
            self.channel.close(REPLY_SUCCESS, "closing").await?;
        } else {
            debug!(channel = self.channel.id(), "Channel was already closed");
        }
        Ok(())
    }
}
