//! Drain a queue, handing each message to a [`MessageHandler`] and
//! acknowledging it once handled

use std::io::Write;
use std::time::Duration;

#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

use crate::message::{Message, Next};
use crate::session::broker::{Channel, Connection, Deliveries};
use crate::session::{Session, SessionError, SessionState};

/// Something that processes delivered messages. The message is
/// acknowledged only after `handle` returns `Ok`.
pub trait MessageHandler {
    /// Process one message
    fn handle(&mut self, message: &Message) -> std::io::Result<()>;
}

/// Why the consume loop stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumeEnd {
    /// The broker closed the queue or channel
    QueueClosed,
    /// Nothing arrived within the receive timeout
    Idle,
}

/// Outcome of a finished consume loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsumeSummary {
    /// Messages handled and acknowledged
    pub processed: u64,
    /// What ended the loop
    pub end: ConsumeEnd,
}

/// Subscribe to `queue` as `consumer_tag` and process messages until
/// the broker closes the subscription, or, if `receive_timeout` is
/// given, until nothing arrives for that long.
///
/// Messages are handled and acknowledged one at a time in arrival
/// order, each acknowledgment naming exactly one delivery tag.
///
/// # Errors
///
/// Any failure subscribing, receiving, handling or acknowledging.
/// The session is left for the caller to tear down.
#[instrument(skip(session, handler))]
pub async fn consume<C, H>(
    session: &mut Session<C>,
    queue: &str,
    consumer_tag: &str,
    handler: &mut H,
    receive_timeout: Option<Duration>,
) -> Result<ConsumeSummary, SessionError>
where
    C: Connection,
    H: MessageHandler,
{
    let consume_err = |source| SessionError::Consume {
        queue: queue.to_string(),
        source,
    };

    let mut deliveries = session
        .channel()?
        .basic_consume(queue, consumer_tag)
        .await
        .map_err(consume_err)?;
    session.transition(SessionState::Consuming);
    info!("Channel set for basic_consume.");

    let mut acker = Acker::default();
    let end = loop {
        let next = match receive_timeout {
            Some(limit) => match tokio::time::timeout(limit, deliveries.next()).await {
                Ok(next) => next,
                Err(_) => {
                    info!(timeout = ?limit, "No message received in time. Stopping.");
                    break ConsumeEnd::Idle;
                }
            },
            None => deliveries.next().await,
        };

        let message = match next.map_err(consume_err)? {
            Next::Message(message) => message,
            Next::Closed => {
                info!("Queue was closed.");
                break ConsumeEnd::QueueClosed;
            }
        };

        handler
            .handle(&message)
            .map_err(|source| SessionError::Handler {
                delivery_tag: message.delivery_tag,
                source,
            })?;
        acker.ack(session.channel()?, message.delivery_tag).await?;
        info!(delivery_tag = message.delivery_tag, "Message processed.");
    };

    Ok(ConsumeSummary {
        processed: acker.count,
        end,
    })
}

/// Acknowledges deliveries, refusing to ack any tag twice
#[derive(Debug, Default)]
struct Acker {
    /// Highest tag acknowledged so far. The broker hands out tags in
    /// increasing order on a channel.
    last: Option<u64>,
    /// Number of acks sent
    count: u64,
}

impl Acker {
    /// Send the ack for `delivery_tag` on `channel`
    async fn ack<Ch: Channel>(&mut self, channel: &Ch, delivery_tag: u64) -> Result<(), SessionError> {
        if self.last.is_some_and(|last| delivery_tag <= last) {
            error!(delivery_tag, last = ?self.last, "Delivery tag already acknowledged");
            return Err(SessionError::Ack {
                delivery_tag,
                source: None,
            });
        }
        channel
            .basic_ack(delivery_tag)
            .await
            .map_err(|source| SessionError::Ack {
                delivery_tag,
                source: Some(source),
            })?;
        self.last = Some(delivery_tag);
        self.count += 1;
        Ok(())
    }
}

/// Prints each delivery field on its own line, followed by the raw
/// body
#[derive(Debug)]
pub struct FieldPrinter<W: Write> {
    /// Where messages are written
    out: W,
}

impl<W: Write> FieldPrinter<W> {
    /// Print to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> MessageHandler for FieldPrinter<W> {
    fn handle(&mut self, message: &Message) -> std::io::Result<()> {
        writeln!(self.out, "Consumer tag: {}", message.consumer_tag)?;
        writeln!(self.out, "Delivery tag: {}", message.delivery_tag)?;
        writeln!(self.out, "Redelivered: {}", message.redelivered)?;
        writeln!(self.out, "Exchange: {}", message.exchange)?;
        writeln!(self.out, "Routing key: {}", message.routing_key)?;
        self.out.write_all(&message.body)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// Prints one `Message: ...` line per delivery
#[derive(Debug)]
pub struct SummaryPrinter<W: Write> {
    /// Where messages are written
    out: W,
}

impl<W: Write> SummaryPrinter<W> {
    /// Print to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> MessageHandler for SummaryPrinter<W> {
    fn handle(&mut self, message: &Message) -> std::io::Result<()> {
        writeln!(self.out, "Message: {message}")?;
        self.out.flush()
    }
}
