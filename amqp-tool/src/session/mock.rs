//! In-memory broker that records every operation, for tests

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::broker::{BrokerError, Channel, Connection, Deliveries};
use crate::message::{Message, Next, Properties, PublishRequest};

/// One broker operation, as the mock saw it
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Authenticate { user: String, vhost: String },
    OpenChannel(u16),
    QueueDeclare(String),
    BasicConsume { queue: String, consumer_tag: String },
    Ack(u64),
    Publish {
        exchange: String,
        routing_key: String,
        body: Vec<u8>,
        delivery_mode: Option<u8>,
    },
    CloseChannel,
    CloseConnection,
}

/// What the mock broker does. The defaults accept `guest`/`guest`
/// and succeed at everything.
#[derive(Clone, Debug)]
pub(crate) struct Script {
    /// The only accepted password
    pub(crate) secret: String,
    /// Refuse to open channels
    pub(crate) refuse_channel: bool,
    /// Queues that already exist as non-durable
    pub(crate) transient_queues: Vec<String>,
    /// Deliveries handed out by `basic_consume`, in order. An `Err`
    /// is a receive failure. Running out means the queue was closed.
    pub(crate) deliveries: Vec<Result<Message, String>>,
    /// Never end the delivery stream once `deliveries` run out
    pub(crate) hang_after_deliveries: bool,
    /// Fail the ack of this delivery tag
    pub(crate) fail_ack: Option<u64>,
    /// Reject publishes
    pub(crate) fail_publish: bool,
    /// Fail to close the channel
    pub(crate) fail_channel_close: bool,
    /// Fail to close the connection
    pub(crate) fail_connection_close: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            secret: "guest".to_string(),
            refuse_channel: false,
            transient_queues: Vec::new(),
            deliveries: Vec::new(),
            hang_after_deliveries: false,
            fail_ack: None,
            fail_publish: false,
            fail_channel_close: false,
            fail_connection_close: false,
        }
    }
}

impl Script {
    /// A script delivering `bodies` on `queue` with tags 1, 2, ...
    pub(crate) fn with_bodies(queue: &str, bodies: &[&[u8]]) -> Self {
        let deliveries = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| Ok(message(queue, i as u64 + 1, body)))
            .collect();
        Self {
            deliveries,
            ..Self::default()
        }
    }
}

/// A message as delivered through the default exchange
pub(crate) fn message(queue: &str, delivery_tag: u64, body: &[u8]) -> Message {
    Message {
        consumer_tag: String::new(),
        delivery_tag,
        redelivered: false,
        exchange: String::new(),
        routing_key: queue.to_string(),
        properties: Properties {
            delivery_mode: Some(2),
            content_type: None,
        },
        body: body.to_vec(),
    }
}

/// Shared record of operations and broker state
#[derive(Clone, Debug, Default)]
pub(crate) struct Log {
    /// Operations in the order they happened
    ops: Arc<Mutex<Vec<Op>>>,
    /// Declared queues, and whether they are durable
    queues: Arc<Mutex<BTreeMap<String, bool>>>,
}

impl Log {
    /// Record one operation
    fn push(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }

    /// Every operation so far
    pub(crate) fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    /// How many times `op` happened
    pub(crate) fn count(&self, op: &Op) -> usize {
        self.ops.lock().unwrap().iter().filter(|o| *o == op).count()
    }

    /// Delivery tags acknowledged, in order
    pub(crate) fn acks(&self) -> Vec<u64> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                Op::Ack(tag) => Some(*tag),
                _ => None,
            })
            .collect()
    }

    /// Names of queues that exist on the broker
    pub(crate) fn declared_queues(&self) -> Vec<String> {
        self.queues.lock().unwrap().keys().cloned().collect()
    }
}

/// Mock [`Connection`]
pub(crate) struct MockConnection {
    /// Broker behavior
    script: Script,
    /// Shared record
    log: Log,
}

impl MockConnection {
    /// New connection and the log it writes to
    pub(crate) fn new(script: Script) -> (Self, Log) {
        let log = Log::default();
        for queue in &script.transient_queues {
            log.queues.lock().unwrap().insert(queue.clone(), false);
        }
        (
            Self {
                script,
                log: log.clone(),
            },
            log,
        )
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Channel = MockChannel;

    async fn authenticate(
        &mut self,
        credentials: &amqp_endpoint::Credentials,
        vhost: &str,
    ) -> Result<(), BrokerError> {
        self.log.push(Op::Authenticate {
            user: credentials.user().to_string(),
            vhost: vhost.to_string(),
        });
        if credentials.secret() == self.script.secret {
            Ok(())
        } else {
            Err("ACCESS_REFUSED - Login was refused".into())
        }
    }

    async fn open_channel(&mut self, id: u16) -> Result<MockChannel, BrokerError> {
        self.log.push(Op::OpenChannel(id));
        if self.script.refuse_channel {
            return Err("CHANNEL_ERROR - no more channels".into());
        }
        Ok(MockChannel {
            script: self.script.clone(),
            log: self.log.clone(),
        })
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.log.push(Op::CloseConnection);
        if self.script.fail_connection_close {
            Err("connection reset".into())
        } else {
            Ok(())
        }
    }
}

/// Mock [`Channel`]
pub(crate) struct MockChannel {
    /// Broker behavior
    script: Script,
    /// Shared record
    log: Log,
}

#[async_trait]
impl Channel for MockChannel {
    type Deliveries = MockDeliveries;

    async fn queue_declare(&self, queue: &str) -> Result<(), BrokerError> {
        self.log.push(Op::QueueDeclare(queue.to_string()));
        let mut queues = self.log.queues.lock().unwrap();
        match queues.get(queue) {
            Some(true) => Ok(()),
            Some(false) => Err(format!(
                "PRECONDITION_FAILED - inequivalent arg 'durable' for queue '{queue}'"
            )
            .into()),
            None => {
                queues.insert(queue.to_string(), true);
                Ok(())
            }
        }
    }

    async fn basic_consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<MockDeliveries, BrokerError> {
        self.log.push(Op::BasicConsume {
            queue: queue.to_string(),
            consumer_tag: consumer_tag.to_string(),
        });
        let pending = self
            .script
            .deliveries
            .iter()
            .cloned()
            .map(|delivery| {
                delivery.map(|mut msg| {
                    msg.consumer_tag = consumer_tag.to_string();
                    msg
                })
            })
            .collect();
        Ok(MockDeliveries {
            pending,
            hang: self.script.hang_after_deliveries,
        })
    }

    async fn basic_ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.log.push(Op::Ack(delivery_tag));
        if self.script.fail_ack == Some(delivery_tag) {
            Err("PRECONDITION_FAILED - unknown delivery tag".into())
        } else {
            Ok(())
        }
    }

    async fn basic_publish(&self, request: &PublishRequest) -> Result<(), BrokerError> {
        self.log.push(Op::Publish {
            exchange: request.exchange().to_string(),
            routing_key: request.routing_key().to_string(),
            body: request.body().to_vec(),
            delivery_mode: request.properties().delivery_mode,
        });
        if self.script.fail_publish {
            Err(format!("NOT_FOUND - no exchange '{}'", request.exchange()).into())
        } else {
            Ok(())
        }
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.log.push(Op::CloseChannel);
        if self.script.fail_channel_close {
            Err("channel already closed".into())
        } else {
            Ok(())
        }
    }
}

/// Mock [`Deliveries`]
pub(crate) struct MockDeliveries {
    /// Messages still to hand out
    pending: VecDeque<Result<Message, String>>,
    /// Wait forever once `pending` is empty
    hang: bool,
}

#[async_trait]
impl Deliveries for MockDeliveries {
    async fn next(&mut self) -> Result<Next, BrokerError> {
        match self.pending.pop_front() {
            Some(Ok(msg)) => Ok(Next::Message(msg)),
            Some(Err(e)) => Err(e.into()),
            None if self.hang => futures::future::pending::<Result<Next, BrokerError>>().await,
            None => Ok(Next::Closed),
        }
    }
}

/// Formatted log output, as a run with the default `info` filter
/// would print it
#[derive(Clone, Debug, Default)]
pub(crate) struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Subscriber writing `info` and above into this capture. Install
    /// it with `tracing::subscriber::set_default`.
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish()
    }

    /// Everything logged so far
    pub(crate) fn output(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}
