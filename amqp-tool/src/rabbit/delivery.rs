use async_trait::async_trait;
use futures::StreamExt;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

use lapin::{message::Delivery, types::ShortString, BasicProperties, ChannelState};

use crate::message::{Message, Next, Properties};
use crate::session::broker::{BrokerError, Deliveries};

/// [`Deliveries`] from a `lapin` consumer
#[derive(Debug)]
pub struct LapinDeliveries {
    /// The lapin consumer stream
    consumer: lapin::Consumer,
    /// Tag the consumer was registered with
    consumer_tag: String,
}

impl LapinDeliveries {
    /// Wrap `consumer`, registered as `consumer_tag`
    pub(crate) fn new(consumer: lapin::Consumer, consumer_tag: &str) -> Self {
        Self {
            consumer,
            consumer_tag: consumer_tag.to_string(),
        }
    }
}

#[async_trait]
impl Deliveries for LapinDeliveries {
    async fn next(&mut self) -> Result<Next, BrokerError> {
        next_from(&self.consumer_tag, self.consumer.next().await)
    }
}

/// Interpret one item of a consumer stream. The stream ends when the
/// consumer is cancelled or the connection closes. Reading from a
/// closed channel also ends it. Any other error is a receive failure.
pub(crate) fn next_from(
    consumer_tag: &str,
    item: Option<lapin::Result<Delivery>>,
) -> Result<Next, BrokerError> {
    match item {
        Some(Ok(delivery)) => Ok(Next::Message(message(consumer_tag, delivery))),
        None | Some(Err(lapin::Error::InvalidChannelState(ChannelState::Closed))) => {
            Ok(Next::Closed)
        }
        Some(Err(e)) => Err(e.into()),
    }
}

/// Convert a lapin delivery
fn message(consumer_tag: &str, delivery: Delivery) -> Message {
    Message {
        consumer_tag: consumer_tag.to_string(),
        delivery_tag: delivery.delivery_tag,
        redelivered: delivery.redelivered,
        exchange: delivery.exchange.as_str().to_string(),
        routing_key: delivery.routing_key.as_str().to_string(),
        properties: properties(&delivery.properties),
        body: delivery.data,
    }
}

/// Properties of a received message
pub(crate) fn properties(props: &BasicProperties) -> Properties {
    Properties {
        delivery_mode: *props.delivery_mode(),
        content_type: props.content_type().as_ref().map(|ct| ct.as_str().to_string()),
    }
}

/// Properties to publish a message with
pub(crate) fn basic_properties(props: &Properties) -> BasicProperties {
    let mut out = BasicProperties::default();
    if let Some(mode) = props.delivery_mode {
        out = out.with_delivery_mode(mode);
    }
    if let Some(content_type) = &props.content_type {
        out = out.with_content_type(ShortString::from(content_type.clone()));
    }
    out
}
