//! Messages received from and published to the broker

/// Delivery mode for messages the broker stores durably
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// The subset of AMQP basic properties this tool reads or sets
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Properties {
    /// 1 = non-persistent, 2 = persistent. `None` if the publisher
    /// didn't say
    pub delivery_mode: Option<u8>,

    /// MIME content type, if given
    pub content_type: Option<String>,
}

/// A message delivered to a consumer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Tag of the subscription the message arrived on
    pub consumer_tag: String,

    /// Per-channel tag used to acknowledge the message
    pub delivery_tag: u64,

    /// True if the broker delivered this message before
    pub redelivered: bool,

    /// Exchange the message was published to
    pub exchange: String,

    /// Routing key the message was published with
    pub routing_key: String,

    /// Message properties
    pub properties: Properties,

    /// Opaque message body
    pub body: Vec<u8>,
}

/// Result of waiting for the next delivery on a subscription
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Next {
    /// A message arrived
    Message(Message),

    /// The broker closed the queue, channel or connection. No more
    /// messages will arrive on this subscription.
    Closed,
}

/// A message to publish. The delivery mode is always persistent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishRequest {
    /// Exchange to publish to
    exchange: String,

    /// Routing key to publish with
    routing_key: String,

    /// Message body
    body: Vec<u8>,

    /// Properties sent with the message
    properties: Properties,
}

impl PublishRequest {
    /// A persistent message for `exchange` with `routing_key`
    pub fn new(exchange: &str, routing_key: &str, body: Vec<u8>) -> Self {
        Self {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body,
            properties: Properties {
                delivery_mode: Some(DELIVERY_MODE_PERSISTENT),
                content_type: None,
            },
        }
    }

    /// Set the content type property
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.properties.content_type = Some(content_type.to_string());
        self
    }

    /// Exchange the message goes to
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Routing key the message is published with
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// The message body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The message properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "consumer_tag={} delivery_tag={} redelivered={} exchange={:?} routing_key={:?} delivery_mode={} body={:?}",
            self.consumer_tag,
            self.delivery_tag,
            self.redelivered,
            self.exchange,
            self.routing_key,
            self.properties
                .delivery_mode
                .map_or_else(|| "-".to_string(), |mode| mode.to_string()),
            String::from_utf8_lossy(&self.body),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_is_persistent() {
        let req = PublishRequest::new("ex", "rk", b"hello".to_vec()).with_content_type("text/plain");
        assert_eq!(req.properties().delivery_mode, Some(DELIVERY_MODE_PERSISTENT));
        assert_eq!(req.properties().content_type.as_deref(), Some("text/plain"));
        assert_eq!(req.body(), b"hello");
    }

    #[test]
    fn display_one_line() {
        let msg = Message {
            consumer_tag: "mytag".to_string(),
            delivery_tag: 7,
            redelivered: true,
            exchange: "ex".to_string(),
            routing_key: "rk".to_string(),
            properties: Properties {
                delivery_mode: Some(1),
                content_type: None,
            },
            body: b"two\nlines".to_vec(),
        };
        let shown = msg.to_string();
        assert!(!shown.contains('\n'));
        assert!(shown.contains("delivery_tag=7"));
        assert!(shown.contains("delivery_mode=1"));
        assert!(shown.contains(r#"body="two\nlines""#));
    }
}
