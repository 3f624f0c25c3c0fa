//! Command line parser
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use amqp_endpoint::{Credentials, EndpointArgs};
use clap::Parser;
use miette::{IntoDiagnostic, WrapErr};
#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

use crate::consumer::{self, ConsumeSummary, MessageHandler};
use crate::message::PublishRequest;
use crate::producer;
use crate::rabbit::LapinConnection;
use crate::session::Session;

/// Subcommands. Each one runs a single session against the broker
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Consume a queue, printing each message's fields and body
    Consume(ConsumeCommand),

    /// Consume a queue, printing a one line summary of each message
    Inspect(ConsumeCommand),

    /// Publish one persistent message
    Produce(ProduceCommand),
}

/// Commands that talk to a broker described by [`EndpointArgs`]
pub(crate) trait SessionCommand {
    /// Where and as whom to connect
    fn endpoint(&self) -> &EndpointArgs;

    /// A session that has not connected yet, and the credentials to
    /// log in with. Must be called from inside the tokio runtime.
    fn open_session(&self) -> miette::Result<(Session<LapinConnection>, Credentials)> {
        let opener = self
            .endpoint()
            .connection_opener()
            .wrap_err_with(|| format!("Bad endpoint {}", self.endpoint().endpoint))?;
        let credentials = self.endpoint().credentials()?;
        Ok((Session::new(LapinConnection::new(opener)), credentials))
    }
}

/// Arguments for consuming a queue
#[derive(Clone, Debug, clap::Args)]
pub struct ConsumeCommand {
    /// Queue to consume. It is declared durable if it doesn't exist
    pub(crate) queue_name: String,

    /// Tag identifying this consumer to the broker
    #[arg(long, default_value = "mytag")]
    pub(crate) consumer_tag: String,

    /// Stop after this many seconds without a message. Waits
    /// forever if not given
    #[arg(long)]
    pub(crate) receive_timeout: Option<u64>,

    /// Broker connection
    #[command(flatten)]
    pub(crate) endpoint: EndpointArgs,
}

impl SessionCommand for ConsumeCommand {
    fn endpoint(&self) -> &EndpointArgs {
        &self.endpoint
    }
}

impl ConsumeCommand {
    /// How long to wait for each message
    pub(crate) fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout.map(Duration::from_secs)
    }

    /// Log in, declare the queue and pass every message to `handler`
    /// until the queue is closed
    pub(crate) async fn run<H: MessageHandler>(
        &self,
        handler: &mut H,
    ) -> miette::Result<ConsumeSummary> {
        let (mut session, credentials) = self.open_session()?;
        let outcome = async {
            session
                .establish(&credentials, &self.endpoint.vhost)
                .await?;
            session.declare_queue(&self.queue_name).await?;
            consumer::consume(
                &mut session,
                &self.queue_name,
                &self.consumer_tag,
                handler,
                self.receive_timeout(),
            )
            .await
        }
        .await;
        let res = session.finish(outcome).await;
        debug!(state = ?session.state(), "Session ended");
        Ok(res?)
    }
}

/// Arguments for publishing a message
#[derive(Clone, Debug, clap::Args)]
pub struct ProduceCommand {
    /// Exchange to publish to. Use "" for the default exchange
    pub(crate) exchange: String,

    /// Routing key of the message
    pub(crate) route_key: String,

    /// File holding the message body, or `-` for standard input
    pub(crate) msg_file: PathBuf,

    /// MIME content type to attach to the message
    #[arg(long)]
    pub(crate) content_type: Option<String>,

    /// Broker connection
    #[command(flatten)]
    pub(crate) endpoint: EndpointArgs,
}

impl SessionCommand for ProduceCommand {
    fn endpoint(&self) -> &EndpointArgs {
        &self.endpoint
    }
}

impl ProduceCommand {
    /// The message body
    pub(crate) fn read_body(&self) -> miette::Result<Vec<u8>> {
        if self.msg_file.as_os_str() == "-" {
            let mut body = Vec::new();
            std::io::stdin()
                .read_to_end(&mut body)
                .into_diagnostic()
                .wrap_err("Unable to read message from stdin")?;
            Ok(body)
        } else {
            std::fs::read(&self.msg_file)
                .into_diagnostic()
                .wrap_err_with(|| format!("Unable to read {}", self.msg_file.display()))
        }
    }

    /// The message to send, with `body`
    pub(crate) fn request(&self, body: Vec<u8>) -> PublishRequest {
        let request = PublishRequest::new(&self.exchange, &self.route_key, body);
        match &self.content_type {
            Some(content_type) => request.with_content_type(content_type),
            None => request,
        }
    }

    /// Read the message, log in and publish it
    pub(crate) async fn run(&self) -> miette::Result<()> {
        // Read first so a bad file never opens a connection
        let request = self.request(self.read_body()?);
        let (mut session, credentials) = self.open_session()?;
        let outcome = async {
            session
                .establish(&credentials, &self.endpoint.vhost)
                .await?;
            producer::publish(&mut session, &request).await
        }
        .await;
        let res = session.finish(outcome).await;
        debug!(state = ?session.state(), "Session ended");
        Ok(res?)
    }
}

/// Minimal AMQP 0-9-1 client: consume a queue or publish a message
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// File to write logs to. Will log to stderr if not given
    #[arg(long, global = true)]
    pub(crate) logfile: Option<PathBuf>,

    /// What to do
    #[command(subcommand)]
    pub(crate) command: Commands,
}
