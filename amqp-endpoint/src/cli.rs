use std::path::PathBuf;

use crate::{builder::Result, options::TlsArgs, Credentials, EndpointBuilder, Opener};

/// Clap derive command-line arguments describing where and as whom
/// to connect.
///
/// Add this struct to a `clap::Parser` struct with
/// `#[command(flatten)]` to generate the options
///
/// ```text
///   -e, --endpoint <ENDPOINT>
///           URL of the AMQP server. `amqps://` URLs use TLS [default: amqp://127.0.0.1:5672/%2f]
///       --vhost <VHOST>
///           Virtual host to log in to [default: /]
///   -u, --user <USER>
///           User to log in as [default: guest]
///       --passwd-file <PASSWD_FILE>
///           File containing the password. Trailing newlines are removed. The password is 'guest' if not given
///   -k, --key <KEY>
///           P12 formatted client key and certificate
///       --ca-cert <CA_CERT>
///           PEM formatted CA certificate chain
///       --key-password <KEY_PASSWORD>
///           Password for the key, if encrypted
/// ```
#[derive(Clone, Debug, clap::Args)]
pub struct EndpointArgs {
    /// URL of the AMQP server. `amqps://` URLs use TLS
    #[arg(short, long, default_value_t = String::from("amqp://127.0.0.1:5672/%2f"))]
    pub endpoint: String,

    /// Virtual host to log in to
    #[arg(long, default_value = "/")]
    pub vhost: String,

    /// User to log in as
    #[arg(short, long, default_value = "guest")]
    pub user: String,

    /// File containing the password. Trailing newlines are removed.
    /// The password is 'guest' if not given
    #[arg(long)]
    pub passwd_file: Option<PathBuf>,

    /// Options to control TLS connections
    #[command(flatten)]
    pub tls_options: TlsArgs,
}

impl EndpointArgs {
    /// Return an [`EndpointBuilder`] for the endpoint and TLS options.
    /// Use this to set other options (for example connection
    /// properties) before calling [`EndpointBuilder::opener`]
    pub fn builder(&self) -> EndpointBuilder {
        EndpointBuilder::new(&self.endpoint)
            .with_tls_args(&self.tls_options)
            .password_prompt()
    }

    /// Convert the arguments into an [`Opener`] driven by the current
    /// tokio runtime. Equivalent to
    ///
    /// ```ignore
    /// let conn_props = lapin::ConnectionProperties::default()
    ///     .with_executor(tokio_executor_trait::Tokio::current())
    ///     .with_reactor(tokio_reactor_trait::Tokio);
    /// let opener = args.builder().with_properties(conn_props).opener()?;
    /// ```
    pub fn connection_opener(&self) -> Result<Opener> {
        let conn_props = lapin::ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);
        self.builder().with_properties(conn_props).opener()
    }

    /// The login credentials, reading the password file if given
    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::from_passwd_file(&self.user, self.passwd_file.as_deref())
    }
}
