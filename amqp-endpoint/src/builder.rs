//! Builder for plain or TLS [`Opener`]s

use crate::connection::Opener;
use crate::options::TlsArgs;
use crate::Error;

/// Result type that returns an [`Error`]
pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Builder to make an [`Opener`], from which you can make a
/// [`lapin::Connection`]
pub struct EndpointBuilder {
    #[doc(hidden)]
    endpoint: String,
    #[doc(hidden)]
    tls_options: Option<TlsArgs>,
    #[doc(hidden)]
    prompt: bool,
    #[doc(hidden)]
    properties: lapin::ConnectionProperties,
}

impl EndpointBuilder {
    /// Start building a connection to the given URL. The vhost and
    /// credentials in the URL are only defaults, they are replaced
    /// by [`Opener::authenticate`].
    pub fn new(url: &str) -> Self {
        Self {
            endpoint: url.to_string(),
            tls_options: None,
            prompt: false,
            properties: Default::default(),
        }
    }

    /// Use the given [`lapin::ConnectionProperties`]
    pub fn with_properties(mut self, properties: lapin::ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Use every TLS option that is set in `tls`. Does nothing if
    /// none are.
    pub fn with_tls_args(mut self, tls: &TlsArgs) -> Self {
        if tls.is_set() {
            self.tls_options = Some(tls.clone());
        }
        self
    }

    /// Verify the server using the given CA certificate file, in PEM
    /// format
    pub fn with_ca_pem(mut self, ca_cert: &str) -> Self {
        let tls_options = self.tls_options.get_or_insert_with(TlsArgs::default);
        tls_options.ca_cert = Some(ca_cert.to_string());
        self
    }

    /// Present the p12 formatted key/cert file to the server
    pub fn with_p12(mut self, key: &str) -> Self {
        let tls_options = self.tls_options.get_or_insert_with(TlsArgs::default);
        tls_options.key = Some(key.to_string());
        self
    }

    /// Password to decrypt the key given in [`Self::with_p12`]
    pub fn key_password(mut self, password: &str) -> Self {
        let tls_options = self.tls_options.get_or_insert_with(TlsArgs::default);
        tls_options.key_password = Some(password.to_string());
        self
    }

    /// Prompt on the terminal if the P12 key can't be opened with the
    /// given password
    pub fn password_prompt(mut self) -> Self {
        self.prompt = true;
        self
    }

    /// Return the configured [`Opener`]
    pub fn opener(self) -> Result<Opener> {
        Opener::from_parts(
            &self.endpoint,
            self.tls_options.as_ref(),
            self.prompt,
            self.properties,
        )
    }
}
