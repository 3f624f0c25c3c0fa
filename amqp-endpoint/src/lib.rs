//! Helps you open a [`lapin::Connection`] to an AMQP 0-9-1 broker,
//! optionally over TLS, and log in to a chosen virtual host.
//!
//! # Examples
//! Create a plain opener and log in
//! ```no_run
//! # #[tokio::main] async fn main() -> miette::Result<()>{
//! use amqp_endpoint::{Credentials, EndpointBuilder};
//! use miette::IntoDiagnostic;
//!
//! let opener = EndpointBuilder::new("amqp://127.0.0.1:5672/%2f").opener()?;
//! let creds = Credentials::new("guest", "guest");
//! let connection = opener.authenticate(&creds, "/").await.into_diagnostic()?;
//! # Ok(())}
//! ```
//!
//! Create an opener that verifies the server and presents a client
//! certificate
//! ```no_run
//! # fn main() -> miette::Result<()>{
//! # use amqp_endpoint::EndpointBuilder;
//! let opener = EndpointBuilder::new("amqps://127.0.0.1:5671/%2f")
//!    .with_ca_pem("tls-gen/basic/result/ca_certificate.pem")
//!    .with_p12("tls-gen/basic/result/client_key.p12")
//!    .key_password("bunnies")
//!    .opener()?;
//! # Ok(())}
//! ```
//!
//! # Openssl
//!
//! This crate uses openssl via the
//! [`native-tls`](https://docs.rs/native-tls/0.2.11/native_tls/) crate.
//! By default it links to an existing shared library on your system. If
//! you would instead like a static binary, include the feature
//! `vendored-tls` on this crate
//!
//! # From the command line
//! With the feature `clap`, add [`EndpointArgs`] to any `clap::Parser`
//! struct to generate the endpoint, vhost, credential and TLS
//! options, then call [`EndpointArgs::connection_opener`] and
//! [`EndpointArgs::credentials`].
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
// clippy lints
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions, clippy::single_match_else)]
#![warn(
    clippy::missing_docs_in_private_items,
    clippy::self_named_module_files,
    clippy::perf,
    clippy::missing_panics_doc,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::enum_variant_names
)]

mod builder;
mod connection;
/// Credentials and TLS options
mod options;

#[cfg(feature = "clap")]
/// Clap based command-line argument builder
mod cli;

pub use builder::EndpointBuilder;
pub use connection::{Error, Opener};
pub use options::{Credentials, TlsArgs, DEFAULT_SECRET};

// Re-export lapin so users get a matching version
pub use lapin;

#[cfg(feature = "clap")]
/// Clap derive struct for building command-lines
pub use cli::EndpointArgs;
