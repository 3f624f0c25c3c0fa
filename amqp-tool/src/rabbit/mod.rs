//! Broker operations carried out by [lapin](https://docs.rs/lapin/latest/lapin/)

mod connection;
mod delivery;

pub use connection::{LapinChannel, LapinConnection};
pub use delivery::LapinDeliveries;

/// AMQP reply code for a normal close
pub(crate) const REPLY_SUCCESS: u16 = 200;

/// Errors raised by the adapter itself rather than by lapin
#[derive(Debug, thiserror::Error)]
pub enum RabbitError {
    /// A channel was requested before logging in
    #[error("Not logged in to the broker")]
    NotAuthenticated,
}
