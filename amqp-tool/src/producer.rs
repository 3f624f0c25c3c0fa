//! Publish a single persistent message

#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

use crate::message::PublishRequest;
use crate::session::broker::{Channel, Connection};
use crate::session::{Session, SessionError, SessionState};

/// Send `request` on the session's channel.
///
/// The publish is fire-and-forget: no publisher confirm is requested,
/// so success means the message was handed to the connection, not
/// that the broker stored it.
///
/// # Errors
///
/// [`SessionError::Publish`] if the broker rejects the publish,
/// [`SessionError::Channel`] if the channel isn't open.
#[instrument(skip(session, request), fields(exchange = request.exchange(), routing_key = request.routing_key(), length = request.body().len()))]
pub async fn publish<C: Connection>(
    session: &mut Session<C>,
    request: &PublishRequest,
) -> Result<(), SessionError> {
    session.channel()?;
    session.transition(SessionState::Publishing);
    debug!(
        delivery_mode = ?request.properties().delivery_mode,
        "Publishing {} bytes",
        request.body().len()
    );
    session
        .channel()?
        .basic_publish(request)
        .await
        .map_err(|source| SessionError::Publish {
            exchange: request.exchange().to_string(),
            routing_key: request.routing_key().to_string(),
            source,
        })?;
    info!("Message sent.");
    Ok(())
}
