//! Websocket message router.
//!
//! Maps each incoming frame's `message_type` onto a bus [`Event`] and
//! publishes it. Unknown types are dropped without publishing anything.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use sle_proto::{MessageType, ProtoError, ProviderType, MESSAGE_TYPE_FIELD};
use tracing::{debug, warn};

use crate::bus::{Event, EventBus};

/// Routes websocket frames onto the bus.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    bus: Arc<EventBus>,
}

impl MessageRouter {
    /// Create a router publishing on `bus`.
    #[must_use]
    pub const fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Route and publish one frame.
    ///
    /// Returns `true` if an event was published.
    pub fn handle_message(&self, message: &Value) -> bool {
        match Self::route(message) {
            Some(event) => {
                self.bus.publish(&event);
                true
            }
            None => false,
        }
    }

    /// Translate a frame into the event it should publish, if any.
    #[must_use]
    pub fn route(message: &Value) -> Option<Event> {
        let Some(name) = message.get(MESSAGE_TYPE_FIELD).and_then(Value::as_str) else {
            warn!("dropping websocket message without {MESSAGE_TYPE_FIELD}");
            return None;
        };

        let Some(message_type) = MessageType::from_wire(name) else {
            debug!(message_type = name, "ignoring unknown message type");
            return None;
        };

        match Self::decode(message_type, message) {
            Ok(event) => {
                debug!(%message_type, "routing message");
                Some(event)
            }
            Err(e) => {
                warn!(%message_type, error = %e, "dropping undecodable message");
                None
            }
        }
    }

    fn decode(message_type: MessageType, message: &Value) -> Result<Event, ProtoError> {
        use MessageType as M;

        let event = match message_type {
            M::ForwardProviderStateChange | M::ReturnProviderStateChange => {
                Event::ProviderStateChange {
                    provider: provider_of(message_type)?,
                    change: payload(message)?,
                }
            }
            M::ForwardThrowEventSuccess => Event::ThrowSucceeded(payload(message)?),
            M::ForwardThrowEventFailure => Event::ThrowFailed(payload(message)?),
            M::ForwardDataFlow | M::ReturnDataFlow => Event::ProviderDataFlow {
                provider: provider_of(message_type)?,
                flow: payload(message)?,
            },
            M::ForwardDeliveryModeChange | M::ReturnDeliveryModeChange => {
                Event::DeliveryModeChange {
                    provider: provider_of(message_type)?,
                    change: payload(message)?,
                }
            }
            M::UplinkStateChange | M::DownlinkStateChange => {
                let link = message_type
                    .link()
                    .ok_or(ProtoError::MissingField("link"))?;
                let change: sle_proto::messages::LinkStateChange = payload(message)?;
                if change.action.link() != link {
                    return Err(ProtoError::invalid("action", change.action.as_str()));
                }
                Event::LinkStateChange { link, change }
            }
            M::UplinkDataFlow | M::DownlinkDataFlow => Event::LinkDataFlow {
                link: message_type
                    .link()
                    .ok_or(ProtoError::MissingField("link"))?,
                flow: payload(message)?,
            },
            M::ProfileCreate => Event::ProfileCreated(payload(message)?),
            M::ProfileUpdate => Event::ProfileUpdated(payload(message)?),
            M::ProfileDelete => Event::ProfileDeleted(payload(message)?),
            M::Log => Event::LogMessage(payload(message)?),
        };
        Ok(event)
    }
}

fn provider_of(message_type: MessageType) -> Result<ProviderType, ProtoError> {
    message_type
        .provider()
        .ok_or(ProtoError::MissingField("provider"))
}

fn payload<T: DeserializeOwned>(message: &Value) -> Result<T, ProtoError> {
    Ok(T::deserialize(message)?)
}
