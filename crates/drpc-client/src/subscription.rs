//! Event subscriptions
//!
//! A subscription is identified by a key derived deterministically from the
//! event name and its arguments. Subscribing twice with the same (event,
//! args) pair replaces the stored handler; the latest registration wins.

use drpc_protocol::EventName;
use serde_json::Value;

use crate::client::RpcClient;
use crate::error::RpcError;

/// Handler invoked with the payload of a subscribed dispatch event
pub type EventHandler = Box<dyn FnMut(Value) + Send + Sync + 'static>;

/// Key identifying a subscription
///
/// Absent arguments render as JSON `null` so that a dispatch without
/// arguments matches a subscription made without arguments. Object keys in
/// `serde_json` maps are ordered, so the rendering is deterministic.
pub fn subscription_key(event: &EventName, args: Option<&Value>) -> String {
    let args = serde_json::to_string(args.unwrap_or(&Value::Null))
        .unwrap_or_else(|_| "null".to_string());
    format!("{}{}", event.as_str(), args)
}

/// Handle for an active subscription
///
/// Obtained from [`RpcClient::subscribe`]; dropping the handle does not
/// unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    client: RpcClient,
    event: EventName,
    args: Option<Value>,
}

impl Subscription {
    pub(crate) fn new(client: RpcClient, event: EventName, args: Option<Value>) -> Self {
        Self {
            client,
            event,
            args,
        }
    }

    /// Event this subscription delivers
    pub fn event(&self) -> &EventName {
        &self.event
    }

    /// Unsubscribe, removing the stored handler
    pub async fn unsubscribe(self) -> Result<(), RpcError> {
        self.client
            .unsubscribe(self.event.clone(), self.args.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_includes_event_and_args() {
        let key = subscription_key(
            &EventName::MessageUpdate,
            Some(&json!({"channel_id": "150074202727251969"})),
        );
        assert_eq!(key, r#"MESSAGE_UPDATE{"channel_id":"150074202727251969"}"#);
    }

    #[test]
    fn test_key_without_args_is_null() {
        let key = subscription_key(&EventName::Ready, None);
        assert_eq!(key, "READYnull");
    }

    #[test]
    fn test_key_deterministic_for_equal_args() {
        let a = subscription_key(&EventName::GuildStatus, Some(&json!({"a": 1, "b": 2})));
        let b = subscription_key(&EventName::GuildStatus, Some(&json!({"b": 2, "a": 1})));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_distinguishes_args() {
        let a = subscription_key(&EventName::GuildStatus, Some(&json!({"guild_id": "1"})));
        let b = subscription_key(&EventName::GuildStatus, Some(&json!({"guild_id": "2"})));
        assert_ne!(a, b);
    }
}
