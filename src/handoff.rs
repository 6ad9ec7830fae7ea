//! Handoff from an activated marker to the trivia view

use tokio::sync::mpsc;

use crate::protocol::BridgeMessage;

/// Receives the totem code of an activated marker. The AR screen closes right after.
pub trait TriviaHandoff: Send + Sync {
    fn hand_off(&self, totem_code: &str);
}

/// Route of the trivia view for a totem
pub fn trivia_route(totem_code: &str) -> String {
    format!("/trivia/{}", totem_code)
}

/// Tells the connected device to navigate to the trivia view
pub struct NavigationHandoff {
    outbound: mpsc::UnboundedSender<BridgeMessage>,
}

impl NavigationHandoff {
    pub fn new(outbound: mpsc::UnboundedSender<BridgeMessage>) -> Self {
        Self { outbound }
    }
}

impl TriviaHandoff for NavigationHandoff {
    fn hand_off(&self, totem_code: &str) {
        let msg = BridgeMessage::Navigate {
            route: trivia_route(totem_code),
            totem_code: totem_code.to_string(),
        };
        if self.outbound.send(msg).is_err() {
            tracing::warn!(totem_code, "Device gone before trivia navigation");
        }
    }
}
