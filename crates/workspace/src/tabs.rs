use terminal::SessionId;
use tokio::sync::broadcast;

const CAPACITY: usize = 16;

/// Request to bring a session's tab to the front.
///
/// Any component may raise it. Whoever draws tabs subscribes; the hub itself
/// subscribes to move focus.
#[derive(Clone)]
pub struct TabSignal {
    sender: broadcast::Sender<SessionId>,
}

impl TabSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CAPACITY);
        Self { sender }
    }

    pub fn raise(&self, id: &SessionId) {
        match self.sender.send(id.clone()) {
            Ok(listeners) => tracing::debug!(session = %id, listeners, "Tab switch raised"),
            Err(_) => tracing::debug!(session = %id, "Tab switch raised, nobody listening"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionId> {
        self.sender.subscribe()
    }
}

impl Default for TabSignal {
    fn default() -> Self {
        Self::new()
    }
}
