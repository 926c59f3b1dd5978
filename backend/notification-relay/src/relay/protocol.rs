/// Wire events exchanged with relay clients
///
/// Frames are JSON text shaped like socket.io events:
/// `{"event": "register", "data": "alice"}`.
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Payload of a `sendNotification` event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRequest {
    pub recipient: String,
    pub title: String,
    pub body: String,
}

/// Notification content forwarded to the recipient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// Events a client sends to the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Bind the sending connection to a user id
    Register(String),

    /// Forward a notification to another user's connection
    SendNotification(NotificationRequest),
}

/// Events the relay pushes to a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    ReceiveNotification(Notification),
}

impl ClientEvent {
    pub fn register(user_id: impl Into<String>) -> Self {
        ClientEvent::Register(user_id.into())
    }

    pub fn send_notification(
        recipient: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        ClientEvent::SendNotification(NotificationRequest {
            recipient: recipient.into(),
            title: title.into(),
            body: body.into(),
        })
    }

    /// Parse and validate an inbound text frame
    pub fn parse(text: &str) -> AppResult<Self> {
        let event: ClientEvent = serde_json::from_str(text)?;
        if let ClientEvent::Register(user_id) = &event {
            if user_id.is_empty() {
                return Err(AppError::MalformedEvent("register requires a non-empty user id".into()));
            }
        }
        Ok(event)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerEvent {
    pub fn receive_notification(title: impl Into<String>, body: impl Into<String>) -> Self {
        ServerEvent::ReceiveNotification(Notification {
            title: title.into(),
            body: body.into(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<NotificationRequest> for Notification {
    fn from(req: NotificationRequest) -> Self {
        Notification {
            title: req.title,
            body: req.body,
        }
    }
}
