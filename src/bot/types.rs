//! Message shapes exchanged with the chat transport.
//!
//! These mirror the messaging network's protobuf layout: every field is
//! optional and a message is either a plain conversation body or an
//! extended text message carrying a context block.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Server part of group conversation identifiers.
pub const GROUP_SERVER: &str = "g.us";

/// A network identity: `user@server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Jid {
    pub user: String,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.user.is_empty() {
            f.write_str(&self.server)
        } else {
            write!(f, "{}@{}", self.user, self.server)
        }
    }
}

impl FromStr for Jid {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once('@') {
            Some((user, server)) => Jid::new(user, server),
            None => Jid::new("", s),
        })
    }
}

impl From<String> for Jid {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(jid) => jid,
            Err(never) => match never {},
        }
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

/// A message payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_text_message: Option<ExtendedTextMessage>,
}

impl Message {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            conversation: Some(text.into()),
            extended_text_message: None,
        }
    }

    /// The body a command can be read from, if any.
    pub fn text(&self) -> Option<&str> {
        match (&self.conversation, &self.extended_text_message) {
            (Some(body), _) if !body.is_empty() => Some(body),
            (_, Some(ext)) => Some(ext.text.as_str()),
            _ => None,
        }
    }
}

/// A text message carrying citation and mention metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedTextMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_info: Option<ContextInfo>,
}

/// Metadata block of an extended message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stanza_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_message: Option<Box<Message>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_jid: Vec<String>,
}

/// Envelope data of an inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: String,
    pub chat: Jid,
    pub sender: Jid,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub is_from_me: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
}

/// An inbound message event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub info: MessageInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl MessageEvent {
    /// Text to run through the command dispatcher, skipping our own messages.
    pub fn command_text(&self) -> Option<&str> {
        if self.info.is_from_me {
            return None;
        }
        self.message.as_ref().and_then(Message::text)
    }
}

/// Events pushed by a chat transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A new pairing code is available during first-time pairing.
    PairingCode(String),
    /// Pairing finished and the session is live.
    PairSuccess,
    Connected,
    Disconnected,
    Message(Box<MessageEvent>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(message: Option<Message>, is_from_me: bool) -> MessageEvent {
        MessageEvent {
            info: MessageInfo {
                id: "3EB0".to_string(),
                chat: Jid::new("5511999990000", "s.whatsapp.net"),
                sender: Jid::new("5511999990000", "s.whatsapp.net"),
                is_group: false,
                is_from_me,
                push_name: None,
            },
            message,
        }
    }

    #[test]
    fn jid_parses_and_prints() {
        let jid: Jid = "120363025@g.us".parse().unwrap();
        assert_eq!(jid.user, "120363025");
        assert!(jid.is_group());
        assert_eq!(jid.to_string(), "120363025@g.us");

        let server_only: Jid = "s.whatsapp.net".parse().unwrap();
        assert_eq!(server_only.to_string(), "s.whatsapp.net");
    }

    #[test]
    fn command_text_prefers_conversation_then_extended() {
        assert_eq!(
            event(Some(Message::plain("!ping")), false).command_text(),
            Some("!ping")
        );

        let extended = Message {
            conversation: None,
            extended_text_message: Some(ExtendedTextMessage {
                text: "!all hi".to_string(),
                context_info: None,
            }),
        };
        assert_eq!(event(Some(extended), false).command_text(), Some("!all hi"));
    }

    #[test]
    fn own_and_empty_messages_have_no_command_text() {
        assert_eq!(event(Some(Message::plain("!ping")), true).command_text(), None);
        assert_eq!(event(None, false).command_text(), None);
        assert_eq!(event(Some(Message::default()), false).command_text(), None);
    }

    #[test]
    fn message_event_decodes_from_bridge_json() {
        let raw = r#"{
            "info": {"id": "ABC", "chat": "123@g.us", "sender": "55@s.whatsapp.net", "is_group": true},
            "message": {"extended_text_message": {"text": "!ping", "context_info": {
                "stanza_id": "Q1", "participant": "77@s.whatsapp.net",
                "quoted_message": {"conversation": "original"}
            }}}
        }"#;
        let evt: MessageEvent = sonic_rs::from_str(raw).unwrap();

        assert!(evt.info.is_group);
        assert_eq!(evt.info.chat, Jid::new("123", "g.us"));
        let ctx = evt.message.unwrap().extended_text_message.unwrap().context_info.unwrap();
        assert_eq!(ctx.stanza_id.as_deref(), Some("Q1"));
        assert_eq!(ctx.quoted_message.unwrap().conversation.as_deref(), Some("original"));
    }
}
