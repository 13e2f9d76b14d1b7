//! Chat transcript: the live message list and its persisted form.
//!
//! Live [`Message`]s carry presentation state (loading, revealing, copy feedback) that
//! never reaches storage. What is persisted is an ordered list of role-tagged [`Entry`]
//! values, so restoring a session is a plain render-from-data step.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Visual classification of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Outgoing,
    Incoming,
    Loading,
}

/// Glyph shown on an incoming message's action icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyIcon {
    Loading,
    Hidden,
    Copy,
    Done,
}

impl CopyIcon {
    pub fn glyph(&self) -> &'static str {
        match self {
            CopyIcon::Loading => "loading",
            CopyIcon::Hidden => "",
            CopyIcon::Copy => "content_copy",
            CopyIcon::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub class: MessageClass,
    pub revealing: bool,
    pub copied: bool,
    /// Bumped on every copy so only the latest copy's timer reverts the icon.
    pub copy_generation: u64,
}

impl Message {
    /// A message is settled once it is neither waiting for a response nor mid-reveal.
    pub fn is_settled(&self) -> bool {
        self.class != MessageClass::Loading && !self.revealing
    }

    pub fn icon(&self) -> Option<CopyIcon> {
        match self.class {
            MessageClass::Outgoing => None,
            MessageClass::Loading => Some(CopyIcon::Loading),
            MessageClass::Incoming if self.revealing => Some(CopyIcon::Hidden),
            MessageClass::Incoming if self.copied => Some(CopyIcon::Done),
            MessageClass::Incoming => Some(CopyIcon::Copy),
        }
    }
}

/// Persisted form of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut transcript = Self::new();
        for entry in entries {
            let class = match entry.role {
                Role::User => MessageClass::Outgoing,
                Role::Model => MessageClass::Incoming,
            };
            transcript.push(entry.role, entry.text, class);
        }
        transcript
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>, class: MessageClass) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            text: text.into(),
            class,
            revealing: false,
            copied: false,
            copy_generation: 0,
        });
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(idx))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Snapshot of every settled message, in order.
    pub fn settled_entries(&self) -> Vec<Entry> {
        self.messages
            .iter()
            .filter(|m| m.is_settled())
            .map(|m| Entry {
                role: m.role,
                text: m.text.clone(),
            })
            .collect()
    }

    /// Ids of incoming messages that can be selected for copying.
    pub fn incoming_ids(&self) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|m| m.class == MessageClass::Incoming)
            .map(|m| m.id)
            .collect()
    }
}
