use crate::domain::ChatId;

/// Inbound event as seen by the engines. The transport adapter is
/// responsible for flattening messenger-specific updates into this shape.
#[derive(Clone, Debug)]
pub struct Event {
    /// Conversation the event belongs to; session state is keyed on this.
    pub conversation: ChatId,
    /// Stable external identity of the sender, if the transport knows one.
    pub username: Option<String>,
    pub kind: EventKind,
}

#[derive(Clone, Debug)]
pub enum EventKind {
    /// Slash command, name without the leading `/`.
    Command(String),
    /// Free text typed by the user.
    Text(String),
    /// A structured action (inline button press), carrying its data payload.
    Action(String),
    /// An attachment reference plus optional caption.
    Attachment {
        file_id: String,
        caption: Option<String>,
    },
    /// Anything the transport cannot express as text (stickers, audio, ...).
    NonText,
}

impl Event {
    pub fn sender(&self) -> &str {
        self.username.as_deref().unwrap_or("unknown")
    }
}

/// One piece of composed rich content. Broadcasts carry a sequence of these;
/// fence notes carry text only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Chunk {
    Text(String),
    Attachment {
        file_id: String,
        caption: Option<String>,
    },
}

/// A selectable choice rendered as one button.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub action: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// Outbound response unit. A single engine step may produce several.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outgoing {
    /// Plain text, optionally with a choice list attached.
    Message {
        text: String,
        choices: Vec<Choice>,
    },
    /// A generated file handed to the user.
    Document {
        name: String,
        content: String,
        caption: Option<String>,
    },
}

impl Outgoing {
    pub fn text(text: impl Into<String>) -> Self {
        Outgoing::Message {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    pub fn with_choices(text: impl Into<String>, choices: Vec<Choice>) -> Self {
        Outgoing::Message {
            text: text.into(),
            choices,
        }
    }
}
