//! Wire envelope for call-machine protocol messages
//!
//! Every message exchanged between the host and the call machine travels as a
//! flat JSON object. The protocol fields sit next to the message-specific
//! payload fields:
//!
//! ```text
//! {
//!   "what": "iframe-call-message",     <- protocol marker
//!   "from": "module" | "embedded",     <- sender tag (echo suppression)
//!   "callFrameId": "...",              <- optional channel id
//!   "callbackStamp": "...",            <- optional correlation stamp
//!   "action": "join-meeting",          <- operation / event tag
//!   ...payload fields...
//! }
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ChannelError, ChannelResult};

/// Marker identifying protocol messages on a shared bus
pub const MESSAGE_MARKER: &str = "iframe-call-message";

/// Which side of the boundary sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderTag {
    /// The host application side
    Module,
    /// The call-machine side
    Embedded,
}

impl SenderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderTag::Module => "module",
            SenderTag::Embedded => "embedded",
        }
    }

    /// The tag of the other side of the boundary
    pub fn peer(&self) -> SenderTag {
        match self {
            SenderTag::Module => SenderTag::Embedded,
            SenderTag::Embedded => SenderTag::Module,
        }
    }
}

impl fmt::Display for SenderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one logical embedded call instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallFrameId(String);

impl CallFrameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random call frame id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallFrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallFrameId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CallFrameId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque id pairing a request with its eventual response
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackStamp(String);

impl CallbackStamp {
    pub fn new(stamp: impl Into<String>) -> Self {
        Self(stamp.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallbackStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A protocol message with the transport tags stripped
///
/// This is what callers hand to [`MessageChannel::send_to_peer`] and what
/// listeners receive. The callback stamp is kept so a responder can echo it
/// back on its reply.
///
/// [`MessageChannel::send_to_peer`]: crate::MessageChannel::send_to_peer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelMessage {
    pub action: String,
    pub callback_stamp: Option<CallbackStamp>,
    pub payload: Map<String, Value>,
}

impl ChannelMessage {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            callback_stamp: None,
            payload: Map::new(),
        }
    }

    /// Build a message whose payload fields come from a serializable struct
    pub fn from_payload<T: Serialize>(action: impl Into<String>, payload: &T) -> ChannelResult<Self> {
        let action = action.into();
        match serde_json::to_value(payload)? {
            Value::Object(map) => Ok(Self {
                action,
                callback_stamp: None,
                payload: map,
            }),
            Value::Null => Ok(Self::new(action)),
            _ => Err(ChannelError::PayloadNotAnObject { action }),
        }
    }

    /// Add a single payload field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Build the reply to this message, carrying the same callback stamp
    pub fn reply(&self, action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            callback_stamp: self.callback_stamp.clone(),
            payload: Map::new(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Decode one payload field into a typed value
    pub fn decode_field<T: DeserializeOwned>(&self, key: &str) -> ChannelResult<T> {
        let value = self
            .payload
            .get(key)
            .cloned()
            .ok_or_else(|| ChannelError::MissingField {
                action: self.action.clone(),
                field: key.to_string(),
            })?;
        Ok(serde_json::from_value(value)?)
    }

    /// Decode the whole payload into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> ChannelResult<T> {
        Ok(serde_json::from_value(Value::Object(self.payload.clone()))?)
    }
}

/// The sealed wire form of a [`ChannelMessage`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what: Option<String>,

    /// Kept as a plain string so unknown sender tags still parse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(rename = "callFrameId", default, skip_serializing_if = "Option::is_none")]
    pub call_frame_id: Option<CallFrameId>,

    #[serde(rename = "callbackStamp", default, skip_serializing_if = "Option::is_none")]
    pub callback_stamp: Option<CallbackStamp>,

    #[serde(default)]
    pub action: String,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Tag a message for transmission
    pub fn seal(message: ChannelMessage, from: SenderTag, call_frame_id: Option<&CallFrameId>) -> Self {
        Self {
            what: Some(MESSAGE_MARKER.to_string()),
            from: Some(from.as_str().to_string()),
            call_frame_id: call_frame_id.cloned(),
            callback_stamp: message.callback_stamp,
            action: message.action,
            payload: message.payload,
        }
    }

    /// Parse a raw bus value. Anything that isn't a JSON object with string
    /// tags yields `None`.
    pub fn open(raw: &Value) -> Option<Self> {
        if !raw.is_object() {
            return None;
        }
        serde_json::from_value(raw.clone()).ok()
    }

    pub fn has_marker(&self) -> bool {
        self.what.as_deref() == Some(MESSAGE_MARKER)
    }

    pub fn is_from(&self, tag: SenderTag) -> bool {
        self.from.as_deref() == Some(tag.as_str())
    }

    pub fn to_value(&self) -> Value {
        // Envelope only holds strings and JSON values, serialization can't fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Strip the transport tags
    pub fn into_message(self) -> ChannelMessage {
        ChannelMessage {
            action: self.action,
            callback_stamp: self.callback_stamp,
            payload: self.payload,
        }
    }
}
