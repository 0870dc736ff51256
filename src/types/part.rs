use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Wire discriminator for message parts.
pub const PART_KIND_FIELD: &str = "part_kind";

/// Literal text content, used by both `text` and `user-prompt` parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPart {
    /// The text, rendered verbatim.
    pub content: String,
}

impl TextPart {
    /// Creates a new text part payload.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A request the agent issued to an external tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallPart {
    /// Name of the tool being called.
    pub tool_name: String,

    /// Arguments for the call.  Either structured, or a string of JSON text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,

    /// Identifier pairing this call with its return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ToolCallPart {
    /// Creates a tool call with the given name and arguments.
    pub fn new(tool_name: impl Into<String>, args: Option<Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            tool_call_id: None,
        }
    }

    /// Returns the arguments as a structured value.
    ///
    /// String arguments holding JSON text are decoded; any other string is
    /// returned as-is.
    pub fn structured_args(&self) -> Option<Value> {
        match &self.args {
            Some(Value::String(text)) => Some(
                serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.clone())),
            ),
            other => other.clone(),
        }
    }
}

/// The result a tool produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolReturnPart {
    /// Name of the tool that produced this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// The result, either a string or a structured value.
    #[serde(default)]
    pub content: Value,

    /// Identifier of the call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ToolReturnPart {
    /// Creates a tool return with the given content.
    pub fn new(content: Value) -> Self {
        Self {
            tool_name: None,
            content,
            tool_call_id: None,
        }
    }
}

/// A part whose kind this client does not recognize, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownPart {
    /// The entire part as it arrived on the wire.
    pub raw: Value,
}

impl UnknownPart {
    /// The `part_kind` of the raw value, if it carries a string one.
    pub fn kind(&self) -> Option<&str> {
        self.raw.get(PART_KIND_FIELD).and_then(Value::as_str)
    }
}

/// One element of a conversation turn.
///
/// The set of kinds is open: anything that is not one of the known variants,
/// or a known kind whose payload has an unexpected shape, lands in
/// [`Part::Unknown`] with its full raw value.  Deserializing a `Part` never
/// fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// `part_kind: "text"`
    Text(TextPart),

    /// `part_kind: "user-prompt"`
    UserPrompt(TextPart),

    /// `part_kind: "tool-call"`
    ToolCall(ToolCallPart),

    /// `part_kind: "tool-return"`
    ToolReturn(ToolReturnPart),

    /// Any other kind.
    Unknown(UnknownPart),
}

impl Part {
    /// Creates a text part.
    pub fn text(content: impl Into<String>) -> Self {
        Part::Text(TextPart::new(content))
    }

    /// Creates a user-prompt part.
    pub fn user_prompt(content: impl Into<String>) -> Self {
        Part::UserPrompt(TextPart::new(content))
    }

    /// Creates a tool-call part.
    pub fn tool_call(tool_name: impl Into<String>, args: Option<Value>) -> Self {
        Part::ToolCall(ToolCallPart::new(tool_name, args))
    }

    /// Creates a tool-return part.
    pub fn tool_return(content: Value) -> Self {
        Part::ToolReturn(ToolReturnPart::new(content))
    }

    /// Classifies a raw JSON value into a part.
    pub fn from_value(value: Value) -> Self {
        let parsed = match value.get(PART_KIND_FIELD).and_then(Value::as_str) {
            Some("text") => TextPart::deserialize(&value).ok().map(Part::Text),
            Some("user-prompt") => TextPart::deserialize(&value).ok().map(Part::UserPrompt),
            Some("tool-call") => ToolCallPart::deserialize(&value).ok().map(Part::ToolCall),
            Some("tool-return") => ToolReturnPart::deserialize(&value).ok().map(Part::ToolReturn),
            _ => None,
        };
        parsed.unwrap_or(Part::Unknown(UnknownPart { raw: value }))
    }

    /// Returns the wire value of this part.
    pub fn to_value(&self) -> Value {
        let (kind, payload) = match self {
            Part::Unknown(unknown) => return unknown.raw.clone(),
            Part::Text(part) => ("text", serde_json::to_value(part)),
            Part::UserPrompt(part) => ("user-prompt", serde_json::to_value(part)),
            Part::ToolCall(part) => ("tool-call", serde_json::to_value(part)),
            Part::ToolReturn(part) => ("tool-return", serde_json::to_value(part)),
        };
        let mut object = match payload {
            Ok(Value::Object(object)) => object,
            _ => Map::new(),
        };
        object.insert(PART_KIND_FIELD.to_string(), Value::String(kind.to_string()));
        Value::Object(object)
    }

    /// Returns the kind of this part, if it has one.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Part::Text(_) => Some("text"),
            Part::UserPrompt(_) => Some("user-prompt"),
            Part::ToolCall(_) => Some("tool-call"),
            Part::ToolReturn(_) => Some("tool-return"),
            Part::Unknown(unknown) => unknown.kind(),
        }
    }

    /// Returns true if this part was not recognized.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Part::Unknown(_))
    }

    /// Returns the literal text of a text or user-prompt part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(part) | Part::UserPrompt(part) => Some(&part.content),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Part::from_value)
    }
}

impl Serialize for Part {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}
