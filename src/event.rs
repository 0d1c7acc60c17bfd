// Event model for the output adapter
//
// DESIGN: An event is an ordered map of field name -> JSON value, exactly
// as the host pipeline hands it over. Field order is preserved (IndexMap)
// so JSON bodies come out in the order the event arrived in. The shutdown
// sentinel travels through the same channel as real events, so the type
// is an enum rather than a bare map.

use indexmap::IndexMap;
use serde_json::Value;

/// Ordered field map of one log record.
pub type Fields = IndexMap<String, Value>;

/// One unit flowing through the delivery channel.
#[derive(Debug, Clone)]
pub enum Event {
    /// A real log record.
    Record(Fields),
    /// Pipeline shutdown sentinel. No HTTP call is made for this.
    Shutdown,
}

impl Event {
    /// Parse one newline-delimited JSON line into an event.
    /// Only JSON objects are accepted; anything else is a parse error.
    pub fn from_json_line(line: &str) -> anyhow::Result<Self> {
        let fields: Fields = serde_json::from_str(line)?;
        Ok(Event::Record(fields))
    }

    /// Look up a field value, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Event::Record(fields) => fields.get(name),
            Event::Shutdown => None,
        }
    }
}

/// Render a field value for template expansion and form bodies:
/// strings bare (no surrounding quotes), everything else as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
