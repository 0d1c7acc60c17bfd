// %{field} template expansion
//
// Config strings (key, url, message, mapping values) may embed %{name}
// placeholders that are resolved against the current event at send time.
//
// DESIGN CHOICE: Missing fields expand to the empty string. The adapter
// must never fail an event over a template typo; a hole in the output is
// visible enough.

use crate::event::{value_to_string, Event};

/// Expand every `%{name}` placeholder in `template` against the event's
/// fields. An unterminated `%{` is emitted literally.
pub fn expand(template: &str, event: &Event) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                if let Some(value) = event.field(name) {
                    out.push_str(&value_to_string(value));
                }
                rest = &after[end + 1..];
            }
            None => {
                // No closing brace: keep the tail as-is
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}
