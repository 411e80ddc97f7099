//! SSML document model: an owned element tree with lead/tail text,
//! plus serialization back to markup.

pub mod chunker;
pub mod parser;

pub use parser::{SsmlError, parse_document, parse_fragment};

/// Reserved tag name for voice-context elements.
pub const VOICE_TAG: &str = "voice";

/// A single SSML element.
///
/// Text placement follows the usual element-tree convention: `text` is the
/// inline text immediately after the open tag, and each child's `tail` is the
/// inline text following that child's close tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Tag name (e.g. "voice", "s", "phoneme")
    pub tag: String,
    /// Attributes in document order
    pub attrs: Vec<(String, String)>,
    /// Inline text immediately after the open tag
    pub text: String,
    /// Child elements in document order
    pub children: Vec<Element>,
    /// Inline text following this element's close tag
    pub tail: String,
}

impl Element {
    /// Create an empty element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            tail: String::new(),
        }
    }

    /// Look up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value for the same name.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.attrs.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value;
        } else {
            self.attrs.push((name, value));
        }
    }

    /// Serialize this element (including its tail text) to SSML markup.
    pub fn to_ssml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        if self.text.is_empty() && self.children.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&escape_text(&self.text));
            for child in &self.children {
                child.write_into(out);
            }
            out.push_str("</");
            out.push_str(&self.tag);
            out.push('>');
        }
        out.push_str(&escape_text(&self.tail));
    }

    /// Concatenated visible text of this element's subtree, in reading order.
    /// Does not include this element's own tail.
    pub fn visible_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_text(out);
            out.push_str(&child.tail);
        }
    }
}

/// Escape markup delimiters for text content.
pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape markup delimiters for double-quoted attribute values.
pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_simple_element() {
        let mut el = Element::new("s");
        el.text = "Hello world.".to_string();
        assert_eq!(el.to_ssml(), "<s>Hello world.</s>");
    }

    #[test]
    fn test_serialize_self_closing() {
        let mut el = Element::new("break");
        el.set_attr("time", "500ms");
        assert_eq!(el.to_ssml(), "<break time=\"500ms\"/>");
    }

    #[test]
    fn test_serialize_nested_with_tail() {
        let mut voice = Element::new("voice");
        voice.set_attr("name", "en-US-Wavenet-D");
        let mut s = Element::new("s");
        s.text = "First.".to_string();
        s.tail = " And then.".to_string();
        voice.children.push(s);
        assert_eq!(
            voice.to_ssml(),
            "<voice name=\"en-US-Wavenet-D\"><s>First.</s> And then.</voice>"
        );
    }

    #[test]
    fn test_serialize_escapes_delimiters() {
        let mut el = Element::new("s");
        el.text = "Tom & Jerry < friends".to_string();
        assert_eq!(el.to_ssml(), "<s>Tom &amp; Jerry &lt; friends</s>");

        let mut sub = Element::new("sub");
        sub.set_attr("alias", "\"quoted\" & more");
        sub.text = "x".to_string();
        assert_eq!(
            sub.to_ssml(),
            "<sub alias=\"&quot;quoted&quot; &amp; more\">x</sub>"
        );
    }

    #[test]
    fn test_set_attr_replaces() {
        let mut el = Element::new("voice");
        el.set_attr("name", "a");
        el.set_attr("name", "b");
        assert_eq!(el.attrs.len(), 1);
        assert_eq!(el.attr("name"), Some("b"));
    }

    #[test]
    fn test_visible_text() {
        let mut voice = Element::new("voice");
        voice.text = "lead ".to_string();
        let mut s = Element::new("s");
        s.text = "inner".to_string();
        s.tail = " tail".to_string();
        voice.children.push(s);
        assert_eq!(voice.visible_text(), "lead inner tail");
    }
}
