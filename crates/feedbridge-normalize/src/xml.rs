//! XML to canonical document conversion.
//!
//! - element nesting becomes key nesting
//! - text becomes a string value
//! - repeated sibling elements collect into an array
//! - attributes become keys on the element's object
//! - text next to attributes or child elements is stored under `content`
//! - empty elements become `""`
//!
//! No schema validation is done: any well-formed document converts.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use crate::NormalizeError;

/// Key for element text that sits next to attributes or children.
pub const CONTENT_KEY: &str = "content";

struct Frame {
    name: String,
    map: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, NormalizeError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
        let mut map = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| NormalizeError::Xml(format!("<{name}>: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| NormalizeError::Xml(format!("<{name}> @{key}: {e}")))?
                .to_string();
            insert(&mut map, key, Value::String(value));
        }
        Ok(Self {
            name,
            map,
            text: String::new(),
        })
    }

    /// Text pieces are joined before trimming, so whitespace between two
    /// pieces split by a comment or child element survives.
    fn finish(mut self) -> (String, Value) {
        let text = self.text.trim();
        let value = if self.map.is_empty() {
            Value::String(text.to_string())
        } else {
            if !text.is_empty() {
                insert(&mut self.map, CONTENT_KEY.to_string(), Value::String(text.to_string()));
            }
            Value::Object(self.map)
        };
        (self.name, value)
    }
}

/// Insert `value` under `key`, turning repeated keys into an array.
fn insert(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

/// Convert an XML payload into a JSON object keyed by top-level element names.
pub fn xml_to_value(xml: &str) -> Result<Value, NormalizeError> {
    let mut reader = Reader::from_str(xml);

    let mut root = Map::new();
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(Frame::open(&e)?),
            Ok(Event::Empty(e)) => {
                let (name, value) = Frame::open(&e)?.finish();
                attach(&mut stack, &mut root, name, value);
            }
            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| NormalizeError::Xml("closing tag without opening tag".into()))?;
                let (name, value) = frame.finish();
                attach(&mut stack, &mut root, name, value);
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| NormalizeError::Xml(format!("text: {e}")))?;
                push_text(&mut stack, &text)?;
            }
            Ok(Event::CData(e)) => {
                let raw = e.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&raw))?;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(NormalizeError::Xml(format!(
                    "at byte {}: {e}",
                    reader.error_position()
                )));
            }
            // Declarations, comments, processing instructions, doctype.
            Ok(_) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(NormalizeError::Xml(format!(
            "unclosed element <{}>",
            open.name
        )));
    }
    Ok(Value::Object(root))
}

fn attach(stack: &mut [Frame], root: &mut Map<String, Value>, name: String, value: Value) {
    match stack.last_mut() {
        Some(parent) => insert(&mut parent.map, name, value),
        None => insert(root, name, value),
    }
}

fn push_text(stack: &mut [Frame], text: &str) -> Result<(), NormalizeError> {
    match stack.last_mut() {
        Some(frame) => {
            frame.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(NormalizeError::Xml(format!(
            "text outside of any element: {:?}",
            text.trim()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_text_becomes_nested_keys() {
        assert_eq!(xml_to_value("<a><b>1</b></a>").unwrap(), json!({"a": {"b": "1"}}));
    }

    #[test]
    fn declaration_and_comments_ignored() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <!-- feed -->
            <vehicle><id>7</id><name>Bus 7</name></vehicle>"#;
        assert_eq!(
            xml_to_value(xml).unwrap(),
            json!({"vehicle": {"id": "7", "name": "Bus 7"}})
        );
    }

    #[test]
    fn text_split_by_comment_keeps_inner_spaces() {
        assert_eq!(
            xml_to_value("<a>hello <!--c--> world</a>").unwrap(),
            json!({"a": "hello  world"})
        );
        assert_eq!(
            xml_to_value("<a>\n  <b> padded </b>\n</a>").unwrap(),
            json!({"a": {"b": "padded"}})
        );
    }

    #[test]
    fn repeated_siblings_collect_into_array() {
        let xml = "<list><item>a</item><item>b</item><item>c</item></list>";
        assert_eq!(
            xml_to_value(xml).unwrap(),
            json!({"list": {"item": ["a", "b", "c"]}})
        );
    }

    #[test]
    fn attributes_and_content() {
        let xml = r#"<pos lat="1.5" lon="2">here</pos>"#;
        assert_eq!(
            xml_to_value(xml).unwrap(),
            json!({"pos": {"lat": "1.5", "lon": "2", "content": "here"}})
        );
    }

    #[test]
    fn empty_elements() {
        assert_eq!(
            xml_to_value("<r><a/><b></b><c x=\"1\"/></r>").unwrap(),
            json!({"r": {"a": "", "b": "", "c": {"x": "1"}}})
        );
    }

    #[test]
    fn entities_and_cdata_unescaped() {
        assert_eq!(
            xml_to_value("<r><a>x &amp; y</a><b><![CDATA[<raw>]]></b></r>").unwrap(),
            json!({"r": {"a": "x & y", "b": "<raw>"}})
        );
    }

    #[test]
    fn mismatched_tags_rejected() {
        assert!(matches!(
            xml_to_value("<a><b>1</a></b>"),
            Err(NormalizeError::Xml(_))
        ));
    }

    #[test]
    fn unclosed_element_rejected() {
        let err = xml_to_value("<a><b>1</b>").unwrap_err();
        assert!(err.to_string().contains("<a>"), "{err}");
    }

    #[test]
    fn stray_text_rejected() {
        assert!(matches!(
            xml_to_value("not xml at all"),
            Err(NormalizeError::Xml(_))
        ));
    }

    #[test]
    fn arbitrary_input_never_panics() {
        let inputs = [
            "",
            "<",
            "<<<>>>",
            "</a>",
            "<a x=>",
            "<a>\u{0}</a>",
            &"<a>".repeat(1000),
        ];
        for input in inputs {
            let _ = xml_to_value(input);
        }
    }
}
