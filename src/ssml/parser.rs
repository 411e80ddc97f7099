//! SSML parsing built on quick-xml's event reader.
//!
//! Parsing is fail-fast: malformed nesting aborts the whole operation before
//! any chunking or annotation happens.

use super::Element;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SsmlError {
    #[error("malformed SSML: {0}")]
    Parse(String),

    #[error("text outside of any element at document top level")]
    TopLevelText,

    #[error("expected a single root element")]
    MissingRoot,
}

/// Parse a complete SSML document with a single root element (usually
/// `<speak>`). Whitespace around the root is tolerated; any other top-level
/// content is an error.
pub fn parse_document(input: &str) -> Result<Element, SsmlError> {
    let top = parse_top_level(input)?;
    let mut nodes = top.children;
    if nodes.len() != 1 {
        return Err(SsmlError::MissingRoot);
    }
    let mut root = nodes.remove(0);
    if !root.tail.trim().is_empty() {
        return Err(SsmlError::TopLevelText);
    }
    root.tail.clear();
    Ok(root)
}

/// Parse an SSML fragment into its sequence of top-level elements.
///
/// Accepts either a bare fragment (`<voice>...</voice><s>...</s>`) or a full
/// document wrapped in `<speak>`, which is unwrapped to its children.
pub fn parse_fragment(input: &str) -> Result<Vec<Element>, SsmlError> {
    let top = parse_top_level(input)?;
    let mut nodes = top.children;
    if nodes.len() == 1 && nodes[0].tag == "speak" {
        let speak = nodes.remove(0);
        if !speak.text.trim().is_empty() {
            return Err(SsmlError::TopLevelText);
        }
        return Ok(speak.children);
    }
    Ok(nodes)
}

/// Parse the input into a synthetic top-level container holding every
/// top-level element. Declarations, comments, and processing instructions
/// carry no speech content and are dropped.
fn parse_top_level(input: &str) -> Result<Element, SsmlError> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<Element> = vec![Element::new("")];

    loop {
        match reader.read_event() {
            Err(e) => return Err(SsmlError::Parse(e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(start)) => {
                stack.push(element_from_start(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let el = element_from_start(&start)?;
                attach_child(&mut stack, el)?;
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(SsmlError::Parse("unexpected closing tag".to_string()));
                }
                let el = stack.pop().ok_or_else(|| {
                    SsmlError::Parse("unexpected closing tag".to_string())
                })?;
                attach_child(&mut stack, el)?;
            }
            Ok(Event::Text(text)) => {
                let unescaped = text
                    .unescape()
                    .map_err(|e| SsmlError::Parse(e.to_string()))?;
                append_text(&mut stack, &unescaped)?;
            }
            Ok(Event::CData(data)) => {
                let raw = String::from_utf8_lossy(&data).into_owned();
                append_text(&mut stack, &raw)?;
            }
            Ok(_) => {}
        }
    }

    if stack.len() != 1 {
        return Err(SsmlError::Parse("unclosed element at end of input".to_string()));
    }
    let top = stack.remove(0);
    if !top.text.trim().is_empty() {
        return Err(SsmlError::TopLevelText);
    }
    Ok(top)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, SsmlError> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| SsmlError::Parse(e.to_string()))?
        .to_string();
    let mut element = Element::new(tag);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| SsmlError::Parse(e.to_string()))?;
        let name = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| SsmlError::Parse(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| SsmlError::Parse(e.to_string()))?
            .into_owned();
        element.attrs.push((name, value));
    }
    Ok(element)
}

fn attach_child(stack: &mut [Element], child: Element) -> Result<(), SsmlError> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| SsmlError::Parse("unexpected closing tag".to_string()))?;
    parent.children.push(child);
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) -> Result<(), SsmlError> {
    let current = stack
        .last_mut()
        .ok_or_else(|| SsmlError::Parse("text outside of document".to_string()))?;
    match current.children.last_mut() {
        Some(last_child) => last_child.tail.push_str(text),
        None => current.text.push_str(text),
    }
    Ok(())
}
