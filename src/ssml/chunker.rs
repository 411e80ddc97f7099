//! SSML chunking for synthesis requests.
//!
//! Splits a flat sequence of top-level elements into self-contained `<speak>`
//! fragments that fit within the API's character limit, without ever breaking
//! a tag and without losing the active voice context at a split point.

use super::parser::{SsmlError, parse_fragment};
use super::{Element, VOICE_TAG};

/// Default fragment size in characters. The API limit is 5000, so 4500 leaves
/// a safe margin.
pub const DEFAULT_CHUNK_SIZE: usize = 4500;

/// Hard API limit on request size in characters.
pub const MAX_CHUNK_SIZE: usize = 5000;

/// Split a sequence of sibling elements into serialized `<speak>` fragments of
/// at most `limit` characters.
///
/// The limit is best-effort: a single element whose serialized form alone
/// exceeds `limit` still becomes its own fragment, because elements are never
/// split mid-tag. Fragments are emitted in input order, and the visible text
/// of all fragments concatenated equals the visible text of the input.
///
/// When a split falls inside an active voice context, the sealed fragment is
/// wrapped in a synthetic `<voice>` element naming that context, so a chunk
/// boundary never silently falls back to the default voice.
pub fn chunk_nodes(nodes: &[Element], limit: usize) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut pending: Vec<Element> = Vec::new();
    let mut pending_chars = 0usize;
    let mut current_voice: Option<String> = None;

    for node in nodes {
        if node.tag == VOICE_TAG {
            current_voice = node.attr("name").map(str::to_owned);
        }

        let node_chars = node.to_ssml().chars().count();

        if !pending.is_empty() && pending_chars + node_chars > limit {
            fragments.push(seal_fragment(
                std::mem::take(&mut pending),
                current_voice.as_deref(),
            ));
            pending_chars = 0;
        }

        // The node is appended even when it is oversized on its own.
        pending.push(node.clone());
        pending_chars += node_chars;
    }

    if !pending.is_empty() {
        fragments.push(seal_fragment(pending, current_voice.as_deref()));
    }

    fragments
}

/// Parse an SSML document or fragment and chunk it.
///
/// Fails fast on malformed markup; the chunker itself trusts parsed input.
pub fn chunk_document(ssml: &str, limit: usize) -> Result<Vec<String>, SsmlError> {
    let nodes = parse_fragment(ssml)?;
    Ok(chunk_nodes(&nodes, limit))
}

/// Wrap pending elements in a `<speak>` root, adding a voice wrapper when the
/// fragment would otherwise lose its enclosing voice context.
fn seal_fragment(nodes: Vec<Element>, current_voice: Option<&str>) -> String {
    let mut speak = Element::new("speak");
    match current_voice {
        Some(voice) if nodes[0].tag != VOICE_TAG => {
            let mut wrapper = Element::new(VOICE_TAG);
            wrapper.set_attr("name", voice);
            wrapper.children = nodes;
            speak.children.push(wrapper);
        }
        _ => speak.children = nodes,
    }
    speak.to_ssml()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sentence(text: &str) -> Element {
        let mut el = Element::new("s");
        el.text = text.to_string();
        el
    }

    /// An `<s>` element whose serialized form is exactly `serialized_len`
    /// characters long.
    fn sized_sentence(serialized_len: usize) -> Element {
        assert!(serialized_len > 7); // <s></s>
        sentence(&"x".repeat(serialized_len - 7))
    }

    fn voice(name: &str, children: Vec<Element>) -> Element {
        let mut el = Element::new(VOICE_TAG);
        el.set_attr("name", name);
        el.children = children;
        el
    }

    #[test]
    fn test_short_input_single_fragment() {
        let nodes = vec![sentence("Hello."), sentence("World.")];
        let fragments = chunk_nodes(&nodes, 4500);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0], "<speak><s>Hello.</s><s>World.</s></speak>");
    }

    #[test]
    fn test_three_equal_nodes_split_after_two() {
        // Three 2000-char nodes at limit 4500: nodes 1-2 fit (4000), node 3
        // starts the second fragment.
        let nodes = vec![
            sized_sentence(2000),
            sized_sentence(2000),
            sized_sentence(2000),
        ];
        let fragments = chunk_nodes(&nodes, 4500);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].matches("<s>").count(), 2);
        assert_eq!(fragments[1].matches("<s>").count(), 1);
    }

    #[test]
    fn test_oversized_node_gets_own_fragment() {
        let nodes = vec![sentence("small"), sized_sentence(300), sentence("small")];
        let fragments = chunk_nodes(&nodes, 100);
        assert_eq!(fragments.len(), 3);
        assert!(fragments[1].chars().count() > 100);
    }

    #[test]
    fn test_voice_continuity_across_split() {
        let nodes = vec![
            voice("en-US-Wavenet-D", vec![sized_sentence(80)]),
            sized_sentence(80),
        ];
        let fragments = chunk_nodes(&nodes, 100);
        assert_eq!(fragments.len(), 2);
        // First fragment already starts with a voice element.
        assert!(fragments[0].starts_with("<speak><voice name=\"en-US-Wavenet-D\">"));
        // Second fragment got a synthetic wrapper for the same voice.
        assert!(fragments[1].starts_with("<speak><voice name=\"en-US-Wavenet-D\">"));
        assert!(fragments[1].ends_with("</voice></speak>"));
    }

    #[test]
    fn test_no_wrapper_without_voice_context() {
        let nodes = vec![sized_sentence(80), sized_sentence(80)];
        let fragments = chunk_nodes(&nodes, 100);
        assert_eq!(fragments.len(), 2);
        assert!(!fragments[0].contains("<voice"));
        assert!(!fragments[1].contains("<voice"));
    }

    #[test]
    fn test_voice_context_updates_to_latest() {
        let nodes = vec![
            voice("narrator", vec![sized_sentence(40)]),
            voice("character", vec![sized_sentence(40)]),
            sized_sentence(80),
        ];
        let fragments = chunk_nodes(&nodes, 120);
        let last = fragments.last().unwrap();
        assert!(last.contains("voice name=\"character\""));
        assert!(!last.contains("narrator"));
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_nodes(&[], 4500).is_empty());
    }

    #[test]
    fn test_fragments_parse_independently() {
        let nodes = vec![
            voice("a", vec![sentence("One."), sentence("Two.")]),
            voice("b", vec![sentence("Three.")]),
        ];
        for fragment in chunk_nodes(&nodes, 40) {
            assert!(parse_fragment(&fragment).is_ok(), "bad fragment: {fragment}");
        }
    }

    #[test]
    fn test_chunk_document_strips_speak() {
        let doc = "<speak><s>One.</s><s>Two.</s></speak>";
        let fragments = chunk_document(doc, 4500).unwrap();
        assert_eq!(fragments, vec!["<speak><s>One.</s><s>Two.</s></speak>"]);
    }

    #[test]
    fn test_chunk_document_rejects_malformed() {
        assert!(chunk_document("<speak><s>One.</speak>", 4500).is_err());
    }

    #[test]
    fn test_tail_text_travels_with_node() {
        let mut s = sentence("Hello.");
        s.tail = " and then".to_string();
        let fragments = chunk_nodes(&[s, sentence("Bye.")], 25);
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].contains("Hello.</s> and then"));
    }

    proptest! {
        /// Concatenating the visible text of all fragments reproduces the
        /// visible text of the input, for any limit >= 1.
        #[test]
        fn prop_visible_text_preserved(
            texts in proptest::collection::vec("[a-zA-Z ]{0,40}", 0..12),
            limit in 1usize..200,
        ) {
            let nodes: Vec<Element> = texts.iter().map(|t| sentence(t)).collect();
            let expected: String = texts.concat();

            let mut actual = String::new();
            for fragment in chunk_nodes(&nodes, limit) {
                let parsed = parse_fragment(&fragment).unwrap();
                for node in parsed {
                    actual.push_str(&node.visible_text());
                    actual.push_str(&node.tail);
                }
            }
            prop_assert_eq!(actual, expected);
        }

        /// Every fragment's content stays within the limit unless it holds a
        /// single oversized node.
        #[test]
        fn prop_size_bound_best_effort(
            sizes in proptest::collection::vec(8usize..120, 1..12),
            limit in 20usize..200,
        ) {
            let nodes: Vec<Element> = sizes.iter().map(|&n| sized_sentence(n)).collect();
            for fragment in chunk_nodes(&nodes, limit) {
                let parsed = parse_fragment(&fragment).unwrap();
                let content_chars: usize = parsed
                    .iter()
                    .map(|n| n.to_ssml().chars().count())
                    .sum();
                if content_chars > limit {
                    prop_assert_eq!(parsed.len(), 1);
                }
            }
        }

        /// No node is dropped or duplicated, and order is preserved.
        #[test]
        fn prop_node_count_preserved(
            count in 0usize..15,
            limit in 1usize..100,
        ) {
            let nodes: Vec<Element> = (0..count)
                .map(|i| sentence(&format!("n{i}")))
                .collect();
            let mut seen = Vec::new();
            for fragment in chunk_nodes(&nodes, limit) {
                for node in parse_fragment(&fragment).unwrap() {
                    seen.push(node.visible_text());
                }
            }
            let expected: Vec<String> = (0..count).map(|i| format!("n{i}")).collect();
            prop_assert_eq!(seen, expected);
        }
    }
}
