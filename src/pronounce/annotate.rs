//! Pronunciation annotation over SSML text buffers and trees.
//!
//! Each text buffer (an element's lead text or a child's tail) is rewritten
//! independently: dictionary entries are applied in row order, matches are
//! processed rightmost-first so earlier replacements never invalidate pending
//! offsets, and inserted annotations become protected spans so no region is
//! ever annotated twice.

use super::spans::{Span, SpanSet};
use super::{PhonemeFormat, PronunciationDictionary, PronunciationEntry};
use crate::ssml::parser::SsmlError;
use crate::ssml::{Element, parse_document};
use once_cell::sync::Lazy;
use regex::Regex;

/// Tags whose content is already a pronunciation annotation and must never be
/// re-matched or nested inside another annotation.
const PROTECTED_TAGS: &[&str] = &["phoneme", "sub"];

/// Matches a complete pre-existing annotation element in a raw text buffer.
static EXISTING_ANNOTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<phoneme[^>]*>.*?</phoneme>|<sub[^>]*>.*?</sub>")
        .expect("annotation pattern is valid")
});

/// Result of annotating one text buffer: the rewritten buffer plus the span
/// and parsed form of every annotation inserted by this run, sorted by start.
struct AnnotatedBuffer {
    buffer: String,
    inserted: Vec<(Span, Element)>,
}

/// Apply the dictionary to a single text buffer, returning the rewritten text
/// with annotation markup inserted inline.
///
/// Pre-existing `<phoneme>`/`<sub>` regions in the buffer are protected, so
/// running this twice with the same dictionary is a no-op on the second pass.
pub fn annotate_text(
    buffer: &str,
    dictionary: &PronunciationDictionary,
    format: PhonemeFormat,
) -> String {
    annotate_buffer(buffer, dictionary, format).buffer
}

fn annotate_buffer(
    text: &str,
    dictionary: &PronunciationDictionary,
    format: PhonemeFormat,
) -> AnnotatedBuffer {
    let mut buffer = text.to_string();
    let mut protected = SpanSet::new();
    let mut inserted: Vec<(Span, Element)> = Vec::new();

    for found in EXISTING_ANNOTATION.find_iter(&buffer) {
        protected.insert(Span::new(found.start(), found.end()));
    }

    for entry in dictionary.entries() {
        // No data for the requested format: the entry is inert and its
        // occurrences stay untouched and unprotected.
        if entry.value_for(format).is_none() {
            continue;
        }

        let pattern = whole_word_pattern(&entry.word);
        let matches: Vec<(usize, usize)> = pattern
            .find_iter(&buffer)
            .map(|m| (m.start(), m.end()))
            .collect();

        // Rightmost first, so earlier replacements never shift a match that
        // has not been processed yet.
        for &(start, end) in matches.iter().rev() {
            if protected.covers(start, end) {
                continue;
            }

            // Keep the matched occurrence's casing, not the dictionary key's.
            let matched = buffer[start..end].to_string();
            let element = annotation_element(entry, format, &matched);
            let markup = element.to_ssml();

            buffer.replace_range(start..end, &markup);

            let delta = markup.len() as isize - (end - start) as isize;
            protected.shift_after(start, delta);
            for (span, _) in &mut inserted {
                if span.start > start {
                    span.start = shift(span.start, delta);
                    span.end = shift(span.end, delta);
                }
            }

            let span = Span::new(start, start + markup.len());
            protected.insert(span);
            inserted.push((span, element));
        }
    }

    inserted.sort_by_key(|(span, _)| span.start);
    AnnotatedBuffer { buffer, inserted }
}

/// Apply the dictionary to every text buffer in the tree, splicing inserted
/// annotations back in as real child elements. Existing `<phoneme>`/`<sub>`
/// elements are skipped entirely, so annotation is idempotent.
pub fn annotate_tree(
    element: &mut Element,
    dictionary: &PronunciationDictionary,
    format: PhonemeFormat,
) {
    if PROTECTED_TAGS.contains(&element.tag.as_str()) {
        return;
    }

    let mut rebuilt: Vec<Element> = Vec::new();

    let lead = annotate_buffer(&element.text, dictionary, format);
    let (lead_text, lead_elements) = split_segments(lead);
    element.text = lead_text;
    rebuilt.extend(lead_elements);

    for mut child in std::mem::take(&mut element.children) {
        annotate_tree(&mut child, dictionary, format);

        let tail = annotate_buffer(&child.tail, dictionary, format);
        let (tail_text, tail_elements) = split_segments(tail);
        child.tail = tail_text;
        rebuilt.push(child);
        rebuilt.extend(tail_elements);
    }

    element.children = rebuilt;
}

/// Parse an SSML document, annotate it, and serialize it back.
pub fn annotate_document(
    ssml: &str,
    dictionary: &PronunciationDictionary,
    format: PhonemeFormat,
) -> Result<String, SsmlError> {
    let mut root = parse_document(ssml)?;
    annotate_tree(&mut root, dictionary, format);
    Ok(root.to_ssml())
}

/// Decompose an annotated buffer into the text before the first annotation
/// and the annotation elements, each carrying the following text as its tail.
fn split_segments(annotated: AnnotatedBuffer) -> (String, Vec<Element>) {
    let buffer = annotated.buffer;
    if annotated.inserted.is_empty() {
        return (buffer, Vec::new());
    }

    let lead = buffer[..annotated.inserted[0].0.start].to_string();
    let mut elements = Vec::with_capacity(annotated.inserted.len());
    let mut iter = annotated.inserted.into_iter().peekable();
    while let Some((span, mut element)) = iter.next() {
        let next_start = iter
            .peek()
            .map(|(next, _)| next.start)
            .unwrap_or(buffer.len());
        element.tail = buffer[span.end..next_start].to_string();
        elements.push(element);
    }
    (lead, elements)
}

fn whole_word_pattern(word: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word)))
        .expect("escaped word is a valid pattern")
}

fn annotation_element(
    entry: &PronunciationEntry,
    format: PhonemeFormat,
    matched: &str,
) -> Element {
    match format {
        PhonemeFormat::Ipa => {
            let ipa = entry.ipa.as_deref().unwrap_or_default();
            let mut el = Element::new("phoneme");
            el.set_attr("alphabet", "ipa");
            el.set_attr("ph", ipa);
            el.text = matched.to_string();
            el
        }
        PhonemeFormat::Alias => {
            let alias = entry.alias.as_deref().unwrap_or_default();
            let mut el = Element::new("sub");
            el.set_attr("alias", alias);
            el.text = matched.to_string();
            el
        }
    }
}

fn shift(value: usize, delta: isize) -> usize {
    if delta >= 0 {
        value + delta as usize
    } else {
        value - delta.unsigned_abs()
    }
}
