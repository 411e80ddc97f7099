//! Voice catalog, voice-name remapping, and sample generation.

use crate::tts::{Synthesizer, VoiceSelection};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// A catalog entry for an SSML-capable voice.
#[derive(Debug, Clone, Copy)]
pub struct VoiceInfo {
    pub name: &'static str,
    pub gender: &'static str,
    pub family: &'static str,
    /// Voices that work best for audiobook narration.
    pub recommended: bool,
}

/// Voices known to accept `<voice>` tags in SSML input.
pub const VOICE_CATALOG: &[VoiceInfo] = &[
    // US News
    VoiceInfo { name: "en-US-News-K", gender: "FEMALE", family: "US News", recommended: false },
    VoiceInfo { name: "en-US-News-L", gender: "FEMALE", family: "US News", recommended: true },
    VoiceInfo { name: "en-US-News-N", gender: "MALE", family: "US News", recommended: true },
    // US Wavenet
    VoiceInfo { name: "en-US-Wavenet-A", gender: "MALE", family: "US Wavenet", recommended: false },
    VoiceInfo { name: "en-US-Wavenet-B", gender: "MALE", family: "US Wavenet", recommended: false },
    VoiceInfo { name: "en-US-Wavenet-C", gender: "FEMALE", family: "US Wavenet", recommended: false },
    VoiceInfo { name: "en-US-Wavenet-D", gender: "MALE", family: "US Wavenet", recommended: true },
    VoiceInfo { name: "en-US-Wavenet-E", gender: "FEMALE", family: "US Wavenet", recommended: false },
    VoiceInfo { name: "en-US-Wavenet-F", gender: "FEMALE", family: "US Wavenet", recommended: true },
    VoiceInfo { name: "en-US-Wavenet-G", gender: "FEMALE", family: "US Wavenet", recommended: false },
    VoiceInfo { name: "en-US-Wavenet-H", gender: "FEMALE", family: "US Wavenet", recommended: false },
    VoiceInfo { name: "en-US-Wavenet-I", gender: "MALE", family: "US Wavenet", recommended: false },
    VoiceInfo { name: "en-US-Wavenet-J", gender: "MALE", family: "US Wavenet", recommended: false },
    // GB News
    VoiceInfo { name: "en-GB-News-G", gender: "FEMALE", family: "GB News", recommended: true },
    VoiceInfo { name: "en-GB-News-H", gender: "FEMALE", family: "GB News", recommended: false },
    VoiceInfo { name: "en-GB-News-I", gender: "FEMALE", family: "GB News", recommended: false },
    VoiceInfo { name: "en-GB-News-J", gender: "MALE", family: "GB News", recommended: true },
    VoiceInfo { name: "en-GB-News-K", gender: "MALE", family: "GB News", recommended: false },
    VoiceInfo { name: "en-GB-News-L", gender: "MALE", family: "GB News", recommended: false },
    VoiceInfo { name: "en-GB-News-M", gender: "MALE", family: "GB News", recommended: false },
    // GB Wavenet
    VoiceInfo { name: "en-GB-Wavenet-A", gender: "FEMALE", family: "GB Wavenet", recommended: true },
    VoiceInfo { name: "en-GB-Wavenet-B", gender: "MALE", family: "GB Wavenet", recommended: false },
    VoiceInfo { name: "en-GB-Wavenet-C", gender: "FEMALE", family: "GB Wavenet", recommended: false },
    VoiceInfo { name: "en-GB-Wavenet-D", gender: "MALE", family: "GB Wavenet", recommended: true },
    VoiceInfo { name: "en-GB-Wavenet-F", gender: "FEMALE", family: "GB Wavenet", recommended: false },
    VoiceInfo { name: "en-GB-Wavenet-N", gender: "FEMALE", family: "GB Wavenet", recommended: false },
    VoiceInfo { name: "en-GB-Wavenet-O", gender: "MALE", family: "GB Wavenet", recommended: false },
];

/// The BCP-47 language code prefix of a voice name ("en-US-Wavenet-D" -> "en-US").
pub fn language_code_for(voice_name: &str) -> &str {
    voice_name.get(..5).unwrap_or("en-US")
}

/// One ordered old -> new voice substitution.
#[derive(Debug, Clone, Deserialize)]
pub struct RemapPair {
    pub old: String,
    pub new: String,
}

#[derive(Debug, Deserialize)]
struct RemapFile {
    remap: Vec<RemapPair>,
}

/// An ordered voice-name remapping table loaded from TOML:
///
/// ```toml
/// [[remap]]
/// old = "en-US-Wavenet-J"
/// new = "en-US-News-N"
/// ```
#[derive(Debug)]
pub struct VoiceRemap {
    pub pairs: Vec<RemapPair>,
}

impl VoiceRemap {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read remap file: {}", path.display()))?;
        let file: RemapFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse remap file: {}", path.display()))?;
        Ok(Self { pairs: file.remap })
    }
}

/// Rewrite `voice name="OLD"` attributes across an SSML document, applying
/// pairs in table order. Returns the rewritten content and the substitution
/// count per pair. Only voice-name attributes are touched; visible text that
/// happens to contain a voice name is left alone.
pub fn remap_voice_names(content: &str, remap: &VoiceRemap) -> (String, Vec<(String, String, usize)>) {
    let mut content = content.to_string();
    let mut report = Vec::with_capacity(remap.pairs.len());

    for pair in &remap.pairs {
        let old_pattern = format!("voice name=\"{}\"", pair.old);
        let new_pattern = format!("voice name=\"{}\"", pair.new);
        let count = content.matches(&old_pattern).count();
        if count > 0 {
            content = content.replace(&old_pattern, &new_pattern);
        }
        report.push((pair.old.clone(), pair.new.clone(), count));
    }

    (content, report)
}

/// Sample SSML showcasing prosody, emphasis, and breaks for a single voice.
pub fn sample_ssml(voice_name: &str) -> String {
    format!(
        "<speak>\
         <voice name=\"{voice_name}\">\
         <s>Hello, this is a sample of the <emphasis level=\"strong\">{voice_name}</emphasis> voice.</s>\
         <break time=\"500ms\"/>\
         <s>I can speak with <prosody rate=\"slow\">different speeds</prosody> and <prosody pitch=\"+2st\">different pitches</prosody>.</s>\
         <s>This voice is perfect for <emphasis level=\"moderate\">storytelling</emphasis> and narration.</s>\
         </voice>\
         </speak>"
    )
}

/// Generate a sample MP3 per catalog voice into `out_dir`.
///
/// A failure for one voice is reported and skipped; the loop continues.
/// Returns (generated, failed) counts.
pub async fn generate_samples(
    synthesizer: &dyn Synthesizer,
    out_dir: &Path,
    recommended_only: bool,
) -> Result<(usize, usize)> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut generated = 0;
    let mut failed = 0;

    for info in VOICE_CATALOG {
        if recommended_only && !info.recommended {
            continue;
        }

        let ssml = sample_ssml(info.name);
        let voice = VoiceSelection::for_language(language_code_for(info.name));

        match synthesizer.synthesize_ssml(&ssml, &voice).await {
            Ok(payload) => {
                let out_file = out_dir.join(format!("{}_{}.mp3", info.name, info.gender));
                std::fs::write(&out_file, payload)
                    .with_context(|| format!("Failed to write {}", out_file.display()))?;
                eprintln!("  {}: ok", info.name);
                generated += 1;
            }
            Err(e) => {
                eprintln!("  {}: FAILED - {}", info.name, e);
                failed += 1;
            }
        }
    }

    Ok((generated, failed))
}
