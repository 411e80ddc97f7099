//! Speech synthesis backend trait and types.

pub mod google;
pub mod mock;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error(
        "API key not found. Set the GOOGLE_TTS_API_KEY environment variable or run `narrate config set-key`."
    )]
    MissingApiKey,

    #[error("Rate limit exceeded{}", .retry_after.map(|s| format!(". Retry after {} seconds", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("API error{}: {message}", .status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("invalid audio payload: {0}")]
    InvalidPayload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TtsError>;

/// Gender hint passed to the API alongside a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SsmlGender {
    #[default]
    Neutral,
    Male,
    Female,
}

impl SsmlGender {
    pub fn as_str(&self) -> &'static str {
        match self {
            SsmlGender::Neutral => "NEUTRAL",
            SsmlGender::Male => "MALE",
            SsmlGender::Female => "FEMALE",
        }
    }
}

/// Fallback voice selection for a synthesis request.
///
/// The API requires a voice even when the SSML carries its own voice tags;
/// this selection only applies to content outside any voice context.
#[derive(Debug, Clone)]
pub struct VoiceSelection {
    /// BCP-47 language code, e.g. "en-US"
    pub language_code: String,
    /// Specific voice name, e.g. "en-US-Wavenet-D"
    pub name: Option<String>,
    /// Gender hint when no name is given
    pub gender: SsmlGender,
}

impl Default for VoiceSelection {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            name: None,
            gender: SsmlGender::Neutral,
        }
    }
}

impl VoiceSelection {
    pub fn for_language(language_code: impl Into<String>) -> Self {
        Self {
            language_code: language_code.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Speech synthesis backend - returns encoded MP3 payloads.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize one SSML fragment into an encoded audio payload.
    async fn synthesize_ssml(&self, ssml: &str, voice: &VoiceSelection) -> Result<Vec<u8>>;

    /// Synthesize plain text into an encoded audio payload.
    async fn synthesize_text(&self, text: &str, voice: &VoiceSelection) -> Result<Vec<u8>>;

    /// Backend name for display.
    fn name(&self) -> &'static str;
}

/// Retry a fragment synthesis on transient failures (rate limits and server
/// errors), pausing between attempts. A rate limit waits out the
/// server-requested `Retry-After` interval; other transient errors back off
/// exponentially. Non-transient errors are returned immediately.
pub async fn synthesize_with_retry(
    synthesizer: &dyn Synthesizer,
    ssml: &str,
    voice: &VoiceSelection,
    max_retries: u32,
) -> Result<Vec<u8>> {
    let mut last_error = None;

    for attempt in 0..max_retries {
        match synthesizer.synthesize_ssml(ssml, voice).await {
            Ok(payload) => return Ok(payload),
            Err(e) if is_transient(&e) => {
                log::warn!(
                    "synthesis failed (attempt {}/{}): {}",
                    attempt + 1,
                    max_retries,
                    e
                );
                if attempt + 1 < max_retries {
                    tokio::time::sleep(retry_delay(&e, attempt)).await;
                }
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or(TtsError::ApiError {
        message: "all retry attempts failed".to_string(),
        status_code: None,
    }))
}

fn retry_delay(error: &TtsError, attempt: u32) -> Duration {
    match error {
        TtsError::RateLimited {
            retry_after: Some(secs),
        } => Duration::from_secs(*secs),
        _ => Duration::from_millis(500 * 2u64.pow(attempt)),
    }
}

fn is_transient(error: &TtsError) -> bool {
    match error {
        TtsError::RateLimited { .. } => true,
        TtsError::ApiError {
            status_code: Some(code),
            ..
        } => *code >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock::MockSynthesizer;

    #[test]
    fn test_voice_selection_default() {
        let voice = VoiceSelection::default();
        assert_eq!(voice.language_code, "en-US");
        assert!(voice.name.is_none());
        assert_eq!(voice.gender, SsmlGender::Neutral);
    }

    #[test]
    fn test_voice_selection_builder() {
        let voice = VoiceSelection::for_language("en-GB").with_name("en-GB-News-G");
        assert_eq!(voice.language_code, "en-GB");
        assert_eq!(voice.name.as_deref(), Some("en-GB-News-G"));
    }

    #[test]
    fn test_gender_wire_values() {
        assert_eq!(SsmlGender::Neutral.as_str(), "NEUTRAL");
        assert_eq!(SsmlGender::Male.as_str(), "MALE");
        assert_eq!(SsmlGender::Female.as_str(), "FEMALE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_errors() {
        let synth = MockSynthesizer::fails_then_succeeds(
            2,
            TtsError::ApiError {
                message: "backend unavailable".to_string(),
                status_code: Some(503),
            },
            b"mp3".to_vec(),
        );
        let voice = VoiceSelection::default();
        let payload = synthesize_with_retry(&synth, "<speak/>", &voice, 3)
            .await
            .unwrap();
        assert_eq!(payload, b"mp3");
        assert_eq!(synth.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let synth = MockSynthesizer::always_fails(TtsError::RateLimited { retry_after: None });
        let voice = VoiceSelection::default();
        let result = synthesize_with_retry(&synth, "<speak/>", &voice, 3).await;
        assert!(matches!(result, Err(TtsError::RateLimited { .. })));
        assert_eq!(synth.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_for_server_requested_pause() {
        let synth = MockSynthesizer::fails_then_succeeds(
            1,
            TtsError::RateLimited {
                retry_after: Some(5),
            },
            b"mp3".to_vec(),
        );
        let voice = VoiceSelection::default();
        let start = tokio::time::Instant::now();
        let payload = synthesize_with_retry(&synth, "<speak/>", &voice, 3)
            .await
            .unwrap();
        assert_eq!(payload, b"mp3");
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(synth.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_back_off_exponentially() {
        let synth = MockSynthesizer::fails_then_succeeds(
            2,
            TtsError::ApiError {
                message: "backend unavailable".to_string(),
                status_code: Some(500),
            },
            b"mp3".to_vec(),
        );
        let voice = VoiceSelection::default();
        let start = tokio::time::Instant::now();
        synthesize_with_retry(&synth, "<speak/>", &voice, 3)
            .await
            .unwrap();
        // 500ms after the first failure, 1000ms after the second.
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_fatal_errors() {
        let synth = MockSynthesizer::always_fails(TtsError::ApiError {
            message: "invalid SSML".to_string(),
            status_code: Some(400),
        });
        let voice = VoiceSelection::default();
        let result = synthesize_with_retry(&synth, "<speak/>", &voice, 3).await;
        assert!(result.is_err());
        assert_eq!(synth.call_count(), 1);
    }
}
