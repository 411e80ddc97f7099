//! Mock synthesizer for testing retry behavior and the synthesis pipeline
//! without network access.

use super::{Result, Synthesizer, TtsError, VoiceSelection};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A configurable mock backend: fails a set number of times, then returns a
/// fixed payload. Records every request for assertions.
pub struct MockSynthesizer {
    /// Number of times to fail before succeeding (0 = always succeed)
    fail_count: AtomicUsize,
    /// Current call count
    call_count: AtomicUsize,
    /// Error to return on failure
    fail_with: Mutex<Option<TtsError>>,
    /// Payload returned on success
    payload: Vec<u8>,
    /// Inputs received, in call order
    requests: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    /// A backend that always succeeds with the given payload.
    pub fn always_succeeds(payload: Vec<u8>) -> Self {
        Self {
            fail_count: AtomicUsize::new(0),
            call_count: AtomicUsize::new(0),
            fail_with: Mutex::new(None),
            payload,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A backend that fails `n` times with the given error, then succeeds.
    pub fn fails_then_succeeds(n: usize, error: TtsError, payload: Vec<u8>) -> Self {
        Self {
            fail_count: AtomicUsize::new(n),
            call_count: AtomicUsize::new(0),
            fail_with: Mutex::new(Some(error)),
            payload,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A backend that always fails with the given error.
    pub fn always_fails(error: TtsError) -> Self {
        Self {
            fail_count: AtomicUsize::new(usize::MAX),
            call_count: AtomicUsize::new(0),
            fail_with: Mutex::new(Some(error)),
            payload: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of times a synthesize method was called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The inputs received so far, in call order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, input: &str) -> Result<Vec<u8>> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(input.to_string());

        if call_num < self.fail_count.load(Ordering::SeqCst) {
            let error = self.fail_with.lock().unwrap();
            if let Some(err) = error.as_ref() {
                return Err(clone_error(err));
            }
        }

        Ok(self.payload.clone())
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize_ssml(&self, ssml: &str, _voice: &VoiceSelection) -> Result<Vec<u8>> {
        self.respond(ssml)
    }

    async fn synthesize_text(&self, text: &str, _voice: &VoiceSelection) -> Result<Vec<u8>> {
        self.respond(text)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Clone a TtsError (TtsError itself doesn't implement Clone because of the
/// IO variant).
fn clone_error(err: &TtsError) -> TtsError {
    match err {
        TtsError::MissingApiKey => TtsError::MissingApiKey,
        TtsError::RateLimited { retry_after } => TtsError::RateLimited {
            retry_after: *retry_after,
        },
        TtsError::ApiError {
            message,
            status_code,
        } => TtsError::ApiError {
            message: message.clone(),
            status_code: *status_code,
        },
        TtsError::InvalidPayload(s) => TtsError::InvalidPayload(s.clone()),
        TtsError::Io(_) => TtsError::ApiError {
            message: "IO error (mock)".to_string(),
            status_code: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_requests_in_order() {
        let synth = MockSynthesizer::always_succeeds(b"audio".to_vec());
        let voice = VoiceSelection::default();
        synth.synthesize_ssml("<speak>one</speak>", &voice).await.unwrap();
        synth.synthesize_ssml("<speak>two</speak>", &voice).await.unwrap();
        assert_eq!(
            synth.requests(),
            vec!["<speak>one</speak>", "<speak>two</speak>"]
        );
    }

    #[tokio::test]
    async fn test_fails_then_succeeds() {
        let synth = MockSynthesizer::fails_then_succeeds(
            1,
            TtsError::RateLimited { retry_after: Some(2) },
            b"audio".to_vec(),
        );
        let voice = VoiceSelection::default();
        assert!(synth.synthesize_ssml("<speak/>", &voice).await.is_err());
        let payload = synth.synthesize_ssml("<speak/>", &voice).await.unwrap();
        assert_eq!(payload, b"audio");
        assert_eq!(synth.call_count(), 2);
    }
}
