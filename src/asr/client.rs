//! Unary transcription and bidirectional streaming recognition against the
//! upstream ASR service, wrapped in the Resilience Fabric.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::asr::pb::recognizer_client::RecognizerClient;
use crate::asr::pb::{
    self, stream_recognize_request, stream_recognize_response, TranscribeRequest,
};
use crate::asr::pool::AsrChannelPool;
use crate::error::Error;
use crate::resilience::{OperationKind, ResilienceFabric};

/// Audio encoding accepted by [`TranscribeParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    Linear16,
    Flac,
    Mulaw,
}

impl AudioEncoding {
    fn to_wire(self) -> pb::AudioEncoding {
        match self {
            AudioEncoding::Linear16 => pb::AudioEncoding::Linear16,
            AudioEncoding::Flac => pb::AudioEncoding::Flac,
            AudioEncoding::Mulaw => pb::AudioEncoding::Mulaw,
        }
    }
}

/// Parameters for a single unary [`AsrClient::transcribe`] call.
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    pub audio_bytes: Vec<u8>,
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub language: String,
    pub max_alternatives: u32,
    pub enable_punctuation: bool,
    pub enable_word_time_offsets: bool,
}

impl TranscribeParams {
    fn validate(&self) -> Result<(), Error> {
        if !(8000..=48000).contains(&self.sample_rate) {
            return Err(Error::ValidationError(format!(
                "sample_rate {} outside [8000, 48000]",
                self.sample_rate
            )));
        }
        if !(1..=10).contains(&self.max_alternatives) {
            return Err(Error::ValidationError(format!(
                "max_alternatives {} outside [1, 10]",
                self.max_alternatives
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WordTiming {
    pub word: String,
    pub start_ms: u32,
    pub end_ms: u32,
}

#[derive(Debug, Clone)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: f64,
}

/// Outcome of a unary transcription call.
#[derive(Debug, Clone)]
pub struct TranscribeResult {
    pub transcript: String,
    pub confidence: f64,
    pub words: Vec<WordTiming>,
    pub alternatives: Vec<Alternative>,
    pub language: String,
    pub processing_time_ms: u64,
}

/// A frame sent into [`AsrClient::stream_recognize`]. The first frame a
/// caller sends must be `Config`; anything else is a protocol error.
#[derive(Debug, Clone)]
pub enum AsrStreamFrame {
    Config {
        language: String,
        sample_rate: u32,
        interim_results: bool,
    },
    Audio(Vec<u8>),
    EndOfStream,
}

/// An event yielded from the upstream streaming-recognition response.
#[derive(Debug, Clone)]
pub enum AsrStreamEvent {
    Partial { transcript: String, confidence: f64, segment: u32 },
    Final { transcript: String, confidence: f64, segment: u32 },
}

/// Client half of the ASR Proxy: a channel pool plus the fabric that guards
/// every call made over it.
pub struct AsrClient {
    pool: Arc<AsrChannelPool>,
    fabric: Arc<ResilienceFabric>,
}

impl AsrClient {
    pub fn new(pool: Arc<AsrChannelPool>, fabric: Arc<ResilienceFabric>) -> Self {
        Self { pool, fabric }
    }

    pub fn is_healthy(&self) -> bool {
        self.pool.is_healthy()
    }

    /// Transcribe a complete utterance in one round trip.
    pub async fn transcribe(&self, params: TranscribeParams) -> Result<TranscribeResult, Error> {
        params.validate()?;

        let started = Instant::now();
        let pool = Arc::clone(&self.pool);
        let request = TranscribeRequest {
            audio_bytes: params.audio_bytes.clone(),
            encoding: params.encoding.to_wire() as i32,
            sample_rate: params.sample_rate,
            language: params.language.clone(),
            max_alternatives: params.max_alternatives,
            enable_punctuation: params.enable_punctuation,
            enable_word_time_offsets: params.enable_word_time_offsets,
        };

        let response = self
            .fabric
            .execute("asr", "transcribe", OperationKind::Rpc, true, || {
                let pool = Arc::clone(&pool);
                let request = request.clone();
                async move {
                    let (idx, channel) = pool.acquire();
                    let mut client = RecognizerClient::new(channel);
                    match client.transcribe(tonic::Request::new(request)).await {
                        Ok(resp) => Ok(resp.into_inner()),
                        Err(status) => {
                            pool.report_failure(idx);
                            Err(status_to_error(status))
                        }
                    }
                }
            })
            .await?;

        Ok(TranscribeResult {
            transcript: response.transcript,
            confidence: response.confidence,
            words: response
                .words
                .into_iter()
                .map(|w| WordTiming { word: w.word, start_ms: w.start_ms, end_ms: w.end_ms })
                .collect(),
            alternatives: response
                .alternatives
                .into_iter()
                .map(|a| Alternative { transcript: a.transcript, confidence: a.confidence })
                .collect(),
            language: response.language,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Open a bidirectional streaming-recognition call. `input` must yield a
    /// `Config` frame first; everything received before that is a protocol
    /// error and the call is never placed on the wire. Dropping `cancel`'s
    /// token stops the feeder task and aborts the upstream RPC on its next
    /// poll, within one heartbeat tick.
    pub async fn stream_recognize(
        &self,
        mut input: impl futures::Stream<Item = AsrStreamFrame> + Send + Unpin + 'static,
        cancel: CancellationToken,
    ) -> Result<impl futures::Stream<Item = Result<AsrStreamEvent, Error>>, Error> {
        use futures::StreamExt;

        let first = input
            .next()
            .await
            .ok_or_else(|| Error::ValidationError("empty recognition stream".into()))?;

        let AsrStreamFrame::Config { language, sample_rate, interim_results } = first else {
            return Err(Error::ValidationError(
                "first frame of a recognition stream must be Config".into(),
            ));
        };

        let (tx, rx) = mpsc::channel::<pb::StreamRecognizeRequest>(32);

        let config_frame = pb::StreamRecognizeRequest {
            frame: Some(stream_recognize_request::Frame::Config(pb::StreamConfig {
                language,
                sample_rate,
                interim_results,
            })),
        };
        if tx.send(config_frame).await.is_err() {
            return Err(Error::Internal("ASR feeder channel closed immediately".into()));
        }

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        break;
                    }
                    frame = input.next() => {
                        match frame {
                            Some(AsrStreamFrame::Audio(chunk)) => {
                                let frame = pb::StreamRecognizeRequest {
                                    frame: Some(stream_recognize_request::Frame::Audio(pb::AudioChunk { chunk })),
                                };
                                if tx.send(frame).await.is_err() {
                                    break;
                                }
                            }
                            Some(AsrStreamFrame::EndOfStream) | None => {
                                let frame = pb::StreamRecognizeRequest {
                                    frame: Some(stream_recognize_request::Frame::EndOfStream(true)),
                                };
                                let _ = tx.send(frame).await;
                                break;
                            }
                            Some(AsrStreamFrame::Config { .. }) => {
                                // a second Config frame mid-stream is ignored; the
                                // protocol only recognizes one at the start.
                            }
                        }
                    }
                }
            }
        });

        let (idx, channel) = self.pool.acquire();
        let mut client = RecognizerClient::new(channel);
        let outbound = ReceiverStream::new(rx);
        match client.stream_recognize(tonic::Request::new(outbound)).await {
            Ok(resp) => Ok(resp.into_inner().map(|item| match item {
                Ok(frame) => into_event(frame)
                    .ok_or_else(|| Error::Internal("recognition response had no frame set".into())),
                Err(status) => Err(status_to_error(status)),
            })),
            Err(status) => {
                self.pool.report_failure(idx);
                Err(status_to_error(status))
            }
        }
    }
}

/// Translate one response frame into the domain event type, preserving the
/// upstream's ordering guarantee (finals for segment `k` precede any frame
/// for `k + 1`) since this is a pure 1:1 mapping.
fn into_event(response: pb::StreamRecognizeResponse) -> Option<AsrStreamEvent> {
    match response.frame? {
        stream_recognize_response::Frame::Partial(alt) => Some(AsrStreamEvent::Partial {
            transcript: alt.transcript,
            confidence: alt.confidence,
            segment: response.segment,
        }),
        stream_recognize_response::Frame::FinalResult(alt) => Some(AsrStreamEvent::Final {
            transcript: alt.transcript,
            confidence: alt.confidence,
            segment: response.segment,
        }),
    }
}

fn status_to_error(status: tonic::Status) -> Error {
    use tonic::Code;
    match status.code() {
        Code::Unavailable | Code::ResourceExhausted | Code::Aborted | Code::Internal => {
            Error::transient(status.message().to_string())
        }
        Code::DeadlineExceeded => Error::Timeout,
        Code::InvalidArgument | Code::OutOfRange => {
            Error::ValidationError(status.message().to_string())
        }
        Code::Unauthenticated | Code::PermissionDenied => Error::Auth(status.message().to_string()),
        Code::NotFound => Error::NotFound(status.message().to_string()),
        Code::Cancelled => Error::Cancelled,
        _ => Error::External(format!("upstream status {:?}: {}", status.code(), status.message())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_sample_rate_out_of_range() {
        let params = TranscribeParams {
            audio_bytes: vec![],
            encoding: AudioEncoding::Linear16,
            sample_rate: 7000,
            language: "en-US".into(),
            max_alternatives: 1,
            enable_punctuation: true,
            enable_word_time_offsets: false,
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_max_alternatives_out_of_range() {
        let params = TranscribeParams {
            audio_bytes: vec![],
            encoding: AudioEncoding::Linear16,
            sample_rate: 16000,
            language: "en-US".into(),
            max_alternatives: 11,
            enable_punctuation: true,
            enable_word_time_offsets: false,
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn accepts_boundary_values() {
        let params = TranscribeParams {
            audio_bytes: vec![],
            encoding: AudioEncoding::Flac,
            sample_rate: 48000,
            language: "en-US".into(),
            max_alternatives: 10,
            enable_punctuation: false,
            enable_word_time_offsets: true,
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn maps_deadline_exceeded_to_timeout() {
        let status = tonic::Status::deadline_exceeded("too slow");
        assert!(matches!(status_to_error(status), Error::Timeout));
    }

    #[test]
    fn maps_unavailable_to_transient() {
        let status = tonic::Status::unavailable("down");
        assert!(matches!(status_to_error(status), Error::Transient { .. }));
    }

    #[test]
    fn maps_invalid_argument_to_validation() {
        let status = tonic::Status::invalid_argument("bad frame");
        assert!(matches!(status_to_error(status), Error::ValidationError(_)));
    }
}
