//! Decoding of engine responses into CLI output

use crate::{CoreError, Result};
use dkr_provider::{Frame, FrameStream, ProviderError, RawOutput};
use futures::StreamExt;
use std::io::Write;
use tokio::io::AsyncReadExt;

/// Which progress format a stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStyle {
    /// Build output: free text lines
    Build,
    /// Pull and push output: per-layer status lines
    Pull,
}

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Free text
    Progress(String),
    /// Status of one layer or object
    Status { id: String, status: String },
    /// Terminal failure reported by the engine
    Error(String),
    /// The stream is over
    End,
}

impl StreamEvent {
    /// Classify a frame, `None` when it has nothing to show
    pub fn classify(frame: &Frame, style: StreamStyle) -> Option<Self> {
        if let Some(message) = frame.error_message() {
            return Some(Self::Error(message.to_string()));
        }

        match style {
            StreamStyle::Build => frame
                .stream
                .as_deref()
                .or(frame.status.as_deref())
                .map(str::trim_end)
                .filter(|text| !text.trim().is_empty())
                .map(|text| Self::Progress(text.to_string())),
            StreamStyle::Pull => {
                let status = frame.status.as_deref()?;
                match frame.id.as_deref().filter(|id| !id.is_empty()) {
                    Some(id) => Some(Self::Status {
                        id: id.to_string(),
                        status: status.to_string(),
                    }),
                    None => Some(Self::Progress(status.to_string())),
                }
            }
        }
    }
}

impl std::fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Progress(text) => f.write_str(text),
            Self::Status { id, status } => write!(f, "{}: {}", id, status),
            Self::Error(message) => f.write_str(message),
            Self::End => Ok(()),
        }
    }
}

/// How a decoded stream finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Completed,
    /// An error frame was shown
    Failed,
}

/// Pulls classified events off a frame stream.
///
/// After an error frame or the end of the stream only [`StreamEvent::End`]
/// is returned.
pub struct StreamDecoder<'a> {
    stream: FrameStream<'a>,
    style: StreamStyle,
    finished: bool,
}

impl<'a> StreamDecoder<'a> {
    pub fn new(stream: FrameStream<'a>, style: StreamStyle) -> Self {
        Self {
            stream,
            style,
            finished: false,
        }
    }

    /// Next renderable event
    pub async fn next_event(&mut self) -> Result<StreamEvent> {
        while !self.finished {
            let frame = match self.stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(ProviderError::Decode(message))) => {
                    self.finished = true;
                    return Err(CoreError::Decode(message));
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Err(e.into());
                }
                None => break,
            };

            match StreamEvent::classify(&frame, self.style) {
                Some(StreamEvent::Error(message)) => {
                    self.finished = true;
                    return Ok(StreamEvent::Error(message));
                }
                Some(event) => return Ok(event),
                None => tracing::trace!("Skipping frame {:?}", frame),
            }
        }

        self.finished = true;
        Ok(StreamEvent::End)
    }
}

/// Render a progress stream in arrival order.
///
/// Progress goes to `out`, an error frame goes to `err` and ends the stream.
pub async fn decode_stream(
    stream: FrameStream<'_>,
    style: StreamStyle,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<StreamEnd> {
    let mut decoder = StreamDecoder::new(stream, style);

    loop {
        match decoder.next_event().await? {
            StreamEvent::End => break,
            StreamEvent::Error(message) => {
                writeln!(err, "{}", message)?;
                err.flush()?;
                return Ok(StreamEnd::Failed);
            }
            event => {
                writeln!(out, "{}", event)?;
                out.flush()?;
            }
        }
    }

    Ok(StreamEnd::Completed)
}

/// Forward unstructured output (exec, logs)
pub async fn render_raw(output: RawOutput, out: &mut dyn Write) -> Result<()> {
    match output {
        RawOutput::Bytes(bytes) => writeln!(out, "{}", String::from_utf8_lossy(&bytes))?,
        RawOutput::Value(value) => writeln!(out, "{}", value)?,
        RawOutput::Stream(mut reader) => {
            let mut buf = [0u8; 8192];
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n])?;
                out.flush()?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dkr_provider::ErrorDetail;

    fn frames(items: Vec<dkr_provider::Result<Frame>>) -> FrameStream<'static> {
        Box::pin(futures::stream::iter(items))
    }

    fn text(s: &str) -> Frame {
        Frame {
            stream: Some(s.to_string()),
            ..Default::default()
        }
    }

    fn error(s: &str) -> Frame {
        Frame {
            error: Some(s.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_build_error_halts_stream() {
        let stream = frames(vec![Ok(text("step 1")), Ok(error("boom")), Ok(text("step 2"))]);
        let mut out = Vec::new();
        let mut err = Vec::new();

        let end = decode_stream(stream, StreamStyle::Build, &mut out, &mut err)
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::Failed);
        assert_eq!(String::from_utf8(out).unwrap(), "step 1\n");
        assert_eq!(String::from_utf8(err).unwrap(), "boom\n");
    }

    #[tokio::test]
    async fn test_stream_borrowing_its_source() {
        let history = vec![text("Step 1/1 : FROM scratch"), text("Successfully built 1234")];
        let stream: FrameStream<'_> = Box::pin(futures::stream::iter(
            history.iter().cloned().map(Ok::<_, ProviderError>),
        ));
        let mut out = Vec::new();
        let mut err = Vec::new();

        let end = decode_stream(stream, StreamStyle::Build, &mut out, &mut err)
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::Completed);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Step 1/1 : FROM scratch\nSuccessfully built 1234\n"
        );
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_build_blank_text_suppressed() {
        let stream = frames(vec![
            Ok(text("Step 1/2 : FROM alpine\n")),
            Ok(text("\n")),
            Ok(Frame::default()),
            Ok(text(" ---> 1234\n")),
        ]);
        let mut out = Vec::new();
        let mut err = Vec::new();

        let end = decode_stream(stream, StreamStyle::Build, &mut out, &mut err)
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::Completed);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Step 1/2 : FROM alpine\n ---> 1234\n"
        );
        assert!(err.is_empty());
    }

    #[tokio::test]
    async fn test_pull_status_lines() {
        let stream = frames(vec![
            Ok(Frame {
                status: Some("Pulling from library/alpine".to_string()),
                id: Some("latest".to_string()),
                ..Default::default()
            }),
            Ok(Frame {
                status: Some("Download complete".to_string()),
                id: Some("a1b2c3".to_string()),
                progress: Some("[====>   ]".to_string()),
                ..Default::default()
            }),
            Ok(Frame {
                status: Some("Status: Downloaded newer image".to_string()),
                ..Default::default()
            }),
        ]);
        let mut out = Vec::new();
        let mut err = Vec::new();

        decode_stream(stream, StreamStyle::Pull, &mut out, &mut err)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "latest: Pulling from library/alpine\na1b2c3: Download complete\nStatus: Downloaded newer image\n"
        );
    }

    #[tokio::test]
    async fn test_pull_error_detail() {
        let stream = frames(vec![Ok(Frame {
            error_detail: Some(ErrorDetail {
                code: None,
                message: Some("manifest unknown".to_string()),
            }),
            ..Default::default()
        })]);
        let mut out = Vec::new();
        let mut err = Vec::new();

        let end = decode_stream(stream, StreamStyle::Pull, &mut out, &mut err)
            .await
            .unwrap();

        assert_eq!(end, StreamEnd::Failed);
        assert_eq!(String::from_utf8(err).unwrap(), "manifest unknown\n");
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_rendered_lines() {
        let stream = frames(vec![
            Ok(text("step 1")),
            Err(ProviderError::Decode("expected value".to_string())),
            Ok(text("step 2")),
        ]);
        let mut out = Vec::new();
        let mut err = Vec::new();

        let result = decode_stream(stream, StreamStyle::Build, &mut out, &mut err).await;

        assert!(matches!(result, Err(CoreError::Decode(_))));
        assert_eq!(String::from_utf8(out).unwrap(), "step 1\n");
    }

    #[tokio::test]
    async fn test_decoder_never_resumes_after_error() {
        let stream = frames(vec![Ok(error("boom")), Ok(text("after"))]);
        let mut decoder = StreamDecoder::new(stream, StreamStyle::Build);

        assert_eq!(
            decoder.next_event().await.unwrap(),
            StreamEvent::Error("boom".to_string())
        );
        assert_eq!(decoder.next_event().await.unwrap(), StreamEvent::End);
        assert_eq!(decoder.next_event().await.unwrap(), StreamEvent::End);
    }

    #[tokio::test]
    async fn test_render_raw_variants() {
        let mut out = Vec::new();
        render_raw(RawOutput::Bytes(b"hello".to_vec()), &mut out)
            .await
            .unwrap();
        render_raw(RawOutput::Value("42".to_string()), &mut out)
            .await
            .unwrap();
        let reader: &'static [u8] = b"raw\x00bytes";
        render_raw(RawOutput::Stream(Box::pin(reader)), &mut out)
            .await
            .unwrap();

        assert_eq!(out, b"hello\n42\nraw\x00bytes");
    }
}
