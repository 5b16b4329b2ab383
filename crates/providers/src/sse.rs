//! Server-sent-events decoding for streaming chat responses.

use crate::util::from_reqwest;
use sv_domain::error::Result;
use sv_domain::stream::{BoxStream, StreamEvent};

/// Pull every complete `data:` payload out of `buffer`, leaving any partial
/// event behind for the next chunk. CRLF framing is normalized first.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }

    let mut data_lines = Vec::new();
    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos + 2).collect();
        data_lines.extend(
            block
                .lines()
                .filter_map(|line| line.trim().strip_prefix("data:"))
                .map(str::trim)
                .filter(|data| !data.is_empty())
                .map(String::from),
        );
    }
    data_lines
}

/// Turn a streaming HTTP response into [`StreamEvent`]s using a
/// provider-specific payload parser.
///
/// A trailing event without its blank-line terminator is flushed when the
/// body closes, and a synthetic `Done` is appended if the parser never
/// produced one.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: Fn(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;
        let mut finished = false;

        while !finished {
            match response.chunk().await {
                Ok(Some(bytes)) => buffer.push_str(&String::from_utf8_lossy(&bytes)),
                Ok(None) => {
                    finished = true;
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                    }
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    return;
                }
            }

            for data in drain_data_lines(&mut buffer) {
                for event in parse_data(&data) {
                    if matches!(&event, Ok(StreamEvent::Done { .. })) {
                        done_emitted = true;
                    }
                    yield event;
                }
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_complete_events_only() {
        let mut buf = String::from("data: first\n\nevent: ping\ndata: second\n\ndata: par");
        assert_eq!(drain_data_lines(&mut buf), vec!["first", "second"]);
        assert_eq!(buf, "data: par");

        buf.push_str("tial\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["partial"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn crlf_framing_is_accepted() {
        let mut buf = String::from("data: {\"a\":1}\r\n\r\ndata: [DONE]\r\n\r\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn blank_data_and_metadata_lines_are_skipped() {
        let mut buf = String::from("id: 4\nretry: 100\ndata: \n\n");
        assert!(drain_data_lines(&mut buf).is_empty());
        assert!(buf.is_empty());
    }
}
