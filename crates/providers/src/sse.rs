//! Shared SSE streaming infrastructure for model adapters.
//!
//! Every adapter follows the same pattern: receive a `reqwest::Response`,
//! buffer chunks, split on `\n\n`, extract `data:` payloads, and feed
//! each payload to an adapter-specific parser that returns
//! `Vec<ModelChunk>`.

use turnloom_domain::{BoxStream, ModelChunk};

/// Extract complete `data:` payloads from an SSE buffer.
///
/// The buffer is drained in-place: consumed bytes are removed and any
/// trailing partial event remains for the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Build a [`BoxStream`] of [`ModelChunk`]s from an SSE `reqwest::Response`
/// and an adapter-specific parser closure.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, ModelChunk>
where
    F: FnMut(&str) -> Vec<ModelChunk> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut end_emitted = false;

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for data in drain_data_lines(&mut buffer) {
                        for chunk in parse_data(&data) {
                            if matches!(&chunk, ModelChunk::End { .. }) {
                                end_emitted = true;
                            }
                            yield chunk;
                        }
                    }
                }
                Ok(None) => {
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for data in drain_data_lines(&mut buffer) {
                            for chunk in parse_data(&data) {
                                if matches!(&chunk, ModelChunk::End { .. }) {
                                    end_emitted = true;
                                }
                                yield chunk;
                            }
                        }
                    }
                    break;
                }
                Err(_) => {
                    yield ModelChunk::End {
                        usage: None,
                        finish_reason: Some("error".to_string()),
                    };
                    end_emitted = true;
                    break;
                }
            }
        }

        if !end_emitted {
            yield ModelChunk::End {
                usage: None,
                finish_reason: Some("stop".to_string()),
            };
        }
    };

    Box::pin(stream)
}
