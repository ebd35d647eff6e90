//! Server-Sent Events framing

use bytes::{BufMut, Bytes, BytesMut};

use crate::registry::Event;

/// MIME type of an event stream
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Field prefix for each data line
const DATA_FIELD: &[u8] = b"data: ";

/// Label put in front of every payload
const EVENT_LABEL: &[u8] = b"Event: ";

/// Encode one event as a complete SSE message
///
/// A single-line payload becomes `data: Event: <payload>\n\n`. Every line
/// break in the payload (`\n`, `\r` or `\r\n`, as an SSE client reads them)
/// starts a new `data: ` line, so clients reassemble the original text
/// instead of seeing a truncated frame.
pub fn format_event(event: &Event) -> Bytes {
    let data = event.data();
    let mut buf = BytesMut::with_capacity(DATA_FIELD.len() + EVENT_LABEL.len() + data.len() + 8);

    buf.put_slice(DATA_FIELD);
    buf.put_slice(EVENT_LABEL);

    let mut rest = &data[..];
    while let Some(pos) = rest.iter().position(|b| *b == b'\n' || *b == b'\r') {
        buf.put_slice(&rest[..pos]);
        buf.put_u8(b'\n');
        buf.put_slice(DATA_FIELD);

        let crlf = rest[pos] == b'\r' && rest.get(pos + 1) == Some(&b'\n');
        let skip = if crlf { 2 } else { 1 };
        rest = &rest[pos + skip..];
    }
    buf.put_slice(rest);
    buf.put_u8(b'\n');

    // Blank line terminates the message
    buf.put_u8(b'\n');
    buf.freeze()
}
