// Licensed under the Apache-2.0 license

use arrayvec::ArrayString;
use core::fmt::{self, Write};

/// Longest message a response packet carries after its 4-byte tag.
pub const RESPONSE_MESSAGE_LEN: usize = 60;

pub type ResponseMessage = ArrayString<RESPONSE_MESSAGE_LEN>;

/// Final status relayed to the remote client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Okay(ResponseMessage),
    Fail(ResponseMessage),
}

impl Response {
    pub fn okay(args: fmt::Arguments<'_>) -> Self {
        Response::Okay(truncated(args))
    }

    pub fn fail(args: fmt::Arguments<'_>) -> Self {
        Response::Fail(truncated(args))
    }

    /// `okay` with `note` appended. The note is always kept whole; the
    /// formatted text is cut to make room for it.
    pub fn okay_with_note(args: fmt::Arguments<'_>, note: &str) -> Self {
        Response::Okay(noted(args, note))
    }

    pub fn fail_with_note(args: fmt::Arguments<'_>, note: &str) -> Self {
        Response::Fail(noted(args, note))
    }

    pub fn is_okay(&self) -> bool {
        matches!(self, Response::Okay(_))
    }

    /// Packet tag, `OKAY` or `FAIL`.
    pub fn tag(&self) -> &'static str {
        match self {
            Response::Okay(_) => "OKAY",
            Response::Fail(_) => "FAIL",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Response::Okay(msg) | Response::Fail(msg) => msg.as_str(),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tag(), self.message())
    }
}

struct Truncating<'a> {
    buf: &'a mut ResponseMessage,
    limit: usize,
    full: bool,
}

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if self.full || self.buf.len() + ch.len_utf8() > self.limit {
                self.full = true;
                break;
            }
            self.buf.push(ch);
        }
        Ok(())
    }
}

fn write_limited(buf: &mut ResponseMessage, limit: usize, args: fmt::Arguments<'_>) {
    let mut writer = Truncating {
        buf,
        limit: limit.min(RESPONSE_MESSAGE_LEN),
        full: false,
    };
    // The writer never fails; overflow is dropped.
    let _ = writer.write_fmt(args);
}

fn truncated(args: fmt::Arguments<'_>) -> ResponseMessage {
    let mut buf = ResponseMessage::new();
    write_limited(&mut buf, RESPONSE_MESSAGE_LEN, args);
    buf
}

fn noted(args: fmt::Arguments<'_>, note: &str) -> ResponseMessage {
    let mut buf = ResponseMessage::new();
    write_limited(&mut buf, RESPONSE_MESSAGE_LEN.saturating_sub(note.len()), args);
    write_limited(&mut buf, RESPONSE_MESSAGE_LEN, format_args!("{}", note));
    buf
}
