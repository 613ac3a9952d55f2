//! Worker-to-foreground request frames.
//!
//! Everything the worker sends to the foreground travels over one circular
//! buffer of `u32` words (the request ring):
//! - console call: `[CONSOLE_MARKER, device_id, method_tag, payload_len, ..payload]`
//! - allocation reply: `[MALLOC_REPLY_MARKER, request_id, addr]`
//!
//! Strings inside a payload are `[byte_len, ..bytes]` with the bytes packed
//! four per word, little-endian, zero padded. Each frame is written with a
//! single `write_array`, so the reader never observes half a frame from a
//! well-behaved writer.

use crate::error::ConsoleError;
use crate::method::ConsoleMethod;
use tandem_ipc::{CircularReader, CircularWriter};
use tandem_mem::Memory;
use tracing::trace;

/// Random positive 32-bit value marking a console call frame.
pub const CONSOLE_MARKER: u32 = 0x3c2e_7a19;
/// Random positive 32-bit value marking an allocation reply frame.
pub const MALLOC_REPLY_MARKER: u32 = 0x0f5d_c463;

/// A console operation as executed by the foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCall {
    CharOut { ch: u32, code_page: u32 },
    PutStr { text: String, code_page: u32 },
    SetRange { start: u32, values: Vec<u32> },
    SetC32 { location: u32, ch: u32 },
    SetReset { x: u32, y: u32, set: bool },
    SetCursor { location: u32 },
    SetColors { foreground: u32, background: u32 },
    Cls,
    SetFocus,
    Point { x: u32, y: u32 },
    DrawSeq { seq: u32 },
    LoadImage { url: String, id: i32 },
}

impl ConsoleCall {
    pub fn method(&self) -> ConsoleMethod {
        match self {
            ConsoleCall::CharOut { .. } => ConsoleMethod::CharOut,
            ConsoleCall::PutStr { .. } => ConsoleMethod::PutStr,
            ConsoleCall::SetRange { .. } => ConsoleMethod::SetRange,
            ConsoleCall::SetC32 { .. } => ConsoleMethod::SetC32,
            ConsoleCall::SetReset { .. } => ConsoleMethod::SetReset,
            ConsoleCall::SetCursor { .. } => ConsoleMethod::SetCursor,
            ConsoleCall::SetColors { .. } => ConsoleMethod::SetColors,
            ConsoleCall::Cls => ConsoleMethod::Cls,
            ConsoleCall::SetFocus => ConsoleMethod::SetFocus,
            ConsoleCall::Point { .. } => ConsoleMethod::Point,
            ConsoleCall::DrawSeq { .. } => ConsoleMethod::DrawSeq,
            ConsoleCall::LoadImage { .. } => ConsoleMethod::LoadImage,
        }
    }

    /// Build a call from the argument words of a native call, reading any
    /// strings or arrays they point at.
    ///
    /// `args` must already have the method's arity.
    pub fn from_args(
        method: ConsoleMethod,
        mem: &dyn Memory,
        args: &[u32],
    ) -> Result<Self, ConsoleError> {
        if args.len() != method.arity() {
            return Err(ConsoleError::ArgCount {
                method,
                expected: method.arity(),
                found: args.len(),
            });
        }
        Ok(match method {
            ConsoleMethod::CharOut => ConsoleCall::CharOut {
                ch: args[0],
                code_page: args[1],
            },
            ConsoleMethod::PutStr => ConsoleCall::PutStr {
                text: mem.read_cstr(args[0])?,
                code_page: args[1],
            },
            ConsoleMethod::SetRange => ConsoleCall::SetRange {
                start: args[1],
                values: mem.read_u32_array(args[0], args[2] as usize)?,
            },
            ConsoleMethod::SetC32 => ConsoleCall::SetC32 {
                location: args[0],
                ch: args[1],
            },
            ConsoleMethod::SetReset => ConsoleCall::SetReset {
                x: args[0],
                y: args[1],
                set: args[2] != 0,
            },
            ConsoleMethod::SetCursor => ConsoleCall::SetCursor { location: args[0] },
            ConsoleMethod::SetColors => ConsoleCall::SetColors {
                foreground: args[0],
                background: args[1],
            },
            ConsoleMethod::Cls => ConsoleCall::Cls,
            ConsoleMethod::SetFocus => ConsoleCall::SetFocus,
            ConsoleMethod::Point => ConsoleCall::Point {
                x: args[0],
                y: args[1],
            },
            ConsoleMethod::DrawSeq => ConsoleCall::DrawSeq { seq: args[0] },
            ConsoleMethod::LoadImage => ConsoleCall::LoadImage {
                url: mem.read_cstr(args[0])?,
                id: args[1] as i32,
            },
            ConsoleMethod::CharIn
            | ConsoleMethod::Inkey
            | ConsoleMethod::GetProp
            | ConsoleMethod::GetConIdFromName => return Err(ConsoleError::NotForwarded(method)),
        })
    }

    fn encode_payload(&self, out: &mut Vec<u32>) {
        match self {
            ConsoleCall::CharOut { ch, code_page } => out.extend_from_slice(&[*ch, *code_page]),
            ConsoleCall::PutStr { text, code_page } => {
                out.push(*code_page);
                push_str(out, text);
            }
            ConsoleCall::SetRange { start, values } => {
                out.push(*start);
                out.extend_from_slice(values);
            }
            ConsoleCall::SetC32 { location, ch } => out.extend_from_slice(&[*location, *ch]),
            ConsoleCall::SetReset { x, y, set } => out.extend_from_slice(&[*x, *y, *set as u32]),
            ConsoleCall::SetCursor { location } => out.push(*location),
            ConsoleCall::SetColors {
                foreground,
                background,
            } => out.extend_from_slice(&[*foreground, *background]),
            ConsoleCall::Cls | ConsoleCall::SetFocus => {}
            ConsoleCall::Point { x, y } => out.extend_from_slice(&[*x, *y]),
            ConsoleCall::DrawSeq { seq } => out.push(*seq),
            ConsoleCall::LoadImage { url, id } => {
                out.push(*id as u32);
                push_str(out, url);
            }
        }
    }

    fn decode_payload(method: ConsoleMethod, payload: &[u32]) -> Result<Self, ConsoleError> {
        let mut r = WordReader::new(payload);
        let call = match method {
            ConsoleMethod::CharOut => ConsoleCall::CharOut {
                ch: r.read_u32("character")?,
                code_page: r.read_u32("code page")?,
            },
            ConsoleMethod::PutStr => {
                let code_page = r.read_u32("code page")?;
                ConsoleCall::PutStr {
                    text: r.read_str()?,
                    code_page,
                }
            }
            ConsoleMethod::SetRange => ConsoleCall::SetRange {
                start: r.read_u32("range start")?,
                values: r.rest().to_vec(),
            },
            ConsoleMethod::SetC32 => ConsoleCall::SetC32 {
                location: r.read_u32("location")?,
                ch: r.read_u32("character")?,
            },
            ConsoleMethod::SetReset => ConsoleCall::SetReset {
                x: r.read_u32("x")?,
                y: r.read_u32("y")?,
                set: r.read_u32("set flag")? != 0,
            },
            ConsoleMethod::SetCursor => ConsoleCall::SetCursor {
                location: r.read_u32("location")?,
            },
            ConsoleMethod::SetColors => ConsoleCall::SetColors {
                foreground: r.read_u32("foreground")?,
                background: r.read_u32("background")?,
            },
            ConsoleMethod::Cls => ConsoleCall::Cls,
            ConsoleMethod::SetFocus => ConsoleCall::SetFocus,
            ConsoleMethod::Point => ConsoleCall::Point {
                x: r.read_u32("x")?,
                y: r.read_u32("y")?,
            },
            ConsoleMethod::DrawSeq => ConsoleCall::DrawSeq {
                seq: r.read_u32("sequence address")?,
            },
            ConsoleMethod::LoadImage => {
                let id = r.read_u32("image id")? as i32;
                ConsoleCall::LoadImage {
                    url: r.read_str()?,
                    id,
                }
            }
            ConsoleMethod::CharIn
            | ConsoleMethod::Inkey
            | ConsoleMethod::GetProp
            | ConsoleMethod::GetConIdFromName => return Err(ConsoleError::NotForwarded(method)),
        };
        if r.remaining() != 0 {
            return Err(ConsoleError::TrailingWords {
                method,
                extra: r.remaining(),
            });
        }
        Ok(call)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Console { device_id: i32, call: ConsoleCall },
    MallocReply { request_id: u32, addr: u32 },
}

impl Request {
    pub fn encode(&self) -> Vec<u32> {
        match self {
            Request::Console { device_id, call } => {
                let mut out = vec![CONSOLE_MARKER, *device_id as u32, call.method().tag(), 0];
                call.encode_payload(&mut out);
                out[3] = (out.len() - 4) as u32;
                out
            }
            Request::MallocReply { request_id, addr } => {
                vec![MALLOC_REPLY_MARKER, *request_id, *addr]
            }
        }
    }

    /// Decode the next request without blocking. `Ok(None)` means the ring is
    /// empty.
    pub fn read_from(reader: &mut CircularReader) -> Result<Option<Self>, ConsoleError> {
        let Some(marker) = reader.read() else {
            return Ok(None);
        };
        let mut next = |what| reader.read().ok_or(ConsoleError::Truncated(what));
        let request = match marker {
            CONSOLE_MARKER => {
                let device_id = next("device id")? as i32;
                let tag = next("method tag")?;
                let len = next("payload length")?;
                let method =
                    ConsoleMethod::from_tag(tag).ok_or(ConsoleError::UnknownMethodTag(tag))?;
                let payload = (0..len)
                    .map(|_| next("payload word"))
                    .collect::<Result<Vec<_>, _>>()?;
                Request::Console {
                    device_id,
                    call: ConsoleCall::decode_payload(method, &payload)?,
                }
            }
            MALLOC_REPLY_MARKER => Request::MallocReply {
                request_id: next("malloc request id")?,
                addr: next("malloc address")?,
            },
            other => return Err(ConsoleError::BadMarker(other)),
        };
        Ok(Some(request))
    }
}

/// The worker's end of the request ring.
pub struct RequestWriter {
    writer: CircularWriter,
}

impl RequestWriter {
    pub fn new(writer: CircularWriter) -> Self {
        Self { writer }
    }

    pub fn send(&mut self, device_id: i32, call: ConsoleCall) -> Result<(), ConsoleError> {
        let method = call.method();
        let frame = Request::Console { device_id, call }.encode();
        self.writer.write_array(&frame)?;
        trace!(device_id, %method, words = frame.len(), "console request sent");
        Ok(())
    }

    pub fn malloc_reply(&mut self, request_id: u32, addr: u32) -> Result<(), ConsoleError> {
        self.writer
            .write_array(&Request::MallocReply { request_id, addr }.encode())?;
        trace!(request_id, addr, "malloc reply sent");
        Ok(())
    }
}

fn push_str(out: &mut Vec<u32>, s: &str) {
    let bytes = s.as_bytes();
    out.push(bytes.len() as u32);
    out.extend(bytes.chunks(4).map(|chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        u32::from_le_bytes(word)
    }));
}

struct WordReader<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> WordReader<'a> {
    fn new(words: &'a [u32]) -> Self {
        Self { words, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.words.len().saturating_sub(self.pos)
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, ConsoleError> {
        let word = *self.words.get(self.pos).ok_or(ConsoleError::Truncated(what))?;
        self.pos += 1;
        Ok(word)
    }

    fn read_words(&mut self, len: usize, what: &'static str) -> Result<&'a [u32], ConsoleError> {
        if self.remaining() < len {
            return Err(ConsoleError::Truncated(what));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.words[start..start + len])
    }

    fn read_str(&mut self) -> Result<String, ConsoleError> {
        let len = self.read_u32("string length")? as usize;
        let words = self.read_words(len.div_ceil(4), "string bytes")?;
        let mut bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes.truncate(len);
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn rest(&mut self) -> &'a [u32] {
        let rest = &self.words[self.pos.min(self.words.len())..];
        self.pos = self.words.len();
        rest
    }
}
