//! RESP2 framing: the on-the-wire representation and its
//! `tokio_util::codec` encoder/decoder pair.
//!
//! Deliberately RESP2-only. No maps, sets, booleans, doubles, big numbers,
//! verbatim strings, or attributes: nothing in this build's command surface
//! needs RESP3, so the decoder never has to branch on a byte it can't
//! produce a sensible frame for.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::errors::KvError;

pub const CRLF: &[u8] = b"\r\n";
pub const CRLF_LEN: usize = 2;

/// Guards against a single request array with an absurd element count from
/// parking an unbounded amount of memory while we wait for the rest of it.
pub const MAX_FRAME_ELEMENTS: usize = 1024 * 1024;

/// Guards a single bulk string's declared length the same way.
pub const MAX_BULK_STRING_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum RespFrame {
    SimpleString(Bytes),
    Error(Bytes),
    Integer(i64),
    BulkString(Bytes),
    Null,
    NullArray,
    Array(Vec<RespFrame>),
}

impl From<crate::core::protocol::resp_value::RespValue> for RespFrame {
    fn from(v: crate::core::protocol::resp_value::RespValue) -> Self {
        use crate::core::protocol::resp_value::RespValue as V;
        match v {
            V::SimpleString(s) => RespFrame::SimpleString(s),
            V::Error(e) => RespFrame::Error(e),
            V::Integer(n) => RespFrame::Integer(n),
            V::BulkString(b) => RespFrame::BulkString(b),
            V::NullBulk => RespFrame::Null,
            V::NullArray => RespFrame::NullArray,
            V::Array(items) => RespFrame::Array(items.into_iter().map(RespFrame::from).collect()),
        }
    }
}

impl RespFrame {
    /// Converts a fully-decoded request array into a flat argument vector,
    /// the shape the command dispatcher actually consumes. Anything other
    /// than an array of bulk/simple strings is a protocol error.
    pub fn into_command_args(self) -> Result<Vec<Bytes>, KvError> {
        match self {
            RespFrame::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        RespFrame::BulkString(b) => out.push(b),
                        RespFrame::SimpleString(s) => out.push(s),
                        _ => {
                            return Err(KvError::Protocol(
                                "expected bulk string array element".into(),
                            ));
                        }
                    }
                }
                Ok(out)
            }
            _ => Err(KvError::Protocol("expected request array".into())),
        }
    }
}

fn encode_frame(frame: &RespFrame, dst: &mut BytesMut) {
    match frame {
        RespFrame::SimpleString(s) => {
            dst.put_u8(b'+');
            dst.put_slice(s);
            dst.put_slice(CRLF);
        }
        RespFrame::Error(e) => {
            dst.put_u8(b'-');
            dst.put_slice(e);
            dst.put_slice(CRLF);
        }
        RespFrame::Integer(n) => {
            dst.put_u8(b':');
            let mut buf = itoa::Buffer::new();
            dst.put_slice(buf.format(*n).as_bytes());
            dst.put_slice(CRLF);
        }
        RespFrame::BulkString(b) => {
            dst.put_u8(b'$');
            let mut buf = itoa::Buffer::new();
            dst.put_slice(buf.format(b.len()).as_bytes());
            dst.put_slice(CRLF);
            dst.put_slice(b);
            dst.put_slice(CRLF);
        }
        RespFrame::Null => {
            dst.put_slice(b"$-1\r\n");
        }
        RespFrame::NullArray => {
            dst.put_slice(b"*-1\r\n");
        }
        RespFrame::Array(items) => {
            dst.put_u8(b'*');
            let mut buf = itoa::Buffer::new();
            dst.put_slice(buf.format(items.len()).as_bytes());
            dst.put_slice(CRLF);
            for item in items {
                encode_frame(item, dst);
            }
        }
    }
}

pub struct RespFrameCodec;

impl Encoder<RespFrame> for RespFrameCodec {
    type Error = KvError;

    fn encode(&mut self, item: RespFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst);
        Ok(())
    }
}

/// Finds the index just past the next `\r\n` in `src` starting at `from`,
/// or `None` if the terminator hasn't arrived yet.
fn find_crlf(src: &[u8], from: usize) -> Option<usize> {
    src[from..]
        .windows(2)
        .position(|w| w == CRLF)
        .map(|p| from + p)
}

/// Parses one frame starting at `src[pos]`. Returns `Ok(Some((frame, next_pos)))`
/// on success, `Ok(None)` if more bytes are needed, `Err` on a malformed frame.
fn parse_frame(src: &[u8], pos: usize) -> Result<Option<(RespFrame, usize)>, KvError> {
    if pos >= src.len() {
        return Ok(None);
    }
    let tag = src[pos];
    let body_start = pos + 1;
    match tag {
        b'+' => parse_line(src, body_start)
            .map(|opt| opt.map(|(line, next)| (RespFrame::SimpleString(line), next))),
        b'-' => parse_line(src, body_start)
            .map(|opt| opt.map(|(line, next)| (RespFrame::Error(line), next))),
        b':' => match parse_line(src, body_start)? {
            None => Ok(None),
            Some((line, next)) => {
                let n = parse_i64(&line)?;
                Ok(Some((RespFrame::Integer(n), next)))
            }
        },
        b'$' => parse_bulk_string(src, body_start),
        b'*' => parse_array(src, body_start),
        other => Err(KvError::Protocol(format!(
            "invalid frame type byte '{}'",
            other as char
        ))),
    }
}

fn parse_line(src: &[u8], from: usize) -> Result<Option<(Bytes, usize)>, KvError> {
    match find_crlf(src, from) {
        None => Ok(None),
        Some(crlf_at) => {
            let line = Bytes::copy_from_slice(&src[from..crlf_at]);
            Ok(Some((line, crlf_at + CRLF_LEN)))
        }
    }
}

fn parse_i64(line: &[u8]) -> Result<i64, KvError> {
    std::str::from_utf8(line)
        .map_err(KvError::from)?
        .parse::<i64>()
        .map_err(|_| KvError::Protocol("invalid integer".into()))
}

fn parse_bulk_string(src: &[u8], from: usize) -> Result<Option<(RespFrame, usize)>, KvError> {
    let (len_line, after_len) = match parse_line(src, from)? {
        None => return Ok(None),
        Some(v) => v,
    };
    let len = parse_i64(&len_line)?;
    if len == -1 {
        return Ok(Some((RespFrame::Null, after_len)));
    }
    if len < 0 {
        return Err(KvError::Protocol("negative bulk string length".into()));
    }
    let len = len as usize;
    if len > MAX_BULK_STRING_SIZE {
        return Err(KvError::Protocol("bulk string too large".into()));
    }
    let data_end = after_len + len;
    if src.len() < data_end + CRLF_LEN {
        return Ok(None);
    }
    if &src[data_end..data_end + CRLF_LEN] != CRLF {
        return Err(KvError::Protocol("malformed bulk string terminator".into()));
    }
    let data = Bytes::copy_from_slice(&src[after_len..data_end]);
    Ok(Some((RespFrame::BulkString(data), data_end + CRLF_LEN)))
}

fn parse_array(src: &[u8], from: usize) -> Result<Option<(RespFrame, usize)>, KvError> {
    let (len_line, mut pos) = match parse_line(src, from)? {
        None => return Ok(None),
        Some(v) => v,
    };
    let len = parse_i64(&len_line)?;
    if len == -1 {
        return Ok(Some((RespFrame::NullArray, pos)));
    }
    if len < 0 {
        return Err(KvError::Protocol("negative array length".into()));
    }
    let len = len as usize;
    if len > MAX_FRAME_ELEMENTS {
        return Err(KvError::Protocol("array too large".into()));
    }
    let mut items = Vec::with_capacity(len.min(4096));
    for _ in 0..len {
        match parse_frame(src, pos)? {
            None => return Ok(None),
            Some((frame, next)) => {
                items.push(frame);
                pos = next;
            }
        }
    }
    Ok(Some((RespFrame::Array(items), pos)))
}

impl Decoder for RespFrameCodec {
    type Item = RespFrame;
    type Error = KvError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match parse_frame(src, 0)? {
            None => Ok(None),
            Some((frame, consumed)) => {
                src.advance(consumed);
                Ok(Some(frame))
            }
        }
    }
}
