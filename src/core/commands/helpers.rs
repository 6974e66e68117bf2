//! Small cursor-based argument parser shared by every command's `parse`.

use bytes::Bytes;

use crate::core::errors::{KvError, KvResult};

pub struct ArgParser<'a> {
    args: &'a [Bytes],
    pos: usize,
}

impl<'a> ArgParser<'a> {
    pub fn new(args: &'a [Bytes]) -> Self {
        ArgParser { args, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.args.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.args.len()
    }

    pub fn peek(&self) -> Option<&Bytes> {
        self.args.get(self.pos)
    }

    pub fn next(&mut self) -> KvResult<&'a Bytes> {
        let v = self.args.get(self.pos).ok_or(KvError::Syntax)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn next_bytes(&mut self) -> KvResult<Bytes> {
        self.next().cloned()
    }

    pub fn next_i64(&mut self) -> KvResult<i64> {
        parse_i64(self.next()?)
    }

    pub fn next_usize(&mut self) -> KvResult<usize> {
        let n = self.next_i64()?;
        usize::try_from(n).map_err(|_| KvError::NotAnInteger)
    }

    pub fn next_f64(&mut self) -> KvResult<f64> {
        parse_f64(self.next()?)
    }

    /// Case-insensitively matches the next token against `word` without
    /// consuming on a miss, the shape every optional flag check needs.
    pub fn eat_keyword(&mut self, word: &str) -> bool {
        match self.peek() {
            Some(b) if eq_ignore_case(b, word) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    pub fn expect_end(&self) -> KvResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(KvError::Syntax)
        }
    }
}

pub fn eq_ignore_case(bytes: &[u8], word: &str) -> bool {
    bytes.eq_ignore_ascii_case(word.as_bytes())
}

pub fn parse_i64(b: &[u8]) -> KvResult<i64> {
    std::str::from_utf8(b)
        .map_err(|_| KvError::NotAnInteger)?
        .parse::<i64>()
        .map_err(|_| KvError::NotAnInteger)
}

pub fn parse_f64(b: &[u8]) -> KvResult<f64> {
    let s = std::str::from_utf8(b).map_err(|_| KvError::NotAFloat)?;
    match s {
        "+inf" | "inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        _ => s.parse::<f64>().map_err(|_| KvError::NotAFloat),
    }
}

pub fn command_name_upper(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_ascii_uppercase()
}
