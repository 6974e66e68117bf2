//! Stream storage: ordered entries, the last-generated-id watermark, and
//! consumer groups with their pending-entries lists (PEL).

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;

use crate::core::errors::KvError;
use crate::core::types::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn next(self) -> StreamId {
        if self.seq == u64::MAX {
            StreamId {
                ms: self.ms + 1,
                seq: 0,
            }
        } else {
            StreamId {
                ms: self.ms,
                seq: self.seq + 1,
            }
        }
    }

    /// Parses a full `ms-seq` or bare `ms` id, used for explicit XADD ids,
    /// range bounds, and XGROUP SETID targets. A bare `ms` defaults its
    /// sequence to `default_seq` (0 for range starts, MAX for range ends).
    pub fn parse(s: &[u8], default_seq: u64) -> Result<StreamId, KvError> {
        let s = std::str::from_utf8(s).map_err(KvError::from)?;
        match s.split_once('-') {
            Some((ms, seq)) => {
                let ms: u64 = ms.parse().map_err(|_| KvError::NotAnInteger)?;
                let seq: u64 = seq.parse().map_err(|_| KvError::NotAnInteger)?;
                Ok(StreamId { ms, seq })
            }
            None => {
                let ms: u64 = s.parse().map_err(|_| KvError::NotAnInteger)?;
                Ok(StreamId {
                    ms,
                    seq: default_seq,
                })
            }
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(Bytes, Bytes)>,
}

#[derive(Debug, Clone)]
pub struct PendingEntryInfo {
    pub consumer: Bytes,
    pub delivery_time: Millis,
    pub delivery_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ConsumerState {
    pub seen_time: Millis,
}

#[derive(Debug, Clone)]
pub struct ConsumerGroup {
    pub last_delivered_id: StreamId,
    pub pending: BTreeMap<StreamId, PendingEntryInfo>,
    pub consumers: IndexMap<Bytes, ConsumerState>,
}

impl ConsumerGroup {
    pub fn new(start_id: StreamId) -> Self {
        ConsumerGroup {
            last_delivered_id: start_id,
            pending: BTreeMap::new(),
            consumers: IndexMap::new(),
        }
    }

    pub fn touch_consumer(&mut self, consumer: &Bytes, now: Millis) {
        self.consumers
            .entry(consumer.clone())
            .or_default()
            .seen_time = now;
    }

    /// Number of distinct consumers currently owning at least one pending
    /// entry, the figure `XINFO GROUPS` reports.
    pub fn consumers_with_pending(&self) -> usize {
        let mut set = std::collections::HashSet::new();
        for p in self.pending.values() {
            set.insert(p.consumer.clone());
        }
        set.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stream {
    pub entries: BTreeMap<StreamId, StreamEntry>,
    pub last_generated_id: StreamId,
    pub groups: IndexMap<Bytes, ConsumerGroup>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves `*` (fully automatic), `ms-*` (auto sequence), or a literal
    /// id, then verifies the result is strictly greater than the stream's
    /// current watermark. This is the one piece of XADD id generation that
    /// every caller needs, so it lives on `Stream` rather than in the
    /// command layer.
    pub fn resolve_add_id(&self, requested: &[u8], now: Millis) -> Result<StreamId, KvError> {
        let id = if requested == b"*" {
            if now > self.last_generated_id.ms {
                StreamId { ms: now, seq: 0 }
            } else {
                self.last_generated_id.next()
            }
        } else {
            let s = std::str::from_utf8(requested).map_err(KvError::from)?;
            if let Some(ms_part) = s.strip_suffix("-*") {
                let ms: u64 = ms_part.parse().map_err(|_| KvError::NotAnInteger)?;
                if ms == self.last_generated_id.ms {
                    self.last_generated_id.next()
                } else if ms > self.last_generated_id.ms {
                    StreamId { ms, seq: 0 }
                } else {
                    return Err(KvError::xadd_id_not_increasing());
                }
            } else {
                StreamId::parse(requested, 0)?
            }
        };
        let is_genesis = self.entries.is_empty() && self.last_generated_id == StreamId::MIN;
        if id <= self.last_generated_id && !is_genesis {
            return Err(KvError::xadd_id_not_increasing());
        }
        Ok(id)
    }

    pub fn add_entry(&mut self, id: StreamId, fields: Vec<(Bytes, Bytes)>) {
        self.entries.insert(id, StreamEntry { id, fields });
        if id > self.last_generated_id {
            self.last_generated_id = id;
        }
    }

    /// Removes entries by id, purging them from every group's PEL too.
    /// Returns the count actually removed from the entry log.
    pub fn remove_entries(&mut self, ids: &[StreamId]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.entries.remove(id).is_some() {
                removed += 1;
                for group in self.groups.values_mut() {
                    group.pending.remove(id);
                }
            }
        }
        removed
    }

    pub fn range(&self, start: StreamId, end: StreamId, count: Option<usize>) -> Vec<StreamEntry> {
        let mut out: Vec<StreamEntry> = self
            .entries
            .range(start..=end)
            .map(|(_, e)| e.clone())
            .collect();
        if let Some(n) = count {
            out.truncate(n);
        }
        out
    }

    pub fn rev_range(
        &self,
        start: StreamId,
        end: StreamId,
        count: Option<usize>,
    ) -> Vec<StreamEntry> {
        let mut out: Vec<StreamEntry> = self
            .entries
            .range(end..=start)
            .rev()
            .map(|(_, e)| e.clone())
            .collect();
        if let Some(n) = count {
            out.truncate(n);
        }
        out
    }

    pub fn trim_maxlen(&mut self, maxlen: usize) -> usize {
        let mut removed = 0;
        while self.entries.len() > maxlen {
            if let Some((&id, _)) = self.entries.iter().next() {
                self.remove_entries(&[id]);
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    pub fn trim_minid(&mut self, minid: StreamId) -> usize {
        let doomed: Vec<StreamId> = self
            .entries
            .range(..minid)
            .map(|(&id, _)| id)
            .collect();
        self.remove_entries(&doomed)
    }
}
