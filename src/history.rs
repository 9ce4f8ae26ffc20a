//! Bounded log of submitted command lines.

/// Maximum number of lines kept by a [`HistoryRing`].
pub const HISTORY_CAPACITY: usize = 50;

/// One recorded command line together with its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub seq: u64,
    pub line: String,
}

/// Fixed-capacity circular buffer of command lines.
///
/// Once the ring is full, each new line overwrites the slot after the most
/// recently written one, so the physical order of the slots stops matching
/// arrival order. [`HistoryRing::entries`] always reports by sequence number.
///
/// Recording a line identical to the most recently recorded one does not take
/// a new slot; the existing entry is given the new sequence number instead.
#[derive(Debug, Default)]
pub struct HistoryRing {
    slots: Vec<HistoryEntry>,
    last: Option<usize>,
    seq: u64,
}

impl HistoryRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted line and return the sequence number it was given.
    pub fn record(&mut self, line: &str) -> u64 {
        self.seq += 1;
        let seq = self.seq;

        if let Some(last) = self.last {
            if self.slots[last].line == line {
                self.slots[last].seq = seq;
                return seq;
            }
        }

        let entry = HistoryEntry {
            seq,
            line: line.to_string(),
        };
        let next = match self.last {
            Some(last) if self.slots.len() == HISTORY_CAPACITY => {
                let next = (last + 1) % HISTORY_CAPACITY;
                self.slots[next] = entry;
                next
            }
            _ => {
                self.slots.push(entry);
                self.slots.len() - 1
            }
        };
        self.last = Some(next);
        seq
    }

    /// Entries ordered by ascending sequence number.
    pub fn entries(&self) -> Vec<&HistoryEntry> {
        let mut entries: Vec<&HistoryEntry> = self.slots.iter().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
