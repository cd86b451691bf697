//! Program Map Table sections, listing the elementary streams of one program.

use crate::packet::Pid;
use crate::psi::SectionError;
use crate::StreamType;
use log::warn;

/// The _table_id_ of Program Map Sections.
pub const TABLE_ID: u8 = 2;

/// The body of a Program Map Section: the data between the table syntax header and the CRC.
#[derive(Debug)]
pub struct PmtSection<'buf> {
    data: &'buf [u8],
}

impl<'buf> PmtSection<'buf> {
    // PCR_PID and program_info_length
    const FIXED_SIZE: usize = 4;

    pub fn from_bytes(data: &'buf [u8]) -> Result<PmtSection<'buf>, SectionError> {
        if data.len() < Self::FIXED_SIZE {
            return Err(SectionError::NotEnoughData {
                field: "PMT fixed fields",
                expected: Self::FIXED_SIZE,
                actual: data.len(),
            });
        }
        Ok(PmtSection { data })
    }

    /// The PID carrying this program's clock reference
    pub fn pcr_pid(&self) -> Pid {
        Pid::from_bytes(self.data[0], self.data[1])
    }

    /// Length of the program-level descriptors, which are skipped
    pub fn program_info_length(&self) -> usize {
        twelve_bits(self.data[2], self.data[3])
    }

    /// The streams listed in the section, in order.
    ///
    /// Listing stops early at an entry which does not fit in what remains of the section, and
    /// nothing is listed if the program descriptors overrun the section.
    pub fn streams(&self) -> impl Iterator<Item = StreamEntry> + 'buf {
        let start = Self::FIXED_SIZE + self.program_info_length();
        let entries: &'buf [u8] = match self.data.get(start..) {
            Some(entries) => entries,
            None => {
                warn!(
                    "PMT program_info_length {} overruns {} byte section",
                    self.program_info_length(),
                    self.data.len()
                );
                &[]
            }
        };
        StreamEntries { remaining: entries }
    }
}

fn twelve_bits(hi: u8, lo: u8) -> usize {
    usize::from(hi & 0b0000_1111) << 8 | usize::from(lo)
}

/// One elementary stream listed in a PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEntry {
    pub stream_type: StreamType,
    pub elementary_pid: Pid,
    /// Length of the stream's descriptors, which follow the fixed fields of the entry
    pub es_info_length: usize,
}

impl StreamEntry {
    const FIXED_SIZE: usize = 5;

    /// Decode the entry at the start of `data`, returning it with its total size.
    fn parse(data: &[u8]) -> Option<(StreamEntry, usize)> {
        if data.len() < Self::FIXED_SIZE {
            warn!(
                "{} trailing bytes in PMT, too few for a stream entry",
                data.len()
            );
            return None;
        }
        let entry = StreamEntry {
            stream_type: StreamType::from(data[0]),
            elementary_pid: Pid::from_bytes(data[1], data[2]),
            es_info_length: twelve_bits(data[3], data[4]),
        };
        let size = Self::FIXED_SIZE + entry.es_info_length;
        if size > data.len() {
            warn!(
                "PMT entry for {:?} claims {} bytes of descriptors, only {} remain",
                entry.elementary_pid,
                entry.es_info_length,
                data.len() - Self::FIXED_SIZE
            );
            return None;
        }
        Some((entry, size))
    }
}

struct StreamEntries<'buf> {
    remaining: &'buf [u8],
}

impl<'buf> Iterator for StreamEntries<'buf> {
    type Item = StreamEntry;

    fn next(&mut self) -> Option<StreamEntry> {
        if self.remaining.is_empty() {
            return None;
        }
        match StreamEntry::parse(self.remaining) {
            Some((entry, size)) => {
                self.remaining = &self.remaining[size..];
                Some(entry)
            }
            None => {
                self.remaining = &[];
                None
            }
        }
    }
}
