//! Framing of a byte stream into transport stream packets.
//!
//! [`TsReader`] pulls bytes from any [`std::io::Read`] implementation one packet at a time,
//! establishes (and if necessary re-establishes) packet alignment, and hands the payload of each
//! packet that should be processed to a [`PayloadConsumer`].

use crate::packet::{ContinuityCounter, Packet, Pid, TsPayload};
use crate::psi::pat;
use crate::{Error, Result};
use log::{debug, warn};
use std::io;

/// Receives the payloads of the packets read by [`TsReader`].
///
/// The payload borrows the reader's packet buffer, which is overwritten by the next packet, so
/// the consumer must have finished with the data by the time `consume()` returns.
pub trait PayloadConsumer {
    /// Process the payload of one packet.  Returning an error stops the reader.
    fn consume(&mut self, payload: &TsPayload<'_>) -> Result<()>;
}

/// Counts of the packets seen by a [`TsReader`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStats {
    /// Packets read with a valid sync byte
    pub packets: u64,
    /// Payloads passed on to the consumer
    pub payloads: u64,
    /// Packets dropped because their _transport_error_indicator_ was set
    pub corrupted: u64,
    /// Times that packet alignment was lost and had to be recovered
    pub resyncs: u64,
    /// Packets whose continuity counter did not follow the previous one on the same PID
    pub continuity_errors: u64,
}

/// Per-PID continuity tracking.
///
/// A PID for which no counter has been recorded has not yet seen the start of a payload unit,
/// and its packets are dropped until one arrives.
struct ContinuityTracker {
    last: Vec<Option<ContinuityCounter>>,
}

impl Default for ContinuityTracker {
    fn default() -> Self {
        ContinuityTracker {
            last: vec![None; Pid::PID_COUNT],
        }
    }
}

impl ContinuityTracker {
    /// Returns `false` if the packet should be dropped because the PID has not started yet.
    fn accept(
        &mut self,
        pid: Pid,
        unit_start: bool,
        cc: ContinuityCounter,
        stats: &mut ReaderStats,
    ) -> bool {
        let last = &mut self.last[usize::from(pid)];
        let prev = *last;
        match prev {
            None if !unit_start => {
                debug!("{:?}: dropping packet preceding first payload unit start", pid);
                false
            }
            None => {
                *last = Some(cc);
                true
            }
            Some(prev) => {
                let expected = prev.next();
                if cc != expected {
                    warn!(
                        "{:?}: continuity counter sequence broken, expected {} got {}",
                        pid,
                        expected.value(),
                        cc.value()
                    );
                    stats.continuity_errors += 1;
                }
                *last = Some(cc);
                true
            }
        }
    }
}

/// PAT, plus the range of PIDs which may be assigned to PMTs and elementary streams.  Other
/// standard tables and the stuffing PID are never of interest.
fn is_eligible(pid: Pid) -> bool {
    pid == pat::PAT_PID || (u16::from(pid) >= 0x0010 && pid != crate::STUFFING_PID)
}

/// Reads transport stream packets from `R`.
///
/// Alignment is first established by finding a sync byte which is followed, one packet later,
/// by another sync byte (or by the end of the input).  Failing to find one is fatal.  If a packet
/// later turns out not to start with a sync byte, the same search is made again, but failure
/// then just ends the stream.
pub struct TsReader<R> {
    source: R,
    buf: [u8; Packet::SIZE],
    peeked: Option<u8>,
    eof: bool,
    synchronised: bool,
    continuity: ContinuityTracker,
    stats: ReaderStats,
}

impl<R: io::Read> TsReader<R> {
    /// Create a reader which will pull bytes from the given source.  Buffering of the source is
    /// left to the caller.
    pub fn new(source: R) -> TsReader<R> {
        TsReader {
            source,
            buf: [0; Packet::SIZE],
            peeked: None,
            eof: false,
            synchronised: false,
            continuity: ContinuityTracker::default(),
            stats: ReaderStats::default(),
        }
    }

    /// The counts accumulated so far
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Read packets until the end of the input, passing payloads to `consumer`.
    ///
    /// Returns an error if the input could not be read, if packet alignment could not be
    /// established, or if the consumer returned an error.
    pub fn read_all<C: PayloadConsumer>(&mut self, consumer: &mut C) -> Result<()> {
        loop {
            let len = self.fill(0)?;
            if len == 0 {
                return Ok(());
            }
            if len < Packet::SIZE {
                return self.truncated(len);
            }
            let aligned = if self.synchronised {
                Packet::is_sync_byte(self.buf[0])
            } else {
                self.is_aligned()?
            };
            if !aligned {
                if self.synchronised {
                    warn!("lost packet synchronisation, searching for next sync byte");
                    self.stats.resyncs += 1;
                }
                if !self.resync()? {
                    return Ok(());
                }
            }
            self.synchronised = true;
            self.process(consumer)?;
        }
    }

    fn truncated(&self, len: usize) -> Result<()> {
        if self.synchronised {
            warn!("input ends with a truncated packet of {} bytes", len);
            Ok(())
        } else {
            Err(Error::CorruptedInput(format!(
                "only {} bytes of input, too short to hold a transport stream packet",
                len
            )))
        }
    }

    /// `true` if the buffer starts with a sync byte, and the next packet does too (or there is no
    /// next packet).
    fn is_aligned(&mut self) -> Result<bool> {
        if !Packet::is_sync_byte(self.buf[0]) {
            return Ok(false);
        }
        Ok(match self.peek()? {
            Some(b) => Packet::is_sync_byte(b),
            None => true,
        })
    }

    /// Slide the buffer forward through the input until it is aligned with a packet.  Returns
    /// `false` if the input ended first.
    fn resync(&mut self) -> Result<bool> {
        let mut skipped = 0;
        loop {
            let shift = self.buf[1..]
                .iter()
                .position(|&b| Packet::is_sync_byte(b))
                .map(|p| p + 1)
                .unwrap_or(Packet::SIZE);
            if shift == Packet::SIZE && self.synchronised {
                warn!("corrupted TS packet, no sync byte found in {} bytes", Packet::SIZE);
            }
            skipped += shift;
            self.buf.copy_within(shift.., 0);
            let len = self.fill(Packet::SIZE - shift)?;
            if len < Packet::SIZE {
                if self.synchronised {
                    warn!(
                        "input ended while searching for sync byte, {} bytes discarded",
                        skipped + len
                    );
                    return Ok(false);
                }
                return Err(Error::CorruptedInput(format!(
                    "no transport stream packet alignment found in {} bytes of input",
                    skipped + len
                )));
            }
            if self.is_aligned()? {
                debug!("packet alignment found after skipping {} bytes", skipped);
                return Ok(true);
            }
        }
    }

    fn process<C: PayloadConsumer>(&mut self, consumer: &mut C) -> Result<()> {
        self.stats.packets += 1;
        let pk = match Packet::parse(&self.buf) {
            Some(pk) => pk,
            None => return Ok(()),
        };
        let pid = pk.pid;
        if pk.corrupted {
            warn!("{:?}: transport_error_indicator set, dropping packet", pid);
            self.stats.corrupted += 1;
            return Ok(());
        }
        if !pk.adaptation.has_payload() || !is_eligible(pid) {
            return Ok(());
        }
        let unit_start = pk.unit_start;
        if !self
            .continuity
            .accept(pid, unit_start, pk.continuity, &mut self.stats)
        {
            return Ok(());
        }
        let data = match pk.payload() {
            Some(data) => data,
            None => return Ok(()),
        };
        self.stats.payloads += 1;
        consumer.consume(&TsPayload {
            pid,
            unit_start,
            data,
        })
    }

    /// Fill the buffer from position `from` onwards, returning the number of valid bytes in the
    /// buffer, which is less than `Packet::SIZE` only at the end of the input.
    fn fill(&mut self, from: usize) -> Result<usize> {
        let mut pos = from;
        if pos < Packet::SIZE {
            if let Some(b) = self.peeked.take() {
                self.buf[pos] = b;
                pos += 1;
            }
        }
        while pos < Packet::SIZE && !self.eof {
            match self.source.read(&mut self.buf[pos..]) {
                Ok(0) => self.eof = true,
                Ok(n) => pos += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(read_error(e)),
            }
        }
        Ok(pos)
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        let mut b = [0u8; 1];
        while self.peeked.is_none() && !self.eof {
            match self.source.read(&mut b) {
                Ok(0) => self.eof = true,
                Ok(_) => self.peeked = Some(b[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(read_error(e)),
            }
        }
        Ok(self.peeked)
    }
}

fn read_error(e: io::Error) -> Error {
    Error::CorruptedInput(format!("read failed: {}", e))
}
