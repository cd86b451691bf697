//! Routing of packet payloads between the PSI table parser and the PES demuxer.
//!
//! [`Demultiplex`] is the [`PayloadConsumer`] which is given to a
//! [`TsReader`](crate::reader::TsReader).  Payloads on the PAT PID, or on any PID which the PAT
//! announced as carrying a PMT, go to the [`ProgramTableTracker`]; everything else goes to the
//! [`PesDemuxer`].

use crate::packet::{Pid, TsPayload};
use crate::pes::{EsSink, PesDemuxer};
use crate::psi::{self, pat, pmt};
use crate::reader::PayloadConsumer;
use crate::registry::{Origin, Registration, StreamRegistry};
use fixedbitset::FixedBitSet;
use log::{debug, info, warn};

/// Tracks the _Program Association_ and _Program Map_ tables, registering the elementary
/// streams that the PMTs list.
///
/// Only what has been announced is remembered; nothing is ever removed, and later versions of
/// a table can only add to the streams already known.
pub struct ProgramTableTracker {
    programs_seen: FixedBitSet,
    pmt_pids: FixedBitSet,
}

impl Default for ProgramTableTracker {
    fn default() -> ProgramTableTracker {
        ProgramTableTracker {
            programs_seen: FixedBitSet::with_capacity(0x10000),
            pmt_pids: FixedBitSet::with_capacity(Pid::PID_COUNT),
        }
    }
}

impl ProgramTableTracker {
    /// `true` if payloads on the given PID carry PAT or PMT sections
    pub fn is_table_pid(&self, pid: Pid) -> bool {
        pid == pat::PAT_PID || self.pmt_pids.contains(usize::from(pid))
    }

    /// The program numbers announced by the PAT so far, in ascending order.  `0` stands for the
    /// network information entry.
    pub fn programs(&self) -> impl Iterator<Item = u16> + '_ {
        self.programs_seen.ones().map(|n| n as u16)
    }

    /// Process a payload on a table PID.  Malformed sections are logged and ignored.
    pub fn consume(&mut self, registry: &mut StreamRegistry, payload: &TsPayload<'_>) {
        if !payload.unit_start {
            debug!(
                "{:?}: ignoring PSI payload which does not start a section",
                payload.pid
            );
            return;
        }
        if payload.pid == pat::PAT_PID {
            match psi::Section::from_payload(payload.data, pat::TABLE_ID) {
                Ok(sect) => self.new_pat_table(&pat::PatSection::new(sect.body())),
                Err(e) => warn!("{:?}: ignoring PAT section: {:?}", payload.pid, e),
            }
        } else {
            let sect = match psi::Section::from_payload(payload.data, pmt::TABLE_ID) {
                Ok(sect) => sect,
                Err(e) => {
                    warn!("{:?}: ignoring PMT section: {:?}", payload.pid, e);
                    return;
                }
            };
            let program_number = sect.table_syntax_header().id;
            match pmt::PmtSection::from_bytes(sect.body()) {
                Ok(pmt) => self.new_pmt_table(registry, payload.pid, program_number, &pmt),
                Err(e) => warn!(
                    "[PMT pid:{:?} program:{}] problem reading data: {:?}",
                    payload.pid, program_number, e
                ),
            }
        }
    }

    fn new_pat_table(&mut self, sect: &pat::PatSection<'_>) {
        for desc in sect.programs() {
            let program_number = desc.program_number();
            if self.programs_seen.put(usize::from(program_number)) {
                continue;
            }
            match desc {
                pat::ProgramDescriptor::Network { pid } => {
                    info!("network information on PID {}", pid);
                }
                pat::ProgramDescriptor::Program {
                    program_number,
                    pid,
                } => {
                    info!("program {} detected, PMT on PID {}", program_number, pid);
                    self.pmt_pids.insert(usize::from(pid));
                }
            }
        }
    }

    fn new_pmt_table(
        &mut self,
        registry: &mut StreamRegistry,
        pid: Pid,
        program_number: u16,
        sect: &pmt::PmtSection<'_>,
    ) {
        debug!(
            "[PMT pid:{:?} program:{}] PCR on {:?}",
            pid,
            program_number,
            sect.pcr_pid()
        );
        for entry in sect.streams() {
            let es_type = entry.stream_type.es_type();
            if let Registration::Existing(state) =
                registry.register(entry.elementary_pid, es_type, Origin::ProgramMap)
            {
                debug!(
                    "[PMT pid:{:?} program:{}] {:?} {:?} already registered as {:?}",
                    pid, program_number, entry.elementary_pid, entry.stream_type, state
                );
            }
        }
    }
}

/// Splits the payloads from a [`TsReader`](crate::reader::TsReader) into elementary stream data
/// for the given sink.
pub struct Demultiplex<S> {
    registry: StreamRegistry,
    tables: ProgramTableTracker,
    pes: PesDemuxer,
    sink: S,
}

impl<S: EsSink> Demultiplex<S> {
    /// Create a demultiplexer which will write to the given sink
    pub fn new(sink: S) -> Demultiplex<S> {
        Demultiplex {
            registry: StreamRegistry::default(),
            tables: ProgramTableTracker::default(),
            pes: PesDemuxer::default(),
            sink,
        }
    }

    /// The streams discovered so far
    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// The program tables seen so far
    pub fn tables(&self) -> &ProgramTableTracker {
        &self.tables
    }

    /// Give up the demultiplexer, returning the sink it was writing to
    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: EsSink> PayloadConsumer for Demultiplex<S> {
    fn consume(&mut self, payload: &TsPayload<'_>) -> crate::Result<()> {
        if self.tables.is_table_pid(payload.pid) {
            self.tables.consume(&mut self.registry, payload);
            Ok(())
        } else {
            self.pes.consume(&mut self.registry, payload, &mut self.sink)
        }
    }
}
