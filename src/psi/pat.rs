//! Program Association Table sections, which map program numbers to the PIDs of their PMTs.

use crate::packet::Pid;

/// The PAT is always carried on PID 0.
pub const PAT_PID: Pid = Pid::new(0);

/// The _table_id_ of Program Association Sections.
pub const TABLE_ID: u8 = 0;

/// One entry of the Program Association Table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramDescriptor {
    /// Program number 0, which gives the PID of the _Network Information Table_ rather than of
    /// a PMT
    Network { pid: Pid },
    /// A program, and the PID on which its PMT is carried
    Program { program_number: u16, pid: Pid },
}

impl ProgramDescriptor {
    const SIZE: usize = 4;

    fn parse(entry: &[u8]) -> ProgramDescriptor {
        let program_number = u16::from_be_bytes([entry[0], entry[1]]);
        let pid = Pid::from_bytes(entry[2], entry[3]);
        match program_number {
            0 => ProgramDescriptor::Network { pid },
            _ => ProgramDescriptor::Program {
                program_number,
                pid,
            },
        }
    }

    /// `0` for the network entry
    pub fn program_number(&self) -> u16 {
        match *self {
            ProgramDescriptor::Network { .. } => 0,
            ProgramDescriptor::Program { program_number, .. } => program_number,
        }
    }

    pub fn pid(&self) -> Pid {
        match *self {
            ProgramDescriptor::Network { pid } | ProgramDescriptor::Program { pid, .. } => pid,
        }
    }
}

/// The body of a Program Association Section: the data between the table syntax header and the
/// CRC.
#[derive(Clone, Debug)]
pub struct PatSection<'buf> {
    data: &'buf [u8],
}

impl<'buf> PatSection<'buf> {
    pub fn new(data: &'buf [u8]) -> PatSection<'buf> {
        PatSection { data }
    }

    /// The entries of the section, ignoring any trailing bytes too few to make a whole entry.
    pub fn programs(&self) -> impl Iterator<Item = ProgramDescriptor> + 'buf {
        self.data
            .chunks_exact(ProgramDescriptor::SIZE)
            .map(ProgramDescriptor::parse)
    }
}
