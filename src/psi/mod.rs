//! Types for processing tables of *Program Specific Information* in a transport stream.
//!
//! # Concepts
//!
//! * The *Program Association Table* ([`pat`]) lists the programs in the transport stream, and
//!   gives the PID on which each program's *Program Map Table* ([`pmt`]) is carried.
//! * The Program Map Table lists the elementary streams of which a program is composed.
//! * Tables are carried in *Sections*.  A packet whose _payload_unit_start_indicator_ is set
//!   begins with a _pointer_field_ giving the offset of the section within the payload.
//!
//! Only sections that fit within the payload of the packet which starts them are processed.
//! Each section is framed by [`Section::from_payload()`], which checks the table id, the length
//! and the CRC before any of the table body is interpreted.

pub mod pat;
pub mod pmt;

use crate::mpegts_crc;

/// Problems found while framing a PSI section.
///
/// These are never fatal to processing of the transport stream as a whole; the section which
/// produced the error is simply ignored.
#[derive(Debug, PartialEq, Eq)]
pub enum SectionError {
    /// The _pointer_field_ pointed past the end of the packet payload
    PointerBeyondPayload {
        /// the value of the _pointer_field_
        pointer: usize,
        /// the number of payload bytes following the _pointer_field_
        available: usize,
    },
    /// The section's _table_id_ was not the one expected on this PID
    WrongTableId {
        /// the table id expected on this PID
        expected: u8,
        /// the table id actually found
        actual: u8,
    },
    /// There was not enough data present to hold the named field
    NotEnoughData {
        /// the name of the field which could not be read
        field: &'static str,
        /// the number of bytes the field needs
        expected: usize,
        /// the number of bytes actually available
        actual: usize,
    },
    /// The _section_length_ exceeded the maximum of 1021 allowed for PAT and PMT sections
    SectionTooLong {
        /// the value of _section_length_
        length: usize,
    },
    /// The `CRC_32` at the end of the section did not match the section's content
    CrcMismatch,
    /// The section's _current_next_indicator_ said that it is not yet applicable
    NotCurrent,
}

/// Value of the _current_next_indicator_ field.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CurrentNext {
    /// The section is applicable now
    Current,
    /// The section will become applicable at some point in the future
    Next,
}

impl CurrentNext {
    fn from_bit(v: u8) -> CurrentNext {
        if v & 1 == 0 {
            CurrentNext::Next
        } else {
            CurrentNext::Current
        }
    }
}

/// The 3 bytes which begin every PSI section.
#[derive(Debug, Clone, Copy)]
pub struct SectionCommonHeader {
    pub table_id: u8,
    /// Set for sections followed by a [`TableSyntaxHeader`], as PAT and PMT sections always are
    pub section_syntax_indicator: bool,
    /// Count of the bytes after this header, up to and including the `CRC_32`
    pub section_length: usize,
}

impl SectionCommonHeader {
    pub const SIZE: usize = 3;

    fn parse(buf: &[u8]) -> SectionCommonHeader {
        SectionCommonHeader {
            table_id: buf[0],
            section_syntax_indicator: buf[1] & 0b1000_0000 != 0,
            section_length: usize::from(buf[1] & 0b0000_1111) << 8 | usize::from(buf[2]),
        }
    }
}

/// The 5 bytes that follow the [`SectionCommonHeader`] of sections using the 'section syntax'.
#[derive(Debug, Clone, Copy)]
pub struct TableSyntaxHeader {
    /// `transport_stream_id` in a PAT, `program_number` in a PMT
    pub id: u16,
    pub version: u8,
    pub current_next: CurrentNext,
    pub section_number: u8,
    pub last_section_number: u8,
}

impl TableSyntaxHeader {
    pub const SIZE: usize = 5;

    fn parse(buf: &[u8]) -> TableSyntaxHeader {
        TableSyntaxHeader {
            id: u16::from_be_bytes([buf[0], buf[1]]),
            version: (buf[2] >> 1) & 0b0001_1111,
            current_next: CurrentNext::from_bit(buf[2]),
            section_number: buf[3],
            last_section_number: buf[4],
        }
    }
}

/// A complete, CRC-checked, currently-applicable PSI section using the 'section syntax'.
#[derive(Debug)]
pub struct Section<'buf> {
    header: SectionCommonHeader,
    syntax: TableSyntaxHeader,
    body: &'buf [u8],
}

impl<'buf> Section<'buf> {
    const MAX_SECTION_LENGTH: usize = 1021;
    const CRC_SIZE: usize = 4;
    const HEADER_SIZE: usize = SectionCommonHeader::SIZE + TableSyntaxHeader::SIZE;

    /// Locate a section of the given `table_id` within the payload of a packet whose
    /// _payload_unit_start_indicator_ is set.
    ///
    /// The payload's initial _pointer_field_ is skipped, and the section is rejected if it has
    /// the wrong table id, if it does not fit within the payload, if its CRC does not match, or
    /// if it is not yet applicable.
    pub fn from_payload(payload: &'buf [u8], table_id: u8) -> Result<Section<'buf>, SectionError> {
        let (&pointer, rest) = payload
            .split_first()
            .ok_or(SectionError::NotEnoughData {
                field: "pointer_field",
                expected: 1,
                actual: 0,
            })?;
        let pointer = usize::from(pointer);
        let sect = rest
            .get(pointer..)
            .ok_or(SectionError::PointerBeyondPayload {
                pointer,
                available: rest.len(),
            })?;
        if sect.len() < SectionCommonHeader::SIZE {
            return Err(SectionError::NotEnoughData {
                field: "section header",
                expected: SectionCommonHeader::SIZE,
                actual: sect.len(),
            });
        }
        let header = SectionCommonHeader::parse(sect);
        if header.table_id != table_id {
            return Err(SectionError::WrongTableId {
                expected: table_id,
                actual: header.table_id,
            });
        }
        if header.section_length > Self::MAX_SECTION_LENGTH {
            return Err(SectionError::SectionTooLong {
                length: header.section_length,
            });
        }
        let min_length = TableSyntaxHeader::SIZE + Self::CRC_SIZE;
        if header.section_length < min_length {
            return Err(SectionError::NotEnoughData {
                field: "section_length",
                expected: min_length,
                actual: header.section_length,
            });
        }
        let total = SectionCommonHeader::SIZE + header.section_length;
        let data = sect.get(..total).ok_or(SectionError::NotEnoughData {
            field: "section",
            expected: total,
            actual: sect.len(),
        })?;
        // fuzzed input would almost never get past the CRC
        if !cfg!(fuzzing) && mpegts_crc::sum32(data) != 0 {
            return Err(SectionError::CrcMismatch);
        }
        let syntax = TableSyntaxHeader::parse(&data[SectionCommonHeader::SIZE..]);
        if syntax.current_next != CurrentNext::Current {
            return Err(SectionError::NotCurrent);
        }
        Ok(Section {
            header,
            syntax,
            body: &data[Self::HEADER_SIZE..total - Self::CRC_SIZE],
        })
    }

    pub fn header(&self) -> &SectionCommonHeader {
        &self.header
    }

    pub fn table_syntax_header(&self) -> &TableSyntaxHeader {
        &self.syntax
    }

    /// The table-specific content of the section, between the headers and the `CRC_32`.
    pub fn body(&self) -> &'buf [u8] {
        self.body
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use assert_matches::assert_matches;
    use bitstream_io::{BigEndian, BitWrite};
    use bitstream_io::{BitWriter, BE};
    use hex_literal::*;
    use std::io;

    pub(crate) fn make_test_data<F>(builder: F) -> Vec<u8>
    where
        F: Fn(&mut BitWriter<Vec<u8>, BE>) -> Result<(), io::Error>,
    {
        let data: Vec<u8> = Vec::new();
        let mut w = BitWriter::endian(data, BigEndian);
        builder(&mut w).unwrap();
        w.into_writer()
    }

    /// Wraps the given table body in a pointer field, a section header and a trailing CRC,
    /// producing a packet payload.
    pub(crate) fn make_section_payload(table_id: u8, id: u16, body: &[u8]) -> Vec<u8> {
        let section_length = (TableSyntaxHeader::SIZE + body.len() + 4) as u16;
        let mut sect = make_test_data(|w| {
            w.write(8, table_id)?;
            w.write_bit(true)?; // section_syntax_indicator
            w.write_bit(false)?;
            w.write(2, 0b11)?; // reserved
            w.write(12, section_length)?;
            w.write(16, id)?;
            w.write(2, 0b11)?; // reserved
            w.write(5, 0)?; // version_number
            w.write_bit(true)?; // current_next_indicator
            w.write(8, 0)?; // section_number
            w.write(8, 0) // last_section_number
        });
        sect.extend_from_slice(body);
        let crc = mpegts_crc::sum32(&sect);
        sect.extend_from_slice(&crc.to_be_bytes());
        let mut payload = vec![0]; // pointer_field
        payload.extend_from_slice(&sect);
        payload
    }

    #[test]
    fn valid_section() {
        let payload = make_section_payload(0, 0x1234, &hex!("0001 e100"));
        let sect = Section::from_payload(&payload, 0).unwrap();
        assert_eq!(sect.header().table_id, 0);
        assert!(sect.header().section_syntax_indicator);
        assert_eq!(sect.header().section_length, 13);
        let syntax = sect.table_syntax_header();
        assert_eq!(syntax.id, 0x1234);
        assert_eq!(syntax.version, 0);
        assert_eq!(syntax.current_next, CurrentNext::Current);
        assert_eq!((syntax.section_number, syntax.last_section_number), (0, 0));
        assert_eq!(sect.body(), &hex!("0001 e100")[..]);
    }

    #[test]
    fn pointer_field_skips_bytes() {
        let unpointed = make_section_payload(2, 1, &hex!("e100 f000"));
        let mut payload = vec![3, 0xff, 0xff, 0xff];
        payload.extend_from_slice(&unpointed[1..]);
        let sect = Section::from_payload(&payload, 2).unwrap();
        assert_eq!(sect.body(), &hex!("e100 f000")[..]);
    }

    #[test]
    fn pointer_beyond_payload() {
        let payload = hex!("05 0000");
        assert_matches!(
            Section::from_payload(&payload, 0),
            Err(SectionError::PointerBeyondPayload {
                pointer: 5,
                available: 2
            })
        );
    }

    #[test]
    fn empty_payload() {
        assert_matches!(
            Section::from_payload(&[], 0),
            Err(SectionError::NotEnoughData {
                field: "pointer_field",
                ..
            })
        );
    }

    #[test]
    fn wrong_table_id() {
        let payload = make_section_payload(2, 1, &hex!("e100 f000"));
        assert_matches!(
            Section::from_payload(&payload, 0),
            Err(SectionError::WrongTableId {
                expected: 0,
                actual: 2
            })
        );
    }

    #[test]
    fn truncated_section() {
        let payload = make_section_payload(0, 1, &hex!("0001 e100"));
        assert_matches!(
            Section::from_payload(&payload[..payload.len() - 1], 0),
            Err(SectionError::NotEnoughData {
                field: "section",
                ..
            })
        );
    }

    #[test]
    fn section_length_too_small() {
        // section_length of 4 leaves no room for the table syntax header
        let payload = hex!("00 00 b004 00000000");
        assert_matches!(
            Section::from_payload(&payload, 0),
            Err(SectionError::NotEnoughData {
                field: "section_length",
                ..
            })
        );
    }

    #[test]
    fn section_too_long() {
        let payload = hex!("00 00 b3fe");
        assert_matches!(
            Section::from_payload(&payload, 0),
            Err(SectionError::SectionTooLong { length: 0x3fe })
        );
    }

    #[test]
    fn crc_mismatch() {
        let payload = make_section_payload(0, 1, &hex!("0001 e100"));
        for i in 1..payload.len() {
            let mut corrupt = payload.clone();
            corrupt[i] ^= 0x01;
            assert!(
                Section::from_payload(&corrupt, 0).is_err(),
                "corruption at byte {} not detected",
                i
            );
        }
        let mut corrupt = payload;
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0x80;
        assert_matches!(
            Section::from_payload(&corrupt, 0),
            Err(SectionError::CrcMismatch)
        );
    }

    #[test]
    fn not_current() {
        let mut sect = hex!("00 b00d 0001 c0 0000 0001e100").to_vec();
        let crc = mpegts_crc::sum32(&sect);
        sect.extend_from_slice(&crc.to_be_bytes());
        let mut payload = vec![0];
        payload.extend_from_slice(&sect);
        assert_matches!(
            Section::from_payload(&payload, 0),
            Err(SectionError::NotCurrent)
        );
    }
}
