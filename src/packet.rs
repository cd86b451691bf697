//! Decoding of the fixed 4-byte header at the start of each transport stream packet, and the
//! [`TsPayload`] which the reader hands on for each packet it keeps.

use log::warn;
use std::fmt;

/// The 2-bit _adaptation_field_control_ field.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AdaptationControl {
    /// `0b00`, reserved.  Treated as carrying nothing.
    Reserved,
    /// `0b01`
    PayloadOnly,
    /// `0b10`
    AdaptationFieldOnly,
    /// `0b11`, an adaptation field followed by payload
    Both,
}

impl AdaptationControl {
    fn from_bits(bits: u8) -> AdaptationControl {
        match bits & 0b11 {
            0b01 => AdaptationControl::PayloadOnly,
            0b10 => AdaptationControl::AdaptationFieldOnly,
            0b11 => AdaptationControl::Both,
            _ => AdaptationControl::Reserved,
        }
    }

    pub fn has_payload(self) -> bool {
        matches!(self, AdaptationControl::PayloadOnly | AdaptationControl::Both)
    }

    pub fn has_adaptation_field(self) -> bool {
        matches!(
            self,
            AdaptationControl::AdaptationFieldOnly | AdaptationControl::Both
        )
    }
}

/// The 4-bit _continuity_counter_, which goes up by one (modulo 16) with each packet of a PID
/// that carries payload.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ContinuityCounter(u8);

impl ContinuityCounter {
    /// Only the low 4 bits of `bits` are used.
    #[inline]
    pub fn from_bits(bits: u8) -> ContinuityCounter {
        ContinuityCounter(bits & 0b1111)
    }

    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    /// The counter value expected on the following packet, wrapping from 15 to 0:
    ///
    /// ```rust
    /// # use ts_splitter::packet::ContinuityCounter;
    /// let last = ContinuityCounter::from_bits(15);
    /// assert_eq!(last.next(), ContinuityCounter::from_bits(0));
    /// ```
    #[inline]
    pub fn next(self) -> ContinuityCounter {
        ContinuityCounter::from_bits(self.0 + 1)
    }
}

/// A 13-bit Packet Identifier, naming one of the sub-streams multiplexed together in a
/// transport stream.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u16);

impl Pid {
    pub const MAX_VALUE: u16 = 0x1fff;

    /// Size of a table with one entry per PID
    pub const PID_COUNT: usize = Pid::MAX_VALUE as usize + 1;

    /// For constants.  Panics if `pid` exceeds `Pid::MAX_VALUE`.
    pub const fn new(pid: u16) -> Pid {
        assert!(pid <= Self::MAX_VALUE);
        Pid(pid)
    }

    /// Combine the 5 low bits of `hi` with `lo`, the layout used by packet headers and by PAT
    /// and PMT entries alike.
    pub(crate) fn from_bytes(hi: u8, lo: u8) -> Pid {
        Pid(u16::from(hi & 0b0001_1111) << 8 | u16::from(lo))
    }
}

impl From<Pid> for u16 {
    fn from(pid: Pid) -> u16 {
        pid.0
    }
}
impl From<Pid> for usize {
    fn from(pid: Pid) -> usize {
        usize::from(pid.0)
    }
}
impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pid({:04x})", self.0)
    }
}
impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// The decoded header of one transport stream packet (_ISO/IEC 13818-1_, 2.4.3.2), together
/// with the packet bytes it was decoded from.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'buf> {
    /// The _transport_error_indicator_, set upstream when the packet has uncorrectable errors
    pub corrupted: bool,
    /// The _payload_unit_start_indicator_: the payload begins a PES packet, or (after a
    /// _pointer_field_) a PSI section
    pub unit_start: bool,
    pub pid: Pid,
    pub adaptation: AdaptationControl,
    pub continuity: ContinuityCounter,
    buf: &'buf [u8],
}

impl<'buf> Packet<'buf> {
    pub const SYNC_BYTE: u8 = 0x47;
    pub const SIZE: usize = 188;

    const HEADER_SIZE: usize = 4;

    #[inline(always)]
    pub fn is_sync_byte(b: u8) -> bool {
        b == Self::SYNC_BYTE
    }

    /// Decode the header of `buf`, which must be exactly one packet starting with the sync byte.
    pub fn parse(buf: &'buf [u8]) -> Option<Packet<'buf>> {
        if buf.len() != Self::SIZE || !Self::is_sync_byte(buf[0]) {
            return None;
        }
        Some(Packet {
            corrupted: buf[1] & 0b1000_0000 != 0,
            unit_start: buf[1] & 0b0100_0000 != 0,
            pid: Pid::from_bytes(buf[1], buf[2]),
            adaptation: AdaptationControl::from_bits(buf[3] >> 4),
            continuity: ContinuityCounter::from_bits(buf[3]),
            buf,
        })
    }

    /// Where the payload starts: right after the header, or after the _adaptation_field_length_
    /// byte and the adaptation field it measures.  A malformed length can put this past the end
    /// of the packet.
    pub fn payload_offset(&self) -> usize {
        if self.adaptation.has_adaptation_field() {
            Self::HEADER_SIZE + 1 + usize::from(self.buf[Self::HEADER_SIZE])
        } else {
            Self::HEADER_SIZE
        }
    }

    /// The payload bytes, or `None` if the packet has no payload or the adaptation field leaves
    /// no room for one.  Never returns an empty slice.
    pub fn payload(&self) -> Option<&'buf [u8]> {
        if !self.adaptation.has_payload() {
            return None;
        }
        let offset = self.payload_offset();
        if offset > Self::SIZE {
            warn!(
                "{:?}: adaptation field of {} bytes overruns packet",
                self.pid,
                self.buf[Self::HEADER_SIZE]
            );
        }
        self.buf.get(offset..).filter(|p| !p.is_empty())
    }
}

/// The payload of one packet, as handed on by the [`reader`](crate::reader).
///
/// The `data` borrows the reader's packet buffer, and so is valid only for the duration of the
/// call which receives it.
#[derive(Debug, Clone, Copy)]
pub struct TsPayload<'buf> {
    /// The PID of the packet from which the payload was taken
    pub pid: Pid,
    /// The packet's _payload_unit_start_indicator_
    pub unit_start: bool,
    /// The payload bytes, never empty
    pub data: &'buf [u8],
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::*;

    fn packet_with_header(header: [u8; 5]) -> [u8; Packet::SIZE] {
        let mut buf = [0xffu8; Packet::SIZE];
        buf[..5].copy_from_slice(&header);
        buf
    }

    #[test]
    fn pid_formatting() {
        assert_eq!(format!("{:?}", Pid::new(0x101)), "Pid(0101)");
        assert_eq!(format!("{}", Pid::new(0x101)), "0x0101");
        assert_eq!(Pid::from_bytes(0xff, 0xff), Pid::new(0x1fff));
    }

    #[test]
    fn rejects_bad_buffers() {
        assert!(Packet::parse(&[]).is_none());
        assert!(Packet::parse(&[0u8; Packet::SIZE]).is_none());
        let buf = packet_with_header(hex!("47 00 20 10 00"));
        assert!(Packet::parse(&buf[..187]).is_none());
    }

    #[test]
    fn header_fields() {
        let buf = packet_with_header(hex!("47 c1 01 3a 00"));
        let pk = Packet::parse(&buf).unwrap();
        assert!(pk.corrupted);
        assert!(pk.unit_start);
        assert_eq!(pk.pid, Pid::new(0x101));
        assert_eq!(pk.adaptation, AdaptationControl::Both);
        assert_eq!(pk.continuity.value(), 0xa);
        // an empty adaptation field still has its length byte
        assert_eq!(pk.payload_offset(), 5);
        assert_eq!(pk.payload().map(<[u8]>::len), Some(Packet::SIZE - 5));
    }

    #[test]
    fn payload_only() {
        let buf = packet_with_header(hex!("47 1f ff 10 00"));
        let pk = Packet::parse(&buf).unwrap();
        assert!(!pk.corrupted);
        assert!(!pk.unit_start);
        assert_eq!(pk.pid, Pid::new(0x1fff));
        assert_eq!(pk.adaptation, AdaptationControl::PayloadOnly);
        assert_eq!(pk.payload_offset(), 4);
        assert_eq!(pk.payload().map(<[u8]>::len), Some(Packet::SIZE - 4));
    }

    #[test]
    fn no_payload() {
        let buf = packet_with_header(hex!("47 00 20 20 b7"));
        let pk = Packet::parse(&buf).unwrap();
        assert_eq!(pk.adaptation, AdaptationControl::AdaptationFieldOnly);
        assert!(!pk.adaptation.has_payload());
        assert!(pk.payload().is_none());

        let buf = packet_with_header(hex!("47 00 20 00 00"));
        let pk = Packet::parse(&buf).unwrap();
        assert_eq!(pk.adaptation, AdaptationControl::Reserved);
        assert!(pk.payload().is_none());
    }

    #[test]
    fn adaptation_field_fills_packet() {
        // 5 + 183 == 188, leaving nothing for the payload
        let buf = packet_with_header(hex!("47 00 20 30 b7"));
        let pk = Packet::parse(&buf).unwrap();
        assert_eq!(pk.payload_offset(), Packet::SIZE);
        assert!(pk.payload().is_none());
    }

    #[test]
    fn adaptation_field_too_long() {
        let buf = packet_with_header(hex!("47 00 20 30 c0"));
        let pk = Packet::parse(&buf).unwrap();
        assert!(pk.payload_offset() > Packet::SIZE);
        assert!(pk.payload().is_none());
    }

    #[test]
    fn continuity_wraps() {
        let cc = ContinuityCounter::from_bits;
        assert_eq!(cc(15).next(), cc(0));
        assert_eq!(cc(7).next(), cc(8));
        assert_ne!(cc(7).next(), cc(7));
        assert_eq!(cc(0xf3).value(), 3);
    }
}
