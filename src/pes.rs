//! Support for _Packetized Elementary Stream_ syntax within Transport Stream packet payloads.
//!
//! The [`PesDemuxer`] looks at every payload which is not part of a PSI table.  A payload which
//! starts a PES packet has its header skipped, and anything following the header, along with the
//! whole of every later payload on the same PID, is raw elementary stream data.  That data is
//! handed to an [`EsSink`] for any PID carrying audio or video.

use crate::packet::{Pid, TsPayload};
use crate::registry::{Origin, Registration, StreamRegistry, StreamState};
use crate::EsType;
use fixedbitset::FixedBitSet;
use log::{debug, warn};

/// Values which may be used for the `stream_id` field within the header of a PES packet.
///
/// See _ISO/IEC 13818-1_, _Table 2-22_.  Only the values which matter when classifying a stream
/// are distinguished.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StreamId {
    /// `private_stream_1`
    PrivateStream1,
    /// `padding_stream`
    PaddingStream,
    /// `private_stream_2`
    PrivateStream2,
    /// `0xc0` to `0xdf`: MPEG audio stream number `x`
    Audio(u8),
    /// `0xe0` to `0xef`: MPEG video stream number `x`
    Video(u8),
    /// Any other value
    Other(u8),
}
impl StreamId {
    /// The kind of elementary stream implied by this `stream_id` value
    pub fn es_type(self) -> EsType {
        match self {
            StreamId::Audio(_) => EsType::Audio,
            StreamId::Video(_) => EsType::Video,
            _ => EsType::Other,
        }
    }
}
impl From<u8> for StreamId {
    fn from(id: u8) -> Self {
        match id {
            0xbd => StreamId::PrivateStream1,
            0xbe => StreamId::PaddingStream,
            0xbf => StreamId::PrivateStream2,
            0xc0..=0xdf => StreamId::Audio(id - 0xc0),
            0xe0..=0xef => StreamId::Video(id - 0xe0),
            _ => StreamId::Other(id),
        }
    }
}
impl From<StreamId> for u8 {
    fn from(id: StreamId) -> u8 {
        match id {
            StreamId::PrivateStream1 => 0xbd,
            StreamId::PaddingStream => 0xbe,
            StreamId::PrivateStream2 => 0xbf,
            StreamId::Audio(n) => 0xc0 + n,
            StreamId::Video(n) => 0xe0 + n,
            StreamId::Other(id) => id,
        }
    }
}

/// Reasons for dropping a PES payload.  None of them stop processing.
#[derive(Debug, PartialEq, Eq)]
pub enum PesError {
    /// The header needs `requested` bytes, but the payload holds only `available`
    NotEnoughData { requested: usize, available: usize },
    /// The first three bytes of the PES header were not `0x000001`
    InvalidStartCode(u32),
    /// A payload continuing a PES packet was seen on a PID for which no PES header (and no PMT
    /// entry) has been seen
    OrphanContinuation,
    /// A PES header's `stream_id` differs from the one in the header which first classified the
    /// PID
    StreamIdConflict { registered: u8, detected: u8 },
}

/// The fixed header at the start of each PES packet, and the optional header which may follow
/// it.
#[derive(Debug)]
pub struct PesHeader<'buf> {
    buf: &'buf [u8],
}
impl<'buf> PesHeader<'buf> {
    const FIXED_HEADER_SIZE: usize = 6;
    const OPTIONAL_HEADER_SIZE: usize = 3;

    /// Fails unless `buf` starts with the `0x000001` start code and holds the whole fixed
    /// header.
    pub fn from_bytes(buf: &'buf [u8]) -> Result<PesHeader<'buf>, PesError> {
        if buf.len() < Self::FIXED_HEADER_SIZE {
            return Err(PesError::NotEnoughData {
                requested: Self::FIXED_HEADER_SIZE,
                available: buf.len(),
            });
        }
        let start_code = u32::from_be_bytes([0, buf[0], buf[1], buf[2]]);
        if start_code != 1 {
            return Err(PesError::InvalidStartCode(start_code));
        }
        Ok(PesHeader { buf })
    }

    /// `true` if the given payload begins with the PES 'start code prefix' and is long enough to
    /// hold the fixed part of a PES header
    pub fn is_header_start(buf: &[u8]) -> bool {
        buf.len() >= Self::FIXED_HEADER_SIZE && buf[0] == 0 && buf[1] == 0 && buf[2] == 1
    }

    /// Indicator of the type of stream per _ISO/IEC 13818-1_, _Table 2-22_.
    pub fn stream_id(&self) -> StreamId {
        self.buf[3].into()
    }

    fn has_optional_header(&self) -> bool {
        self.buf[Self::FIXED_HEADER_SIZE] >> 6 == 0b10
    }

    /// The offset within the buffer at which the elementary stream data begins.
    ///
    /// When the buffer holds nothing beyond the fixed header, the offset is the buffer length (so
    /// there is no elementary stream data).  When the optional header is present, it and the
    /// _PES_header_data_length_ bytes following it are skipped, and all of those bytes must be
    /// present in the buffer.
    pub fn payload_offset(&self) -> Result<usize, PesError> {
        let len = self.buf.len();
        if len <= Self::FIXED_HEADER_SIZE {
            return Ok(len);
        }
        if !self.has_optional_header() {
            return Ok(Self::FIXED_HEADER_SIZE);
        }
        let min = Self::FIXED_HEADER_SIZE + Self::OPTIONAL_HEADER_SIZE;
        if len < min {
            return Err(PesError::NotEnoughData {
                requested: min,
                available: len,
            });
        }
        let offset = min + self.buf[min - 1] as usize;
        if len < offset {
            return Err(PesError::NotEnoughData {
                requested: offset,
                available: len,
            });
        }
        Ok(offset)
    }
}

/// A chunk of raw elementary stream data, taken from the payload of a single packet.
#[derive(Debug, PartialEq, Eq)]
pub struct EsRawData<'buf> {
    /// Whether the data belongs to an audio or a video stream
    pub es_type: EsType,
    /// The sequence number of the stream among others of the same `es_type`, starting at `1`
    pub number: u16,
    /// The elementary stream bytes, never empty
    pub data: &'buf [u8],
}

/// Receives the elementary stream data extracted by [`PesDemuxer`].
///
/// An error returned by the sink is fatal, and stops processing of the transport stream.
pub trait EsSink {
    /// Handle one chunk of data.  The data is only borrowed for the duration of the call.
    fn es_data(&mut self, data: &EsRawData<'_>) -> crate::Result<()>;
}

/// Extracts elementary stream data from the PES packets carried in transport stream payloads.
pub struct PesDemuxer {
    orphan_warned: FixedBitSet,
}

impl Default for PesDemuxer {
    fn default() -> Self {
        PesDemuxer {
            orphan_warned: FixedBitSet::with_capacity(Pid::PID_COUNT),
        }
    }
}

impl PesDemuxer {
    /// Classify the stream to which `payload` belongs, and find the elementary stream data within
    /// it.
    ///
    /// Returns `Ok(None)` if the payload carries no data that would be written out: because it
    /// holds nothing but PES header, or because the stream is neither audio nor video.  A PID is
    /// registered on sight of its first PES header even if the rest of that header turns out to
    /// be malformed.
    pub fn extract<'buf>(
        &mut self,
        registry: &mut StreamRegistry,
        payload: &TsPayload<'buf>,
    ) -> Result<Option<EsRawData<'buf>>, PesError> {
        let (state, offset) = if payload.unit_start && PesHeader::is_header_start(payload.data) {
            let header = PesHeader::from_bytes(payload.data)?;
            let stream_id = header.stream_id();
            let detected = u8::from(stream_id);
            let registration = registry.register(
                payload.pid,
                stream_id.es_type(),
                Origin::PesHeader {
                    stream_id: detected,
                },
            );
            // a PMT classification takes precedence over whatever the PES header says
            if let Registration::Existing(StreamState {
                origin: Origin::PesHeader { stream_id: registered },
                ..
            }) = registration
            {
                if registered != detected {
                    return Err(PesError::StreamIdConflict {
                        registered,
                        detected,
                    });
                }
            }
            (registration.state(), header.payload_offset()?)
        } else {
            match registry.get(payload.pid) {
                Some(state) => (state, 0),
                None => return Err(PesError::OrphanContinuation),
            }
        };
        if !state.es_type.is_media() || offset == payload.data.len() {
            return Ok(None);
        }
        Ok(Some(EsRawData {
            es_type: state.es_type,
            number: state.number,
            data: &payload.data[offset..],
        }))
    }

    /// Pass any elementary stream data within `payload` to the given sink.
    ///
    /// Problems with the PES data are logged, and the payload dropped.  Only an error from the
    /// sink is returned.
    pub fn consume<S: EsSink>(
        &mut self,
        registry: &mut StreamRegistry,
        payload: &TsPayload<'_>,
        sink: &mut S,
    ) -> crate::Result<()> {
        match self.extract(registry, payload) {
            Ok(Some(es)) => sink.es_data(&es),
            Ok(None) => Ok(()),
            Err(PesError::OrphanContinuation) => {
                let idx = usize::from(payload.pid);
                if self.orphan_warned.contains(idx) {
                    debug!("{:?}: dropping orphaned PES continuation", payload.pid);
                } else {
                    warn!(
                        "{:?}: PES continuation without any preceding PES header; dropping",
                        payload.pid
                    );
                    self.orphan_warned.insert(idx);
                }
                Ok(())
            }
            Err(e) => {
                warn!("{:?}: dropping PES payload: {:?}", payload.pid, e);
                Ok(())
            }
        }
    }
}
