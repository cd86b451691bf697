//! Splits an MPEG Transport Stream (per _ISO/IEC 13818-1_) into the raw audio and video
//! elementary streams it carries.
//!
//! # Pipeline
//!
//! The work is done by three stages which run synchronously, one packet at a time, on the
//! caller's thread:
//!
//!  * [`reader::TsReader`] frames the input byte stream into 188-byte packets, recovers
//!    synchronisation after corruption, tracks continuity counters and hands each usable payload
//!    to a [`reader::PayloadConsumer`].
//!  * [`demultiplex::ProgramTableTracker`] interprets _Program Association_ and _Program Map_
//!    table sections, learning which PIDs carry audio and which carry video.
//!  * [`pes::PesDemuxer`] strips PES headers from all other payloads and passes the remaining
//!    elementary stream bytes to an [`pes::EsSink`].
//!
//! [`demultiplex::Demultiplex`] ties the last two stages together, and owns the
//! [`registry::StreamRegistry`] through which both of them classify streams.
//!
//! # Design principles
//!
//!  * *Avoid copying*.  Payloads are borrowed slices of the reader's packet buffer and are only
//!    valid for the duration of the call which receives them.
//!  * *Two tiers of failure*.  Problems with the input framing, or with writing output, abort the
//!    run with an [`Error`].  Problems with individual packets, tables or PES headers are logged
//!    via the `log` crate and the offending payload is dropped.
//!  * *First writer wins*.  Once a PID has been classified as carrying audio, video or something
//!    else, that classification (and the stream number assigned with it) never changes.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible)]

pub mod demultiplex;
mod error;
mod mpegts_crc;
pub mod output;
pub mod packet;
pub mod pes;
pub mod psi;
pub mod reader;
pub mod registry;

pub use error::{Error, Result};

use std::fmt;

/// The value `0x1fff`, which transport stream 'stuffing' packets are carried on.
pub const STUFFING_PID: packet::Pid = packet::Pid::new(0x1fff);

/// The broad kind of content carried by an elementary stream.
///
/// Only `Audio` and `Video` streams produce output; `Other` streams are classified so that their
/// packets can be recognised and discarded.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub enum EsType {
    /// An audio elementary stream
    Audio,
    /// A video elementary stream
    Video,
    /// Subtitles, teletext, private data and anything else
    Other,
}

impl EsType {
    /// `true` for the kinds of stream which are extracted into output files.
    pub fn is_media(self) -> bool {
        matches!(self, EsType::Audio | EsType::Video)
    }
}

impl fmt::Display for EsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EsType::Audio => "audio",
            EsType::Video => "video",
            EsType::Other => "other",
        })
    }
}

/// The `stream_type` value given for each elementary stream listed in a _Program Map Table_.
///
/// Only a handful of the standard (and de-facto standard private) values are named here; any
/// `u8` value may be represented.  The value determines the [`EsType`] of the stream via
/// [`StreamType::es_type()`].
#[derive(PartialEq, Eq, Hash, Clone, Copy)]
pub struct StreamType(u8);

impl StreamType {
    /// _ISO/IEC 11172-2_ (MPEG-1) video
    pub const ISO_11172_VIDEO: StreamType = StreamType(0x01);
    /// _Rec. ITU-T H.262_ (MPEG-2) video
    pub const H262: StreamType = StreamType(0x02);
    /// _ISO/IEC 11172-3_ (MPEG-1) audio
    pub const ISO_11172_AUDIO: StreamType = StreamType(0x03);
    /// _ISO/IEC 13818-3_ (MPEG-2) audio
    pub const ISO_13818_3_AUDIO: StreamType = StreamType(0x04);
    /// _ISO/IEC 13818-7_ audio with ADTS transport syntax
    pub const ADTS: StreamType = StreamType(0x0f);
    /// _ISO/IEC 14496-2_ visual
    pub const ISO_14496_2_VISUAL: StreamType = StreamType(0x10);
    /// _ISO/IEC 14496-3_ audio with LATM transport syntax
    pub const LATM: StreamType = StreamType(0x11);
    /// _Rec. ITU-T H.264_ video
    pub const H264: StreamType = StreamType(0x1b);
    /// _ISO/IEC 14496-3_ audio without additional transport syntax
    pub const ISO_14496_3_AUDIO: StreamType = StreamType(0x1c);
    /// _Rec. ITU-T H.265_ video
    pub const H265: StreamType = StreamType(0x24);
    /// Chinese video standard (AVS)
    pub const CAVS: StreamType = StreamType(0x42);
    /// ATSC Dolby Digital (AC-3) audio
    pub const AC3: StreamType = StreamType(0x81);
    /// ATSC Enhanced AC-3 audio
    pub const EAC3: StreamType = StreamType(0x87);

    /// Classify the stream as audio, video or neither.
    pub fn es_type(self) -> EsType {
        match self.0 {
            0x03 | 0x04 | 0x0f | 0x11 | 0x1c | 0x80..=0x87 | 0x91 | 0xc1 | 0xc2 | 0xcf => {
                EsType::Audio
            }
            0x01 | 0x02 | 0x10 | 0x1b | 0x24 | 0x42 | 0xd1 | 0xdb | 0xea => EsType::Video,
            _ => EsType::Other,
        }
    }
}
impl From<u8> for StreamType {
    fn from(val: u8) -> Self {
        StreamType(val)
    }
}
impl From<StreamType> for u8 {
    fn from(val: StreamType) -> Self {
        val.0
    }
}
impl fmt::Debug for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamType({:#04x})", self.0)
    }
}
