//! The table of elementary streams discovered so far, keyed by PID.
//!
//! Streams are registered from two places: [`ProgramTableTracker`](crate::demultiplex::ProgramTableTracker)
//! registers the streams listed in a _Program Map Table_, and [`PesDemuxer`](crate::pes::PesDemuxer)
//! registers streams whose PES headers are seen before any PMT mentions them.  The first
//! registration of a PID wins, and is never changed afterwards.

use crate::packet::Pid;
use crate::EsType;
use log::info;

/// Where the classification of a stream came from.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Origin {
    /// The stream's `stream_type` was given in a _Program Map Table_
    ProgramMap,
    /// The stream was classified from the _stream_id_ in its first PES header.  Later headers on
    /// the same PID must carry the same `stream_id`.
    PesHeader { stream_id: u8 },
}

/// The persistent state of one registered elementary stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct StreamState {
    /// The kind of content in the stream
    pub es_type: EsType,
    /// The sequence number of this stream among the streams of the same `es_type`, starting at
    /// `1`.  Always `0` for `EsType::Other`, which is not numbered.
    pub number: u16,
    /// How the stream came to be registered
    pub origin: Origin,
}

/// The result of `StreamRegistry::register()`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Registration {
    /// The PID was not previously registered, and now has the given state
    New(StreamState),
    /// The PID was already registered, and keeps its existing state
    Existing(StreamState),
}

impl Registration {
    /// The state of the stream, whether newly assigned or pre-existing
    pub fn state(&self) -> StreamState {
        match *self {
            Registration::New(s) | Registration::Existing(s) => s,
        }
    }
}

/// PID-indexed table of [`StreamState`], with independent sequence numbering for audio and
/// video streams.
pub struct StreamRegistry {
    streams: Vec<Option<StreamState>>,
    audio_count: u16,
    video_count: u16,
}

impl Default for StreamRegistry {
    fn default() -> Self {
        StreamRegistry {
            streams: vec![None; Pid::PID_COUNT],
            audio_count: 0,
            video_count: 0,
        }
    }
}

impl StreamRegistry {
    /// The state of the stream on the given PID, if it has been registered
    pub fn get(&self, pid: Pid) -> Option<StreamState> {
        self.streams[usize::from(pid)]
    }

    /// Register the stream on `pid` as having the given type, unless it is registered already.
    ///
    /// A new audio or video stream is given the next sequence number for its type.
    pub fn register(&mut self, pid: Pid, es_type: EsType, origin: Origin) -> Registration {
        let slot = &mut self.streams[usize::from(pid)];
        if let Some(existing) = *slot {
            return Registration::Existing(existing);
        }
        let number = match es_type {
            EsType::Audio => {
                self.audio_count += 1;
                self.audio_count
            }
            EsType::Video => {
                self.video_count += 1;
                self.video_count
            }
            EsType::Other => 0,
        };
        let state = StreamState {
            es_type,
            number,
            origin,
        };
        *slot = Some(state);
        if es_type.is_media() {
            info!("new {} stream #{} on PID {} ({:?})", es_type, number, pid, origin);
        }
        Registration::New(state)
    }

    /// The number of registered streams, of any type
    pub fn len(&self) -> usize {
        self.streams.iter().filter(|s| s.is_some()).count()
    }

    /// `true` if no stream has been registered yet
    pub fn is_empty(&self) -> bool {
        self.streams.iter().all(|s| s.is_none())
    }

    /// Iterate over the registered streams, in order of PID
    pub fn iter(&self) -> impl Iterator<Item = (Pid, StreamState)> + '_ {
        self.streams
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|s| (Pid::new(i as u16), s)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn independent_numbering() {
        let mut reg = StreamRegistry::default();
        assert!(reg.is_empty());
        assert_matches!(
            reg.register(
                Pid::new(0x100),
                EsType::Video,
                Origin::PesHeader { stream_id: 0xe0 }
            ),
            Registration::New(StreamState { number: 1, .. })
        );
        assert_matches!(
            reg.register(Pid::new(0x101), EsType::Audio, Origin::ProgramMap),
            Registration::New(StreamState { number: 1, .. })
        );
        assert_matches!(
            reg.register(Pid::new(0x102), EsType::Other, Origin::ProgramMap),
            Registration::New(StreamState { number: 0, .. })
        );
        assert_matches!(
            reg.register(
                Pid::new(0x103),
                EsType::Audio,
                Origin::PesHeader { stream_id: 0xc1 }
            ),
            Registration::New(StreamState { number: 2, .. })
        );
        assert_eq!(reg.len(), 4);
        let pids: Vec<_> = reg.iter().map(|(pid, _)| u16::from(pid)).collect();
        assert_eq!(pids, vec![0x100, 0x101, 0x102, 0x103]);
    }

    #[test]
    fn first_registration_wins() {
        let mut reg = StreamRegistry::default();
        let pid = Pid::new(0x44);
        let first = reg
            .register(pid, EsType::Audio, Origin::PesHeader { stream_id: 0xc0 })
            .state();
        assert_eq!(
            reg.register(pid, EsType::Video, Origin::ProgramMap),
            Registration::Existing(first)
        );
        assert_eq!(reg.get(pid), Some(first));
        assert_eq!(reg.get(pid).map(|s| s.es_type), Some(EsType::Audio));
        // the rejected video registration did not consume a sequence number
        assert_matches!(
            reg.register(
                Pid::new(0x45),
                EsType::Video,
                Origin::PesHeader { stream_id: 0xe0 }
            ),
            Registration::New(StreamState { number: 1, .. })
        );
        assert_eq!(reg.get(Pid::new(0x46)), None);
    }
}
