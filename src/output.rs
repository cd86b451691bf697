//! Writing of elementary stream data to numbered output files.

use crate::pes::{EsRawData, EsSink};
use crate::{EsType, Error, Result};
use log::{error, info};
use std::collections::btree_map::{BTreeMap, Entry};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Generates file names from a template such as `audio.mp2`.
///
/// Stream number 1 gets the template name itself, and later streams get `_2`, `_3` and so on
/// inserted before the extension (`audio_2.mp2`).  If the template already ends in `_1`
/// (`audio_1.mp2`), every name carries its number, including the first.
///
/// An empty template gives a disabled generator, which produces no names.
#[derive(Debug, Clone, Default)]
pub struct OutputNameGenerator {
    base: String,
    extension: Option<String>,
    number_first: bool,
}

impl OutputNameGenerator {
    /// Create a generator from the given template.  Only a `.` within the last path component
    /// starts the extension.
    pub fn new(template: &str) -> OutputNameGenerator {
        let file_start = template
            .rfind(std::path::is_separator)
            .map(|p| p + 1)
            .unwrap_or(0);
        let (mut base, extension) = match template[file_start..].rfind('.') {
            Some(p) if p > 0 => {
                let dot = file_start + p;
                (
                    template[..dot].to_string(),
                    Some(template[dot + 1..].to_string()),
                )
            }
            _ => (template.to_string(), None),
        };
        let number_first = base.len() > 2 && base.ends_with("_1");
        if number_first {
            base.truncate(base.len() - 2);
        }
        OutputNameGenerator {
            base,
            extension,
            number_first,
        }
    }

    /// `false` for a generator made from an empty template
    pub fn is_enabled(&self) -> bool {
        !self.base.is_empty()
    }

    /// The name for the stream with the given number, or `None` if this generator is disabled.
    pub fn name(&self, number: u16) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let mut name = self.base.clone();
        if number != 1 || self.number_first {
            name.push_str(&format!("_{}", number));
        }
        if let Some(ref ext) = self.extension {
            if !ext.is_empty() {
                name.push('.');
                name.push_str(ext);
            }
        }
        Some(name)
    }
}

#[derive(Debug)]
struct Output {
    path: PathBuf,
    file: BufWriter<File>,
}

impl Output {
    fn open(path: PathBuf) -> Result<Output> {
        match File::create(&path) {
            Ok(f) => {
                info!("writing {}", path.display());
                Ok(Output {
                    path,
                    file: BufWriter::new(f),
                })
            }
            Err(source) => Err(Error::CorruptedOutput {
                action: "open",
                path,
                source,
            }),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .write_all(data)
            .map_err(|source| self.failed("write", source))
    }

    fn close(mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|source| self.failed("close", source))
    }

    fn failed(&self, action: &'static str, source: io::Error) -> Error {
        Error::CorruptedOutput {
            action,
            path: self.path.clone(),
            source,
        }
    }
}

/// An [`EsSink`] writing each audio and video stream to its own file.
///
/// Files are created the first time data arrives for a stream.  Streams whose type has a
/// disabled name generator are discarded.
#[derive(Debug)]
pub struct OutputWriter {
    audio: OutputNameGenerator,
    video: OutputNameGenerator,
    outputs: BTreeMap<(EsType, u16), Option<Output>>,
}

impl OutputWriter {
    /// Fails with `Error::NoOutput` if both generators are disabled.
    pub fn new(audio: OutputNameGenerator, video: OutputNameGenerator) -> Result<OutputWriter> {
        if !audio.is_enabled() && !video.is_enabled() {
            return Err(Error::NoOutput);
        }
        Ok(OutputWriter {
            audio,
            video,
            outputs: BTreeMap::new(),
        })
    }

    /// The files opened so far, in order of stream type and number
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.outputs
            .values()
            .filter_map(|o| o.as_ref().map(|o| o.path.as_path()))
    }

    /// Flush and close every output file.  Each failure is logged, and the first returned.
    pub fn finish(self) -> Result<()> {
        let mut result = Ok(());
        for output in self.outputs.into_values().flatten() {
            if let Err(e) = output.close() {
                error!("{}", e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    fn generator(&self, es_type: EsType) -> Option<&OutputNameGenerator> {
        match es_type {
            EsType::Audio => Some(&self.audio),
            EsType::Video => Some(&self.video),
            EsType::Other => None,
        }
    }
}

impl EsSink for OutputWriter {
    fn es_data(&mut self, data: &EsRawData<'_>) -> Result<()> {
        let name = match self.generator(data.es_type) {
            Some(generator) => generator.name(data.number),
            None => return Ok(()),
        };
        let output = match self.outputs.entry((data.es_type, data.number)) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let output = match name {
                    Some(name) => Some(Output::open(PathBuf::from(name))?),
                    None => None,
                };
                e.insert(output)
            }
        };
        match output {
            Some(output) => output.write(data.data),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ts-splitter-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn names_without_number() {
        let gen = OutputNameGenerator::new("audio.mp2");
        assert_eq!(gen.name(1).as_deref(), Some("audio.mp2"));
        assert_eq!(gen.name(2).as_deref(), Some("audio_2.mp2"));
        assert_eq!(gen.name(10).as_deref(), Some("audio_10.mp2"));
    }

    #[test]
    fn names_with_number() {
        let gen = OutputNameGenerator::new("video_1.h264");
        assert_eq!(gen.name(1).as_deref(), Some("video_1.h264"));
        assert_eq!(gen.name(2).as_deref(), Some("video_2.h264"));
    }

    #[test]
    fn names_without_extension() {
        let gen = OutputNameGenerator::new("out_1");
        assert_eq!(gen.name(1).as_deref(), Some("out_1"));
        assert_eq!(gen.name(3).as_deref(), Some("out_3"));
        let gen = OutputNameGenerator::new("out");
        assert_eq!(gen.name(1).as_deref(), Some("out"));
        assert_eq!(gen.name(2).as_deref(), Some("out_2"));
    }

    #[test]
    fn short_base_keeps_suffix() {
        // "_1" alone is the whole base name, not a number suffix
        let gen = OutputNameGenerator::new("_1.es");
        assert_eq!(gen.name(1).as_deref(), Some("_1.es"));
        assert_eq!(gen.name(2).as_deref(), Some("_1_2.es"));
    }

    #[test]
    fn dot_in_directory() {
        let gen = OutputNameGenerator::new("out.d/audio");
        assert_eq!(gen.name(2).as_deref(), Some("out.d/audio_2"));
        let gen = OutputNameGenerator::new("out.d/.audio");
        assert_eq!(gen.name(1).as_deref(), Some("out.d/.audio"));
        let sep = std::path::MAIN_SEPARATOR;
        let gen = OutputNameGenerator::new(&format!("out.d{}audio_1", sep));
        assert_eq!(gen.name(2), Some(format!("out.d{}audio_2", sep)));
    }

    #[cfg(windows)]
    #[test]
    fn dot_in_windows_directory() {
        let gen = OutputNameGenerator::new(r"C:\out.d\audio");
        assert_eq!(gen.name(2).as_deref(), Some(r"C:\out.d\audio_2"));
        let gen = OutputNameGenerator::new(r"out.d/sub\.video");
        assert_eq!(gen.name(2).as_deref(), Some(r"out.d/sub\.video_2"));
    }

    #[test]
    fn disabled() {
        let gen = OutputNameGenerator::new("");
        assert!(!gen.is_enabled());
        assert_eq!(gen.name(1), None);
        assert!(!OutputNameGenerator::default().is_enabled());
    }

    #[test]
    fn writer_needs_an_output() {
        assert_matches!(
            OutputWriter::new(
                OutputNameGenerator::default(),
                OutputNameGenerator::default()
            ),
            Err(Error::NoOutput)
        );
    }

    #[test]
    fn writes_numbered_files() {
        let dir = temp_dir("writes");
        let audio = dir.join("audio.mp2");
        let video = dir.join("video_1.es");
        let mut writer = OutputWriter::new(
            OutputNameGenerator::new(audio.to_str().unwrap()),
            OutputNameGenerator::new(video.to_str().unwrap()),
        )
        .unwrap();
        let chunks: &[(EsType, u16, &[u8])] = &[
            (EsType::Audio, 1, &b"a1"[..]),
            (EsType::Video, 1, &b"v1"[..]),
            (EsType::Audio, 2, &b"a2"[..]),
            (EsType::Audio, 1, &b"a1 again"[..]),
            (EsType::Other, 1, &b"ignored"[..]),
        ];
        for &(es_type, number, data) in chunks {
            writer
                .es_data(&EsRawData {
                    es_type,
                    number,
                    data,
                })
                .unwrap();
        }
        assert_eq!(writer.paths().count(), 3);
        writer.finish().unwrap();
        assert_eq!(fs::read(dir.join("audio.mp2")).unwrap(), b"a1a1 again");
        assert_eq!(fs::read(dir.join("audio_2.mp2")).unwrap(), b"a2");
        assert_eq!(fs::read(dir.join("video_1.es")).unwrap(), b"v1");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn disabled_type_is_discarded() {
        let dir = temp_dir("disabled");
        let video = dir.join("video.es");
        let mut writer = OutputWriter::new(
            OutputNameGenerator::default(),
            OutputNameGenerator::new(video.to_str().unwrap()),
        )
        .unwrap();
        writer
            .es_data(&EsRawData {
                es_type: EsType::Audio,
                number: 1,
                data: b"a",
            })
            .unwrap();
        assert_eq!(writer.paths().count(), 0);
        writer.finish().unwrap();
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn open_failure() {
        let dir = temp_dir("open-failure");
        let video = dir.join("missing").join("video.es");
        let mut writer = OutputWriter::new(
            OutputNameGenerator::default(),
            OutputNameGenerator::new(video.to_str().unwrap()),
        )
        .unwrap();
        assert_matches!(
            writer.es_data(&EsRawData {
                es_type: EsType::Video,
                number: 1,
                data: b"v",
            }),
            Err(Error::CorruptedOutput { action: "open", .. })
        );
        fs::remove_dir_all(&dir).unwrap();
    }
}
