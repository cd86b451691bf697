use clap::Parser;
use log::{error, info};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::process;
use ts_splitter::demultiplex::Demultiplex;
use ts_splitter::output::{OutputNameGenerator, OutputWriter};
use ts_splitter::reader::TsReader;

const DEFAULT_AUDIO_OUTPUT: &str = "audio_1.out";
const DEFAULT_VIDEO_OUTPUT: &str = "video_1.out";

/// Split an MPEG transport stream into its raw audio and video elementary streams.
///
/// Each stream is written to its own file, numbered from the given name template: `audio.mp2`
/// gives `audio.mp2`, `audio_2.mp2`, ... while `audio_1.mp2` gives `audio_1.mp2`,
/// `audio_2.mp2`, ...  If neither --oa nor --ov is given, audio goes to `audio_1.out` and video
/// to `video_1.out`.  If only one is given, streams of the other type are not written.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input transport stream file (standard input if omitted)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Name template for audio output files
    #[arg(long = "oa", value_name = "NAME")]
    audio_output: Option<String>,

    /// Name template for video output files
    #[arg(long = "ov", value_name = "NAME")]
    video_output: Option<String>,
}

impl Cli {
    fn name_generators(&self) -> (OutputNameGenerator, OutputNameGenerator) {
        match (&self.audio_output, &self.video_output) {
            (None, None) => (
                OutputNameGenerator::new(DEFAULT_AUDIO_OUTPUT),
                OutputNameGenerator::new(DEFAULT_VIDEO_OUTPUT),
            ),
            (audio, video) => (
                OutputNameGenerator::new(audio.as_deref().unwrap_or("")),
                OutputNameGenerator::new(video.as_deref().unwrap_or("")),
            ),
        }
    }
}

fn run(cli: &Cli) -> ts_splitter::Result<()> {
    let (audio, video) = cli.name_generators();
    let writer = OutputWriter::new(audio, video)?;
    let input: Box<dyn Read> = match cli.input {
        Some(ref path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };
    let mut reader = TsReader::new(BufReader::new(input));
    let mut demux = Demultiplex::new(writer);
    let result = reader.read_all(&mut demux);
    let stats = reader.stats();
    info!(
        "{} packets read, {} payloads, {} corrupted, {} resyncs, {} continuity errors",
        stats.packets, stats.payloads, stats.corrupted, stats.resyncs, stats.continuity_errors
    );
    let programs: Vec<u16> = demux.tables().programs().filter(|&n| n != 0).collect();
    let streams = demux.registry().len();
    let writer = demux.into_sink();
    let files = writer.paths().count();
    let finished = writer.finish();
    result?;
    info!(
        "{} elementary streams found in programs {:?}, {} written to files",
        streams, programs, files
    );
    finished
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        error!("{}", e);
        process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_outputs() {
        let cli = Cli::parse_from(["ts-splitter", "-i", "in.ts"]);
        assert_eq!(cli.input, Some(PathBuf::from("in.ts")));
        let (audio, video) = cli.name_generators();
        assert_eq!(audio.name(1).as_deref(), Some("audio_1.out"));
        assert_eq!(video.name(2).as_deref(), Some("video_2.out"));
    }

    #[test]
    fn audio_only() {
        let cli = Cli::parse_from(["ts-splitter", "--oa", "sound.mp2"]);
        assert_eq!(cli.input, None);
        let (audio, video) = cli.name_generators();
        assert_eq!(audio.name(1).as_deref(), Some("sound.mp2"));
        assert!(!video.is_enabled());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
