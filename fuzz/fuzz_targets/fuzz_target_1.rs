#![no_main]

use libfuzzer_sys::fuzz_target;
use ts_splitter::demultiplex::Demultiplex;
use ts_splitter::pes::{EsRawData, EsSink};
use ts_splitter::reader::TsReader;

struct FuzzSink;
impl EsSink for FuzzSink {
    fn es_data(&mut self, _data: &EsRawData<'_>) -> ts_splitter::Result<()> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let mut reader = TsReader::new(data);
    let mut demux = Demultiplex::new(FuzzSink);
    let _ = reader.read_all(&mut demux);
});
