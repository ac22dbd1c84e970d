//! rodio-backed audio sink for the playback lifecycle.

use std::io::Cursor;

use lector_core::{AudioHandle, AudioSink};
use rodio::{Decoder, OutputStreamHandle, Sink};

/// Plays synthesized MP3 payloads through the default output device.
///
/// The caller keeps the `rodio::OutputStream` alive for as long as the
/// sink is in use; only the (Send) handle is stored here.
pub struct RodioSink {
    handle: OutputStreamHandle,
}

impl RodioSink {
    pub fn new(handle: OutputStreamHandle) -> Self {
        Self { handle }
    }
}

impl AudioSink for RodioSink {
    fn start(&self, audio: Vec<u8>) -> Result<Box<dyn AudioHandle>, String> {
        let decoder = Decoder::new(Cursor::new(audio)).map_err(|e| e.to_string())?;
        let sink = Sink::try_new(&self.handle).map_err(|e| e.to_string())?;
        sink.append(decoder);
        sink.play();
        Ok(Box::new(RodioHandle { sink }))
    }
}

struct RodioHandle {
    sink: Sink,
}

impl AudioHandle for RodioHandle {
    fn pause(&self) {
        self.sink.pause();
    }

    fn resume(&self) {
        self.sink.play();
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}

impl Drop for RodioHandle {
    fn drop(&mut self) {
        self.sink.stop();
    }
}
