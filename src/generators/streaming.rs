//! Playback straight from a decoder, for audio too long to hold in memory.
//!
//! A background thread decodes and resamples into fixed-size blocks that
//! cross to the audio thread over one ring and come back empty over another,
//! so neither side allocates once running. Seeks are tagged with a
//! generation number; blocks decoded before the seek are thrown away.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rtrb::{Consumer, Producer, RingBuffer};

use super::{check_gain, check_position, GeneratorNode, GeneratorSlot, SharedPosition};
use crate::context::Context;
use crate::dsp::resample::LinearResampler;
use crate::engine::command::{Command, GeneratorCommand};
use crate::engine::event::{EventKind, EventSink};
use crate::error::Result;
use crate::handle::{impl_object, Generator, HandleInner};
use crate::io::{open_decoder, AudioDecoder, StreamHandle};
use crate::library::ensure_initialized;
use crate::{BLOCK_SIZE, SR};

/// Blocks decoded ahead of playback.
const QUEUED_BLOCKS: usize = 16;
const CONTROL_CAPACITY: usize = 64;
const IDLE_SLEEP: Duration = Duration::from_millis(2);
const DECODE_CHUNK_FRAMES: usize = 1024;

struct Block {
    samples: Vec<f32>,
    frames: usize,
    generation: u64,
    /// Playback position in seconds after this block.
    position: f64,
    /// Times the stream wrapped while filling this block.
    loops: u32,
    finished: bool,
}

impl Block {
    fn new(channels: usize) -> Self {
        Self {
            samples: vec![0.0; BLOCK_SIZE * channels],
            frames: 0,
            generation: 0,
            position: 0.0,
            loops: 0,
            finished: false,
        }
    }
}

enum Control {
    Seek { generation: u64, seconds: f64 },
    Looping(bool),
}

/// Pulls frames out of a decoder one at a time, wrapping when looping.
struct FrameReader {
    decoder: Box<dyn AudioDecoder>,
    channels: usize,
    chunk: Vec<f32>,
    pos: usize,
    len: usize,
    looping: bool,
    wraps: u32,
    /// Set once the decoder has produced anything, so an empty stream never loops.
    decoded_any: bool,
    frames_since_wrap: u64,
}

impl FrameReader {
    fn next_frame(&mut self, dst: &mut [f32]) -> bool {
        let mut rewound = false;
        loop {
            if self.pos < self.len {
                let c = self.channels;
                dst.copy_from_slice(&self.chunk[self.pos * c..(self.pos + 1) * c]);
                self.pos += 1;
                self.frames_since_wrap += 1;
                return true;
            }
            match self.decoder.read_frames(&mut self.chunk) {
                Ok(0) => {
                    // Rewinding twice without a frame in between means nothing is left to play.
                    if !self.looping || rewound || !self.decoded_any {
                        return false;
                    }
                    if let Err(err) = self.decoder.seek_seconds(0.0) {
                        tracing::warn!(error = %err, "failed to rewind stream for looping");
                        return false;
                    }
                    rewound = true;
                    self.wraps += 1;
                    self.frames_since_wrap = 0;
                }
                Ok(frames) => {
                    self.decoded_any = true;
                    self.pos = 0;
                    self.len = frames;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "stream decode failed");
                    return false;
                }
            }
        }
    }

    fn seek(&mut self, seconds: f64) {
        if !self.decoder.supports_seek() {
            tracing::warn!("stream does not support seeking");
            return;
        }
        if let Err(err) = self.decoder.seek_seconds(seconds) {
            tracing::warn!(error = %err, seconds, "stream seek failed");
        }
        self.pos = 0;
        self.len = 0;
        self.frames_since_wrap = 0;
    }
}

/// The decoding side, run on its own thread.
struct StreamWorker {
    reader: FrameReader,
    resampler: LinearResampler,
    filled: Producer<Block>,
    recycled: Consumer<Block>,
    control: Consumer<Control>,
    spare: Vec<Block>,
    generation: u64,
    /// Output frames since the start of the stream.
    played: u64,
    ended: bool,
}

impl StreamWorker {
    fn run(mut self) {
        tracing::trace!("stream worker started");
        while !self.filled.is_abandoned() {
            self.handle_control();
            while let Ok(block) = self.recycled.pop() {
                self.spare.push(block);
            }
            if self.ended || self.filled.is_full() || self.spare.is_empty() {
                thread::sleep(IDLE_SLEEP);
                continue;
            }
            if let Some(mut block) = self.spare.pop() {
                self.fill(&mut block);
                if let Err(rtrb::PushError::Full(block)) = self.filled.push(block) {
                    self.spare.push(block);
                }
            }
        }
        tracing::trace!("stream worker exiting");
    }

    fn handle_control(&mut self) {
        while let Ok(control) = self.control.pop() {
            match control {
                Control::Seek {
                    generation,
                    seconds,
                } => {
                    self.generation = generation;
                    self.reader.seek(seconds);
                    self.resampler.reset();
                    self.played = (seconds * SR as f64) as u64;
                    self.ended = false;
                }
                Control::Looping(looping) => {
                    self.reader.looping = looping;
                    if looping && self.ended {
                        // The decoder sits at its end; the next fill wraps it.
                        self.resampler.reset();
                        self.ended = false;
                    }
                }
            }
        }
    }

    fn fill(&mut self, block: &mut Block) {
        let channels = self.reader.channels;
        let reader = &mut self.reader;
        reader.wraps = 0;
        let mut frames = 0;
        for frame in block.samples.chunks_exact_mut(channels) {
            if !self.resampler.next_frame(frame, |dst| reader.next_frame(dst)) {
                break;
            }
            frames += 1;
        }
        block.samples[frames * channels..].fill(0.0);
        if reader.wraps > 0 {
            self.played = reader.frames_since_wrap * SR as u64 / reader.decoder.sample_rate().max(1) as u64;
        } else {
            self.played += frames as u64;
        }
        self.ended = frames < BLOCK_SIZE;
        block.frames = frames;
        block.generation = self.generation;
        block.position = self.played as f64 / SR as f64;
        block.loops = reader.wraps;
        block.finished = self.ended;
    }
}

pub(crate) struct StreamingNode {
    channels: usize,
    filled: Consumer<Block>,
    recycled: Producer<Block>,
    control: Producer<Control>,
    generation: u64,
    looping: bool,
    finished_sent: bool,
    shared: SharedPosition,
}

impl StreamingNode {
    fn send(&mut self, control: Control) {
        if self.control.push(control).is_err() {
            tracing::warn!("stream control ring full, dropping request");
        }
    }
}

impl GeneratorNode for StreamingNode {
    fn channels(&self) -> usize {
        self.channels
    }

    fn generate(&mut self, out: &mut [f32], events: &mut EventSink<'_>) {
        loop {
            let Ok(block) = self.filled.pop() else {
                if !self.finished_sent {
                    tracing::trace!("streaming generator underrun");
                }
                return;
            };
            if block.generation != self.generation {
                let _ = self.recycled.push(block);
                continue;
            }
            let n = block.frames * self.channels;
            out[..n].copy_from_slice(&block.samples[..n]);
            self.shared.store(block.position);
            for _ in 0..block.loops {
                events.emit(EventKind::Looped);
            }
            // A looping stream that ran out before looping reached the worker resumes.
            if block.finished && !self.looping && !self.finished_sent {
                self.finished_sent = true;
                events.emit(EventKind::Finished);
            }
            let _ = self.recycled.push(block);
            return;
        }
    }

    fn apply(&mut self, command: GeneratorCommand) {
        match command {
            GeneratorCommand::Seek(seconds) => {
                self.generation += 1;
                self.finished_sent = false;
                self.shared.store(seconds);
                let generation = self.generation;
                self.send(Control::Seek {
                    generation,
                    seconds,
                });
            }
            GeneratorCommand::Looping(looping) => {
                self.looping = looping;
                if looping {
                    self.finished_sent = false;
                }
                self.send(Control::Looping(looping));
            }
            _ => {}
        }
    }
}

/// Spawn the worker for `decoder` and return the node that plays its output.
fn spawn_stream(decoder: Box<dyn AudioDecoder>, shared: SharedPosition) -> Result<StreamingNode> {
    let channels = decoder.channels();
    let resampler = LinearResampler::new(channels, decoder.sample_rate(), SR);
    let (filled_tx, filled_rx) = RingBuffer::new(QUEUED_BLOCKS);
    let (recycled_tx, recycled_rx) = RingBuffer::new(QUEUED_BLOCKS);
    let (control_tx, control_rx) = RingBuffer::new(CONTROL_CAPACITY);
    let worker = StreamWorker {
        reader: FrameReader {
            decoder,
            channels,
            chunk: vec![0.0; DECODE_CHUNK_FRAMES * channels],
            pos: 0,
            len: 0,
            looping: false,
            wraps: 0,
            decoded_any: false,
            frames_since_wrap: 0,
        },
        resampler,
        filled: filled_tx,
        recycled: recycled_rx,
        control: control_rx,
        spare: (0..QUEUED_BLOCKS).map(|_| Block::new(channels)).collect(),
        generation: 0,
        played: 0,
        ended: false,
    };
    thread::Builder::new()
        .name("roomtone-stream".into())
        .spawn(move || worker.run())?;
    Ok(StreamingNode {
        channels,
        filled: filled_rx,
        recycled: recycled_tx,
        control: control_tx,
        generation: 0,
        looping: false,
        finished_sent: false,
        shared,
    })
}

#[derive(Debug, Clone, Copy)]
struct StreamingProps {
    gain: f64,
    looping: bool,
}

/// Plays a stream as it decodes.
#[derive(Clone)]
pub struct StreamingGenerator {
    inner: Arc<HandleInner<StreamingProps>>,
    position: SharedPosition,
    channels: usize,
}

impl_object!(StreamingGenerator, Generator);

impl StreamingGenerator {
    pub fn from_stream_params(
        context: &Context,
        protocol: &str,
        path: &str,
        options: Option<&str>,
    ) -> Result<Self> {
        Self::from_stream_handle(
            context,
            StreamHandle::from_stream_params(protocol, path, options)?,
        )
    }

    pub fn from_file(context: &Context, path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::from_stream_handle(context, StreamHandle::from_file(path)?)
    }

    pub fn from_stream_handle(context: &Context, stream: StreamHandle) -> Result<Self> {
        ensure_initialized()?;
        let description = stream.description().to_string();
        let decoder = open_decoder(stream)?;
        let channels = decoder.channels();
        let position = SharedPosition::default();
        let node = spawn_stream(decoder, position.clone())?;
        let id = context.allocate_id();
        let inner = HandleInner::register(
            context,
            id,
            StreamingProps {
                gain: 1.0,
                looping: false,
            },
            Command::InsertGenerator {
                id,
                slot: Box::new(GeneratorSlot::new(node)),
            },
        );
        tracing::debug!(%id, source = %description, channels, "streaming generator created");
        Ok(Self {
            inner: Arc::new(inner),
            position,
            channels,
        })
    }

    fn send(&self, command: GeneratorCommand) {
        self.inner.submit(Command::Generator {
            id: self.inner.id(),
            command,
        });
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn gain(&self) -> f64 {
        self.inner.props().gain
    }

    pub fn set_gain(&self, gain: f64) -> Result<()> {
        check_gain(gain)?;
        self.inner.props().gain = gain;
        self.send(GeneratorCommand::Gain(gain));
        Ok(())
    }

    pub fn looping(&self) -> bool {
        self.inner.props().looping
    }

    pub fn set_looping(&self, looping: bool) {
        self.inner.props().looping = looping;
        self.send(GeneratorCommand::Looping(looping));
    }

    /// Seconds played, as of the last block handed to the mixer.
    pub fn playback_position(&self) -> f64 {
        self.position.load()
    }

    pub fn set_playback_position(&self, seconds: f64) -> Result<()> {
        check_position(seconds)?;
        self.position.store(seconds);
        self.send(GeneratorCommand::Seek(seconds));
        Ok(())
    }
}
