use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::pcm::{self, Frame};
use super::resample::RateConverter;
use crate::error::{RelayError, Result};
use crate::kernel::event::{Device, Event};

/// Turns arbitrary device callbacks into fixed-size mono frames at the capture rate.
/// Never holds more than one block between calls.
pub struct BlockAssembler {
    channels: usize,
    block_size: usize,
    converter: RateConverter,
    mono: Vec<f32>,
    block: Vec<f32>,
}

impl BlockAssembler {
    pub fn new(device_rate: u32, channels: u16, target_rate: u32, block_size: usize) -> Result<Self> {
        Ok(Self {
            channels: channels.max(1) as usize,
            block_size,
            converter: RateConverter::new(device_rate, target_rate)?,
            mono: Vec::new(),
            block: Vec::with_capacity(block_size),
        })
    }

    /// Feed interleaved samples; returns every block completed by this input.
    pub fn push(&mut self, interleaved: &[f32]) -> Vec<Frame> {
        self.mono.clear();
        if self.channels == 1 {
            self.mono.extend_from_slice(interleaved);
        } else {
            let channels = self.channels;
            self.mono.extend(
                interleaved
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
            );
        }

        let converted = match self.converter.process(&self.mono) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Dropping capture input: {}", e);
                return Vec::new();
            }
        };

        let mut frames = Vec::new();
        for sample in converted {
            self.block.push(sample);
            if self.block.len() == self.block_size {
                frames.push(Frame::new(pcm::convert_block(&self.block)));
                self.block.clear();
            }
        }
        frames
    }

    pub fn buffered(&self) -> usize {
        self.block.len()
    }
}

/// A running microphone stream. Dropping it severs the processing graph.
pub struct AudioCapture {
    _stream: cpal::Stream,
    pub sample_rate: u32,
}

impl AudioCapture {
    pub fn new(tx: mpsc::Sender<Event>, target_rate: u32, block_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(RelayError::NoDevice("input"))?;

        info!("Audio Input Device: {}", device.name().unwrap_or_default());

        // Prefer running the device at the capture rate so no resampling is needed.
        let mut selected = None;
        let configs = device
            .supported_input_configs()
            .map_err(|e| RelayError::Device(e.to_string()))?;
        for range in configs {
            if range.min_sample_rate().0 <= target_rate && range.max_sample_rate().0 >= target_rate {
                let candidate = range.with_sample_rate(cpal::SampleRate(target_rate));
                let mono = candidate.channels() == 1;
                selected = Some(candidate);
                if mono {
                    break;
                }
            }
        }
        let config = match selected {
            Some(c) => c,
            None => device
                .default_input_config()
                .map_err(|e| RelayError::Device(e.to_string()))?,
        };

        let device_rate = config.sample_rate().0;
        info!(
            "Audio Config Selected: Rate={}Hz, Channels={}, Format={:?}",
            device_rate,
            config.channels(),
            config.sample_format()
        );

        let mut assembler = BlockAssembler::new(device_rate, config.channels(), target_rate, block_size)?;
        let err_fn = |err| error!("an error occurred on input stream: {}", err);
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &_| forward(assembler.push(data), &tx),
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => {
                let mut scratch = Vec::new();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &_| {
                        scratch.clear();
                        scratch.extend(data.iter().map(|&s| pcm::i16_to_f32(s)));
                        forward(assembler.push(&scratch), &tx)
                    },
                    err_fn,
                    None,
                )
            }
            other => return Err(RelayError::SampleFormat(format!("{:?}", other))),
        }
        .map_err(|e| RelayError::Device(e.to_string()))?;

        stream.play().map_err(|e| RelayError::Device(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            sample_rate: device_rate,
        })
    }
}

fn forward(frames: Vec<Frame>, tx: &mpsc::Sender<Event>) {
    for frame in frames {
        // Hardware callback must not block; a full queue loses the block.
        if let Err(e) = tx.try_send(Event::CapturedBlock(frame)) {
            debug!("Captured block dropped: {}", e);
        }
    }
}

pub enum CaptureCommand {
    Start,
    Stop,
    Shutdown,
}

#[derive(Clone)]
pub struct CaptureController {
    cmd_tx: std::sync::mpsc::Sender<CaptureCommand>,
}

impl CaptureController {
    pub fn start(&self) {
        let _ = self.cmd_tx.send(CaptureCommand::Start);
    }

    pub fn stop(&self) {
        let _ = self.cmd_tx.send(CaptureCommand::Stop);
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(CaptureCommand::Shutdown);
    }
}

/// Owns the input stream on a dedicated thread (cpal streams are not `Send` everywhere).
pub struct CaptureActor {
    stream: Option<AudioCapture>,
    core_tx: mpsc::Sender<Event>,
    cmd_rx: std::sync::mpsc::Receiver<CaptureCommand>,
    target_rate: u32,
    block_size: usize,
}

impl CaptureActor {
    pub fn spawn(core_tx: mpsc::Sender<Event>, target_rate: u32, block_size: usize) -> CaptureController {
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let actor = Self {
                stream: None,
                core_tx,
                cmd_rx,
                target_rate,
                block_size,
            };
            actor.run()
        });
        CaptureController { cmd_tx }
    }

    fn run(mut self) {
        debug!("Capture actor started");
        while let Ok(cmd) = self.cmd_rx.recv() {
            match cmd {
                CaptureCommand::Start => {
                    if self.stream.is_some() {
                        debug!("Capture already running");
                        continue;
                    }
                    match AudioCapture::new(self.core_tx.clone(), self.target_rate, self.block_size) {
                        Ok(capture) => {
                            info!("Microphone capture started at {}Hz", capture.sample_rate);
                            self.stream = Some(capture);
                        }
                        Err(e) => {
                            error!("Failed to acquire microphone: {}", e);
                            let _ = self.core_tx.blocking_send(Event::DeviceFailed(Device::Microphone));
                        }
                    }
                }
                CaptureCommand::Stop => {
                    if self.stream.take().is_some() {
                        info!("Microphone capture stopped");
                    }
                }
                CaptureCommand::Shutdown => break,
            }
        }
        debug!("Capture actor exited");
    }
}
