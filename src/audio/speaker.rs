use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::clip::Clip;
use super::pcm;
use super::resample::resample_all;
use crate::error::{RelayError, Result};
use crate::kernel::event::{Device, Event};

/// Default output stream fed from a ring buffer. Silence is written whenever the ring is empty.
struct SpeakerOutput {
    _stream: cpal::Stream,
    producer: HeapProd<f32>,
    sample_rate: u32,
    channels: usize,
}

impl SpeakerOutput {
    fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(RelayError::NoDevice("output"))?;
        info!("Audio Output Device: {}", device.name().unwrap_or_default());

        let config = device
            .default_output_config()
            .map_err(|e| RelayError::Device(e.to_string()))?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels().max(1) as usize;

        // Two seconds of headroom; `play` waits for space when a clip is longer.
        let rb = HeapRb::<f32>::new(sample_rate as usize * channels * 2);
        let (producer, mut consumer) = rb.split();

        let err_fn = |err| error!("an error occurred on output stream: {}", err);
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &_| {
                    let written = consumer.pop_slice(data);
                    data[written..].fill(0.0);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &_| {
                    for slot in data.iter_mut() {
                        *slot = consumer.try_pop().map(pcm::f32_to_i16).unwrap_or(0);
                    }
                },
                err_fn,
                None,
            ),
            other => return Err(RelayError::SampleFormat(format!("{:?}", other))),
        }
        .map_err(|e| RelayError::Device(e.to_string()))?;

        stream.play().map_err(|e| RelayError::Device(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            producer,
            sample_rate,
            channels,
        })
    }

    /// Blocks until the whole clip has been consumed by the device.
    fn play(&mut self, clip: &Clip) -> Result<()> {
        let mono: Vec<f32> = clip.samples().iter().map(|&s| pcm::i16_to_f32(s)).collect();
        let mono = resample_all(&mono, clip.sample_rate, self.sample_rate)?;
        let channels = self.channels;
        let interleaved: Vec<f32> = mono
            .iter()
            .flat_map(|&s| std::iter::repeat(s).take(channels))
            .collect();

        let mut offset = 0;
        while offset < interleaved.len() {
            let pushed = self.producer.push_slice(&interleaved[offset..]);
            offset += pushed;
            if pushed == 0 {
                std::thread::sleep(Duration::from_millis(5));
            }
        }

        while self.producer.occupied_len() > 0 {
            std::thread::sleep(Duration::from_millis(10));
        }
        Ok(())
    }
}

pub enum SpeakerCommand {
    Play(Clip),
    Shutdown,
}

#[derive(Clone)]
pub struct SpeakerController {
    cmd_tx: std::sync::mpsc::Sender<SpeakerCommand>,
}

impl SpeakerController {
    pub fn play(&self, clip: Clip) {
        let _ = self.cmd_tx.send(SpeakerCommand::Play(clip));
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(SpeakerCommand::Shutdown);
    }
}

/// Plays one clip at a time and reports `PlaybackFinished` after each, even on failure,
/// so the playback pipeline never stalls in `Playing`.
pub struct SpeakerActor {
    output: Option<SpeakerOutput>,
    core_tx: mpsc::Sender<Event>,
    cmd_rx: std::sync::mpsc::Receiver<SpeakerCommand>,
}

impl SpeakerActor {
    pub fn spawn(core_tx: mpsc::Sender<Event>) -> SpeakerController {
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let actor = Self {
                output: None,
                core_tx,
                cmd_rx,
            };
            actor.run()
        });
        SpeakerController { cmd_tx }
    }

    fn run(mut self) {
        debug!("Speaker actor started");
        while let Ok(cmd) = self.cmd_rx.recv() {
            match cmd {
                SpeakerCommand::Play(clip) => {
                    debug!("Playing clip: {}ms", clip.duration_ms());
                    if let Err(e) = self.play(&clip) {
                        error!("Playback failed: {}", e);
                        let _ = self.core_tx.blocking_send(Event::DeviceFailed(Device::Speaker));
                    }
                    let _ = self.core_tx.blocking_send(Event::PlaybackFinished);
                }
                SpeakerCommand::Shutdown => break,
            }
        }
        debug!("Speaker actor exited");
    }

    fn play(&mut self, clip: &Clip) -> Result<()> {
        if self.output.is_none() {
            self.output = Some(SpeakerOutput::open()?);
        }
        match self.output.as_mut() {
            Some(output) => output.play(clip),
            None => Err(RelayError::NoDevice("output")),
        }
    }
}
