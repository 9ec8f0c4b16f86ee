use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::{
    config::EngineConfig,
    error::DeviceError,
    io::{
        bus::{self, BusRenderer, OutputBus},
        clock::AudioClock,
    },
};

/// Negotiated output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// A sink the render stage can be attached to.
///
/// Opening happens in two steps because the render stage must be built at the
/// sample rate the device actually negotiated.
pub trait AudioBackend {
    /// Pick an output format, preferring `preferred_sample_rate`.
    fn configure(&mut self, preferred_sample_rate: u32) -> Result<StreamInfo, DeviceError>;

    /// Hand the render stage to the output. The output starts suspended.
    fn start(&mut self, renderer: BusRenderer) -> Result<(), DeviceError>;

    fn resume(&mut self) -> Result<(), DeviceError>;

    fn suspend(&mut self) -> Result<(), DeviceError>;

    fn is_suspended(&self) -> bool;
}

struct Connection {
    info: StreamInfo,
    clock: AudioClock,
}

/// Owns the one output connection of an engine and the clock it drives.
pub struct DeviceManager<B> {
    backend: B,
    connection: Option<Connection>,
}

impl<B: AudioBackend> DeviceManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            connection: None,
        }
    }

    /// Acquire the output, attach a fresh bus, and resume it.
    ///
    /// On failure nothing is kept, so the call can be retried.
    pub fn open(&mut self, config: &EngineConfig) -> Result<OutputBus, DeviceError> {
        if self.connection.is_some() {
            return Err(DeviceError::AlreadyOpen);
        }

        let info = self.backend.configure(config.sample_rate)?;
        let clock = AudioClock::new(info.sample_rate as f32);
        let (bus, renderer) = bus::channel(config, clock.clone());

        self.backend.start(renderer)?;
        self.backend.resume()?;

        tracing::info!(
            device = %info.device_name,
            sample_rate = info.sample_rate,
            channels = info.channels,
            "audio output opened"
        );

        self.connection = Some(Connection { info, clock });
        Ok(bus)
    }

    /// Resume a suspended output. No-op when running or not open.
    pub fn resume(&mut self) -> Result<(), DeviceError> {
        if self.connection.is_some() && self.backend.is_suspended() {
            tracing::debug!("resuming suspended output");
            self.backend.resume()?;
        }
        Ok(())
    }

    pub fn suspend(&mut self) -> Result<(), DeviceError> {
        if self.connection.is_some() && !self.backend.is_suspended() {
            self.backend.suspend()?;
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn is_suspended(&self) -> bool {
        self.backend.is_suspended()
    }

    pub fn clock(&self) -> Option<&AudioClock> {
        self.connection.as_ref().map(|c| &c.clock)
    }

    pub fn info(&self) -> Option<&StreamInfo> {
        self.connection.as_ref().map(|c| &c.info)
    }
}

/// System audio output through cpal's default host.
pub struct CpalBackend {
    device: Option<cpal::Device>,
    config: Option<cpal::StreamConfig>,
    stream: Option<cpal::Stream>,
    suspended: bool,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            device: None,
            config: None,
            stream: None,
            suspended: true,
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn configure(&mut self, preferred_sample_rate: u32) -> Result<StreamInfo, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DeviceError::NoOutputDevice)?;

        let preferred = device
            .supported_output_configs()
            .map_err(|e| DeviceError::Config(e.to_string()))?
            .filter(|range| range.sample_format() == cpal::SampleFormat::F32)
            .find(|range| {
                range.min_sample_rate().0 <= preferred_sample_rate
                    && preferred_sample_rate <= range.max_sample_rate().0
            })
            .map(|range| range.with_sample_rate(cpal::SampleRate(preferred_sample_rate)));

        let supported = match preferred {
            Some(config) => config,
            None => device
                .default_output_config()
                .map_err(|e| DeviceError::Config(e.to_string()))?,
        };

        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(DeviceError::UnsupportedFormat(format!(
                "{:?}",
                supported.sample_format()
            )));
        }

        let config: cpal::StreamConfig = supported.into();
        let info = StreamInfo {
            device_name: device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };

        self.device = Some(device);
        self.config = Some(config);
        Ok(info)
    }

    fn start(&mut self, renderer: BusRenderer) -> Result<(), DeviceError> {
        let (Some(device), Some(config)) = (&self.device, &self.config) else {
            return Err(DeviceError::Config("output not configured".to_string()));
        };

        let channels = config.channels as usize;
        let mut renderer = renderer;
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    renderer
                        .clock()
                        .set_lookahead((data.len() / channels.max(1)) as u64);
                    renderer.render_interleaved(data, channels);
                },
                |err| tracing::error!(%err, "output stream error"),
                None,
            )
            .map_err(|e| DeviceError::BuildStream(e.to_string()))?;

        self.stream = Some(stream);
        self.suspended = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| DeviceError::Play(e.to_string()))?;
            self.suspended = false;
        }
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), DeviceError> {
        if let Some(stream) = &self.stream {
            stream.pause().map_err(|e| DeviceError::Pause(e.to_string()))?;
            self.suspended = true;
        }
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }
}
