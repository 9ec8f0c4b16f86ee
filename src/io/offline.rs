use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    error::DeviceError,
    io::{
        bus::BusRenderer,
        device::{AudioBackend, StreamInfo},
    },
};

struct OfflineState {
    renderer: Option<BusRenderer>,
    suspended: bool,
    available: bool,
}

/// A backend with no hardware behind it. Audio is produced only when the
/// paired `OfflineHandle` pulls it, which makes rendering deterministic for
/// tests and for bouncing to a buffer.
pub struct OfflineBackend {
    sample_rate: u32,
    channels: u16,
    shared: Arc<Mutex<OfflineState>>,
}

/// Pull side of an `OfflineBackend`, standing in for the device callback.
#[derive(Clone)]
pub struct OfflineHandle {
    channels: u16,
    shared: Arc<Mutex<OfflineState>>,
}

fn lock(shared: &Mutex<OfflineState>) -> MutexGuard<'_, OfflineState> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OfflineBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            shared: Arc::new(Mutex::new(OfflineState {
                renderer: None,
                suspended: true,
                available: true,
            })),
        }
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels.max(1);
        self
    }

    pub fn handle(&self) -> OfflineHandle {
        OfflineHandle {
            channels: self.channels,
            shared: Arc::clone(&self.shared),
        }
    }
}

impl OfflineHandle {
    /// Render `frames` frames of interleaved output.
    ///
    /// A suspended or unopened output yields silence and leaves the clock
    /// where it is.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let channels = self.channels as usize;
        let mut data = vec![0.0f32; frames * channels];

        let mut state = lock(&self.shared);
        if state.suspended {
            return data;
        }
        if let Some(renderer) = state.renderer.as_mut() {
            renderer.render_interleaved(&mut data, channels);
        }
        data
    }

    /// Render and discard `seconds` of audio; returns the frame count.
    pub fn advance(&self, seconds: f32) -> usize {
        let frames = match lock(&self.shared).renderer.as_ref() {
            Some(renderer) => renderer.clock().frames_for(seconds) as usize,
            None => 0,
        };
        self.render(frames);
        frames
    }

    /// Make the next `configure` fail (or succeed again), modelling a device
    /// that disappears.
    pub fn set_available(&self, available: bool) {
        lock(&self.shared).available = available;
    }

    /// Suspend the output as a platform would before a user gesture.
    pub fn suspend(&self) {
        lock(&self.shared).suspended = true;
    }

    pub fn is_suspended(&self) -> bool {
        lock(&self.shared).suspended
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.shared).renderer.is_some()
    }
}

impl AudioBackend for OfflineBackend {
    fn configure(&mut self, _preferred_sample_rate: u32) -> Result<StreamInfo, DeviceError> {
        if !lock(&self.shared).available {
            return Err(DeviceError::NoOutputDevice);
        }

        Ok(StreamInfo {
            device_name: "offline".to_string(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }

    fn start(&mut self, renderer: BusRenderer) -> Result<(), DeviceError> {
        let mut state = lock(&self.shared);
        state.renderer = Some(renderer);
        state.suspended = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        lock(&self.shared).suspended = false;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), DeviceError> {
        lock(&self.shared).suspended = true;
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        lock(&self.shared).suspended
    }
}
