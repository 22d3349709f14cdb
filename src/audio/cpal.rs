// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Platform output through cpal.
//!
//! The stream callback pulls straight from a [`SampleProvider`] into the
//! device buffer. A pull that fails, or an error from the stream itself, marks
//! the device as faulted: the callback outputs silence from then on and the
//! owning thread learns about it through [`OutputDevice::check`] or
//! [`OutputDevice::wait_for_fault`], which dispose the stream and return
//! [`AudioError::EngineFault`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{error, info};

use super::error::AudioError;
use super::format::WaveFormat;
use super::SampleProvider;

/// An output device found while listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// Shared between the stream callbacks and the owner. Only the first fault is reported.
#[derive(Clone)]
struct FaultReporter {
    faulted: Arc<AtomicBool>,
    sender: Sender<String>,
}

impl FaultReporter {
    fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    fn report(&self, message: String) {
        if !self.faulted.swap(true, Ordering::AcqRel) {
            // Capacity is one and only the first report gets here.
            let _ = self.sender.try_send(message);
        }
    }
}

fn fault_channel() -> (FaultReporter, Receiver<String>) {
    let (sender, receiver) = crossbeam_channel::bounded(1);
    (
        FaultReporter {
            faulted: Arc::new(AtomicBool::new(false)),
            sender,
        },
        receiver,
    )
}

/// Fills one device buffer from the provider. Never blocks or allocates.
fn render(provider: &dyn SampleProvider, data: &mut [f32], reporter: &FaultReporter) {
    if reporter.is_faulted() {
        data.fill(0.0);
        return;
    }

    let count = data.len();
    match provider.read(data, 0, count) {
        Ok(written) => {
            if written < count {
                data[written..].fill(0.0);
            }
        }
        Err(e) => {
            data.fill(0.0);
            error!(err = %e, "Engine read failed, silencing output");
            reporter.report(e.to_string());
        }
    }
}

/// A running output stream fed by a [`SampleProvider`].
pub struct OutputDevice {
    name: String,
    format: WaveFormat,
    stream: Option<cpal::Stream>,
    faults: Receiver<String>,
    reporter: FaultReporter,
    fault: Option<String>,
}

impl OutputDevice {
    /// Lists every output device on every available host.
    pub fn list() -> Result<Vec<DeviceInfo>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id).map_err(|e| AudioError::Device(e.to_string()))?;
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(DeviceInfo {
                        name: device_name(&device)?,
                        host: host_id.name().to_string(),
                        max_channels,
                    });
                }
            }
        }

        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }

    /// Opens the named device, or the default one, and starts pulling from `provider`.
    pub fn open(provider: Arc<dyn SampleProvider>, name: Option<&str>) -> Result<Self, AudioError> {
        let format = provider.format();
        let device = match name {
            Some(name) => find_device(name)?,
            None => cpal::default_host()
                .default_output_device()
                .ok_or_else(|| AudioError::Device("no default output device".to_string()))?,
        };
        let name = device_name(&device)?;

        let config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: format.sample_rate.into(),
            buffer_size: cpal::BufferSize::Default,
        };

        let (reporter, faults) = fault_channel();
        let data_reporter = reporter.clone();
        let error_reporter = reporter.clone();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render(provider.as_ref(), data, &data_reporter);
                },
                move |err| {
                    error!(err = %err, "CPAL output stream error");
                    error_reporter.report(err.to_string());
                },
                None,
            )
            .map_err(|e| AudioError::Device(e.to_string()))?;
        stream
            .play()
            .map_err(|e| AudioError::Device(e.to_string()))?;

        info!(device = name, format = %format, "Output stream started");
        Ok(Self {
            name,
            format,
            stream: Some(stream),
            faults,
            reporter,
            fault: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> WaveFormat {
        self.format
    }

    /// Whether the stream is still running.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns the fault if the stream has failed, disposing it.
    pub fn check(&mut self) -> Result<(), AudioError> {
        if self.fault.is_none() {
            if let Ok(message) = self.faults.try_recv() {
                self.fail(message);
            }
        }
        self.fault_result()
    }

    /// Blocks for up to `timeout` waiting for a fault.
    pub fn wait_for_fault(&mut self, timeout: Duration) -> Result<(), AudioError> {
        if self.fault.is_none() {
            match self.faults.recv_timeout(timeout) {
                Ok(message) => self.fail(message),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
            }
        }
        self.fault_result()
    }

    /// Stops and releases the stream. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            info!(device = self.name, "Output stream disposed");
        }
    }

    fn fail(&mut self, message: String) {
        error!(device = self.name, err = message, "Output device faulted");
        self.dispose();
        self.fault = Some(message);
    }

    fn fault_result(&self) -> Result<(), AudioError> {
        match &self.fault {
            Some(message) => Err(AudioError::EngineFault(message.clone())),
            None => Ok(()),
        }
    }
}

impl Drop for OutputDevice {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for OutputDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputDevice")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("open", &self.is_open())
            .field("faulted", &self.reporter.is_faulted())
            .finish()
    }
}

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> Result<String, AudioError> {
    device.name().map_err(|e| AudioError::Device(e.to_string()))
}

fn find_device(name: &str) -> Result<cpal::Device, AudioError> {
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        let Ok(devices) = host.output_devices() else {
            continue;
        };
        for device in devices {
            if device_name(&device).is_ok_and(|device_name| device_name == name) {
                return Ok(device);
            }
        }
    }

    Err(AudioError::Device(format!("no output device named {}", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::AudioEngine;
    use crate::audio::format::OUTPUT_FORMAT;
    use crate::testutil::constant_sound;

    struct MockProvider {
        value: f32,
        written: Option<usize>,
        fail: bool,
    }

    impl SampleProvider for MockProvider {
        fn format(&self) -> WaveFormat {
            OUTPUT_FORMAT
        }

        fn read(
            &self,
            buffer: &mut [f32],
            offset: usize,
            count: usize,
        ) -> Result<usize, AudioError> {
            if self.fail {
                return Err(AudioError::Device("device gone".to_string()));
            }
            let written = self.written.unwrap_or(count);
            buffer[offset..offset + written].fill(self.value);
            Ok(written)
        }
    }

    fn detached(reporter: &FaultReporter, faults: Receiver<String>) -> OutputDevice {
        OutputDevice {
            name: "test".to_string(),
            format: OUTPUT_FORMAT,
            stream: None,
            faults,
            reporter: reporter.clone(),
            fault: None,
        }
    }

    #[test]
    fn test_render_fills_from_provider() {
        let (reporter, _faults) = fault_channel();
        let provider = MockProvider {
            value: 0.3,
            written: None,
            fail: false,
        };
        let mut data = vec![0.0; 16];
        render(&provider, &mut data, &reporter);
        assert!(data.iter().all(|s| *s == 0.3));
        assert!(!reporter.is_faulted());
    }

    #[test]
    fn test_render_zero_fills_short_reads() {
        let (reporter, _faults) = fault_channel();
        let provider = MockProvider {
            value: 0.3,
            written: Some(6),
            fail: false,
        };
        let mut data = vec![1.0; 16];
        render(&provider, &mut data, &reporter);
        assert!(data[..6].iter().all(|s| *s == 0.3));
        assert!(data[6..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_render_failure_faults_once() {
        let (reporter, faults) = fault_channel();
        let provider = MockProvider {
            value: 0.3,
            written: None,
            fail: true,
        };
        let mut data = vec![1.0; 16];
        render(&provider, &mut data, &reporter);
        render(&provider, &mut data, &reporter);

        assert!(data.iter().all(|s| *s == 0.0));
        assert!(reporter.is_faulted());
        assert_eq!(faults.try_recv().unwrap(), "Output device error: device gone");
        assert!(faults.try_recv().is_err());
    }

    #[test]
    fn test_render_from_engine() {
        let (reporter, _faults) = fault_channel();
        let engine = AudioEngine::new();
        let instance = Arc::new(constant_sound(0.5, 128, 2, 44100).create_instance());
        instance.set_looped(true);
        engine.play(instance);

        let mut data = vec![0.0; 32];
        render(&engine, &mut data, &reporter);
        assert!(data.iter().all(|s| *s == 0.5));
    }

    #[test]
    fn test_check_surfaces_fault() {
        let (reporter, faults) = fault_channel();
        let mut device = detached(&reporter, faults);
        assert!(device.check().is_ok());

        reporter.report("stream broke".to_string());
        assert!(matches!(device.check(), Err(AudioError::EngineFault(m)) if m == "stream broke"));
        assert!(matches!(device.check(), Err(AudioError::EngineFault(_))));
        assert!(!device.is_open());
    }

    #[test]
    fn test_wait_for_fault_times_out() {
        let (reporter, faults) = fault_channel();
        let mut device = detached(&reporter, faults);
        assert!(device.wait_for_fault(Duration::from_millis(10)).is_ok());

        reporter.report("late".to_string());
        assert!(device.wait_for_fault(Duration::from_millis(10)).is_err());
    }
}
