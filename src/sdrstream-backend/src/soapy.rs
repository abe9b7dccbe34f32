//! SoapySDR-backed radio device. Gated behind the `soapysdr-backend`
//! feature since it links against the system SoapySDR library.

use std::time::Duration;

use num_complex::Complex32;
use sdrstream_core::error::DynResult;
use sdrstream_core::radio::{RadioActuals, RadioConfig, RadioDevice, RecvOutcome};
use soapysdr::{Device, RxStream};

const TIMEOUT_US: i64 = 1_000_000;

pub struct SoapyDevice {
    device: Device,
    stream: Option<RxStream<Complex32>>,
    channel: usize,
}

impl SoapyDevice {
    pub fn open(args: &str) -> DynResult<Self> {
        let device = Device::new(args).or_else(|_| Device::new(""))?;
        Ok(SoapyDevice {
            device,
            stream: None,
            channel: 0,
        })
    }
}

impl RadioDevice for SoapyDevice {
    fn configure(&mut self, cfg: &RadioConfig) -> DynResult<RadioActuals> {
        self.device
            .set_sample_rate(soapysdr::Direction::Rx, self.channel, cfg.sample_rate_hz)?;
        self.device
            .set_frequency(soapysdr::Direction::Rx, self.channel, cfg.center_freq_hz, ())?;
        self.device
            .set_gain(soapysdr::Direction::Rx, self.channel, cfg.gain_db)?;
        self.device
            .set_bandwidth(soapysdr::Direction::Rx, self.channel, cfg.bandwidth_hz)?;

        let actual_rate = self
            .device
            .sample_rate(soapysdr::Direction::Rx, self.channel)?;
        let actual_freq = self
            .device
            .frequency(soapysdr::Direction::Rx, self.channel)?;
        let actual_gain = self.device.gain(soapysdr::Direction::Rx, self.channel)?;
        let actual_bw = self
            .device
            .bandwidth(soapysdr::Direction::Rx, self.channel)?;

        Ok(RadioActuals {
            center_freq_hz: actual_freq,
            sample_rate_hz: actual_rate,
            gain_db: actual_gain,
            bandwidth_hz: actual_bw,
        })
    }

    fn tune(&mut self, hz: f64) -> DynResult<f64> {
        self.device
            .set_frequency(soapysdr::Direction::Rx, self.channel, hz, ())?;
        Ok(self.device.frequency(soapysdr::Direction::Rx, self.channel)?)
    }

    fn set_gain(&mut self, db: f64) -> DynResult<f64> {
        self.device
            .set_gain(soapysdr::Direction::Rx, self.channel, db)?;
        Ok(self.device.gain(soapysdr::Direction::Rx, self.channel)?)
    }

    fn set_sample_rate(&mut self, hz: f64) -> DynResult<f64> {
        self.device
            .set_sample_rate(soapysdr::Direction::Rx, self.channel, hz)?;
        Ok(self
            .device
            .sample_rate(soapysdr::Direction::Rx, self.channel)?)
    }

    fn set_bandwidth(&mut self, hz: f64) -> DynResult<f64> {
        self.device
            .set_bandwidth(soapysdr::Direction::Rx, self.channel, hz)?;
        Ok(self
            .device
            .bandwidth(soapysdr::Direction::Rx, self.channel)?)
    }

    fn start(&mut self) -> DynResult<()> {
        let mut stream = self
            .device
            .rx_stream::<Complex32>(&[self.channel])?;
        stream.activate(None)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> DynResult<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.deactivate(None)?;
        }
        Ok(())
    }

    fn receive_block(
        &mut self,
        out: &mut [Complex32],
        _timeout: Duration,
    ) -> DynResult<RecvOutcome> {
        let stream = self
            .stream
            .as_mut()
            .ok_or("receive_block called before start")?;
        let mut bufs = [out];
        match stream.read(&mut bufs, TIMEOUT_US) {
            Ok(n) => Ok(RecvOutcome::Ok {
                samples: n,
                overflowed: false,
            }),
            Err(e) if e.code == soapysdr::ErrorCode::Timeout => Ok(RecvOutcome::TimedOut),
            Err(e) if e.code == soapysdr::ErrorCode::Overflow => Ok(RecvOutcome::Ok {
                samples: 0,
                overflowed: true,
            }),
            Err(e) => Err(Box::new(e)),
        }
    }
}
