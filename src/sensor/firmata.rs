//! Firmata adapter - analog pins of a board running StandardFirmata
//!
//! Only the small part of the protocol needed for analog polling is spoken:
//! `REPORT_ANALOG` to switch a pin's reporting on or off, and
//! `ANALOG_MESSAGE` frames carrying 10-bit values. Everything else the board
//! sends (digital reports, version, sysex replies) is skipped.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serialport::SerialPort;

use crate::error::SensorError;
use crate::reading::{RawSample, SensorKind};
use crate::sensor::{SensorHandle, SensorPins, SensorSource};

const ANALOG_MESSAGE: u8 = 0xE0;
const DIGITAL_MESSAGE: u8 = 0x90;
const REPORT_ANALOG: u8 = 0xC0;
const REPORT_VERSION: u8 = 0xF9;
const START_SYSEX: u8 = 0xF0;
const END_SYSEX: u8 = 0xF7;

/// Full-scale value of the board's 10-bit ADC
const ADC_MAX: f64 = 1023.0;

/// Encode a REPORT_ANALOG command for `pin`
pub fn report_analog(pin: u8, enable: bool) -> [u8; 2] {
    [REPORT_ANALOG | (pin & 0x0F), u8::from(enable)]
}

/// One decoded analog report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogValue {
    pub pin: u8,
    pub value: u16,
}

/// Incremental Firmata frame decoder
#[derive(Debug, Default)]
pub struct FirmataDecoder {
    command: Option<u8>,
    data: [u8; 2],
    len: usize,
    in_sysex: bool,
}

impl FirmataDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte, returning an analog value when a frame completes
    pub fn feed(&mut self, byte: u8) -> Option<AnalogValue> {
        if byte & 0x80 != 0 {
            self.command = None;
            self.len = 0;
            match byte {
                START_SYSEX => self.in_sysex = true,
                END_SYSEX => self.in_sysex = false,
                _ => {
                    self.in_sysex = false;
                    if Self::has_two_data_bytes(byte) {
                        self.command = Some(byte);
                    }
                }
            }
            return None;
        }

        if self.in_sysex {
            return None;
        }
        let command = self.command?;
        self.data[self.len] = byte;
        self.len += 1;
        if self.len < 2 {
            return None;
        }

        self.command = None;
        self.len = 0;
        if command & 0xF0 == ANALOG_MESSAGE {
            Some(AnalogValue {
                pin: command & 0x0F,
                value: u16::from(self.data[0]) | (u16::from(self.data[1]) << 7),
            })
        } else {
            None
        }
    }

    fn has_two_data_bytes(command: u8) -> bool {
        matches!(command & 0xF0, ANALOG_MESSAGE | DIGITAL_MESSAGE) || command == REPORT_VERSION
    }
}

/// Byte transport under a Firmata board
pub trait FirmataLink: Read + Write {
    /// Bytes that can be read without blocking
    fn bytes_available(&mut self) -> io::Result<usize>;
}

impl FirmataLink for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        let pending = self.bytes_to_read().map_err(io::Error::from)?;
        Ok(pending as usize)
    }
}

/// Open Firmata board with reporting enabled on the wired pins
pub struct FirmataBoard<L: FirmataLink = Box<dyn SerialPort>> {
    link: Option<L>,
    pins: SensorPins,
    decoder: FirmataDecoder,
    latest: HashMap<u8, u16>,
}

impl<L: FirmataLink> FirmataBoard<L> {
    /// Wrap an open link and enable analog reporting for every wired pin
    pub fn from_link(mut link: L, pins: SensorPins) -> Result<Self, SensorError> {
        for (kind, pin) in pins.configured() {
            debug!("[Firmata] enabling reporting for {} on A{}", kind, pin);
            link.write_all(&report_analog(pin, true))?;
        }
        link.flush()?;

        Ok(Self {
            link: Some(link),
            pins,
            decoder: FirmataDecoder::new(),
            latest: HashMap::new(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Decode everything the board has sent since the last call
    pub fn drain(&mut self) -> Result<usize, SensorError> {
        let link = self.link.as_mut().ok_or(SensorError::NotInitialized)?;
        let mut buf = [0u8; 256];
        let mut updates = 0;

        loop {
            let available = link.bytes_available()?;
            if available == 0 {
                break;
            }
            let take = available.min(buf.len());
            let n = link.read(&mut buf[..take])?;
            if n == 0 {
                break;
            }
            for &byte in &buf[..n] {
                if let Some(report) = self.decoder.feed(byte) {
                    if f64::from(report.value) > ADC_MAX {
                        return Err(SensorError::Protocol {
                            details: format!(
                                "analog value {} on A{} exceeds 10-bit range",
                                report.value, report.pin
                            ),
                        });
                    }
                    self.latest.insert(report.pin, report.value);
                    updates += 1;
                }
            }
        }

        Ok(updates)
    }
}

impl<L: FirmataLink> SensorHandle for FirmataBoard<L> {
    fn read(&mut self, kind: SensorKind) -> Result<Option<RawSample>, SensorError> {
        let pin = self.pins.pin(kind).ok_or(SensorError::UnknownPin { kind })?;
        self.drain()?;
        Ok(self
            .latest
            .get(&pin)
            .map(|value| f64::from(*value) / ADC_MAX))
    }

    fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            for (_, pin) in self.pins.configured() {
                if let Err(err) = link.write_all(&report_analog(pin, false)) {
                    debug!("[Firmata] ignoring close error on A{}: {}", pin, err);
                    break;
                }
            }
            let _ = link.flush();
            self.latest.clear();
            info!("[Firmata] board closed");
        }
    }
}

impl<L: FirmataLink> Drop for FirmataBoard<L> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens Firmata boards over USB serial
#[derive(Debug, Clone)]
pub struct FirmataSource {
    pub baud_rate: u32,
    /// Wait after opening the port while the board resets
    pub boot_delay: Duration,
    /// Wait after enabling reporting before the first read
    pub settle_delay: Duration,
    pub read_timeout: Duration,
}

impl Default for FirmataSource {
    fn default() -> Self {
        Self {
            baud_rate: 57_600,
            boot_delay: Duration::from_millis(2000),
            settle_delay: Duration::from_millis(100),
            read_timeout: Duration::from_millis(1000),
        }
    }
}

impl SensorSource for FirmataSource {
    type Handle = FirmataBoard;

    fn initialize(&mut self, port: &str, pins: &SensorPins) -> Result<Self::Handle, SensorError> {
        info!("[Firmata] opening {} at {} baud", port, self.baud_rate);
        let link = serialport::new(port, self.baud_rate)
            .timeout(self.read_timeout)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|err| SensorError::PortOpenFailed {
                port: port.to_string(),
                reason: err.to_string(),
            })?;

        thread::sleep(self.boot_delay);
        let mut board = FirmataBoard::from_link(link, *pins)?;
        thread::sleep(self.settle_delay);

        match board.drain() {
            Ok(updates) => debug!("[Firmata] {} reports after settle", updates),
            Err(err) => warn!("[Firmata] initial drain failed: {}", err),
        }
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// In-memory link: `rx` is what the board sends, `tx` what we wrote
    struct FakeLink {
        rx: VecDeque<u8>,
        tx: Arc<Mutex<Vec<u8>>>,
        broken: bool,
    }

    impl FakeLink {
        fn new(rx: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
            let tx = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    rx: rx.iter().copied().collect(),
                    tx: Arc::clone(&tx),
                    broken: false,
                },
                tx,
            )
        }
    }

    impl Read for FakeLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.rx.pop_front() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }

    impl Write for FakeLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.tx.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl FirmataLink for FakeLink {
        fn bytes_available(&mut self) -> io::Result<usize> {
            if self.broken {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            Ok(self.rx.len())
        }
    }

    fn analog_frame(pin: u8, value: u16) -> [u8; 3] {
        [
            ANALOG_MESSAGE | pin,
            (value & 0x7F) as u8,
            ((value >> 7) & 0x7F) as u8,
        ]
    }

    #[test]
    fn test_report_analog_encoding() {
        assert_eq!(report_analog(3, true), [0xC3, 1]);
        assert_eq!(report_analog(0, false), [0xC0, 0]);
    }

    #[test]
    fn test_decoder_reads_analog_frames() {
        let mut decoder = FirmataDecoder::new();
        let mut out = Vec::new();
        for byte in analog_frame(2, 1023).iter().chain(analog_frame(0, 512).iter()) {
            if let Some(value) = decoder.feed(*byte) {
                out.push(value);
            }
        }
        assert_eq!(
            out,
            vec![
                AnalogValue { pin: 2, value: 1023 },
                AnalogValue { pin: 0, value: 512 }
            ]
        );
    }

    #[test]
    fn test_decoder_skips_sysex_and_other_messages() {
        let mut decoder = FirmataDecoder::new();
        let mut stream = vec![START_SYSEX, 0x79, 0x02, 0x05, 0x41, 0x00, END_SYSEX];
        stream.extend_from_slice(&[REPORT_VERSION, 0x02, 0x05]);
        stream.extend_from_slice(&[DIGITAL_MESSAGE | 1, 0x7F, 0x01]);
        stream.extend_from_slice(&analog_frame(1, 300));

        let values: Vec<_> = stream.iter().filter_map(|b| decoder.feed(*b)).collect();
        assert_eq!(values, vec![AnalogValue { pin: 1, value: 300 }]);
    }

    #[test]
    fn test_decoder_resyncs_on_truncated_frame() {
        let mut decoder = FirmataDecoder::new();
        let mut stream = vec![ANALOG_MESSAGE | 3, 0x10];
        stream.extend_from_slice(&analog_frame(3, 100));

        let values: Vec<_> = stream.iter().filter_map(|b| decoder.feed(*b)).collect();
        assert_eq!(values, vec![AnalogValue { pin: 3, value: 100 }]);
    }

    #[test]
    fn test_board_enables_reporting_and_reads() {
        let mut rx = Vec::new();
        rx.extend_from_slice(&analog_frame(0, 1023));
        rx.extend_from_slice(&analog_frame(3, 0));
        let (link, tx) = FakeLink::new(&rx);

        let pins = SensorPins {
            air_temperature: None,
            air_flow: None,
            ..SensorPins::default()
        };
        let mut board = FirmataBoard::from_link(link, pins).unwrap();
        assert_eq!(*tx.lock().unwrap(), vec![0xC0, 1, 0xC3, 1]);

        assert_eq!(board.read(SensorKind::SoilMoisture).unwrap(), Some(1.0));
        assert_eq!(board.read(SensorKind::AirLight).unwrap(), Some(0.0));
        assert!(matches!(
            board.read(SensorKind::AirFlow),
            Err(SensorError::UnknownPin {
                kind: SensorKind::AirFlow
            })
        ));
    }

    #[test]
    fn test_out_of_range_value_is_protocol_error() {
        let (link, _tx) = FakeLink::new(&analog_frame(0, 4000));
        let mut board = FirmataBoard::from_link(link, SensorPins::default()).unwrap();
        match board.read(SensorKind::SoilMoisture) {
            Err(SensorError::Protocol { details }) => assert!(details.contains("A0")),
            other => panic!("Expected Protocol, got {:?}", other),
        }
    }

    #[test]
    fn test_pin_without_report_is_absent() {
        let (link, _tx) = FakeLink::new(&[]);
        let mut board = FirmataBoard::from_link(link, SensorPins::default()).unwrap();
        assert_eq!(board.read(SensorKind::AirFlow).unwrap(), None);
    }

    #[test]
    fn test_broken_link_is_transport_error() {
        let (mut link, _tx) = FakeLink::new(&[]);
        link.broken = true;
        let mut board = FirmataBoard::from_link(link, SensorPins::default()).unwrap();
        assert!(matches!(
            board.read(SensorKind::SoilMoisture),
            Err(SensorError::Transport { .. })
        ));
    }

    #[test]
    fn test_close_is_idempotent_and_disables_reporting() {
        let (link, tx) = FakeLink::new(&analog_frame(1, 10));
        let pins = SensorPins {
            soil_moisture: None,
            air_flow: None,
            air_light: None,
            ..SensorPins::default()
        };
        let mut board = FirmataBoard::from_link(link, pins).unwrap();
        board.close();
        board.close();

        assert!(!board.is_open());
        assert_eq!(*tx.lock().unwrap(), vec![0xC1, 1, 0xC1, 0]);
        assert!(matches!(
            board.read(SensorKind::AirTemperature),
            Err(SensorError::NotInitialized)
        ));
    }
}
