//! Flash loader client
//!
//! Drives a download session from the host: wake the loader with the
//! activation phrase, probe it, then send the image as 16-byte data records
//! followed by an end-of-file record. Every record must be answered with
//! Acknowledge-1 before the next one is sent.

use std::time::{Duration, Instant};

use z80sp_core::loader::ACTIVATION_PHRASE;
use z80sp_core::record::{record_type, CommCode, HexRecord, ParseResult, RecordParser};

use crate::error::{LoaderError, Result};
use crate::transport::Transport;

/// Largest image that fits the 16-bit record address space
pub const MAX_IMAGE_LEN: usize = 0xFFFF;

/// Timing and framing of a session
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Pause after the activation phrase before probing
    pub settle_ms: u64,
    /// How long to wait for the probe answer
    pub probe_timeout_ms: u64,
    /// How long to wait for the answer to a record
    pub ack_timeout_ms: u64,
    /// Data bytes per record
    pub record_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            settle_ms: 200,
            probe_timeout_ms: 200,
            ack_timeout_ms: 1000,
            record_len: 16,
        }
    }
}

/// Split an image into data records plus a final end-of-file record
pub fn image_records(image: &[u8], record_len: usize) -> Result<Vec<HexRecord>> {
    if image.is_empty() || image.len() > MAX_IMAGE_LEN {
        return Err(LoaderError::InvalidImageSize(image.len()));
    }
    let record_len = record_len.max(1);
    // image length is at most 0xFFFF, so every start address fits
    let mut records = image
        .chunks(record_len)
        .enumerate()
        .map(|(index, chunk)| HexRecord::data((index * record_len) as u16, chunk))
        .collect::<core::result::Result<Vec<_>, _>>()?;
    records.push(HexRecord::end_of_file());
    Ok(records)
}

/// Host end of a flash loader session
pub struct LoaderClient<T: Transport> {
    transport: T,
    config: ClientConfig,
    parser: RecordParser,
}

impl<T: Transport> LoaderClient<T> {
    /// Create a client with the default timing
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Create a client with custom timing
    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            parser: RecordParser::new(),
        }
    }

    /// Session configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying transport
    pub fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Put the loader into download mode and check that it answers
    pub fn probe(&mut self) -> Result<()> {
        self.transport.write(ACTIVATION_PHRASE)?;
        self.transport.flush()?;
        if self.config.settle_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.config.settle_ms));
        }
        self.transport.clear_input()?;
        self.parser.reset();

        let probe = HexRecord::communication(CommCode::Function0);
        self.transport.write(probe.encode().as_bytes())?;
        self.transport.flush()?;

        match self.wait_reply(self.config.probe_timeout_ms)? {
            Some(CommCode::Acknowledge1) => {
                log::debug!("loader: probe acknowledged");
                Ok(())
            }
            Some(code) => {
                log::debug!("loader: probe answered with {:?}", code);
                Err(LoaderError::Rejected { address: 0, code })
            }
            None => Err(LoaderError::Timeout),
        }
    }

    /// Send one record and wait for its acknowledgement
    pub fn send_record(&mut self, record: &HexRecord) -> Result<()> {
        self.transport.write(record.encode().as_bytes())?;
        self.transport.flush()?;

        match self.wait_reply(self.config.ack_timeout_ms)? {
            Some(CommCode::Acknowledge1) => Ok(()),
            Some(code) => {
                log::warn!(
                    "loader: record at 0x{:04X} answered with {:?}",
                    record.address,
                    code
                );
                Err(LoaderError::Rejected {
                    address: record.address,
                    code,
                })
            }
            None => Err(LoaderError::Timeout),
        }
    }

    /// Download a complete image
    ///
    /// `progress` is called after every acknowledged record with the number
    /// of records sent and the total. Returns the number of records sent,
    /// end-of-file record included.
    pub fn download(
        &mut self,
        image: &[u8],
        mut progress: impl FnMut(usize, usize),
    ) -> Result<usize> {
        let records = image_records(image, self.config.record_len)?;
        let total = records.len();
        log::info!(
            "loader: sending {} bytes in {} records",
            image.len(),
            total
        );

        for (index, record) in records.iter().enumerate() {
            self.send_record(record)?;
            progress(index + 1, total);
        }
        Ok(total)
    }

    /// Wait for the next communication record
    ///
    /// Any complete communication record ends the wait; other records and
    /// console noise are skipped.
    fn wait_reply(&mut self, timeout_ms: u64) -> Result<Option<CommCode>> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut buf = [0u8; 64];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let wait = remaining.as_millis().clamp(1, 10) as u32;
            let n = self.transport.read_nonblock(&mut buf, wait)?;

            for &c in &buf[..n] {
                if self.parser.update(c) != ParseResult::Valid {
                    continue;
                }
                let reply = self.parser.record();
                if reply.record_type != record_type::COMMUNICATION {
                    continue;
                }
                match reply.comm_code() {
                    Some(code) => return Ok(Some(code)),
                    None => log::debug!("loader: unknown reply {}", reply),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::LoaderLink;
    use z80sp_core::bus::BusArbiter;
    use z80sp_core::flash::{FlashTarget, ParallelFlash};
    use z80sp_core::loader::FlashLoader;
    use z80sp_sim::{SimBoard, SimClock, SimConfig};

    fn fast() -> ClientConfig {
        ClientConfig {
            settle_ms: 0,
            probe_timeout_ms: 50,
            ack_timeout_ms: 50,
            ..Default::default()
        }
    }

    /// Flash that never takes a write
    struct StuckFlash;

    impl FlashTarget for StuckFlash {
        fn activate(&mut self) {}
        fn deactivate(&mut self) {}
        fn erase_chip(&mut self) {}
        fn erase_bank(&mut self) {}
        fn write_byte(&mut self, _address: u16, _data: u8) {}
        fn read_byte(&mut self, _address: u16) -> u8 {
            0xFF
        }
    }

    #[test]
    fn test_image_records() {
        let image: Vec<u8> = (0..33).collect();
        let records = image_records(&image, 16).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].address, 16);
        assert_eq!(records[2].address, 32);
        assert_eq!(records[2].payload.as_slice(), &[32]);
        assert_eq!(records[3], HexRecord::end_of_file());
    }

    #[test]
    fn test_image_size_limits() {
        assert!(matches!(
            image_records(&[], 16),
            Err(LoaderError::InvalidImageSize(0))
        ));
        assert!(matches!(
            image_records(&vec![0u8; MAX_IMAGE_LEN + 1], 16),
            Err(LoaderError::InvalidImageSize(65536))
        ));
        let records = image_records(&vec![0u8; MAX_IMAGE_LEN], 16).unwrap();
        assert_eq!(records.len(), 4097);
        assert_eq!(records[4095].address, 0xFFF0);
        assert_eq!(records[4095].payload.len(), 15);
    }

    #[test]
    fn test_download_to_simulated_board() {
        let mut bus = BusArbiter::new(SimBoard::new(SimConfig::default()));
        let clock = SimClock::new();
        let image: Vec<u8> = (0..100u8).map(|b| b ^ 0x5A).collect();

        let mut calls = Vec::new();
        let (sent, console) = {
            let loader = FlashLoader::new(ParallelFlash::new(&mut bus), &clock);
            let mut client = LoaderClient::with_config(LoaderLink::new(loader), fast());
            client.probe().unwrap();
            let sent = client
                .download(&image, |done, total| calls.push((done, total)))
                .unwrap();
            let mut link = client.into_inner();
            assert!(!link.loader().is_active());
            (sent, link.console().to_vec())
        };

        assert_eq!(sent, 8);
        assert_eq!(calls.len(), 8);
        assert_eq!(calls.last(), Some(&(8, 8)));
        // the phrase itself went to the console up to its last byte
        assert_eq!(console.len(), ACTIVATION_PHRASE.len() - 1);
        assert_eq!(&bus.pins().flash().data()[..100], image.as_slice());
    }

    #[test]
    fn test_verify_failure_is_rejected() {
        let clock = SimClock::new();
        let loader = FlashLoader::new(StuckFlash, &clock);
        let mut client = LoaderClient::with_config(LoaderLink::new(loader), fast());
        client.probe().unwrap();

        let err = client.download(&[0x12, 0x34], |_, _| {}).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Rejected {
                address: 0,
                code: CommCode::Error1
            }
        ));
    }

    #[test]
    fn test_silent_loader_times_out() {
        let clock = SimClock::new();
        let loader = FlashLoader::new(StuckFlash, &clock);
        let mut client = LoaderClient::with_config(LoaderLink::new(loader), fast());

        // never activated, so every byte goes to the console
        let record = HexRecord::data(0, &[1]).unwrap();
        assert!(matches!(
            client.send_record(&record),
            Err(LoaderError::Timeout)
        ));
        assert!(!client.transport().console().is_empty());
    }
}
