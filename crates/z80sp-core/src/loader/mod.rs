//! Flash load sequencer
//!
//! Receives an image over the serial console as hex records and programs it
//! into the flash, acknowledging every record. A session starts with the mode
//! button ([`FlashLoader::toggle`]) or when the host sends
//! [`ACTIVATION_PHRASE`], and ends with an end-of-file record, a second
//! button press, or after [`LoaderConfig::timeout_ms`] without traffic.
//!
//! ```text
//!   Inactive ──activate──► Active ──data records──► Active
//!      ▲                     │
//!      └── EOF / timeout / toggle
//! ```
//!
//! The first data record of a session erases the flash. Every data record is
//! written and read back; the reply is Acknowledge-1 or Error-1. A record with
//! a bad checksum is answered with Error-0. A timed out session is dropped
//! without a reply.

mod activation;

use embedded_io::Write;

use crate::flash::FlashTarget;
use crate::hal::Clock;
use crate::record::{record_type, CommCode, HexRecord, ParseResult, RecordParser};

pub use activation::{ActivationMatcher, ACTIVATION_PHRASE};

/// Default inactivity timeout of a session
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// What is erased before the first data record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseScope {
    /// The whole device
    Chip,
    /// Only the 64 KiB window the Z80 sees
    Bank,
}

/// Load sequencer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Session is dropped after this long without a data record
    pub timeout_ms: u64,
    /// Erase done before programming the first record
    pub erase: EraseScope,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            erase: EraseScope::Chip,
        }
    }
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderMode {
    /// Serial input belongs to the console
    Inactive,
    /// Serial input is parsed as records
    Active,
}

/// Record-driven flash programmer
pub struct FlashLoader<F: FlashTarget, C: Clock> {
    flash: F,
    clock: C,
    config: LoaderConfig,
    mode: LoaderMode,
    parser: RecordParser,
    activation: ActivationMatcher,
    records: u32,
    last_activity: u64,
}

impl<F: FlashTarget, C: Clock> FlashLoader<F, C> {
    /// Create a loader with the default configuration
    pub fn new(flash: F, clock: C) -> Self {
        Self::with_config(flash, clock, LoaderConfig::default())
    }

    /// Create a loader with a custom configuration
    pub fn with_config(flash: F, clock: C, config: LoaderConfig) -> Self {
        Self {
            flash,
            clock,
            config,
            mode: LoaderMode::Inactive,
            parser: RecordParser::new(),
            activation: ActivationMatcher::new(),
            records: 0,
            last_activity: 0,
        }
    }

    /// Current session state
    pub fn mode(&self) -> LoaderMode {
        self.mode
    }

    /// Whether a session is running
    pub fn is_active(&self) -> bool {
        self.mode == LoaderMode::Active
    }

    /// Data records received in the current (or last) session
    pub fn records_received(&self) -> u32 {
        self.records
    }

    /// Active configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The flash being programmed
    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Give the flash and clock back
    pub fn into_parts(self) -> (F, C) {
        (self.flash, self.clock)
    }

    /// Start a session
    pub fn activate(&mut self) {
        if self.is_active() {
            return;
        }
        self.flash.activate();
        self.records = 0;
        self.parser.reset();
        self.last_activity = self.clock.now_ms();
        self.mode = LoaderMode::Active;
        log::info!("loader: session started");
    }

    /// End the session and hand the bus back
    pub fn deactivate(&mut self) {
        if !self.is_active() {
            return;
        }
        self.flash.deactivate();
        self.parser.reset();
        self.activation.reset();
        self.mode = LoaderMode::Inactive;
        log::info!("loader: session ended after {} records", self.records);
    }

    /// Mode button: start a session, or abort the running one
    pub fn toggle(&mut self) {
        if self.is_active() {
            self.deactivate();
        } else {
            self.activate();
        }
    }

    /// Drop a session that has been silent for too long
    ///
    /// Call on every pass of the main loop.
    pub fn process(&mut self) {
        if !self.is_active() {
            return;
        }
        let idle = self.clock.now_ms().saturating_sub(self.last_activity);
        if idle > self.config.timeout_ms {
            log::warn!("loader: no data for {} ms, aborting session", idle);
            self.deactivate();
        }
    }

    /// Feed one byte received on the serial console
    ///
    /// Replies are written to `tx`. Returns whether the byte was taken by the
    /// loader; bytes it does not take belong to the console.
    pub fn serial_update<W: Write>(&mut self, byte: u8, tx: &mut W) -> Result<bool, W::Error> {
        if !self.is_active() {
            if self.activation.update(byte) {
                log::debug!("loader: activation requested by host");
                self.activate();
                return Ok(true);
            }
            return Ok(false);
        }

        match self.parser.update(byte) {
            ParseResult::Incomplete => {}
            ParseResult::Error => {
                log::debug!("loader: malformed record");
                self.respond(tx, CommCode::Error0)?;
            }
            ParseResult::Valid => self.handle_record(tx)?,
        }
        Ok(true)
    }

    fn handle_record<W: Write>(&mut self, tx: &mut W) -> Result<(), W::Error> {
        let record = self.parser.record().clone();
        self.last_activity = self.clock.now_ms();

        match record.record_type {
            record_type::COMMUNICATION => {
                if record.comm_code() == Some(CommCode::Function0) {
                    self.respond(tx, CommCode::Acknowledge1)?;
                }
            }
            record_type::DATA => {
                let code = if self.program(&record) {
                    CommCode::Acknowledge1
                } else {
                    CommCode::Error1
                };
                self.respond(tx, code)?;
            }
            record_type::END_OF_FILE => {
                self.respond(tx, CommCode::Acknowledge1)?;
                self.deactivate();
            }
            other => {
                log::debug!("loader: unsupported record type 0x{:02X}", other);
                self.respond(tx, CommCode::Error0)?;
            }
        }
        Ok(())
    }

    /// Write and verify one data record; returns whether it verified
    fn program(&mut self, record: &HexRecord) -> bool {
        if self.records == 0 {
            log::info!("loader: erasing flash ({:?})", self.config.erase);
            match self.config.erase {
                EraseScope::Chip => self.flash.erase_chip(),
                EraseScope::Bank => self.flash.erase_bank(),
            }
        }
        self.records += 1;

        let mut address = record.address;
        for &byte in &record.payload {
            self.flash.write_byte(address, byte);
            address = address.wrapping_add(1);
        }

        let mut address = record.address;
        for &byte in &record.payload {
            let found = self.flash.read_byte(address);
            if found != byte {
                log::warn!(
                    "loader: verify failed at 0x{:04X}: {:02X} != {:02X}",
                    address,
                    found,
                    byte
                );
                return false;
            }
            address = address.wrapping_add(1);
        }
        true
    }

    fn respond<W: Write>(&mut self, tx: &mut W, code: CommCode) -> Result<(), W::Error> {
        let reply = HexRecord::communication(code).encode();
        tx.write_all(reply.as_bytes())?;
        tx.flush()
    }
}
