//! Transport layer abstraction for the loader protocol
//!
//! The client only needs to push bytes out and poll for replies. A serial
//! port is the normal transport; [`loopback::LoaderLink`] connects a client
//! straight to an in-process [`FlashLoader`](z80sp_core::loader::FlashLoader).

use crate::error::Result;

/// Transport trait for reading and writing bytes
pub trait Transport {
    /// Write all bytes to the transport
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read with timeout (non-blocking)
    ///
    /// Reads up to `buf.len()` bytes, waiting up to `timeout_ms` milliseconds.
    /// Returns the number of bytes read, or 0 on timeout.
    fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Flush any buffered output
    fn flush(&mut self) -> Result<()>;

    /// Drop everything received so far
    fn clear_input(&mut self) -> Result<()>;
}

pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use crate::error::LoaderError;
    use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};
    use std::time::Duration;

    /// Baud rate of the board console
    pub const DEFAULT_BAUD: u32 = 115_200;

    /// Serial port transport
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
    }

    impl SerialTransport {
        /// Open a serial port, 8N1 without flow control
        ///
        /// `None` selects the board's console rate of 115200 baud.
        pub fn open(device: &str, baud: Option<u32>) -> Result<Self> {
            let baud_rate = baud.unwrap_or(DEFAULT_BAUD);

            let port = serialport::new(device, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(Duration::from_secs(1))
                .open()?;

            log::debug!("Opened serial port {} at {} baud", device, baud_rate);

            Ok(Self { port })
        }

        /// Name of the underlying port
        pub fn name(&self) -> Option<String> {
            self.port.name()
        }
    }

    impl Transport for SerialTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            self.port.write_all(data)?;
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
            // Set temporary timeout
            let old_timeout = self.port.timeout();
            self.port
                .set_timeout(Duration::from_millis(u64::from(timeout_ms)))?;

            let result = match self.port.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
                Err(e) => Err(LoaderError::from(e)),
            };

            // Restore timeout
            self.port.set_timeout(old_timeout)?;
            result
        }

        fn flush(&mut self) -> Result<()> {
            self.port.flush()?;
            Ok(())
        }

        fn clear_input(&mut self) -> Result<()> {
            self.port.clear(ClearBuffer::Input)?;
            Ok(())
        }
    }
}

pub mod loopback {
    //! In-process transport to a flash loader

    use super::*;
    use core::convert::Infallible;
    use std::collections::VecDeque;
    use z80sp_core::flash::FlashTarget;
    use z80sp_core::hal::Clock;
    use z80sp_core::loader::FlashLoader;

    /// Replies written by the loader, waiting to be read
    #[derive(Debug, Default)]
    struct ReplyQueue(VecDeque<u8>);

    impl embedded_io::ErrorType for ReplyQueue {
        type Error = Infallible;
    }

    impl embedded_io::Write for ReplyQueue {
        fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, Infallible> {
            self.0.extend(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> core::result::Result<(), Infallible> {
            Ok(())
        }
    }

    /// Transport that feeds a [`FlashLoader`] directly
    ///
    /// Every written byte goes through `serial_update`, exactly as if it had
    /// arrived on the board's console. Bytes the loader does not take are
    /// kept as console input.
    pub struct LoaderLink<F: FlashTarget, C: Clock> {
        loader: FlashLoader<F, C>,
        replies: ReplyQueue,
        console: Vec<u8>,
    }

    impl<F: FlashTarget, C: Clock> LoaderLink<F, C> {
        /// Wrap a loader
        pub fn new(loader: FlashLoader<F, C>) -> Self {
            Self {
                loader,
                replies: ReplyQueue::default(),
                console: Vec::new(),
            }
        }

        /// The loader on the far end
        pub fn loader(&mut self) -> &mut FlashLoader<F, C> {
            &mut self.loader
        }

        /// Bytes that went to the console instead of the loader
        pub fn console(&self) -> &[u8] {
            &self.console
        }

        /// Give the loader back
        pub fn into_inner(self) -> FlashLoader<F, C> {
            self.loader
        }
    }

    impl<F: FlashTarget, C: Clock> Transport for LoaderLink<F, C> {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            for &byte in data {
                let taken = self
                    .loader
                    .serial_update(byte, &mut self.replies)
                    .unwrap_or_else(|e| match e {});
                if !taken {
                    self.console.push(byte);
                }
            }
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize> {
            self.loader.process();
            let n = buf.len().min(self.replies.0.len());
            for (slot, byte) in buf.iter_mut().zip(self.replies.0.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn clear_input(&mut self) -> Result<()> {
            self.replies.0.clear();
            Ok(())
        }
    }
}
