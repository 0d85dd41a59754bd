//! Opening the serial link to the hub.
//!
//! The sync loop only needs something it can write bytes to, so the link is a
//! boxed [`Write`].  [`LinkOpener`] is the seam: production code uses
//! [`SerialPortOpener`], tests hand in an in-memory sink.
//!
//! Opening the port also resets the microcontroller (the USB adapter toggles
//! DTR), which is why a reopen power-cycles the hub side.

use std::io::Write;
use std::time::Duration;

use serialport::SerialPortType;
use thiserror::Error;
use tracing::{debug, info};

/// A writable link to the hub.  Dropping it closes the port.
pub type HubLink = Box<dyn Write + Send>;

/// Error type for link opening.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Auto-detection found no USB device that looks like the hub adapter.
    #[error("no Arduino serial device found")]
    PortNotFound,

    #[error("failed to list serial ports: {0}")]
    Enumerate(#[source] serialport::Error),

    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces a fresh link each time it is called.
#[cfg_attr(test, mockall::automock)]
pub trait LinkOpener: Send + Sync {
    /// Opens the link.  Called again on every restart.
    fn open(&self) -> Result<HubLink, LinkError>;

    /// Human-readable description for log messages.
    fn describe(&self) -> String;
}

/// Opens a real serial port with the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SerialPortOpener {
    port: Option<String>,
    baud_rate: u32,
}

impl SerialPortOpener {
    /// `port` of `None` means auto-detect on every open.
    pub fn new(port: Option<String>, baud_rate: u32) -> Self {
        Self { port, baud_rate }
    }

    fn resolve_port(&self) -> Result<String, LinkError> {
        match &self.port {
            Some(port) => Ok(port.clone()),
            None => find_arduino_port(),
        }
    }
}

impl LinkOpener for SerialPortOpener {
    fn open(&self) -> Result<HubLink, LinkError> {
        let port = self.resolve_port()?;
        let serial = serialport::new(&port, self.baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|source| LinkError::Open {
                port: port.clone(),
                source,
            })?;
        info!("opened serial port {port} at {} baud", self.baud_rate);
        Ok(Box::new(serial))
    }

    fn describe(&self) -> String {
        match &self.port {
            Some(port) => format!("{port} @ {} baud", self.baud_rate),
            None => format!("auto-detected Arduino @ {} baud", self.baud_rate),
        }
    }
}

/// Returns the first USB serial device whose manufacturer or product string
/// mentions "arduino".
pub fn find_arduino_port() -> Result<String, LinkError> {
    let ports = serialport::available_ports().map_err(LinkError::Enumerate)?;
    for port in ports {
        if let SerialPortType::UsbPort(info) = &port.port_type {
            let described = [info.manufacturer.as_deref(), info.product.as_deref()]
                .into_iter()
                .flatten()
                .any(is_arduino_label);
            if described {
                debug!("auto-detected hub adapter on {}", port.port_name);
                return Ok(port.port_name);
            }
        }
    }
    Err(LinkError::PortNotFound)
}

fn is_arduino_label(label: &str) -> bool {
    label.to_ascii_lowercase().contains("arduino")
}
