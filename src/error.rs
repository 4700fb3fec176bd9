use thiserror::Error;

/// Errors raised by the pedalboard core.
///
/// Failures fall into two tiers. The *bus* tier (`BusTimeout`, `BusBusy`)
/// covers transient conditions on the shared expander bus: the register
/// driver absorbs these, forces its connectivity state to `Disconnected`
/// and hands the caller a zero-filled default instead. Everything else is
/// unexpected and propagates to the caller as a hard failure.
#[derive(Error, Debug)]
pub enum Error {
    /// The bus transaction did not complete within the requested timeout.
    #[error("bus timeout at device address 0x{address:02X}")]
    BusTimeout {
        /// Bus address of the device being accessed.
        address: u16,
    },
    /// The bus was left in an inconsistent state mid-transaction.
    #[error("bus left in an inconsistent state while addressing 0x{address:02X}")]
    BusBusy {
        /// Bus address of the device being accessed.
        address: u16,
    },
    /// Unexpected transport-layer failure. Signals a programming or
    /// hardware-driver error, not a transient bus condition.
    #[error("bus driver fault at device address 0x{address:02X}: {message}")]
    BusFault {
        /// Bus address of the device being accessed.
        address: u16,
        /// Detail reported by the transport.
        message: String,
    },
    /// A transaction returned fewer bytes than requested.
    #[error("transaction returned {actual} bytes (expected {expected})")]
    ShortTransfer {
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes actually returned.
        actual: usize,
    },
    /// Expander register access failed for a non-recoverable reason.
    /// Wraps the underlying failure with the operation and register address.
    #[error("{op} failed at register 0x{reg:02X}: {source}")]
    RegisterAccess {
        /// The driver operation that failed.
        op: &'static str,
        /// The register address being accessed.
        reg: u8,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },
    /// Failure reported by the USB host stack.
    #[error("USB host stack error: {0}")]
    Stack(String),
    /// Function argument is outside the valid range.
    #[error("argument out of range: {0}")]
    ArgumentOutOfRange(String),
}

impl Error {
    /// True for the recoverable bus tier (timeout / inconsistent bus state).
    pub fn is_bus_error(&self) -> bool {
        matches!(self, Error::BusTimeout { .. } | Error::BusBusy { .. })
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
