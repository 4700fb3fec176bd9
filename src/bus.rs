//! The bus transaction channel consumed by the expander register driver.
//!
//! This crate never touches the electrical bus itself; it only issues
//! addressed request/response transactions through this trait. A concrete
//! implementation (hardware peripheral, kernel character device, test
//! double) is supplied by the embedding application.

use crate::error::Result;

/// A point-to-point request/response channel on a shared, addressed bus.
///
/// Implementations signal failures through the two-tier error taxonomy of
/// [`crate::Error`]: a timeout or a bus left in an inconsistent state raises
/// the recoverable bus tier ([`crate::Error::BusTimeout`],
/// [`crate::Error::BusBusy`]); anything else raises a driver-tier error and
/// is treated as fatal by callers.
pub trait BusChannel {
    /// Writes `bytes` to the device at `address`.
    fn send(&mut self, address: u16, bytes: &[u8], timeout_ms: i32) -> Result<()>;

    /// Reads `len` bytes from the device at `address`.
    fn receive(&mut self, address: u16, len: usize, timeout_ms: i32) -> Result<Vec<u8>>;

    /// Writes `out` then reads `in_len` bytes, in a single transaction.
    fn send_then_receive(
        &mut self,
        address: u16,
        out: &[u8],
        in_len: usize,
        timeout_ms: i32,
    ) -> Result<Vec<u8>>;
}
