//! USB host stack abstraction consumed by the MIDI class driver.
//!
//! The class driver treats the host stack as a black box: it opens devices,
//! walks descriptors, claims one interface and submits bulk transfers, and
//! it learns about attach/detach and transfer completion through
//! [`StackEvent`]s delivered by [`HostStack::wait_events`]. Low-level
//! plumbing (device free-lists, transfer allocation, the event pump itself)
//! lives behind the trait.

use crate::error::Result;

/// Opaque handle to an opened device, issued by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(u64);

impl DeviceHandle {
    pub fn new(id: u64) -> Self {
        DeviceHandle(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// USB transfer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

/// Transfer direction, derived from bit 7 of an endpoint address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
}

/// Completion status of an asynchronous transfer. Logged, never
/// interpreted further: a failed transfer simply produces no usable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    Error,
    Cancelled,
    NoDevice,
}

/// One endpoint of an interface.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    /// Endpoint address including the direction bit.
    pub address: u8,
    pub transfer_type: TransferType,
    /// Maximum packet size; transfer buffers are sized to this.
    pub max_packet_size: u16,
}

impl EndpointDescriptor {
    /// Direction encoded in bit 7 of the endpoint address.
    #[inline]
    pub fn direction(&self) -> Direction {
        if self.address & crate::consts::usb::ENDPOINT_DIR_IN != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    /// Endpoint number without the direction bit.
    #[inline]
    pub fn number(&self) -> u8 {
        self.address & 0x0F
    }
}

/// One interface of a configuration.
#[derive(Debug, Clone)]
pub struct InterfaceDescriptor {
    pub number: u8,
    pub class: u8,
    pub subclass: u8,
    pub endpoints: Vec<EndpointDescriptor>,
}

/// The active configuration of a device.
#[derive(Debug, Clone)]
pub struct ConfigDescriptor {
    pub interfaces: Vec<InterfaceDescriptor>,
}

/// Device-level descriptor fields the class driver cares about.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub class: u8,
    pub subclass: u8,
}

/// Asynchronous notifications from the stack's event pump.
#[derive(Debug, Clone)]
pub enum StackEvent {
    /// A device appeared on the bus at `address`.
    NewDevice { address: u8 },
    /// The currently opened device left the bus.
    DeviceGone,
    /// A previously submitted OUT transfer finished.
    TransferOutComplete { status: TransferStatus, len: usize },
    /// A previously submitted IN transfer finished; `data` holds the
    /// received bytes.
    TransferInComplete { status: TransferStatus, data: Vec<u8> },
}

/// The USB host stack, as seen by the MIDI class driver.
///
/// `wait_events` is the only blocking entry point and must only ever be
/// called from the class driver's dedicated processing thread. Transfers
/// submitted through `submit_out` / `submit_in` complete asynchronously
/// via `TransferOutComplete` / `TransferInComplete` events.
pub trait HostStack: Send + Sync {
    /// Blocks until at least one stack event is available, then returns
    /// everything pending.
    fn wait_events(&self) -> Result<Vec<StackEvent>>;

    fn open_device(&self, address: u8) -> Result<DeviceHandle>;

    fn device_descriptor(&self, device: &DeviceHandle) -> Result<DeviceDescriptor>;

    fn active_config_descriptor(&self, device: &DeviceHandle) -> Result<ConfigDescriptor>;

    fn claim_interface(&self, device: &DeviceHandle, number: u8) -> Result<()>;

    fn release_interface(&self, device: &DeviceHandle, number: u8) -> Result<()>;

    fn close_device(&self, device: &DeviceHandle) -> Result<()>;

    /// Queues `data` on a bulk OUT endpoint.
    fn submit_out(&self, device: &DeviceHandle, endpoint: u8, data: &[u8]) -> Result<()>;

    /// Queues a read of up to `len` bytes on a bulk IN endpoint.
    fn submit_in(&self, device: &DeviceHandle, endpoint: u8, len: usize) -> Result<()>;
}
