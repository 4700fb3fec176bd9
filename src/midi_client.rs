//! USB MIDI class driver.
//!
//! Owns the lifecycle of one MIDI-capable USB device: enumeration on
//! attach, bulk IN/OUT transfer buffers while the MIDI-streaming interface
//! is claimed, teardown on detach. Stack events arrive through a
//! non-blocking callback surface ([`UsbMidiClient::handle_event`]) that only
//! records intent in a pending-action bitmask; the real work happens in
//! [`UsbMidiClient::dispatch_pending`], driven by a dedicated processing
//! thread. The stack forbids long-running work inside its event pump, so
//! the two must never be merged.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use log::{debug, info, trace, warn};

use crate::consts::{midi, usb};
use crate::error::Result;
use crate::usb::{
    DeviceHandle, Direction, EndpointDescriptor, HostStack, InterfaceDescriptor, StackEvent,
    TransferStatus, TransferType,
};

// Pending-action bits. Each bit is set by exactly one event kind and
// cleared by the dispatch loop after its handler ran.
const ACTION_OPEN_DEV: u8 = 0x01;
const ACTION_CLOSE_DEV: u8 = 0x02;
const ACTION_TRANSFER_OUT: u8 = 0x04;
const ACTION_TRANSFER_IN: u8 = 0x08;

/// A bulk transfer buffer bound to one endpoint, sized to the endpoint's
/// max packet size.
#[derive(Debug)]
struct Transfer {
    endpoint: u8,
    buffer: Vec<u8>,
    /// Bytes queued (OUT) or actually received (IN).
    len: usize,
}

impl Transfer {
    fn new(endpoint: &EndpointDescriptor) -> Self {
        Transfer {
            endpoint: endpoint.address,
            buffer: vec![0; endpoint.max_packet_size as usize],
            len: 0,
        }
    }
}

/// Mutable connection state. Invariant: `in_transfer` / `out_transfer`
/// exist iff `interface` is claimed.
#[derive(Debug, Default)]
struct ClientState {
    device: Option<DeviceHandle>,
    interface: Option<InterfaceDescriptor>,
    in_transfer: Option<Transfer>,
    out_transfer: Option<Transfer>,
    last_out: Option<(TransferStatus, usize)>,
    last_in_status: Option<TransferStatus>,
    pass_through: bool,
}

#[derive(Debug)]
struct Inner {
    actions: AtomicU8,
    /// Address of the device waiting to be opened (0 = none).
    pending_address: AtomicU8,
    chord_interval: AtomicU8,
    state: Mutex<ClientState>,
}

/// Handle to the MIDI class driver. Cheap to clone; all clones share the
/// same connection state.
#[derive(Clone)]
pub struct UsbMidiClient {
    stack: Arc<dyn HostStack>,
    inner: Arc<Inner>,
}

impl core::fmt::Debug for UsbMidiClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UsbMidiClient")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl UsbMidiClient {
    pub fn new(stack: Arc<dyn HostStack>) -> Self {
        UsbMidiClient {
            stack,
            inner: Arc::new(Inner {
                actions: AtomicU8::new(0),
                pending_address: AtomicU8::new(0),
                chord_interval: AtomicU8::new(midi::DEFAULT_CHORD_INTERVAL),
                state: Mutex::new(ClientState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        // Poisoning only matters if a handler panicked; the state itself
        // stays usable.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True iff the MIDI-streaming interface is currently claimed.
    pub fn connected(&self) -> bool {
        self.state().interface.is_some()
    }

    /// Enables or disables verbatim IN → OUT echo of received MIDI bytes.
    pub fn set_pass_through(&self, enabled: bool) {
        info!(
            "pass through MIDI IN -> OUT {}",
            if enabled { "enabled" } else { "disabled" }
        );
        self.state().pass_through = enabled;
    }

    /// Sets the interval, in semitones, of the second note emitted above
    /// every note requested through [`UsbMidiClient::send_note`].
    pub fn set_chord_interval(&self, semitones: u8) {
        self.inner.chord_interval.store(semitones, Ordering::Release);
    }

    // --- Callback surface (non-blocking, flag-setting only) ---

    /// Records one stack event in the pending-action set. Safe to call
    /// from the stack's event pump: no I/O, no blocking beyond a brief
    /// uncontended lock to stash event payloads.
    pub fn handle_event(&self, event: StackEvent) {
        trace!("stack event: {event:?}");
        match event {
            StackEvent::NewDevice { address } => {
                // Only one physical controller; later devices are ignored
                // until the current one is gone.
                if self
                    .inner
                    .pending_address
                    .compare_exchange(0, address, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.inner.actions.fetch_or(ACTION_OPEN_DEV, Ordering::AcqRel);
                }
            }
            StackEvent::DeviceGone => {
                if self.state().device.is_some() {
                    // Close supersedes and cancels every other pending action.
                    self.inner.actions.store(ACTION_CLOSE_DEV, Ordering::Release);
                }
            }
            StackEvent::TransferOutComplete { status, len } => {
                self.state().last_out = Some((status, len));
                self.inner
                    .actions
                    .fetch_or(ACTION_TRANSFER_OUT, Ordering::AcqRel);
            }
            StackEvent::TransferInComplete { status, data } => {
                {
                    let mut state = self.state();
                    state.last_in_status = Some(status);
                    if let Some(transfer) = state.in_transfer.as_mut() {
                        let len = data.len().min(transfer.buffer.len());
                        transfer.buffer[..len].copy_from_slice(&data[..len]);
                        transfer.len = len;
                    }
                }
                self.inner
                    .actions
                    .fetch_or(ACTION_TRANSFER_IN, Ordering::AcqRel);
            }
        }
    }

    // --- Processing loop ---

    /// Drains every pending action bit once, in open → close → out → in
    /// order. Each bit is cleared before its handler runs: the event pump
    /// may re-set it mid-handler (an IN transfer can complete right after
    /// the re-arm inside the IN handler) and that new event must survive
    /// to the next pass.
    pub fn dispatch_pending(&self) -> Result<()> {
        let actions = self.inner.actions.load(Ordering::Acquire);
        debug!("dispatching pending actions 0x{actions:02X}");
        if actions & ACTION_OPEN_DEV != 0 {
            self.inner.actions.fetch_and(!ACTION_OPEN_DEV, Ordering::AcqRel);
            self.action_open_device()?;
        }
        if actions & ACTION_CLOSE_DEV != 0 {
            self.inner.actions.fetch_and(!ACTION_CLOSE_DEV, Ordering::AcqRel);
            self.action_close_device()?;
        }
        if actions & ACTION_TRANSFER_OUT != 0 {
            self.inner
                .actions
                .fetch_and(!ACTION_TRANSFER_OUT, Ordering::AcqRel);
            self.action_transfer_out();
        }
        if actions & ACTION_TRANSFER_IN != 0 {
            self.inner
                .actions
                .fetch_and(!ACTION_TRANSFER_IN, Ordering::AcqRel);
            self.action_transfer_in()?;
        }
        Ok(())
    }

    /// The event-processing loop: blocks in the stack while idle,
    /// otherwise drains pending actions. Runs until the stack fails.
    pub fn run(&self) -> Result<()> {
        debug!("entering MIDI class driver event loop");
        loop {
            if self.inner.actions.load(Ordering::Acquire) == 0 {
                for event in self.stack.wait_events()? {
                    self.handle_event(event);
                }
            } else {
                self.dispatch_pending()?;
            }
        }
    }

    /// Runs the event-processing loop on its own thread.
    pub fn spawn(&self) -> thread::JoinHandle<()> {
        let client = self.clone();
        thread::spawn(move || {
            if let Err(e) = client.run() {
                warn!("MIDI class driver event loop stopped: {e}");
            }
        })
    }

    // --- Action handlers ---

    fn action_open_device(&self) -> Result<()> {
        let address = self.inner.pending_address.load(Ordering::Acquire);
        info!("opening device at address {address}");
        let device = self.stack.open_device(address)?;
        self.state().device = Some(device);

        let descriptor = self.stack.device_descriptor(&device)?;
        info!(
            "device {:04X}:{:04X}, class 0x{:02X}",
            descriptor.vendor_id, descriptor.product_id, descriptor.class
        );
        if descriptor.class != usb::CLASS_PER_INTERFACE {
            warn!("device does not declare per-interface classes, ignoring");
            return self.action_close_device();
        }

        let config = self.stack.active_config_descriptor(&device)?;
        let mut claimed: Option<InterfaceDescriptor> = None;
        let mut in_transfer: Option<Transfer> = None;
        let mut out_transfer: Option<Transfer> = None;
        for interface in &config.interfaces {
            debug!("parsing interface #{}", interface.number);
            if interface.class == usb::CLASS_AUDIO
                && interface.subclass == usb::SUBCLASS_MIDI_STREAMING
            {
                info!(
                    "MIDI streaming interface found (interface #{})",
                    interface.number
                );
                self.stack.claim_interface(&device, interface.number)?;
                for endpoint in &interface.endpoints {
                    if endpoint.transfer_type == TransferType::Bulk {
                        match endpoint.direction() {
                            Direction::In => {
                                info!("endpoint {} IN", endpoint.number());
                                in_transfer = Some(Transfer::new(endpoint));
                            }
                            Direction::Out => {
                                info!("endpoint {} OUT", endpoint.number());
                                out_transfer = Some(Transfer::new(endpoint));
                            }
                        }
                    }
                }
                claimed = Some(interface.clone());
            } else {
                claimed = None;
            }
        }

        if claimed.is_none() {
            // Transfers exist iff the interface is claimed.
            in_transfer = None;
            out_transfer = None;
        }
        {
            let mut state = self.state();
            state.interface = claimed;
            state.in_transfer = in_transfer;
            state.out_transfer = out_transfer;
        }

        if self.connected() {
            self.arm_transfer_in()
        } else {
            info!("no MIDI streaming interface found on device at address {address}");
            self.action_close_device()
        }
    }

    fn action_close_device(&self) -> Result<()> {
        let (device, interface) = {
            let mut state = self.state();
            state.in_transfer = None;
            state.out_transfer = None;
            (state.device.take(), state.interface.take())
        };
        let Some(device) = device else {
            self.inner.pending_address.store(0, Ordering::Release);
            return Ok(());
        };
        if let Some(interface) = interface {
            info!("releasing interface {}", interface.number);
            self.stack.release_interface(&device, interface.number)?;
        }
        info!("closing device");
        self.stack.close_device(&device)?;
        self.inner.pending_address.store(0, Ordering::Release);
        Ok(())
    }

    fn action_transfer_out(&self) {
        if let Some((status, len)) = self.state().last_out.take() {
            debug!("OUT transfer complete: {status:?}, {len} bytes");
        }
    }

    fn action_transfer_in(&self) -> Result<()> {
        {
            let state = self.state();
            if let Some(transfer) = state.in_transfer.as_ref() {
                debug!(
                    "MIDI IN: {:02X?} ({} bytes, {:?})",
                    &transfer.buffer[..transfer.len],
                    transfer.len,
                    state.last_in_status
                );
            }
        }
        // Received bytes are fully consumed before the endpoint starts
        // listening again; no window where the buffer refills mid-read.
        self.pass_through()?;
        self.arm_transfer_in()
    }

    fn arm_transfer_in(&self) -> Result<()> {
        let (device, endpoint, len) = {
            let state = self.state();
            match (&state.device, &state.in_transfer) {
                (Some(device), Some(transfer)) => {
                    (*device, transfer.endpoint, transfer.buffer.len())
                }
                _ => return Ok(()),
            }
        };
        debug!("arming IN transfer on endpoint 0x{endpoint:02X}");
        self.stack.submit_in(&device, endpoint, len)
    }

    // --- Outbound operations ---

    /// Emits a pair of Note On/Off event packets: `note` and `note` plus
    /// the configured chord interval. Warns and does nothing when no MIDI
    /// device is connected.
    pub fn send_note(&self, note_on: bool, note: u8) -> Result<()> {
        if !self.connected() {
            warn!("send_note: no MIDI device connected");
            return Ok(());
        }
        debug!("send_note {note} {}", if note_on { "on" } else { "off" });
        let status = if note_on {
            midi::STATUS_NOTE_ON
        } else {
            midi::STATUS_NOTE_OFF
        };
        let chord_note = note.wrapping_add(self.inner.chord_interval.load(Ordering::Acquire));
        let packets: [u8; 2 * midi::EVENT_PACKET_LEN] = [
            midi::EVENT_HEADER,
            status,
            note,
            midi::VELOCITY,
            midi::EVENT_HEADER,
            status,
            chord_note,
            midi::VELOCITY,
        ];
        self.queue_out(&packets)
    }

    /// Emits a Local Control on/off Control-Change packet. Warns and does
    /// nothing when no MIDI device is connected.
    pub fn send_local_control(&self, on: bool) -> Result<()> {
        if !self.connected() {
            warn!("send_local_control: no MIDI device connected");
            return Ok(());
        }
        debug!("local control {}", if on { "on" } else { "off" });
        let packet: [u8; midi::EVENT_PACKET_LEN] = [
            midi::EVENT_HEADER,
            midi::STATUS_CONTROL_CHANGE,
            midi::CC_LOCAL_CONTROL,
            if on {
                midi::LOCAL_CONTROL_ON
            } else {
                midi::LOCAL_CONTROL_OFF
            },
        ];
        self.queue_out(&packet)
    }

    /// Echoes the most recent IN transfer's bytes verbatim out the OUT
    /// endpoint, if pass-through is enabled.
    pub fn pass_through(&self) -> Result<()> {
        let bytes = {
            let state = self.state();
            if !state.pass_through {
                return Ok(());
            }
            state
                .in_transfer
                .as_ref()
                .map(|transfer| transfer.buffer[..transfer.len].to_vec())
        };
        match bytes {
            Some(bytes) => self.queue_out(&bytes),
            None => Ok(()),
        }
    }

    /// Copies `data` into the OUT transfer buffer and submits it.
    fn queue_out(&self, data: &[u8]) -> Result<()> {
        let (device, endpoint) = {
            let mut state = self.state();
            // The dispatch thread may close the device between the
            // caller's connected() check and this lock; a detached device
            // drops the message, it never fails the caller.
            let Some(device) = state.device else {
                warn!("queue_out: device detached, dropping {} bytes", data.len());
                return Ok(());
            };
            match state.out_transfer.as_mut() {
                Some(transfer) => {
                    if data.len() > transfer.buffer.len() {
                        return Err(crate::Error::ArgumentOutOfRange(format!(
                            "{} bytes exceed the OUT endpoint packet size {}",
                            data.len(),
                            transfer.buffer.len()
                        )));
                    }
                    transfer.buffer[..data.len()].copy_from_slice(data);
                    transfer.len = data.len();
                    (device, transfer.endpoint)
                }
                None => {
                    warn!("queue_out: no OUT transfer allocated");
                    return Ok(());
                }
            }
        };
        trace!("MIDI OUT: {data:02X?} ({} bytes)", data.len());
        self.stack.submit_out(&device, endpoint, data)
    }
}
