use core::cell::{Cell, RefCell};
use core::fmt::{Display, Formatter};

use embedded_hal::i2c::{self, ErrorKind, I2c, Operation, SevenBitAddress};
use log::info;

/// Lowest assignable 7-bit device address.
pub const FIRST_DEVICE_ADDRESS: u8 = 0x01;
/// Highest assignable 7-bit device address; 0x78..=0x7F are reserved.
pub const LAST_DEVICE_ADDRESS: u8 = 0x77;

/// Static I2C bus configuration, the Rust rendering of the C
/// `i2c_master_bus_config_t` the board ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub sda: u8,
    pub scl: u8,
    pub frequency_hz: u32,
    /// Spike suppression, in APB clock cycles (0..=7).
    pub glitch_filter_cycles: u8,
    /// Upper bound for a single transaction, applied at the HAL level.
    pub timeout_ms: u32,
}

impl BusConfig {
    fn pins_valid(&self) -> bool {
        self.sda != self.scl && self.sda <= crate::MAX_GPIO && self.scl <= crate::MAX_GPIO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The transport could not be claimed (bad pins, peripheral taken).
    BusUnavailable,
    /// `create` was called while a bus already exists.
    AlreadyInitialized,
    /// No bus exists (never created, or torn down).
    NotInitialized,
    /// Address outside the assignable 7-bit range.
    InvalidAddress(u8),
}

impl Display for BusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            BusError::BusUnavailable => write!(f, "i2c bus unavailable"),
            BusError::AlreadyInitialized => write!(f, "i2c bus already initialized"),
            BusError::NotInitialized => write!(f, "i2c bus not initialized"),
            BusError::InvalidAddress(addr) => write!(f, "invalid i2c address 0x{addr:02X}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Ready,
    TornDown,
}

/// Process-wide owner of the shared I2C bus.
///
/// Exactly one transport lives in here per manager, with an explicit
/// `Uninitialized -> Ready -> TornDown` lifecycle instead of a bare
/// global handle. Device endpoints borrow the manager and never own the
/// transport. Bring-up is single-threaded (tasks only start after it
/// completes), so plain interior mutability is sufficient.
pub struct BusManager<I2C> {
    state: Cell<Lifecycle>,
    config: Cell<Option<BusConfig>>,
    bus: RefCell<Option<I2C>>,
}

impl<I2C> BusManager<I2C>
where
    I2C: I2c,
{
    pub const fn new() -> Self {
        Self {
            state: Cell::new(Lifecycle::Uninitialized),
            config: Cell::new(None),
            bus: RefCell::new(None),
        }
    }

    /// Install the claimed transport. Claiming the physical peripheral is
    /// the HAL's job; this validates the pin assignment and guards the
    /// singleton. A second `create` without a `teardown` in between is
    /// refused and leaves the existing bus untouched.
    pub fn create(&self, transport: I2C, config: BusConfig) -> Result<(), BusError> {
        if self.state.get() == Lifecycle::Ready {
            return Err(BusError::AlreadyInitialized);
        }
        if !config.pins_valid() {
            return Err(BusError::BusUnavailable);
        }
        self.bus.replace(Some(transport));
        self.config.set(Some(config));
        self.state.set(Lifecycle::Ready);
        info!(
            "i2c bus ready on GPIO{} (SDA), GPIO{} (SCL) @ {} Hz",
            config.sda, config.scl, config.frequency_hz
        );
        Ok(())
    }

    /// Side-effect-free configuration query; the `get_handle` of the C
    /// firmware.
    pub fn config(&self) -> Result<BusConfig, BusError> {
        match self.state.get() {
            Lifecycle::Ready => self.config.get().ok_or(BusError::NotInitialized),
            _ => Err(BusError::NotInitialized),
        }
    }

    /// Release the transport. Endpoints that outlive the teardown fail
    /// their next transaction with `NotInitialized`. A fresh `create` is
    /// permitted afterwards (whole-sequence retry).
    pub fn teardown(&self) -> Result<I2C, BusError> {
        if self.state.get() != Lifecycle::Ready {
            return Err(BusError::NotInitialized);
        }
        let transport = self.bus.replace(None).ok_or(BusError::NotInitialized)?;
        self.config.set(None);
        self.state.set(Lifecycle::TornDown);
        Ok(transport)
    }

    /// Bind a device endpoint to the bus. Only the address range is
    /// checked; duplicate endpoints for one address are the caller's
    /// business, exactly like the underlying transceiver.
    pub fn add_device(
        &self,
        address: u8,
        speed_hz: u32,
    ) -> Result<Endpoint<'_, I2C>, BusError> {
        if self.state.get() != Lifecycle::Ready {
            return Err(BusError::NotInitialized);
        }
        if !(FIRST_DEVICE_ADDRESS..=LAST_DEVICE_ADDRESS).contains(&address) {
            return Err(BusError::InvalidAddress(address));
        }
        Ok(Endpoint {
            bus: self,
            address,
            speed_hz,
        })
    }

    pub(crate) fn with_bus<R>(&self, f: impl FnOnce(&mut I2C) -> R) -> Result<R, BusError> {
        let mut slot = self.bus.borrow_mut();
        match slot.as_mut() {
            Some(transport) => Ok(f(transport)),
            None => Err(BusError::NotInitialized),
        }
    }
}

impl<I2C> Default for BusManager<I2C>
where
    I2C: I2c,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A (bus, address, speed) session for one peripheral.
///
/// Dropping the endpoint is the release; there is no table slot to leak,
/// which makes release idempotent and guaranteed on every exit path.
pub struct Endpoint<'bus, I2C> {
    bus: &'bus BusManager<I2C>,
    address: u8,
    speed_hz: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointError<E> {
    /// The manager no longer holds a transport.
    Bus(BusError),
    /// The transaction itself failed (NACK, timeout, arbitration).
    Transport(E),
}

impl<E> Display for EndpointError<E>
where
    E: i2c::Error,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            EndpointError::Bus(err) => write!(f, "{err}"),
            EndpointError::Transport(err) => write!(f, "i2c transfer failed: {err:?}"),
        }
    }
}

impl<E> i2c::Error for EndpointError<E>
where
    E: i2c::Error,
{
    fn kind(&self) -> ErrorKind {
        match self {
            EndpointError::Bus(_) => ErrorKind::Other,
            EndpointError::Transport(err) => err.kind(),
        }
    }
}

impl<'bus, I2C> Endpoint<'bus, I2C>
where
    I2C: I2c,
{
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    /// Read from the bound address.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<(), EndpointError<I2C::Error>> {
        let address = self.address;
        self.bus
            .with_bus(|i2c| i2c.read(address, buffer))
            .map_err(EndpointError::Bus)?
            .map_err(EndpointError::Transport)
    }

    /// Write to the bound address.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), EndpointError<I2C::Error>> {
        let address = self.address;
        self.bus
            .with_bus(|i2c| i2c.write(address, bytes))
            .map_err(EndpointError::Bus)?
            .map_err(EndpointError::Transport)
    }

    /// Write-then-read against the bound address.
    pub fn write_read(
        &mut self,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), EndpointError<I2C::Error>> {
        let address = self.address;
        self.bus
            .with_bus(|i2c| i2c.write_read(address, bytes, buffer))
            .map_err(EndpointError::Bus)?
            .map_err(EndpointError::Transport)
    }

    /// Explicit release, for symmetry with `add_device`.
    pub fn release(self) {}
}

impl<I2C> i2c::ErrorType for Endpoint<'_, I2C>
where
    I2C: I2c,
{
    type Error = EndpointError<I2C::Error>;
}

// Shared-bus proxy: drivers built on `embedded_hal::i2c::I2c` supply
// their own per-transaction addresses (the CH422G spreads its registers
// over several), while the endpoint keeps the session bookkeeping.
impl<I2C> I2c<SevenBitAddress> for Endpoint<'_, I2C>
where
    I2C: I2c,
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.bus
            .with_bus(|i2c| i2c.transaction(address, operations))
            .map_err(EndpointError::Bus)?
            .map_err(EndpointError::Transport)
    }
}
