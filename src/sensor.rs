use crate::{Address, BusController, BusError, Config, Error, LogSink, Logger, Platform, Status};
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::mutex::Mutex;
use embedded_hal::delay::DelayNs;
use log::Level;
use micromath::F32Ext;

/// Change subscriber, called with the cached temperature and whether it
/// just changed. Runs after the sensor is unlocked and may query it.
pub type Callback<'a> = &'a mut (dyn FnMut(f32, bool) + Send);

/// How the sensor reaches its bus
enum Link<'a, B, M: RawMutex> {
    Detached,
    Owned(B),
    Shared(&'a Mutex<M, B>),
}

impl<B: BusController, M: RawMutex> Link<'_, B, M> {
    fn with_bus<R>(&mut self, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        match self {
            Link::Detached => None,
            Link::Owned(bus) => Some(f(bus)),
            Link::Shared(shared) => Some(f(&mut *block_on(shared.lock()))),
        }
    }
}

struct Inner<'a, P: Platform, D, M: RawMutex> {
    platform: P,
    delay: D,
    link: Link<'a, P::Bus, M>,
    address: Address,
    pin: Option<u8>,
    temperature: f32,
    last_time: Option<u64>,
    config: Config,
    callback: Option<Callback<'a>>,
}

impl<P: Platform, D: DelayNs, M: RawMutex> Inner<'_, P, D, M> {
    fn is_enabled(&self) -> bool {
        !matches!(self.link, Link::Detached)
    }

    fn elapsed_ms(&self) -> u64 {
        if !self.is_enabled() {
            return 0;
        }
        let last = self.last_time.unwrap_or(0);
        self.platform.now_ms().saturating_sub(last)
    }

    fn is_expired(&self) -> bool {
        let delay = self.config.expiration_delay as u64;
        delay > 0 && self.elapsed_ms() >= delay * 1000
    }

    fn is_valid(&self) -> bool {
        self.is_enabled() && self.last_time.is_some() && !self.is_expired()
    }

    /// Fetches the pending conversion and starts the next one.
    fn cycle(&mut self) -> Result<bool, Error> {
        let address = self.address;
        let delay = &mut self.delay;
        let fetched = self
            .link
            .with_bus(|bus| {
                let fetched = bus.fetch_temperature(delay, &address);
                // a failed request surfaces as a failed fetch next cycle
                let _ = bus.request(delay, &address);
                fetched
            })
            .unwrap_or(Err(BusError::DriverUninitialized))?;

        if fetched.is_nan() {
            return Err(Error::NaNReading);
        }
        let value = F32Ext::round(fetched * 100.0) / 100.0;

        let had_valid = self.is_valid();
        self.last_time = Some(self.platform.now_ms());

        let changed = !had_valid || F32Ext::abs(value - self.temperature) > self.config.threshold;
        if changed {
            self.temperature = value;
        }
        Ok(changed)
    }

    /// Resets everything but the tunables, releasing an owned bus.
    fn detach(&mut self) {
        match core::mem::replace(&mut self.link, Link::Detached) {
            Link::Owned(mut bus) => bus.release(&mut self.delay),
            Link::Shared(_) | Link::Detached => {}
        }
        self.address = Address::UNRESOLVED;
        self.pin = None;
        self.temperature = 0.0;
        self.last_time = None;
    }
}

/// One DS18 probe on a single-wire bus.
///
/// Call [`Ds18::read`] periodically, at least one conversion time apart:
/// each call collects the conversion started by the previous one and starts
/// the next.
///
/// Every method takes `&self`. State and bus sit behind an embassy-sync
/// mutex: `M` guards only the lock flag, so interrupts stay enabled during
/// a bus transaction while a `disable` from another context still waits for
/// a running `read` to finish. Waiting spins, so do not call into a sensor
/// from an interrupt that may preempt another call on the same sensor.
pub struct Ds18<
    'a,
    P: Platform,
    D: DelayNs,
    L: Logger = LogSink,
    M: RawMutex = CriticalSectionRawMutex,
> {
    logger: L,
    inner: Mutex<M, Inner<'a, P, D, M>>,
}

impl<'a, P: Platform, D: DelayNs> Ds18<'a, P, D> {
    pub fn new(platform: P, delay: D) -> Self {
        Self::with_logger(platform, delay, LogSink)
    }
}

impl<'a, P: Platform, D: DelayNs, L: Logger> Ds18<'a, P, D, L> {
    pub fn with_logger(platform: P, delay: D, logger: L) -> Self {
        Self::with_raw_mutex(platform, delay, logger)
    }
}

impl<'a, P: Platform, D: DelayNs, L: Logger, M: RawMutex> Ds18<'a, P, D, L, M> {
    /// Like [`Ds18::with_logger`] with a mutex flavour other than critical
    /// sections, e.g. `NoopRawMutex` for a single-context application
    pub fn with_raw_mutex(platform: P, delay: D, logger: L) -> Self {
        Ds18 {
            logger,
            inner: Mutex::new(Inner {
                platform,
                delay,
                link: Link::Detached,
                address: Address::UNRESOLVED,
                pin: None,
                temperature: 0.0,
                last_time: None,
                config: Config::default(),
                callback: None,
            }),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.inner.get_mut().config = config;
        self
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner<'a, P, D, M>) -> R) -> R {
        f(&mut *block_on(self.inner.lock()))
    }

    fn check_pin(&self, inner: &Inner<'a, P, D, M>, pin: u8) -> Result<(), Error> {
        if inner.platform.is_output_pin(pin) {
            Ok(())
        } else {
            self.logger.log(
                Level::Error,
                format_args!("Disable DS18 sensor: invalid pin: {}", pin),
            );
            Err(Error::InvalidPin(pin))
        }
    }

    fn claim(&self, inner: &mut Inner<'a, P, D, M>, pin: u8) -> Result<P::Bus, Error> {
        inner.platform.claim(pin).map_err(|error| {
            self.logger.log(
                Level::Error,
                format_args!("Unable to claim pin {}: {:?}", pin, error),
            );
            Error::Bus(BusError::DriverUninitialized)
        })
    }

    /// Marks the sensor enabled on `link` and starts the first conversion.
    fn bind(&self, inner: &mut Inner<'a, P, D, M>, link: Link<'a, P::Bus, M>, address: Address) {
        inner.link = link;
        inner.address = address;
        let delay = &mut inner.delay;
        if let Some(Err(error)) = inner.link.with_bus(|bus| {
            inner.pin = Some(bus.pin());
            bus.request(delay, &address)
        }) {
            self.logger.log(
                Level::Warn,
                format_args!("{} {}: first request failed: {}", address.model(), address, error),
            );
        }
        self.logger.log(
            Level::Info,
            format_args!(
                "{} {} @ pin {} enabled!",
                address.model(),
                address,
                inner.pin.unwrap_or_default()
            ),
        );
    }

    /// Claims `pin` and binds the first sensor the ROM search finds,
    /// trying up to [`Config::search_attempts`] times.
    pub fn enable_scan(&self, pin: u8) -> Result<(), Error> {
        self.with(|inner| {
            if inner.is_enabled() {
                return Ok(());
            }
            self.check_pin(inner, pin)?;
            let mut bus = self.claim(inner, pin)?;

            self.logger.log(
                Level::Info,
                format_args!("Searching for DS18 sensor on pin: {}...", pin),
            );
            let mut found = [Address::UNRESOLVED];
            let mut remaining = inner.config.search_attempts;
            while remaining > 0 {
                remaining -= 1;
                if let Ok(1) = bus.search(&mut inner.delay, &mut found) {
                    break;
                }
                if remaining > 0 {
                    inner.delay.delay_ms(inner.config.search_retry_delay_ms);
                }
            }

            let address = found[0];
            if address.is_unresolved() {
                bus.release(&mut inner.delay);
                self.logger.log(
                    Level::Error,
                    format_args!("No DS18 sensor found on pin: {}", pin),
                );
                return Err(Error::DeviceNotFound);
            }

            self.logger.log(
                Level::Info,
                format_args!(
                    "Found {} sensor at address {} on pin: {} (remaining search count: {})",
                    address.model(),
                    address,
                    pin,
                    remaining
                ),
            );
            self.bind(inner, Link::Owned(bus), address);
            Ok(())
        })
    }

    /// Claims `pin` for a sensor whose address is already known.
    pub fn enable_with_address(&self, pin: u8, address: Address) -> Result<(), Error> {
        self.with(|inner| {
            if inner.is_enabled() {
                return Ok(());
            }
            self.check_pin(inner, pin)?;
            self.check_address(&address)?;
            let bus = self.claim(inner, pin)?;
            self.bind(inner, Link::Owned(bus), address);
            Ok(())
        })
    }

    /// Binds to `address` on a bus owned elsewhere. The bus outlives the
    /// sensor and is never released by it.
    pub fn attach(
        &self,
        bus: &'a Mutex<M, P::Bus>,
        address: Address,
    ) -> Result<(), Error> {
        self.with(|inner| {
            if inner.is_enabled() {
                return Ok(());
            }
            self.check_address(&address)?;
            self.bind(inner, Link::Shared(bus), address);
            Ok(())
        })
    }

    fn check_address(&self, address: &Address) -> Result<(), Error> {
        if address.is_unresolved() {
            self.logger.log(
                Level::Error,
                format_args!("Invalid DS18 sensor address: {}", address),
            );
            return Err(Error::InvalidAddress);
        }
        Ok(())
    }

    pub fn disable(&self) {
        self.with(|inner| {
            if !inner.is_enabled() {
                return;
            }
            let (address, pin) = (inner.address, inner.pin.unwrap_or_default());
            inner.detach();
            self.logger.log(
                Level::Info,
                format_args!("{} {} @ pin {} disabled!", address.model(), address, pin),
            );
        })
    }

    /// Collects the pending conversion and requests the next one.
    ///
    /// Returns true when a reading was accepted, whether or not it changed
    /// the cached temperature. Bus failures are logged and return false, as
    /// does a disabled sensor.
    pub fn read(&self) -> bool {
        let accepted = self.with(|inner| {
            if !inner.is_enabled() {
                return None;
            }
            match inner.cycle() {
                Ok(changed) => {
                    if changed {
                        self.logger.log(
                            Level::Debug,
                            format_args!(
                                "{} {} @ pin {}: {} °C",
                                inner.address.model(),
                                inner.address,
                                inner.pin.unwrap_or_default(),
                                inner.temperature
                            ),
                        );
                    }
                    Some((inner.temperature, changed, inner.callback.take()))
                }
                Err(Error::NaNReading) => None,
                Err(error) => {
                    self.logger.log(
                        Level::Warn,
                        format_args!(
                            "{} {} @ pin {}: {}",
                            inner.address.model(),
                            inner.address,
                            inner.pin.unwrap_or_default(),
                            error
                        ),
                    );
                    None
                }
            }
        });

        let Some((temperature, changed, callback)) = accepted else {
            return false;
        };
        if let Some(callback) = callback {
            callback(temperature, changed);
            // a callback installed meanwhile through `listen` wins
            self.with(|inner| {
                if inner.callback.is_none() {
                    inner.callback = Some(callback);
                }
            });
        }
        true
    }

    pub fn listen(&self, callback: Callback<'a>) {
        self.with(|inner| inner.callback = Some(callback))
    }

    pub fn is_enabled(&self) -> bool {
        self.with(|inner| inner.is_enabled())
    }

    pub fn pin(&self) -> Option<u8> {
        self.with(|inner| inner.pin)
    }

    pub fn address(&self) -> Address {
        self.with(|inner| inner.address)
    }

    pub fn model(&self) -> &'static str {
        self.address().model()
    }

    /// Last accepted temperature, valid or not
    pub fn last_temperature(&self) -> f32 {
        self.with(|inner| inner.temperature)
    }

    /// Time of the last accepted reading, 0 if none yet
    pub fn last_time(&self) -> u64 {
        self.with(|inner| inner.last_time.unwrap_or(0))
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.with(|inner| inner.elapsed_ms())
    }

    pub fn is_expired(&self) -> bool {
        self.with(|inner| inner.is_expired())
    }

    pub fn is_valid(&self) -> bool {
        self.with(|inner| inner.is_valid())
    }

    /// The cached temperature while it is valid
    pub fn temperature(&self) -> Option<f32> {
        self.with(|inner| inner.is_valid().then_some(inner.temperature))
    }

    pub fn expiration_delay(&self) -> u32 {
        self.with(|inner| inner.config.expiration_delay)
    }

    pub fn set_expiration_delay(&self, seconds: u32) {
        self.with(|inner| inner.config.expiration_delay = seconds)
    }

    pub fn threshold(&self) -> f32 {
        self.with(|inner| inner.config.threshold)
    }

    pub fn set_threshold(&self, celsius: f32) {
        self.with(|inner| inner.config.threshold = celsius)
    }

    pub fn config(&self) -> Config {
        self.with(|inner| inner.config)
    }

    pub fn status(&self) -> Status {
        self.with(|inner| {
            let valid = inner.is_valid();
            Status {
                enabled: inner.is_enabled(),
                model: inner.address.model(),
                address: inner.address.to_u64(),
                elapsed_ms: inner.elapsed_ms(),
                expired: inner.is_expired(),
                temperature: valid.then_some(inner.temperature),
                time_ms: inner.last_time.unwrap_or(0),
                valid,
            }
        })
    }
}

impl<P: Platform, D: DelayNs, L: Logger, M: RawMutex> Drop for Ds18<'_, P, D, L, M> {
    fn drop(&mut self) {
        self.disable();
    }
}
