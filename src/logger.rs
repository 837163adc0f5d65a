use core::fmt::Arguments;
use log::Level;

/// Where the sensor reports lifecycle events and failures.
///
/// Error: configuration or discovery failed. Warning: one reading failed.
/// Info: enabled or disabled. Debug: a new temperature was accepted.
pub trait Logger {
    fn log(&self, level: Level, args: Arguments<'_>);
}

/// Forwards to the [`log`] facade under the `ds18` target
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    pub const TARGET: &'static str = "ds18";
}

impl Logger for LogSink {
    fn log(&self, level: Level, args: Arguments<'_>) {
        log::log!(target: Self::TARGET, level, "{}", args);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _args: Arguments<'_>) {}
}

impl<L: Logger + ?Sized> Logger for &L {
    fn log(&self, level: Level, args: Arguments<'_>) {
        (**self).log(level, args)
    }
}
