use crate::sys::{self, Clock, TimerFd};
use crate::{saturating_duration_to_timespec, Error, Result};
use bitflags::bitflags;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TimerFlags: u32 {
        const NON_BLOCKING = 1u32 << 0;
        const CLOSE_ON_EXEC = 1u32 << 1;
    }
}

/// Timer parameters
#[derive(Debug, Copy, Clone)]
pub struct TimerConfig {
    /// clock the timer counts against
    pub clock: Clock,
    /// delay before the first expiration, a zero delay is promoted to 1ns
    pub initial: Duration,
    /// period of the following expirations, or zero for a one-shot timer
    pub interval: Duration,
    /// Flags
    pub flags: TimerFlags,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            clock: Clock::Realtime,
            initial: Duration::from_secs(1),
            interval: Duration::ZERO,
            flags: TimerFlags::CLOSE_ON_EXEC,
        }
    }
}

/// A periodic kernel timer exposed as a waitable descriptor.
///
/// The descriptor becomes readable at each expiration, reading it with
/// [`Timer::read`] (or [`crate::read_expirations`] from a handler) returns the
/// number of expirations since the last read and clears the readiness.
/// Dropping the timer closes the descriptor, which disarms it.
#[derive(Debug)]
pub struct Timer {
    fd: TimerFd,
    config: TimerConfig,
}

impl Timer {
    /// Creates a realtime timer that first expires after one second, then every
    /// `seconds + nanoseconds`.
    ///
    /// With `(0, 0)` the timer fires once, one second after its creation, and never
    /// again. `nanoseconds` must be below one billion.
    pub fn new(seconds: u32, nanoseconds: u32) -> Result<Self> {
        if nanoseconds >= 1_000_000_000 {
            return Err(Error::Setup(std::io::Error::from_raw_os_error(libc::EINVAL)));
        }
        Self::with_config(&TimerConfig {
            interval: Duration::new(seconds as u64, nanoseconds),
            ..TimerConfig::default()
        })
    }

    pub fn with_config(config: &TimerConfig) -> Result<Self> {
        let fd = TimerFd::new(
            config.clock,
            config.flags.contains(TimerFlags::NON_BLOCKING),
            config.flags.contains(TimerFlags::CLOSE_ON_EXEC),
        )
        .map_err(Error::Setup)?;

        // A zero it_value disarms the timer
        let initial = if config.initial.is_zero() {
            Duration::from_nanos(1)
        } else {
            config.initial
        };
        let value = libc::itimerspec {
            it_value: saturating_duration_to_timespec(&initial),
            it_interval: saturating_duration_to_timespec(&config.interval),
        };
        // On failure `fd` is dropped, which closes it
        fd.settime(&value).map_err(Error::Setup)?;
        Ok(Self {
            fd,
            config: *config,
        })
    }

    #[inline]
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    #[inline]
    pub fn is_periodic(&self) -> bool {
        !self.config.interval.is_zero()
    }

    /// Reads the number of expirations since the last read.
    pub fn read(&self) -> std::io::Result<u64> {
        self.fd.read()
    }

    /// Time left before the next expiration, `None` when the timer is disarmed.
    pub fn remaining(&self) -> std::io::Result<Option<Duration>> {
        let value = self.fd.gettime()?;
        let remaining = Duration::new(
            value.it_value.tv_sec as u64,
            value.it_value.tv_nsec as u32,
        );
        Ok(if remaining.is_zero() {
            None
        } else {
            Some(remaining)
        })
    }

    pub fn set_nonblocking(&self, non_blocking: bool) -> std::io::Result<()> {
        sys::set_nonblocking(self.fd.as_raw_fd(), non_blocking)
    }
}

impl AsRawFd for Timer {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
