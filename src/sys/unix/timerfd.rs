use super::ioutils::{close_log_on_error, read_all};
use crate::sys;
use std::{
    io::{Error, Result},
    os::fd::{AsRawFd, RawFd},
};

/// Clock backing a [`TimerFd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    /// Settable system-wide wall clock.
    #[default]
    Realtime,
    /// Non-settable clock, does not advance while the system is suspended.
    Monotonic,
    /// Like `Monotonic` but includes the time the system is suspended.
    Boottime,
}

impl Clock {
    #[inline]
    fn clock_id(self) -> libc::clockid_t {
        match self {
            Clock::Realtime => libc::CLOCK_REALTIME,
            Clock::Monotonic => libc::CLOCK_MONOTONIC,
            Clock::Boottime => libc::CLOCK_BOOTTIME,
        }
    }
}

/// A raw `timerfd`, closed on drop.
#[derive(Debug)]
pub struct TimerFd {
    handle: sys::RawFd,
}

impl AsRawFd for TimerFd {
    fn as_raw_fd(&self) -> RawFd {
        self.handle
    }
}

impl Drop for TimerFd {
    fn drop(&mut self) {
        if self.handle > -1 {
            close_log_on_error(self.handle);
        }
    }
}

impl TimerFd {
    pub fn new(clock: Clock, non_blocking: bool, close_on_exec: bool) -> Result<Self> {
        let mut flags = 0;
        if non_blocking {
            flags |= libc::TFD_NONBLOCK;
        }
        if close_on_exec {
            flags |= libc::TFD_CLOEXEC;
        }
        let handle = unsafe { libc::timerfd_create(clock.clock_id(), flags) };
        if handle >= 0 {
            Ok(Self { handle })
        } else {
            Err(Error::last_os_error())
        }
    }

    /// Arms (or disarms when `value.it_value` is zero) the timer, relative to now.
    pub fn settime(&self, value: &libc::itimerspec) -> Result<()> {
        if unsafe { libc::timerfd_settime(self.handle, 0, value as _, std::ptr::null_mut()) } >= 0
        {
            Ok(())
        } else {
            Err(Error::last_os_error())
        }
    }

    pub fn gettime(&self) -> Result<libc::itimerspec> {
        let mut value: libc::itimerspec =
            unsafe { std::mem::MaybeUninit::zeroed().assume_init() };
        if unsafe { libc::timerfd_gettime(self.handle, &mut value as _) } >= 0 {
            Ok(value)
        } else {
            Err(Error::last_os_error())
        }
    }

    /// Reads the number of expirations since the last read.
    pub fn read(&self) -> Result<u64> {
        read_expirations(self.handle)
    }
}

/// Reads the 8-byte expiration counter of the timer `fd`, which resets it.
///
/// Blocks until the first expiration unless `fd` is non-blocking, in which case
/// `ErrorKind::WouldBlock` is returned.
pub fn read_expirations(fd: RawFd) -> Result<u64> {
    let mut buffer = 0u64.to_ne_bytes();
    read_all(fd, &mut buffer)?;
    Ok(u64::from_ne_bytes(buffer))
}
