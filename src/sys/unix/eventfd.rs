use super::ioutils::{close_log_on_error, read_all, write_all};
use crate::sys::{self, PollEvent, PollFd};

use std::{
    io::{Error, ErrorKind, Result},
    os::fd::AsRawFd,
};

/// An event can be used as an event wait/notify mechanism by user-space applications, and by the kernel to notify user-space applications of events.
///
/// An event starts not-notified.
#[derive(Debug)]
pub struct EventFd {
    handle: sys::RawFd,
}
impl AsRawFd for EventFd {
    fn as_raw_fd(&self) -> std::os::unix::prelude::RawFd {
        self.handle
    }
}
impl Drop for EventFd {
    fn drop(&mut self) {
        if self.handle > -1 {
            close_log_on_error(self.handle);
        }
    }
}

impl EventFd {
    pub fn new(initval: libc::c_uint, semaphore: bool) -> Result<Self> {
        let mut flags = libc::EFD_CLOEXEC | libc::EFD_NONBLOCK;
        if semaphore {
            flags |= libc::EFD_SEMAPHORE;
        }
        let handle = unsafe { libc::eventfd(initval, flags) };
        if handle >= 0 {
            Ok(Self { handle })
        } else {
            Err(Error::last_os_error())
        }
    }

    /// Notify a waiter (multiple notification may be coalesced into one)
    pub fn write(&self, value: u64) -> Result<()> {
        let buf = value.to_ne_bytes();
        write_all(self.handle, &buf, true)
    }

    /// Reads and resets the counter, waiting up to `timeout_ms` (`-1` for ever) for a notification.
    pub fn read(&self, timeout_ms: i32) -> Result<u64> {
        let fd = self.handle;
        let mut buffer = 0u64.to_ne_bytes();

        let pollfd = &mut [PollFd::new(fd, PollEvent::IN)];
        loop {
            match read_all(fd, &mut buffer) {
                Ok(_) => {
                    return Ok(u64::from_ne_bytes(buffer));
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if sys::poll(pollfd, timeout_ms)? == 0 {
                        return Err(Error::from(ErrorKind::TimedOut));
                    }
                }
                Err(err) => {
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let ev = EventFd::new(0, false).unwrap();
        assert_eq!(ev.read(0).unwrap_err().kind(), ErrorKind::TimedOut);
        ev.write(1).unwrap();
        ev.write(2).unwrap();
        assert_eq!(ev.read(0).unwrap(), 3);
        assert_eq!(ev.read(0).unwrap_err().kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn test_semaphore() {
        let ev = EventFd::new(2, true).unwrap();
        assert_eq!(ev.read(0).unwrap(), 1);
        assert_eq!(ev.read(0).unwrap(), 1);
        assert_eq!(ev.read(0).unwrap_err().kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn test_cross_thread_notify() {
        let ev = std::sync::Arc::new(EventFd::new(0, false).unwrap());
        let notifier = ev.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            notifier.write(5).unwrap();
        });
        assert_eq!(ev.read(5000).unwrap(), 5);
        t.join().unwrap();
    }
}
