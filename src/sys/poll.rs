use std::io::{Error, ErrorKind, Result};

use super::RawFd;

#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct PollFd(libc::pollfd);

pub const MAX_POLL_FDS: usize = libc::nfds_t::MAX as _;

bitflags::bitflags! {
    /// Represents a set of input and output flags for poll.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct PollEvent: i16 {
        /// Readable interests or event.
        const IN = libc::POLLIN;
        /// Writable interests or event.
        const OUT = libc::POLLOUT;

        /// Error event.
        const ERR = libc::POLLERR;
        /// Hang-up event (peer closed its end of the channel).
        const HUP = libc::POLLHUP;
    }
}

impl PollFd {
    #[inline]
    pub fn new(fd: RawFd, events: PollEvent) -> Self {
        Self(libc::pollfd {
            fd,
            events: events.bits(),
            revents: 0 as _,
        })
    }

    #[inline(always)]
    pub fn fd(&self) -> RawFd {
        self.0.fd
    }

    #[inline(always)]
    pub fn events(&self) -> PollEvent {
        PollEvent::from_bits_truncate(self.0.events)
    }

    #[inline(always)]
    pub fn revents(&self) -> PollEvent {
        PollEvent::from_bits_truncate(self.0.revents)
    }
}

impl Default for PollFd {
    #[inline(always)]
    fn default() -> Self {
        Self(libc::pollfd {
            fd: super::INVALID_RAW_FD,
            events: 0,
            revents: 0,
        })
    }
}

impl std::fmt::Debug for PollFd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollFd")
            .field("fd", &self.0.fd)
            .field("events", &self.events())
            .field("revents", &self.revents())
            .finish()
    }
}

/// Waits up to `timeout` milliseconds (`-1` for ever) for one of `pfd` to be ready.
///
/// Returns the number of entries with a non-empty `revents`.
pub fn poll(pfd: &mut [PollFd], timeout: libc::c_int) -> Result<usize> {
    // A bug in kernels < 2.6.37 makes timeouts larger than LONG_MAX / CONFIG_HZ
    // (approx. 30 minutes with CONFIG_HZ=1200) effectively infinite on 32 bits
    // architectures. The magic number is the same constant used by libuv.
    #[cfg(target_pointer_width = "32")]
    let timeout = std::cmp::min(1789569 as libc::c_int, timeout);

    if pfd.len() > MAX_POLL_FDS {
        return Err(Error::from(ErrorKind::InvalidInput));
    }
    let poll_result = unsafe { libc::poll(pfd.as_mut_ptr() as _, pfd.len() as _, timeout as _) };
    if poll_result < 0 {
        Err(Error::last_os_error())
    } else {
        Ok(poll_result as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::EventFd;
    use std::os::fd::AsRawFd;

    #[test]
    fn test_poll_timeout_and_ready() {
        let ev = EventFd::new(0, false).unwrap();
        let pfd = &mut [PollFd::new(ev.as_raw_fd(), PollEvent::IN)];
        assert_eq!(poll(pfd, 10).unwrap(), 0);
        assert!(pfd[0].revents().is_empty());

        ev.write(1).unwrap();
        assert_eq!(poll(pfd, 10).unwrap(), 1);
        assert!(pfd[0].revents().contains(PollEvent::IN));
        assert_eq!(pfd[0].fd(), ev.as_raw_fd());
        assert_eq!(pfd[0].events(), PollEvent::IN);
    }

    #[test]
    fn test_poll_invalid_fd() {
        // Negative fds are ignored by poll
        let pfd = &mut [PollFd::default()];
        assert_eq!(poll(pfd, 0).unwrap(), 0);
    }
}
