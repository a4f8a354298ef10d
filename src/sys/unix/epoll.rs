use super::ioutils::close_log_on_error;
use std::{
    io::{Error, Result},
    os::fd::{AsRawFd, RawFd},
};

#[derive(Debug)]
pub struct EPoll {
    handle: libc::c_int,
}

impl AsRawFd for EPoll {
    fn as_raw_fd(&self) -> RawFd {
        self.handle
    }
}

bitflags::bitflags! {
    /// Represents a set of epoll interests or events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Interest: libc::c_int {
        /// Readable interests or event.
        const IN = libc::EPOLLIN;

        /// Error event.
        const ERR = libc::EPOLLERR;
        /// Hang-up event (peer closed its end of the channel).
        const HUP = libc::EPOLLHUP;
    }
}

impl EPoll {
    /// Creates an epoll instance.
    ///
    /// `size_hint` is passed to the legacy `epoll_create` when `close_on_exec` is
    /// not requested, the kernel ignores it but requires it to be positive.
    pub fn new(size_hint: libc::c_int, close_on_exec: bool) -> Result<Self> {
        let epfd = unsafe {
            if close_on_exec {
                libc::epoll_create1(libc::EPOLL_CLOEXEC)
            } else {
                libc::epoll_create(size_hint.max(1))
            }
        };
        if epfd >= 0 {
            Ok(EPoll { handle: epfd })
        } else {
            Err(Error::last_os_error())
        }
    }

    pub fn ctl(&self, fd: RawFd, op: libc::c_int, interests: Interest, token: u64) -> Result<()> {
        let mut event = libc::epoll_event {
            events: interests.bits() as _,
            u64: token,
        };
        if unsafe { libc::epoll_ctl(self.handle, op, fd, &mut event as _) } >= 0 {
            Ok(())
        } else {
            Err(Error::last_os_error())
        }
    }

    #[inline]
    pub fn add(&self, fd: RawFd, interests: Interest, token: u64) -> Result<()> {
        self.ctl(fd, libc::EPOLL_CTL_ADD, interests, token)
    }

    /// Waits for events, `timeout_ms` is `-1` to wait for ever.
    ///
    /// Returns the number of entries filled at the start of `events`.
    pub fn wait(&self, events: &mut [EPollEvent], timeout_ms: i32) -> Result<usize> {
        let maxevents = if events.len() > i32::MAX as usize {
            i32::MAX
        } else {
            events.len() as i32
        };
        let status = unsafe {
            libc::epoll_pwait(
                self.handle,
                events.as_mut_ptr() as _,
                maxevents,
                timeout_ms,
                std::ptr::null(),
            )
        };
        if status >= 0 {
            Ok(status as usize)
        } else {
            Err(Error::last_os_error())
        }
    }
}

impl Drop for EPoll {
    fn drop(&mut self) {
        if self.handle > -1 {
            close_log_on_error(self.handle);
        }
    }
}

#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct EPollEvent(libc::epoll_event);

const _: () = assert!(
    std::mem::align_of::<EPollEvent>() == std::mem::align_of::<libc::epoll_event>()
        && std::mem::size_of::<EPollEvent>() == std::mem::size_of::<libc::epoll_event>()
);

impl EPollEvent {
    #[inline(always)]
    pub fn token(&self) -> u64 {
        self.0.u64
    }
    #[inline(always)]
    pub fn events(&self) -> Interest {
        Interest::from_bits_truncate(self.0.events as _)
    }
}

impl Default for EPollEvent {
    fn default() -> Self {
        Self(libc::epoll_event { events: 0, u64: 0 })
    }
}

impl std::fmt::Debug for EPollEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EPollEvent")
            .field("events", &self.events())
            .field("token", &self.token())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::EventFd;

    #[test]
    fn test_wait_reports_token() {
        let epoll = EPoll::new(1, true).unwrap();
        let ev = EventFd::new(0, false).unwrap();
        epoll.add(ev.as_raw_fd(), Interest::IN, 42).unwrap();

        let mut events = [EPollEvent::default(); 4];
        assert_eq!(epoll.wait(&mut events, 0).unwrap(), 0);

        ev.write(1).unwrap();
        assert_eq!(epoll.wait(&mut events, 1000).unwrap(), 1);
        assert_eq!(events[0].token(), 42);
        assert!(events[0].events().contains(Interest::IN));

        // Level triggered: still ready until drained
        assert_eq!(epoll.wait(&mut events, 0).unwrap(), 1);
        ev.read(0).unwrap();
        assert_eq!(epoll.wait(&mut events, 0).unwrap(), 0);
    }

    #[test]
    fn test_add_twice() {
        let epoll = EPoll::new(32000, false).unwrap();
        let ev = EventFd::new(0, false).unwrap();
        epoll.add(ev.as_raw_fd(), Interest::IN, 1).unwrap();
        let err = epoll.add(ev.as_raw_fd(), Interest::IN, 2).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EEXIST));
    }

    #[test]
    fn test_add_bad_fd() {
        let epoll = EPoll::new(1, true).unwrap();
        let err = epoll.add(-1, Interest::IN, 1).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }
}
