use crate::sys::{poll, PollEvent, PollFd};
use std::fs::File;
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::os::fd::FromRawFd;

const BLOCK_ON_EAGAIN_TIMEOUT_MS: libc::c_int = 5000;

/// Fills `buf` from `fd`, retrying on `EINTR`. `WouldBlock` is returned as is.
pub(crate) fn read_all(fd: libc::c_int, buf: &mut [u8]) -> Result<()> {
    let mut file = std::mem::ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });
    let mut done = 0;
    let todo = buf.len();
    while done < todo {
        match file.read(&mut buf[done..]) {
            Ok(0) => {
                return Err(Error::from(ErrorKind::UnexpectedEof));
            }
            Ok(n) => {
                done += n;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                return Err(e);
            }
        }
    }
    Ok(())
}

pub(crate) fn write_all(fd: libc::c_int, buf: &[u8], block_on_eagain: bool) -> Result<()> {
    let mut file = std::mem::ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });
    let mut done = 0;
    let todo = buf.len();
    while done < todo {
        match file.write(&buf[done..]) {
            Ok(n) => {
                done += n;
            }
            Err(e) => match e.kind() {
                ErrorKind::WouldBlock => {
                    if block_on_eagain {
                        let pollfd = &mut [PollFd::new(fd, PollEvent::OUT)];
                        poll(pollfd, BLOCK_ON_EAGAIN_TIMEOUT_MS)?;
                    } else {
                        return Err(e);
                    }
                }
                ErrorKind::Interrupted => {}
                _ => {
                    return Err(e);
                }
            },
        }
    }
    Ok(())
}

/// Sets or clears `O_NONBLOCK` on `fd`.
///
/// This is a file status flag (`F_SETFL`), it is shared by every descriptor
/// duplicated from the same open file description.
pub fn set_nonblocking(fd: libc::c_int, non_blocking: bool) -> Result<()> {
    let mut tags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if tags < 0 {
        return Err(Error::last_os_error());
    }
    tags = if non_blocking {
        tags | libc::O_NONBLOCK
    } else {
        tags & !libc::O_NONBLOCK
    };
    if unsafe { libc::fcntl(fd, libc::F_SETFL, tags) < 0 } {
        return Err(Error::last_os_error());
    }
    Ok(())
}

pub(crate) fn close_log_on_error(fd: libc::c_int) {
    if fd >= 0 && unsafe { libc::close(fd) } < 0 {
        log::warn!(
            "libc::close({}) failed: {:?}",
            fd,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::EventFd;
    use std::os::fd::AsRawFd;

    fn status_flags(fd: libc::c_int) -> libc::c_int {
        unsafe { libc::fcntl(fd, libc::F_GETFL) }
    }
    fn descriptor_flags(fd: libc::c_int) -> libc::c_int {
        unsafe { libc::fcntl(fd, libc::F_GETFD) }
    }

    #[test]
    fn test_set_nonblocking() {
        let ev = EventFd::new(0, false).unwrap();
        let fd = ev.as_raw_fd();
        assert_ne!(status_flags(fd) & libc::O_NONBLOCK, 0);

        set_nonblocking(fd, false).unwrap();
        assert_eq!(status_flags(fd) & libc::O_NONBLOCK, 0);
        // Descriptor flags are untouched
        assert_ne!(descriptor_flags(fd) & libc::FD_CLOEXEC, 0);

        set_nonblocking(fd, true).unwrap();
        assert_ne!(status_flags(fd) & libc::O_NONBLOCK, 0);
    }

    #[test]
    fn test_bad_fd() {
        let err = set_nonblocking(-1, true).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_read_write_all() {
        let ev = EventFd::new(0, false).unwrap();
        let fd = ev.as_raw_fd();
        let mut buf = 0u64.to_ne_bytes();
        let err = read_all(fd, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);

        write_all(fd, &7u64.to_ne_bytes(), false).unwrap();
        read_all(fd, &mut buf).unwrap();
        assert_eq!(u64::from_ne_bytes(buf), 7);
    }
}
