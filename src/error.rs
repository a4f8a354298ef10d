use std::io;
use std::os::fd::RawFd;

/// Errors reported by timers, the multiplexer and the dispatcher.
///
/// Nothing is retried, every error is surfaced to the immediate caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Creating or arming a timer, or creating the polling context, failed.
    #[error("setup failed: {0}")]
    Setup(#[source] io::Error),
    /// The descriptor is invalid, not pollable or already registered.
    #[error("registration of fd {fd} failed: {source}")]
    Registration {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
    /// Dispatch was asked to handle an event without a registration.
    #[error("no registration to dispatch")]
    Param,
    /// The wait call failed, the run loop is over.
    #[error("wait failed: {0}")]
    Poll(#[source] io::Error),
    /// A handler reported a failure while consuming its descriptor.
    #[error("handler for fd {fd} failed: {source}")]
    Callback {
        fd: RawFd,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The OS error code behind this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Setup(e) | Error::Poll(e) => e.raw_os_error(),
            Error::Registration { source, .. } | Error::Callback { source, .. } => {
                source.raw_os_error()
            }
            Error::Param => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Setup(e) | Error::Poll(e) => e,
            Error::Registration { source, .. } | Error::Callback { source, .. } => source,
            Error::Param => io::Error::from(io::ErrorKind::InvalidInput),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_io_error() {
        let err = Error::Registration {
            fd: 3,
            source: io::Error::from_raw_os_error(libc::EBADF),
        };
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        assert_eq!(
            err.to_string(),
            format!(
                "registration of fd 3 failed: {}",
                io::Error::from_raw_os_error(libc::EBADF)
            )
        );
        let io_err: io::Error = err.into();
        assert_eq!(io_err.raw_os_error(), Some(libc::EBADF));

        let io_err: io::Error = Error::Param.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(Error::Param.raw_os_error(), None);
    }
}
