//! A single-threaded readiness multiplexer built on `epoll`.
//!
//! Descriptors (timers today) are registered with a [`Multiplexer`] together with
//! a kind tag and a handler, [`Multiplexer::run`] then blocks and hands every
//! read-ready descriptor to [`dispatch`].
//!
//! ```no_run
//! use xevent::{read_expirations, FdKind, Multiplexer, Registration, Timer};
//! use std::os::fd::AsRawFd;
//!
//! let timer = Timer::new(3, 0)?;
//! let mut mux = Multiplexer::new()?;
//! mux.register(Registration::with_callback(
//!     timer.as_raw_fd(),
//!     FdKind::Timer,
//!     |fd, ticks: &mut u64| {
//!         *ticks += read_expirations(fd)?;
//!         Ok(())
//!     },
//!     0u64,
//! ))?;
//! mux.run()?;
//! # Ok::<(), xevent::Error>(())
//! ```
mod dispatch;
mod error;
mod mux;
mod registration;
pub mod sys;
mod timer;

pub use dispatch::*;
pub use error::*;
pub use mux::*;
pub use registration::*;
pub use sys::{read_expirations, set_nonblocking, Clock};
pub use timer::*;

pub(crate) fn saturating_duration_to_timespec(duration: &std::time::Duration) -> libc::timespec {
    let mut mem: libc::timespec = unsafe { std::mem::MaybeUninit::zeroed().assume_init() };
    if duration.as_secs() > libc::time_t::MAX as u64 {
        mem.tv_sec = libc::time_t::MAX;
        mem.tv_nsec = 999_999_999;
    } else {
        mem.tv_sec = duration.as_secs() as _;
        mem.tv_nsec = duration.subsec_nanos() as _;
    }
    mem
}
