pub type RawFd = std::os::fd::RawFd;
pub const INVALID_RAW_FD: RawFd = -1;

pub(crate) mod ioutils;
pub use ioutils::set_nonblocking;

mod epoll;
pub use epoll::*;

mod eventfd;
pub use eventfd::*;

mod timerfd;
pub use timerfd::*;
