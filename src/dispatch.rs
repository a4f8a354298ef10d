use crate::{Error, FdKind, Registration, Result};

/// Invokes the handler of a ready registration according to its kind.
///
/// `None` stands for an event whose payload does not resolve to a registration
/// and yields [`Error::Param`] without calling anything. Only timers are
/// dispatched, the other kinds are reserved and silently skipped.
pub fn dispatch(registration: Option<&mut Registration>) -> Result<()> {
    let Some(registration) = registration else {
        return Err(Error::Param);
    };
    let fd = registration.fd();
    match registration.kind() {
        FdKind::Timer => {
            log::trace!("dispatch: fd {} (timer)", fd);
            registration
                .handler_mut()
                .on_ready(fd)
                .map_err(|source| Error::Callback { fd, source })
        }
        FdKind::Socket | FdKind::File => Ok(()),
    }
}
