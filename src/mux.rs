use crate::registration::Registrations;
use crate::sys::{EPoll, EPollEvent, EventFd, Interest};
use crate::{dispatch, Error, Registration, Result, Token};
use bitflags::bitflags;
use std::io::{self, ErrorKind};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const STOP_TOKEN: u64 = u64::MAX;
/// Upper bound of the registrations preallocated from `size_hint`
const MAX_PREALLOCATED: u32 = 1024;
const READ_INTERESTS: Interest = Interest::IN.union(Interest::ERR).union(Interest::HUP);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MuxFlags: u32 {
        const CLOSE_ON_EXEC = 1u32 << 0;
    }
}

/// Multiplexer parameters
#[derive(Debug, Copy, Clone)]
pub struct MuxConfig {
    /// An hint on the number of descriptors that will be registered
    pub size_hint: u32,
    /// Maximum number of events collected by a single wait
    pub max_events: u32,
    /// Flags
    pub flags: MuxFlags,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            size_hint: 32000,
            max_events: 32,
            flags: MuxFlags::CLOSE_ON_EXEC,
        }
    }
}

/// Lifecycle of a [`Multiplexer`]: `Created → Registered → Running → Terminated`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Created = 0,
    Registered = 1,
    Running = 2,
    Terminated = 3,
}

impl State {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            0 => State::Created,
            1 => State::Registered,
            2 => State::Running,
            _ => State::Terminated,
        }
    }
}

/// Outlives the multiplexer through its stop handles.
#[derive(Debug)]
struct Shared {
    stop: EventFd,
    state: AtomicU8,
}

impl Shared {
    #[inline]
    fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }
    #[inline]
    fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Stops a running [`Multiplexer`], from a handler or from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<Shared>);

impl StopHandle {
    /// Makes `run` return `Ok(())` once the events of its current wait are dispatched.
    ///
    /// A stop requested before `run` is started makes it return after its first wait.
    pub fn stop(&self) -> io::Result<()> {
        self.0.stop.write(1)
    }

    /// State of the multiplexer, `Terminated` once `run` has returned.
    #[inline]
    pub fn state(&self) -> State {
        self.0.state()
    }
}

/// Waits for registered descriptors to become readable and dispatches them.
///
/// Registrations are made before [`Multiplexer::run`], which consumes the
/// multiplexer and closes the polling context when it returns. Registered
/// descriptors are never closed by the multiplexer.
pub struct Multiplexer {
    epoll: EPoll,
    shared: Arc<Shared>,
    registrations: Registrations,
    events: Vec<EPollEvent>,
    config: MuxConfig,
}

impl Multiplexer {
    pub fn new() -> Result<Self> {
        Self::with_config(&MuxConfig::default())
    }

    pub fn with_config(config: &MuxConfig) -> Result<Self> {
        let config = MuxConfig {
            size_hint: num::clamp(config.size_hint, 1, 1_000_000),
            max_events: num::clamp(config.max_events, 1, 1024),
            flags: config.flags,
        };
        let epoll = EPoll::new(
            config.size_hint as libc::c_int,
            config.flags.contains(MuxFlags::CLOSE_ON_EXEC),
        )
        .map_err(Error::Setup)?;
        let stop = EventFd::new(0, false).map_err(Error::Setup)?;
        epoll
            .add(stop.as_raw_fd(), Interest::IN, STOP_TOKEN)
            .map_err(Error::Setup)?;
        let registrations =
            Registrations::with_capacity(config.size_hint.min(MAX_PREALLOCATED) as usize)
                .map_err(Error::Setup)?;
        Ok(Self {
            epoll,
            shared: Arc::new(Shared {
                stop,
                state: AtomicU8::new(State::Created as u8),
            }),
            registrations,
            events: vec![EPollEvent::default(); config.max_events as usize],
            config,
        })
    }

    /// Watches `registration.fd()` for read readiness (errors and hang-ups are
    /// reported by the kernel as well).
    ///
    /// Fails when the descriptor is invalid, can not be polled (regular files) or
    /// is already registered, the existing registrations are left untouched.
    pub fn register(&mut self, registration: Registration) -> Result<Token> {
        let fd = registration.fd();
        let fail = |source: io::Error| Error::Registration { fd, source };
        if fd < 0 {
            return Err(fail(io::Error::from_raw_os_error(libc::EBADF)));
        }
        // Do not register twice
        if self.registrations.contains_fd(fd) {
            return Err(fail(io::Error::from(ErrorKind::AlreadyExists)));
        }
        self.registrations.reserve_one().map_err(fail)?;
        let token = self.registrations.next_token();
        self.epoll
            .add(fd, READ_INTERESTS, token.as_u64())
            .map_err(fail)?;
        log::debug!(
            "register: fd {} as {:?} with token {}",
            fd,
            registration.kind(),
            token.as_u64()
        );
        self.registrations.insert(registration);
        self.shared.set_state(State::Registered);
        Ok(token)
    }

    /// Runs the wait loop on the calling thread.
    ///
    /// Returns `Ok(())` after a [`StopHandle::stop`] and [`Error::Poll`] as soon as
    /// the wait call fails, whatever the cause. Handler failures are logged and do
    /// not stop the loop.
    pub fn run(mut self) -> Result<()> {
        self.shared.set_state(State::Running);
        log::debug!(
            "run: waiting on {} registration(s)",
            self.registrations.len()
        );
        let result = self.run_loop();
        self.shared.set_state(State::Terminated);
        match &result {
            Ok(()) => log::debug!("run: stopped"),
            Err(e) => log::error!("run: {}", e),
        }
        result
    }

    fn run_loop(&mut self) -> Result<()> {
        loop {
            let nevents = self.epoll.wait(&mut self.events, -1).map_err(Error::Poll)?;
            let mut stop = false;
            for i in 0..nevents {
                let event = self.events[i];
                if event.token() == STOP_TOKEN {
                    stop = true;
                    continue;
                }
                let token = Token(event.token());
                let events = event.events();
                if events.contains(Interest::IN) {
                    if let Err(e) = dispatch(self.registrations.get_mut(token)) {
                        log::warn!("dispatch of token {} failed: {}", token.as_u64(), e);
                    }
                } else {
                    // Error and hang-up without readability have no handler
                    log::warn!(
                        "ignored {:?} on token {} (fd {:?})",
                        events,
                        token.as_u64(),
                        self.registrations.get(token).map(Registration::fd)
                    );
                }
            }
            if stop {
                if let Err(e) = self.shared.stop.read(0) {
                    log::warn!("draining the stop event failed: {}", e);
                }
                return Ok(());
            }
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.shared.clone())
    }

    #[inline]
    pub fn state(&self) -> State {
        self.shared.state()
    }

    #[inline]
    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registrations.len() == 0
    }

    pub fn get(&self, token: Token) -> Option<&Registration> {
        self.registrations.get(token)
    }
}

impl AsRawFd for Multiplexer {
    fn as_raw_fd(&self) -> RawFd {
        self.epoll.as_raw_fd()
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("epoll", &self.epoll)
            .field("registrations", &self.registrations.len())
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}
