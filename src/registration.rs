use rustc_hash::{FxBuildHasher, FxHashMap};
use std::fmt::Debug;
use std::io;
use std::os::fd::RawFd;

/// Kind of a registered descriptor, selects what dispatch does with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FdKind {
    Timer,
    /// Reserved, not dispatched.
    Socket,
    /// Reserved, not dispatched.
    File,
}

/// Consumes the readiness of a descriptor.
pub trait EventHandler {
    fn on_ready(&mut self, fd: RawFd) -> io::Result<()>;
}

/// An [`EventHandler`] calling `func(fd, &mut argument)`.
///
/// `argument` is handed to `func` untouched on every call and lives as long as
/// the registration.
pub struct Callback<A, F> {
    func: F,
    argument: A,
}

impl<A, F> Callback<A, F>
where
    F: FnMut(RawFd, &mut A) -> io::Result<()>,
{
    pub fn new(func: F, argument: A) -> Self {
        Self { func, argument }
    }

    pub fn argument(&self) -> &A {
        &self.argument
    }
}

impl<A, F> EventHandler for Callback<A, F>
where
    F: FnMut(RawFd, &mut A) -> io::Result<()>,
{
    #[inline]
    fn on_ready(&mut self, fd: RawFd) -> io::Result<()> {
        (self.func)(fd, &mut self.argument)
    }
}

/// Binds a descriptor to its kind and handler.
///
/// The descriptor is borrowed: it must stay open while registered and is closed
/// by whoever created it.
pub struct Registration {
    fd: RawFd,
    kind: FdKind,
    handler: Box<dyn EventHandler>,
}

impl Registration {
    pub fn new(fd: RawFd, kind: FdKind, handler: Box<dyn EventHandler>) -> Self {
        Self { fd, kind, handler }
    }

    pub fn with_callback<A, F>(fd: RawFd, kind: FdKind, func: F, argument: A) -> Self
    where
        A: 'static,
        F: FnMut(RawFd, &mut A) -> io::Result<()> + 'static,
    {
        Self::new(fd, kind, Box::new(Callback::new(func, argument)))
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    #[inline]
    pub fn kind(&self) -> FdKind {
        self.kind
    }

    #[inline]
    pub(crate) fn handler_mut(&mut self) -> &mut dyn EventHandler {
        self.handler.as_mut()
    }
}

impl Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("fd", &self.fd)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Stable handle of a registration, carried as the epoll payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub(crate) u64);

impl Token {
    #[inline(always)]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Arena of registrations indexed by [`Token`], with an index on descriptors.
pub(crate) struct Registrations {
    entries: Vec<Registration>,
    by_fd: FxHashMap<RawFd, Token>,
}

impl Registrations {
    pub(crate) fn with_capacity(capacity: usize) -> io::Result<Self> {
        let mut entries = Vec::new();
        entries
            .try_reserve(capacity)
            .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
        let mut by_fd = FxHashMap::with_hasher(FxBuildHasher);
        by_fd
            .try_reserve(capacity)
            .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
        Ok(Self { entries, by_fd })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn contains_fd(&self, fd: RawFd) -> bool {
        self.by_fd.contains_key(&fd)
    }

    /// Token the next call to `insert` will return.
    #[inline]
    pub(crate) fn next_token(&self) -> Token {
        Token(self.entries.len() as u64)
    }

    pub(crate) fn reserve_one(&mut self) -> io::Result<()> {
        self.entries
            .try_reserve(1)
            .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
        self.by_fd
            .try_reserve(1)
            .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))
    }

    pub(crate) fn insert(&mut self, registration: Registration) -> Token {
        let token = self.next_token();
        debug_assert!(!self.by_fd.contains_key(&registration.fd));
        self.by_fd.insert(registration.fd, token);
        self.entries.push(registration);
        token
    }

    #[inline]
    pub(crate) fn get(&self, token: Token) -> Option<&Registration> {
        self.entries.get(usize::try_from(token.0).ok()?)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, token: Token) -> Option<&mut Registration> {
        self.entries.get_mut(usize::try_from(token.0).ok()?)
    }
}
