//! Readiness demultiplexing back ends
//!
//! Two interchangeable back ends sit behind the [`EventLoop`] trait: a
//! `poll(2)` loop scanning a flat descriptor array, and an edge-triggered
//! `epoll(7)` queue. Both translate their native event bits into the small
//! [`Ready`] set before the server dispatches, and both wake at least once a
//! second so the server can observe its stop flag.

use std::io;
use std::os::fd::RawFd;

use crate::config::LoopModel;

/// Upper bound on events drained per wakeup.
pub const MAX_EVENTS: usize = 64;

/// Wakeup granularity in milliseconds.
const WAIT_TIMEOUT_MS: i32 = 1000;

/// Readiness bits shared by both back ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready(u8);

impl Ready {
    pub const READ: Ready = Ready(0b001);
    pub const WRITE: Ready = Ready(0b010);
    pub const ERROR: Ready = Ready(0b100);

    pub const fn empty() -> Ready {
        Ready(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Ready) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Ready {
    type Output = Ready;

    fn bitor(self, rhs: Ready) -> Ready {
        Ready(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Ready {
    fn bitor_assign(&mut self, rhs: Ready) {
        self.0 |= rhs.0;
    }
}

/// One readiness notification.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub fd: RawFd,
    pub ready: Ready,
}

/// Readiness demultiplexer. Back ends register interest per descriptor and
/// surface ready descriptors through `wait`; the server owns the run loop
/// and the stop flag.
pub trait EventLoop: Send {
    fn add(&mut self, fd: RawFd, interest: Ready) -> io::Result<()>;
    fn modify(&mut self, fd: RawFd, interest: Ready) -> io::Result<()>;
    fn remove(&mut self, fd: RawFd) -> io::Result<()>;

    /// Block until readiness or timeout, appending ready descriptors to
    /// `events`. Returns the number appended; zero on timeout or signal.
    fn wait(&mut self, events: &mut Vec<Event>) -> io::Result<usize>;
}

/// Construct the back end selected at startup.
pub fn new_event_loop(model: LoopModel) -> io::Result<Box<dyn EventLoop>> {
    match model {
        LoopModel::Poll => Ok(Box::new(PollLoop::new())),
        LoopModel::Epoll => Ok(Box::new(EpollLoop::new()?)),
    }
}

// ---------------------------------------------------------------------------
// poll(2) back end
// ---------------------------------------------------------------------------

/// Flat descriptor array handed to `poll(2)` each wakeup; registration and
/// lookup are linear scans.
pub struct PollLoop {
    fds: Vec<libc::pollfd>,
}

fn poll_interest(interest: Ready) -> libc::c_short {
    let mut events = 0;
    if interest.contains(Ready::READ) {
        events |= libc::POLLIN;
    }
    if interest.contains(Ready::WRITE) {
        events |= libc::POLLOUT;
    }
    events
}

fn ready_from_poll(revents: libc::c_short) -> Ready {
    let mut ready = Ready::empty();
    if revents & libc::POLLIN != 0 {
        ready |= Ready::READ;
    }
    if revents & libc::POLLOUT != 0 {
        ready |= Ready::WRITE;
    }
    if revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        ready |= Ready::ERROR;
    }
    ready
}

impl PollLoop {
    pub fn new() -> Self {
        Self { fds: Vec::new() }
    }
}

impl Default for PollLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop for PollLoop {
    fn add(&mut self, fd: RawFd, interest: Ready) -> io::Result<()> {
        if self.fds.iter().any(|p| p.fd == fd) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }
        self.fds.push(libc::pollfd {
            fd,
            events: poll_interest(interest),
            revents: 0,
        });
        Ok(())
    }

    fn modify(&mut self, fd: RawFd, interest: Ready) -> io::Result<()> {
        match self.fds.iter_mut().find(|p| p.fd == fd) {
            Some(p) => {
                p.events = poll_interest(interest);
                Ok(())
            }
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }

    fn remove(&mut self, fd: RawFd) -> io::Result<()> {
        let before = self.fds.len();
        self.fds.retain(|p| p.fd != fd);
        if self.fds.len() == before {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        Ok(())
    }

    fn wait(&mut self, events: &mut Vec<Event>) -> io::Result<usize> {
        let rc = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                WAIT_TIMEOUT_MS,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }

        let mut appended = 0;
        for p in &mut self.fds {
            if p.revents == 0 {
                continue;
            }
            let ready = ready_from_poll(p.revents);
            p.revents = 0;
            if !ready.is_empty() {
                events.push(Event { fd: p.fd, ready });
                appended += 1;
            }
        }
        Ok(appended)
    }
}

// ---------------------------------------------------------------------------
// epoll(7) back end
// ---------------------------------------------------------------------------

/// Kernel readiness queue; one `epoll_wait` returns up to [`MAX_EVENTS`]
/// ready descriptors. Registrations are edge-triggered, so readers must
/// drain until `WouldBlock`.
pub struct EpollLoop {
    epfd: RawFd,
    buf: Vec<libc::epoll_event>,
}

fn epoll_interest(interest: Ready) -> u32 {
    let mut events = libc::EPOLLET as u32;
    if interest.contains(Ready::READ) {
        events |= libc::EPOLLIN as u32;
    }
    if interest.contains(Ready::WRITE) {
        events |= libc::EPOLLOUT as u32;
    }
    events
}

fn ready_from_epoll(events: u32) -> Ready {
    let mut ready = Ready::empty();
    if events & libc::EPOLLIN as u32 != 0 {
        ready |= Ready::READ;
    }
    if events & libc::EPOLLOUT as u32 != 0 {
        ready |= Ready::WRITE;
    }
    if events & (libc::EPOLLERR as u32 | libc::EPOLLHUP as u32) != 0 {
        ready |= Ready::ERROR;
    }
    ready
}

impl EpollLoop {
    pub fn new() -> io::Result<Self> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            epfd,
            buf: vec![libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS],
        })
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, events: u32) -> io::Result<()> {
        let mut ev = libc::epoll_event {
            events,
            u64: fd as u64,
        };
        let rc = unsafe { libc::epoll_ctl(self.epfd, op, fd, &mut ev) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl EventLoop for EpollLoop {
    fn add(&mut self, fd: RawFd, interest: Ready) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, epoll_interest(interest))
    }

    fn modify(&mut self, fd: RawFd, interest: Ready) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, epoll_interest(interest))
    }

    fn remove(&mut self, fd: RawFd) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_DEL, fd, 0)
    }

    fn wait(&mut self, events: &mut Vec<Event>) -> io::Result<usize> {
        let rc = unsafe {
            libc::epoll_wait(
                self.epfd,
                self.buf.as_mut_ptr(),
                self.buf.len() as libc::c_int,
                WAIT_TIMEOUT_MS,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }

        let mut appended = 0;
        for ev in &self.buf[..rc as usize] {
            let ready = ready_from_epoll(ev.events);
            if !ready.is_empty() {
                events.push(Event {
                    fd: ev.u64 as RawFd,
                    ready,
                });
                appended += 1;
            }
        }
        Ok(appended)
    }
}

impl Drop for EpollLoop {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epfd);
        }
    }
}
