//! Listener lifecycle.
//!
//! [`HttpServer`] puts any `HttpService` on a socket; the returned [`ServerHandle`] is the
//! only way to observe or end the accept coroutine.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use may::coroutine::JoinHandle;
use may_minihttp::HttpService;
use tracing::{debug, info};

const READY_ATTEMPTS: u32 = 50;
const READY_INTERVAL: Duration = Duration::from_millis(5);

/// A service waiting to be bound.
pub struct HttpServer<T>(pub T);

impl<T> HttpServer<T>
where
    T: HttpService + Clone + Send + Sync + 'static,
{
    /// Bind the first address `addr` resolves to and start accepting on a coroutine.
    ///
    /// # Errors
    ///
    /// Resolution errors, an address that resolves to nothing, or a failed bind.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = first_addr(addr)?;
        let handle = may_minihttp::HttpServer(self.0).start(addr)?;
        info!(%addr, "Listening");
        Ok(ServerHandle { addr, handle })
    }
}

fn first_addr<A: ToSocketAddrs>(addr: A) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    })
}

/// Owner of a running listener.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until a TCP connect to the listener succeeds.
    ///
    /// # Errors
    ///
    /// `TimedOut` when no connection is accepted within 250ms.
    pub fn wait_ready(&self) -> io::Result<()> {
        for attempt in 1..=READY_ATTEMPTS {
            if TcpStream::connect(self.addr).is_ok() {
                debug!(addr = %self.addr, attempt, "Listener accepting");
                return Ok(());
            }
            thread::sleep(READY_INTERVAL);
        }
        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{} not accepting connections", self.addr),
        ))
    }

    /// Cancel the accept coroutine and wait for it to unwind.
    ///
    /// Requests already being served are not drained.
    pub fn stop(self) {
        // SAFETY: we own the only handle to this coroutine; cancelling it is how may ends
        // a blocking accept loop.
        unsafe { self.handle.coroutine().cancel() };
        // Cancellation surfaces as a panic payload from join.
        let cancelled = self.handle.join().is_err();
        info!(addr = %self.addr, cancelled, "Stopped listening");
    }

    /// Block until the accept coroutine exits on its own.
    ///
    /// # Errors
    ///
    /// The panic payload if the coroutine panicked.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_addr_takes_first_resolution() {
        let addrs: [SocketAddr; 2] = ["127.0.0.1:9001".parse().unwrap(), "127.0.0.1:9002".parse().unwrap()];
        assert_eq!(first_addr(&addrs[..]).unwrap().port(), 9001);
    }

    #[test]
    fn test_first_addr_rejects_empty_resolution() {
        let none: &[SocketAddr] = &[];
        let err = first_addr(none).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
