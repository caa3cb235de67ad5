//! TCP listener: one OS thread per accepted connection.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::handler::ConnectionHandler;
use crate::shutdown::ShutdownState;

/// How long the accept loop sleeps when no connection is pending.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Listener {
    listener: TcpListener,
    handler: Arc<ConnectionHandler>,
    shutdown: Arc<ShutdownState>,
    read_timeout: Duration,
}

impl Listener {
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        handler: Arc<ConnectionHandler>,
        shutdown: Arc<ShutdownState>,
        read_timeout: Duration,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            handler,
            shutdown,
            read_timeout,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown is requested, then wait for the
    /// in-flight handlers to finish (and clean up their jobs).
    pub fn run(self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "gateway listening");

        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        let mut next_id: u64 = 0;

        while !self.shutdown.is_shutdown_requested() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    next_id += 1;
                    workers.retain(|w| !w.is_finished());
                    match self.spawn(stream, peer, next_id) {
                        Ok(worker) => workers.push(worker),
                        Err(e) => error!(peer = %peer, error = %e, "could not start connection thread"),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        workers.retain(|w| !w.is_finished());
        info!(in_flight = workers.len(), "stopped accepting, draining connections");
        for worker in workers {
            if worker.join().is_err() {
                error!("connection thread panicked");
            }
        }
        info!("gateway stopped");
        Ok(())
    }

    fn spawn(&self, stream: TcpStream, peer: SocketAddr, conn_id: u64) -> io::Result<JoinHandle<()>> {
        // Accepted sockets inherit non-blocking mode on some platforms.
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.read_timeout))?;

        let handler = Arc::clone(&self.handler);
        thread::Builder::new()
            .name(format!("conn-{}", conn_id))
            .spawn(move || handler.handle_connection(stream, peer, conn_id))
    }
}
