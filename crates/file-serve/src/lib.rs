//! > An HTTP Static File Server for the local network
//!
//! `file-serve` shares a directory with other machines on the LAN.  It prioritizes
//! small size and compile times over speed or scalability, but never serves anything
//! outside of the root it was given.
//!
//! # Example
//!
//! ```rust,no_run
//! let path = std::env::current_dir().unwrap();
//! let server = file_serve::ServerBuilder::new(&path).port(3000).build().unwrap();
//!
//! println!("Serving {}", path.display());
//! println!("See http://{}", server.local_addr());
//! println!("On your network http://{}", file_serve::probe::discover_local_address());
//!
//! server.serve().unwrap();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod handler;
pub mod probe;

pub use handler::Resolved;
pub use handler::render_listing;
pub use handler::resolve;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Backlog handed to `listen(2)`
const BACKLOG: i32 = 128;

/// Custom server settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerBuilder {
    root: std::path::PathBuf,
    bind: IpAddr,
    port: u16,
}

impl ServerBuilder {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: root.into(),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
        }
    }

    /// Override the interface to listen on
    ///
    /// By default, all interfaces (`0.0.0.0`) are used.
    pub fn bind_addr(&mut self, bind: IpAddr) -> &mut Self {
        self.bind = bind;
        self
    }

    /// Override the port
    ///
    /// Defaults to `3000`.  `0` lets the OS pick one, see [`Server::local_addr`].
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    /// Bind the listening socket
    ///
    /// Address reuse is enabled so a restart right after a crash does not trip over
    /// sockets lingering in `TIME_WAIT`.
    pub fn build(&self) -> Result<Server, Error> {
        let addr = SocketAddr::new(self.bind, self.port);
        let listener = bind_listener(addr).map_err(|err| Error::from_io(addr, &err))?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| Error::from_io(addr, &err))?;
        let server = tiny_http::Server::from_listener(listener, None)
            .map_err(|err| Error::new(ErrorKind::Io, err))?;
        log::debug!("Listening on {local_addr}");

        Ok(Server {
            root: self.root.clone(),
            local_addr,
            server,
        })
    }
}

/// A bound static file server
///
/// The listening socket is released when the `Server` is dropped.
pub struct Server {
    root: std::path::PathBuf,
    local_addr: SocketAddr,
    server: tiny_http::Server,
}

impl Server {
    /// The location being served
    pub fn root(&self) -> &std::path::Path {
        self.root.as_path()
    }

    /// The address the listening socket is bound to
    ///
    /// Reflects the port the OS picked when the builder asked for port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve requests until [`Server::close`] is called
    ///
    /// Connections are accepted and read in the background, but responses are written one
    /// at a time on the calling thread, so a slow reader holds up every request behind it.
    pub fn serve(&self) -> Result<(), Error> {
        for request in self.server.incoming_requests() {
            // per-request failures are the client's problem, not the server's
            if let Err(e) = handler::static_file_handler(self.root(), request) {
                log::error!("{e}");
            }
        }
        log::debug!("Stopped accepting requests on {}", self.local_addr);

        Ok(())
    }

    /// Closes the server gracefully
    ///
    /// Safe to call from another thread, e.g. a signal handler.
    pub fn close(&self) {
        self.server.unblock();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("root", &self.root)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

/// What went wrong while binding or serving
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Another socket already listens on the address
    AddrInUse,
    /// The port is privileged and the process is not
    PermissionDenied,
    /// Anything else the OS reported
    Io,
}

/// Serve Error
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    fn new(kind: ErrorKind, message: impl ToString) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }

    fn from_io(addr: SocketAddr, err: &std::io::Error) -> Self {
        Self::new(kind_of(err), format!("failed to bind {addr}: {err}"))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.message.fmt(fmt)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(kind_of(&err), err)
    }
}

fn kind_of(err: &std::io::Error) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::AddrInUse => ErrorKind::AddrInUse,
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        _ => ErrorKind::Io,
    }
}

fn bind_listener(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    // On Windows SO_REUSEADDR lets a second process steal a port that is in use
    #[cfg(not(windows))]
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    Ok(socket.into())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builder_defaults_to_all_interfaces() {
        let builder = ServerBuilder::new(".");
        assert_eq!(builder.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(builder.port, 3000);
    }

    #[test]
    fn ephemeral_port_is_reported() {
        let server = ServerBuilder::new(".")
            .bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(0)
            .build()
            .unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.local_addr().ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn occupied_port_is_addr_in_use() {
        let blocker = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = blocker.local_addr().unwrap().port();

        let err = ServerBuilder::new(".")
            .bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(port)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AddrInUse);
        assert!(err.to_string().contains(&port.to_string()));
    }

    #[test]
    fn privileged_port_is_permission_denied() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 80);
        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);

        let err = Error::from_io(addr, &io);
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.to_string().starts_with("failed to bind 0.0.0.0:80"));
    }

    #[test]
    fn other_bind_failures_are_io() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 3000);
        let io = std::io::Error::from(std::io::ErrorKind::AddrNotAvailable);

        assert_eq!(Error::from_io(addr, &io).kind(), ErrorKind::Io);
    }
}
