//! Share a directory with the local network over HTTP
//!
//! [`start`] takes a [`ServeConfig`] through startup: the root is checked, the LAN address
//! probed and the listening socket bound.  The resulting [`Running`] server reports what it
//! is doing through its [`Banner`] and serves until [`Stopper::stop`] is called.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path;
use std::sync::{Arc, Weak};

use file_serve::probe::AddressProbe;

pub use file_serve::probe;

/// Width of the horizontal rules framing the banner
const RULE_WIDTH: usize = 60;

/// What to serve and where
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServeConfig {
    pub root: path::PathBuf,
    pub port: u16,
    pub bind: IpAddr,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            root: path::PathBuf::from("."),
            port: 3000,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

/// Lifecycle of a server
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Starting,
    Running,
    Stopped,
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why the server could not start or keep running
#[derive(Debug)]
pub enum ServeError {
    DirectoryNotFound { directory: path::PathBuf },
    AddressInUse { port: u16 },
    PermissionDenied { port: u16 },
    Io(file_serve::Error),
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectoryNotFound { directory } => {
                write!(f, "Directory '{}' not found", directory.display())
            }
            Self::AddressInUse { port } => write!(f, "Port {port} is already in use."),
            Self::PermissionDenied { port } => {
                write!(f, "Permission denied to listen on port {port}")
            }
            Self::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ServeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl ServeError {
    fn from_bind(port: u16, err: file_serve::Error) -> Self {
        match err.kind() {
            file_serve::ErrorKind::AddrInUse => Self::AddressInUse { port },
            file_serve::ErrorKind::PermissionDenied => Self::PermissionDenied { port },
            _ => Self::Io(err),
        }
    }
}

/// The startup announcement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Banner {
    pub local_url: String,
    pub network_url: String,
    pub root: path::PathBuf,
}

impl Banner {
    fn new(local_addr: SocketAddr, lan_ip: IpAddr, root: &path::Path) -> Self {
        let port = local_addr.port();
        Self {
            local_url: format!("http://localhost:{port}"),
            network_url: format!("http://{}", SocketAddr::new(lan_ip, port)),
            root: root.to_owned(),
        }
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Server running!")?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;
        writeln!(f, "Local:            {}", self.local_url)?;
        writeln!(f, "On Your Network:  {}", self.network_url)?;
        writeln!(f)?;
        writeln!(f, "Serving directory: {}", self.root.display())?;
        writeln!(f)?;
        writeln!(f, "Press CTRL+C to stop the server")?;
        writeln!(f)?;
        writeln!(f, "{rule}")
    }
}

/// Check the root, probe the LAN address and bind the listener
pub fn start(config: &ServeConfig) -> Result<Running, ServeError> {
    start_with(config, &probe::UdpProbe::default())
}

/// Like [`start`] with a custom way of discovering the LAN address
pub fn start_with(
    config: &ServeConfig,
    address_probe: &dyn AddressProbe,
) -> Result<Running, ServeError> {
    log::debug!("Server is {}", State::Starting);
    let started = bind(config, address_probe);
    if let Err(err) = &started {
        log::debug!("Server {}: {err}", State::Failed);
    }
    started
}

fn bind(config: &ServeConfig, address_probe: &dyn AddressProbe) -> Result<Running, ServeError> {
    let root = dunce::canonicalize(&config.root)
        .ok()
        .filter(|root| root.is_dir())
        .ok_or_else(|| ServeError::DirectoryNotFound {
            directory: config.root.clone(),
        })?;

    let lan_ip = probe::discover_with(address_probe);
    log::debug!("Detected network address {lan_ip}");

    let server = file_serve::ServerBuilder::new(&root)
        .bind_addr(config.bind)
        .port(config.port)
        .build()
        .map_err(|err| ServeError::from_bind(config.port, err))?;
    let banner = Banner::new(server.local_addr(), lan_ip, &root);

    Ok(Running {
        server: Arc::new(server),
        banner,
    })
}

/// A bound server, ready to accept requests
#[derive(Debug)]
pub struct Running {
    server: Arc<file_serve::Server>,
    banner: Banner,
}

impl Running {
    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// A handle for stopping the server from another thread
    ///
    /// The handle does not keep the server alive, the socket is still released when
    /// [`Running::run`] returns.
    pub fn stopper(&self) -> Stopper {
        Stopper {
            server: Arc::downgrade(&self.server),
        }
    }

    /// Serve until stopped, releasing the listening socket afterwards
    pub fn run(self) -> Result<(), ServeError> {
        log::debug!("Server is {}", State::Running);
        match self.server.serve() {
            Ok(()) => {
                log::debug!("Server is {}", State::Stopped);
                Ok(())
            }
            Err(err) => {
                log::debug!("Server {}: {err}", State::Failed);
                Err(ServeError::Io(err))
            }
        }
    }
}

/// Stops a [`Running`] server
#[derive(Clone, Debug)]
pub struct Stopper {
    server: Weak<file_serve::Server>,
}

impl Stopper {
    /// Does nothing once the server is gone
    pub fn stop(&self) {
        if let Some(server) = self.server.upgrade() {
            server.close();
        }
    }
}
