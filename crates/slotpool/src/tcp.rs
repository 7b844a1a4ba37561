//! TCP driver — pools plain TCP connections to database servers.
//!
//! The driver resolves the DSN's host and port, opens a `TcpStream` and
//! hands it to the pool. It performs **no protocol handshake**; callers
//! speak the wire protocol over `TcpConnection::stream()`.
//!
//! Liveness is probed without consuming data: `ping` peeks one byte with a
//! short read timeout. EOF means the peer closed the connection; a timeout
//! means the connection is open and quiet.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use slotpool_core::Dsn;

use crate::driver::{Connection, Driver, Drivers};
use crate::error::DriverError;

pub const POSTGRES_PORT: u16 = 5432;
pub const MYSQL_PORT: u16 = 3306;
pub const REDIS_PORT: u16 = 6379;

const PING_TIMEOUT: Duration = Duration::from_millis(100);

/// Driver opening plain TCP connections.
#[derive(Clone, Debug)]
pub struct TcpDriver {
    default_port: u16,
    connect_timeout: Duration,
}

impl TcpDriver {
    /// `default_port` is used when the DSN does not name one.
    pub fn new(default_port: u16) -> Self {
        Self {
            default_port,
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }
}

impl Driver for TcpDriver {
    type Conn = TcpConnection;

    fn open(&self, dsn: &str) -> Result<TcpConnection, DriverError> {
        let dsn = Dsn::parse(dsn).map_err(|e| DriverError::InvalidDsn(e.to_string()))?;
        let address = dsn.address(self.default_port);

        let mut last_err = None;
        for addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    tracing::debug!(%dsn, peer = %addr, "tcp connection established");
                    return Ok(TcpConnection { stream, peer: addr });
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) => DriverError::Io(e),
            None => DriverError::Refused(format!("no addresses resolved for {address}")),
        })
    }
}

/// One pooled TCP connection.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The underlying stream. `&TcpStream` implements `Read` and `Write`.
    ///
    /// Only use the stream while holding the lease. Once the slot is
    /// released the sweeper may ping it, and a ping briefly shortens the
    /// socket's read timeout, so a read through a retained handle clone can
    /// fail with `TimedOut`.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl Connection for TcpConnection {
    fn ping(&self) -> Result<(), DriverError> {
        let stream = &self.stream;

        // Temporarily set a short read timeout for the peek.
        let original_timeout = stream.read_timeout()?;
        stream.set_read_timeout(Some(PING_TIMEOUT))?;

        let mut peek_buf = [0u8; 1];
        let result = match stream.peek(&mut peek_buf) {
            Ok(0) => Err(DriverError::Refused(format!(
                "connection to {} closed by peer",
                self.peer
            ))),
            Ok(_) => Ok(()),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(())
            }
            Err(e) => Err(DriverError::Io(e)),
        };

        let _ = stream.set_read_timeout(original_timeout);
        result
    }
}

/// Driver table with `postgres`, `mysql` and `redis` TCP drivers.
pub fn default_drivers() -> Drivers<TcpConnection> {
    Drivers::new()
        .with("postgres", TcpDriver::new(POSTGRES_PORT))
        .with("mysql", TcpDriver::new(MYSQL_PORT))
        .with("redis", TcpDriver::new(REDIS_PORT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind to random port");
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn default_drivers_registered() {
        let drivers = default_drivers();
        assert_eq!(drivers.names(), vec!["mysql", "postgres", "redis"]);
    }

    #[test]
    fn open_rejects_invalid_dsn() {
        let err = TcpDriver::new(POSTGRES_PORT).open("not a dsn").unwrap_err();
        assert!(matches!(err, DriverError::InvalidDsn(_)));
    }

    #[test]
    fn open_uses_dsn_port() {
        let (listener, port) = listener();
        let conn = TcpDriver::new(1)
            .open(&format!("postgres://app@127.0.0.1:{port}/main"))
            .unwrap();
        assert_eq!(conn.peer_addr().port(), port);
        drop(listener);
    }

    #[test]
    fn open_falls_back_to_default_port() {
        let (listener, port) = listener();
        let conn = TcpDriver::new(port).open("host=127.0.0.1").unwrap();
        assert_eq!(conn.peer_addr().port(), port);
        drop(listener);
    }

    #[test]
    fn open_refused_is_io_error() {
        // Bind then drop to get a port with nothing listening.
        let (listener, port) = listener();
        drop(listener);
        let err = TcpDriver::new(port)
            .with_connect_timeout(Duration::from_millis(200))
            .open("host=127.0.0.1")
            .unwrap_err();
        assert!(matches!(err, DriverError::Io(_)));
    }

    #[test]
    fn ping_quiet_connection_is_alive() {
        let (listener, port) = listener();
        let conn = TcpDriver::new(port).open("host=127.0.0.1").unwrap();
        let (_server_side, _) = listener.accept().unwrap();
        assert!(conn.ping().is_ok());
    }

    #[test]
    fn ping_does_not_consume_data() {
        let (listener, port) = listener();
        let conn = TcpDriver::new(port).open("host=127.0.0.1").unwrap();
        let (mut server_side, _) = listener.accept().unwrap();
        server_side.write_all(b"Z").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert!(conn.ping().is_ok());
        let mut buf = [0u8; 1];
        (&*conn.stream()).read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"Z");
    }

    #[test]
    fn ping_detects_closed_peer() {
        let (listener, port) = listener();
        let conn = TcpDriver::new(port).open("host=127.0.0.1").unwrap();
        let (server_side, _) = listener.accept().unwrap();
        drop(server_side);
        std::thread::sleep(Duration::from_millis(50));

        let err = conn.ping().unwrap_err();
        assert!(err.to_string().contains("closed by peer"), "got: {err}");
    }

    #[test]
    fn ping_leaves_blocking_stream_blocking() {
        let (listener, port) = listener();
        let conn = TcpDriver::new(port).open("host=127.0.0.1").unwrap();
        let (_server_side, _) = listener.accept().unwrap();
        assert_eq!(conn.stream().read_timeout().unwrap(), None);
        conn.ping().unwrap();
        assert_eq!(conn.stream().read_timeout().unwrap(), None);
    }

    #[test]
    fn ping_restores_read_timeout() {
        let (listener, port) = listener();
        let conn = TcpDriver::new(port).open("host=127.0.0.1").unwrap();
        let (_server_side, _) = listener.accept().unwrap();
        conn.stream()
            .set_read_timeout(Some(Duration::from_secs(3)))
            .unwrap();
        conn.ping().unwrap();
        assert_eq!(
            conn.stream().read_timeout().unwrap(),
            Some(Duration::from_secs(3))
        );
    }
}
