use std::{io, net::SocketAddr, time::Duration};
use thiserror::Error;

/// Host and port could not be turned into a network address.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("failed to resolve TCP address \"{addr}\"")]
    Lookup {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("TCP address \"{addr}\" resolved to no addresses")]
    NoAddresses { addr: String },
}

/// Errors that prevent a [`RelaySession`](crate::relay_session::RelaySession) from being created.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("timed out after {timeout:?} while connecting to {addr}")]
    DialTimeout { addr: SocketAddr, timeout: Duration },

    #[error("failed to connect to {addr}")]
    Connection {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Terminal outcomes of [`RelaySession::run`](crate::relay_session::RelaySession::run) other than success.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("failed to write to TCP socket")]
    Write(#[source] io::Error),

    #[error("failed to read input data")]
    InputRead(#[source] io::Error),

    #[error("failed to read from TCP socket")]
    RemoteRead(#[source] io::Error),

    #[error("failed to write output data")]
    Output(#[source] io::Error),

    /// Input was exhausted and the connection went idle before anything was read.
    #[error("nothing read before the connection went idle")]
    NoResponse,

    #[error("session is already closed")]
    Closed,
}
