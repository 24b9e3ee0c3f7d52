use crate::{
    error::{ConnectError, RelayError},
    resolver,
    session_config::SessionConfig,
};
use std::{io, net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

const BUFFER_SIZE: usize = 4096;
const CHANNEL_CAPACITY: usize = 16;

enum InputEvent {
    Chunk(Vec<u8>),
    Exhausted,
    Fault(io::Error),
}

enum RemoteEvent {
    Chunk(Vec<u8>),
    Fault(io::Error),
}

/// A live TCP connection relaying bytes between local streams and the remote peer.
///
/// The remote reader worker starts as soon as the connection is established and
/// lives until the peer ends the stream, the session is closed or dropped.
pub struct RelaySession {
    destination: SocketAddr,
    dial_timeout: Duration,
    response_timeout: Duration,
    writer: Option<OwnedWriteHalf>,
    inbound: mpsc::Receiver<RemoteEvent>,
    remote_finished: bool,
    remote_reader: JoinHandle<()>,
}

impl RelaySession {
    pub async fn connect(config: &SessionConfig) -> Result<Self, ConnectError> {
        let destination = resolver::resolve(&config.host, config.port).await?;

        let conn = time::timeout(config.dial_timeout, TcpStream::connect(destination))
            .await
            .map_err(|_| ConnectError::DialTimeout {
                addr: destination,
                timeout: config.dial_timeout,
            })?
            .map_err(|source| ConnectError::Connection {
                addr: destination,
                source,
            })?;
        conn.set_nodelay(true)
            .map_err(|source| ConnectError::Connection {
                addr: destination,
                source,
            })?;

        log::info!("connected to {}", destination);

        let (reader, writer) = conn.into_split();
        let (inbound_tx, inbound) = mpsc::channel(CHANNEL_CAPACITY);
        let remote_reader = tokio::spawn(read_remote(reader, inbound_tx));

        Ok(Self {
            destination,
            dial_timeout: config.dial_timeout,
            response_timeout: config.response_timeout,
            writer: Some(writer),
            inbound,
            remote_finished: false,
            remote_reader,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Writes everything read from `input` to the connection and everything received
    /// from the connection to `output`.
    ///
    /// Once `input` is exhausted the session waits for responses until the connection
    /// stays quiet for the response timeout. Each received chunk restarts the wait.
    /// Returns [`RelayError::NoResponse`] if nothing was received during the call.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<(), RelayError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let Self {
            destination,
            response_timeout,
            writer,
            inbound,
            remote_finished,
            ..
        } = self;
        let writer = writer.as_mut().ok_or(RelayError::Closed)?;
        let response_timeout = *response_timeout;

        let (outbound_tx, mut outbound) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(read_input(input, outbound_tx));

        let mut input_closed = false;
        let mut received = false;
        let idle = time::sleep(response_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                event = outbound.recv(), if !input_closed => match event {
                    Some(InputEvent::Chunk(chunk)) => {
                        writer.write_all(&chunk).await.map_err(RelayError::Write)?;
                        log::debug!("sent {} bytes to {}", chunk.len(), destination);
                    }
                    Some(InputEvent::Exhausted) | None => {
                        log::debug!("input exhausted, waiting for responses");
                        input_closed = true;
                        idle.as_mut().reset(Instant::now() + response_timeout);
                    }
                    Some(InputEvent::Fault(e)) => return Err(RelayError::InputRead(e)),
                },
                event = inbound.recv(), if !*remote_finished => match event {
                    Some(RemoteEvent::Chunk(chunk)) => {
                        output.write_all(&chunk).await.map_err(RelayError::Output)?;
                        output.flush().await.map_err(RelayError::Output)?;
                        received = true;
                        if input_closed {
                            idle.as_mut().reset(Instant::now() + response_timeout);
                        }
                    }
                    Some(RemoteEvent::Fault(e)) => return Err(RelayError::RemoteRead(e)),
                    None => {
                        log::debug!("{} closed the connection", destination);
                        *remote_finished = true;
                    }
                },
                () = &mut idle, if input_closed => {
                    log::debug!("connection to {} went idle", destination);
                    return if received {
                        Ok(())
                    } else {
                        Err(RelayError::NoResponse)
                    };
                },
            }
        }
    }

    /// Closes the connection. Calling it again after a successful close is a no-op.
    pub async fn close(&mut self) -> io::Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        self.remote_reader.abort();
        log::info!("closing connection to {}", self.destination);

        writer.shutdown().await
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        self.remote_reader.abort();
    }
}

async fn read_input<R>(mut input: R, outbound: mpsc::Sender<InputEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let event = match input.read(&mut buffer).await {
            Ok(0) => InputEvent::Exhausted,
            Ok(n) => InputEvent::Chunk(buffer[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => InputEvent::Fault(e),
        };
        let last = !matches!(event, InputEvent::Chunk(_));

        // The relay loop dropped the receiver, nobody is interested anymore.
        if outbound.send(event).await.is_err() || last {
            break;
        }
    }
}

async fn read_remote(mut reader: OwnedReadHalf, inbound: mpsc::Sender<RemoteEvent>) {
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let event = match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => RemoteEvent::Chunk(buffer[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => RemoteEvent::Fault(e),
        };
        let fault = matches!(event, RemoteEvent::Fault(_));

        if inbound.send(event).await.is_err() || fault {
            break;
        }
    }
}
