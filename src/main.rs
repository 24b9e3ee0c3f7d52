use anyhow::Context;
use clap::Parser;
use std::{
    fs::File,
    future::{self, Future},
    path::PathBuf,
    process::ExitCode,
    time::Duration,
};
use tcp_relay_client::{
    relay_session::RelaySession,
    session_config::{DirtySessionConfig, SessionConfig},
};
use tokio::{
    io::{self, AsyncRead, AsyncWrite},
    runtime::Builder,
    signal,
};

/// A minimal interactive TCP client.
///
/// Sends everything read from stdin to the remote host and prints its responses to stdout.
/// After stdin is closed, the client keeps printing responses until the connection stays
/// quiet for the response timeout. To stop the client early, press ctrl-c.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Remote host name or IP address.
    host: Option<String>,

    /// Remote TCP port.
    port: Option<u16>,

    /// How long to wait for responses after stdin is closed, e.g. "500ms" or "2s".
    #[arg(short, long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// How long to wait for the connection to be established.
    #[arg(short, long, value_parser = humantime::parse_duration)]
    dial_timeout: Option<Duration>,

    /// Path to the config file in JSON format.
    ///
    /// Config is a JSON object with optional keys "host", "port", "dial_timeout" and
    /// "response_timeout". Values given on the command line take precedence.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn load_config(args: Args) -> anyhow::Result<SessionConfig> {
    let from_file = match &args.config {
        Some(path) => {
            let config_file = File::open(path)
                .with_context(|| format!("failed to open config file: {}", path.display()))?;
            serde_json::from_reader(config_file).with_context(|| {
                format!("failed to deserialize config file: {}", path.display())
            })?
        }
        None => DirtySessionConfig::default(),
    };

    let from_args = DirtySessionConfig {
        host: args.host,
        port: args.port,
        dial_timeout: args.dial_timeout,
        response_timeout: args.timeout,
    };

    SessionConfig::try_from(from_args.or(from_file)).context("invalid session config")
}

/// Runs the session until it ends on its own or `interrupt` fires.
///
/// If waiting for the interrupt fails, the session keeps running without it.
async fn run_until_interrupted<R, W, S>(
    session: &mut RelaySession,
    input: R,
    output: &mut W,
    interrupt: S,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + ?Sized,
    S: Future<Output = std::io::Result<()>>,
{
    let interrupt = async {
        match interrupt.await {
            Ok(()) => log::info!("ctrl-c received"),
            Err(e) => {
                log::error!("failed to wait for ctrl-c: {}", e);
                future::pending::<()>().await;
            }
        }
    };

    let destination = session.destination();
    tokio::select! {
        biased;
        () = interrupt => Err(anyhow::anyhow!("interrupted by ctrl-c")),
        result = session.run(input, output) => {
            result.with_context(|| format!("session with {} failed", destination))
        },
    }
}

async fn relay(config: SessionConfig) -> anyhow::Result<()> {
    let mut session = RelaySession::connect(&config)
        .await
        .with_context(|| format!("failed to connect to {}:{}", config.host, config.port))?;

    let mut stdout = io::stdout();
    let result =
        run_until_interrupted(&mut session, io::stdin(), &mut stdout, signal::ctrl_c()).await;

    if let Err(e) = session.close().await {
        log::warn!("failed to close connection to {}: {}", session.destination(), e);
    }

    result
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args)?;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;

    let result = runtime.block_on(relay(config));

    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_background();

    result
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}
