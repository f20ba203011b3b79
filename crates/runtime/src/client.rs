//! A thin client for the daemon's Unix domain socket protocol (§9), used by
//! the CLI to drive on-demand engine runs and fetch status without linking
//! against the engine crates directly.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::commands::{ClientCommand, ServerEvent};

pub struct DaemonClient {
    socket_path: String,
}

impl DaemonClient {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self { socket_path: socket_path.into() }
    }

    /// Send one command and read back its single response line. Not valid
    /// for `Subscribe`, which streams indefinitely — use [`Self::subscribe`].
    pub async fn send(&self, command: ClientCommand) -> Result<ServerEvent> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .with_context(|| format!("connecting to daemon socket {}", self.socket_path))?;
        let (read_half, mut write_half) = stream.into_split();

        let mut line = serde_json::to_string(&command)?;
        line.push('\n');
        write_half.write_all(line.as_bytes()).await?;

        let mut reader = BufReader::new(read_half);
        let mut response = String::new();
        reader.read_line(&mut response).await?;
        if response.is_empty() {
            bail!("daemon closed the connection without responding");
        }

        Ok(serde_json::from_str(response.trim())?)
    }

    /// Open a `Subscribe` connection and return the reader half so the
    /// caller can stream progress events for as long as it likes.
    pub async fn subscribe(&self) -> Result<BufReader<tokio::net::unix::OwnedReadHalf>> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .with_context(|| format!("connecting to daemon socket {}", self.socket_path))?;
        let (read_half, mut write_half) = stream.into_split();

        let mut line = serde_json::to_string(&ClientCommand::Subscribe)?;
        line.push('\n');
        write_half.write_all(line.as_bytes()).await?;

        Ok(BufReader::new(read_half))
    }

    pub fn is_live(&self) -> bool {
        std::os::unix::net::UnixStream::connect(&self.socket_path).is_ok()
    }
}
