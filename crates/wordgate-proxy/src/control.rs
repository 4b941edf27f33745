//! Control-channel IO.
//!
//! Exactly one operator connection is accepted before the proxy starts
//! serving clients. A reader task turns its lines into parsed commands and
//! hands them to the accept loop over a channel, so a slow or silent
//! operator can never stall client accepts. The accept loop applies each
//! command to the policy store it owns; no other task touches the store.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use wordgate_core::{ControlCommand, PolicyStore};

use crate::error::Result;

/// Greeting sent to the operator once the control connection is accepted.
const WELCOME: &str = "\nWelcome! Supported commands:\nBLOCK <word>\tAdd <word> to the denylist\nUNBLOCK\t\tClear the denylist\n\n>> ";

/// Prompt written back after each processed command.
const PROMPT: &str = ">> ";

/// Capacity of the command channel between the reader task and the accept
/// loop.
const COMMAND_BACKLOG: usize = 16;

/// The single long-lived operator connection.
pub struct ControlChannel {
    commands: mpsc::Receiver<ControlCommand>,
}

impl ControlChannel {
    /// Accepts one operator connection, sends the welcome banner, and
    /// spawns the reader task that feeds parsed commands to the accept
    /// loop.
    pub async fn accept(listener: &TcpListener) -> Result<Self> {
        let (stream, peer) = listener.accept().await?;
        tracing::info!("control connection accepted from {}", peer);

        let (read, mut write) = stream.into_split();
        write.write_all(WELCOME.as_bytes()).await?;

        let (tx, rx) = mpsc::channel(COMMAND_BACKLOG);
        tokio::spawn(read_commands(read, write, tx));

        Ok(Self { commands: rx })
    }

    /// Receives the next parsed command.
    ///
    /// Resolves to `None` once the operator disconnects; the proxy keeps
    /// serving clients with the denylist frozen at its last state.
    pub async fn recv(&mut self) -> Option<ControlCommand> {
        self.commands.recv().await
    }
}

/// Applies one command to the store, logging the outcome.
///
/// A `BLOCK` rejected by the store (capacity or word length) is a warning,
/// not a failure: the connection stays up and the store is unchanged.
pub fn apply_command(store: &mut PolicyStore, command: ControlCommand) {
    match command {
        ControlCommand::Block(word) => match store.add(&word) {
            Ok(()) => tracing::info!(
                "denylisted {:?} ({}/{} words used)",
                word,
                store.len(),
                store.capacity()
            ),
            Err(e) => tracing::warn!("rejected BLOCK {:?}: {}", word, e),
        },
        ControlCommand::Unblock => {
            store.clear();
            tracing::info!("denylist cleared");
        }
    }
}

async fn read_commands(
    read: OwnedReadHalf,
    mut write: OwnedWriteHalf,
    commands: mpsc::Sender<ControlCommand>,
) {
    let mut lines = BufReader::new(read).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(command) = ControlCommand::parse(&line) else {
                    tracing::debug!("ignoring control input {:?}", line);
                    continue;
                };
                if commands.send(command).await.is_err() {
                    break;
                }
                if let Err(e) = write.write_all(PROMPT.as_bytes()).await {
                    tracing::warn!("failed to write control prompt: {}", e);
                    break;
                }
            }
            Ok(None) => {
                tracing::info!("control connection closed");
                break;
            }
            Err(e) => {
                tracing::warn!("control read failed: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;
    use tokio_test::assert_ok;

    use wordgate_core::PolicyError;

    #[test]
    fn apply_block_adds_word() {
        let mut store = PolicyStore::new();
        apply_command(&mut store, ControlCommand::Block("badword".to_string()));
        assert!(store.matches("a badword here"));
    }

    #[test]
    fn apply_unblock_clears_store() {
        let mut store = PolicyStore::new();
        store.add("badword").unwrap();
        apply_command(&mut store, ControlCommand::Unblock);
        assert!(store.is_empty());
    }

    #[test]
    fn apply_block_at_capacity_leaves_store_unchanged() {
        let mut store = PolicyStore::with_limits(1, 50);
        store.add("first").unwrap();
        apply_command(&mut store, ControlCommand::Block("second".to_string()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.add("third"), Err(PolicyError::Full(1)));
    }

    #[tokio::test]
    async fn accept_sends_banner_and_parses_commands() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (mut operator, channel) = tokio::join!(
            async { TcpStream::connect(addr).await.unwrap() },
            ControlChannel::accept(&listener),
        );
        let mut channel = assert_ok!(channel);

        let mut banner = vec![0u8; WELCOME.len()];
        operator.read_exact(&mut banner).await.unwrap();
        assert_eq!(banner, WELCOME.as_bytes());

        operator.write_all(b"BLOCK badword\r\n").await.unwrap();
        assert_eq!(
            channel.recv().await,
            Some(ControlCommand::Block("badword".to_string()))
        );

        // The prompt acknowledges the processed command.
        let mut prompt = vec![0u8; PROMPT.len()];
        operator.read_exact(&mut prompt).await.unwrap();
        assert_eq!(prompt, PROMPT.as_bytes());

        operator.write_all(b"UNBLOCK\r\n").await.unwrap();
        assert_eq!(channel.recv().await, Some(ControlCommand::Unblock));
    }

    #[tokio::test]
    async fn unknown_lines_produce_no_commands() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (mut operator, channel) = tokio::join!(
            async { TcpStream::connect(addr).await.unwrap() },
            ControlChannel::accept(&listener),
        );
        let mut channel = assert_ok!(channel);

        operator.write_all(b"HELP\r\nUNBLOCK\r\n").await.unwrap();
        // The unknown line is skipped; the next command received is the
        // UNBLOCK that followed it.
        assert_eq!(channel.recv().await, Some(ControlCommand::Unblock));
    }

    #[tokio::test]
    async fn operator_disconnect_ends_the_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (operator, channel) = tokio::join!(
            async { TcpStream::connect(addr).await.unwrap() },
            ControlChannel::accept(&listener),
        );
        let mut channel = assert_ok!(channel);

        drop(operator);
        assert_eq!(channel.recv().await, None);
    }
}
