//! Entry point: wires the server loop to stdin/stdout, the same transport
//! every LSP client expects a language server to speak on.

mod completion;
mod document;
mod hover;
mod protocol;
mod server;
mod transport;

use tokio::io::{AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut stdout = tokio::io::stdout();

    let mut server = server::Server::new();
    if let Err(err) = server.run(&mut reader, &mut stdout).await {
        tracing::error!(%err, "kiln-lsp exiting on transport error");
    }
    let _ = stdout.flush().await;
}
