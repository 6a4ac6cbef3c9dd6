//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! Every request line is dispatched on its own task. Responses funnel through
//! one writer task, so lines never interleave, but they may be written in a
//! different order than the requests arrived.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::Error;
use crate::protocol::McpServer;

/// Serves `server` on the process's stdin/stdout until EOF or `shutdown`.
///
/// # Errors
///
/// Fails if reading stdin or writing stdout fails.
pub async fn serve(server: McpServer, shutdown: CancellationToken) -> Result<(), Error> {
    tracing::info!("serving MCP over stdio");
    let reader = BufReader::new(tokio::io::stdin());
    serve_lines(server, reader, tokio::io::stdout(), shutdown).await?;
    tracing::info!("stdio transport stopped");
    Ok(())
}

/// Serves `server` over arbitrary line streams and returns the writer once
/// every in-flight request has been answered.
///
/// # Errors
///
/// Fails if reading or writing fails.
pub async fn serve_lines<R, W>(
    server: McpServer,
    reader: R,
    writer: W,
    shutdown: CancellationToken,
) -> Result<W, Error>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_responses(writer, rx));
    let tracker = TaskTracker::new();

    let mut lines = reader.lines();
    let read_result = loop {
        let line = tokio::select! {
            () = shutdown.cancelled() => break Ok(()),
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(Error::server_with("failed to read request", e)),
        };
        if line.trim().is_empty() {
            continue;
        }
        let server = server.clone();
        let tx = tx.clone();
        tracker.spawn(async move {
            let Some(response) = server.handle_message(&line).await else {
                return;
            };
            match serde_json::to_string(&response) {
                Ok(encoded) => {
                    if tx.send(encoded).is_err() {
                        tracing::warn!("response dropped, writer has stopped");
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to encode response"),
            }
        });
    };

    tracker.close();
    tracker.wait().await;
    drop(tx);
    let writer = writer
        .await
        .map_err(|e| Error::server_with("writer task failed", e))?
        .map_err(|e| Error::server_with("failed to write response", e))?;
    read_result.map(|()| writer)
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> std::io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::protocol::testing::mock_server;

    async fn run(input: &str) -> Vec<Value> {
        let (server, _) = mock_server();
        let output = serve_lines(
            server,
            BufReader::new(input.as_bytes()),
            Vec::new(),
            CancellationToken::new(),
        )
        .await
        .expect("serve");
        let mut responses: Vec<Value> = String::from_utf8(output)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        responses.sort_by_key(|r| r["id"].as_i64());
        responses
    }

    #[tokio::test]
    async fn answers_each_request_on_its_own_line() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let responses = run(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"], serde_json::json!({}));
        assert_eq!(responses[1]["id"], 2);
        assert!(responses[1]["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn malformed_lines_do_not_stop_the_loop() {
        let input = concat!("garbage\n", r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#, "\n");
        let responses = run(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[1]["id"], 7);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_reading() {
        let (server, _) = mock_server();
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let (reader, _keep_open) = tokio::io::duplex(64);
        let output = serve_lines(server, BufReader::new(reader), Vec::new(), shutdown)
            .await
            .expect("serve");
        assert!(output.is_empty());
    }
}
