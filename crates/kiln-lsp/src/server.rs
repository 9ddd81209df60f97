//! Request dispatch: `initialize`/`shutdown` bookkeeping, document sync
//! notifications, and the three requests this front end actually answers
//! (`textDocument/hover`, `textDocument/completion`, plus diagnostics
//! published after every open/change).

use kiln_diagnostics::{Level, ReplayOptions};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::completion::{self, CompletionKind};
use crate::document::{self, Documents};
use crate::hover;
use crate::protocol::{Incoming, Notification, Response, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
use crate::transport::{read_message, write_message, TransportError};

pub struct Server {
    documents: Documents,
    shutting_down: bool,
}

impl Server {
    #[must_use]
    pub fn new() -> Self {
        Self { documents: Documents::new(), shutting_down: false }
    }

    /// Drains `reader` one framed message at a time until the stream
    /// closes or `exit` is received, writing responses/notifications to
    /// `writer` as it goes.
    pub async fn run<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<(), TransportError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let Some(message) = read_message(reader).await? else { break };
            if message.method == "exit" {
                break;
            }
            if let Some(response) = self.handle(message, writer).await? {
                write_message(writer, &response).await?;
            }
        }
        Ok(())
    }

    async fn handle<W: AsyncWrite + Unpin>(&mut self, message: Incoming, writer: &mut W) -> Result<Option<Response>, TransportError> {
        let Incoming { id, method, params, .. } = message;

        match method.as_str() {
            "initialize" => Ok(id.map(|id| {
                Response::ok(
                    id,
                    json!({
                        "capabilities": {
                            "textDocumentSync": 1,
                            "hoverProvider": true,
                            "completionProvider": {},
                        },
                    }),
                )
            })),
            "shutdown" => {
                self.shutting_down = true;
                Ok(id.map(|id| Response::ok(id, Value::Null)))
            }
            "textDocument/didOpen" => {
                self.did_open(params, writer).await?;
                Ok(None)
            }
            "textDocument/didChange" => {
                self.did_change(params, writer).await?;
                Ok(None)
            }
            "textDocument/didClose" => {
                if let Some(uri) = params.pointer("/textDocument/uri").and_then(Value::as_str) {
                    self.documents.close(uri);
                }
                Ok(None)
            }
            "textDocument/hover" => Ok(id.map(|id| self.hover(id, &params))),
            "textDocument/completion" => Ok(id.map(|id| self.completion(id, &params))),
            _ if id.is_some() => {
                if self.shutting_down {
                    Ok(id.map(|id| Response::err(id, INTERNAL_ERROR, "server is shutting down")))
                } else {
                    Ok(id.map(|id| Response::err(id, METHOD_NOT_FOUND, format!("unhandled method {method}"))))
                }
            }
            _ => Ok(None),
        }
    }

    async fn did_open<W: AsyncWrite + Unpin>(&mut self, params: Value, writer: &mut W) -> Result<(), TransportError> {
        let Some(uri) = params.pointer("/textDocument/uri").and_then(Value::as_str) else { return Ok(()) };
        let Some(text) = params.pointer("/textDocument/text").and_then(Value::as_str) else { return Ok(()) };
        self.documents.open(uri.to_string(), text.to_string());
        self.publish_diagnostics(uri, writer).await
    }

    async fn did_change<W: AsyncWrite + Unpin>(&mut self, params: Value, writer: &mut W) -> Result<(), TransportError> {
        let Some(uri) = params.pointer("/textDocument/uri").and_then(Value::as_str) else { return Ok(()) };
        let Some(text) = params.pointer("/contentChanges/0/text").and_then(Value::as_str) else { return Ok(()) };
        self.documents.update(uri, text.to_string());
        self.publish_diagnostics(uri, writer).await
    }

    async fn publish_diagnostics<W: AsyncWrite + Unpin>(&self, uri: &str, writer: &mut W) -> Result<(), TransportError> {
        let Some(text) = self.documents.text(uri) else { return Ok(()) };
        let Ok(run) = kiln_analyzer::analyze_source(uri, text) else { return Ok(()) };

        let diagnostics: Vec<Value> = run
            .vm
            .diagnostics
            .replay(ReplayOptions::default())
            .into_iter()
            .map(|d| {
                let (line, column) = run.sources.line_col(d.source, d.offset);
                json!({
                    "range": {
                        "start": {"line": line.saturating_sub(1), "character": column.saturating_sub(1)},
                        "end": {"line": line.saturating_sub(1), "character": column.saturating_sub(1)},
                    },
                    "severity": if d.level == Level::Error { 1 } else { 2 },
                    "message": d.message,
                })
            })
            .collect();

        let notification = Notification::new("textDocument/publishDiagnostics", json!({"uri": uri, "diagnostics": diagnostics}));
        write_message(writer, &notification).await
    }

    fn hover(&self, id: Value, params: &Value) -> Response {
        let Some((uri, text, offset)) = self.position_args(params) else {
            return Response::err(id, INVALID_PARAMS, "missing textDocument/position");
        };
        match hover::hover(uri, text, offset) {
            Some(contents) => Response::ok(id, json!({"contents": {"kind": "plaintext", "value": contents}})),
            None => Response::ok(id, Value::Null),
        }
    }

    fn completion(&self, id: Value, params: &Value) -> Response {
        let Some((uri, text, offset)) = self.position_args(params) else {
            return Response::err(id, INVALID_PARAMS, "missing textDocument/position");
        };
        let items: Vec<Value> = completion::completions(uri, text, offset)
            .into_iter()
            .map(|item| {
                let kind = match item.kind {
                    CompletionKind::Variable => 6, // LSP CompletionItemKind::Variable
                    CompletionKind::Function => 3, // LSP CompletionItemKind::Function
                };
                json!({"label": item.label, "kind": kind})
            })
            .collect();
        Response::ok(id, json!(items))
    }

    fn position_args<'a>(&'a self, params: &'a Value) -> Option<(&'a str, &'a str, usize)> {
        let uri = params.pointer("/textDocument/uri")?.as_str()?;
        let text = self.documents.text(uri)?;
        let line = params.pointer("/position/line")?.as_u64()? as u32;
        let character = params.pointer("/position/character")?.as_u64()? as u32;
        Some((uri, text, document::offset_of(text, line, character)))
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}
