//! JSON-lines server for the orchestrator
//!
//! One request per line on stdin, one response per line on stdout, in order.
//! A reader thread parses requests and hands them to the worker over a
//! channel; it handles `stop` itself by cancelling the shared token, so the
//! operation in flight aborts at its next remote call. `stop` ends the
//! session: the server answers it and returns without reading further.
//!
//! ```text
//! {"id":1,"method":"configure","config":{"url":"https://cti","token":"..."}}
//! {"id":2,"method":"resource","request":{"op":"create","type_name":"opencti_role","planned":{...}}}
//! {"id":3,"method":"stop"}
//! ```

use crate::config::ProviderConfig;
use crate::provider::Provider;
use declarative::{ApplyContext, CancelToken, Diagnostic, Diagnostics, LifecycleRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to read request: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write response: {0}")]
    Write(#[source] io::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to start request reader: {0}")]
    Spawn(#[source] io::Error),

    #[error("request reader panicked")]
    ReaderPanicked,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
enum Call {
    Metadata,
    Schema,
    Configure {
        #[serde(default)]
        config: ProviderConfig,
    },
    Resource {
        request: LifecycleRequest,
        /// Deadline of this one operation
        #[serde(default)]
        timeout_seconds: Option<u64>,
    },
    Stop,
}

impl Call {
    fn method(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Schema => "schema",
            Self::Configure { .. } => "configure",
            Self::Resource { .. } => "resource",
            Self::Stop => "stop",
        }
    }
}

/// A parsed request line
struct Incoming {
    id: Value,
    call: Result<Call, String>,
}

impl Incoming {
    fn parse(line: &str) -> Self {
        let mut value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                return Self {
                    id: Value::Null,
                    call: Err(format!("Request is not valid JSON: {err}")),
                };
            }
        };
        let id = value
            .as_object_mut()
            .and_then(|fields| fields.remove("id"))
            .unwrap_or(Value::Null);
        let call = serde_json::from_value(value).map_err(|err| format!("Invalid request: {err}"));
        Self { id, call }
    }
}

#[derive(Debug, Serialize)]
struct Response {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Diagnostics::is_empty")]
    diagnostics: Diagnostics,
}

impl Response {
    fn new(id: Value, result: Option<Value>, diagnostics: Diagnostics) -> Self {
        Self {
            id,
            result,
            diagnostics,
        }
    }
}

pub struct Server {
    provider: Provider,
    cancel: CancelToken,
}

impl Server {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            cancel: CancelToken::new(),
        }
    }

    /// Serve until the input closes or `stop` is answered
    pub fn serve<R, W>(&mut self, input: R, mut output: W) -> Result<(), ServeError>
    where
        R: BufRead + Send + 'static,
        W: Write,
    {
        let (tx, rx) = mpsc::channel();
        let cancel = self.cancel.clone();
        let reader = thread::Builder::new()
            .name("request-reader".to_string())
            .spawn(move || read_requests(input, &tx, &cancel))
            .map_err(ServeError::Spawn)?;

        for incoming in rx {
            let stop = matches!(incoming.call, Ok(Call::Stop));
            let response = self.handle(incoming)?;
            serde_json::to_writer(&mut output, &response)?;
            output.write_all(b"\n").map_err(ServeError::Write)?;
            output.flush().map_err(ServeError::Write)?;
            if stop {
                // The reader may be blocked on input; it exits at its next send
                log::info!("Session stopped");
                return Ok(());
            }
        }

        reader
            .join()
            .map_err(|_| ServeError::ReaderPanicked)?
            .map_err(ServeError::Read)
    }

    fn handle(&mut self, incoming: Incoming) -> Result<Response, ServeError> {
        let Incoming { id, call } = incoming;
        let call = match call {
            Ok(call) => call,
            Err(message) => {
                log::warn!("Rejected request {id}: {message}");
                let diagnostic = Diagnostic::error("Invalid request", message);
                return Ok(Response::new(id, None, diagnostic.into()));
            }
        };
        log::debug!("Request {id}: {}", call.method());

        let response = match call {
            Call::Metadata => {
                Response::new(id, Some(serde_json::to_value(self.provider.metadata())?), Diagnostics::new())
            }
            Call::Schema => {
                Response::new(id, Some(serde_json::to_value(self.provider.schema())?), Diagnostics::new())
            }
            Call::Configure { config } => {
                let ctx = ApplyContext::new().with_cancel(self.cancel.clone());
                let diagnostics = self.provider.configure(&ctx, config);
                Response::new(id, None, diagnostics)
            }
            Call::Resource {
                request,
                timeout_seconds,
            } => {
                let mut ctx = ApplyContext::new().with_cancel(self.cancel.clone());
                if let Some(seconds) = timeout_seconds {
                    ctx = ctx.with_timeout(Duration::from_secs(seconds));
                }
                let response = self.provider.execute(&ctx, request);
                Response::new(id, Some(json!({ "state": response.state })), response.diagnostics)
            }
            Call::Stop => Response::new(id, Some(json!({ "stopped": true })), Diagnostics::new()),
        };
        Ok(response)
    }
}

/// Forward request lines to the worker; `stop` cancels before it is queued
fn read_requests<R: BufRead>(
    input: R,
    tx: &mpsc::Sender<Incoming>,
    cancel: &CancelToken,
) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let incoming = Incoming::parse(&line);
        if matches!(incoming.call, Ok(Call::Stop)) {
            log::info!("Stop requested, cancelling operations in flight");
            cancel.cancel();
        }
        if tx.send(incoming).is_err() {
            break;
        }
    }
    log::debug!("Input closed");
    Ok(())
}
