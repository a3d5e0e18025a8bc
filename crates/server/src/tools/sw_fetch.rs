//! sw_fetch tool implementation.
//!
//! Issues one request through the worker, the way a controlled page would.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::fetch::resolve;
use swcache_client::{Dispatch, Dispatcher, Method, Request, ResponseSource, Strategy};
use swcache_core::{Error, ResponseSnapshot};

use crate::worker::Worker;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Request URL, absolute or relative to the worker origin.
    pub url: String,

    /// HTTP method (default: GET). Anything but GET goes straight to the network.
    #[serde(default)]
    pub method: Option<String>,

    /// Optional Accept header.
    #[serde(default)]
    pub accept: Option<String>,
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize)]
pub struct SwFetchOutput {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    /// Strategy that answered; absent when the request was not intercepted.
    pub strategy: Option<Strategy>,
    pub source: Option<ResponseSource>,
    pub passed_through: bool,
}

impl SwFetchOutput {
    fn new(response: ResponseSnapshot, strategy: Option<Strategy>, source: Option<ResponseSource>) -> Self {
        let body = response.text();
        Self {
            url: response.url,
            status: response.status,
            headers: response.headers,
            body,
            strategy,
            source,
            passed_through: strategy.is_none(),
        }
    }
}

/// Implementation of the sw_fetch tool.
///
/// Until the worker has claimed its clients every request is passed through.
pub async fn fetch_impl(worker: &Worker, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let method = parse_method(params.method.as_deref())?;
    let url = resolve(&worker.origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;

    let mut request = Request::new(method, url);
    if let Some(accept) = params.accept {
        request = request.with_accept(accept);
    }

    let output = if worker.lifecycle.controls_clients() {
        match worker.dispatcher.dispatch(&request).await {
            Dispatch::Respond { strategy, handled } => {
                SwFetchOutput::new(handled.response, Some(strategy), Some(handled.source))
            }
            Dispatch::PassThrough => pass_through(&worker.dispatcher, &request).await?,
        }
    } else {
        tracing::debug!("worker does not control clients yet, passing through {}", request.url);
        pass_through(&worker.dispatcher, &request).await?
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize response: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

async fn pass_through(dispatcher: &Dispatcher, request: &Request) -> Result<SwFetchOutput, Error> {
    let response = dispatcher.strategies().fetch(request).await?;
    Ok(SwFetchOutput::new(response, None, None))
}

fn parse_method(method: Option<&str>) -> Result<Method, Error> {
    match method.map(str::trim) {
        None | Some("") => Ok(Method::GET),
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {m}"))),
    }
}
