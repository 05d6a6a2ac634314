//! HTTP transport to the MCP server with credentials injected per request

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::context::CallContext;
use crate::injector::CredentialInjector;
use crate::mcp_types::{InitializeResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION};
use crate::Error;

/// JSON-RPC client for a remote MCP server
pub struct McpClient {
    http: ClientWithMiddleware,
    url: String,
    request_id: AtomicU64,
}

impl McpClient {
    /// Build a client whose requests all pass through `injector`.
    pub fn new(url: impl Into<String>, http: reqwest::Client, injector: CredentialInjector) -> Self {
        Self {
            http: injector.install(http),
            url: url.into(),
            request_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one JSON-RPC request in the given call context
    pub async fn send_request(
        &self,
        context: &CallContext,
        method: &str,
        params: Value,
    ) -> Result<Value, Error> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        debug!("Sending {} (id {}) to {}", method, id, self.url);

        let response = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .with_extension(context.clone())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::NetworkError(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let json_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| Error::NetworkError(format!("Invalid JSON response: {}", e)))?;

        if let Some(error) = json_response.error {
            return Err(Error::BackendError(format!(
                "Remote error: {} ({})",
                error.message, error.code
            )));
        }

        json_response
            .result
            .ok_or_else(|| Error::BackendError(format!("No result in {} response", method)))
    }

    pub async fn initialize(&self, context: &CallContext, client_info: Value) -> Result<InitializeResult, Error> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": client_info
        });

        let result = self.send_request(context, "initialize", params).await?;
        serde_json::from_value(result)
            .map_err(|e| Error::BackendError(format!("Invalid initialize result: {}", e)))
    }

    pub async fn list_tools(&self, context: &CallContext) -> Result<ListToolsResult, Error> {
        let result = self
            .send_request(context, "tools/list", serde_json::json!({}))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| Error::BackendError(format!("Invalid tools/list result: {}", e)))
    }

    pub async fn call_tool(&self, context: &CallContext, name: &str, args: Value) -> Result<Value, Error> {
        let params = serde_json::json!({
            "name": name,
            "arguments": args
        });
        self.send_request(context, "tools/call", params).await
    }

    pub async fn ping(&self, context: &CallContext) -> Result<bool, Error> {
        match self.send_request(context, "ping", serde_json::json!({})).await {
            Ok(_) => Ok(true),
            Err(Error::Auth(e)) => Err(Error::Auth(e)),
            Err(_) => Ok(false),
        }
    }
}
