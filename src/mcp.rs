//! MCP (Model Context Protocol) server implementation.
//!
//! Exposes image generation and image editing as tools that AI agents can call.

use crate::image::{AspectRatio, GeneratedImage, GenerationConfig, ImageData, ImageFormat, ImageService};
use crate::studio::{download_all, edit_failure_message, generation_failure_message};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Decodes a base64 string that may be imperfectly formatted.
///
/// Accepts a data URL prefix, missing padding and embedded whitespace.
fn decode_base64_lenient(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;

    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };

    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned)
}

/// Rejects paths containing `..` components.
fn validate_output_dir(path: &str) -> Result<(), String> {
    let path = Path::new(path);
    for component in path.components() {
        if matches!(component, std::path::Component::ParentDir) {
            return Err("Path must not contain '..' components".into());
        }
    }
    Ok(())
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    fn text(id: Value, payload: &Value) -> Self {
        let content = json!([{
            "type": "text",
            "text": serde_json::to_string_pretty(payload).unwrap_or_default()
        }]);
        Self::success(id, json!({ "content": content }))
    }
}

/// MCP tool definition.
#[derive(Debug, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateImagesParams {
    prompt: String,
    #[serde(default)]
    number_of_images: Option<u8>,
    #[serde(default)]
    aspect_ratio: Option<String>,
    #[serde(default)]
    output_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditImageParams {
    prompt: String,
    /// Base64 images or data URLs; each is edited separately.
    images: Vec<String>,
    #[serde(default)]
    output_dir: Option<String>,
}

/// MCP server over a shared image service.
pub struct McpServer {
    service: Arc<dyn ImageService>,
    initialized: bool,
}

impl McpServer {
    pub fn new(service: Arc<dyn ImageService>) -> Self {
        Self {
            service,
            initialized: false,
        }
    }

    /// Run the MCP server, reading from stdin and writing to stdout.
    pub async fn run(&mut self) -> std::io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(resp) = self.handle_message(&line).await {
                let json = serde_json::to_string(&resp).unwrap_or_else(|e| {
                    json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32603, "message": e.to_string()}}).to_string()
                });
                stdout.write_all(json.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }

    async fn handle_message(&mut self, message: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    -32700,
                    format!("Parse error: {}", e),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                -32600,
                "Invalid JSON-RPC version",
            ));
        }

        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(id, &request.params)),
            // Notification, no response
            "initialized" | "notifications/initialized" => None,
            "tools/list" | "tools/call" if !self.initialized => Some(JsonRpcResponse::error(
                id,
                -32002,
                "Server not initialized",
            )),
            "tools/list" => Some(self.handle_tools_list(id)),
            "tools/call" => Some(self.handle_tools_call(id, &request.params).await),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            _ => Some(JsonRpcResponse::error(
                id,
                -32601,
                format!("Method not found: {}", request.method),
            )),
        }
    }

    fn handle_initialize(&mut self, id: Value, params: &Value) -> JsonRpcResponse {
        self.initialized = true;

        if let Some(client_info) = params.get("clientInfo") {
            tracing::info!(
                client = client_info
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown"),
                version = client_info
                    .get("version")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown"),
                "MCP client connected"
            );
        }

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "genstudio",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let tools = vec![
            Tool {
                name: "generate_images",
                description: "Generate one to four images from a text prompt.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "prompt": {
                            "type": "string",
                            "description": "Text description of the image to generate"
                        },
                        "number_of_images": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": 4,
                            "description": "Number of images to generate (default 1)"
                        },
                        "aspect_ratio": {
                            "type": "string",
                            "enum": ["1:1", "16:9", "9:16", "4:3", "3:4"],
                            "description": "Aspect ratio (default 1:1)"
                        },
                        "output_dir": {
                            "type": "string",
                            "description": "Directory to save images into (optional, returns data URLs if not provided)"
                        }
                    },
                    "required": ["prompt"]
                }),
            },
            Tool {
                name: "edit_image",
                description: "Edit one or more images according to a text prompt. Each image is edited separately; all results are returned together.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "prompt": {
                            "type": "string",
                            "description": "Instruction describing the edit"
                        },
                        "images": {
                            "type": "array",
                            "items": { "type": "string" },
                            "minItems": 1,
                            "description": "Base64-encoded PNG, JPEG or WEBP images. Raw base64 or data URLs."
                        },
                        "output_dir": {
                            "type": "string",
                            "description": "Directory to save images into (optional, returns data URLs if not provided)"
                        }
                    },
                    "required": ["prompt", "images"]
                }),
            },
        ];

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        match tool_name {
            "generate_images" => self.generate_images(id, arguments).await,
            "edit_image" => self.edit_image(id, arguments).await,
            _ => JsonRpcResponse::error(id, -32602, format!("Unknown tool: {}", tool_name)),
        }
    }

    async fn generate_images(&self, id: Value, arguments: Value) -> JsonRpcResponse {
        let params: GenerateImagesParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, -32602, format!("Invalid parameters: {}", e));
            }
        };

        if params.prompt.trim().is_empty() {
            return JsonRpcResponse::error(id, -32602, "prompt must not be empty");
        }
        if let Some(dir) = &params.output_dir {
            if let Err(msg) = validate_output_dir(dir) {
                return JsonRpcResponse::error(id, -32602, msg);
            }
        }

        let aspect_ratio = match params.aspect_ratio.as_deref().map(str::parse::<AspectRatio>) {
            None => AspectRatio::default(),
            Some(Ok(ratio)) => ratio,
            Some(Err(e)) => return JsonRpcResponse::error(id, -32602, e.to_string()),
        };
        let config = match GenerationConfig::new(params.number_of_images.unwrap_or(1), aspect_ratio) {
            Ok(c) => c,
            Err(e) => return JsonRpcResponse::error(id, -32602, e.to_string()),
        };

        match self.service.generate_images(&params.prompt, &config).await {
            Ok(images) => deliver(id, images, params.output_dir.as_deref()),
            Err(e) => {
                tracing::error!("error generating images: {e}");
                JsonRpcResponse::error(id, -32603, generation_failure_message(&e))
            }
        }
    }

    async fn edit_image(&self, id: Value, arguments: Value) -> JsonRpcResponse {
        let params: EditImageParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, -32602, format!("Invalid parameters: {}", e));
            }
        };

        if params.prompt.trim().is_empty() {
            return JsonRpcResponse::error(id, -32602, "prompt must not be empty");
        }
        if params.images.is_empty() {
            return JsonRpcResponse::error(id, -32602, "images must contain at least one image");
        }
        if let Some(dir) = &params.output_dir {
            if let Err(msg) = validate_output_dir(dir) {
                return JsonRpcResponse::error(id, -32602, msg);
            }
        }

        let mut inputs = Vec::with_capacity(params.images.len());
        for (i, encoded) in params.images.iter().enumerate() {
            let bytes = match decode_base64_lenient(encoded) {
                Ok(b) => b,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        -32602,
                        format!("Invalid base64 in images[{}]: {}", i, e),
                    );
                }
            };
            let Some(format) = ImageFormat::from_magic_bytes(&bytes) else {
                return JsonRpcResponse::error(
                    id,
                    -32602,
                    format!("images[{}] is not a PNG, JPEG or WEBP image", i),
                );
            };
            inputs.push(ImageData::from_bytes(&bytes, format.mime_type()));
        }

        let service = &self.service;
        let prompt = params.prompt.as_str();
        let edits = inputs
            .iter()
            .map(|image| async move { service.edit_image(prompt, image).await });

        match try_join_all(edits).await {
            Ok(results) => deliver(
                id,
                results.into_iter().flatten().collect(),
                params.output_dir.as_deref(),
            ),
            Err(e) => {
                tracing::error!("error editing image: {e}");
                JsonRpcResponse::error(id, -32603, edit_failure_message(&e))
            }
        }
    }
}

/// Returns data URLs, or saves into `output_dir` and returns the paths.
fn deliver(id: Value, images: Vec<GeneratedImage>, output_dir: Option<&str>) -> JsonRpcResponse {
    let payload = match output_dir {
        Some(dir) => match download_all(&images, dir) {
            Ok(paths) => json!({
                "success": true,
                "count": paths.len(),
                "saved_to": paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            }),
            Err(e) => return JsonRpcResponse::error(id, -32603, format!("Failed to save: {}", e)),
        },
        None => json!({
            "success": true,
            "count": images.len(),
            "images": images,
        }),
    };
    JsonRpcResponse::text(id, &payload)
}
