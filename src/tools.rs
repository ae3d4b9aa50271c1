use crate::config::parse_flag;
use crate::photo::{Camera, Photo};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

pub fn ping_enabled() -> bool {
    std::env::var("PHOTO_AI_MCP_ENABLE_PING")
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(false)
}

pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    let ping = ToolDescriptor {
        name: "ping".into(),
        description: "Health check; echoes a message.".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "message": {"type": "string"}
            }
        }),
    };

    let generate_ai_image_query = ToolDescriptor {
        name: "generate_ai_image_query".into(),
        description: "Suggest a title, caption, tags and description for a base64 image".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "image_base64": {"type": "string", "description": "Raw base64 or a data:image/...;base64, URI"}
            }
        }),
    };

    let test_ai_connection = ToolDescriptor {
        name: "test_ai_connection".into(),
        description: "Rate-limited text round trip to the AI provider".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {}
        }),
    };

    let photo_thumbnail = ToolDescriptor {
        name: "photo_thumbnail".into(),
        description: "Build the thumbnail link for a photo".into(),
        input_schema: serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "photo": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "url": {"type": "string"},
                        "aspectRatio": {"type": "number"},
                        "blurData": {"type": "string"},
                        "title": {"type": "string"}
                    },
                    "required": ["id", "url", "aspectRatio"]
                },
                "tag": {"type": "string"},
                "camera": {
                    "type": "object",
                    "properties": {"make": {"type": "string"}, "model": {"type": "string"}},
                    "required": ["make", "model"]
                },
                "selected": {"type": "boolean"}
            },
            "required": ["photo"]
        }),
    };

    let mut tools = vec![generate_ai_image_query, test_ai_connection, photo_thumbnail];
    if ping_enabled() {
        tools.insert(0, ping);
    }
    tools
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingInput {
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingOutput {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateAiImageQueryInput {
    pub image_base64: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestAiConnectionOutput {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoThumbnailInput {
    pub photo: Photo,
    pub tag: Option<String>,
    pub camera: Option<Camera>,
    #[serde(default)]
    pub selected: bool,
}
