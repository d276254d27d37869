//! Tool catalog advertised to the agent and the argument shapes it must send.

use serde::Deserialize;
use serde_json::json;
use shared::{
    domain::{EntityId, EntityKind},
    protocol::ToolDeclaration,
};

pub const CREATE_VISUAL_ENTITY: &str = "create_visual_entity";
pub const CREATE_DYNAMIC_ENTITY: &str = "create_dynamic_entity";
pub const CREATE_TEXTUAL_ENTITY: &str = "create_textual_entity";
pub const UPDATE_TEXTUAL_ENTITY: &str = "update_textual_entity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    CreateVisual,
    CreateDynamic,
    CreateTextual,
    UpdateTextual,
}

impl Tool {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            CREATE_VISUAL_ENTITY => Some(Self::CreateVisual),
            CREATE_DYNAMIC_ENTITY => Some(Self::CreateDynamic),
            CREATE_TEXTUAL_ENTITY => Some(Self::CreateTextual),
            UPDATE_TEXTUAL_ENTITY => Some(Self::UpdateTextual),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CreateVisual => CREATE_VISUAL_ENTITY,
            Self::CreateDynamic => CREATE_DYNAMIC_ENTITY,
            Self::CreateTextual => CREATE_TEXTUAL_ENTITY,
            Self::UpdateTextual => UPDATE_TEXTUAL_ENTITY,
        }
    }

    /// Transcript line shown while the tool runs.
    pub fn progress_label(self) -> &'static str {
        match self {
            Self::CreateVisual => "🎨 Generating image...",
            Self::CreateDynamic => "🎬 Generating video, this can take a few minutes...",
            Self::CreateTextual => "📝 Writing card...",
            Self::UpdateTextual => "✏️ Updating card...",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVisualArgs {
    pub prompt: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub reference_entity_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDynamicArgs {
    pub prompt: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reference_entity_id: Option<EntityId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTextualArgs {
    #[serde(default)]
    pub kind: Option<EntityKind>,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTextualArgs {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

pub fn declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            name: CREATE_VISUAL_ENTITY.into(),
            description: "Generate a still image and place it on the canvas. Selected images \
                          are used as visual references."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string", "description": "What the image shows." },
                    "title": { "type": "string" },
                    "style": { "type": "string", "description": "Art direction appended to the prompt." },
                    "reference_entity_ids": {
                        "type": "array",
                        "items": { "type": "string", "format": "uuid" }
                    }
                },
                "required": ["prompt"]
            }),
        },
        ToolDeclaration {
            name: CREATE_DYNAMIC_ENTITY.into(),
            description: "Generate a short video clip and place it on the canvas. Slow; use \
                          only when motion is requested."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string" },
                    "title": { "type": "string" },
                    "reference_entity_id": {
                        "type": "string",
                        "format": "uuid",
                        "description": "Image card to animate; defaults to the first selected image."
                    }
                },
                "required": ["prompt"]
            }),
        },
        ToolDeclaration {
            name: CREATE_TEXTUAL_ENTITY.into(),
            description: "Create a script, character or scene card.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "kind": { "type": "string", "enum": ["text", "character", "scene"] },
                    "title": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["title", "content"]
            }),
        },
        ToolDeclaration {
            name: UPDATE_TEXTUAL_ENTITY.into(),
            description: "Rewrite the title and/or content of an existing text, character or \
                          scene card."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "format": "uuid" },
                    "title": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["id"]
            }),
        },
    ]
}
