//! Executes agent tool invocations against the generation backend and commits
//! the results to the canvas.

use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use canvas_core::{frame, viewport, CanvasStore};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Entity, EntityId, EntityKind, EntityMetadata, Position},
    protocol::{ImageGenerationRequest, ImageReference, ToolInvocation, VideoGenerationRequest},
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    backend::GenerationBackend,
    tools::{CreateDynamicArgs, CreateTextualArgs, CreateVisualArgs, Tool, UpdateTextualArgs},
};

const DEFAULT_IMAGE_TITLE: &str = "Generated shot";
const DEFAULT_VIDEO_TITLE: &str = "Generated clip";
const VIDEO_MIME: &str = "video/mp4";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub video_poll_interval: Duration,
    /// Upper bound on status polls before a video job is abandoned.
    pub max_video_polls: u32,
    pub video_resolution: String,
    pub video_aspect_ratio: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            video_poll_interval: Duration::from_secs(10),
            max_video_polls: 60,
            video_resolution: "720p".into(),
            video_aspect_ratio: "16:9".into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {reason}")]
    MalformedArguments { tool: &'static str, reason: String },
    #[error("{0} cards cannot be created as text")]
    InvalidKind(EntityKind),
    #[error("entity {0} not found")]
    NotFound(String),
    #[error("entity {id} is a {kind} card and has no editable text")]
    NotTextual { id: EntityId, kind: EntityKind },
    #[error("generation backend failed: {0:#}")]
    Backend(anyhow::Error),
    #[error("video generation failed: {0}")]
    VideoFailed(String),
    #[error("video generation did not finish after {0} polls")]
    VideoTimedOut(u32),
    #[error("video generation finished without a download link")]
    MissingVideoUri,
    #[error("turn cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Created {
        id: EntityId,
        kind: EntityKind,
        title: String,
    },
    Updated {
        id: EntityId,
        title: String,
    },
}

impl ToolOutcome {
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Created { id, .. } | Self::Updated { id, .. } => *id,
        }
    }

    /// Line written to the transcript once the tool has finished.
    pub fn summary(&self) -> String {
        match self {
            Self::Created { title, .. } => format!("✨ Done: [{title}] was added to the canvas."),
            Self::Updated { title, .. } => format!("✏️ Updated [{title}]."),
        }
    }
}

#[derive(Clone)]
pub struct ActionExecutor {
    canvas: CanvasStore,
    backend: Arc<dyn GenerationBackend>,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(
        canvas: CanvasStore,
        backend: Arc<dyn GenerationBackend>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            canvas,
            backend,
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs one invocation. `context` is the selection captured when the turn
    /// was sent. Nothing is committed once `cancel` fires, and failures leave
    /// the canvas untouched.
    pub async fn execute(
        &self,
        invocation: &ToolInvocation,
        context: &[Entity],
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome, ToolError> {
        let tool = Tool::from_name(&invocation.name)
            .ok_or_else(|| ToolError::UnknownTool(invocation.name.clone()))?;
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        debug!(tool = tool.name(), "executor: running tool");
        match tool {
            Tool::CreateVisual => {
                let args: CreateVisualArgs = parse_args(tool, invocation)?;
                self.create_visual(args, context, cancel).await
            }
            Tool::CreateDynamic => {
                let args: CreateDynamicArgs = parse_args(tool, invocation)?;
                self.create_dynamic(args, context, cancel).await
            }
            Tool::CreateTextual => {
                let args: CreateTextualArgs = parse_args(tool, invocation)?;
                self.create_textual(args, cancel)
            }
            Tool::UpdateTextual => {
                let args: UpdateTextualArgs = parse_args(tool, invocation)?;
                self.update_textual(args, cancel)
            }
        }
    }

    async fn create_visual(
        &self,
        args: CreateVisualArgs,
        context: &[Entity],
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome, ToolError> {
        let prompt = match args.style.as_deref().map(str::trim) {
            Some(style) if !style.is_empty() => format!("{}\nStyle: {style}", args.prompt),
            _ => args.prompt.clone(),
        };
        let references = if args.reference_entity_ids.is_empty() {
            image_references(context.iter())
        } else {
            let chosen = self.resolve_entities(&args.reference_entity_ids, context);
            image_references(chosen.iter())
        };
        debug!(references = references.len(), "executor: requesting image");
        let image = self
            .backend
            .generate_image(ImageGenerationRequest { prompt, references })
            .await
            .map_err(ToolError::Backend)?;
        if image.data_b64.is_empty() {
            return Err(ToolError::Backend(anyhow!("backend returned an empty image")));
        }
        let mime = if image.mime_type.is_empty() {
            "image/png"
        } else {
            image.mime_type.as_str()
        };
        let entity = Entity::new(
            EntityKind::Image,
            non_empty_or(args.title, DEFAULT_IMAGE_TITLE),
            data_url(mime, &image.data_b64),
            Position::default(),
        )
        .with_metadata(EntityMetadata {
            prompt: Some(args.prompt),
            ..EntityMetadata::default()
        });
        self.commit_new(entity, cancel)
    }

    async fn create_dynamic(
        &self,
        args: CreateDynamicArgs,
        context: &[Entity],
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome, ToolError> {
        let requested = args
            .reference_entity_id
            .map(|id| self.resolve_entities(&[id], context))
            .unwrap_or_default();
        let reference = image_references(requested.iter())
            .into_iter()
            .next()
            .or_else(|| image_references(context.iter()).into_iter().next());

        let mut operation = self
            .backend
            .submit_video(VideoGenerationRequest {
                prompt: args.prompt.clone(),
                reference,
                resolution: self.config.video_resolution.clone(),
                aspect_ratio: self.config.video_aspect_ratio.clone(),
            })
            .await
            .map_err(ToolError::Backend)?;
        info!(operation_id = %operation.operation_id, "executor: video job submitted");

        let mut polls = 0;
        while !operation.done {
            if polls >= self.config.max_video_polls {
                return Err(ToolError::VideoTimedOut(polls));
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(ToolError::Cancelled),
                _ = tokio::time::sleep(self.config.video_poll_interval) => {}
            }
            operation = self
                .backend
                .poll_video(&operation.operation_id)
                .await
                .map_err(ToolError::Backend)?;
            polls += 1;
            debug!(polls, done = operation.done, "executor: polled video job");
        }
        if let Some(error) = operation.error {
            return Err(ToolError::VideoFailed(error));
        }
        let uri = operation.video_uri.ok_or(ToolError::MissingVideoUri)?;
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        let bytes = self
            .backend
            .download_video(&uri)
            .await
            .map_err(ToolError::Backend)?;

        let entity = Entity::new(
            EntityKind::Video,
            non_empty_or(args.title, DEFAULT_VIDEO_TITLE),
            data_url(VIDEO_MIME, &STANDARD.encode(bytes)),
            Position::default(),
        )
        .with_metadata(EntityMetadata {
            prompt: Some(args.prompt),
            model: None,
            aspect_ratio: Some(self.config.video_aspect_ratio.clone()),
        });
        self.commit_new(entity, cancel)
    }

    fn create_textual(
        &self,
        args: CreateTextualArgs,
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome, ToolError> {
        let kind = args.kind.unwrap_or(EntityKind::Text);
        if !kind.is_textual() {
            return Err(ToolError::InvalidKind(kind));
        }
        let entity = Entity::new(kind, args.title, args.content, Position::default());
        self.commit_new(entity, cancel)
    }

    fn update_textual(
        &self,
        args: UpdateTextualArgs,
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome, ToolError> {
        if args.title.is_none() && args.content.is_none() {
            return Err(ToolError::MalformedArguments {
                tool: Tool::UpdateTextual.name(),
                reason: "expected a title or content".into(),
            });
        }
        // Ids the agent invents still report as a missing card.
        let Ok(id) = args.id.trim().parse::<EntityId>() else {
            return Err(ToolError::NotFound(args.id));
        };
        let mut result = Err(ToolError::Cancelled);
        self.canvas.update(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            let Some(entity) = state.entity_mut(id) else {
                result = Err(ToolError::NotFound(id.to_string()));
                return false;
            };
            if !entity.kind.is_textual() {
                result = Err(ToolError::NotTextual {
                    id,
                    kind: entity.kind,
                });
                return false;
            }
            if let Some(title) = args.title {
                entity.title = title;
            }
            if let Some(content) = args.content {
                entity.payload = content;
            }
            result = Ok(ToolOutcome::Updated {
                id,
                title: entity.title.clone(),
            });
            true
        });
        if result.is_ok() {
            info!(entity_id = %id, "executor: updated entity");
        }
        result
    }

    /// Looks ids up in the captured context first, then on the live canvas.
    fn resolve_entities(&self, ids: &[EntityId], context: &[Entity]) -> Vec<Entity> {
        let state = self.canvas.snapshot();
        ids.iter()
            .filter_map(|id| {
                context
                    .iter()
                    .find(|entity| entity.id == *id)
                    .or_else(|| state.entity(*id))
                    .cloned()
            })
            .collect()
    }

    /// Places `entity` centred on the current screen centre and inserts it at
    /// the front, unless the turn was cancelled.
    fn commit_new(
        &self,
        mut entity: Entity,
        cancel: &CancellationToken,
    ) -> Result<ToolOutcome, ToolError> {
        let outcome = ToolOutcome::Created {
            id: entity.id,
            kind: entity.kind,
            title: entity.title.clone(),
        };
        let size = frame::footprint_size(entity.kind);
        let committed = self.canvas.update(|state| {
            if cancel.is_cancelled() {
                return false;
            }
            let center = viewport::screen_center_to_world(&state.viewport, state.screen);
            entity.position = Position::new(
                center.x - size.width / 2.0,
                center.y - size.height / 2.0,
            );
            state.entities.insert(0, entity);
            true
        });
        if !committed {
            return Err(ToolError::Cancelled);
        }
        info!(entity_id = %outcome.entity_id(), "executor: committed entity");
        Ok(outcome)
    }
}

fn parse_args<T: DeserializeOwned>(tool: Tool, invocation: &ToolInvocation) -> Result<T, ToolError> {
    serde_json::from_value(invocation.args.clone()).map_err(|err| ToolError::MalformedArguments {
        tool: tool.name(),
        reason: err.to_string(),
    })
}

fn non_empty_or(title: Option<String>, fallback: &str) -> String {
    title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

pub fn data_url(mime_type: &str, data_b64: &str) -> String {
    format!("data:{mime_type};base64,{data_b64}")
}

/// Splits a base64 `data:` URL into its MIME type and payload. Remote URLs
/// and non-base64 data URLs yield `None`.
pub fn parse_data_url(url: &str) -> Option<ImageReference> {
    let (meta, data) = url.strip_prefix("data:")?.split_once(',')?;
    let mime_type = meta.strip_suffix(";base64")?;
    if data.is_empty() {
        return None;
    }
    Some(ImageReference {
        mime_type: if mime_type.is_empty() {
            "image/png".to_string()
        } else {
            mime_type.to_string()
        },
        data_b64: data.to_string(),
    })
}

fn image_references<'a>(entities: impl Iterator<Item = &'a Entity>) -> Vec<ImageReference> {
    entities
        .filter(|entity| entity.kind == EntityKind::Image)
        .filter_map(|entity| parse_data_url(&entity.payload))
        .collect()
}

#[cfg(test)]
#[path = "tests/executor_tests.rs"]
mod tests;
