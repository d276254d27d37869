use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::protocol::{
    AgentTurnRequest, GeneratedImage, ImageGenerationRequest, StreamChunk, VideoGenerationRequest,
    VideoOperation,
};

/// Finite stream of chunks for one agent turn. Dropping it abandons the
/// response.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// Seam to the generation service: streamed agent turns plus image and video
/// generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn stream_turn(&self, request: AgentTurnRequest) -> Result<ChunkStream>;

    async fn generate_image(&self, request: ImageGenerationRequest) -> Result<GeneratedImage>;

    async fn submit_video(&self, request: VideoGenerationRequest) -> Result<VideoOperation>;

    async fn poll_video(&self, operation_id: &str) -> Result<VideoOperation>;

    async fn download_video(&self, video_uri: &str) -> Result<Vec<u8>>;
}

pub struct MissingGenerationBackend;

#[async_trait]
impl GenerationBackend for MissingGenerationBackend {
    async fn stream_turn(&self, _request: AgentTurnRequest) -> Result<ChunkStream> {
        Err(anyhow!("generation backend is unavailable"))
    }

    async fn generate_image(&self, _request: ImageGenerationRequest) -> Result<GeneratedImage> {
        Err(anyhow!("generation backend is unavailable"))
    }

    async fn submit_video(&self, _request: VideoGenerationRequest) -> Result<VideoOperation> {
        Err(anyhow!("generation backend is unavailable"))
    }

    async fn poll_video(&self, operation_id: &str) -> Result<VideoOperation> {
        Err(anyhow!(
            "generation backend is unavailable for operation {operation_id}"
        ))
    }

    async fn download_video(&self, _video_uri: &str) -> Result<Vec<u8>> {
        Err(anyhow!("generation backend is unavailable"))
    }
}
