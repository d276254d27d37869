use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use canvas_core::CanvasStore;
use futures::StreamExt;
use shared::protocol::{
    AgentTurnRequest, GeneratedImage, ImageGenerationRequest, StreamChunk, VideoGenerationRequest,
    VideoOperation,
};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::backend::{ChunkStream, GenerationBackend};

pub(crate) type ScriptedChunk = std::result::Result<StreamChunk, String>;

pub(crate) enum TurnScript {
    Chunks(Vec<ScriptedChunk>),
    /// Chunks pushed by the test while the turn is running.
    Live(mpsc::UnboundedReceiver<ScriptedChunk>),
    Refuse(String),
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    scripts: Mutex<VecDeque<TurnScript>>,
    observe: Option<CanvasStore>,
    image_gate: Option<Arc<Notify>>,
    image_failure: Option<String>,
    video_polls_needed: u32,
    video_error: Option<String>,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) polls: AtomicU32,
    pub(crate) turn_requests: Mutex<Vec<AgentTurnRequest>>,
    pub(crate) image_requests: Mutex<Vec<ImageGenerationRequest>>,
    pub(crate) video_requests: Mutex<Vec<VideoGenerationRequest>>,
    /// Canvas entity count seen when each image request started.
    pub(crate) entity_counts: Mutex<Vec<usize>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_turn(mut self, script: TurnScript) -> Self {
        self.scripts.get_mut().expect("lock").push_back(script);
        self
    }

    pub(crate) fn observing(mut self, canvas: CanvasStore) -> Self {
        self.observe = Some(canvas);
        self
    }

    pub(crate) fn with_image_gate(mut self, gate: Arc<Notify>) -> Self {
        self.image_gate = Some(gate);
        self
    }

    pub(crate) fn failing_images(mut self, message: &str) -> Self {
        self.image_failure = Some(message.to_string());
        self
    }

    pub(crate) fn with_video(mut self, polls_needed: u32, error: Option<&str>) -> Self {
        self.video_polls_needed = polls_needed;
        self.video_error = error.map(str::to_string);
        self
    }

    pub(crate) fn image_requests(&self) -> Vec<ImageGenerationRequest> {
        self.image_requests.lock().expect("lock").clone()
    }

    pub(crate) fn turn_requests(&self) -> Vec<AgentTurnRequest> {
        self.turn_requests.lock().expect("lock").clone()
    }

    fn operation(&self, polls: u32) -> VideoOperation {
        let done = polls >= self.video_polls_needed;
        VideoOperation {
            operation_id: "operations/clip-1".into(),
            done,
            video_uri: (done && self.video_error.is_none()).then(|| "mem://clip".to_string()),
            error: if done { self.video_error.clone() } else { None },
        }
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn stream_turn(&self, request: AgentTurnRequest) -> Result<ChunkStream> {
        self.turn_requests.lock().expect("lock").push(request);
        let script = self.scripts.lock().expect("lock").pop_front();
        match script {
            None => Ok(futures::stream::empty().boxed()),
            Some(TurnScript::Refuse(message)) => Err(anyhow!(message)),
            Some(TurnScript::Chunks(chunks)) => Ok(futures::stream::iter(
                chunks.into_iter().map(|chunk| chunk.map_err(|err| anyhow!(err))),
            )
            .boxed()),
            Some(TurnScript::Live(rx)) => Ok(UnboundedReceiverStream::new(rx)
                .map(|chunk| chunk.map_err(|err| anyhow!(err)))
                .boxed()),
        }
    }

    async fn generate_image(&self, request: ImageGenerationRequest) -> Result<GeneratedImage> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(canvas) = &self.observe {
            let count = canvas.snapshot().entities.len();
            self.entity_counts.lock().expect("lock").push(count);
        }
        self.image_requests.lock().expect("lock").push(request);

        if let Some(gate) = &self.image_gate {
            gate.notified().await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = &self.image_failure {
            return Err(anyhow!(message.clone()));
        }
        Ok(GeneratedImage {
            mime_type: "image/png".into(),
            data_b64: "aW1n".into(),
        })
    }

    async fn submit_video(&self, request: VideoGenerationRequest) -> Result<VideoOperation> {
        self.video_requests.lock().expect("lock").push(request);
        Ok(self.operation(0))
    }

    async fn poll_video(&self, operation_id: &str) -> Result<VideoOperation> {
        assert_eq!(operation_id, "operations/clip-1");
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self.operation(polls))
    }

    async fn download_video(&self, video_uri: &str) -> Result<Vec<u8>> {
        assert_eq!(video_uri, "mem://clip");
        Ok(b"clip".to_vec())
    }
}
