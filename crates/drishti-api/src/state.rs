//! Application state.

use std::sync::Arc;

use drishti_firestore::{AlertRepository, CollectionNames, FirestoreClient, MetricsRepository};
use drishti_pipeline::{
    AlertSink, CameraDispatcher, CameraStateRegistry, Detector, ForecastingEngine, FramePipeline,
    FrameStore, MetricsStore, PipelineConfig,
};
use drishti_storage::BucketClient;
use drishti_vision::VisionClient;
use tracing::info;

use crate::config::ApiConfig;
use crate::services::{SummaryClient, SummaryConfig};

/// External services the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub frame_store: Arc<dyn FrameStore>,
    pub detector: Arc<dyn Detector>,
    pub metrics_store: Arc<dyn MetricsStore>,
    pub alert_sink: Arc<dyn AlertSink>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub dispatcher: CameraDispatcher,
    pub forecaster: Arc<ForecastingEngine>,
    pub frame_store: Arc<dyn FrameStore>,
    pub metrics_store: Arc<dyn MetricsStore>,
    pub summarizer: Option<Arc<SummaryClient>>,
}

impl AppState {
    /// Build state from environment configuration and production adapters.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let pipeline_config = PipelineConfig::from_env();

        let bucket = BucketClient::from_env()?;
        let vision = VisionClient::from_env()?;
        let firestore = FirestoreClient::from_env().await?;
        let collections = CollectionNames::from_env();
        info!(
            bucket = bucket.bucket(),
            metrics_collection = %collections.metrics,
            alerts_collection = %collections.alerts,
            "Adapters configured"
        );

        let collaborators = Collaborators {
            frame_store: Arc::new(bucket),
            detector: Arc::new(vision),
            metrics_store: Arc::new(MetricsRepository::new(firestore.clone(), collections.metrics)),
            alert_sink: Arc::new(AlertRepository::new(firestore, collections.alerts)),
        };

        let summarizer = match SummaryConfig::from_env() {
            Some(summary_config) => Some(SummaryClient::new(summary_config)?),
            None => {
                info!("GEMINI_API_KEY not set, zone summaries will carry stats only");
                None
            }
        };

        Ok(Self::with_collaborators(config, pipeline_config, collaborators, summarizer))
    }

    /// Build state around the given collaborators. Must be called inside a
    /// Tokio runtime.
    pub fn with_collaborators(
        config: ApiConfig,
        pipeline_config: PipelineConfig,
        collaborators: Collaborators,
        summarizer: Option<SummaryClient>,
    ) -> Self {
        let Collaborators {
            frame_store,
            detector,
            metrics_store,
            alert_sink,
        } = collaborators;

        let forecaster = Arc::new(ForecastingEngine::from_config(
            Arc::clone(&metrics_store),
            &pipeline_config,
        ));
        let pipeline = FramePipeline::new(
            pipeline_config,
            Arc::clone(&frame_store),
            detector,
            Arc::clone(&metrics_store),
            alert_sink,
            Arc::new(CameraStateRegistry::new()),
        );

        Self {
            config,
            dispatcher: CameraDispatcher::new(Arc::new(pipeline)),
            forecaster,
            frame_store,
            metrics_store,
            summarizer: summarizer.map(Arc::new),
        }
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        self.dispatcher.pipeline().config()
    }
}
