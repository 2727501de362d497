//! Voice relay entrypoint
//!
//! Loads and validates settings, wires the backends and the session
//! registry, and serves the HTTP command surface until shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use voice_relay_config::{load_settings, Settings};
use voice_relay_llm::{LlmConfig, OllamaChat};
use voice_relay_pipeline::{Backends, TempArtifactStore, VoiceSessionRegistry};
use voice_relay_server::{create_router, init_metrics, session_config, AppState};
use voice_relay_speech::{HttpStt, HttpTts, SttConfig, TtsConfig};
use voice_relay_transport::LoopbackFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var("VOICE_RELAY_CONFIG").ok();
    let settings = load_settings(config_path.as_deref()).context("loading settings")?;

    let metrics = init_metrics().context("installing metrics recorder")?;

    let backends = build_backends(&settings)?;
    let artifacts = Arc::new(TempArtifactStore::new().context("creating artifact store")?);

    // The in-process loopback stands in for a wire transport; real
    // transports plug in through the same TransportFactory seam.
    let factory = Arc::new(LoopbackFactory::new());
    let registry = Arc::new(VoiceSessionRegistry::new(
        factory,
        backends,
        session_config(&settings),
        artifacts.clone(),
    ));

    spawn_artifact_sweep(
        artifacts,
        Duration::from_secs(settings.server.artifact_sweep_secs),
        Duration::from_secs(settings.server.artifact_max_age_secs),
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "voice relay listening");

    let app = create_router(AppState {
        registry: registry.clone(),
        metrics,
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    registry.shutdown().await;
    tracing::info!("voice relay stopped");
    Ok(())
}

fn build_backends(settings: &Settings) -> anyhow::Result<Backends> {
    let stt = HttpStt::new(SttConfig {
        endpoint: settings.stt.endpoint.clone(),
        language_code: settings.stt.language_code.clone(),
        timeout: Duration::from_millis(settings.stt.stt_timeout_ms),
    })
    .context("creating STT client")?;

    let tts = HttpTts::new(TtsConfig {
        endpoint: settings.tts.endpoint.clone(),
        timeout: Duration::from_millis(settings.tts.tts_timeout_ms),
    })
    .context("creating TTS client")?;

    let llm = OllamaChat::new(LlmConfig {
        model: settings.llm.model.clone(),
        endpoint: settings.llm.endpoint.clone(),
        timeout: Duration::from_millis(settings.llm.llm_timeout_ms),
        max_retries: settings.llm.max_retries,
        initial_backoff: Duration::from_millis(settings.llm.initial_backoff_ms),
        temperature: settings.llm.temperature,
        max_tokens: settings.llm.max_tokens,
    })
    .context("creating chat backend")?;

    Ok(Backends {
        stt: Arc::new(stt),
        llm: Arc::new(llm),
        tts: Arc::new(tts),
    })
}

fn spawn_artifact_sweep(artifacts: Arc<TempArtifactStore>, interval: Duration, max_age: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let reaped = artifacts.sweep(max_age);
            if reaped > 0 {
                tracing::info!(reaped, "swept stale artifacts");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
