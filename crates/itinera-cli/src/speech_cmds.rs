//! Commands that use the speech service: `transcribe` and `token`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use itinera_core::credential::{CredentialCache, NlsConfig, NlsTokenSource};
use itinera_core::planner::Planner;
use itinera_core::upstream::{GenerativeBackend, SpeechClient};

use crate::config::mask;

/// Audio format from the file extension, falling back to `wav`.
pub fn format_for(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "wav".to_string())
}

fn credential_cache(config: &NlsConfig) -> Result<Arc<CredentialCache<NlsTokenSource>>> {
    let source = NlsTokenSource::new(config).context("speech credentials unavailable")?;
    Ok(Arc::new(CredentialCache::new(source)))
}

/// Run the transcribe command. With a planner, the transcript is also
/// classified as a voice query.
pub async fn run_transcribe<B: GenerativeBackend>(
    config: &NlsConfig,
    audio: &Path,
    format: Option<&str>,
    planner: Option<&Planner<B>>,
) -> Result<()> {
    let bytes = std::fs::read(audio)
        .with_context(|| format!("failed to read audio file {}", audio.display()))?;
    let format = format.map_or_else(|| format_for(audio), str::to_string);

    let client = SpeechClient::new(config, credential_cache(config)?)?;
    let text = client
        .recognize(bytes, &format)
        .await
        .context("speech recognition failed")?;

    match planner {
        None => println!("{text}"),
        Some(planner) => {
            eprintln!("Transcript: {text}");
            let intent = planner.parse_voice_query(&text).await;
            let json =
                serde_json::to_string_pretty(&intent).context("failed to encode voice intent")?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Run the token command: acquire a speech token and report its expiry.
pub async fn run_token(config: &NlsConfig, show: bool) -> Result<()> {
    let cache = credential_cache(config)?;
    let token = cache.get().await.context("failed to acquire speech token")?;

    let shown = if show { token.clone() } else { mask(&token) };
    println!("Token:   {shown}");
    if let Some(cached) = cache.cached().await {
        let remaining = cached.expires_at - chrono::Utc::now();
        println!(
            "Expires: {} ({}h {}m from now)",
            cached.expires_at.to_rfc3339(),
            remaining.num_hours(),
            remaining.num_minutes() % 60
        );
    }
    Ok(())
}
