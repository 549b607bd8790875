pub mod doctor;
pub mod index;
pub mod notify;
pub mod search;
pub mod sessions;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use concierge::config::{expand_tilde, EmbeddingConfig};

const MODEL_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Bar style shared by the download and indexing commands.
pub(crate) fn progress_style(template: &str) -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template(template)
        .context("invalid progress template")?
        .progress_chars("##-"))
}

/// Download the ONNX embedding model and tokenizer to the cache directory.
pub async fn model_download(config: &EmbeddingConfig) -> Result<()> {
    let cache_dir = expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    let files = [
        ("model.onnx", MODEL_URL, " (~90MB)"),
        ("tokenizer.json", TOKENIZER_URL, ""),
    ];
    for (name, url, size_hint) in files {
        let dest = cache_dir.join(name);
        if dest.exists() {
            println!("{name} already exists at {}", dest.display());
            continue;
        }
        println!("Downloading {name}{size_hint}...");
        download_file(url, &dest).await?;
        println!("Saved to {}", dest.display());
    }

    println!("Model download complete. Ready for use.");
    Ok(())
}

/// Stream a URL to disk with a progress bar. Writes to a temp file, then renames.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(progress_style("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")?);
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk).await.context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}
