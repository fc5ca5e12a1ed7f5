//! `mongolap plan` - compile a query body without running it

use crate::runtime::load_config;
use anyhow::{Context, Result};
use mongolap_core::{MemoryStore, QueryBody, QueryCompiler};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Read a query body and print the rendered pipeline
pub async fn run(namespace: &str, file: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let text = match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read query body from stdin")?;
            text
        }
    };

    let body: serde_json::Value =
        serde_json::from_str(&text).context("Query body is not valid JSON")?;
    let compiler = QueryCompiler::new(config.compiler, Arc::new(MemoryStore::new()))?;
    let spec = QueryBody::from_json(body)?.into_spec(namespace)?;
    let compiled = compiler.compile(&spec)?;

    println!("{}", serde_json::to_string_pretty(&compiled.pipeline().to_json())?);
    Ok(())
}
