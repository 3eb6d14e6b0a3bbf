//! Loads the `--objects` manifest: a JSON object mapping scene name to the
//! list of slash-delimited object paths to keep from that scene.

use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;

use crate::error::RepackError;

pub type ObjectManifest = IndexMap<String, Vec<String>>;

pub fn load(path: &Path) -> Result<ObjectManifest> {
    let text = std::fs::read_to_string(path).map_err(|err| RepackError::ManifestInvalid {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;

    serde_json::from_str(&text)
        .map_err(|err| RepackError::ManifestInvalid {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
        .context("could not parse object manifest")
}
