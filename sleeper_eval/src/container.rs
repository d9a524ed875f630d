// src/container.rs
//
// Read-only access to per-experiment result containers.
//
// A container exposes:
// - adv_params.norm: perturbation norm (string)
// - rollouts/<i>: integer-indexed rollout groups, each with
//     k                 head count (scalar)
//     action_prob_orig  (timesteps x actions) probabilities, unperturbed
//     action_prob_adv   (timesteps x actions) probabilities, perturbed
//
// `ResultFormat` is the seam for the on-disk encoding. The bundled
// `JsonResultFormat` mirrors the layout above as a JSON document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SleeperError, SleeperResult};

/// One rollout group as stored in a container.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRollout {
    /// Number of policy heads evaluated together.
    pub head_count: u32,
    pub action_prob_orig: Vec<Vec<f64>>,
    pub action_prob_adv: Vec<Vec<f64>>,
}

/// An opened result container.
pub trait ResultContainer {
    fn path(&self) -> &Path;

    /// The `adv_params.norm` attribute.
    fn norm(&self) -> SleeperResult<String>;

    /// Number of entries under `rollouts`.
    fn rollout_count(&self) -> SleeperResult<usize>;

    /// Read `rollouts/<index>`.
    fn rollout(&self, index: usize) -> SleeperResult<RawRollout>;
}

/// On-disk encoding of result containers.
pub trait ResultFormat: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(&self, path: &Path) -> SleeperResult<Box<dyn ResultContainer>>;
}

// =============================================================================
// JSON encoding
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonResultFile {
    #[serde(default)]
    pub adv_params: Option<JsonAdvParams>,
    #[serde(default)]
    pub rollouts: Option<BTreeMap<String, JsonRollout>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonAdvParams {
    #[serde(default)]
    pub norm: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonRollout {
    #[serde(default)]
    pub k: Option<u32>,
    #[serde(default)]
    pub action_prob_orig: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub action_prob_adv: Option<Vec<Vec<f64>>>,
}

/// JSON mirror of the result container layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResultFormat;

impl ResultFormat for JsonResultFormat {
    fn name(&self) -> &'static str {
        "json"
    }

    fn open(&self, path: &Path) -> SleeperResult<Box<dyn ResultContainer>> {
        Ok(Box::new(JsonResultContainer::open(path)?))
    }
}

#[derive(Debug, Clone)]
pub struct JsonResultContainer {
    path: PathBuf,
    file: JsonResultFile,
}

impl JsonResultContainer {
    pub fn open(path: &Path) -> SleeperResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| SleeperError::io(path, e))?;
        let file: JsonResultFile = serde_json::from_str(&contents)
            .map_err(|e| SleeperError::malformed(path, format!("invalid JSON: {}", e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn from_parts(path: impl Into<PathBuf>, file: JsonResultFile) -> Self {
        Self {
            path: path.into(),
            file,
        }
    }

    fn rollouts(&self) -> SleeperResult<&BTreeMap<String, JsonRollout>> {
        self.file
            .rollouts
            .as_ref()
            .ok_or_else(|| SleeperError::malformed(&self.path, "missing group 'rollouts'"))
    }
}

impl ResultContainer for JsonResultContainer {
    fn path(&self) -> &Path {
        &self.path
    }

    fn norm(&self) -> SleeperResult<String> {
        self.file
            .adv_params
            .as_ref()
            .and_then(|p| p.norm.clone())
            .ok_or_else(|| SleeperError::malformed(&self.path, "missing attribute 'adv_params.norm'"))
    }

    fn rollout_count(&self) -> SleeperResult<usize> {
        Ok(self.rollouts()?.len())
    }

    fn rollout(&self, index: usize) -> SleeperResult<RawRollout> {
        let group = format!("rollouts/{}", index);
        let entry = self
            .rollouts()?
            .get(&index.to_string())
            .ok_or_else(|| SleeperError::malformed(&self.path, format!("missing group '{}'", group)))?;

        let head_count = entry.k.ok_or_else(|| {
            SleeperError::malformed(&self.path, format!("missing scalar '{}/k'", group))
        })?;
        let action_prob_orig = entry.action_prob_orig.clone().ok_or_else(|| {
            SleeperError::malformed(
                &self.path,
                format!("missing dataset '{}/action_prob_orig'", group),
            )
        })?;
        let action_prob_adv = entry.action_prob_adv.clone().ok_or_else(|| {
            SleeperError::malformed(
                &self.path,
                format!("missing dataset '{}/action_prob_adv'", group),
            )
        })?;

        check_matrix(&self.path, &format!("{}/action_prob_orig", group), &action_prob_orig)?;
        check_matrix(&self.path, &format!("{}/action_prob_adv", group), &action_prob_adv)?;

        Ok(RawRollout {
            head_count,
            action_prob_orig,
            action_prob_adv,
        })
    }
}

/// A probability dataset must be a non-empty rectangular 2-D array.
fn check_matrix(path: &Path, dataset: &str, rows: &[Vec<f64>]) -> SleeperResult<()> {
    let width = match rows.first() {
        Some(row) => row.len(),
        None => {
            return Err(SleeperError::malformed(
                path,
                format!("dataset '{}' has no timesteps", dataset),
            ))
        }
    };
    if width == 0 {
        return Err(SleeperError::malformed(
            path,
            format!("dataset '{}' has zero action dimension", dataset),
        ));
    }
    if let Some(t) = rows.iter().position(|r| r.len() != width) {
        return Err(SleeperError::malformed(
            path,
            format!(
                "dataset '{}' is ragged: row {} has {} entries, expected {}",
                dataset,
                t,
                rows[t].len(),
                width
            ),
        ));
    }
    Ok(())
}
