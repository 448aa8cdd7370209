//! Checkpoint loading and parameter-name normalization.
//!
//! Checkpoint naming conventions drift across training-tool versions: the
//! same network may be persisted as a raw parameter mapping, wrapped under a
//! `state_dict` key, prefixed with `module.` by distributed training, or
//! carrying doubled numeric path segments from a re-wrapped classifier head.
//! This module tolerates that drift without re-exporting models.
//!
//! Binding is an explicit, ordered list of repair strategies tried in
//! sequence. Each strategy is a pure key rewrite or a bind mode, so the
//! tried-and-failed sequence is inspectable and each rewrite is testable in
//! isolation.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use candle_core::{DType, Device, Shape, Tensor};
use candle_nn::var_builder::SimpleBackend;
use candle_nn::{Init, VarBuilder};
use tracing::{debug, warn};

use crate::core::errors::{PestError, PestResult};

/// A checkpoint as read from disk: parameter name to tensor, name-ordered.
pub type TensorMap = BTreeMap<String, Tensor>;

const STATE_DICT_PREFIX: &str = "state_dict.";
const MODULE_PREFIX: &str = "module.";

/// Reads a serialized parameter mapping from a `.safetensors` or PyTorch
/// `.pth`/`.pt` pickle file. Tensors land on the CPU; the binder moves them
/// to the target device.
pub fn load_checkpoint(path: &Path) -> PestResult<TensorMap> {
    if !path.is_file() {
        return Err(PestError::checkpoint_load(format!(
            "checkpoint file {} does not exist",
            path.display()
        )));
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let map: TensorMap = if extension.eq_ignore_ascii_case("safetensors") {
        candle_core::safetensors::load(path, &Device::Cpu)?
            .into_iter()
            .collect()
    } else {
        candle_core::pickle::read_all(path)?.into_iter().collect()
    };

    if map.is_empty() {
        return Err(PestError::checkpoint_load(format!(
            "checkpoint {} contains no tensors",
            path.display()
        )));
    }
    debug!(
        path = %path.display(),
        parameters = map.len(),
        "loaded checkpoint"
    );
    Ok(map)
}

/// Unwraps a mapping nested under a `state_dict` key.
///
/// Returns `None` when the checkpoint is already a plain mapping. Entries
/// outside the nested mapping (optimizer state, counters) are dropped.
pub(crate) fn unwrap_state_dict(map: &TensorMap) -> Option<TensorMap> {
    if !map.keys().any(|k| k.starts_with(STATE_DICT_PREFIX)) {
        return None;
    }
    Some(
        map.iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(STATE_DICT_PREFIX)
                    .map(|k| (k.to_string(), v.clone()))
            })
            .collect(),
    )
}

/// Strips the `module.` prefix distributed training wraps every name with.
///
/// Returns `None` when no key carries the prefix.
pub(crate) fn strip_module_prefix(map: &TensorMap) -> Option<TensorMap> {
    if !map.keys().any(|k| k.starts_with(MODULE_PREFIX)) {
        return None;
    }
    Some(
        map.iter()
            .map(|(k, v)| {
                let key = k.strip_prefix(MODULE_PREFIX).unwrap_or(k);
                (key.to_string(), v.clone())
            })
            .collect(),
    )
}

/// Collapses doubled numeric path segments, adjacent or trailing:
/// `classifier.1.1.weight` becomes `classifier.1.weight`.
///
/// Some checkpoints encode a re-wrapped classifier head this way where the
/// target architecture expects a single segment. Returns `None` when no key
/// changes.
pub(crate) fn collapse_doubled_numeric(map: &TensorMap) -> Option<TensorMap> {
    let rewritten: TensorMap = map
        .iter()
        .map(|(k, v)| (collapse_key(k), v.clone()))
        .collect();
    if rewritten.keys().eq(map.keys()) {
        None
    } else {
        Some(rewritten)
    }
}

fn collapse_key(key: &str) -> String {
    fn is_numeric(segment: &str) -> bool {
        !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
    }

    // First pass: an interior pair is a `.A.B.` run of two numeric segments
    // with a dot on both sides; the second segment is dropped. The match
    // consumes its trailing dot, so scanning resumes one segment later and
    // the pair after a collapse needs a fresh leading dot of its own.
    let parts: Vec<&str> = key.split('.').collect();
    let mut kept: Vec<&str> = Vec::with_capacity(parts.len());
    let mut i = 0;
    let mut dot_available = false;
    while i < parts.len() {
        kept.push(parts[i]);
        if dot_available
            && is_numeric(parts[i])
            && i + 2 < parts.len()
            && is_numeric(parts[i + 1])
        {
            i += 2;
            dot_available = false;
        } else {
            i += 1;
            dot_available = true;
        }
    }

    // Second pass: a trailing `.A.B` pair at the very end of the key.
    if kept.len() >= 3
        && is_numeric(kept[kept.len() - 1])
        && is_numeric(kept[kept.len() - 2])
    {
        kept.pop();
    }

    kept.join(".")
}

/// Serves checkpoint tensors where name and shape match and zero-fills the
/// rest, so a partially compatible checkpoint still binds.
struct LenientTensorBackend {
    tensors: HashMap<String, Tensor>,
}

impl SimpleBackend for LenientTensorBackend {
    fn get(
        &self,
        s: Shape,
        name: &str,
        _h: Init,
        dtype: DType,
        dev: &Device,
    ) -> candle_core::Result<Tensor> {
        match self.tensors.get(name) {
            Some(t) if t.dims() == s.dims() => t.to_device(dev)?.to_dtype(dtype),
            Some(t) => {
                debug!(
                    name,
                    expected = ?s.dims(),
                    actual = ?t.dims(),
                    "shape mismatch, parameter zero-filled"
                );
                Tensor::zeros(s, dtype, dev)
            }
            None => {
                debug!(name, "parameter missing from checkpoint, zero-filled");
                Tensor::zeros(s, dtype, dev)
            }
        }
    }

    fn get_unchecked(
        &self,
        name: &str,
        dtype: DType,
        dev: &Device,
    ) -> candle_core::Result<Tensor> {
        match self.tensors.get(name) {
            Some(t) => t.to_device(dev)?.to_dtype(dtype),
            None => Err(candle_core::Error::CannotFindTensor {
                path: name.to_string(),
            }
            .bt()),
        }
    }

    fn contains_tensor(&self, _name: &str) -> bool {
        true
    }
}

enum BindMode {
    /// Every requested parameter must exist with a matching shape.
    Strict,
    /// Mismatched or missing parameters are skipped (zero-filled).
    Lenient,
}

/// Binds a checkpoint onto an architecture, repairing names as needed.
///
/// `build` constructs the model from a `VarBuilder`; it is invoked once per
/// attempted strategy. The strategies run in a fixed order: exact bind of
/// the normalized mapping, doubled-numeric-segment collapse, lenient bind,
/// and finally a strict bind of the original mapping verbatim. Prefix
/// normalization (`state_dict.`, `module.`) is applied up front.
///
/// Returns [`PestError::CheckpointLoad`] naming the tried strategies when
/// none of them binds.
pub fn bind_with_repairs<M>(
    raw: &TensorMap,
    device: &Device,
    build: impl Fn(VarBuilder<'static>) -> candle_core::Result<M>,
) -> PestResult<M> {
    let mut normalized = raw.clone();
    if let Some(map) = unwrap_state_dict(&normalized) {
        debug!("unwrapped nested state_dict mapping");
        normalized = map;
    }
    if let Some(map) = strip_module_prefix(&normalized) {
        debug!("stripped distributed-training name prefix");
        normalized = map;
    }

    let mut attempts: Vec<(&'static str, TensorMap, BindMode)> =
        vec![("exact", normalized.clone(), BindMode::Strict)];
    if let Some(collapsed) = collapse_doubled_numeric(&normalized) {
        attempts.push(("collapse-doubled-numeric", collapsed, BindMode::Strict));
    }
    attempts.push(("lenient", normalized, BindMode::Lenient));
    attempts.push(("original", raw.clone(), BindMode::Strict));

    let mut tried: Vec<&'static str> = Vec::new();
    let mut last_error = String::new();

    for (strategy, map, mode) in attempts {
        debug!(strategy, "attempting checkpoint bind");
        let result = match mode {
            BindMode::Strict => {
                let tensors: HashMap<String, Tensor> = map.into_iter().collect();
                build(VarBuilder::from_tensors(tensors, DType::F32, device))
            }
            BindMode::Lenient => {
                let backend = LenientTensorBackend {
                    tensors: map.into_iter().collect(),
                };
                build(VarBuilder::from_backend(
                    Box::new(backend),
                    DType::F32,
                    device.clone(),
                ))
            }
        };
        match result {
            Ok(model) => {
                if !tried.is_empty() {
                    warn!(
                        strategy,
                        failed = ?tried,
                        "checkpoint bound after repair fallback"
                    );
                }
                return Ok(model);
            }
            Err(e) => {
                last_error = e.to_string();
                debug!(strategy, error = %last_error, "bind attempt failed");
                tried.push(strategy);
            }
        }
    }

    Err(PestError::checkpoint_load(format!(
        "no repair strategy bound the checkpoint (tried {tried:?}); last error: {last_error}"
    )))
}
