pub mod decode;
pub mod dsp;
pub mod error;
pub mod excerpt;
pub mod formats;
pub mod job;
pub mod params;
pub mod preview;
pub mod wav;

use std::path::Path;

use crate::dsp::realtime::RealtimeSpatialProcessor;
use crate::dsp::renderer::RenderOptions;
use crate::error::{SpatialError, SpatialResult};
use crate::formats::ExportFormat;
use crate::job::{JobStatus, RenderJob};
use crate::params::{ParameterSet, ParameterUpdate, RawParameters};
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the spatial8d-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Decode `bytes`, apply the 8D effect and return a 16-bit PCM WAV.
pub fn convert_to_8d(bytes: &[u8], params: &ParameterSet, options: RenderOptions) -> SpatialResult<Vec<u8>> {
    let mut job = RenderJob::from_bytes(bytes.to_vec(), *params, options);
    match job.run(|p| log::debug!("convert progress {p}%")) {
        JobStatus::Done => job
            .take_output()
            .ok_or_else(|| SpatialError::Encoding("completed job has no output".into())),
        JobStatus::Cancelled => Err(SpatialError::Cancelled),
        JobStatus::Error => Err(job
            .take_error()
            .unwrap_or_else(|| SpatialError::Decode("render failed".into()))),
    }
}

/// File-to-file conversion. The input must carry a supported audio
/// extension and the output must be a `.wav` in an existing directory.
pub fn convert_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    params: &ParameterSet,
    options: RenderOptions,
) -> SpatialResult<()> {
    let (input, output) = (input.as_ref(), output.as_ref());
    formats::validate_input_path(input)?;
    formats::validate_output_path(output)?;

    let bytes = std::fs::read(input)?;
    let wav = convert_to_8d(&bytes, params, options)?;
    std::fs::write(output, wav)?;
    log::info!("wrote {}", output.display());
    Ok(())
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

/// WASM-exposed: render an encoded source to an 8D WAV byte array.
/// `params` is the raw UI object (`speedSeconds`, `depthPct`, ...); any
/// missing field uses its default.
#[wasm_bindgen]
pub fn render_8d_wav(bytes: &[u8], params: JsValue) -> Result<Vec<u8>, JsValue> {
    let raw: RawParameters = if params.is_undefined() || params.is_null() {
        RawParameters::default()
    } else {
        serde_wasm_bindgen::from_value(params).map_err(js_err)?
    };
    convert_to_8d(bytes, &ParameterSet::from_raw(&raw), RenderOptions::default()).map_err(js_err)
}

/// WASM-exposed: whether a file of `size_bytes` bound for `target`
/// (extension or file name) should be converted in the browser.
#[wasm_bindgen]
pub fn should_process_locally_js(size_bytes: f64, target: &str) -> bool {
    let format = match target.rsplit_once('.') {
        Some((_, ext)) => ExportFormat::from_extension(ext),
        None => ExportFormat::from_extension(target),
    };
    formats::should_process_locally(size_bytes.max(0.0) as u64, format)
}

/// WASM-exposed realtime processor for an AudioWorklet.
///
/// The worklet owns this object and calls `process` once per render
/// quantum; `set_params` is forwarded from the worklet's message port.
#[wasm_bindgen]
pub struct WorkletProcessor {
    inner: RealtimeSpatialProcessor,
}

#[wasm_bindgen]
impl WorkletProcessor {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64, params: JsValue) -> Result<WorkletProcessor, JsValue> {
        let raw: RawParameters = if params.is_undefined() || params.is_null() {
            RawParameters::default()
        } else {
            serde_wasm_bindgen::from_value(params).map_err(js_err)?
        };
        let inner = RealtimeSpatialProcessor::new(sample_rate, ParameterSet::from_raw(&raw)).map_err(js_err)?;
        Ok(Self { inner })
    }

    /// Apply a partial update (`{ panSpeed?, panDepth?, roomSize?,
    /// wetLevel?, damping? }`), ramped over the next block.
    pub fn set_params(&mut self, update: JsValue) -> Result<(), JsValue> {
        let update: ParameterUpdate = serde_wasm_bindgen::from_value(update).map_err(js_err)?;
        self.inner.set_params(&update);
        Ok(())
    }

    /// Process one block in place.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.inner.process_block(left, right);
    }

    pub fn phase(&self) -> f64 {
        self.inner.phase()
    }
}
