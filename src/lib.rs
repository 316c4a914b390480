pub mod cancel;
pub mod config;
pub mod dsp;
pub mod error;
pub mod pipeline;
#[cfg(feature = "session")]
pub mod session;
pub mod settings;

pub use crate::cancel::CancelToken;
pub use crate::config::RenderConfig;
pub use crate::dsp::encoder::EncodedAudioAsset;
pub use crate::error::StudioError;
pub use crate::pipeline::{process_audio, render_asset};
pub use crate::settings::{EffectSettings, SettingKey};
#[cfg(feature = "session")]
pub use crate::session::{RenderState, StudioSession};

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the voicefx-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: the neutral settings object
/// (`{ pitch: 0, formant: 0, reverbMix: 0, delayMix: 0 }`).
#[wasm_bindgen]
pub fn default_effect_settings() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&EffectSettings::default())
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render an uploaded recording with the given settings and
/// return the stereo 16-bit WAV bytes.
#[wasm_bindgen]
pub fn apply_audio_settings(bytes: &[u8], settings: JsValue) -> Result<Vec<u8>, JsValue> {
    let settings: EffectSettings =
        serde_wasm_bindgen::from_value(settings).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    render_to_bytes(bytes, &settings, &RenderConfig::default())
}

/// WASM-exposed: like `apply_audio_settings`, with a render configuration
/// object (`{ impulseSeconds, seed, ... }`).
#[wasm_bindgen]
pub fn apply_audio_settings_with_config(
    bytes: &[u8],
    settings: JsValue,
    config: JsValue,
) -> Result<Vec<u8>, JsValue> {
    let settings: EffectSettings =
        serde_wasm_bindgen::from_value(settings).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    let config: RenderConfig =
        serde_wasm_bindgen::from_value(config).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    render_to_bytes(bytes, &settings, &config)
}

fn render_to_bytes(
    bytes: &[u8],
    settings: &EffectSettings,
    config: &RenderConfig,
) -> Result<Vec<u8>, JsValue> {
    process_audio(bytes, settings, config)
        .map(EncodedAudioAsset::into_bytes)
        .map_err(|e| {
            log::error!("{e}");
            JsValue::from_str(e.user_message())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn reexports_cover_one_shot_render() {
        let silence = dsp::buffer::SampleBuffer::silence(1, 8000, 8000).unwrap();
        let input = dsp::encoder::encode_wav(&silence).unwrap().into_bytes();
        let asset = process_audio(&input, &EffectSettings::default(), &RenderConfig::default())
            .unwrap();
        assert_eq!(asset.channels(), 2);
        assert_eq!(asset.frames(), 8000);
    }
}
