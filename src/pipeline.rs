//! Render pipeline — decode, render, encode.
//!
//! One call is one render invocation: it owns every buffer it creates and
//! shares nothing with other invocations except the `RenderContext`.

use log::{debug, info};

use crate::cancel::CancelToken;
use crate::config::RenderConfig;
use crate::dsp::context::RenderContext;
use crate::dsp::decoder::decode;
use crate::dsp::encoder::{EncodedAudioAsset, encode_wav};
use crate::dsp::graph::RenderGraph;
use crate::error::StudioError;
use crate::settings::EffectSettings;

/// The stage a render invocation has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Decoding,
    Rendering,
    Encoding,
}

/// Decode `bytes`, render them with `settings` and encode the result as WAV.
///
/// `config` is validated first. `on_stage` is called as each stage begins.
/// The token is checked between stages; a cancelled invocation returns
/// `RenderError::Cancelled`.
pub fn render_asset(
    bytes: &[u8],
    settings: &EffectSettings,
    config: &RenderConfig,
    ctx: &RenderContext,
    cancel: &CancelToken,
    on_stage: &dyn Fn(RenderStage),
) -> Result<EncodedAudioAsset, StudioError> {
    config.validate()?;

    on_stage(RenderStage::Decoding);
    let source = decode(bytes)?;
    cancel.check()?;

    on_stage(RenderStage::Rendering);
    let graph = RenderGraph::from_config(source, settings, config)?;
    let rendered = graph.render(ctx, cancel)?;
    cancel.check()?;

    on_stage(RenderStage::Encoding);
    let asset = encode_wav(&rendered)?;
    debug!(
        "encoded {} frames x {} ch into {} bytes",
        asset.frames(),
        asset.channels(),
        asset.len()
    );
    info!(
        "rendered {:.2}s with pitch {}, formant {}, reverb {}%, delay {}%",
        asset.duration_seconds(),
        settings.pitch(),
        settings.formant(),
        settings.reverb_mix(),
        settings.delay_mix()
    );
    Ok(asset)
}

/// One-shot render with a fresh context and no cancellation.
pub fn process_audio(
    bytes: &[u8],
    settings: &EffectSettings,
    config: &RenderConfig,
) -> Result<EncodedAudioAsset, StudioError> {
    let ctx = RenderContext::new();
    render_asset(bytes, settings, config, &ctx, &CancelToken::new(), &|_| {})
}
