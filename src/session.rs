//! Studio session — owns the render context and drives renders for one page
//! session.
//!
//! Each call to [`StudioSession::apply_settings`] is an independent render on
//! tokio's blocking pool. Starting a render cancels the one in flight, so the
//! most recent request is the only one that can publish. Failures keep the
//! previously published asset.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::watch;

use crate::cancel::CancelToken;
use crate::config::RenderConfig;
use crate::dsp::context::RenderContext;
use crate::dsp::encoder::EncodedAudioAsset;
use crate::error::{RenderError, StudioError};
use crate::pipeline::{RenderStage, render_asset};
use crate::settings::EffectSettings;

/// Observable state of the session's current render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Decoding,
    Rendering,
    Encoding,
    Ready,
    /// Holds the user-facing message.
    Failed(String),
}

impl From<RenderStage> for RenderState {
    fn from(stage: RenderStage) -> Self {
        match stage {
            RenderStage::Decoding => RenderState::Decoding,
            RenderStage::Rendering => RenderState::Rendering,
            RenderStage::Encoding => RenderState::Encoding,
        }
    }
}

#[derive(Default)]
struct Inner {
    generation: u64,
    in_flight: Option<CancelToken>,
    asset: Option<Arc<EncodedAudioAsset>>,
    /// Settings of the most recent request.
    settings: EffectSettings,
}

/// State shared with the blocking render tasks.
struct Shared {
    inner: Mutex<Inner>,
    state: watch::Sender<RenderState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every field is replaced whole, so a poisoned lock is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish `state` only if `generation` is still the live render.
    fn publish(&self, generation: u64, token: &CancelToken, state: RenderState) {
        let inner = self.lock();
        if inner.generation == generation && !token.is_cancelled() {
            self.state.send_replace(state);
        }
    }

    /// Record a failure for `generation` if it is still current.
    fn fail(&self, generation: u64, err: StudioError) -> StudioError {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.in_flight = None;
            error!("render {generation} failed: {err}");
            self.state
                .send_replace(RenderState::Failed(err.user_message().to_string()));
        }
        err
    }
}

pub struct StudioSession {
    config: RenderConfig,
    context: OnceLock<Arc<RenderContext>>,
    shared: Arc<Shared>,
}

impl StudioSession {
    pub fn new(config: RenderConfig) -> Self {
        let (state, _) = watch::channel(RenderState::Idle);
        StudioSession {
            config,
            context: OnceLock::new(),
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                state,
            }),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RenderState> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> RenderState {
        self.shared.state.borrow().clone()
    }

    /// The last successfully rendered asset, if any.
    pub fn current_asset(&self) -> Option<Arc<EncodedAudioAsset>> {
        self.shared.lock().asset.clone()
    }

    /// Settings of the most recent request, identity before the first one.
    pub fn settings(&self) -> EffectSettings {
        self.shared.lock().settings
    }

    /// Whether the render context has been created yet.
    pub fn has_context(&self) -> bool {
        self.context.get().is_some()
    }

    /// Render `source` with `settings` and publish the result.
    ///
    /// Returns `RenderError::Cancelled` if a newer request or [`cancel`]
    /// superseded this one; that result is discarded.
    ///
    /// [`cancel`]: StudioSession::cancel
    pub async fn apply_settings(
        &self,
        source: Arc<[u8]>,
        settings: EffectSettings,
    ) -> Result<Arc<EncodedAudioAsset>, StudioError> {
        let token = CancelToken::new();
        let generation = {
            let mut inner = self.shared.lock();
            inner.generation += 1;
            inner.settings = settings;
            if let Some(previous) = inner.in_flight.replace(token.clone()) {
                debug!("superseding render {}", inner.generation - 1);
                previous.cancel();
            }
            self.shared.state.send_replace(RenderState::Idle);
            inner.generation
        };

        let ctx = self.context();
        let config = self.config.clone();
        let shared = Arc::clone(&self.shared);
        let task_token = token.clone();
        let handle = tokio::task::spawn_blocking(move || {
            render_asset(&source, &settings, &config, &ctx, &task_token, &|stage| {
                shared.publish(generation, &task_token, stage.into());
            })
        });

        let joined = match self.config.render_timeout_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("render {generation} timed out after {ms} ms");
                    token.cancel();
                    return Err(self.shared.fail(generation, RenderError::TimedOut(ms).into()));
                }
            },
            None => handle.await,
        };
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                let err = RenderError::TaskFailed(e.to_string()).into();
                return Err(self.shared.fail(generation, err));
            }
        };

        let mut inner = self.shared.lock();
        if token.is_cancelled() || inner.generation != generation {
            debug!("discarding result of superseded render {generation}");
            return Err(RenderError::Cancelled.into());
        }
        match result {
            Ok(asset) => {
                let asset = Arc::new(asset);
                inner.in_flight = None;
                inner.asset = Some(Arc::clone(&asset));
                self.shared.state.send_replace(RenderState::Ready);
                Ok(asset)
            }
            Err(e) => {
                drop(inner);
                Err(self.shared.fail(generation, e))
            }
        }
    }

    /// Change one setting by its UI key (`"pitch"`, `"reverb"`, ...) on top of
    /// the most recent settings and render with the result.
    pub async fn apply_setting(
        &self,
        source: Arc<[u8]>,
        key: &str,
        value: f64,
    ) -> Result<Arc<EncodedAudioAsset>, StudioError> {
        let mut settings = self.settings();
        settings.set_by_name(key, value)?;
        self.apply_settings(source, settings).await
    }

    /// Abort the in-flight render, if any, and return to `Idle`.
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        if let Some(token) = inner.in_flight.take() {
            debug!("cancelling render {}", inner.generation);
            token.cancel();
            self.shared.state.send_replace(RenderState::Idle);
        }
    }

    /// End the session, cancelling any render and releasing the context.
    pub fn close(self) {
        self.cancel();
        debug!("session closed");
    }

    fn context(&self) -> Arc<RenderContext> {
        Arc::clone(self.context.get_or_init(|| Arc::new(RenderContext::new())))
    }
}

impl Default for StudioSession {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

impl std::fmt::Debug for StudioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioSession")
            .field("config", &self.config)
            .field("state", &*self.shared.state.borrow())
            .field("has_context", &self.has_context())
            .finish_non_exhaustive()
    }
}
