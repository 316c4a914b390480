//! Render context — the long-lived resource shared by renders in a session.
//!
//! Caches FFT plans so that a plan for a given size is built once and reused
//! by later renders. Dropping the context releases every plan.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

/// A forward/inverse real FFT pair of one size.
#[derive(Clone)]
pub struct FftPlan {
    pub forward: Arc<dyn RealToComplex<f32>>,
    pub inverse: Arc<dyn ComplexToReal<f32>>,
}

impl FftPlan {
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct RenderContext {
    // The planner itself is not `Send`, so finished plans are cached instead
    plans: Mutex<HashMap<usize, FftPlan>>,
}

impl RenderContext {
    pub fn new() -> Self {
        debug!("render context created");
        RenderContext {
            plans: Mutex::new(HashMap::new()),
        }
    }

    /// Plans for a real FFT of `fft_size` points, built on first request.
    pub fn plan(&self, fft_size: usize) -> FftPlan {
        // A poisoned cache still only holds complete plans
        let mut plans = self.plans.lock().unwrap_or_else(|e| e.into_inner());
        plans
            .entry(fft_size)
            .or_insert_with(|| {
                debug!("planning {fft_size}-point FFT");
                let mut planner = RealFftPlanner::<f32>::new();
                FftPlan {
                    forward: planner.plan_fft_forward(fft_size),
                    inverse: planner.plan_fft_inverse(fft_size),
                }
            })
            .clone()
    }

    /// Number of distinct FFT sizes planned so far.
    pub fn cached_plans(&self) -> usize {
        self.plans.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        debug!("render context released");
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext").finish_non_exhaustive()
    }
}
