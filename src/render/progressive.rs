//! Coarse-to-fine interpretation of an expression tree.
//!
//! Step `k` of `n` samples every `2^(n-k)`-th pixel of the full-resolution grid, so the last step
//! is the full image. Samples are memoized per full-resolution pixel, which means every pixel is
//! evaluated at most once across all steps.

use std::time::Duration;

use rayon::prelude::*;

use crate::expression::node::Node;
use crate::foundation::core::{FrameRGBA, Variables, rgb_to_rgba8};
use crate::foundation::error::RandomartResult;
use crate::render::{check_frame_size, pixel_point};

/// One finished refinement step.
#[derive(Clone, Debug)]
pub struct RefinementStep {
    /// 1-based step number.
    pub current: u32,
    pub total: u32,
    /// Sample spacing in full-resolution pixels.
    pub stride: u32,
    pub frame: FrameRGBA,
    pub elapsed: Duration,
}

#[derive(Clone, Debug)]
pub struct ProgressiveRender {
    width: u32,
    height: u32,
    time: f32,
    total: u32,
    done: u32,
    cache: Vec<Option<[u8; 4]>>,
    evaluations: u64,
}

/// `max(1, ceil(log2(min(width, height))))`.
pub fn step_count(width: u32, height: u32) -> u32 {
    let n = width.min(height);
    let ceil_log2 = if n <= 1 {
        0
    } else {
        u32::BITS - (n - 1).leading_zeros()
    };
    ceil_log2.max(1)
}

impl ProgressiveRender {
    pub fn new(width: u32, height: u32, time: f32) -> RandomartResult<Self> {
        check_frame_size(width, height)?;
        Ok(Self {
            width,
            height,
            time,
            total: step_count(width, height),
            done: 0,
            cache: vec![None; width as usize * height as usize],
            evaluations: 0,
        })
    }

    pub fn total_steps(&self) -> u32 {
        self.total
    }

    /// Steps completed so far.
    pub fn completed_steps(&self) -> u32 {
        self.done
    }

    pub fn is_done(&self) -> bool {
        self.done >= self.total
    }

    /// Pixels evaluated since the last invalidation.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Forget every memoized sample. The step cursor is kept.
    pub fn invalidate(&mut self) {
        self.cache.fill(None);
        self.evaluations = 0;
    }

    /// Restart from the coarsest step.
    pub fn rewind(&mut self) {
        self.invalidate();
        self.done = 0;
    }

    /// Render the next step, or `None` when all steps are done.
    #[tracing::instrument(level = "debug", skip_all, fields(step = self.done + 1, total = self.total))]
    pub fn step(&mut self, root: &Node, vars: &Variables) -> Option<RefinementStep> {
        if self.is_done() {
            return None;
        }
        let started = std::time::Instant::now();
        let current = self.done + 1;
        let stride = 1u32 << (self.total - current);

        let (w, h, t) = (self.width, self.height, self.time);
        let out_w = w.div_ceil(stride);
        let out_h = h.div_ceil(stride);

        let rows: Vec<(Vec<u8>, u64)> = self
            .cache
            .par_chunks_mut(w as usize * stride as usize)
            .enumerate()
            .map(|(j, chunk)| {
                let row = j as u32 * stride;
                let mut out = Vec::with_capacity(out_w as usize * 4);
                let mut evaluated = 0u64;
                for i in 0..out_w {
                    let col = i * stride;
                    let slot = &mut chunk[col as usize];
                    let px = match *slot {
                        Some(px) => px,
                        None => {
                            let (x, y) = pixel_point(col, row, w, h);
                            let px = rgb_to_rgba8(root.eval_with(x, y, t, vars));
                            *slot = Some(px);
                            evaluated += 1;
                            px
                        }
                    };
                    out.extend_from_slice(&px);
                }
                (out, evaluated)
            })
            .collect();

        let mut data = Vec::with_capacity(out_w as usize * out_h as usize * 4);
        for (row, evaluated) in rows {
            data.extend_from_slice(&row);
            self.evaluations += evaluated;
        }

        self.done = current;
        let elapsed = started.elapsed();
        tracing::debug!(
            width = out_w,
            height = out_h,
            evaluations = self.evaluations,
            ?elapsed,
            "refinement step"
        );

        Some(RefinementStep {
            current,
            total: self.total,
            stride,
            frame: FrameRGBA {
                width: out_w,
                height: out_h,
                data,
            },
            elapsed,
        })
    }
}
