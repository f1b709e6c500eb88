//! Turning expression trees into pixels.
//!
//! Two paths exist: [`progressive::ProgressiveRender`] interprets the tree directly in
//! coarse-to-fine steps, and [`shader::CompiledArt`] compiles it once for a single
//! full-resolution pass on a [`ProgramExecutor`].

pub mod cpu;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod progressive;
pub mod shader;

use crate::foundation::core::{FrameRGBA, Variables};
use crate::foundation::error::{RandomartError, RandomartResult};

pub use progressive::{ProgressiveRender, RefinementStep};
pub use shader::{CompiledArt, validate_wgsl};

/// Runs a compiled expression over every pixel of a frame.
pub trait ProgramExecutor: Send {
    fn name(&self) -> &'static str;

    fn execute(
        &mut self,
        art: &CompiledArt,
        width: u32,
        height: u32,
        time: f32,
        vars: &Variables,
    ) -> RandomartResult<FrameRGBA>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Executor {
    /// Register program on the CPU, rows spread over the rayon pool.
    #[default]
    Cpu,
    /// WGSL compute shader through wgpu. Needs the `gpu` feature.
    Gpu,
}

pub fn create_executor(kind: Executor) -> RandomartResult<Box<dyn ProgramExecutor>> {
    match kind {
        Executor::Cpu => Ok(Box::new(cpu::CpuExecutor::new())),
        #[cfg(feature = "gpu")]
        Executor::Gpu => Ok(Box::new(gpu::GpuExecutor::new()?)),
        #[allow(unreachable_patterns)]
        _ => Err(RandomartError::backend(
            "requested executor is not available (build with the `gpu` feature)",
        )),
    }
}

/// Map a pixel to `(x, y)` in `[-1, 1)`.
///
/// Row 0 maps to `y = -1`; the shader uses the same formula.
pub fn pixel_point(col: u32, row: u32, width: u32, height: u32) -> (f32, f32) {
    (
        2.0 * col as f32 / width as f32 - 1.0,
        2.0 * row as f32 / height as f32 - 1.0,
    )
}

pub(crate) fn check_frame_size(width: u32, height: u32) -> RandomartResult<()> {
    if width == 0 || height == 0 {
        return Err(RandomartError::validation(format!(
            "frame size must be non-zero, got {width}x{height}"
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| RandomartError::validation(format!("frame size {width}x{height} overflows")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_map_to_the_unit_square() {
        assert_eq!(pixel_point(0, 0, 4, 8), (-1.0, -1.0));
        assert_eq!(pixel_point(2, 4, 4, 8), (0.0, 0.0));
        assert_eq!(pixel_point(3, 7, 4, 8), (0.5, 0.75));
    }

    #[test]
    fn empty_frames_are_rejected() {
        assert!(matches!(
            check_frame_size(0, 10),
            Err(RandomartError::Validation(_))
        ));
        assert!(check_frame_size(1, 1).is_ok());
    }

    #[test]
    fn cpu_executor_is_always_available() {
        assert_eq!(create_executor(Executor::Cpu).unwrap().name(), "cpu");
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn gpu_executor_needs_the_feature() {
        assert!(matches!(
            create_executor(Executor::Gpu),
            Err(RandomartError::Backend(_))
        ));
    }
}
