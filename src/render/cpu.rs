use rayon::prelude::*;

use crate::expression::bytecode::Program;
use crate::foundation::core::{FrameRGBA, Rgb, Variables, rgb_to_rgba8};
use crate::foundation::error::RandomartResult;
use crate::render::shader::CompiledArt;
use crate::render::{ProgramExecutor, check_frame_size, pixel_point};

/// Runs the register program for every pixel, one row per rayon task.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuExecutor;

impl CpuExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl ProgramExecutor for CpuExecutor {
    fn name(&self) -> &'static str {
        "cpu"
    }

    #[tracing::instrument(level = "debug", skip(self, art, vars))]
    fn execute(
        &mut self,
        art: &CompiledArt,
        width: u32,
        height: u32,
        time: f32,
        vars: &Variables,
    ) -> RandomartResult<FrameRGBA> {
        check_frame_size(width, height)?;
        Ok(render_program(&art.program, width, height, time, vars))
    }
}

/// Evaluate `program` at every pixel of a `width` x `height` frame.
pub fn render_program(
    program: &Program,
    width: u32,
    height: u32,
    time: f32,
    vars: &Variables,
) -> FrameRGBA {
    let row_bytes = width as usize * 4;
    let mut data = vec![0u8; row_bytes * height as usize];
    data.par_chunks_mut(row_bytes).enumerate().for_each_init(
        || Vec::<Rgb>::with_capacity(program.len()),
        |regs, (row, out)| {
            for (col, px) in out.chunks_exact_mut(4).enumerate() {
                let (x, y) = pixel_point(col as u32, row as u32, width, height);
                let c = program.eval_with_regs(regs, x, y, time, vars);
                px.copy_from_slice(&rgb_to_rgba8(c));
            }
        },
    );
    FrameRGBA {
        width,
        height,
        data,
    }
}
