use crate::expression::bytecode::Program;
use crate::expression::node::combine;
use crate::foundation::core::{Rgb, Variables};

impl Program {
    /// Evaluate one sample. `regs` is scratch space reused across calls.
    pub fn eval_with_regs(
        &self,
        regs: &mut Vec<Rgb>,
        x: f32,
        y: f32,
        t: f32,
        vars: &Variables,
    ) -> Rgb {
        regs.clear();
        for op in &self.ops {
            let argc = op.argc as usize;
            let mut args = [[0.0f32; 3]; 3];
            for (dst, src) in args.iter_mut().zip(&op.args[..argc]) {
                *dst = regs[src.0 as usize];
            }
            let params = &self.params[op.params.0 as usize..op.params.1 as usize];
            regs.push(combine(op.kind, params, &args[..argc], [x, y, t], vars));
        }
        regs.last().copied().unwrap_or([0.0; 3])
    }

    pub fn eval(&self, x: f32, y: f32, t: f32, vars: &Variables) -> Rgb {
        let mut regs = Vec::with_capacity(self.ops.len());
        self.eval_with_regs(&mut regs, x, y, t, vars)
    }
}
