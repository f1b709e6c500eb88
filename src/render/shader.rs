//! Full WGSL compute shaders for an expression tree.
//!
//! Uniform layout (64 bytes):
//!
//! ```text
//! offset  0  size: vec2<u32>
//! offset  8  time: f32
//! offset 12  pad: f32
//! offset 16  vars: array<vec4<f32>, 3>   (variable i at vars[i / 4][i % 4])
//! ```
//!
//! Output is one packed RGBA8 `u32` per pixel, row-major, red in the low byte.

use crate::expression::bytecode::Program;
use crate::expression::codegen::POINT;
use crate::expression::node::Node;
use crate::foundation::error::{RandomartError, RandomartResult};

pub const WORKGROUP_SIZE: u32 = 8;

/// Four `f32` lanes per `vec4`, enough for every named variable.
pub const VAR_VEC4S: usize = 3;

const PRELUDE: &str = "\
struct Params {
    size: vec2<u32>,
    time: f32,
    pad: f32,
    vars: array<vec4<f32>, 3>,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var<storage, read_write> pixels: array<u32>;
";

const ENTRY: &str = "\
fn to_byte(c: f32) -> u32 {
    return u32(floor((clamp(c, -1.0, 1.0) + 1.0) * 127.5 + 0.5));
}

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    if (id.x >= params.size.x || id.y >= params.size.y) {
        return;
    }
    let w = f32(params.size.x);
    let h = f32(params.size.y);
    let p = vec3<f32>(2.0 * f32(id.x) / w - 1.0, 2.0 * f32(id.y) / h - 1.0, params.time);
    let c = art(p);
    pixels[id.y * params.size.x + id.x] =
        to_byte(c.x) | (to_byte(c.y) << 8u) | (to_byte(c.z) << 16u) | (255u << 24u);
}
";

/// `fn art(p: vec3<f32>) -> vec3<f32>` evaluating `root`.
pub fn art_function(root: &Node) -> String {
    let mut body = String::new();
    let result = root.to_code(&mut body);
    format!("fn art({POINT}: vec3<f32>) -> vec3<f32> {{\n{body}    return {result};\n}}\n")
}

/// Complete compute module: uniforms, `art`, and the `main` entry point.
pub fn compute_shader(root: &Node) -> String {
    format!("{PRELUDE}\n{}\n{ENTRY}", art_function(root))
}

/// Parse and validate WGSL with naga.
pub fn validate_wgsl(source: &str) -> RandomartResult<naga::Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        RandomartError::backend(format!(
            "generated WGSL failed to parse: {}",
            e.emit_to_string(source)
        ))
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| RandomartError::backend(format!("generated WGSL failed validation: {e:?}")))?;
    Ok(module)
}

/// An expression compiled for single-pass execution.
#[derive(Clone, Debug)]
pub struct CompiledArt {
    pub shader: String,
    pub program: Program,
}

impl CompiledArt {
    #[tracing::instrument(level = "debug", skip_all, fields(nodes = root.node_count()))]
    pub fn compile(root: &Node) -> RandomartResult<Self> {
        let shader = compute_shader(root);
        validate_wgsl(&shader)?;
        let program = Program::lower(root);
        tracing::debug!(bytes = shader.len(), ops = program.len(), "compiled expression");
        Ok(Self { shader, program })
    }

    pub fn reads_variables(&self) -> bool {
        self.program.reads_variables()
    }
}
