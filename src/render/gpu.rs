use std::borrow::Cow;

use wgpu::util::DeviceExt as _;

use crate::foundation::core::{FrameRGBA, Variable, Variables};
use crate::foundation::error::{RandomartError, RandomartResult};
use crate::render::shader::{CompiledArt, VAR_VEC4S, WORKGROUP_SIZE};
use crate::render::{ProgramExecutor, check_frame_size};

/// Uniform words: `size.x, size.y, time, pad`, then the variables four per `vec4`.
const PARAM_WORDS: usize = 4 + 4 * VAR_VEC4S;

fn param_words(width: u32, height: u32, time: f32, vars: &Variables) -> [u32; PARAM_WORDS] {
    let mut words = [0u32; PARAM_WORDS];
    words[0] = width;
    words[1] = height;
    words[2] = time.to_bits();
    for v in Variable::ALL {
        words[4 + v.index()] = vars.get(v).to_bits();
    }
    words
}

/// Runs the generated compute shader through wgpu.
pub struct GpuExecutor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    /// Last pipeline, keyed by its shader source.
    pipeline: Option<(String, wgpu::ComputePipeline)>,
}

impl GpuExecutor {
    pub fn new() -> RandomartResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                RandomartError::backend("no gpu adapter available")
            }
            other => RandomartError::backend(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("randomart"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| RandomartError::backend(format!("wgpu request_device failed: {e:?}")))?;

        tracing::info!(adapter = ?adapter.get_info().name, "gpu executor ready");
        Ok(Self {
            device,
            queue,
            pipeline: None,
        })
    }

    fn pipeline_for(&mut self, shader: &str) -> wgpu::ComputePipeline {
        if let Some((src, pipeline)) = &self.pipeline
            && src == shader
        {
            return pipeline.clone();
        }
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("randomart_art"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(shader)),
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("randomart_art"),
                layout: None,
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });
        self.pipeline = Some((shader.to_owned(), pipeline.clone()));
        pipeline
    }
}

impl ProgramExecutor for GpuExecutor {
    fn name(&self) -> &'static str {
        "gpu"
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
        let size = width as u64 * height as u64 * 4;
        let max = self.device.limits().max_storage_buffer_binding_size as u64;
        if size > max {
            return Err(RandomartError::backend(format!(
                "frame of {size} bytes exceeds the storage buffer limit of {max}"
            )));
        }

        let pipeline = self.pipeline_for(&art.shader);
        let device = &self.device;

        let params = param_words(width, height, time, vars);
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("randomart_params"),
            contents: bytemuck::cast_slice(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let pixels = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("randomart_pixels"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("randomart_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("randomart_bind_group"),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pixels.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("randomart_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("randomart_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                width.div_ceil(WORKGROUP_SIZE),
                height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        encoder.copy_buffer_to_buffer(&pixels, 0, &readback, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RandomartError::backend(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| RandomartError::backend("readback channel closed"))?
            .map_err(|e| RandomartError::backend(format!("readback map failed: {e:?}")))?;

        // Each u32 is r | g << 8 | b << 16 | a << 24, so little-endian bytes are already RGBA.
        let data = slice.get_mapped_range().to_vec();
        readback.unmap();

        Ok(FrameRGBA {
            width,
            height,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_match_the_uniform_layout() {
        assert_eq!(PARAM_WORDS * 4, 64);

        let mut vars = Variables::NONE;
        vars.set(Variable::Hi, 0.5);
        vars.set(Variable::Brilliance, -1.0);
        let words = param_words(3, 4, 0.25, &vars);
        assert_eq!(words[0], 3);
        assert_eq!(words[1], 4);
        assert_eq!(f32::from_bits(words[2]), 0.25);
        // vars[0][2] and vars[2][1]
        assert_eq!(f32::from_bits(words[4 + 2]), 0.5);
        assert_eq!(f32::from_bits(words[4 + 9]), -1.0);

        let bytes: &[u8] = bytemuck::cast_slice(&words);
        assert_eq!(&bytes[0..4], &3u32.to_le_bytes());
    }
}
