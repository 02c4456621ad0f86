/// MultiDrawAggregator - immediate-mode realization of the core
/// BatchAggregator trait
///
/// Records accumulate in a CPU-side staging table; commit uploads the
/// instance and indirect-argument buffers once; render issues a single
/// multi_draw_indirect referencing the texture array and instance buffer,
/// or a draw_indirect loop when the device lacks the multidraw feature.

use std::sync::Arc;

use nova_batch_engine::effect::{BatchAggregator, DrawPackageData, FrameCursor};
use nova_batch_engine::error::Result;
use nova_batch_engine::renderer::{ShaderProgram, TexturePack};
use nova_batch_engine::engine_bail;

use crate::wgpu_context::MultiDrawContext;
use crate::wgpu_instance::{indirect_bytes, BatchTable, MAX_DRAWS, MAX_INSTANCES};
use crate::wgpu_shader::WgpuShaderProgram;

const INDIRECT_STRIDE: u64 = std::mem::size_of::<wgpu::util::DrawIndirectArgs>() as u64;

/// Immediate-mode batch aggregator
pub struct MultiDrawAggregator {
    ctx: Arc<MultiDrawContext>,
    cursor: FrameCursor,
    table: BatchTable,
    committed: usize,
    draw_count: u32,
    instance_buffer: Option<Arc<wgpu::Buffer>>,
    indirect_buffer: Option<wgpu::Buffer>,
    pack: Option<Arc<dyn TexturePack>>,
    alpha_blending: bool,
    shader: Option<Arc<dyn ShaderProgram>>,
}

impl MultiDrawAggregator {
    /// Create an aggregator around a pre-created instance buffer.
    ///
    /// The buffer is shared with the effect backend, which also binds it
    /// into the bind groups of the shaders serving this bucket.
    pub fn new(ctx: Arc<MultiDrawContext>, instance_buffer: Arc<wgpu::Buffer>) -> Self {
        Self {
            ctx,
            cursor: FrameCursor::new(),
            table: BatchTable::new(),
            committed: 0,
            draw_count: 0,
            instance_buffer: Some(instance_buffer),
            indirect_buffer: None,
            pack: None,
            alpha_blending: false,
            shader: None,
        }
    }
}

impl BatchAggregator for MultiDrawAggregator {
    fn initialize(&mut self) -> Result<()> {
        if self.instance_buffer.is_none() {
            engine_bail!("nova::wgpu", "aggregator has no instance buffer");
        }

        self.indirect_buffer = Some(self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("batch_indirect"),
            size: MAX_DRAWS as u64 * INDIRECT_STRIDE,
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));

        Ok(())
    }

    fn set_texture_pack(&mut self, pack: Arc<dyn TexturePack>) {
        self.pack = Some(pack);
    }

    fn texture_pack(&self) -> Option<&Arc<dyn TexturePack>> {
        self.pack.as_ref()
    }

    fn set_alpha_blending(&mut self, enabled: bool) {
        self.alpha_blending = enabled;
    }

    fn alpha_blending(&self) -> bool {
        self.alpha_blending
    }

    fn begin_frame(&mut self) {
        self.cursor.begin_frame();
    }

    fn add(&mut self, record: &Arc<DrawPackageData>) -> Result<()> {
        let first = self.cursor.note_add()?;
        if first {
            // first add of the cycle resets the write cursors
            self.table.clear();
            self.committed = 0;
            self.draw_count = 0;
        }
        if self.table.instance_count() >= MAX_INSTANCES {
            engine_bail!(
                "nova::wgpu",
                "instance buffer overflow: more than {} records in one bucket",
                MAX_INSTANCES
            );
        }
        if self.table.draw_count() >= MAX_DRAWS {
            engine_bail!(
                "nova::wgpu",
                "indirect buffer overflow: more than {} geometries in one bucket",
                MAX_DRAWS
            );
        }
        self.table.push(record);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let (instances, args) = self.table.build();

        if !instances.is_empty() {
            let Some(instance_buffer) = &self.instance_buffer else {
                engine_bail!("nova::wgpu", "commit without instance buffer");
            };
            let Some(indirect_buffer) = &self.indirect_buffer else {
                engine_bail!("nova::wgpu", "commit before initialize");
            };

            // single upload per buffer per frame
            self.ctx
                .queue
                .write_buffer(instance_buffer, 0, bytemuck::cast_slice(&instances));
            self.ctx
                .queue
                .write_buffer(indirect_buffer, 0, &indirect_bytes(&args));
        }

        self.committed = instances.len();
        self.draw_count = args.len() as u32;
        self.cursor.mark_committed();
        Ok(())
    }

    fn committed_count(&self) -> usize {
        self.committed
    }

    fn set_shader(&mut self, shader: Arc<dyn ShaderProgram>) {
        self.shader = Some(shader);
    }

    fn render(&mut self) -> Result<()> {
        if self.committed == 0 {
            // nothing committed: no GPU submission
            return Ok(());
        }

        let Some(shader) = &self.shader else {
            engine_bail!("nova::wgpu", "render without a shader set");
        };
        let Some(shader) = shader.as_any().downcast_ref::<WgpuShaderProgram>() else {
            engine_bail!("nova::wgpu", "render with a non-wgpu shader program");
        };

        let Some(indirect_buffer) = &self.indirect_buffer else {
            engine_bail!("nova::wgpu", "render before initialize");
        };

        let Some(vertex_store) = self.ctx.vertex_store() else {
            engine_bail!("nova::wgpu", "render without a vertex store installed");
        };

        let bind_group = shader
            .bind_group
            .lock()
            .map_err(|_| {
                nova_batch_engine::error::Error::BackendError(
                    "bind group lock poisoned".to_string(),
                )
            })?
            .as_ref()
            .cloned()
            .ok_or_else(|| {
                nova_batch_engine::error::Error::InvalidResource(format!(
                    "shader '{}' has no bind group wired up",
                    shader.name()
                ))
            })?;

        let draw_count = self.draw_count;
        let multi_draw = self.ctx.supports_multi_draw();

        let rendered = self.ctx.with_current_pass(|pass| {
            pass.set_pipeline(&shader.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_store.slice(..));

            if multi_draw {
                pass.multi_draw_indirect(indirect_buffer, 0, draw_count);
            } else {
                // per-batch fallback on devices without the feature
                for draw in 0..draw_count {
                    pass.draw_indirect(indirect_buffer, draw as u64 * INDIRECT_STRIDE);
                }
            }
        });

        if rendered.is_none() {
            engine_bail!("nova::wgpu", "render outside a render pass");
        }

        Ok(())
    }

    fn shutdown(&mut self) {
        self.table.clear();
        self.committed = 0;
        self.draw_count = 0;
        self.shader = None;
        self.pack = None;
        self.instance_buffer = None;
        self.indirect_buffer = None;
    }
}
