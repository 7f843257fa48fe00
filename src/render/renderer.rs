//! Backend independent frame renderer.
//!
//! The [`Renderer`] walks the techniques and passes of a
//! [`RenderCommand`], tracks the state the backend currently has and only
//! forwards actual changes to the [`RendererBackend`]. A failed backend call
//! is logged and skips the pass (setup calls) or the draw command (per-draw
//! calls); only fatal errors abort the frame.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use glam::Mat4;

use crate::backend::{DrawCall, RendererBackend};
use crate::error::{RenderError, RenderResult};
use crate::resource::RenderResource;
use crate::resources::{Program, ProgramId, Texture, VertexData};
use crate::target::ViewportGeometry;

use super::draw_command::DrawCommand;
use super::draw_context::DrawContext;
use super::pipeline::RenderPipeline;
use super::render_command::RenderCommand;
use super::uniform::UniformVariable;

/// Name of the model-view-projection matrix set for every draw command.
pub const MVP_UNIFORM: &str = "u_matMVP";

/// Counters of one rendered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    pub passes: usize,
    pub skipped_passes: usize,
    pub draw_calls: usize,
    pub skipped_draws: usize,
}

/// State-caching dispatcher in front of a [`RendererBackend`].
pub struct Renderer {
    backend: Box<dyn RendererBackend>,
    debug: bool,
    force_pipeline_update: bool,
    pipeline: RenderPipeline,
    viewport: Option<ViewportGeometry>,
    vertex_data: Option<Arc<VertexData>>,
    textures: BTreeMap<u32, Arc<Texture>>,
    uniforms: HashMap<ProgramId, HashMap<String, UniformVariable>>,
}

impl Renderer {
    /// `debug` additionally logs the arguments of failed backend calls.
    pub fn new(backend: Box<dyn RendererBackend>, debug: bool) -> Self {
        Self {
            backend,
            debug,
            force_pipeline_update: true,
            pipeline: RenderPipeline::default(),
            viewport: None,
            vertex_data: None,
            textures: BTreeMap::new(),
            uniforms: HashMap::new(),
        }
    }

    /// Forget all cached state; everything is sent again on the next frame.
    pub fn reset(&mut self) {
        self.force_pipeline_update = true;
        self.pipeline = RenderPipeline::default();
        self.viewport = None;
        self.vertex_data = None;
        self.textures.clear();
        self.uniforms.clear();
    }

    /// The cached value of `name` for `program`.
    pub fn cached_uniform(&self, program: ProgramId, name: &str) -> Option<&UniformVariable> {
        self.uniforms.get(&program)?.get(name)
    }

    pub fn bound_program(&self) -> Option<ProgramId> {
        self.pipeline.program_id()
    }

    pub fn bound_textures(&self) -> &BTreeMap<u32, Arc<Texture>> {
        &self.textures
    }

    /// Render all techniques of `command` into its target.
    ///
    /// The frame buffer of an off-screen target is bound for the duration of
    /// the frame; the window is bound again afterwards.
    pub fn render(&mut self, command: &mut RenderCommand) -> RenderResult<RenderStats> {
        let target = command.target().cloned().ok_or(RenderError::NoRenderTarget)?;
        let viewport = target.viewport().ok_or(RenderError::NoViewport)?;
        let view_projection = viewport.view_projection_matrix();
        let geometry = viewport.geometry();

        let Some(frame_buffer) = target.frame_buffer() else {
            return self.render_techniques(command, geometry, view_projection);
        };
        frame_buffer.ensure_valid()?;
        self.backend.frame_buffer_changed(frame_buffer.gpu())?;
        let result = self.render_techniques(command, geometry, view_projection);
        let unbound = self.backend.frame_buffer_changed(None);
        let stats = result?;
        unbound?;
        Ok(stats)
    }

    fn render_techniques(
        &mut self,
        command: &mut RenderCommand,
        geometry: ViewportGeometry,
        view_projection: Mat4,
    ) -> RenderResult<RenderStats> {
        let mut stats = RenderStats::default();

        for technique in &command.techniques {
            let mut ctx = DrawContext::new(&command.global_state, geometry);

            for pass in technique.passes() {
                let names = (technique.name(), pass.name());
                stats.passes += 1;
                ctx.begin_pass();

                let result = pass.set_up(&mut ctx);
                if !self.check(names, "set_up", result, String::new)? {
                    stats.skipped_passes += 1;
                    continue;
                }

                let result = self.set_render_pipeline(&ctx.pipeline);
                if !self.check(names, "set_render_pipeline", result, || {
                    format!("{:?}", ctx.pipeline)
                })? {
                    stats.skipped_passes += 1;
                    continue;
                }

                let result = self.set_viewport(ctx.viewport);
                if !self.check(names, "set_viewport", result, || format!("{:?}", ctx.viewport))? {
                    stats.skipped_passes += 1;
                    continue;
                }

                if !ctx.clear.is_empty() {
                    let result = self.backend.clear(ctx.clear);
                    if !self.check(names, "clear", result, || format!("{:?}", ctx.clear))? {
                        stats.skipped_passes += 1;
                        continue;
                    }
                }

                let pass_program = ctx.pipeline.program.clone();
                if let Some(program) = &pass_program {
                    self.reset_uniforms(program.id());
                    self.apply_environment(program, &ctx, names)?;
                }

                let mut current = command.draw_commands.start();
                while let Some(draw) = current {
                    if self.draw(&draw, pass_program.as_ref(), &ctx, view_projection, names)? {
                        stats.draw_calls += 1;
                    } else {
                        stats.skipped_draws += 1;
                    }
                    current = command.draw_commands.next();
                }

                let result = pass.tear_down(&mut ctx);
                self.check(names, "tear_down", result, String::new)?;
            }
        }

        Ok(stats)
    }

    /// Issue one draw command. Returns false if it was skipped.
    fn draw(
        &mut self,
        draw: &DrawCommand,
        pass_program: Option<&Arc<Program>>,
        ctx: &DrawContext<'_>,
        view_projection: Mat4,
        names: (&str, &str),
    ) -> RenderResult<bool> {
        let Some(program) = draw.program().or(pass_program).cloned() else {
            log::debug!("Renderer: {}: {}: no program bound, skipping draw", names.0, names.1);
            return Ok(false);
        };

        if self.pipeline.program_id() != Some(program.id()) {
            let result = self.bind_program(Some(&program));
            if !self.check(names, "bind_program", result, || program.id().to_string())? {
                return Ok(false);
            }
            self.apply_environment(&program, ctx, names)?;
        }

        for (name, value) in draw.uniforms() {
            let result = self.set_uniform(&program, name, value);
            self.check(names, "set_uniform", result, || format!("{name} = {value}"))?;
        }

        let mvp = UniformVariable::from(view_projection * draw.model_matrix());
        let result = self.set_uniform(&program, MVP_UNIFORM, &mvp);
        if !self.check(names, "set_uniform", result, || format!("{MVP_UNIFORM} = {mvp}"))? {
            return Ok(false);
        }

        let result = self.set_textures(draw.textures());
        if !self.check(names, "set_textures", result, || {
            format!("{:?}", draw.textures().keys().collect::<Vec<_>>())
        })? {
            return Ok(false);
        }

        let result = self.set_vertex_data(draw.vertex_data());
        if !self.check(names, "set_vertex_data", result, || {
            format!("{:?}", draw.vertex_data())
        })? {
            return Ok(false);
        }

        let result = self.issue_draw(draw.vertex_data());
        self.check(names, "draw", result, || format!("{draw:?}"))
    }

    /// Classify the result of a backend call.
    ///
    /// Returns `Ok(true)` on success and `Ok(false)` after logging a
    /// recoverable failure. Fatal errors are passed on.
    fn check(
        &self,
        (technique, pass): (&str, &str),
        call: &str,
        result: RenderResult<()>,
        args: impl FnOnce() -> String,
    ) -> RenderResult<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                log::debug!("Renderer: {technique}: {pass}: failed to call '{call}': {err}");
                if self.debug {
                    let args = args();
                    if !args.is_empty() {
                        log::debug!("  args = {args}");
                    }
                    log::debug!("  state = {:?}", self);
                }
                Ok(false)
            }
        }
    }

    fn bind_program(&mut self, program: Option<&Arc<Program>>) -> RenderResult<()> {
        match program {
            Some(program) => {
                program.ensure_valid()?;
                self.backend.program_changed(program.gpu())?;
            }
            None => self.backend.program_changed(None)?,
        }
        self.pipeline.program = program.cloned();
        Ok(())
    }

    fn set_render_pipeline(&mut self, pipeline: &RenderPipeline) -> RenderResult<()> {
        if self.pipeline.program_id() != pipeline.program_id() {
            self.bind_program(pipeline.program.as_ref())?;
        }

        let previous = (!self.force_pipeline_update).then(|| self.pipeline.clone());
        for change in pipeline.state_changes(previous.as_ref()) {
            self.backend.render_state_changed(change)?;
            self.pipeline.apply(change);
        }
        self.force_pipeline_update = false;
        Ok(())
    }

    fn set_viewport(&mut self, geometry: ViewportGeometry) -> RenderResult<()> {
        if self.viewport != Some(geometry) {
            self.backend
                .viewport_changed(geometry.x, geometry.y, geometry.width, geometry.height)?;
            self.viewport = Some(geometry);
        }
        Ok(())
    }

    fn reset_uniforms(&mut self, program: ProgramId) {
        if let Some(uniforms) = self.uniforms.get_mut(&program) {
            uniforms.clear();
        }
    }

    /// Apply frame and pass variables to `program`. Failing variables are
    /// logged and skipped.
    fn apply_environment(
        &mut self,
        program: &Arc<Program>,
        ctx: &DrawContext<'_>,
        names: (&str, &str),
    ) -> RenderResult<()> {
        let resolved = ctx.global_state.resolve_uniforms(program.id());
        for (name, value) in resolved.into_iter().chain(ctx.pass_uniforms()) {
            let result = self.set_uniform(program, name, value);
            self.check(names, "set_uniform", result, || format!("{name} = {value}"))?;
        }
        Ok(())
    }

    fn set_uniform(
        &mut self,
        program: &Program,
        name: &str,
        value: &UniformVariable,
    ) -> RenderResult<()> {
        let cached = self.uniforms.entry(program.id()).or_default();
        if cached.get(name) == Some(value) {
            return Ok(());
        }

        let gpu = program
            .gpu()
            .ok_or_else(|| RenderError::Backend(format!("{} is not valid", program.id())))?;
        self.backend.uniform_changed(gpu, name, value)?;
        cached.insert(name.to_string(), value.clone());
        Ok(())
    }

    fn set_textures(&mut self, textures: &BTreeMap<u32, Arc<Texture>>) -> RenderResult<()> {
        let unchanged = textures.len() == self.textures.len()
            && textures
                .iter()
                .zip(&self.textures)
                .all(|((unit, new), (bound_unit, bound))| {
                    unit == bound_unit && Arc::ptr_eq(new, bound)
                });
        if unchanged {
            return Ok(());
        }

        for (unit, texture) in textures {
            let needs_bind = self
                .textures
                .get(unit)
                .map_or(true, |bound| !Arc::ptr_eq(bound, texture));
            if needs_bind {
                texture.ensure_valid()?;
                let gpu = texture
                    .gpu()
                    .ok_or_else(|| RenderError::Backend("texture is not valid".to_string()))?;
                self.backend.texture_changed(*unit, gpu, true)?;
            }
        }

        for (unit, bound) in &self.textures {
            if !textures.contains_key(unit) {
                if let Some(gpu) = bound.gpu() {
                    self.backend.texture_changed(*unit, gpu, false)?;
                }
            }
        }

        self.textures = textures.clone();
        Ok(())
    }

    fn set_vertex_data(&mut self, vertex_data: &Arc<VertexData>) -> RenderResult<()> {
        let unchanged = self
            .vertex_data
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(bound, vertex_data));
        if unchanged {
            return Ok(());
        }

        vertex_data.ensure_valid()?;
        let gpu = vertex_data
            .gpu()
            .ok_or_else(|| RenderError::Backend("vertex data is not valid".to_string()))?;
        self.backend.vertex_data_changed(gpu)?;
        self.vertex_data = Some(vertex_data.clone());
        Ok(())
    }

    fn issue_draw(&mut self, vertex_data: &VertexData) -> RenderResult<()> {
        let vertex_array = vertex_data
            .gpu()
            .ok_or_else(|| RenderError::Backend("vertex data is not valid".to_string()))?;
        self.backend.draw(&DrawCall {
            vertex_array,
            mode: vertex_data.draw_mode(),
            num_vertices: vertex_data.num_vertices(),
            indices: vertex_data.index_info(),
        })
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("pipeline", &self.pipeline)
            .field("viewport", &self.viewport)
            .field("vertex_data", &self.vertex_data)
            .field("textures", &self.textures.keys().collect::<Vec<_>>())
            .field("uniforms", &self.uniforms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        ClearFlags, GpuFrameBuffer, GpuProgram, GpuTexture, GpuVertexArray, NullDevice,
        RenderDevice,
    };
    use crate::buffer::{
        Buffer, BufferKind, DeviceBuffer, UsageHint, VertexBuffer, VertexFormat, VertexLayout,
    };
    use crate::render::pipeline::RenderStateChange;
    use crate::render::{DefaultTechnique, RenderPass, RenderTechnique};
    use crate::resources::{
        DrawMode, File, FrameBuffer, Image, Shader, ShaderType, TextureParameter,
    };
    use crate::target::{RenderTarget, Viewport};
    use glam::{Vec3, Vec4};
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        FrameBuffer(bool),
        Program(bool),
        State(RenderStateChange),
        Viewport(i32, i32, i32, i32),
        VertexData,
        Texture(u32, bool),
        Uniform(String),
        Clear,
        Draw,
    }

    #[derive(Default)]
    struct Recording {
        events: Arc<Mutex<Vec<Event>>>,
        fail_next_draw: Option<RenderError>,
    }

    impl RendererBackend for Recording {
        fn frame_buffer_changed(
            &mut self,
            frame_buffer: Option<&GpuFrameBuffer>,
        ) -> RenderResult<()> {
            self.events.lock().push(Event::FrameBuffer(frame_buffer.is_some()));
            Ok(())
        }

        fn program_changed(&mut self, program: Option<&GpuProgram>) -> RenderResult<()> {
            self.events.lock().push(Event::Program(program.is_some()));
            Ok(())
        }

        fn render_state_changed(&mut self, change: RenderStateChange) -> RenderResult<()> {
            self.events.lock().push(Event::State(change));
            Ok(())
        }

        fn viewport_changed(&mut self, x: i32, y: i32, w: i32, h: i32) -> RenderResult<()> {
            self.events.lock().push(Event::Viewport(x, y, w, h));
            Ok(())
        }

        fn vertex_data_changed(&mut self, _: &GpuVertexArray) -> RenderResult<()> {
            self.events.lock().push(Event::VertexData);
            Ok(())
        }

        fn texture_changed(&mut self, unit: u32, _: &GpuTexture, enable: bool) -> RenderResult<()> {
            self.events.lock().push(Event::Texture(unit, enable));
            Ok(())
        }

        fn uniform_changed(
            &mut self,
            _: &GpuProgram,
            name: &str,
            _: &UniformVariable,
        ) -> RenderResult<()> {
            self.events.lock().push(Event::Uniform(name.to_string()));
            Ok(())
        }

        fn clear(&mut self, _: ClearFlags) -> RenderResult<()> {
            self.events.lock().push(Event::Clear);
            Ok(())
        }

        fn draw(&mut self, _: &DrawCall<'_>) -> RenderResult<()> {
            if let Some(err) = self.fail_next_draw.take() {
                return Err(err);
            }
            self.events.lock().push(Event::Draw);
            Ok(())
        }
    }

    struct Fixture {
        device: Arc<dyn RenderDevice>,
        events: Arc<Mutex<Vec<Event>>>,
        renderer: Renderer,
    }

    impl Fixture {
        fn new(fail_next_draw: Option<RenderError>) -> Self {
            let events = Arc::new(Mutex::new(Vec::new()));
            let backend = Recording {
                events: events.clone(),
                fail_next_draw,
            };
            Self {
                device: Arc::new(NullDevice::new()),
                events,
                renderer: Renderer::new(Box::new(backend), true),
            }
        }

        fn program(&self) -> Arc<Program> {
            let file = File::from_memory("test.vert", "void main() {}");
            let shader = Arc::new(Shader::new(self.device.clone(), ShaderType::Vertex, file));
            Arc::new(Program::new(self.device.clone(), vec![shader]))
        }

        fn vertex_data(&self) -> Arc<VertexData> {
            let mut buffer = DeviceBuffer::new(self.device.clone(), BufferKind::Vertex, false);
            buffer.allocate(36, UsageHint::STATIC_WRITE_ONLY).unwrap();
            let layout =
                VertexLayout::new().with_attribute("in_Position", VertexFormat::Float32x3);
            Arc::new(VertexData::new(
                self.device.clone(),
                VertexBuffer::new(Box::new(buffer), layout),
                None,
                DrawMode::Triangles,
            ))
        }

        fn texture(&self, name: &str) -> Arc<Texture> {
            let image = Arc::new(Image::solid_color([255, 0, 0, 255], name));
            Arc::new(Texture::new(
                self.device.clone(),
                image,
                TextureParameter::default(),
            ))
        }

        fn take_events(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    fn target() -> Arc<RenderTarget> {
        let target = RenderTarget::window();
        Viewport::attach(&target, None, ViewportGeometry::new(0, 0, 640, 480));
        target
    }

    fn count(events: &[Event], wanted: &Event) -> usize {
        events.iter().filter(|event| *event == wanted).count()
    }

    #[test]
    fn test_missing_target_and_viewport() {
        let mut fixture = Fixture::new(None);

        let mut command = RenderCommand::new(None);
        assert_eq!(
            fixture.renderer.render(&mut command),
            Err(RenderError::NoRenderTarget)
        );

        let mut command = RenderCommand::new(Some(RenderTarget::window()));
        assert_eq!(
            fixture.renderer.render(&mut command),
            Err(RenderError::NoViewport)
        );
    }

    #[test]
    fn test_state_is_only_forwarded_on_change() {
        let mut fixture = Fixture::new(None);
        let program = fixture.program();
        let data = fixture.vertex_data();

        let mut command = RenderCommand::new(Some(target()));
        command.add_technique(Arc::new(DefaultTechnique::new(program)));
        for _ in 0..3 {
            command
                .draw_commands_mut()
                .push(Arc::new(DrawCommand::new(data.clone(), Mat4::IDENTITY)));
        }

        let stats = fixture.renderer.render(&mut command).unwrap();
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.passes, 1);
        let first = fixture.take_events();
        assert_eq!(count(&first, &Event::Program(true)), 1);
        assert_eq!(count(&first, &Event::VertexData), 1);
        assert_eq!(count(&first, &Event::Viewport(0, 0, 640, 480)), 1);
        assert_eq!(count(&first, &Event::Clear), 1);
        assert_eq!(
            first
                .iter()
                .filter(|event| matches!(event, Event::State(_)))
                .count(),
            5
        );

        fixture.renderer.render(&mut command).unwrap();
        let second = fixture.take_events();
        assert_eq!(count(&second, &Event::Program(true)), 0);
        assert_eq!(count(&second, &Event::VertexData), 0);
        assert!(!second.iter().any(|event| matches!(event, Event::State(_))));
        assert_eq!(count(&second, &Event::Draw), 3);
    }

    #[test]
    fn test_per_program_uniform_wins() {
        let mut fixture = Fixture::new(None);
        let p = fixture.program();
        let q = fixture.program();
        let data = fixture.vertex_data();

        let mut command = RenderCommand::new(Some(target()));
        command.add_technique(Arc::new(DefaultTechnique::new(p.clone())));
        command
            .global_state_mut()
            .set_shared("u_color", Vec3::new(1.0, 0.0, 0.0));
        command
            .global_state_mut()
            .set_per_program(p.id(), "u_color", Vec3::new(0.0, 1.0, 0.0));

        command
            .draw_commands_mut()
            .push(Arc::new(DrawCommand::new(data.clone(), Mat4::IDENTITY)));
        let mut with_q = DrawCommand::new(data, Mat4::IDENTITY);
        with_q.set_program(Some(q.clone()));
        command.draw_commands_mut().push(Arc::new(with_q));

        let stats = fixture.renderer.render(&mut command).unwrap();
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(
            fixture.renderer.cached_uniform(p.id(), "u_color"),
            Some(&UniformVariable::new(Vec3::new(0.0, 1.0, 0.0)))
        );
        assert_eq!(
            fixture.renderer.cached_uniform(q.id(), "u_color"),
            Some(&UniformVariable::new(Vec3::new(1.0, 0.0, 0.0)))
        );
        assert_eq!(fixture.renderer.bound_program(), Some(q.id()));
    }

    #[test]
    fn test_mvp_uniform() {
        let mut fixture = Fixture::new(None);
        let program = fixture.program();
        let data = fixture.vertex_data();

        let view_projection = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let render_target = RenderTarget::window();
        Viewport::attach(
            &render_target,
            Some(Arc::new(view_projection)),
            ViewportGeometry::new(0, 0, 100, 100),
        );
        let model = Mat4::from_scale(Vec3::splat(2.0));

        let mut command = RenderCommand::new(Some(render_target));
        command.add_technique(Arc::new(DefaultTechnique::new(program.clone())));
        command
            .draw_commands_mut()
            .push(Arc::new(DrawCommand::new(data, model)));
        fixture.renderer.render(&mut command).unwrap();

        let mvp = fixture
            .renderer
            .cached_uniform(program.id(), MVP_UNIFORM)
            .unwrap();
        assert_eq!(mvp.get::<Mat4>().unwrap(), &(view_projection * model));
    }

    #[test]
    fn test_pass_uniforms_are_applied() {
        struct TintPass(Arc<Program>);

        impl RenderPass for TintPass {
            fn name(&self) -> &str {
                "Tint"
            }

            fn set_up(&self, ctx: &mut DrawContext<'_>) -> RenderResult<()> {
                ctx.pipeline.program = Some(self.0.clone());
                ctx.set_shared_uniform("u_tint", Vec4::ONE);
                ctx.set_uniform("u_tint", Vec4::ZERO);
                Ok(())
            }
        }

        struct TintTechnique(Vec<Box<dyn RenderPass>>);

        impl RenderTechnique for TintTechnique {
            fn name(&self) -> &str {
                "Tint"
            }

            fn passes(&self) -> &[Box<dyn RenderPass>] {
                &self.0
            }
        }

        let mut fixture = Fixture::new(None);
        let program = fixture.program();
        let data = fixture.vertex_data();

        let mut command = RenderCommand::new(Some(target()));
        command.add_technique(Arc::new(TintTechnique(vec![Box::new(TintPass(
            program.clone(),
        ))])));
        command
            .draw_commands_mut()
            .push(Arc::new(DrawCommand::new(data, Mat4::IDENTITY)));
        fixture.renderer.render(&mut command).unwrap();

        assert_eq!(
            fixture.renderer.cached_uniform(program.id(), "u_tint"),
            Some(&UniformVariable::new(Vec4::ZERO))
        );
    }

    #[test]
    fn test_texture_bindings() {
        let mut fixture = Fixture::new(None);
        let program = fixture.program();
        let data = fixture.vertex_data();
        let a = fixture.texture("a");
        let b = fixture.texture("b");

        let mut first = DrawCommand::new(data.clone(), Mat4::IDENTITY);
        first.set_texture(0, a.clone());
        let mut second = DrawCommand::new(data.clone(), Mat4::IDENTITY);
        second.set_texture(0, b);
        second.set_texture(1, a.clone());
        let mut third = DrawCommand::new(data.clone(), Mat4::IDENTITY);
        third.set_texture(1, a);
        let fourth = DrawCommand::new(data, Mat4::IDENTITY);

        let mut command = RenderCommand::new(Some(target()));
        command.add_technique(Arc::new(DefaultTechnique::new(program)));
        for draw in [first, second, third, fourth] {
            command.draw_commands_mut().push(Arc::new(draw));
        }
        fixture.renderer.render(&mut command).unwrap();

        let textures: Vec<_> = fixture
            .take_events()
            .into_iter()
            .filter(|event| matches!(event, Event::Texture(..)))
            .collect();
        assert_eq!(
            textures,
            vec![
                Event::Texture(0, true),
                Event::Texture(0, true),
                Event::Texture(1, true),
                Event::Texture(0, false),
                Event::Texture(1, false),
            ]
        );
        assert!(fixture.renderer.bound_textures().is_empty());
    }

    #[test]
    fn test_failed_draw_is_skipped() {
        let mut fixture = Fixture::new(Some(RenderError::Backend("out of memory".into())));
        let program = fixture.program();
        let data = fixture.vertex_data();

        let mut command = RenderCommand::new(Some(target()));
        command.add_technique(Arc::new(DefaultTechnique::new(program)));
        for _ in 0..2 {
            command
                .draw_commands_mut()
                .push(Arc::new(DrawCommand::new(data.clone(), Mat4::IDENTITY)));
        }

        let stats = fixture.renderer.render(&mut command).unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.skipped_draws, 1);
    }

    #[test]
    fn test_fatal_error_aborts_frame() {
        let mut fixture = Fixture::new(Some(RenderError::ContextLost));
        let program = fixture.program();
        let data = fixture.vertex_data();

        let mut command = RenderCommand::new(Some(target()));
        command.add_technique(Arc::new(DefaultTechnique::new(program)));
        command
            .draw_commands_mut()
            .push(Arc::new(DrawCommand::new(data, Mat4::IDENTITY)));

        assert_eq!(
            fixture.renderer.render(&mut command),
            Err(RenderError::ContextLost)
        );
    }

    fn off_screen_target(fixture: &Fixture) -> Arc<RenderTarget> {
        let frame_buffer = Arc::new(FrameBuffer::new(fixture.device.clone(), 64, 32));
        let target = RenderTarget::off_screen(frame_buffer);
        Viewport::attach(&target, None, ViewportGeometry::new(0, 0, 64, 32));
        target
    }

    #[test]
    fn test_off_screen_target_binds_frame_buffer() {
        let mut fixture = Fixture::new(None);
        let program = fixture.program();
        let data = fixture.vertex_data();

        let mut command = RenderCommand::new(Some(off_screen_target(&fixture)));
        command.add_technique(Arc::new(DefaultTechnique::new(program)));
        command
            .draw_commands_mut()
            .push(Arc::new(DrawCommand::new(data, Mat4::IDENTITY)));

        let stats = fixture.renderer.render(&mut command).unwrap();
        assert_eq!(stats.draw_calls, 1);
        let events = fixture.take_events();
        assert_eq!(events.first(), Some(&Event::FrameBuffer(true)));
        assert_eq!(events.last(), Some(&Event::FrameBuffer(false)));
        assert_eq!(count(&events, &Event::Viewport(0, 0, 64, 32)), 1);
        assert_eq!(count(&events, &Event::Draw), 1);

        command.set_target(Some(target()));
        fixture.renderer.render(&mut command).unwrap();
        let events = fixture.take_events();
        assert!(!events
            .iter()
            .any(|event| matches!(event, Event::FrameBuffer(_))));
        assert_eq!(count(&events, &Event::Draw), 1);
    }

    #[test]
    fn test_fatal_error_still_unbinds_frame_buffer() {
        let mut fixture = Fixture::new(Some(RenderError::ContextLost));
        let program = fixture.program();
        let data = fixture.vertex_data();

        let mut command = RenderCommand::new(Some(off_screen_target(&fixture)));
        command.add_technique(Arc::new(DefaultTechnique::new(program)));
        command
            .draw_commands_mut()
            .push(Arc::new(DrawCommand::new(data, Mat4::IDENTITY)));

        assert_eq!(
            fixture.renderer.render(&mut command),
            Err(RenderError::ContextLost)
        );
        let events = fixture.take_events();
        assert_eq!(events.first(), Some(&Event::FrameBuffer(true)));
        assert_eq!(events.last(), Some(&Event::FrameBuffer(false)));
    }

    #[test]
    fn test_draw_without_program_is_skipped() {
        struct NoProgram;

        impl RenderPass for NoProgram {
            fn name(&self) -> &str {
                "NoProgram"
            }

            fn set_up(&self, _ctx: &mut DrawContext<'_>) -> RenderResult<()> {
                Ok(())
            }
        }

        struct Single(Vec<Box<dyn RenderPass>>);

        impl RenderTechnique for Single {
            fn name(&self) -> &str {
                "Single"
            }

            fn passes(&self) -> &[Box<dyn RenderPass>] {
                &self.0
            }
        }

        let mut fixture = Fixture::new(None);
        let data = fixture.vertex_data();
        let mut command = RenderCommand::new(Some(target()));
        command.add_technique(Arc::new(Single(vec![Box::new(NoProgram)])));
        command
            .draw_commands_mut()
            .push(Arc::new(DrawCommand::new(data, Mat4::IDENTITY)));

        let stats = fixture.renderer.render(&mut command).unwrap();
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.skipped_draws, 1);
        assert_eq!(count(&fixture.take_events(), &Event::Draw), 0);
    }
}
