//! Headless demo of the render core
//!
//! Run with:
//!   cargo run --example headless
//!   cargo run --example headless -- --frames 120 --sorted --debug
//!
//! Renders a grid of cubes with two programs through the null backend,
//! loading resources on the resource thread, and prints frame statistics.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use glam::{Mat4, Vec3};
use sequoia_render::{
    DrawCommand, DrawMode, File, Image, IndexType, ProgramSortedDrawCommandList, RenderCommand,
    RenderResource, RenderStats, RenderSystem, RenderSystemKind, RenderSystemOptions,
    ShaderType, TextureParameter, UsageHint, VertexFormat, VertexLayout, WindowHint,
};

const VERTEX_SHADER: &str = "#version 330
in vec3 in_Position;
uniform mat4 u_matMVP;
void main() { gl_Position = u_matMVP * vec4(in_Position, 1.0); }
";

const FRAGMENT_SHADER: &str = "#version 330
uniform vec3 u_color;
out vec4 out_Color;
void main() { out_Color = vec4(u_color, 1.0); }
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliBackend {
    /// No-op backend, nothing touches a GPU.
    #[default]
    Null,
    /// Direct3D 12, reports itself as unsupported.
    D3d12,
}

impl From<CliBackend> for RenderSystemKind {
    fn from(cli: CliBackend) -> Self {
        match cli {
            CliBackend::Null => RenderSystemKind::Null,
            CliBackend::D3d12 => RenderSystemKind::D3D12,
        }
    }
}

/// Sequoia render core headless demo.
#[derive(Parser, Debug)]
#[command(name = "headless", version)]
struct Args {
    /// Render system to use.
    #[arg(long, default_value = "null", value_enum)]
    backend: CliBackend,

    /// Number of frames to render.
    #[arg(long, default_value = "60")]
    frames: u64,

    /// Cubes per grid side.
    #[arg(long, default_value = "8")]
    grid: usize,

    /// Sort draw commands by program.
    #[arg(long)]
    sorted: bool,

    /// Load resources on the calling thread.
    #[arg(long)]
    no_resource_thread: bool,

    /// Log the state of failed backend calls.
    #[arg(long)]
    debug: bool,
}

#[rustfmt::skip]
const CUBE_POSITIONS: [f32; 24] = [
    -0.5, -0.5, -0.5,   0.5, -0.5, -0.5,   0.5,  0.5, -0.5,  -0.5,  0.5, -0.5,
    -0.5, -0.5,  0.5,   0.5, -0.5,  0.5,   0.5,  0.5,  0.5,  -0.5,  0.5,  0.5,
];

#[rustfmt::skip]
const CUBE_INDICES: [u16; 36] = [
    0, 2, 1, 0, 3, 2,   4, 5, 6, 4, 6, 7,   0, 1, 5, 0, 5, 4,
    2, 3, 7, 2, 7, 6,   0, 4, 7, 0, 7, 3,   1, 2, 6, 1, 6, 5,
];

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(err) = run(&args) {
        log::error!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> sequoia_render::RenderResult<()> {
    let mut system = RenderSystem::create(RenderSystemOptions {
        kind: args.backend.into(),
        debug: args.debug,
        resource_thread: !args.no_resource_thread,
        window: WindowHint {
            title: "Sequoia headless".to_string(),
            ..WindowHint::default()
        },
        ..RenderSystemOptions::default()
    })?;

    let vertex = system.create_shader(
        ShaderType::Vertex,
        &File::from_memory("cube.vert", VERTEX_SHADER),
    );
    let red = system.create_program(&[
        vertex.clone(),
        system.create_shader(
            ShaderType::Fragment,
            &File::from_memory("red.frag", FRAGMENT_SHADER),
        ),
    ]);
    let blue = system.create_program(&[
        vertex,
        system.create_shader(
            ShaderType::Fragment,
            &File::from_memory("blue.frag", format!("{FRAGMENT_SHADER}// tinted variant\n")),
        ),
    ]);

    let layout = VertexLayout::new().with_attribute("in_Position", VertexFormat::Float32x3);
    let mut vertices = system.create_vertex_buffer(layout, 8, UsageHint::STATIC_WRITE_ONLY, true)?;
    vertices.write(bytemuck::cast_slice(&CUBE_POSITIONS), 0, false)?;
    let mut indices =
        system.create_index_buffer(IndexType::U16, 36, UsageHint::STATIC_WRITE_ONLY, true)?;
    indices.write(bytemuck::cast_slice(&CUBE_INDICES), 0, false)?;
    let cube = system.create_vertex_data(vertices, Some(indices), DrawMode::Triangles);

    let checker = Arc::new(Image::checkerboard(64, [255; 4], [32, 32, 32, 255]));
    let texture = system.create_texture(&checker, TextureParameter::default());

    let loads = [
        system.load_async(red.clone()),
        system.load_async(blue.clone()),
        system.load_async(texture.clone()),
        system.load_async(cube.clone()),
    ];
    for load in loads {
        load.wait()?;
    }
    log::info!("resources loaded");

    let mut command = if args.sorted {
        RenderCommand::with_draw_commands(
            Some(system.window_target().clone()),
            Box::new(ProgramSortedDrawCommandList::new()),
        )
    } else {
        system.create_render_command()
    };

    let started = Instant::now();
    let mut total = RenderStats::default();
    for frame in 0..args.frames {
        let time = frame as f32 / 60.0;
        command.reset();
        command.add_technique(Arc::new(sequoia_render::DefaultTechnique::new(red.clone())));
        command
            .global_state_mut()
            .set_shared("u_color", Vec3::new(1.0, 0.0, 0.0));
        command
            .global_state_mut()
            .set_per_program(blue.id(), "u_color", Vec3::new(0.0, 0.0, 1.0));
        command.global_state_mut().set_shared("u_time", time);

        for x in 0..args.grid {
            for z in 0..args.grid {
                let offset = Vec3::new(x as f32 * 2.0, 0.0, z as f32 * 2.0);
                let model = Mat4::from_translation(offset) * Mat4::from_rotation_y(time);
                let mut draw = DrawCommand::new(cube.clone(), model);
                if (x + z) % 2 == 1 {
                    draw.set_program(Some(blue.clone()));
                }
                draw.set_texture(0, texture.clone());
                command.draw_commands_mut().push(Arc::new(draw));
            }
        }

        let stats = system.render_one_frame(&mut command)?;
        total.passes += stats.passes;
        total.draw_calls += stats.draw_calls;
        total.skipped_draws += stats.skipped_draws;
    }

    let elapsed = started.elapsed();
    log::info!(
        "rendered {} frames in {:.2?} ({} draw calls, {} skipped)",
        system.frame_count(),
        elapsed,
        total.draw_calls,
        total.skipped_draws
    );
    log::info!(
        "program valid: red={} blue={}, released {} cached resources",
        red.is_valid(),
        blue.is_valid(),
        system.collect_garbage()
    );
    Ok(())
}
