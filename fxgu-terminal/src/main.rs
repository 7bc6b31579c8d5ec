/// fxgu Terminal Demo - Rotating Cube
///
/// Every matrix on screen is built by the fixed-point builders in
/// `fxgu-core`; the status line goes through its `sprintf`.
/// Controls:
///   - WASD / Arrow Keys: Rotate the cube
///   - E/R: Roll rotation
///   - Q/ESC: Quit
use anyhow::{ensure, Context, Result};
use clap::Parser;
use fxgu_core::{trig::degrees_to_angle, Camera, ProjectionMode};
use fxgu_terminal::{Mesh, TerminalApp};

#[derive(Parser, Debug)]
#[command(about = "Spinning cube rendered through 16.16 fixed-point transforms", version)]
struct Args {
    /// Vertical field of view in degrees
    #[arg(long, default_value_t = 45.0)]
    fov: f32,

    /// Near clip distance
    #[arg(long, default_value_t = 0.1)]
    near: f32,

    /// Far clip distance
    #[arg(long, default_value_t = 100.0)]
    far: f32,

    /// Uniform scale applied to the projection matrix
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Distance from the eye to the cube centre
    #[arg(long, default_value_t = 5.0)]
    distance: f32,

    /// Edge length of the cube
    #[arg(long, default_value_t = 2.0)]
    size: f32,

    /// Use an orthographic projection instead of perspective
    #[arg(long)]
    ortho: bool,

    /// Exit after this many frames; 0 runs until Q is pressed
    #[arg(long, default_value_t = 0)]
    frames: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::init();

    // The matrix builders take these as given, so reject nonsense up front
    ensure!(args.far != args.near, "near and far clip distances must differ");
    ensure!(args.fov > 0.0 && args.fov < 180.0, "fov must be between 0 and 180 degrees (got {})", args.fov);

    let camera = Camera {
        fovy: degrees_to_angle(args.fov),
        near: args.near,
        far: args.far,
        scale: args.scale,
        distance: args.distance,
        mode: if args.ortho {
            ProjectionMode::Orthographic
        } else {
            ProjectionMode::Perspective
        },
        ..Camera::default()
    };
    log::info!("starting with {camera:?}");

    let mut app =
        TerminalApp::new(Mesh::cube(args.size), camera, args.frames).context("querying terminal size")?;
    app.run().context("running terminal renderer")?;

    println!("Thank you for using the fxgu terminal renderer!");
    Ok(())
}
