/// fxgu Core Library - fixed-point transform builders and text formatting
///
/// Builds 16.16 fixed-point matrices in the console's split integer/fraction
/// layout, provides the sine table they read angles through, and a bounded
/// `sprintf` for debug text.

pub mod fixed;
pub mod printf;
pub mod projection;
pub mod transform;
pub mod trig;

// Re-export commonly used types
pub use fixed::{to_fixed, Mtx};
pub use printf::{vsprintf, Arg, FormatError};
pub use projection::{ortho, perspective, Camera, ProjectionMode};
pub use transform::{RotationState, Transform};
pub use trig::{SineTable, Trig};
