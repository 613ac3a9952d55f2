//! 2D draw-command streams.
//!
//! Native code queues drawing instructions as a linked list of fixed-layout
//! records in linear memory ([`wire`]). The [`DrawInterpreter`] walks such a
//! list and replays it onto a [`Surface2d`], keeping a table of gradients,
//! pixel buffers and images that instructions refer to by handle.

pub mod builder;
pub mod instruction;
pub mod interpreter;
pub mod recording;
pub mod resources;
pub mod surface;
pub mod wire;

pub use builder::{params_addr, DrawSeqBuilder};
pub use instruction::Instruction;
pub use interpreter::{DrawError, DrawInterpreter, ImageDataMode};
pub use recording::{
    PropValue, RecordedGradient, RecordedImage, RecordedPaint, RecordingSurface, SurfaceCall,
};
pub use resources::{ImageBuffer, Resource, ResourceKind, ResourceTable};
pub use surface::{DirtyRect, ImageData, ImagePlacement, Matrix, Paint, Surface2d, TextMetrics};
pub use wire::{rgba_to_css, Opcode};
