//! Rendering: frame snapshot → universe-addressed DMX packets → outputs.

mod packet;
mod renderer;

pub use packet::{build_render_packet, RenderPacket};
pub use renderer::{Output, Renderer};
