//! Platform layer: the winit window and the Vulkan surface created from it.

mod window;

pub use window::{Surface, Window};

// Re-export winit types the demo needs
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
