mod capture;
mod window;
mod classify;
mod monitor;

pub use capture::*;
pub use window::*;
pub use classify::*;
pub use monitor::*;
