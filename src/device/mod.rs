pub mod device;
pub mod session;

pub use device::{Device, DeviceAction, DeviceError, DeviceSnapshot};
pub use session::DeviceSession;
