// Purpose - the output side: clock, master bus, devices

pub mod bus;
pub mod clock;
pub mod device;
pub mod offline;

pub use bus::{BusRenderer, OutputBus};
pub use clock::AudioClock;
pub use device::{AudioBackend, CpalBackend, DeviceManager, StreamInfo};
pub use offline::{OfflineBackend, OfflineHandle};
