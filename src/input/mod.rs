mod clock;
mod gesture;
mod sampler;


pub use clock::{Clock, FakeClock, MonotonicClock};
pub use gesture::{Button, DeviceEvent, GestureEngine, GestureTiming, HoldState};
pub use sampler::{AnalogReader, InputSampler, PinId, PinReader, RawPinSample};
