mod builder;
mod device;
mod mock;
mod negotiator;
mod still;
mod stream;
#[cfg(all(target_os = "linux", feature = "camera"))]
mod v4l2;

pub use builder::CapabilityNegotiatorBuilder;
pub use device::{
    CameraDevice, DeviceKind, Facing, MediaDevices, StreamConstraints, TrackCapabilities,
    VideoTrack, ZoomRange,
};
pub use mock::MockMediaDevices;
pub use negotiator::CapabilityNegotiator;
pub use still::StillImageDevices;
pub use stream::MediaStream;
#[cfg(all(target_os = "linux", feature = "camera"))]
pub use v4l2::GstMediaDevices;
