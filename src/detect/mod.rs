mod backend;
mod backends;
mod labels;
mod nms;
mod person;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{CpuBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use labels::{Labels, COCO_LABELS};
pub use nms::non_max_suppression;
pub use person::{DetectorConfig, PersonDetector, TargetSelection};
pub use registry::BackendRegistry;
pub use result::{Detection, RawDetection};
