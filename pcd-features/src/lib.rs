pub mod assembler;
pub mod descriptor;
pub mod provider;
pub mod schedule;

pub use assembler::{AssembledFeatures, FeatureAssembler};
pub use descriptor::Descriptor;
pub use provider::{CovarianceDescriptorProvider, DescriptorProvider};
pub use schedule::{DescriptorSchedule, DescriptorSpec};
