//! Shared building blocks for the level2 constructs: the synth core that every
//! construct's `config` receives, CloudFormation value helpers, IAM policy
//! documents, and the resource trait the stack serializes.

pub mod error;
pub mod level0;
pub mod policy;
pub mod resource;
pub mod values;

pub use error::SynthError;
pub use level0::L0Core;
pub use policy::{Effect, PolicyDocument, PolicyStatement, Principal};
pub use resource::{to_properties, CfnResource};
pub use values::{get_att, get_ref, pascal_case, sub, StrVal};
