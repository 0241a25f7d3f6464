use serde::Serialize;
use serde_json::Value;

use crate::SynthError;

/// Anything that can be placed in the `Resources` section of a template.
pub trait CfnResource {
    /// the CloudFormation type, eg: `AWS::S3::Bucket`
    fn type_string(&self) -> &'static str;

    fn properties(&self) -> Result<Value, SynthError>;

    /// checked by the stack before the resource is written to the template.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// serializes a typed property struct into the `Properties` object.
pub fn to_properties<T: Serialize>(props: &T) -> Result<Value, SynthError> {
    Ok(serde_json::to_value(props)?)
}
