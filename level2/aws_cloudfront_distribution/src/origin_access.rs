use aws_s3::BucketOutputs;
use portfolio_lib::{to_properties, CfnResource, PolicyStatement, Principal, SynthError};
use serde::Serialize;
use serde_json::Value;

/// OAC names must be unique per account and at most 64 characters.
const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginAccessControlConfig {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "OriginAccessControlOriginType")]
    pub origin_type: String,
    #[serde(rename = "SigningBehavior")]
    pub signing_behavior: String,
    #[serde(rename = "SigningProtocol")]
    pub signing_protocol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnOriginAccessControl {
    #[serde(rename = "OriginAccessControlConfig")]
    pub origin_access_control_config: OriginAccessControlConfig,
}

impl CfnOriginAccessControl {
    /// sign every request to an S3 origin with sigv4.
    pub fn s3(name: String) -> Self {
        Self {
            origin_access_control_config: OriginAccessControlConfig {
                name,
                description: None,
                origin_type: "s3".to_string(),
                signing_behavior: "always".to_string(),
                signing_protocol: "sigv4".to_string(),
            },
        }
    }
}

impl CfnResource for CfnOriginAccessControl {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::OriginAccessControl"
    }
    fn properties(&self) -> Result<Value, SynthError> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        let name = &self.origin_access_control_config.name;
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(format!("origin access control name {:?} must be 1 to {MAX_NAME_LEN} characters", name));
        }
        Ok(())
    }
}

/// `{logical id}-{hash}`, where the hash covers the seed so two stacks in one
/// account don't collide on the same logical id.
pub fn origin_access_control_name(logical_id: &str, seed: &str) -> String {
    let hash = adler::adler32_slice(format!("{seed}/{logical_id}").as_bytes());
    let suffix = format!("-{:08x}", hash);
    let mut prefix = logical_id.to_string();
    prefix.truncate(MAX_NAME_LEN - suffix.len());
    format!("{prefix}{suffix}")
}

/// the bucket policy statement that lets exactly one distribution read objects
/// through origin access control.
pub fn origin_access_read_statement(bucket: &BucketOutputs, distribution_arn: Value) -> PolicyStatement {
    PolicyStatement::allow(["s3:GetObject"])
        .by(Principal::Service("cloudfront.amazonaws.com".to_string()))
        .on(bucket.arn_for_objects("*"))
        .when("StringEquals", "AWS:SourceArn", distribution_arn)
}
