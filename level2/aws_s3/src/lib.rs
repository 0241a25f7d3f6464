//! A higher level construct for creating S3 buckets. It covers the two shapes
//! a static site needs: a private bucket that is only readable through a CDN,
//! and a public website-mode bucket that is served directly.

use aws_cfn_stack::{RemovalPolicy, Resource};
use portfolio_lib::{
    get_att, get_ref, sub, to_properties, CfnResource, L0Core, PolicyDocument, PolicyStatement,
    Principal, StrVal, SynthError,
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

mod grants;

pub use grants::{grant_delete, grant_read_write, BUCKET_DELETE_ACTIONS, BUCKET_PUT_ACTIONS, BUCKET_READ_ACTIONS};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PublicAccessBlockConfiguration {
    #[serde(rename = "BlockPublicAcls")]
    pub block_public_acls: bool,
    #[serde(rename = "BlockPublicPolicy")]
    pub block_public_policy: bool,
    #[serde(rename = "IgnorePublicAcls")]
    pub ignore_public_acls: bool,
    #[serde(rename = "RestrictPublicBuckets")]
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlockConfiguration {
    pub fn block_all() -> Self {
        Self {
            block_public_acls: true,
            block_public_policy: true,
            ignore_public_acls: true,
            restrict_public_buckets: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectOwnership {
    BucketOwnerEnforced,
    BucketOwnerPreferred,
    ObjectWriter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipControlsRule {
    #[serde(rename = "ObjectOwnership")]
    pub object_ownership: ObjectOwnership,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipControls {
    #[serde(rename = "Rules")]
    pub rules: Vec<OwnershipControlsRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebsiteConfiguration {
    #[serde(rename = "IndexDocument", skip_serializing_if = "Option::is_none")]
    pub index_document: Option<String>,
    #[serde(rename = "ErrorDocument", skip_serializing_if = "Option::is_none")]
    pub error_document: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CfnBucket {
    #[serde(rename = "BucketName", skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(rename = "PublicAccessBlockConfiguration", skip_serializing_if = "Option::is_none")]
    pub public_access_block_configuration: Option<PublicAccessBlockConfiguration>,
    #[serde(rename = "OwnershipControls", skip_serializing_if = "Option::is_none")]
    pub ownership_controls: Option<OwnershipControls>,
    #[serde(rename = "WebsiteConfiguration", skip_serializing_if = "Option::is_none")]
    pub website_configuration: Option<WebsiteConfiguration>,
}

impl CfnResource for CfnBucket {
    fn type_string(&self) -> &'static str {
        "AWS::S3::Bucket"
    }
    fn properties(&self) -> Result<Value, SynthError> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.bucket_name {
            validate_bucket_name(name)?;
        }
        if let Some(website) = &self.website_configuration {
            if website.index_document.as_deref().unwrap_or_default().is_empty() {
                return Err("website configuration requires an index document".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnBucketPolicy {
    #[serde(rename = "Bucket")]
    pub bucket: StrVal,
    #[serde(rename = "PolicyDocument")]
    pub policy_document: PolicyDocument,
}

impl CfnResource for CfnBucketPolicy {
    fn type_string(&self) -> &'static str {
        "AWS::S3::BucketPolicy"
    }
    fn properties(&self) -> Result<Value, SynthError> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if self.policy_document.statement.is_empty() {
            return Err("bucket policy must contain at least one statement".to_string());
        }
        Ok(())
    }
}

pub fn validate_bucket_name(bucket_name: &str) -> Result<(), String> {
    if bucket_name.len() > 63 || bucket_name.len() < 3 {
        return Err(format!("Invalid bucket name {:?}\nMust be between 3 and 63 characters", bucket_name));
    }
    let valid_char_check = |c: char| -> bool { c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-' };
    if !bucket_name.chars().all(valid_char_check) {
        return Err(format!("Invalid bucket name {:?}\nMay only contain lowercase letters, numbers, dots, and dashes", bucket_name));
    }
    let edges_ok = bucket_name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && bucket_name.ends_with(|c: char| c.is_ascii_alphanumeric());
    if !edges_ok {
        return Err(format!("Invalid bucket name {:?}\nFirst and last character mut be either lowercase letter, or number", bucket_name));
    }
    if bucket_name.contains("..") {
        return Err(format!("Invalid bucket name {:?}\nMay not contain two consecutive dots", bucket_name));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum BucketAccess {
    /// every public access block enabled. Objects are only reachable
    /// through principals granted by policy (eg: a CDN origin access control).
    Private,
    /// website hosting enabled, public access blocks disabled, and a bucket
    /// policy that lets anyone read objects.
    PublicWebsite { index_document: String, error_document: Option<String> },
}

pub struct Input {
    pub access: BucketAccess,
    /// adds a statement denying any request not made over TLS.
    /// Cannot be combined with a public website, since website endpoints are HTTP only.
    pub enforce_ssl: bool,
    pub object_ownership: ObjectOwnership,
    /// by default the bucket is retained when the stack is deleted.
    pub removal_policy: RemovalPolicy,
    /// statements other constructs need on this bucket's policy,
    /// for example a CDN's origin access grant.
    pub extra_policy_statements: Vec<PolicyStatement>,
    /// fill any field that you'd like to customize. Fields this construct
    /// manages (public access block, ownership, website) are overwritten.
    pub extra_bucket_settings: CfnBucket,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            access: BucketAccess::Private,
            enforce_ssl: false,
            object_ownership: ObjectOwnership::BucketOwnerEnforced,
            removal_policy: RemovalPolicy::Retain,
            extra_policy_statements: vec![],
            extra_bucket_settings: Default::default(),
        }
    }
}

/// logical ids of what was created, plus helpers to reference them.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketOutputs {
    pub logical_bucket_name: String,
    pub logical_policy_name: Option<String>,
}

impl BucketOutputs {
    pub fn for_logical_name(logical_bucket_name: &str) -> Self {
        Self {
            logical_bucket_name: logical_bucket_name.to_string(),
            logical_policy_name: None,
        }
    }
    pub fn bucket_name(&self) -> Value {
        get_ref(&self.logical_bucket_name)
    }
    pub fn arn(&self) -> Value {
        get_att(&self.logical_bucket_name, "Arn")
    }
    pub fn arn_for_objects(&self, pattern: &str) -> Value {
        sub(&format!("${{{}.Arn}}/{}", self.logical_bucket_name, pattern))
    }
    pub fn regional_domain_name(&self) -> Value {
        get_att(&self.logical_bucket_name, "RegionalDomainName")
    }
    pub fn website_url(&self) -> Value {
        get_att(&self.logical_bucket_name, "WebsiteURL")
    }
}

pub fn config(myinput: Input, stackinp: &mut aws_cfn_stack::Input, l0core: &mut L0Core) -> Result<BucketOutputs, SynthError> {
    let user_mod_name = l0core.users_module_name();
    let mut outputs = BucketOutputs::for_logical_name(&l0core.logical_name(""));

    let mut bucket = myinput.extra_bucket_settings;
    bucket.ownership_controls = Some(OwnershipControls {
        rules: vec![OwnershipControlsRule { object_ownership: myinput.object_ownership }],
    });
    let mut statements = vec![];
    match &myinput.access {
        BucketAccess::Private => {
            bucket.public_access_block_configuration = Some(PublicAccessBlockConfiguration::block_all());
            bucket.website_configuration = None;
            if myinput.extra_policy_statements.iter().any(PolicyStatement::is_public_allow) {
                return Err(SynthError::invalid_input(
                    &user_mod_name,
                    "a private bucket cannot carry a policy statement granting public access",
                ));
            }
        }
        BucketAccess::PublicWebsite { index_document, error_document } => {
            if myinput.enforce_ssl {
                return Err(SynthError::invalid_input(
                    &user_mod_name,
                    "enforce_ssl cannot be used on a public website bucket; website endpoints only serve HTTP",
                ));
            }
            bucket.public_access_block_configuration = Some(PublicAccessBlockConfiguration::default());
            bucket.website_configuration = Some(WebsiteConfiguration {
                index_document: Some(index_document.clone()),
                error_document: error_document.clone(),
            });
            statements.push(
                PolicyStatement::allow(["s3:GetObject"])
                    .by(Principal::Any)
                    .on(outputs.arn_for_objects("*")),
            );
        }
    }
    if myinput.enforce_ssl {
        statements.push(
            PolicyStatement::deny(["s3:*"])
                .by(Principal::Aws("*".into()))
                .on(outputs.arn())
                .on(outputs.arn_for_objects("*"))
                .when("Bool", "aws:SecureTransport", "false"),
        );
    }
    statements.extend(myinput.extra_policy_statements);

    debug!(logical_id = %outputs.logical_bucket_name, access = ?myinput.access, "bucket");
    stackinp.resources.push(
        Resource::new(outputs.logical_bucket_name.clone(), bucket).with_removal_policy(myinput.removal_policy),
    );

    if !statements.is_empty() {
        let logical_policy_name = l0core.logical_name("Policy");
        let bucket_policy = CfnBucketPolicy {
            bucket: outputs.bucket_name().into(),
            policy_document: PolicyDocument::new(statements),
        };
        stackinp.resources.push(Resource::new(logical_policy_name.clone(), bucket_policy));
        outputs.logical_policy_name = Some(logical_policy_name);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(module: &str, input: Input) -> (Result<BucketOutputs, SynthError>, aws_cfn_stack::Input) {
        let mut core = L0Core::new();
        core.set_current_module(module);
        let mut stack = aws_cfn_stack::Input::default();
        let out = config(input, &mut stack, &mut core);
        (out, stack)
    }

    fn props(stack: &aws_cfn_stack::Input, name: &str) -> Value {
        let resource = stack.resources.iter().find(|r| r.name == name).unwrap();
        resource.properties.properties().unwrap()
    }

    #[test]
    fn private_bucket_blocks_everything_and_enforces_ssl() {
        let (out, stack) = run("site_bucket", Input { enforce_ssl: true, ..Default::default() });
        let out = out.unwrap();
        assert_eq!(out.logical_bucket_name, "SiteBucket");
        assert_eq!(out.logical_policy_name.as_deref(), Some("SiteBucketPolicy"));
        let bucket = props(&stack, "SiteBucket");
        assert_eq!(
            bucket["PublicAccessBlockConfiguration"],
            json!({ "BlockPublicAcls": true, "BlockPublicPolicy": true, "IgnorePublicAcls": true, "RestrictPublicBuckets": true })
        );
        assert_eq!(bucket["OwnershipControls"]["Rules"][0]["ObjectOwnership"], "BucketOwnerEnforced");
        assert!(bucket.get("WebsiteConfiguration").is_none());
        let policy = props(&stack, "SiteBucketPolicy");
        let statement = &policy["PolicyDocument"]["Statement"][0];
        assert_eq!(statement["Effect"], "Deny");
        assert_eq!(statement["Condition"], json!({ "Bool": { "aws:SecureTransport": "false" } }));
    }

    #[test]
    fn private_bucket_without_statements_has_no_policy() {
        let (out, stack) = run("logs", Input::default());
        assert_eq!(out.unwrap().logical_policy_name, None);
        assert_eq!(stack.resources.len(), 1);
    }

    #[test]
    fn public_website_is_readable_by_anyone() {
        let input = Input {
            access: BucketAccess::PublicWebsite { index_document: "index.html".into(), error_document: None },
            object_ownership: ObjectOwnership::BucketOwnerPreferred,
            ..Default::default()
        };
        let (out, stack) = run("preview_bucket", input);
        out.unwrap();
        let bucket = props(&stack, "PreviewBucket");
        assert_eq!(bucket["WebsiteConfiguration"], json!({ "IndexDocument": "index.html" }));
        assert_eq!(
            bucket["PublicAccessBlockConfiguration"],
            json!({ "BlockPublicAcls": false, "BlockPublicPolicy": false, "IgnorePublicAcls": false, "RestrictPublicBuckets": false })
        );
        let policy = props(&stack, "PreviewBucketPolicy");
        assert_eq!(
            policy["PolicyDocument"]["Statement"][0],
            json!({
                "Effect": "Allow",
                "Principal": "*",
                "Action": ["s3:GetObject"],
                "Resource": [{ "Fn::Sub": "${PreviewBucket.Arn}/*" }]
            })
        );
        assert_eq!(policy["Bucket"], json!({ "Ref": "PreviewBucket" }));
    }

    #[test]
    fn private_bucket_rejects_public_statements() {
        let input = Input {
            extra_policy_statements: vec![PolicyStatement::allow(["s3:GetObject"]).by(Principal::Any).on("*")],
            ..Default::default()
        };
        let (out, _) = run("site_bucket", input);
        assert!(out.unwrap_err().to_string().contains("cannot carry a policy statement granting public access"));
    }

    #[test]
    fn website_cannot_enforce_ssl() {
        let input = Input {
            access: BucketAccess::PublicWebsite { index_document: "index.html".into(), error_document: None },
            enforce_ssl: true,
            ..Default::default()
        };
        let (out, _) = run("preview_bucket", input);
        assert!(out.is_err());
    }

    #[test]
    fn removal_policy_is_attached() {
        let (_, stack) = run("site_bucket", Input { removal_policy: RemovalPolicy::Delete, ..Default::default() });
        assert_eq!(stack.resources[0].removal_policy, Some(RemovalPolicy::Delete));
    }

    #[test]
    fn bucket_names_are_validated() {
        assert!(validate_bucket_name("codebycarson-site").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("Upper").is_err());
        assert!(validate_bucket_name("-dash").is_err());
        assert!(validate_bucket_name("two..dots").unwrap_err().contains("two consecutive dots"));
        let bucket = CfnBucket { bucket_name: Some("Bad_Name".into()), ..Default::default() };
        assert!(bucket.validate().is_err());
    }
}
