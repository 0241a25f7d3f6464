//! A CloudFront distribution in front of a private S3 bucket, reached through
//! origin access control.

use aws_cfn_stack::{RemovalPolicy, Resource};
use aws_s3::BucketOutputs;
use portfolio_lib::level0::logical_name_for;
use portfolio_lib::{get_att, get_ref, sub, L0Core, StrVal, SynthError};
use serde_json::Value;
use tracing::debug;

mod origin_access;
mod types;

pub use origin_access::{
    origin_access_control_name, origin_access_read_statement, CfnOriginAccessControl, OriginAccessControlConfig,
};
pub use types::*;

const DEFAULT_ORIGIN_ID: &str = "origin0";

pub struct Input {
    /// by default we create the distribution enabled and ready to use.
    pub disabled: bool,

    pub comment: Option<String>,

    /// the bucket to serve. It should be private: reads are granted to this
    /// distribution only, via [`origin_access_read_statement`].
    pub origin_bucket: Option<BucketOutputs>,

    /// custom domain names. Requires `certificate_arn`.
    pub aliases: Vec<String>,

    pub certificate_arn: Option<StrVal>,

    /// anything below TLS 1.2 is rejected.
    pub minimum_protocol_version: SecurityPolicyProtocol,

    /// By default set to redirect-to-https.
    pub viewer_protocol_policy: ViewerProtocolPolicy,

    pub compress: bool,

    pub default_root_object: Option<String>,

    pub cache_policy_id: String,

    pub response_headers_policy_id: Option<String>,

    pub error_responses: Vec<CustomErrorResponse>,

    /// used to make the origin access control name unique in the account.
    pub name_seed: String,

    pub removal_policy: Option<RemovalPolicy>,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            disabled: false,
            comment: None,
            origin_bucket: None,
            aliases: vec![],
            certificate_arn: None,
            minimum_protocol_version: SecurityPolicyProtocol::TlsV1_2_2021,
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            compress: true,
            default_root_object: None,
            cache_policy_id: CACHING_OPTIMIZED_POLICY_ID.to_string(),
            response_headers_policy_id: None,
            error_responses: vec![],
            name_seed: String::new(),
            removal_policy: None,
        }
    }
}

/// rewrites 403 and 404 to `page_path` with a 200 so client side routing
/// can handle unknown paths. Not cached, so new deploys show up immediately.
pub fn spa_fallback(page_path: &str) -> Vec<CustomErrorResponse> {
    [403, 404]
        .into_iter()
        .map(|error_code| CustomErrorResponse {
            error_code,
            response_code: Some(200),
            response_page_path: Some(page_path.to_string()),
            error_caching_min_ttl: Some(0),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionOutputs {
    pub logical_distr_name: String,
    pub logical_oac_name: String,
}

impl DistributionOutputs {
    /// the outputs a distribution created by `module_name` will have.
    /// Lets a bucket policy reference a distribution that is configured later.
    pub fn for_module(module_name: &str) -> Self {
        Self {
            logical_distr_name: logical_name_for(module_name, ""),
            logical_oac_name: logical_name_for(module_name, "OriginAccessControl"),
        }
    }

    pub fn distribution_id(&self) -> Value {
        get_ref(&self.logical_distr_name)
    }

    pub fn domain_name(&self) -> Value {
        get_att(&self.logical_distr_name, "DomainName")
    }

    /// CloudFront is global, so the ARN has no region.
    pub fn arn(&self, partition: &str, account: &str) -> Value {
        sub(&format!(
            "arn:{}:cloudfront::{}:distribution/${{{}}}",
            partition, account, self.logical_distr_name
        ))
    }
}

pub fn config(myinput: Input, stackinp: &mut aws_cfn_stack::Input, l0core: &mut L0Core) -> Result<DistributionOutputs, SynthError> {
    let user_mod_name = l0core.users_module_name();
    let invalid = |msg: &str| SynthError::invalid_input(&user_mod_name, msg);

    let bucket = myinput.origin_bucket.ok_or_else(|| invalid("an origin bucket is required"))?;
    if !myinput.minimum_protocol_version.is_at_least_tls_1_2() {
        return Err(invalid("minimum protocol version must be TLS 1.2 or newer"));
    }
    if !myinput.aliases.is_empty() && myinput.certificate_arn.is_none() {
        return Err(invalid("custom domain names require a certificate"));
    }
    if myinput.viewer_protocol_policy == ViewerProtocolPolicy::AllowAll {
        l0core.compiler_warning("viewer protocol policy allow-all serves content over plain HTTP");
    }

    let outputs = DistributionOutputs::for_module(&user_mod_name);
    let oac = CfnOriginAccessControl::s3(origin_access_control_name(&outputs.logical_oac_name, &myinput.name_seed));
    stackinp.resources.push(Resource::new(outputs.logical_oac_name.clone(), oac));

    let origin = Origin {
        id: DEFAULT_ORIGIN_ID.to_string(),
        domain_name: bucket.regional_domain_name().into(),
        s3_origin_config: Some(S3OriginConfig { origin_access_identity: String::new() }),
        origin_access_control_id: Some(get_att(&outputs.logical_oac_name, "Id").into()),
    };
    let viewer_certificate = myinput.certificate_arn.map(|arn| ViewerCertificate {
        acm_certificate_arn: arn,
        minimum_protocol_version: myinput.minimum_protocol_version,
        ssl_support_method: "sni-only".to_string(),
    });
    let distribution = CfnDistribution {
        distribution_config: DistributionConfig {
            enabled: !myinput.disabled,
            comment: myinput.comment,
            aliases: myinput.aliases,
            default_root_object: myinput.default_root_object,
            http_version: "http2".to_string(),
            ipv6_enabled: true,
            origins: vec![origin],
            default_cache_behavior: DefaultCacheBehavior {
                target_origin_id: DEFAULT_ORIGIN_ID.to_string(),
                viewer_protocol_policy: myinput.viewer_protocol_policy,
                cache_policy_id: myinput.cache_policy_id,
                response_headers_policy_id: myinput.response_headers_policy_id,
                compress: myinput.compress,
            },
            custom_error_responses: myinput.error_responses,
            viewer_certificate,
        },
    };
    debug!(logical_id = %outputs.logical_distr_name, origin = %bucket.logical_bucket_name, "distribution");
    let mut resource = Resource::new(outputs.logical_distr_name.clone(), distribution);
    resource.removal_policy = myinput.removal_policy;
    stackinp.resources.push(resource);
    Ok(outputs)
}
