use std::collections::HashSet;

use portfolio_lib::{to_properties, CfnResource, StrVal, SynthError};
use serde::Serialize;
use serde_json::Value;

/// caching optimized:
/// https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-cache-policies.html#managed-cache-caching-optimized
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

/// managed SecurityHeadersPolicy (HSTS, X-Content-Type-Options, X-Frame-Options, ...)
/// https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-response-headers-policies.html
pub const SECURITY_HEADERS_POLICY_ID: &str = "67f7725c-6f97-4210-82d7-5512b31e9d03";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewerProtocolPolicy {
    #[serde(rename = "allow-all")]
    AllowAll,
    #[serde(rename = "redirect-to-https")]
    RedirectToHttps,
    #[serde(rename = "https-only")]
    HttpsOnly,
}

/// Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SecurityPolicyProtocol {
    #[serde(rename = "SSLv3")]
    SslV3,
    #[serde(rename = "TLSv1")]
    TlsV1,
    #[serde(rename = "TLSv1_2016")]
    TlsV1_2016,
    #[serde(rename = "TLSv1.1_2016")]
    TlsV1_1_2016,
    #[serde(rename = "TLSv1.2_2018")]
    TlsV1_2_2018,
    #[serde(rename = "TLSv1.2_2019")]
    TlsV1_2_2019,
    #[serde(rename = "TLSv1.2_2021")]
    TlsV1_2_2021,
}

impl SecurityPolicyProtocol {
    pub fn is_at_least_tls_1_2(&self) -> bool {
        *self >= SecurityPolicyProtocol::TlsV1_2_2018
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct S3OriginConfig {
    /// must be present and empty when the origin uses origin access control.
    #[serde(rename = "OriginAccessIdentity")]
    pub origin_access_identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Origin {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "DomainName")]
    pub domain_name: StrVal,
    #[serde(rename = "S3OriginConfig", skip_serializing_if = "Option::is_none")]
    pub s3_origin_config: Option<S3OriginConfig>,
    #[serde(rename = "OriginAccessControlId", skip_serializing_if = "Option::is_none")]
    pub origin_access_control_id: Option<StrVal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultCacheBehavior {
    #[serde(rename = "TargetOriginId")]
    pub target_origin_id: String,
    #[serde(rename = "ViewerProtocolPolicy")]
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    #[serde(rename = "CachePolicyId")]
    pub cache_policy_id: String,
    #[serde(rename = "ResponseHeadersPolicyId", skip_serializing_if = "Option::is_none")]
    pub response_headers_policy_id: Option<String>,
    #[serde(rename = "Compress")]
    pub compress: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomErrorResponse {
    #[serde(rename = "ErrorCode")]
    pub error_code: u16,
    #[serde(rename = "ResponseCode", skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    #[serde(rename = "ResponsePagePath", skip_serializing_if = "Option::is_none")]
    pub response_page_path: Option<String>,
    /// seconds
    #[serde(rename = "ErrorCachingMinTTL", skip_serializing_if = "Option::is_none")]
    pub error_caching_min_ttl: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewerCertificate {
    #[serde(rename = "AcmCertificateArn")]
    pub acm_certificate_arn: StrVal,
    #[serde(rename = "MinimumProtocolVersion")]
    pub minimum_protocol_version: SecurityPolicyProtocol,
    #[serde(rename = "SslSupportMethod")]
    pub ssl_support_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionConfig {
    #[serde(rename = "Enabled")]
    pub enabled: bool,
    #[serde(rename = "Comment", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "Aliases", skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(rename = "DefaultRootObject", skip_serializing_if = "Option::is_none")]
    pub default_root_object: Option<String>,
    #[serde(rename = "HttpVersion")]
    pub http_version: String,
    #[serde(rename = "IPV6Enabled")]
    pub ipv6_enabled: bool,
    #[serde(rename = "Origins")]
    pub origins: Vec<Origin>,
    #[serde(rename = "DefaultCacheBehavior")]
    pub default_cache_behavior: DefaultCacheBehavior,
    #[serde(rename = "CustomErrorResponses", skip_serializing_if = "Vec::is_empty")]
    pub custom_error_responses: Vec<CustomErrorResponse>,
    #[serde(rename = "ViewerCertificate", skip_serializing_if = "Option::is_none")]
    pub viewer_certificate: Option<ViewerCertificate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnDistribution {
    #[serde(rename = "DistributionConfig")]
    pub distribution_config: DistributionConfig,
}

impl CfnResource for CfnDistribution {
    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::Distribution"
    }
    fn properties(&self) -> Result<Value, SynthError> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        let config = &self.distribution_config;
        if config.origins.is_empty() {
            return Err("a distribution needs at least one origin".to_string());
        }
        let target = &config.default_cache_behavior.target_origin_id;
        if !config.origins.iter().any(|o| &o.id == target) {
            return Err(format!("default cache behavior targets unknown origin '{target}'"));
        }
        if !config.aliases.is_empty() && config.viewer_certificate.is_none() {
            return Err("custom domain names require a viewer certificate".to_string());
        }
        let mut seen = HashSet::new();
        for response in config.custom_error_responses.iter() {
            if !seen.insert(response.error_code) {
                return Err(format!("duplicate custom error response for {}", response.error_code));
            }
        }
        Ok(())
    }
}
