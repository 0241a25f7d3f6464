//! This module defines and creates an AWS ACM certificate. This module only works if the following is true:
//! - The domain you'd like to get a certificate for is hosted in Amazon Route 53
//! - The domain resides in your AWS account.
//! - You are using DNS validation.

use aws_cfn_stack::{RemovalPolicy, Resource};
use aws_regions::CLOUDFRONT_CERTIFICATE_REGION;
use aws_route53::HostedZone;
use portfolio_lib::{get_ref, to_properties, CfnResource, L0Core, SynthError};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationMethod {
    #[serde(rename = "DNS")]
    Dns,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainValidationOption {
    #[serde(rename = "DomainName")]
    pub domain_name: String,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnCertificate {
    #[serde(rename = "DomainName")]
    pub domain_name: String,
    #[serde(rename = "SubjectAlternativeNames", skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
    #[serde(rename = "ValidationMethod")]
    pub validation_method: ValidationMethod,
    #[serde(rename = "DomainValidationOptions")]
    pub domain_validation_options: Vec<DomainValidationOption>,
}

impl CfnResource for CfnCertificate {
    fn type_string(&self) -> &'static str {
        "AWS::CertificateManager::Certificate"
    }
    fn properties(&self) -> Result<Value, SynthError> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        validate_domain_name(&self.domain_name)?;
        for san in self.subject_alternative_names.iter() {
            validate_domain_name(san)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Input {
    /// the domain you're requesting a certificate for. Must be fully qualified. Can have 1 optional wildcard.
    /// Examples of valid values:
    /// - www.mysite.com
    /// - multiple.sub.domains.mysite.com
    /// - mysite.com
    /// - *.mysite.com
    /// Examples of invalid values:
    /// - *.something.*.mysite.com
    /// - cannotendwithdot.com.
    pub domain_name: String,

    /// same rules as `domain_name`.
    pub subject_alternative_names: Vec<String>,

    /// The hosted zone every name is validated in. All names must be inside it.
    pub hosted_zone: Option<HostedZone>,

    /// set when the certificate will be attached to a CloudFront distribution.
    /// CloudFront only reads certificates from us-east-1, so any other
    /// `region` is rejected.
    pub for_cloudfront: bool,

    /// region of the stack this certificate is deployed in.
    pub region: String,

    pub removal_policy: Option<RemovalPolicy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertOutputs {
    /// this is the logical name in cloudformation for your cert.
    /// Reference this name in other resources that rely on it,
    /// for example, perhaps a cloudfront distribution that wants to reference the cert ARN.
    pub logical_cert_name: String,
}

impl CertOutputs {
    /// `Ref` on a certificate resolves to its ARN.
    pub fn arn(&self) -> Value {
        get_ref(&self.logical_cert_name)
    }
}

pub fn validate_domain_name(domain_name: &str) -> Result<(), String> {
    if domain_name.is_empty() {
        return Err("Must provide a domain name".to_string());
    }
    if domain_name.ends_with('.') {
        return Err(format!("{} is invalid. Domain names cannot end with a dot.", domain_name));
    }
    if !domain_name.contains('.') {
        return Err(format!("{} is invalid. Domain names must be fully qualified.", domain_name));
    }
    if domain_name.contains('*') {
        if domain_name.matches('*').count() > 1 {
            return Err(format!("Must only provide 1 wildcard. {} is invalid.", domain_name));
        }
        if !domain_name.starts_with("*.") {
            return Err(format!("If using a wildcard, it must be the first component of your domain, eg: \"*.something.com\". {} is invalid.", domain_name));
        }
    }
    Ok(())
}

pub fn config(self_input: Input, stackinp: &mut aws_cfn_stack::Input, l0core: &mut L0Core) -> Result<CertOutputs, SynthError> {
    let user_mod_name = l0core.users_module_name();
    let invalid = |msg: String| SynthError::invalid_input(&user_mod_name, msg);

    validate_domain_name(&self_input.domain_name).map_err(&invalid)?;
    for san in self_input.subject_alternative_names.iter() {
        validate_domain_name(san).map_err(&invalid)?;
    }
    if self_input.for_cloudfront && self_input.region != CLOUDFRONT_CERTIFICATE_REGION {
        return Err(invalid(format!(
            "certificates used by CloudFront must be issued in {CLOUDFRONT_CERTIFICATE_REGION}, but this stack deploys to {}",
            self_input.region
        )));
    }
    let zone = self_input
        .hosted_zone
        .ok_or_else(|| invalid("DNS validation requires the hosted zone the domain lives in".to_string()))?;

    let mut all_names = vec![self_input.domain_name.clone()];
    all_names.extend(self_input.subject_alternative_names.iter().cloned());
    let mut domain_validation_options = vec![];
    for name in all_names.iter() {
        let bare = name.trim_start_matches("*.");
        if !zone.contains(bare) {
            return Err(invalid(format!("{} is not inside hosted zone {}", name, zone.name)));
        }
        domain_validation_options.push(DomainValidationOption {
            domain_name: name.clone(),
            hosted_zone_id: zone.id.clone(),
        });
    }

    let cert = CfnCertificate {
        domain_name: self_input.domain_name,
        subject_alternative_names: self_input.subject_alternative_names,
        validation_method: ValidationMethod::Dns,
        domain_validation_options,
    };
    let logical_cert_name = l0core.logical_name("");
    debug!(logical_id = %logical_cert_name, names = ?all_names, "certificate");
    let mut resource = Resource::new(logical_cert_name.clone(), cert);
    resource.removal_policy = self_input.removal_policy;
    stackinp.resources.push(resource);
    Ok(CertOutputs { logical_cert_name })
}
