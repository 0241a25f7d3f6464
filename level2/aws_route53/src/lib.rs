use aws_cfn_stack::Resource;
use portfolio_lib::{to_properties, CfnResource, L0Core, StrVal, SynthError};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

pub mod lookup;

pub use lookup::{lookup_hosted_zone, select_zone, LookupError, ZoneSummary};

/// this is static for all of AWS for aliases to CloudFront
/// see https://docs.aws.amazon.com/AWSCloudFormation/latest/UserGuide/aws-properties-route53-aliastarget.html#cfn-route53-aliastarget-hostedzoneid
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// An existing public hosted zone. Never created or modified by a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    /// the bare id, without the `/hostedzone/` prefix.
    pub id: String,
    /// the zone's domain without a trailing dot, eg: `example.com`
    pub name: String,
}

impl HostedZone {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.trim_start_matches("/hostedzone/").to_string(),
            name: normalize_domain(name),
        }
    }

    /// `example.com.`
    pub fn fqdn(&self) -> String {
        format!("{}.", self.name)
    }

    /// whether `domain` is the zone apex or one of its subdomains.
    pub fn contains(&self, domain: &str) -> bool {
        let domain = normalize_domain(domain);
        domain == self.name || domain.ends_with(&format!(".{}", self.name))
    }
}

/// lowercase, without a trailing dot.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordType {
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasTarget {
    #[serde(rename = "DNSName")]
    pub dns_name: StrVal,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: String,
    #[serde(rename = "EvaluateTargetHealth")]
    pub evaluate_target_health: bool,
}

impl AliasTarget {
    /// an alias to a CloudFront distribution's domain name.
    pub fn cloudfront(dns_name: impl Into<StrVal>) -> Self {
        Self {
            dns_name: dns_name.into(),
            hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.to_string(),
            evaluate_target_health: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnRecordSet {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: RecordType,
    #[serde(rename = "HostedZoneId")]
    pub hosted_zone_id: String,
    #[serde(rename = "AliasTarget")]
    pub alias_target: AliasTarget,
}

impl CfnResource for CfnRecordSet {
    fn type_string(&self) -> &'static str {
        "AWS::Route53::RecordSet"
    }
    fn properties(&self) -> Result<Value, SynthError> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if !self.name.ends_with('.') {
            return Err(format!("record name {} must be fully qualified", self.name));
        }
        if self.hosted_zone_id.is_empty() {
            return Err("record set must reference a hosted zone".to_string());
        }
        Ok(())
    }
}

pub struct Input {
    pub zone: HostedZone,
    /// empty means the zone apex. Either a fully qualified name inside the zone
    /// (`www.example.com`) or a label relative to it (`www`).
    pub record_name: String,
    pub record_type: RecordType,
    pub target: AliasTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutputs {
    pub logical_record_name: String,
    /// the fully qualified record name, with a trailing dot.
    pub record_name: String,
}

/// the fully qualified name a record will be written under.
pub fn qualify_record_name(zone: &HostedZone, record_name: &str) -> String {
    if record_name.is_empty() {
        return zone.fqdn();
    }
    if zone.contains(record_name) {
        return format!("{}.", normalize_domain(record_name));
    }
    format!("{}.{}", normalize_domain(record_name), zone.fqdn())
}

pub fn config(input: Input, stackinp: &mut aws_cfn_stack::Input, l0core: &mut L0Core) -> Result<RecordOutputs, SynthError> {
    if input.zone.id.is_empty() {
        return Err(SynthError::invalid_input(&l0core.users_module_name(), "hosted zone id is required"));
    }
    let record_name = qualify_record_name(&input.zone, &input.record_name);
    let logical_record_name = l0core.logical_name("");
    debug!(logical_id = %logical_record_name, name = %record_name, "alias record");
    let record = CfnRecordSet {
        name: record_name.clone(),
        record_type: input.record_type,
        hosted_zone_id: input.zone.id.clone(),
        alias_target: input.target,
    };
    stackinp.resources.push(Resource::new(logical_record_name.clone(), record));
    Ok(RecordOutputs { logical_record_name, record_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use portfolio_lib::get_att;
    use serde_json::json;

    fn zone() -> HostedZone {
        HostedZone::new("/hostedzone/Z0123456789", "codebycarson.com.")
    }

    #[test]
    fn zone_is_normalized() {
        let zone = zone();
        assert_eq!(zone.id, "Z0123456789");
        assert_eq!(zone.name, "codebycarson.com");
        assert_eq!(zone.fqdn(), "codebycarson.com.");
        assert!(zone.contains("www.codebycarson.com"));
        assert!(zone.contains("CodeByCarson.com."));
        assert!(!zone.contains("notcodebycarson.com"));
    }

    #[test]
    fn record_names_are_qualified() {
        let zone = zone();
        assert_eq!(qualify_record_name(&zone, ""), "codebycarson.com.");
        assert_eq!(qualify_record_name(&zone, "www.codebycarson.com"), "www.codebycarson.com.");
        assert_eq!(qualify_record_name(&zone, "www"), "www.codebycarson.com.");
    }

    #[test]
    fn alias_record_points_at_cloudfront() {
        let mut core = L0Core::new();
        core.set_current_module("www_alias");
        let mut stack = aws_cfn_stack::Input::default();
        let out = config(
            Input {
                zone: zone(),
                record_name: "www.codebycarson.com".into(),
                record_type: RecordType::A,
                target: AliasTarget::cloudfront(get_att("SiteDistribution", "DomainName")),
            },
            &mut stack,
            &mut core,
        )
        .unwrap();
        assert_eq!(out.logical_record_name, "WwwAlias");
        let props = stack.resources[0].properties.properties().unwrap();
        assert_eq!(
            props,
            json!({
                "Name": "www.codebycarson.com.",
                "Type": "A",
                "HostedZoneId": "Z0123456789",
                "AliasTarget": {
                    "DNSName": { "Fn::GetAtt": ["SiteDistribution", "DomainName"] },
                    "HostedZoneId": "Z2FDTNDATAQYW2",
                    "EvaluateTargetHealth": false
                }
            })
        );
    }

    #[test]
    fn missing_zone_id_is_an_error() {
        let mut stack = aws_cfn_stack::Input::default();
        let input = Input {
            zone: HostedZone::new("", "codebycarson.com"),
            record_name: String::new(),
            record_type: RecordType::A,
            target: AliasTarget::cloudfront("d111111abcdef8.cloudfront.net"),
        };
        assert!(config(input, &mut stack, &mut L0Core::new()).is_err());
    }
}
