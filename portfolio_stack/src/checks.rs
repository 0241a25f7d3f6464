//! Assertions over a synthesized template. These run against the template
//! JSON, not the construct inputs, so they also catch hand edits and
//! regressions in the constructs themselves.

use std::fmt;

use aws_cfn_stack::{SavedResource, SavedTemplate};
use aws_route53::normalize_domain;
use serde_json::Value;

const BUCKET: &str = "AWS::S3::Bucket";
const BUCKET_POLICY: &str = "AWS::S3::BucketPolicy";
const ROLE: &str = "AWS::IAM::Role";
const OIDC_PROVIDER: &str = "AWS::IAM::OIDCProvider";
const CERTIFICATE: &str = "AWS::CertificateManager::Certificate";
const RECORD_SET: &str = "AWS::Route53::RecordSet";
const DISTRIBUTION: &str = "AWS::CloudFront::Distribution";

const WEB_IDENTITY_ACTION: &str = "sts:AssumeRoleWithWebIdentity";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub check: &'static str,
    pub resource: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.check, self.resource, self.message)
    }
}

struct Checker<'a> {
    template: &'a SavedTemplate,
    violations: Vec<Violation>,
}

impl<'a> Checker<'a> {
    fn fail(&mut self, check: &'static str, resource: &str, message: impl Into<String>) {
        self.violations.push(Violation {
            check,
            resource: resource.to_string(),
            message: message.into(),
        });
    }

    fn of_type(&self, ty: &'a str) -> Vec<(&'a String, &'a SavedResource)> {
        self.template.resources_of_type(ty).collect()
    }
}

/// `Value` may be a single item or a list; IAM accepts both.
fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => vec![],
        other => vec![other],
    }
}

fn ref_target(value: &Value) -> Option<&str> {
    value.get("Ref").and_then(Value::as_str)
}

fn get_att_target(value: &Value) -> Option<&str> {
    value.get("Fn::GetAtt").and_then(|v| v.get(0)).and_then(Value::as_str)
}

fn is_public_allow(statement: &Value) -> bool {
    if statement.get("Effect").and_then(Value::as_str) != Some("Allow") {
        return false;
    }
    match statement.get("Principal") {
        Some(Value::String(p)) => p == "*",
        Some(principal) => principal
            .get("AWS")
            .map(|aws| as_list(aws).iter().any(|a| a.as_str() == Some("*")))
            .unwrap_or(false),
        None => false,
    }
}

/// IAM action globbing, enough for `*` patterns like `s3:Get*`.
fn action_matches(pattern: &str, action: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern.eq_ignore_ascii_case(action),
        Some((prefix, _)) => action.to_ascii_lowercase().starts_with(&prefix.to_ascii_lowercase()),
    }
}

fn grants_get_object(statement: &Value) -> bool {
    statement
        .get("Action")
        .map(|a| {
            as_list(a)
                .iter()
                .filter_map(|a| a.as_str())
                .any(|a| action_matches(a, "s3:GetObject"))
        })
        .unwrap_or(false)
}

fn statements(document: &Value) -> Vec<&Value> {
    document.get("Statement").map(as_list).unwrap_or_default()
}

/// logical id of every bucket whose policy has a statement matching `matches`.
fn buckets_with_statement(checker: &Checker, matches: impl Fn(&Value) -> bool) -> Vec<String> {
    let mut out = vec![];
    for (_, policy) in checker.of_type(BUCKET_POLICY) {
        let Some(bucket) = policy.properties.get("Bucket").and_then(ref_target) else {
            continue;
        };
        let Some(document) = policy.properties.get("PolicyDocument") else {
            continue;
        };
        if statements(document).into_iter().any(&matches) {
            out.push(bucket.to_string());
        }
    }
    out
}

fn publicly_readable_buckets(checker: &Checker) -> Vec<String> {
    buckets_with_statement(checker, |s| is_public_allow(s) && grants_get_object(s))
}

fn blocks_all_public_access(bucket: &SavedResource) -> bool {
    let Some(block) = bucket.properties.get("PublicAccessBlockConfiguration") else {
        return false;
    };
    ["BlockPublicAcls", "BlockPublicPolicy", "IgnorePublicAcls", "RestrictPublicBuckets"]
        .iter()
        .all(|key| block.get(key).and_then(Value::as_bool) == Some(true))
}

/// buckets a distribution reads from, by logical id.
fn origin_buckets(checker: &Checker) -> Vec<String> {
    let mut out = vec![];
    for (_, distribution) in checker.of_type(DISTRIBUTION) {
        let origins = distribution.properties["DistributionConfig"].get("Origins").map(as_list).unwrap_or_default();
        for origin in origins {
            if let Some(bucket) = origin.get("DomainName").and_then(get_att_target) {
                out.push(bucket.to_string());
            }
        }
    }
    out
}

fn check_content_bucket(checker: &mut Checker) {
    let template = checker.template;
    // any action counts here, not just reads
    let public = buckets_with_statement(checker, is_public_allow);
    for bucket_id in origin_buckets(checker) {
        match template.resources.get(&bucket_id) {
            Some(bucket) if bucket.ty == BUCKET => {
                if !blocks_all_public_access(bucket) {
                    checker.fail("content-bucket-private", &bucket_id, "content bucket must block all public access");
                }
                if bucket.properties.get("WebsiteConfiguration").is_some() {
                    checker.fail("content-bucket-private", &bucket_id, "content bucket must not be in website mode");
                }
            }
            _ => checker.fail("content-bucket-private", &bucket_id, "distribution origin is not a bucket in this stack"),
        }
        if public.contains(&bucket_id) {
            checker.fail("content-bucket-private", &bucket_id, "content bucket has a policy statement allowing everyone");
        }
    }
}

fn check_preview_bucket(checker: &mut Checker) {
    let public = publicly_readable_buckets(checker);
    let website_buckets: Vec<String> = checker
        .of_type(BUCKET)
        .into_iter()
        .filter(|(_, b)| b.properties.get("WebsiteConfiguration").is_some())
        .map(|(id, _)| id.clone())
        .collect();
    if website_buckets.is_empty() {
        checker.fail("preview-bucket-public", "<template>", "no website bucket for previews");
    }
    for id in website_buckets.iter() {
        if !public.contains(id) {
            checker.fail("preview-bucket-public", id, "preview bucket has no public read policy");
        }
    }
    for id in public.iter() {
        if !website_buckets.contains(id) {
            checker.fail("preview-bucket-public", id, "only the preview bucket may be publicly readable");
        }
    }
}

/// `repo:<org>/<repo>:*` with both parts free of wildcards.
fn is_single_repo_subject(subject: &str) -> bool {
    let Some(rest) = subject.strip_prefix("repo:") else {
        return false;
    };
    let Some(repo_path) = rest.strip_suffix(":*") else {
        return false;
    };
    let mut parts = repo_path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(org), Some(repo), None) => [org, repo]
            .iter()
            .all(|p| !p.is_empty() && !p.contains(['*', '?', ':'])),
        _ => false,
    }
}

fn condition_entries(statement: &Value) -> Vec<(&str, &str, &Value)> {
    let mut out = vec![];
    if let Some(Value::Object(operators)) = statement.get("Condition") {
        for (operator, keys) in operators {
            let Value::Object(keys) = keys else { continue };
            for (key, value) in keys {
                out.push((operator.as_str(), key.as_str(), value));
            }
        }
    }
    out
}

/// the logical id behind a `{"Federated": {"Ref": ..}}` principal, when that is the only principal.
fn federated_provider(statement: &Value) -> Option<&str> {
    let Some(Value::Object(principal)) = statement.get("Principal") else {
        return None;
    };
    if principal.len() != 1 {
        return None;
    }
    principal.get("Federated").and_then(ref_target)
}

fn check_trust_statement(checker: &mut Checker, id: &str, statement: &Value, providers: &[&String]) {
    if statement.get("NotAction").is_some() || statement.get("NotPrincipal").is_some() {
        checker.fail("role-trust-scoped", id, "trust statements may not use NotAction or NotPrincipal");
        return;
    }
    let actions = statement.get("Action").map(as_list).unwrap_or_default();
    if actions.is_empty() || actions.iter().any(|a| a.as_str() != Some(WEB_IDENTITY_ACTION)) {
        checker.fail(
            "role-trust-scoped",
            id,
            format!("trust may only allow {WEB_IDENTITY_ACTION}, found {:?}", actions),
        );
        return;
    }
    match federated_provider(statement) {
        Some(provider) if providers.iter().any(|p| p.as_str() == provider) => {}
        _ => {
            checker.fail("role-trust-scoped", id, "trust must be federated to the OIDC provider in this stack");
            return;
        }
    }

    let mut subjects = vec![];
    let mut has_audience = false;
    for (operator, key, value) in condition_entries(statement) {
        if key.ends_with(":sub") {
            if operator == "StringLike" || operator == "StringEquals" {
                subjects.extend(as_list(value));
            } else {
                checker.fail("role-trust-scoped", id, format!("subject condition uses {operator}"));
            }
        } else if key.ends_with(":aud") {
            if operator == "StringEquals" {
                has_audience = true;
            } else {
                checker.fail("role-trust-scoped", id, format!("audience condition uses {operator}"));
            }
        }
    }
    if !has_audience {
        checker.fail("role-trust-scoped", id, "web identity trust has no audience condition");
    }
    match subjects.as_slice() {
        [Value::String(subject)] if is_single_repo_subject(subject) => {}
        [] => checker.fail("role-trust-scoped", id, "web identity trust has no subject condition"),
        other => checker.fail(
            "role-trust-scoped",
            id,
            format!("subject condition must name exactly one repository, found {:?}", other),
        ),
    }
}

/// every Allow in a role's trust policy must be scoped web identity from this stack's provider.
fn check_role_trust(checker: &mut Checker) {
    let template = checker.template;
    let providers: Vec<&String> = template.resources_of_type(OIDC_PROVIDER).map(|(id, _)| id).collect();
    for (id, role) in checker.of_type(ROLE) {
        let Some(trust) = role.properties.get("AssumeRolePolicyDocument") else {
            checker.fail("role-trust-scoped", id, "role has no trust policy");
            continue;
        };
        for statement in statements(trust) {
            if statement.get("Effect").and_then(Value::as_str) != Some("Allow") {
                continue;
            }
            check_trust_statement(checker, id, statement, &providers);
        }
    }
}

/// DNS names compare without case or a trailing dot.
fn same_name(value: Option<&str>, name: &str) -> bool {
    value.map(|v| normalize_domain(v) == name).unwrap_or(false)
}

fn check_names(checker: &mut Checker, domain: &str) {
    let domain = normalize_domain(domain);
    let domain = domain.as_str();
    let www = format!("www.{domain}");
    let certs = checker.of_type(CERTIFICATE);
    let certified = |name: &str| {
        certs.iter().any(|(_, c)| {
            same_name(c.properties.get("DomainName").and_then(Value::as_str), name)
                || c.properties
                    .get("SubjectAlternativeNames")
                    .map(|sans| as_list(sans).iter().any(|s| same_name(s.as_str(), name)))
                    .unwrap_or(false)
        })
    };
    let mut missing = vec![];
    for name in [domain, www.as_str()] {
        if !certified(name) {
            missing.push(name.to_string());
        }
    }
    for name in missing {
        checker.fail("names-covered", &name, "name is not covered by a certificate");
    }

    let records = checker.of_type(RECORD_SET);
    let mut targets = vec![];
    for name in [domain, www.as_str()] {
        let target = records.iter().find_map(|(_, r)| {
            if !same_name(r.properties.get("Name").and_then(Value::as_str), name) {
                return None;
            }
            r.properties.get("AliasTarget").and_then(|a| a.get("DNSName")).and_then(get_att_target)
        });
        match target {
            Some(target) => targets.push((name.to_string(), target.to_string())),
            None => checker.fail("names-covered", name, "no alias record points this name at a distribution"),
        }
    }
    if let [(_, apex), (_, www_target)] = targets.as_slice() {
        if apex != www_target {
            checker.fail("names-covered", &www, format!("points at {www_target} but the apex points at {apex}"));
        }
    }
    let template = checker.template;
    for (name, target) in targets.iter() {
        match template.resources.get(target) {
            Some(d) if d.ty == DISTRIBUTION => {
                let aliases = d.properties["DistributionConfig"].get("Aliases").map(as_list).unwrap_or_default();
                if !aliases.iter().any(|a| same_name(a.as_str(), name)) {
                    checker.fail("names-covered", target, format!("distribution does not list {name} as an alias"));
                }
            }
            _ => checker.fail("names-covered", name, format!("alias target {target} is not a distribution")),
        }
    }
}

fn check_error_responses(checker: &mut Checker) {
    for (id, distribution) in checker.of_type(DISTRIBUTION) {
        let responses = distribution.properties["DistributionConfig"]
            .get("CustomErrorResponses")
            .map(as_list)
            .unwrap_or_default();
        for code in [403, 404] {
            let found = responses.iter().find(|r| r.get("ErrorCode").and_then(Value::as_u64) == Some(code));
            let ok = found
                .map(|r| {
                    r.get("ResponseCode").and_then(Value::as_u64) == Some(200)
                        && r.get("ResponsePagePath").and_then(Value::as_str) == Some("/index.html")
                        && r.get("ErrorCachingMinTTL").and_then(Value::as_u64) == Some(0)
                })
                .unwrap_or(false);
            if !ok {
                checker.fail(
                    "spa-error-rewrite",
                    id,
                    format!("{code} must rewrite to /index.html with status 200 and no caching"),
                );
            }
        }
    }
}

/// `TLSv1.2_2021` and later pass; `TLSv1`, `TLSv1.1_2016`, `SSLv3` don't.
fn is_tls_1_2_or_newer(version: &str) -> bool {
    let Some(rest) = version.strip_prefix("TLSv1.") else {
        return false;
    };
    rest.split('_')
        .next()
        .and_then(|minor| minor.parse::<u32>().ok())
        .map(|minor| minor >= 2)
        .unwrap_or(false)
}

fn check_tls(checker: &mut Checker) {
    for (id, distribution) in checker.of_type(DISTRIBUTION) {
        let version = distribution.properties["DistributionConfig"]
            .get("ViewerCertificate")
            .and_then(|c| c.get("MinimumProtocolVersion"))
            .and_then(Value::as_str);
        match version {
            Some(v) if is_tls_1_2_or_newer(v) => {}
            Some(v) => checker.fail("tls-minimum", id, format!("minimum protocol version {v} is below TLS 1.2")),
            None => checker.fail("tls-minimum", id, "no viewer certificate, so the default TLSv1 policy applies"),
        }
    }
}

/// every violation found, empty when the template passes.
pub fn check_template(template: &SavedTemplate, domain: &str) -> Vec<Violation> {
    let mut checker = Checker { template, violations: vec![] };
    check_content_bucket(&mut checker);
    check_preview_bucket(&mut checker);
    check_role_trust(&mut checker);
    check_names(&mut checker, domain);
    check_error_responses(&mut checker);
    check_tls(&mut checker);
    checker.violations
}
