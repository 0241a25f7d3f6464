use aws_cfn_stack::SavedTemplate;
use aws_route53::HostedZone;
use portfolio_stack::{check_template, synth, StackConfig};
use serde_json::{json, Value};

const DOMAIN: &str = "codebycarson.com";

fn template() -> SavedTemplate {
    let zone = HostedZone::new("/hostedzone/Z0123456789", "codebycarson.com.");
    synth(&StackConfig::default(), &zone).unwrap().template
}

fn props<'a>(template: &'a mut SavedTemplate, logical_id: &str) -> &'a mut Value {
    &mut template.resources.get_mut(logical_id).unwrap().properties
}

fn failed_checks(template: &SavedTemplate) -> Vec<&'static str> {
    check_template(template, DOMAIN).into_iter().map(|v| v.check).collect()
}

#[test]
fn synthesized_stack_passes_every_check() {
    let template = template();
    let violations = check_template(&template, DOMAIN);
    assert!(violations.is_empty(), "{:#?}", violations);
}

#[test]
fn template_round_trips_through_json() {
    let template = template();
    let body = serde_json::to_string_pretty(&template).unwrap();
    let parsed: SavedTemplate = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed, template);
    assert_eq!(parsed.version, "2010-09-09");
}

#[test]
fn outputs_are_exported() {
    let template = template();
    let mut names: Vec<_> = template.outputs.keys().map(String::as_str).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "DistributionId",
            "GitHubActionsRoleArn",
            "PreviewBucketName",
            "PreviewBucketUrl",
            "SiteBucketName",
            "SiteUrl",
        ]
    );
    assert_eq!(template.outputs["SiteUrl"].value, json!("https://codebycarson.com"));
    assert_eq!(template.outputs["SiteBucketName"].value, json!({ "Ref": "SiteBucket" }));
    assert_eq!(template.outputs["DistributionId"].value, json!({ "Ref": "SiteDistribution" }));
    assert_eq!(
        template.outputs["PreviewBucketUrl"].value,
        json!({ "Fn::GetAtt": ["PreviewBucket", "WebsiteURL"] })
    );
    assert_eq!(
        template.outputs["GitHubActionsRoleArn"].value,
        json!({ "Fn::GetAtt": ["GitHubActionsRole", "Arn"] })
    );
}

#[test]
fn buckets_are_deleted_with_the_stack() {
    let template = template();
    for id in ["SiteBucket", "PreviewBucket"] {
        let bucket = &template.resources[id];
        assert_eq!(bucket.deletion_policy, Some(aws_cfn_stack::RemovalPolicy::Delete));
    }
}

#[test]
fn content_bucket_is_private_and_ssl_only() {
    let mut template = template();
    let bucket = props(&mut template, "SiteBucket");
    assert_eq!(bucket["OwnershipControls"]["Rules"][0]["ObjectOwnership"], "BucketOwnerEnforced");
    let policy = props(&mut template, "SiteBucketPolicy");
    let statements = policy["PolicyDocument"]["Statement"].as_array().unwrap().clone();
    assert!(statements.iter().any(|s| s["Effect"] == "Deny"
        && s["Condition"]["Bool"]["aws:SecureTransport"] == "false"));
    let oac = statements
        .iter()
        .find(|s| s["Principal"]["Service"] == "cloudfront.amazonaws.com")
        .unwrap();
    assert_eq!(
        oac["Condition"]["StringEquals"]["AWS:SourceArn"],
        json!({ "Fn::Sub": "arn:aws:cloudfront::420665616125:distribution/${SiteDistribution}" })
    );
}

#[test]
fn public_statement_on_content_bucket_is_caught() {
    let mut template = template();
    let policy = props(&mut template, "SiteBucketPolicy");
    policy["PolicyDocument"]["Statement"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "Effect": "Allow", "Principal": "*", "Action": "s3:GetObject", "Resource": "*" }));
    let failed = failed_checks(&template);
    assert!(failed.contains(&"content-bucket-private"));
    assert!(failed.contains(&"preview-bucket-public"));
}

#[test]
fn any_public_action_on_content_bucket_is_caught() {
    for action in [json!("s3:PutObject"), json!("s3:Get*"), json!(["s3:ListBucket"])] {
        let mut template = template();
        let policy = props(&mut template, "SiteBucketPolicy");
        policy["PolicyDocument"]["Statement"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "Effect": "Allow", "Principal": "*", "Action": action.clone(), "Resource": "*" }));
        assert!(failed_checks(&template).contains(&"content-bucket-private"), "{action}");
    }
}

#[test]
fn wildcard_read_on_content_bucket_is_caught() {
    let mut template = template();
    let policy = props(&mut template, "SiteBucketPolicy");
    policy["PolicyDocument"]["Statement"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "Effect": "Allow", "Principal": { "AWS": "*" }, "Action": "s3:Get*", "Resource": "*" }));
    let failed = failed_checks(&template);
    assert!(failed.contains(&"content-bucket-private"));
    assert!(failed.contains(&"preview-bucket-public"));
}

#[test]
fn preview_bucket_without_public_read_is_caught() {
    let mut template = template();
    template.resources.remove("PreviewBucketPolicy");
    assert_eq!(failed_checks(&template), vec!["preview-bucket-public"]);
}

#[test]
fn preview_bucket_grants_anonymous_reads() {
    let mut template = template();
    let bucket = props(&mut template, "PreviewBucket");
    assert_eq!(bucket["WebsiteConfiguration"]["IndexDocument"], "index.html");
    assert_eq!(bucket["PublicAccessBlockConfiguration"]["BlockPublicPolicy"], false);
    assert_eq!(bucket["OwnershipControls"]["Rules"][0]["ObjectOwnership"], "BucketOwnerPreferred");
    let policy = props(&mut template, "PreviewBucketPolicy");
    assert_eq!(
        policy["PolicyDocument"]["Statement"][0],
        json!({
            "Effect": "Allow",
            "Principal": "*",
            "Action": ["s3:GetObject"],
            "Resource": [{ "Fn::Sub": "${PreviewBucket.Arn}/*" }]
        })
    );
}

#[test]
fn widened_trust_subject_is_caught() {
    for subject in [json!("*"), json!("repo:*:*"), json!("repo:CarsonDavis/*:*"), json!(["repo:a/b:*", "repo:c/d:*"])] {
        let mut template = template();
        let role = props(&mut template, "GitHubActionsRole");
        role["AssumeRolePolicyDocument"]["Statement"][0]["Condition"]["StringLike"]
            ["token.actions.githubusercontent.com:sub"] = subject.clone();
        assert_eq!(failed_checks(&template), vec!["role-trust-scoped"], "{subject}");
    }
}

fn trust_statements(template: &mut SavedTemplate) -> &mut Vec<Value> {
    props(template, "GitHubActionsRole")["AssumeRolePolicyDocument"]["Statement"]
        .as_array_mut()
        .unwrap()
}

fn only_trust_failures(template: &SavedTemplate) -> bool {
    let failed = failed_checks(template);
    !failed.is_empty() && failed.iter().all(|c| *c == "role-trust-scoped")
}

#[test]
fn negated_subject_condition_is_caught() {
    let mut template = template();
    let trust = &mut trust_statements(&mut template)[0];
    let subject = trust["Condition"]["StringLike"].clone();
    trust["Condition"].as_object_mut().unwrap().remove("StringLike");
    trust["Condition"]["StringNotLike"] = subject;
    assert!(only_trust_failures(&template));
}

#[test]
fn audience_outside_string_equals_is_caught() {
    let mut template = template();
    let trust = &mut trust_statements(&mut template)[0];
    let audience = trust["Condition"]["StringEquals"].clone();
    trust["Condition"].as_object_mut().unwrap().remove("StringEquals");
    trust["Condition"]["StringNotEquals"] = audience;
    assert!(only_trust_failures(&template));
}

#[test]
fn extra_trust_statements_are_caught() {
    let extras = [
        json!({ "Effect": "Allow", "Principal": { "AWS": "*" }, "Action": "sts:AssumeRole" }),
        json!({ "Effect": "Allow", "Principal": { "Service": "ec2.amazonaws.com" }, "Action": "sts:AssumeRole" }),
        json!({
            "Effect": "Allow",
            "Principal": { "Federated": "arn:aws:iam::123456789012:oidc-provider/token.actions.githubusercontent.com" },
            "Action": "sts:AssumeRoleWithWebIdentity",
            "Condition": {
                "StringEquals": { "token.actions.githubusercontent.com:aud": "sts.amazonaws.com" },
                "StringLike": { "token.actions.githubusercontent.com:sub": "repo:CarsonDavis/code-by-carson:*" }
            }
        }),
    ];
    for extra in extras {
        let mut template = template();
        trust_statements(&mut template).push(extra.clone());
        assert!(only_trust_failures(&template), "{extra}");
    }
}

#[test]
fn deny_statements_in_trust_are_allowed() {
    let mut template = template();
    trust_statements(&mut template).push(json!({ "Effect": "Deny", "Principal": { "AWS": "*" }, "Action": "sts:AssumeRole" }));
    assert!(failed_checks(&template).is_empty());
}

#[test]
fn role_permissions() {
    let template = template();
    let role = &template.resources["GitHubActionsRole"].properties;
    let statements = role["Policies"][0]["PolicyDocument"]["Statement"].as_array().unwrap();
    let deletes: Vec<_> = statements
        .iter()
        .filter(|s| s["Action"].as_array().unwrap().iter().any(|a| a == "s3:DeleteObject*"))
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0]["Resource"], json!([{ "Fn::Sub": "${PreviewBucket.Arn}/*" }]));
    let invalidation = statements
        .iter()
        .find(|s| s["Action"] == json!(["cloudfront:CreateInvalidation"]))
        .unwrap();
    assert_eq!(
        invalidation["Resource"],
        json!([{ "Fn::Sub": "arn:aws:cloudfront::420665616125:distribution/${SiteDistribution}" }])
    );
    assert!(statements.iter().any(|s| s["Resource"] == json!(["*"])
        && s["Action"].as_array().unwrap().iter().any(|a| a == "iam:*")));
}

#[test]
fn alias_to_a_different_target_is_caught() {
    let mut template = template();
    let record = props(&mut template, "WwwAlias");
    record["AliasTarget"]["DNSName"] = json!({ "Fn::GetAtt": ["SiteBucket", "RegionalDomainName"] });
    assert!(failed_checks(&template).iter().all(|c| *c == "names-covered"));
    assert!(!failed_checks(&template).is_empty());
}

#[test]
fn aliases_point_at_the_distribution() {
    let mut template = template();
    for (id, name) in [("ApexAlias", "codebycarson.com."), ("WwwAlias", "www.codebycarson.com.")] {
        let record = props(&mut template, id);
        assert_eq!(record["Name"], name);
        assert_eq!(record["Type"], "A");
        assert_eq!(record["HostedZoneId"], "Z0123456789");
        assert_eq!(record["AliasTarget"]["HostedZoneId"], "Z2FDTNDATAQYW2");
        assert_eq!(record["AliasTarget"]["DNSName"], json!({ "Fn::GetAtt": ["SiteDistribution", "DomainName"] }));
    }
}

#[test]
fn missing_www_certificate_name_is_caught() {
    let mut template = template();
    let cert = props(&mut template, "SiteCert");
    cert["SubjectAlternativeNames"] = json!([]);
    assert_eq!(failed_checks(&template), vec!["names-covered"]);
}

#[test]
fn cached_error_page_is_caught() {
    let mut template = template();
    let distribution = props(&mut template, "SiteDistribution");
    distribution["DistributionConfig"]["CustomErrorResponses"][1]["ErrorCachingMinTTL"] = json!(300);
    assert_eq!(failed_checks(&template), vec!["spa-error-rewrite"]);
}

#[test]
fn old_tls_is_caught() {
    let mut template = template();
    let distribution = props(&mut template, "SiteDistribution");
    distribution["DistributionConfig"]["ViewerCertificate"]["MinimumProtocolVersion"] = json!("TLSv1.1_2016");
    assert_eq!(failed_checks(&template), vec!["tls-minimum"]);
}

#[test]
fn missing_viewer_certificate_is_caught() {
    let mut template = template();
    let distribution = props(&mut template, "SiteDistribution");
    distribution["DistributionConfig"].as_object_mut().unwrap().remove("ViewerCertificate");
    assert_eq!(failed_checks(&template), vec!["tls-minimum"]);
}

#[test]
fn mixed_case_domain_passes_every_check() {
    let zone = HostedZone::new("/hostedzone/Z0123456789", "codebycarson.com.");
    let config = StackConfig { domain: "CodeByCarson.com".to_string(), ..Default::default() };
    let template = synth(&config, &zone).unwrap().template;
    assert!(check_template(&template, &config.domain).is_empty());
    assert!(check_template(&template, "codebycarson.com.").is_empty());
}
