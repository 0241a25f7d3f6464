//! The portfolio site stack: a private content bucket served by CloudFront
//! under the apex and `www` names, a public preview bucket for pull request
//! builds, and a role GitHub Actions assumes to deploy both.

use aws_cfn_stack::{RemovalPolicy, SynthesizedStack};
use aws_cloudfront_distribution::{
    origin_access_read_statement, spa_fallback, DistributionOutputs, SECURITY_HEADERS_POLICY_ID,
};
use aws_iam::GithubTrust;
use aws_regions::Environment;
use aws_route53::{normalize_domain, AliasTarget, HostedZone, RecordType};
use aws_s3::{grant_delete, grant_read_write, BucketAccess, BucketOutputs, ObjectOwnership};
use portfolio_lib::level0::logical_name_for;
use portfolio_lib::{L0Core, PolicyStatement, SynthError};
use tracing::{info, warn};

pub mod checks;
pub mod config;

pub use checks::{check_template, Violation};
pub use config::{CiConfig, ConfigError, StackConfig, DEFAULT_CONFIG_FILE};

const SITE_BUCKET: &str = "site_bucket";
const SITE_DISTRIBUTION: &str = "site_distribution";
const INDEX_DOCUMENT: &str = "index.html";

pub const MANAGEMENT_ACTIONS: &[&str] = &[
    "cloudformation:*",
    "s3:*",
    "cloudfront:*",
    "route53:*",
    "acm:*",
    "iam:*",
    "ssm:GetParameter",
    "sts:AssumeRole",
];

fn role_statements(
    config: &StackConfig,
    site_bucket: &BucketOutputs,
    preview_bucket: &BucketOutputs,
    distribution: &DistributionOutputs,
    env: &Environment,
) -> Vec<PolicyStatement> {
    let mut statements = vec![
        grant_read_write(site_bucket),
        grant_read_write(preview_bucket),
        grant_delete(preview_bucket),
        PolicyStatement::allow(["cloudfront:CreateInvalidation"]).on(distribution.arn(env.partition(), &env.account)),
    ];
    if config.ci.management_grant {
        statements.push(PolicyStatement::allow(MANAGEMENT_ACTIONS.iter().copied()).on("*"));
    }
    statements
}

/// Builds the whole template. `zone` is the existing public hosted zone of
/// `config.domain`; nothing here talks to AWS.
pub fn synth(config: &StackConfig, zone: &HostedZone) -> Result<SynthesizedStack, SynthError> {
    // record names come out lowercased, so every other name has to match them
    let config = &StackConfig {
        domain: normalize_domain(&config.domain),
        ..config.clone()
    };
    let env = Environment::new(&config.account, &config.region)?;
    if !zone.contains(&config.domain) {
        return Err(SynthError::invalid_input(
            "zone",
            format!("{} is not inside hosted zone {}", config.domain, zone.name),
        ));
    }
    info!(stack = %config.stack_name, domain = %config.domain, zone = %zone.id, "synthesizing");
    let www_domain = config.www_domain();
    let mut core = L0Core::new();
    let mut stack = aws_cfn_stack::Input {
        stack_name: config.stack_name.clone(),
        description: Some(format!("Static site hosting for {}", config.domain)),
        ..Default::default()
    };

    core.set_current_module("site_cert");
    let cert = aws_acm_cert::config(
        aws_acm_cert::Input {
            domain_name: config.domain.clone(),
            subject_alternative_names: vec![www_domain.clone()],
            hosted_zone: Some(zone.clone()),
            for_cloudfront: true,
            region: env.region.clone(),
            removal_policy: None,
        },
        &mut stack,
        &mut core,
    )?;

    // the bucket policy grants reads to the distribution, which is declared after the bucket.
    let planned_distribution = DistributionOutputs::for_module(SITE_DISTRIBUTION);
    let planned_site_bucket = BucketOutputs::for_logical_name(&logical_name_for(SITE_BUCKET, ""));
    core.set_current_module(SITE_BUCKET);
    let site_bucket = aws_s3::config(
        aws_s3::Input {
            access: BucketAccess::Private,
            enforce_ssl: true,
            object_ownership: ObjectOwnership::BucketOwnerEnforced,
            removal_policy: RemovalPolicy::Delete,
            extra_policy_statements: vec![origin_access_read_statement(
                &planned_site_bucket,
                planned_distribution.arn(env.partition(), &env.account),
            )],
            ..Default::default()
        },
        &mut stack,
        &mut core,
    )?;

    core.set_current_module(SITE_DISTRIBUTION);
    let distribution = aws_cloudfront_distribution::config(
        aws_cloudfront_distribution::Input {
            origin_bucket: Some(site_bucket.clone()),
            aliases: vec![config.domain.clone(), www_domain.clone()],
            certificate_arn: Some(cert.arn().into()),
            default_root_object: Some(INDEX_DOCUMENT.to_string()),
            response_headers_policy_id: Some(SECURITY_HEADERS_POLICY_ID.to_string()),
            error_responses: spa_fallback(&format!("/{INDEX_DOCUMENT}")),
            name_seed: config.stack_name.clone(),
            ..Default::default()
        },
        &mut stack,
        &mut core,
    )?;

    for (module, record_name) in [("apex_alias", ""), ("www_alias", www_domain.as_str())] {
        core.set_current_module(module);
        aws_route53::config(
            aws_route53::Input {
                zone: zone.clone(),
                record_name: record_name.to_string(),
                record_type: RecordType::A,
                target: AliasTarget::cloudfront(distribution.domain_name()),
            },
            &mut stack,
            &mut core,
        )?;
    }

    core.set_current_module("preview_bucket");
    let preview_bucket = aws_s3::config(
        aws_s3::Input {
            access: BucketAccess::PublicWebsite {
                index_document: INDEX_DOCUMENT.to_string(),
                error_document: None,
            },
            object_ownership: ObjectOwnership::BucketOwnerPreferred,
            removal_policy: RemovalPolicy::Delete,
            ..Default::default()
        },
        &mut stack,
        &mut core,
    )?;

    core.set_current_module("git_hub_oidc");
    let provider = aws_iam::oidc::config(aws_iam::OidcInput::default(), &mut stack, &mut core)?;

    core.set_current_module("git_hub_actions_role");
    let role = aws_iam::role::config(
        aws_iam::Input {
            description: Some("Role assumed by GitHub Actions for CodeByCarson deployments".to_string()),
            trust: GithubTrust {
                provider,
                org: config.ci.org.clone(),
                repo: config.ci.repo.clone(),
            },
            statements: role_statements(config, &site_bucket, &preview_bucket, &distribution, &env),
            policy_name: "GitHubActionsRoleDefaultPolicy".to_string(),
        },
        &mut stack,
        &mut core,
    )?;

    stack.add_output("SiteBucketName", None, site_bucket.bucket_name());
    stack.add_output("DistributionId", None, distribution.distribution_id());
    stack.add_output("SiteUrl", None, config.site_url());
    stack.add_output("PreviewBucketName", None, preview_bucket.bucket_name());
    stack.add_output("PreviewBucketUrl", None, preview_bucket.website_url());
    stack.add_output("GitHubActionsRoleArn", None, role.arn());

    let synthesized = aws_cfn_stack::config(stack, &mut core)?;
    for warning in synthesized.warnings.iter() {
        warn!("{warning}");
    }
    info!(
        stack = %synthesized.stack_name,
        resources = synthesized.template.resources.len(),
        "synthesized"
    );
    Ok(synthesized)
}
