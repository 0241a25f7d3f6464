use aws_cfn_stack::Resource;
use portfolio_lib::{get_att, to_properties, CfnResource, L0Core, PolicyDocument, PolicyStatement, Principal, SynthError};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::oidc::{OidcOutputs, STS_AUDIENCE};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Policy {
    #[serde(rename = "PolicyName")]
    pub policy_name: String,
    #[serde(rename = "PolicyDocument")]
    pub policy_document: PolicyDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnRole {
    #[serde(rename = "AssumeRolePolicyDocument")]
    pub assume_role_policy_document: PolicyDocument,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Policies", skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<Policy>,
}

impl CfnResource for CfnRole {
    fn type_string(&self) -> &'static str {
        "AWS::IAM::Role"
    }
    fn properties(&self) -> Result<Value, SynthError> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if self.assume_role_policy_document.statement.is_empty() {
            return Err("a role needs a trust policy".to_string());
        }
        if let Some(description) = &self.description {
            if description.len() > 1000 {
                return Err("role description must be at most 1000 characters".to_string());
            }
        }
        Ok(())
    }
}

/// Trust for GitHub Actions workflows of exactly one repository.
/// Any branch, tag, environment or pull request of that repository may
/// assume the role; no other repository can.
#[derive(Debug, Clone, PartialEq)]
pub struct GithubTrust {
    pub provider: OidcOutputs,
    pub org: String,
    pub repo: String,
}

impl GithubTrust {
    /// `repo:<org>/<repo>:*`
    pub fn subject_pattern(&self) -> String {
        format!("repo:{}/{}:*", self.org, self.repo)
    }

    fn validate(&self) -> Result<(), String> {
        for (what, value) in [("org", &self.org), ("repo", &self.repo)] {
            if value.is_empty() {
                return Err(format!("GitHub {what} must not be empty"));
            }
            if value.contains(['*', '?', '/', ':']) {
                return Err(format!("GitHub {what} {:?} may not contain wildcards, '/' or ':'", value));
            }
        }
        Ok(())
    }

    pub fn statement(&self) -> Result<PolicyStatement, String> {
        self.validate()?;
        let prefix = self.provider.condition_key_prefix();
        Ok(PolicyStatement::allow(["sts:AssumeRoleWithWebIdentity"])
            .by(Principal::Federated(self.provider.arn().into()))
            .when("StringEquals", &format!("{prefix}:aud"), STS_AUDIENCE)
            .when("StringLike", &format!("{prefix}:sub"), self.subject_pattern()))
    }
}

/// a statement that allows whole services (`svc:*` or `*`) on every resource.
pub fn is_broad_statement(statement: &PolicyStatement) -> bool {
    let all_resources = statement.resource.iter().any(|r| r.as_literal() == Some("*"));
    let whole_service = statement.action.iter().any(|a| a == "*" || a.ends_with(":*"));
    all_resources && whole_service
}

pub struct Input {
    pub description: Option<String>,
    pub trust: GithubTrust,
    /// inline permissions, written as one policy named `policy_name`.
    pub statements: Vec<PolicyStatement>,
    pub policy_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleOutputs {
    pub logical_role_name: String,
}

impl RoleOutputs {
    pub fn arn(&self) -> Value {
        get_att(&self.logical_role_name, "Arn")
    }
}

pub fn config(input: Input, stackinp: &mut aws_cfn_stack::Input, l0core: &mut L0Core) -> Result<RoleOutputs, SynthError> {
    let user_mod_name = l0core.users_module_name();
    let trust = input
        .trust
        .statement()
        .map_err(|e| SynthError::invalid_input(&user_mod_name, e))?;

    for statement in input.statements.iter().filter(|s| is_broad_statement(s)) {
        l0core.compiler_warning(&format!(
            "role is granted service-wide actions on every resource: {}",
            statement.action.join(", ")
        ));
    }

    let policies = if input.statements.is_empty() {
        vec![]
    } else {
        vec![Policy {
            policy_name: input.policy_name,
            policy_document: PolicyDocument::new(input.statements),
        }]
    };
    let role = CfnRole {
        assume_role_policy_document: PolicyDocument::new(vec![trust]),
        description: input.description,
        policies,
    };
    let logical_role_name = l0core.logical_name("");
    debug!(logical_id = %logical_role_name, "role");
    stackinp.resources.push(Resource::new(logical_role_name.clone(), role));
    Ok(RoleOutputs { logical_role_name })
}
