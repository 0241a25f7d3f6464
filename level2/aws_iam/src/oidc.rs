use aws_cfn_stack::Resource;
use portfolio_lib::{get_ref, to_properties, CfnResource, L0Core, SynthError};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

pub const GITHUB_ACTIONS_ISSUER: &str = "https://token.actions.githubusercontent.com";
pub const STS_AUDIENCE: &str = "sts.amazonaws.com";
/// certificate thumbprints of the GitHub Actions token issuer.
pub const GITHUB_THUMBPRINTS: &[&str] = &[
    "6938fd4d98bab03faadb97b34396831e3780aea1",
    "1c58a3a8518e8759bf075b76b750d4f2df264fcd",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CfnOidcProvider {
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "ClientIdList")]
    pub client_id_list: Vec<String>,
    #[serde(rename = "ThumbprintList", skip_serializing_if = "Vec::is_empty")]
    pub thumbprint_list: Vec<String>,
}

impl CfnResource for CfnOidcProvider {
    fn type_string(&self) -> &'static str {
        "AWS::IAM::OIDCProvider"
    }
    fn properties(&self) -> Result<Value, SynthError> {
        to_properties(self)
    }
    fn validate(&self) -> Result<(), String> {
        if !self.url.starts_with("https://") {
            return Err(format!("provider url {} must use https", self.url));
        }
        if self.client_id_list.is_empty() {
            return Err("at least one client id (audience) is required".to_string());
        }
        for thumbprint in self.thumbprint_list.iter() {
            if thumbprint.len() != 40 || !thumbprint.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(format!("thumbprint {} must be 40 hex characters", thumbprint));
            }
        }
        Ok(())
    }
}

pub struct OidcInput {
    pub url: String,
    /// the audiences tokens must be issued for.
    pub client_ids: Vec<String>,
    pub thumbprints: Vec<String>,
}

impl Default for OidcInput {
    /// the GitHub Actions issuer, for tokens exchanged with STS.
    fn default() -> Self {
        Self {
            url: GITHUB_ACTIONS_ISSUER.to_string(),
            client_ids: vec![STS_AUDIENCE.to_string()],
            thumbprints: GITHUB_THUMBPRINTS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OidcOutputs {
    pub logical_provider_name: String,
    pub url: String,
}

impl OidcOutputs {
    /// `Ref` on an OIDC provider resolves to its ARN.
    pub fn arn(&self) -> Value {
        get_ref(&self.logical_provider_name)
    }

    /// the prefix of condition keys for tokens from this issuer,
    /// eg: `token.actions.githubusercontent.com`
    pub fn condition_key_prefix(&self) -> &str {
        self.url.trim_start_matches("https://").trim_end_matches('/')
    }
}

pub fn config(input: OidcInput, stackinp: &mut aws_cfn_stack::Input, l0core: &mut L0Core) -> Result<OidcOutputs, SynthError> {
    let logical_provider_name = l0core.logical_name("");
    debug!(logical_id = %logical_provider_name, url = %input.url, "oidc provider");
    let provider = CfnOidcProvider {
        url: input.url.clone(),
        client_id_list: input.client_ids,
        thumbprint_list: input.thumbprints,
    };
    stackinp.resources.push(Resource::new(logical_provider_name.clone(), provider));
    Ok(OidcOutputs { logical_provider_name, url: input.url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn github_provider_defaults() {
        let mut core = L0Core::new();
        core.set_current_module("git_hub_oidc");
        let mut stack = aws_cfn_stack::Input::default();
        let out = config(OidcInput::default(), &mut stack, &mut core).unwrap();
        assert_eq!(out.logical_provider_name, "GitHubOidc");
        assert_eq!(out.condition_key_prefix(), "token.actions.githubusercontent.com");
        assert_eq!(out.arn(), json!({ "Ref": "GitHubOidc" }));
        let resource = &stack.resources[0];
        assert!(resource.properties.validate().is_ok());
        let props = resource.properties.properties().unwrap();
        assert_eq!(props["Url"], GITHUB_ACTIONS_ISSUER);
        assert_eq!(props["ClientIdList"], json!(["sts.amazonaws.com"]));
    }

    #[test]
    fn provider_validation() {
        let provider = CfnOidcProvider {
            url: "http://issuer".into(),
            client_id_list: vec!["aud".into()],
            thumbprint_list: vec![],
        };
        assert!(provider.validate().is_err());
        let provider = CfnOidcProvider {
            url: "https://issuer".into(),
            client_id_list: vec!["aud".into()],
            thumbprint_list: vec!["nothex".into()],
        };
        assert!(provider.validate().is_err());
    }
}
