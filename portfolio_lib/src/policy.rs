use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::StrVal;

pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    /// `"*"`: anyone, including anonymous callers.
    Any,
    Service(String),
    Aws(StrVal),
    Federated(StrVal),
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (key, value) = match self {
            Principal::Any => return serializer.serialize_str("*"),
            Principal::Service(s) => ("Service", StrVal::String(s.clone())),
            Principal::Aws(v) => ("AWS", v.clone()),
            Principal::Federated(v) => ("Federated", v.clone()),
        };
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(key, &value)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyStatement {
    #[serde(rename = "Sid", skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(rename = "Action")]
    pub action: Vec<String>,
    #[serde(rename = "Resource", skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<StrVal>,
    /// operator -> (condition key -> value)
    #[serde(rename = "Condition", skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: BTreeMap<String, BTreeMap<String, Value>>,
}

impl PolicyStatement {
    fn new<A: Into<String>>(effect: Effect, actions: impl IntoIterator<Item = A>) -> Self {
        Self {
            sid: None,
            effect,
            principal: None,
            action: actions.into_iter().map(Into::into).collect(),
            resource: vec![],
            condition: BTreeMap::new(),
        }
    }

    pub fn allow<A: Into<String>>(actions: impl IntoIterator<Item = A>) -> Self {
        Self::new(Effect::Allow, actions)
    }

    pub fn deny<A: Into<String>>(actions: impl IntoIterator<Item = A>) -> Self {
        Self::new(Effect::Deny, actions)
    }

    pub fn on(mut self, resource: impl Into<StrVal>) -> Self {
        self.resource.push(resource.into());
        self
    }

    pub fn by(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn when(mut self, operator: &str, key: &str, value: impl Into<Value>) -> Self {
        self.condition
            .entry(operator.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    pub fn is_public_allow(&self) -> bool {
        if self.effect != Effect::Allow {
            return false;
        }
        match &self.principal {
            Some(Principal::Any) => true,
            Some(Principal::Aws(v)) => v.as_literal() == Some("*"),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<PolicyStatement>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![],
        }
    }
}

impl PolicyDocument {
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            statement,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::get_ref;
    use serde_json::json;

    #[test]
    fn statement_serializes_like_iam_expects() {
        let statement = PolicyStatement::allow(["sts:AssumeRoleWithWebIdentity"])
            .by(Principal::Federated(get_ref("Oidc").into()))
            .when("StringEquals", "issuer:aud", "sts.amazonaws.com");
        let doc = PolicyDocument::new(vec![statement]);
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Federated": { "Ref": "Oidc" } },
                    "Action": ["sts:AssumeRoleWithWebIdentity"],
                    "Condition": { "StringEquals": { "issuer:aud": "sts.amazonaws.com" } }
                }]
            })
        );
    }

    #[test]
    fn any_principal_is_a_bare_star() {
        let statement = PolicyStatement::allow(["s3:GetObject"]).by(Principal::Any).on("arn:aws:s3:::b/*");
        let value = serde_json::to_value(&statement).unwrap();
        assert_eq!(value["Principal"], json!("*"));
        assert!(statement.is_public_allow());
    }

    #[test]
    fn deny_and_service_principals_are_not_public() {
        let deny = PolicyStatement::deny(["s3:*"]).by(Principal::Aws("*".into()));
        assert!(!deny.is_public_allow());
        let service = PolicyStatement::allow(["s3:GetObject"]).by(Principal::Service("cloudfront.amazonaws.com".into()));
        assert!(!service.is_public_allow());
        let aws_star = PolicyStatement::allow(["s3:GetObject"]).by(Principal::Aws("*".into()));
        assert!(aws_star.is_public_allow());
    }
}
