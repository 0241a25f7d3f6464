use std::collections::BTreeMap;

use portfolio_lib::values::verify_logical_id;
use portfolio_lib::{CfnResource, L0Core, SynthError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub mod deploy;

pub use deploy::{create_or_update_stack, deploy, destroy, make_client, DeployError};

pub const TEMPLATE_VERSION: &str = "2010-09-09";

/// What happens to the physical resource when it is removed from the stack
/// (or the stack is deleted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    Delete,
    Retain,
}

pub struct Resource {
    pub name: String,
    pub properties: Box<dyn CfnResource>,
    /// written as both `DeletionPolicy` and `UpdateReplacePolicy`.
    pub removal_policy: Option<RemovalPolicy>,
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(name: impl Into<String>, properties: impl CfnResource + 'static) -> Self {
        Self {
            name: name.into(),
            properties: Box::new(properties),
            removal_policy: None,
            depends_on: vec![],
        }
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DeletionPolicy", skip_serializing_if = "Option::is_none", default)]
    pub deletion_policy: Option<RemovalPolicy>,
    #[serde(rename = "UpdateReplacePolicy", skip_serializing_if = "Option::is_none", default)]
    pub update_replace_policy: Option<RemovalPolicy>,
    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty", default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutput {
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(rename = "Value")]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, SavedResource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty", default)]
    pub outputs: BTreeMap<String, ResourceOutput>,
}

impl Default for SavedTemplate {
    fn default() -> Self {
        Self {
            version: TEMPLATE_VERSION.to_string(),
            description: None,
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

impl SavedTemplate {
    /// all resources of the given CloudFormation type, keyed by logical id.
    pub fn resources_of_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = (&'a String, &'a SavedResource)> + 'a {
        self.resources.iter().filter(move |(_, r)| r.ty == ty)
    }
}

/// A validated template together with the name it deploys under.
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    pub stack_name: String,
    pub template: SavedTemplate,
    pub warnings: Vec<String>,
}

impl SynthesizedStack {
    /// we make it pretty so if a user needs to look at the stack in Cfn console, it looks nice
    pub fn template_body(&self) -> Result<String, SynthError> {
        Ok(serde_json::to_string_pretty(&self.template)?)
    }
}

#[derive(Default)]
pub struct Input {
    /// if left empty (default), we will use the name of the current module
    /// as the stack name.
    pub stack_name: String,
    pub description: Option<String>,
    pub resources: Vec<Resource>,
    /// logical output name -> output
    pub outputs: Vec<(String, ResourceOutput)>,
}

impl Input {
    pub fn add_output(&mut self, name: &str, description: Option<&str>, value: impl Into<Value>) {
        self.outputs.push((
            name.to_string(),
            ResourceOutput {
                description: description.map(str::to_string),
                value: value.into(),
            },
        ));
    }
}

fn validate_resources_to_template(resources: &[Resource]) -> Result<SavedTemplate, SynthError> {
    let mut out_template = SavedTemplate::default();
    for resource in resources.iter() {
        verify_logical_id(&resource.name)?;
        resource.properties.validate().map_err(|message| SynthError::Validation {
            resource: resource.name.clone(),
            message,
        })?;
        let saved_resource = SavedResource {
            ty: resource.properties.type_string().to_string(),
            properties: resource.properties.properties()?,
            deletion_policy: resource.removal_policy,
            update_replace_policy: resource.removal_policy,
            depends_on: resource.depends_on.clone(),
        };
        debug!(logical_id = %resource.name, ty = %saved_resource.ty, "adding resource");
        if out_template.resources.insert(resource.name.clone(), saved_resource).is_some() {
            return Err(SynthError::DuplicateLogicalId(resource.name.clone()));
        }
    }
    for resource in resources.iter() {
        for dep in resource.depends_on.iter() {
            if !out_template.resources.contains_key(dep) {
                return Err(SynthError::Validation {
                    resource: resource.name.clone(),
                    message: format!("DependsOn references unknown resource '{dep}'"),
                });
            }
        }
    }
    Ok(out_template)
}

pub fn validate_stack_name(user_mod_name: &str, current_stack_name: &str) -> Result<String, SynthError> {
    let stack_name = if current_stack_name.is_empty() {
        let mut stack_name = user_mod_name.replace('_', "-");
        stack_name.truncate(128);
        stack_name
    } else {
        current_stack_name.to_string()
    };
    // A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
    // It must start with an alphabetical character and can't be longer than 128 characters.
    let restriction = "Must only consist of alphanumeric characters and hyphens, Must start with an alphabetical character, and cannot be longer than 128 characters.";
    let invalid = || SynthError::InvalidStackName {
        name: stack_name.clone(),
        reason: restriction.to_string(),
    };
    match stack_name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(invalid()),
    }
    if !stack_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid());
    }
    if stack_name.len() > 128 {
        return Err(invalid());
    }
    Ok(stack_name)
}

pub fn config(input: Input, core: &mut L0Core) -> Result<SynthesizedStack, SynthError> {
    let mut template = validate_resources_to_template(&input.resources)?;
    template.description = input.description;
    for (name, output) in input.outputs {
        verify_logical_id(&name)?;
        if template.outputs.insert(name.clone(), output).is_some() {
            return Err(SynthError::DuplicateLogicalId(name));
        }
    }
    let stack_name = validate_stack_name(&core.users_module_name(), &input.stack_name)?;
    Ok(SynthesizedStack {
        stack_name,
        template,
        warnings: core.warnings().to_vec(),
    })
}
