use std::collections::HashMap;

use aws_sdk_cloudformation::types::{Capability, OnFailure, Stack, StackStatus};
use aws_sdk_cloudformation::Client;
use aws_types::region::Region;
use thiserror::Error;
use tracing::{debug, info};

use crate::SynthesizedStack;

const POLL_INTERVAL_MS: u64 = 700;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("CloudFormation request failed\n{0}")]
    Sdk(String),

    #[error("Stack {name} failed: {reason}")]
    StackFailed { name: String, reason: String },

    #[error("Stack {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Synth(#[from] portfolio_lib::SynthError),
}

pub async fn make_client(region: &str) -> Client {
    let shared_config = aws_config::from_env()
        .region(Region::new(region.to_string()))
        .load()
        .await;
    Client::new(&shared_config)
}

/// creates or updates the stack, waits for it to settle, and returns its outputs.
pub async fn deploy(client: &Client, stack: &SynthesizedStack) -> Result<HashMap<String, String>, DeployError> {
    let name = &stack.stack_name;
    info!(stack = %name, resources = stack.template.resources.len(), "about to deploy stack");
    let template_body = stack.template_body()?;
    if !create_or_update_stack(client, name, &template_body).await? {
        return current_outputs(client, name).await;
    }
    wait_for_output(client, name).await
}

pub async fn destroy(client: &Client, name: &str) -> Result<(), DeployError> {
    if !does_stack_exist(client, name).await? {
        info!(stack = %name, "stack does not exist, nothing to delete");
        return Ok(());
    }
    info!(stack = %name, "deleting stack");
    client
        .delete_stack()
        .stack_name(name)
        .send()
        .await
        .map_err(|e| DeployError::Sdk(format!("{:#?}", e)))?;
    loop {
        tokio::time::sleep(tokio::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
        match describe_stack(client, name).await {
            Ok(Some(_)) => break,
            Ok(None) => debug!(stack = %name, "still deleting"),
            // deleted stacks stop being addressable by name
            Err(DeployError::Sdk(e)) if e.contains("does not exist") => break,
            Err(e) => return Err(e),
        }
    }
    info!(stack = %name, "stack deleted");
    Ok(())
}

pub async fn does_stack_exist(client: &Client, name: &str) -> Result<bool, DeployError> {
    match client.describe_stacks().stack_name(name).send().await {
        Ok(_) => Ok(true),
        Err(e) => {
            let e_str = format!("{:#?}", e);
            if e_str.contains("does not exist") {
                return Ok(false);
            }
            Err(DeployError::Sdk(e_str))
        }
    }
}

enum StatusClass {
    Done,
    InProgress,
    Failed,
}

fn classify(status: &StackStatus) -> StatusClass {
    match status {
        StackStatus::DeleteComplete
        | StackStatus::CreateComplete
        | StackStatus::UpdateComplete
        | StackStatus::ImportComplete => StatusClass::Done,

        StackStatus::CreateInProgress
        | StackStatus::DeleteInProgress
        | StackStatus::ImportInProgress
        | StackStatus::ImportRollbackInProgress
        | StackStatus::ReviewInProgress
        | StackStatus::RollbackInProgress
        | StackStatus::UpdateCompleteCleanupInProgress
        | StackStatus::UpdateInProgress
        | StackStatus::UpdateRollbackCompleteCleanupInProgress
        | StackStatus::UpdateRollbackInProgress => StatusClass::InProgress,

        // rollback-complete states land here: the stack still serves, but the operation failed
        _ => StatusClass::Failed,
    }
}

fn failure_reason(stack: &Stack, status: &StackStatus) -> String {
    match stack.stack_status_reason() {
        Some(reason) => format!("{}: {}", status.as_str(), reason),
        None => format!("stack ended in {}", status.as_str()),
    }
}

fn stack_outputs(stack: &Stack) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for output in stack.outputs().unwrap_or_default() {
        if let (Some(key), Some(val)) = (output.output_key(), output.output_value()) {
            out.insert(key.to_string(), val.to_string());
        }
    }
    out
}

/// `Ok(Some(stack))` once the stack reached a settled state,
/// `Ok(None)` while an operation is still in progress.
pub async fn describe_stack(client: &Client, name: &str) -> Result<Option<Stack>, DeployError> {
    let resp = client
        .describe_stacks()
        .stack_name(name)
        .send()
        .await
        .map_err(|e| DeployError::Sdk(format!("{:#?}", e)))?;
    let first = resp
        .stacks()
        .and_then(|stacks| stacks.first())
        .ok_or_else(|| DeployError::NotFound(name.to_string()))?;
    let status = first
        .stack_status()
        .ok_or_else(|| DeployError::NotFound(name.to_string()))?;
    match classify(status) {
        StatusClass::Done => Ok(Some(first.clone())),
        StatusClass::InProgress => Ok(None),
        StatusClass::Failed => Err(DeployError::StackFailed {
            name: name.to_string(),
            reason: failure_reason(first, status),
        }),
    }
}

pub async fn wait_for_output(client: &Client, name: &str) -> Result<HashMap<String, String>, DeployError> {
    loop {
        tokio::time::sleep(tokio::time::Duration::from_millis(POLL_INTERVAL_MS)).await;
        match describe_stack(client, name).await? {
            Some(stack) => {
                info!(stack = %name, "stack is ready");
                return Ok(stack_outputs(&stack));
            }
            None => debug!(stack = %name, "still waiting"),
        }
    }
}

/// outputs of a stack that had nothing to update, whatever state it was left in.
pub async fn current_outputs(client: &Client, name: &str) -> Result<HashMap<String, String>, DeployError> {
    let resp = client
        .describe_stacks()
        .stack_name(name)
        .send()
        .await
        .map_err(|e| DeployError::Sdk(format!("{:#?}", e)))?;
    let stack = resp
        .stacks()
        .and_then(|stacks| stacks.first())
        .ok_or_else(|| DeployError::NotFound(name.to_string()))?;
    Ok(stack_outputs(stack))
}

/// `Ok(false)` when the stack already matches `body` and nothing was submitted.
pub async fn create_or_update_stack(client: &Client, name: &str, body: &str) -> Result<bool, DeployError> {
    if does_stack_exist(client, name).await? {
        info!(stack = %name, "updating");
        let result = client
            .update_stack()
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .template_body(body)
            .send()
            .await;
        if let Err(e) = result {
            let e_str = format!("{:#?}", e);
            if e_str.contains("No updates are to be performed") {
                info!(stack = %name, "no changes to deploy");
                return Ok(false);
            }
            return Err(DeployError::Sdk(e_str));
        }
    } else {
        info!(stack = %name, "creating");
        client
            .create_stack()
            .on_failure(OnFailure::Delete)
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .template_body(body)
            .send()
            .await
            .map_err(|e| DeployError::Sdk(format!("{:#?}", e)))?;
    }
    Ok(true)
}
