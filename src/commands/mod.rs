use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{AppConfig, ApproverFallbacks};
use crate::documents::{Branding, DocumentRenderer};
use crate::errors::ServiceError;
use crate::notifications::Notifier;
use crate::repositories::{ReturnStore, UserDirectory};

pub mod returns;

/// Collaborators a workflow command runs against.
#[derive(Clone)]
pub struct WorkflowContext {
    pub returns: Arc<dyn ReturnStore>,
    pub users: Arc<dyn UserDirectory>,
    pub notifier: Arc<dyn Notifier>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub settings: WorkflowSettings,
}

/// Configuration values the workflow needs, captured once at startup.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub branding: Branding,
    pub public_base_url: String,
    pub approver_fallbacks: ApproverFallbacks,
}

impl WorkflowSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            branding: Branding {
                company_name: config.company_name.clone(),
                company_address: config.company_address.clone(),
            },
            public_base_url: config.public_base_url.clone(),
            approver_fallbacks: config.approver_fallbacks.clone(),
        }
    }

    pub fn return_url(&self, return_id: i64) -> String {
        format!(
            "{}/returns/{}",
            self.public_base_url.trim_end_matches('/'),
            return_id
        )
    }
}

/// A single workflow operation, validated and executed as one unit.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError>;
}
