//! AWS client settings and the AWS playbook variable defaults.

use std::ops::{Deref, DerefMut};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use strum::{Display, EnumIter, EnumString};

use crate::ansible_client::optional;
use crate::error::{OctError, Result};
use crate::variables::{VariableBag, VariableDefaults, VariableSet};

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_INSTANCE_TYPE: &str = "m4.xlarge";
const DEFAULT_KEYPAIR_NAME: &str = "libra";

/// Settings for talking to AWS, persisted between invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsClientConfiguration {
    pub region: String,
    pub keypair_name: String,
    /// SSH key matching `keypair_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    pub instance_type: String,
    /// Named profile from the AWS credentials file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl Default for AwsClientConfiguration {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            keypair_name: DEFAULT_KEYPAIR_NAME.to_string(),
            private_key_path: None,
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            profile: None,
        }
    }
}

/// Settings that can be changed with `oct configure aws-client`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum AwsOption {
    Region,
    KeypairName,
    PrivateKeyPath,
    InstanceType,
    Profile,
}

impl AwsClientConfiguration {
    pub fn set_option(&mut self, option: AwsOption, value: &str) -> Result<()> {
        match option {
            AwsOption::Region => self.region = required(option, value)?,
            AwsOption::KeypairName => self.keypair_name = required(option, value)?,
            AwsOption::InstanceType => self.instance_type = required(option, value)?,
            AwsOption::PrivateKeyPath => self.private_key_path = optional(value).map(PathBuf::from),
            AwsOption::Profile => self.profile = optional(value),
        }
        Ok(())
    }

    /// Variables describing this client for the AWS playbooks.
    pub fn playbook_variables(&self) -> VariableBag {
        let mut variables = VariableBag::new();
        variables.insert("origin_ci_aws_region".to_string(), Value::from(self.region.as_str()));
        variables.insert(
            "origin_ci_aws_keypair_name".to_string(),
            Value::from(self.keypair_name.as_str()),
        );
        variables.insert(
            "origin_ci_aws_instance_type".to_string(),
            Value::from(self.instance_type.as_str()),
        );
        if let Some(path) = &self.private_key_path {
            variables.insert(
                "origin_ci_aws_private_key_path".to_string(),
                Value::from(path.display().to_string()),
            );
        }
        if let Some(profile) = &self.profile {
            variables.insert("origin_ci_aws_profile".to_string(), Value::from(profile.as_str()));
        }
        variables
    }
}

fn required(option: AwsOption, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(OctError::validation(format!("{option} cannot be empty")));
    }
    Ok(value.to_string())
}

/// Extra variables for playbooks that touch the AWS API.
///
/// Layered over the client settings, so a variable set here wins over the
/// matching `origin_ci_aws_*` value from [`AwsClientConfiguration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AwsVariables(VariableSet);

impl Default for AwsVariables {
    fn default() -> Self {
        let mut set = VariableSet::default();
        set.set("origin_ci_aws_instance_name_prefix", Value::from("oct"));
        set.set("origin_ci_aws_master_volume_size", Value::from(50));
        Self(set)
    }
}

impl Deref for AwsVariables {
    type Target = VariableSet;

    fn deref(&self) -> &VariableSet {
        &self.0
    }
}

impl DerefMut for AwsVariables {
    fn deref_mut(&mut self) -> &mut VariableSet {
        &mut self.0
    }
}

impl VariableDefaults for AwsVariables {
    fn defaults(&self) -> &VariableBag {
        &self.0.variables
    }
}
