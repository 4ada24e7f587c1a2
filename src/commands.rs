//! Command handlers behind the CLI.
//!
//! Each handler works against a loaded [`Configuration`]; persisting it is
//! left to the caller.

use anyhow::{Context, Result, bail};
use serde_yaml::Value;
use tracing::info;

use crate::ansible_client::OptionOverrides;
use crate::cli::{Cli, Commands, ConfigureCommands, ProvisionCommands, VmCommands};
use crate::configuration::Configuration;
use crate::hostname::hostname_taken;
use crate::persistence::{SaveObligation, ensure_directory, to_document};
use crate::variables::{VariableBag, bag_from_assignments, parse_value};

const VAGRANT_UP_PLAYBOOK: &str = "provision/vagrant-up";
const AWS_UP_PLAYBOOK: &str = "provision/aws-up";

/// Run the command selected on the command line.
pub fn dispatch(cli: &Cli, config: &mut Configuration) -> Result<()> {
    let overrides = option_overrides(cli);

    match &cli.command {
        Commands::Configure { action } => configure(action, config),
        Commands::Provision { target } => match target {
            ProvisionCommands::Local {
                hostname,
                os,
                stage,
                provider,
                extra_vars,
            } => provision_local(
                config,
                LocalVm {
                    hostname: hostname.clone(),
                    os,
                    stage,
                    provider,
                },
                extra_vars,
                overrides.as_ref(),
            ),
            ProvisionCommands::Remote { name, extra_vars } => {
                provision_remote(config, name.as_deref(), extra_vars, overrides.as_ref())
            }
        },
        Commands::Prepare {
            playbook,
            extra_vars,
        } => {
            let variables = bag_from_assignments(extra_vars.as_slice())?;
            config
                .run_playbook(playbook, Some(&variables), overrides.as_ref())?
                .ensure_success()
                .with_context(|| format!("Failed to run playbook {playbook}"))?;
            Ok(())
        }
        Commands::Vms { action } => match action {
            VmCommands::List => list_vms(config),
        },
    }
}

/// Per-invocation overrides from the global flags, `None` if none were set.
pub fn option_overrides(cli: &Cli) -> Option<OptionOverrides> {
    let overrides = OptionOverrides {
        verbosity: (cli.verbose > 0).then_some(cli.verbose),
        check: cli.check.then_some(true),
        ..Default::default()
    };
    (!overrides.is_empty()).then_some(overrides)
}

fn configure(action: &ConfigureCommands, config: &mut Configuration) -> Result<()> {
    match action {
        ConfigureCommands::Show => show_configuration(config),
        ConfigureCommands::AnsibleClient { option, value } => {
            config
                .ansible_client_configuration
                .set_option(*option, value)?;
            info!("Set Ansible client {} to '{}'", option, value);
            Ok(())
        }
        ConfigureCommands::AwsClient { option, value } => {
            config.aws_client_configuration.set_option(*option, value)?;
            info!("Set AWS client {} to '{}'", option, value);
            Ok(())
        }
        ConfigureCommands::Variable { aws, key, value } => {
            let value = parse_value(value);
            if *aws {
                config.aws_variables.set(key.clone(), value);
            } else {
                config.ansible_variables.set(key.clone(), value);
            }
            Ok(())
        }
        ConfigureCommands::UnsetVariable { aws, key } => {
            let removed = if *aws {
                config.aws_variables.unset(key)
            } else {
                config.ansible_variables.unset(key)
            };
            if removed.is_none() {
                bail!("Variable '{}' is not set", key);
            }
            Ok(())
        }
    }
}

fn show_configuration(config: &Configuration) -> Result<()> {
    let documents = [
        (
            config.ansible_client_configuration.path(),
            to_document(config.ansible_client_configuration.inner()),
        ),
        (
            config.ansible_variables.path(),
            to_document(config.ansible_variables.inner()),
        ),
        (
            config.aws_client_configuration.path(),
            to_document(config.aws_client_configuration.inner()),
        ),
        (
            config.aws_variables.path(),
            to_document(config.aws_variables.inner()),
        ),
    ];

    for (path, document) in documents {
        let document = document.with_context(|| format!("Failed to render {path:?}"))?;
        println!("# {}", path.display());
        print!("{document}");
    }
    Ok(())
}

/// Settings for a new local VM.
struct LocalVm<'a> {
    hostname: Option<String>,
    os: &'a str,
    stage: &'a str,
    provider: &'a str,
}

fn provision_local(
    config: &Configuration,
    vm: LocalVm<'_>,
    extra_vars: &[String],
    overrides: Option<&OptionOverrides>,
) -> Result<()> {
    let vagrant_root = config.paths().vagrant_directory_root();
    let hostname = match vm.hostname {
        Some(name) => {
            if hostname_taken(&vagrant_root, &name) {
                bail!("A VM named '{}' already exists", name);
            }
            name
        }
        None => config.next_available_vagrant_name()?,
    };

    let home = config.vagrant_home_directory(&hostname);
    ensure_directory(&home)
        .with_context(|| format!("Failed to create VM directory {home:?}"))?;

    let mut variables = VariableBag::new();
    variables.insert(
        "origin_ci_vagrant_hostname".to_string(),
        Value::from(hostname.as_str()),
    );
    variables.insert(
        "origin_ci_vagrant_home_dir".to_string(),
        Value::from(home.display().to_string()),
    );
    variables.insert("origin_ci_vagrant_os".to_string(), Value::from(vm.os));
    variables.insert("origin_ci_vagrant_stage".to_string(), Value::from(vm.stage));
    variables.insert(
        "origin_ci_vagrant_provider".to_string(),
        Value::from(vm.provider),
    );
    variables.insert(
        "origin_ci_vagrant_box_dir".to_string(),
        Value::from(config.paths().vagrant_box_directory().display().to_string()),
    );
    variables.extend(bag_from_assignments(extra_vars)?);

    info!("Provisioning local VM {}", hostname);
    config
        .run_playbook(VAGRANT_UP_PLAYBOOK, Some(&variables), overrides)?
        .ensure_success()
        .with_context(|| format!("Failed to provision {hostname}"))?;

    println!("Provisioned local VM {hostname} in {}", home.display());
    Ok(())
}

fn provision_remote(
    config: &Configuration,
    name: Option<&str>,
    extra_vars: &[String],
    overrides: Option<&OptionOverrides>,
) -> Result<()> {
    let mut variables = VariableBag::new();
    if let Some(name) = name {
        variables.insert("origin_ci_aws_instance_name".to_string(), Value::from(name));
    }
    variables.extend(bag_from_assignments(extra_vars)?);

    info!("Provisioning remote VM");
    config
        .run_aws_playbook(AWS_UP_PLAYBOOK, Some(&variables), overrides)?
        .ensure_success()
        .context("Failed to provision AWS instance")?;
    Ok(())
}

fn list_vms(config: &Configuration) -> Result<()> {
    let machines = config.registered_vagrant_machines();
    if machines.is_empty() {
        println!("No local VMs provisioned");
        return Ok(());
    }

    for machine in machines {
        let groups = machine
            .groups()
            .with_context(|| format!("Failed to read groups for {}", machine.hostname()))?;
        if groups.is_empty() {
            println!("{}\t{}", machine.hostname(), machine.directory().display());
        } else {
            println!(
                "{}\t{}\t{}",
                machine.hostname(),
                machine.directory().display(),
                groups.join(",")
            );
        }
    }
    Ok(())
}
