//! Integration tests for the configuration facade
//!
//! Every test works in its own temporary root and swaps the playbook engine
//! for a recording double, so nothing here needs Ansible installed.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use serde_yaml::Value;
use tempfile::TempDir;

use clap::Parser;

use oct::ansible_client::OptionOverrides;
use oct::cli::Cli;
use oct::commands;
use oct::configuration::{ConfigPaths, Configuration};
use oct::error::{OctError, Result};
use oct::playbook::PlaybookResolver;
use oct::playbook_runner::{PlaybookInvocation, PlaybookOutput, PlaybookRunner};
use oct::variables::VariableBag;

/// Records every invocation and reports the configured exit code.
#[derive(Clone, Default)]
struct RecordingRunner {
    calls: Rc<RefCell<Vec<PlaybookInvocation>>>,
    exit_code: i32,
}

impl PlaybookRunner for RecordingRunner {
    fn run(&self, invocation: &PlaybookInvocation) -> Result<PlaybookOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        Ok(PlaybookOutput {
            playbook: invocation.playbook.clone(),
            exit_code: Some(self.exit_code),
            success: self.exit_code == 0,
        })
    }
}

/// An engine that cannot be started.
struct BrokenRunner;

impl PlaybookRunner for BrokenRunner {
    fn run(&self, invocation: &PlaybookInvocation) -> Result<PlaybookOutput> {
        Err(OctError::Spawn {
            binary: invocation.binary.clone(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

fn config_root(dir: &TempDir) -> PathBuf {
    dir.path().join("origin-ci-tool")
}

fn load(dir: &TempDir) -> Configuration {
    Configuration::load_from(ConfigPaths::new(config_root(dir)))
        .expect("configuration should load")
        .with_resolver(PlaybookResolver::new(dir.path().join("playbooks")))
}

fn load_recording(dir: &TempDir) -> (Configuration, Rc<RefCell<Vec<PlaybookInvocation>>>) {
    let runner = RecordingRunner::default();
    let calls = runner.calls.clone();
    (load(dir).with_runner(Box::new(runner)), calls)
}

#[test]
fn test_fresh_root_loads_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load(&dir);

    assert!(config.ansible_client_configuration.is_new());
    assert!(config.ansible_variables.is_new());
    assert!(config.aws_client_configuration.is_new());
    assert!(config.aws_variables.is_new());

    let root = config_root(&dir);
    assert_eq!(
        config.ansible_client_configuration.inventory_dir,
        root.join("inventory")
    );
    assert_eq!(config.ansible_client_configuration.log_directory, root.join("logs"));
    assert_eq!(config.aws_client_configuration.region, "us-east-1");

    // The scan creates the Vagrant root
    assert!(root.join("vagrant").is_dir());
    assert!(config.registered_vagrant_machines().is_empty());

    config.persist().unwrap();
}

#[test]
fn test_persist_writes_every_object() {
    let dir = TempDir::new().unwrap();
    load(&dir).persist().unwrap();

    let root = config_root(&dir);
    for file in [
        "ansible_client_configuration.yml",
        "ansible_variables.yml",
        "aws_client_configuration.yml",
        "aws_variables.yml",
    ] {
        let content = fs::read_to_string(root.join(file))
            .unwrap_or_else(|e| panic!("{file} should exist: {e}"));
        assert!(content.starts_with("---\n"), "{file} lacks a start marker");
    }
}

#[test]
fn test_changes_survive_a_reload() {
    let dir = TempDir::new().unwrap();

    let mut config = load(&dir);
    config.ansible_client_configuration.verbosity = 3;
    config.aws_client_configuration.region = "eu-west-1".to_string();
    config
        .ansible_variables
        .set("origin_ci_hosts", Value::from("masters"));
    config.persist().unwrap();

    let config = load(&dir);
    assert!(!config.ansible_client_configuration.is_new());
    assert_eq!(config.ansible_client_configuration.verbosity, 3);
    assert_eq!(config.aws_client_configuration.region, "eu-west-1");
    assert_eq!(
        config.ansible_variables.variables.get("origin_ci_hosts"),
        Some(&Value::from("masters"))
    );
    config.persist().unwrap();
}

#[test]
fn test_unchanged_objects_reload_identically() {
    let dir = TempDir::new().unwrap();
    load(&dir).persist().unwrap();

    let first = fs::read_to_string(config_root(&dir).join("aws_variables.yml")).unwrap();
    load(&dir).persist().unwrap();
    let second = fs::read_to_string(config_root(&dir).join("aws_variables.yml")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_corrupt_file_fails_the_load() {
    let dir = TempDir::new().unwrap();
    let root = config_root(&dir);
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("ansible_variables.yml"), "---\nvariables: [oops\n").unwrap();

    let result = Configuration::load_from(ConfigPaths::new(&root));
    assert!(matches!(result, Err(OctError::Deserialize { .. })));

    let content = fs::read_to_string(root.join("ansible_variables.yml")).unwrap();
    assert!(content.contains("[oops"), "corrupt file must not be overwritten");
}

#[test]
fn test_dropping_the_facade_still_saves() {
    let dir = TempDir::new().unwrap();

    fn bail_out(config: &mut Configuration) -> std::result::Result<(), &'static str> {
        config.ansible_client_configuration.remote_user = Some("ec2-user".to_string());
        Err("handler failed")
    }

    {
        let mut config = load(&dir);
        assert!(bail_out(&mut config).is_err());
    }

    let content =
        fs::read_to_string(config_root(&dir).join("ansible_client_configuration.yml")).unwrap();
    assert!(content.contains("remote_user: ec2-user"));
}

#[test]
fn test_run_playbook_composes_variables() {
    let dir = TempDir::new().unwrap();
    let (config, calls) = load_recording(&dir);

    let mut variables = VariableBag::new();
    variables.insert("origin_ci_hosts".to_string(), Value::from("masters"));

    let output = config
        .run_playbook("prepare/main", Some(&variables), None)
        .unwrap();
    assert!(output.success);

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    let invocation = &calls[0];

    assert_eq!(
        invocation.playbook,
        dir.path().join("playbooks").join("prepare").join("main.yml")
    );
    assert_eq!(invocation.inventory, config_root(&dir).join("inventory"));

    // Caller wins over core defaults; AWS defaults are carried along, client
    // settings are not
    let vars = &invocation.variables;
    assert_eq!(vars.get("origin_ci_hosts"), Some(&Value::from("masters")));
    assert_eq!(vars.get("origin_ci_connection"), Some(&Value::from("local")));
    assert_eq!(
        vars.get("origin_ci_aws_master_volume_size"),
        Some(&Value::from(50))
    );
    assert!(!vars.contains_key("origin_ci_aws_keypair_name"));
}

#[test]
fn test_aws_defaults_override_core_defaults() {
    let dir = TempDir::new().unwrap();
    let (mut config, calls) = load_recording(&dir);

    config.ansible_variables.set("shared", Value::from("core"));
    config.aws_variables.set("shared", Value::from("aws"));

    config.run_playbook("prepare/main", None, None).unwrap();
    assert_eq!(
        calls.borrow()[0].variables.get("shared"),
        Some(&Value::from("aws"))
    );
}

#[test]
fn test_run_playbook_applies_overrides() {
    let dir = TempDir::new().unwrap();
    let (mut config, calls) = load_recording(&dir);
    config.ansible_client_configuration.verbosity = 1;

    let overrides = OptionOverrides {
        verbosity: Some(4),
        check: Some(true),
        ..Default::default()
    };
    config
        .run_playbook("provision/vagrant-up", None, Some(&overrides))
        .unwrap();

    let calls = calls.borrow();
    assert_eq!(calls[0].verbosity, 4);
    assert!(calls[0].check);
    // Overrides are per call; the persisted setting is untouched
    assert_eq!(config.ansible_client_configuration.verbosity, 1);
}

#[test]
fn test_failed_playbook_is_reported() {
    let dir = TempDir::new().unwrap();
    let runner = RecordingRunner {
        exit_code: 2,
        ..Default::default()
    };
    let config = load(&dir).with_runner(Box::new(runner));

    let output = config.run_playbook("prepare/main", None, None).unwrap();
    assert!(!output.success);
    assert!(matches!(
        output.ensure_success(),
        Err(OctError::PlaybookFailed { code: 2, .. })
    ));
}

#[test]
fn test_engine_error_propagates_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = load(&dir).with_runner(Box::new(BrokenRunner));

    let result = config.run_playbook("prepare/main", None, None);
    assert!(matches!(result, Err(OctError::Spawn { .. })));
}

#[test]
fn test_invalid_playbook_identifier_never_reaches_engine() {
    let dir = TempDir::new().unwrap();
    let (config, calls) = load_recording(&dir);

    assert!(config.run_playbook("../escape", None, None).is_err());
    assert!(calls.borrow().is_empty());
}

#[test]
fn test_next_available_vagrant_name() {
    let dir = TempDir::new().unwrap();
    let config = load(&dir);
    assert_eq!(config.next_available_vagrant_name().unwrap(), "openshiftdevel");

    fs::create_dir(config.vagrant_home_directory("openshiftdevel")).unwrap();
    assert_eq!(config.next_available_vagrant_name().unwrap(), "openshiftdevel0");

    fs::create_dir(config.vagrant_home_directory("openshiftdevel0")).unwrap();
    assert_eq!(config.next_available_vagrant_name().unwrap(), "openshiftdevel1");
}

#[test]
fn test_registered_machines_are_scanned_at_load() {
    let dir = TempDir::new().unwrap();
    let vagrant = config_root(&dir).join("vagrant");
    fs::create_dir_all(vagrant.join("openshiftdevel")).unwrap();
    fs::write(
        vagrant.join("openshiftdevel").join("variables.yml"),
        "---\norigin_ci_vagrant_os: centos\n",
    )
    .unwrap();
    fs::create_dir_all(vagrant.join("boxes")).unwrap();

    let config = load(&dir);
    let machines = config.registered_vagrant_machines();
    assert_eq!(machines.len(), 1);
    assert_eq!(machines[0].hostname(), "openshiftdevel");
    assert_eq!(
        machines[0].variables().unwrap().get("origin_ci_vagrant_os"),
        Some(&Value::from("centos"))
    );

    // A later provision does not show up in the snapshot
    fs::create_dir_all(vagrant.join("openshiftdevel0")).unwrap();
    fs::write(vagrant.join("openshiftdevel0").join("variables.yml"), "---\n").unwrap();
    assert_eq!(config.registered_vagrant_machines().len(), 1);
    assert_eq!(load(&dir).registered_vagrant_machines().len(), 2);
}

#[test]
fn test_emptied_variable_files_stay_block_style() {
    let dir = TempDir::new().unwrap();

    let mut config = load(&dir);
    let keys: Vec<String> = config.ansible_variables.variables.keys().cloned().collect();
    for key in &keys {
        config.ansible_variables.unset(key);
    }
    assert!(config.ansible_variables.variables.is_empty());
    config.aws_variables.set("hosts", Value::Sequence(Vec::new()));
    config.persist().unwrap();

    let root = config_root(&dir);
    for file in ["ansible_variables.yml", "aws_variables.yml"] {
        let content = fs::read_to_string(root.join(file)).unwrap();
        assert!(!content.contains("{}"), "{file} uses flow style:\n{content}");
        assert!(!content.contains("[]"), "{file} uses flow style:\n{content}");
    }

    let config = load(&dir);
    assert!(!config.ansible_variables.is_new());
    assert!(config.ansible_variables.variables.is_empty());
    assert_eq!(config.aws_variables.get("hosts"), Some(&Value::Null));
    config.persist().unwrap();
}

fn dispatch(config: &mut Configuration, args: &[&str]) {
    let cli = Cli::try_parse_from(args.iter().copied()).expect("arguments should parse");
    commands::dispatch(&cli, config).expect("command should succeed");
}

#[test]
fn test_provision_remote_honours_aws_variables() {
    let dir = TempDir::new().unwrap();
    let (mut config, calls) = load_recording(&dir);

    dispatch(
        &mut config,
        &["oct", "configure", "variable", "--aws", "origin_ci_aws_region", "eu-west-1"],
    );
    dispatch(&mut config, &["oct", "provision", "remote", "--name", "dev"]);

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    let vars = &calls[0].variables;
    assert_eq!(vars.get("origin_ci_aws_region"), Some(&Value::from("eu-west-1")));
    assert_eq!(vars.get("origin_ci_aws_instance_name"), Some(&Value::from("dev")));
    assert_eq!(vars.get("origin_ci_aws_keypair_name"), Some(&Value::from("libra")));
    assert!(calls[0].playbook.ends_with("provision/aws-up.yml"));
}

#[test]
fn test_provision_remote_uses_client_settings_and_extra_vars() {
    let dir = TempDir::new().unwrap();
    let (mut config, calls) = load_recording(&dir);

    dispatch(&mut config, &["oct", "configure", "aws-client", "region", "ap-south-1"]);
    dispatch(
        &mut config,
        &["oct", "configure", "aws-client", "instance-type", "m5.large"],
    );
    dispatch(
        &mut config,
        &["oct", "provision", "remote", "-e", "origin_ci_aws_instance_type=t3.small"],
    );

    let calls = calls.borrow();
    let vars = &calls[0].variables;
    assert_eq!(vars.get("origin_ci_aws_region"), Some(&Value::from("ap-south-1")));
    // Command-line variables still win over everything
    assert_eq!(
        vars.get("origin_ci_aws_instance_type"),
        Some(&Value::from("t3.small"))
    );
}
