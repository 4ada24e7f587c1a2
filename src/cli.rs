use clap::{ArgAction, Parser, Subcommand};

use crate::ansible_client::ClientOption;
use crate::aws::AwsOption;

/// oct - provision and configure OpenShift development VMs
#[derive(Parser)]
#[command(name = "oct")]
#[command(about = "Provision and configure OpenShift development VMs with Ansible")]
#[command(version)]
pub struct Cli {
    /// Increase Ansible verbosity (repeat for more, up to -vvvvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Run playbooks in check mode without changing anything
    #[arg(long, global = true)]
    pub check: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or change the persisted configuration
    Configure {
        #[command(subcommand)]
        action: ConfigureCommands,
    },
    /// Provision a new virtual machine
    Provision {
        #[command(subcommand)]
        target: ProvisionCommands,
    },
    /// Prepare provisioned machines for development
    Prepare {
        /// Playbook to run, relative to the playbook directory
        #[arg(long, default_value = "prepare/main")]
        playbook: String,
        /// Extra variable as key=value (repeatable)
        #[arg(short = 'e', long = "extra-var")]
        extra_vars: Vec<String>,
    },
    /// Local Vagrant virtual machines
    Vms {
        #[command(subcommand)]
        action: VmCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigureCommands {
    /// Print every configuration file
    Show,
    /// Change an Ansible client setting
    AnsibleClient {
        /// Setting name (e.g. verbosity, check, remote-user)
        option: ClientOption,
        /// New value ("none" clears optional settings)
        value: String,
    },
    /// Change an AWS client setting
    AwsClient {
        /// Setting name (e.g. region, keypair-name, private-key-path)
        option: AwsOption,
        /// New value ("none" clears optional settings)
        value: String,
    },
    /// Set a default playbook variable
    Variable {
        /// Set the variable for AWS playbooks instead
        #[arg(long)]
        aws: bool,
        key: String,
        value: String,
    },
    /// Remove a default playbook variable
    UnsetVariable {
        /// Remove the variable from the AWS variables instead
        #[arg(long)]
        aws: bool,
        key: String,
    },
}

#[derive(Subcommand)]
pub enum ProvisionCommands {
    /// Provision a local VM with Vagrant
    Local {
        /// Hostname for the VM (default: next free openshiftdevel name)
        #[arg(long)]
        hostname: Option<String>,
        /// Operating system of the VM
        #[arg(long, default_value = "centos")]
        os: String,
        /// Image stage to start from
        #[arg(long, default_value = "install")]
        stage: String,
        /// Vagrant provider
        #[arg(long, default_value = "libvirt")]
        provider: String,
        /// Extra variable as key=value (repeatable)
        #[arg(short = 'e', long = "extra-var")]
        extra_vars: Vec<String>,
    },
    /// Provision a remote VM on AWS
    Remote {
        /// Name tag for the instance
        #[arg(long)]
        name: Option<String>,
        /// Extra variable as key=value (repeatable)
        #[arg(short = 'e', long = "extra-var")]
        extra_vars: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum VmCommands {
    /// List provisioned local VMs
    List,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
