//! CLI definition using clap.
//!
//! OpenStack credentials fall back to the usual `OS_*` environment variables.

use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use rbd_lineage::openstack::Credentials;

/// Plot the lineage of RBD images and list those OpenStack no longer references
#[derive(Parser, Debug)]
#[command(name = "rbd-lineage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// OpenStack administrator username
    #[arg(long, env = "OS_USERNAME")]
    pub os_username: String,

    /// OpenStack administrator password
    #[arg(long, env = "OS_PASSWORD", hide_env_values = true)]
    pub os_password: String,

    /// OpenStack administrator project name
    #[arg(long, env = "OS_PROJECT_NAME")]
    pub os_project_name: String,

    /// OpenStack auth url endpoint
    #[arg(long, env = "OS_AUTH_URL")]
    pub os_auth_url: String,

    #[arg(long, env = "OS_USER_DOMAIN_NAME", default_value = "default")]
    pub os_user_domain_name: String,

    #[arg(long, env = "OS_PROJECT_DOMAIN_NAME", default_value = "default")]
    pub os_project_domain_name: String,

    /// Pool to scan
    #[arg(short, long, default_value = "cinder")]
    pub pool: String,

    /// Ceph configuration file
    #[arg(short = 'c', long = "conf", value_name = "FILE", default_value = "/etc/ceph/ceph.conf")]
    pub conf: PathBuf,

    /// Ceph user to use to connect
    #[arg(short, long, default_value = "cinder")]
    pub user: String,

    /// Output file for the graph
    #[arg(short, long, default_value = "plot-rbd.dot")]
    pub output: PathBuf,

    /// Optional config file path
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Images to start from; every image of the pool except volumes and disks if omitted
    pub volumes: Vec<String>,
}

impl Cli {
    /// Log threshold for the number of `-v` given
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            auth_url: self.os_auth_url.clone(),
            username: self.os_username.clone(),
            password: self.os_password.clone(),
            project_name: self.os_project_name.clone(),
            user_domain_name: self.os_user_domain_name.clone(),
            project_domain_name: self.os_project_domain_name.clone(),
        }
    }
}
