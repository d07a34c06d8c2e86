//! TFTP server - Main executable
//!
//! Serves the files of a single directory over TFTP (octet mode, RFC 1350).

use std::path::PathBuf;

use anyhow::{Result, ensure};
use argh::FromArgs;
use tftpd::run_folder_server;

const DEFAULT_BIND: &str = "0.0.0.0:6969"; // use 6969 for non-root testing; redirect or run as root for :69
const DEFAULT_ROOT: &str = "./tftp_root";

#[derive(FromArgs, Debug)]
#[argh(
    description = "TFTP server - serves the files of one directory",
    example = "Serve the current boot files:\n  {command_name} --root ./boot",
    example = "Listen on the privileged TFTP port:\n  {command_name} --bind 0.0.0.0:69 --root /tftpboot"
)]
struct CliConfig {
    #[argh(
        option,
        short = 'b',
        description = "server bind address",
        default = "DEFAULT_BIND.to_string()"
    )]
    bind: String,

    #[argh(
        option,
        short = 'r',
        description = "directory to serve",
        default = "PathBuf::from(DEFAULT_ROOT)"
    )]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config: CliConfig = argh::from_env();
    ensure!(
        config.root.is_dir(),
        "Root directory '{}' not found. Create it or pass --root.",
        config.root.display()
    );

    run_folder_server(config.bind, config.root).await
}
