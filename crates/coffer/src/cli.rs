//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Coffer - S3-compatible object storage with transparent encryption
#[derive(Parser, Debug)]
#[command(name = "coffer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to coffer.yaml connection config
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection overrides; each one beats the config file and `COFFER_*` variables
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Backend endpoint as host[:port] (e.g., 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Access key id
    #[arg(long, global = true)]
    pub access_key: Option<String>,

    /// Secret access key
    #[arg(
        long,
        global = true,
        env = "COFFER_SECRET_ACCESS_KEY",
        hide_env_values = true
    )]
    pub secret_key: Option<String>,

    /// Use TLS to reach the endpoint
    #[arg(long, global = true)]
    pub secure: bool,

    /// Region used for new buckets
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Encryption key file; enables transparent encryption
    #[arg(long, global = true)]
    pub key_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch an object
    Get(GetArgs),

    /// Store an object, creating its bucket if needed
    Set(SetArgs),

    /// Copy an object server-side
    Copy(CopyArgs),

    /// List objects
    List(ListArgs),

    /// Delete an object
    Delete(DeleteArgs),

    /// Count all objects
    Total,

    /// Show store statistics
    Info(InfoArgs),

    /// Erase every object version and bucket
    Reset(ResetArgs),

    /// Generate a new encryption key file
    Keygen(KeygenArgs),
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Bucket name
    pub bucket: String,

    /// Object name
    pub object: String,

    /// Write to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Bucket name
    pub bucket: String,

    /// Object name
    pub object: String,

    /// Object value
    #[arg(long, conflicts_with = "from_file", required_unless_present = "from_file")]
    pub value: Option<String>,

    /// Read value from file
    #[arg(long, conflicts_with = "value")]
    pub from_file: Option<PathBuf>,

    /// Content type stored with the object
    #[arg(long)]
    pub content_type: Option<String>,

    /// Make a newly created bucket publicly readable
    #[arg(long)]
    pub public: bool,
}

#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Source bucket name
    pub src_bucket: String,

    /// Source object name
    pub src_object: String,

    /// Destination bucket name
    pub dst_bucket: String,

    /// Destination object name
    pub dst_object: String,

    /// Make a newly created destination bucket publicly readable
    #[arg(long)]
    pub public: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list this bucket
    #[arg(long)]
    pub bucket: Option<String>,

    /// Only list keys starting with this prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Bucket name
    pub bucket: String,

    /// Object name
    pub object: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Where to write the key
    #[arg(short, long, default_value = "~/.coffer/key")]
    pub output: PathBuf,

    /// Overwrite an existing key file
    #[arg(short, long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_connection_flags() {
        let cli = Cli::try_parse_from([
            "coffer",
            "get",
            "bucket1",
            "object1",
            "--endpoint",
            "127.0.0.1:9000",
            "--access-key",
            "ROOTNAME",
            "--secret-key",
            "CHANGEME123",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.connection.endpoint.as_deref(), Some("127.0.0.1:9000"));
        assert!(!cli.connection.secure);
        match cli.command {
            Commands::Get(args) => {
                assert_eq!(args.bucket, "bucket1");
                assert_eq!(args.object, "object1");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_set_requires_exactly_one_source() {
        assert!(Cli::try_parse_from(["coffer", "set", "b", "o"]).is_err());
        assert!(Cli::try_parse_from([
            "coffer", "set", "b", "o", "--value", "v", "--from-file", "f"
        ])
        .is_err());

        let cli = Cli::try_parse_from(["coffer", "set", "b", "o", "--value", "v", "--public"])
            .unwrap();
        match cli.command {
            Commands::Set(args) => {
                assert_eq!(args.value.as_deref(), Some("v"));
                assert!(args.public);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
