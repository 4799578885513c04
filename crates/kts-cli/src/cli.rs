use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kts",
    about = "KeyTree Sync: layered key-tree storage with batched server sync",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the batch server
    Serve(ServeArgs),
    /// Run an in-process load/save round trip against a seeded server
    Demo(DemoArgs),
    /// Print the dedup digest of a call
    Digest(DigestArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Server configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Address to listen on, overriding the configuration
    #[arg(long)]
    pub bind: Option<String>,
    /// JSON file of initial data keyed by namespace
    #[arg(long)]
    pub seed: Option<PathBuf>,
}

#[derive(Args)]
pub struct DemoArgs {
    /// Storage configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct DigestArgs {
    pub namespace: String,
    /// `load`, `save` or a custom call name
    pub call: String,
    /// Key path as a JSON array, e.g. '["users", 0]'
    pub keys: String,
    /// Optional value as JSON
    pub value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::try_parse_from(["kts", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert!(args.config.is_none());
            assert!(args.bind.is_none());
            assert!(args.seed.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::try_parse_from(["kts", "serve", "--bind", "0.0.0.0:9000", "--seed", "data.json"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:9000".into()));
            assert_eq!(args.seed, Some(PathBuf::from("data.json")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_demo_with_config() {
        let cli = Cli::try_parse_from(["kts", "demo", "--config", "storage.toml"]).unwrap();
        if let Command::Demo(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("storage.toml")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_digest() {
        let cli = Cli::try_parse_from(["kts", "digest", "users", "load", r#"["a"]"#]).unwrap();
        if let Command::Digest(args) = cli.command {
            assert_eq!(args.namespace, "users");
            assert_eq!(args.call, "load");
            assert!(args.value.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn global_flags() {
        let cli = Cli::try_parse_from(["kts", "digest", "n", "save", "[]", "1", "-v", "--format", "json"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn missing_subcommand_fails() {
        assert!(Cli::try_parse_from(["kts"]).is_err());
    }
}
