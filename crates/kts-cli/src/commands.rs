use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use tokio::sync::Notify;

use kts_protocol::{CallDigest, CallName, Payload};
use kts_server::{KtsServer, MemoryBackend, RouterTransport, ServerConfig};
use kts_store::{subscriber, NamespaceKind, NamespaceSpec, Storage, StorageConfig};
use kts_sync::RequestBatcher;
use kts_types::{KeyPath, Segment, Value};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Demo(args) => cmd_demo(args),
        Command::Digest(args) => cmd_digest(args, cli.format),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start the async runtime")
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.bind_addr = bind.parse().with_context(|| format!("invalid bind address {bind}"))?;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let server = KtsServer::from_config(config)?;
    println!("{} KTS server on {}", "✓".green().bold(), server.config().bind_addr.to_string().bold());
    runtime()?.block_on(server.serve())?;
    Ok(())
}

fn cmd_digest(args: DigestArgs, format: OutputFormat) -> anyhow::Result<()> {
    let keys_json: serde_json::Value =
        serde_json::from_str(&args.keys).context("keys must be a JSON array")?;
    let keys = KeyPath::from_json(&keys_json)?;
    let value = match &args.value {
        Some(text) => Some(Value::from(
            serde_json::from_str::<serde_json::Value>(text).context("value must be JSON")?,
        )),
        None => None,
    };
    let call = CallName::from(args.call);
    let digest = CallDigest::of(&args.namespace, &call, &Payload { keys: keys.clone(), value });

    match format {
        OutputFormat::Text => {
            println!("{} {}", "digest:".bold(), digest.to_hex().yellow());
            println!("  namespace: {}", args.namespace);
            println!("  call:      {}", call.to_string().cyan());
            println!("  keys:      {keys}");
        }
        OutputFormat::Json => {
            println!(
                "{}",
                json!({
                    "digest": digest.to_hex(),
                    "namespace": args.namespace,
                    "call": call.as_str(),
                    "keys": keys,
                })
            );
        }
    }
    Ok(())
}

/// The configuration used when `kts demo` gets none.
fn demo_config() -> StorageConfig {
    StorageConfig {
        namespaces: vec![
            NamespaceSpec::local("prefs"),
            NamespaceSpec::remote("users", 1, 1),
        ],
        ..StorageConfig::default()
    }
}

fn cmd_demo(args: DemoArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => StorageConfig::load(path)?,
        None => demo_config(),
    };
    runtime()?.block_on(run_demo(config))
}

async fn run_demo(config: StorageConfig) -> anyhow::Result<()> {
    let Some(target) = config
        .namespaces
        .iter()
        .find(|entry| entry.kind == NamespaceKind::Remote && !entry.read_only)
    else {
        bail!("the demo needs a writable remote namespace");
    };
    let namespace = target.name.clone();

    let seed = Value::from(json!({ namespace.clone(): {"alice": {"name": "Alice", "role": "admin"}} }));
    let server = KtsServer::new(ServerConfig::default(), Arc::new(MemoryBackend::with_root(seed)));
    let transport = Arc::new(RouterTransport::new(server.router()));
    let batcher = RequestBatcher::new(transport, config.batch.clone());
    let storage = Storage::from_config(&config, Arc::new(batcher.clone()))?;

    let ns = |rest: &[&str]| -> KeyPath {
        std::iter::once(Segment::from(namespace.as_str()))
            .chain(rest.iter().map(|s| Segment::from(*s)))
            .collect()
    };

    // Read a key nobody has loaded yet, then wait for the subscription.
    let alice = ns(&["alice"]);
    let loaded = Arc::new(Notify::new());
    let notify = loaded.clone();
    storage.subscribe(&alice, subscriber(move || notify.notify_one()))?;

    println!("{} get {alice} -> {:?}", "1.".bold(), storage.get(&alice)?);
    println!("   loading: {}", storage.is_loading(&alice)?.to_string().yellow());
    tokio::time::timeout(Duration::from_secs(5), loaded.notified())
        .await
        .context("load did not complete")?;
    println!("   notified, get {alice} -> {}", show(storage.get(&alice)?));

    // Edit locally, then save.
    let bob = ns(&["bob"]);
    storage.set(&bob.child("name"), Value::from("Bob"))?;
    println!("{} set {} -> {}", "2.".bold(), bob.child("name"), show(storage.get(&bob)?));
    let confirmed = storage.save(&bob).await?;
    println!("{} save {bob} -> {}", "3.".bold(), confirmed.to_string().green());
    println!("   saving: {}", storage.is_saving(&bob)?);

    println!("{} get {bob} -> {}", "4.".bold(), show(storage.get(&bob)?));
    println!(
        "{} {} exchanges for {} namespaces",
        "✓".green().bold(),
        batcher.exchanges(),
        storage.names().len()
    );
    Ok(())
}

fn show(value: Option<Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "(absent)".dimmed().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_demo_runs() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(run_demo(demo_config())).unwrap();
    }

    #[test]
    fn demo_requires_a_writable_remote() {
        let config = StorageConfig {
            namespaces: vec![NamespaceSpec::local("prefs")],
            ..StorageConfig::default()
        };
        let rt = tokio::runtime::Runtime::new().unwrap();
        assert!(rt.block_on(run_demo(config)).is_err());
    }

    #[test]
    fn digest_accepts_both_formats() {
        let args = || DigestArgs {
            namespace: "users".into(),
            call: "save".into(),
            keys: r#"["a", 0]"#.into(),
            value: Some(r#"{"name": "X"}"#.into()),
        };
        cmd_digest(args(), OutputFormat::Text).unwrap();
        cmd_digest(args(), OutputFormat::Json).unwrap();
    }

    #[test]
    fn digest_rejects_bad_keys() {
        let args = DigestArgs {
            namespace: "users".into(),
            call: "load".into(),
            keys: r#"{"a": 1}"#.into(),
            value: None,
        };
        assert!(cmd_digest(args, OutputFormat::Text).is_err());
    }
}
