//! Developer CLI for exercising the rule-set compiler and selector against
//! an in-memory or JSON-file rule set (§4.J). Not part of the crate's core;
//! a thin `clap`-derived front end over the library, in the pack's
//! convention (e.g. `jitos-cli`).

use clap::{Parser, Subcommand};
use gateway_selector::{
    CompilerOptions, Context, GatewayConfig, InMemoryRepository, Rule, RuleSet, RuleSetCompiler,
    SelectorOptions,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile and evaluate PIX gateway-selector rule sets")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a rule-set bundle and print a summary of the snapshot.
    Compile {
        /// Path to a JSON file with {"ruleset", "rules", "gateways"}.
        #[arg(long)]
        file: PathBuf,
    },
    /// Compile a rule-set bundle and evaluate a single context against it.
    Select {
        #[arg(long)]
        file: PathBuf,
        /// Inline JSON context, e.g. '{"api_user_id": 101, "amount": "42.00"}'.
        #[arg(long)]
        context: Option<String>,
        /// Disallow falling back to the rule set's default gateway.
        #[arg(long)]
        no_fallback: bool,
    },
}

/// On-disk shape for a standalone rule-set bundle file.
#[derive(Debug, Deserialize)]
struct RuleSetBundle {
    ruleset: RuleSet,
    rules: Vec<Rule>,
    gateways: Vec<GatewayConfig>,
}

fn load_bundle(path: &PathBuf) -> Result<InMemoryRepository, Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)?;
    let bundle: RuleSetBundle = serde_json::from_str(&raw)?;

    let mut repo = InMemoryRepository::new().with_ruleset(bundle.ruleset);
    for gw in bundle.gateways {
        repo = repo.with_gateway(gw);
    }
    for rule in bundle.rules {
        repo = repo.with_rule(rule);
    }
    Ok(repo)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    match args.command {
        Command::Compile { file } => {
            let repo = load_bundle(&file)?;
            let compiler = RuleSetCompiler::new(&repo);
            let snapshot = compiler.compile(None, CompilerOptions::default(), None).await?;
            println!(
                "ruleset_id={} version={} name={} rules={} gateways={} default_gateway={:?} loaded_at_ms={}",
                snapshot.ruleset_id,
                snapshot.version,
                snapshot.name,
                snapshot.total_rules,
                snapshot.gateways.len(),
                snapshot.default_gateway,
                snapshot.loaded_at_ms
            );
        }
        Command::Select { file, context, no_fallback } => {
            let repo = load_bundle(&file)?;
            let compiler = RuleSetCompiler::new(&repo);
            let snapshot = compiler.compile(None, CompilerOptions::default(), None).await?;

            let ctx_json = match context {
                Some(inline) => inline,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let fields: HashMap<String, serde_json::Value> = serde_json::from_str(&ctx_json)?;
            let ctx = Context::from_map(fields);

            let options = SelectorOptions { allow_fallback: !no_fallback };
            let (gateway, decision) = gateway_selector::select(&ctx, &snapshot, options, None);

            println!(
                "gateway={:?} matched_rule_id={:?} route={:?} reason={}",
                gateway.map(|g| g.name.as_str()),
                decision.matched_rule_id,
                decision.route,
                decision.reason
            );
        }
    }

    Ok(())
}
