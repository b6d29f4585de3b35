use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::{env, fs};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use cem_core::config::{expand_path, Config};
use cem_core::context::ContextStore;
use cem_core::types::{ContextScope, RequestContext, Resource, Response};
use cem_guidance::{ActiveFilter, Disambiguation, Interaction, Refinement, Scenario, Suggestion};
use cem_render::{EncoderConfig, PlainValueFormatter, UrlActionEncoder};

/// A captured server exchange: the decoded response plus the context scopes
/// that came with it.
#[derive(Deserialize)]
struct Bundle {
    response: Response,
    #[serde(default)]
    contexts: Vec<ContextScope>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    group: String,
    query: String,
    did_you_mean: Vec<Suggestion>,
    ambiguities: Vec<Disambiguation>,
    filters: BTreeMap<String, Vec<ActiveFilter>>,
    refinements: Vec<Refinement>,
    scenarios: Vec<Scenario>,
    recommendations: Vec<Resource>,
    results: Vec<Resource>,
}

struct Args {
    bundle: PathBuf,
    group: Option<String>,
    config_dir: PathBuf,
    skip: HashSet<String>,
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} <bundle.json> [--group <id>] [--config-dir <dir>] [--skip <p1,p2>]");
    eprintln!("Example: {program} ~/captures/shoes.json --group search --skip category");
    std::process::exit(1);
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "cem-resolve".to_string());
    let mut bundle = None;
    let mut group = None;
    let mut config_dir = PathBuf::from(".");
    let mut skip = HashSet::new();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--group" | "-g" | "--config-dir" | "-c" | "--skip" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: {flag} requires a value");
                    usage(&program);
                };
                match flag {
                    "--group" | "-g" => group = Some(value.clone()),
                    "--config-dir" | "-c" => config_dir = expand_path(value),
                    _ => skip.extend(value.split(',').filter(|p| !p.is_empty()).map(str::to_string)),
                }
                i += 1;
            }
            "--help" | "-h" => usage(&program),
            _ if !flag.starts_with('-') => bundle = Some(expand_path(flag)),
            _ => {
                eprintln!("Error: unknown option {flag}");
                usage(&program);
            }
        }
        i += 1;
    }

    let Some(bundle) = bundle else { usage(&program) };
    Args { bundle, group, config_dir, skip }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    let config = Config::load_in(&args.config_dir).context("loading configuration")?;
    let policy = config.policy()?;
    let encoder_config = EncoderConfig::from_config(&config).context("reading [encoder]")?;

    let raw = fs::read_to_string(&args.bundle).with_context(|| format!("reading {}", args.bundle.display()))?;
    let bundle: Bundle = serde_json::from_str(&raw).with_context(|| format!("decoding {}", args.bundle.display()))?;
    tracing::info!(bundle = %args.bundle.display(), contexts = bundle.contexts.len(), "bundle loaded");

    let mut contexts = ContextStore::new();
    contexts.merge(bundle.contexts);

    let encoder = UrlActionEncoder::new(encoder_config);
    let formatter = PlainValueFormatter;
    let interaction = Interaction::new(&bundle.response, &contexts, &encoder, &formatter, policy);
    let request = args.group.map(RequestContext::new).unwrap_or_else(|| interaction.request());
    if bundle.response.group(&request.group).is_none() {
        tracing::warn!(group = %request.group, "group not present in response");
    }

    let report = Report {
        group: request.group.clone(),
        query: interaction.active_query(),
        did_you_mean: interaction.active_did_you_mean(&request),
        ambiguities: interaction.active_ambiguities(&request),
        filters: interaction.active_filters(&request),
        refinements: interaction.refinements(&request),
        scenarios: interaction.scenarios(&request, &args.skip),
        recommendations: interaction.recommendations(&request, &args.skip),
        results: interaction.results(&request),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
