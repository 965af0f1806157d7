use std::env;

use kaspa_consensus_core::tx::{ScriptPublicKey, TransactionOutput};
use stateful_covenants::config::EngineConfig;
use tracing::{Level, debug};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err("usage: covenant-inspect <script-hex> [--value sompi] [--config engine.json] [--verbose]".to_string());
    }

    let mut script_hex: Option<String> = None;
    let mut value = 0u64;
    let mut config_path: Option<String> = None;
    let mut verbose = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--value" => {
                let raw = args.get(i + 1).ok_or_else(|| "--value requires an amount".to_string())?;
                value = raw.parse().map_err(|err| format!("invalid --value {raw}: {err}"))?;
                i += 2;
            }
            "--config" => {
                let path = args.get(i + 1).ok_or_else(|| "--config requires a path".to_string())?;
                config_path = Some(path.clone());
                i += 2;
            }
            "--verbose" | "-v" => {
                verbose = true;
                i += 1;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}"));
            }
            arg => {
                if script_hex.is_some() {
                    return Err("only one script is supported".to_string());
                }
                script_hex = Some(arg.to_string());
                i += 1;
            }
        }
    }

    tracing_subscriber::fmt().with_writer(std::io::stderr).with_max_level(if verbose { Level::DEBUG } else { Level::WARN }).init();

    let config = match &config_path {
        Some(path) => EngineConfig::from_path(path).map_err(|err| err.to_string())?,
        None => EngineConfig::default(),
    };
    debug!(target: "covenant::inspect", network = ?config.network, programs = config.programs.len(), "loaded engine config");

    let script_hex = script_hex.ok_or_else(|| "missing script".to_string())?;
    let script = hex::decode(script_hex.trim().trim_start_matches("0x")).map_err(|err| format!("invalid script hex: {err}"))?;
    let output = TransactionOutput::new(value, ScriptPublicKey::new(0, script.into()));

    let summary = config.codec().describe(&output).map_err(|err| err.to_string())?;
    let json = serde_json::to_string_pretty(&summary).map_err(|err| format!("failed to serialize output: {err}"))?;
    println!("{json}");
    Ok(())
}
