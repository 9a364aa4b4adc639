//! `arlens-cli` – terminal driver for the AR overlay core.
//!
//! This binary runs one simulated AR session end to end. It:
//!
//! 1. Checks for `~/.arlens/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Builds the point-of-interest provider (bundled dataset, a local JSON
//!    file, or the gourmet-search service) and starts a [`Session`] fed by
//!    simulated compass, gyroscope and GPS drivers.
//! 3. Either replays the walk for a fixed time (`arlens replay [seconds]`),
//!    printing one overlay frame per second, or drops the user into an
//!    **interactive REPL**.
//! 4. Intercepts **Ctrl-C** to publish a shutdown alert and exit safely.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use arlens_hal::{Scenario, SimRig};
use arlens_middleware::Topic;
use arlens_runtime::{
    HttpPoiProvider, PoiProvider, Session, SessionConfig, StaticPoiProvider, WorldConfig,
    init_tracing,
};
use arlens_types::{ArError, Event, EventPayload};

use crate::config::{Config, ProviderKind};

const BUNDLED_DATASET: &str = include_str!("../data/shops.json");
const DEFAULT_REPLAY_SECS: u64 = 10;

enum Mode {
    Interactive,
    Replay(u64),
}

fn main() {
    // RUST_LOG selects the level (default "info"); ARLENS_LOG_FORMAT=json
    // switches to JSON lines; OTEL_EXPORTER_OTLP_ENDPOINT enables span export.
    // User-facing output still uses println!.
    let _telemetry = init_tracing("arlens");

    let mode = match parse_mode(std::env::args().skip(1)) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{}: {e}", "Usage error".red());
            eprintln!("  usage: arlens [replay [seconds]]");
            std::process::exit(2);
        }
    };

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => match mode {
            Mode::Interactive => run_first_run_wizard(),
            Mode::Replay(_) => {
                let mut cfg = Config::default();
                config::apply_env_overrides(&mut cfg);
                cfg
            }
        },
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let provider = match build_provider(&cfg) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("{}: {e}", "Provider error".red());
            std::process::exit(1);
        }
    };
    println!("  Provider: {}", provider.name().bold());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {e}", "Failed to start async runtime".red());
            std::process::exit(1);
        }
    };

    // ── Session ───────────────────────────────────────────────────────────
    let session_config = SessionConfig {
        world: WorldConfig {
            stabilizer: cfg.stabilizer_config(),
            ..WorldConfig::default()
        },
        projector: cfg.projector_config(),
        filters: cfg.filters.clone(),
        ..SessionConfig::default()
    };
    let scenario = Scenario {
        origin: cfg.origin,
        ..Scenario::default()
    };
    let rig = SimRig::new(scenario).with_all();
    let mut session = runtime.block_on(Session::start(session_config, provider, rig));
    info!(framing = %cfg.framing, stabilizer = %cfg.stabilizer, "session configured");

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let bus = session.bus().clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – initiating graceful shutdown …".yellow().bold());

        let stop_event = Event::new(
            "arlens-cli",
            EventPayload::Alert {
                component: "cli".to_string(),
                message: "operator Ctrl-C".to_string(),
            },
        );
        let _ = bus.publish_to(Topic::SystemAlerts, stop_event);

        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    match mode {
        Mode::Replay(secs) => runtime.block_on(replay(&mut session, secs, &shutdown)),
        Mode::Interactive => {
            println!();
            println!("  Type {} for a list of commands.\n", "/help".bold().cyan());
            repl::run(&mut session, shutdown);
        }
    }

    runtime.block_on(session.shutdown());
    println!("{}", "  ✓ Session stopped.".green());
}

fn parse_mode(mut args: impl Iterator<Item = String>) -> Result<Mode, ArError> {
    match args.next().as_deref() {
        None => Ok(Mode::Interactive),
        Some("replay") => match args.next() {
            None => Ok(Mode::Replay(DEFAULT_REPLAY_SECS)),
            Some(s) => s
                .parse::<u64>()
                .map(Mode::Replay)
                .map_err(|_| ArError::Config(format!("'{s}' is not a number of seconds"))),
        },
        Some(other) => Err(ArError::Config(format!("unknown mode '{other}'"))),
    }
}

fn build_provider(cfg: &Config) -> Result<Arc<dyn PoiProvider>, ArError> {
    let provider: Arc<dyn PoiProvider> = match cfg.provider {
        ProviderKind::Http => {
            let key = (!cfg.api_key.is_empty()).then(|| cfg.api_key.clone());
            if key.is_none() {
                warn!("no API key configured; the gourmet service will return no venues");
            }
            Arc::new(HttpPoiProvider::new(cfg.provider_url.clone(), key))
        }
        ProviderKind::Static => match &cfg.dataset {
            Some(path) => Arc::new(StaticPoiProvider::from_path(path)?),
            None => Arc::new(StaticPoiProvider::from_json(BUNDLED_DATASET)?),
        },
    };
    Ok(provider)
}

/// Let the simulated walk run for `secs`, printing a frame every second.
async fn replay(session: &mut Session, secs: u64, shutdown: &AtomicBool) {
    println!();
    println!("  Replaying {secs}s of simulated walk …\n");
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;

    for _ in 0..secs {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        ticker.tick().await;
        repl::print_frame(&session.frame(1.0));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       ARLens First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up ARLens.\n");

    let mut cfg = Config::default();

    println!("  Where should venues come from?");
    println!("    1) Bundled Shibuya dataset  (default, offline)");
    println!("    2) Gourmet-search web service");
    match prompt_line("  Enter choice [1]: ", "1").trim() {
        "2" => {
            cfg.provider = ProviderKind::Http;
            cfg.api_key = prompt_line("  API key: ", "");
        }
        _ => cfg.provider = ProviderKind::Static,
    }

    let framing = prompt_line(
        &format!("  Camera framing (portrait/landscape) [{}]: ", cfg.framing),
        &cfg.framing.to_string(),
    );
    if let Some(f) = config::FramingChoice::parse(&framing) {
        cfg.framing = f;
    }

    let stabilizer = prompt_line(
        &format!("  Heading stabilizer (complementary/deadzone) [{}]: ", cfg.stabilizer),
        &cfg.stabilizer.to_string(),
    );
    if let Some(s) = config::StabilizerChoice::parse(&stabilizer) {
        cfg.stabilizer = s;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___   ___  __                "#.bold().cyan());
    println!("{}", r#"  / _ | / _ \/ /  ___ ___  ___ "#.bold().cyan());
    println!("{}", r#" / __ |/ , _/ /__/ -_) _ \(_-< "#.bold().cyan());
    println!("{}", r#"/_/ |_/_/|_/____/\__/_//_/___/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "ARLens".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Restaurant overlay for the camera view");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> impl Iterator<Item = String> {
        v.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn mode_parsing() {
        assert!(matches!(parse_mode(args(&[])), Ok(Mode::Interactive)));
        assert!(matches!(parse_mode(args(&["replay"])), Ok(Mode::Replay(DEFAULT_REPLAY_SECS))));
        assert!(matches!(parse_mode(args(&["replay", "3"])), Ok(Mode::Replay(3))));
        assert!(parse_mode(args(&["replay", "soon"])).is_err());
        assert!(parse_mode(args(&["fly"])).is_err());
    }

    #[test]
    fn bundled_dataset_parses() {
        let provider = StaticPoiProvider::from_json(BUNDLED_DATASET).expect("bundled dataset");
        assert_eq!(provider.len(), 16);
    }

    #[test]
    fn static_provider_is_default() {
        let provider = build_provider(&Config::default()).expect("provider");
        assert_eq!(provider.name(), StaticPoiProvider::default().name());
    }
}
