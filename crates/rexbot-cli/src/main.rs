//! `rexbot` – the robot supervisor binary.
//!
//! 1. Reads settings from `~/.rexbot/config.toml`, `REXBOT_*` variables and
//!    the command line (later sources win).
//! 2. Resolves the viewer/operator access policy.
//! 3. Builds the devices, the web transport and its routes.
//! 4. Runs the supervision loop until SIGINT, SIGTERM, SIGHUP, SIGQUIT,
//!    SIGABRT or a fatal camera error, then shuts down in order.

mod config;
mod signals;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use rexbot_hal::sim::{SimCamera, SimLed, SimMotorDriver, SimRangeFinder};
use rexbot_hal::{Board, FrameSink, MotorsController, RangeFinder, StaticInfo};
use rexbot_kernel::{PolicyInputs, ShutdownSignal, resolve_policy};
use rexbot_runtime::{Collaborators, FileConfigStore, OPERATOR_ENDPOINT, ServiceLifecycle};
use rexbot_types::{AccessGroup, BotError, EffectivePolicy};
use rexbot_web::{ConfigHandler, CredentialsStore, InfoHandler, JpegHandler, WebServer};
use tracing::{info, warn};

use config::{Config, Settings};

/// Reported by `/version`.
const PRODUCT: &str = "rexbot";
const PLATFORM: &str = "RaspberryPi";

const CAMERA_DEVICE: &str = "Simulated Camera";
const CAMERA_TITLE: &str = "Front Camera";

/// Distance the simulated range finder reports.
const SIM_DISTANCE_CM: f32 = 120.0;

/// Remote-controlled camera robot supervisor.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (default: ~/.rexbot/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Video size: 0=320x240 1=480x360 2=640x480 3=800x600 4=1120x840
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=4))]
    size: Option<u8>,

    /// Camera frame rate, 1-30 (out-of-range values use 30)
    #[arg(long)]
    fps: Option<u32>,

    /// JPEG quality, clamped to 1-100
    #[arg(long = "jpeg")]
    jpeg_quality: Option<u32>,

    /// Port for the web server to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// HTTP digest authentication realm
    #[arg(long)]
    realm: Option<String>,

    /// htdigest users file; switches the default policy to viewer=user operator=admin
    #[arg(long, value_name = "PATH")]
    htpass: Option<PathBuf>,

    /// Group allowed to watch the camera: any, user, admin
    #[arg(long)]
    viewer: Option<AccessGroup>,

    /// Group allowed to drive the bot and change camera settings: any, user, admin
    #[arg(long)]
    operator: Option<AccessGroup>,

    /// File the camera settings are saved to
    #[arg(long = "camera-config", value_name = "PATH")]
    camera_config: Option<PathBuf>,

    /// Directory of web content to serve
    #[arg(long = "web", value_name = "DIR")]
    web_content: Option<PathBuf>,

    /// Bot name shown in the web UI
    #[arg(long)]
    title: Option<String>,

    /// Enable the distance sensor and its /distance endpoint
    #[arg(long)]
    distance: bool,
}

impl Cli {
    fn into_layer(self) -> Config {
        Config {
            size: self.size,
            fps: self.fps,
            jpeg_quality: self.jpeg_quality,
            port: self.port,
            realm: self.realm,
            htpass: self.htpass,
            viewer: self.viewer,
            operator: self.operator,
            camera_config: self.camera_config,
            web_content: self.web_content,
            title: self.title,
            distance_sensor: self.distance.then_some(true),
            ..Config::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _telemetry = rexbot_runtime::init_tracing(PRODUCT);

    print_banner();

    let settings = match load_settings(cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}: {e}", "Settings error".red());
            return ExitCode::FAILURE;
        }
    };

    let signal = ShutdownSignal::new();
    signals::install(&signal);

    match run(settings, signal) {
        Ok(()) => {
            println!("{}", "  ✓ Done.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", "Failed".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: Cli) -> Result<Settings, BotError> {
    let home = config::home_dir();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config::config_path_for_home(&home));

    let file = match config::load_from(&path)? {
        Some(cfg) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        None => Config::default(),
    };
    let layered = file.merge(config::env_layer()).merge(cli.into_layer());
    Settings::resolve(layered, &home)
}

fn resolve_access(settings: &Settings) -> (EffectivePolicy, Option<CredentialsStore>) {
    let credentials = settings.htpass.as_ref().map(|path| {
        CredentialsStore::load(path, &settings.realm).unwrap_or_else(|e| {
            // Keep the store so the restrictive default policy still applies.
            warn!(error = %e, "users file unavailable; no user will be able to log in");
            CredentialsStore::parse("", &settings.realm)
        })
    });

    let resolution = resolve_policy(PolicyInputs {
        has_credentials_store: credentials.is_some(),
        viewer_override: settings.viewer,
        operator_override: settings.operator,
        ..PolicyInputs::default()
    });
    if let Some(warning) = &resolution.warning {
        println!("  {} {warning}", "Warning:".yellow().bold());
    }
    (resolution.policy, credentials)
}

fn run(settings: Settings, signal: ShutdownSignal) -> Result<(), BotError> {
    let (policy, credentials) = resolve_access(&settings);
    info!(%policy, users = credentials.as_ref().map_or(0, |c| c.users().len()), "access policy resolved");

    // ── Devices ───────────────────────────────────────────────────────────
    let camera = Arc::new(SimCamera::new(settings.capture));
    let frames = FrameSink::new();
    let motors = Arc::new(MotorsController::new(Box::new(SimMotorDriver::new())));
    let range_finder = settings
        .distance_sensor
        .then(|| Arc::new(SimRangeFinder::new(SIM_DISTANCE_CM)));

    let version_info = StaticInfo::new()
        .with("product", PRODUCT)
        .with("version", env!("CARGO_PKG_VERSION"))
        .with("platform", PLATFORM);
    let bot_info = StaticInfo::new()
        .with("device", config::DEFAULT_TITLE)
        .with("title", settings.title.clone());
    let camera_info = StaticInfo::new()
        .with("device", CAMERA_DEVICE)
        .with("title", CAMERA_TITLE)
        .with("width", settings.capture.width.to_string())
        .with("height", settings.capture.height.to_string());

    // ── Transport ─────────────────────────────────────────────────────────
    let mut server = WebServer::new()
        .with_port(settings.port)
        .with_realm(settings.realm.clone());
    if let Some(dir) = &settings.web_content {
        server = server.with_document_root(dir, policy.viewer);
    }
    server
        .add_handler("/version", Arc::new(InfoHandler::new(Arc::new(version_info))), AccessGroup::Anyone)
        .add_handler("/info", Arc::new(InfoHandler::new(Arc::new(bot_info))), policy.viewer)
        .add_handler("/camera/info", Arc::new(InfoHandler::new(Arc::new(camera_info))), policy.viewer)
        .add_handler("/camera/config", Arc::new(ConfigHandler::new(camera.clone())), policy.operator)
        .add_handler(OPERATOR_ENDPOINT, Arc::new(ConfigHandler::new(motors.clone())), policy.operator)
        .add_handler("/camera/jpeg", Arc::new(JpegHandler::new(Arc::clone(&frames))), policy.viewer);
    if let Some(range_finder) = &range_finder {
        server.add_handler(
            "/distance",
            Arc::new(InfoHandler::new(range_finder.clone())),
            policy.viewer,
        );
    }
    let port = server.port();

    // ── Lifecycle ─────────────────────────────────────────────────────────
    let parts = Collaborators {
        board: Board::new()
            .with_power_led(Box::new(SimLed::new("power")))
            .with_activity_led(Box::new(SimLed::new("activity"))),
        transport: Box::new(server),
        camera: camera.clone(),
        frames,
        motors,
        store: Box::new(FileConfigStore::new(&settings.camera_config, camera)),
        range_finder: range_finder.map(|r| r as Arc<dyn RangeFinder>),
    };
    let mut lifecycle = ServiceLifecycle::new(settings.supervisor.clone(), parts, signal);

    println!(
        "  {} {}x{} @ {} fps, web server on port {}",
        settings.title.bold(),
        settings.capture.width,
        settings.capture.height,
        settings.capture.frame_rate,
        port.to_string().bold()
    );
    println!("  Ctrl+C to stop.\n");

    lifecycle.run()
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___           ___       __ "#.bold().cyan());
    println!("{}", r#"  / _ \___ __ __/ _ )___  / /_"#.bold().cyan());
    println!("{}", r#" / , _/ -_)\ \ / _  / _ \/ __/"#.bold().cyan());
    println!("{}", r#"/_/|_|\__//_\_\____/\___/\__/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "RexBot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Remote-controlled camera robot");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_become_a_layer() {
        let cli = Cli::try_parse_from([
            "rexbot", "--size", "1", "--fps", "15", "--jpeg", "80", "--port", "9000",
            "--viewer", "any", "--operator", "admin", "--title", "Rex", "--distance",
        ])
        .expect("parse");
        let layer = cli.into_layer();
        assert_eq!(layer.size, Some(1));
        assert_eq!(layer.fps, Some(15));
        assert_eq!(layer.jpeg_quality, Some(80));
        assert_eq!(layer.port, Some(9000));
        assert_eq!(layer.viewer, Some(AccessGroup::Anyone));
        assert_eq!(layer.operator, Some(AccessGroup::Admin));
        assert_eq!(layer.title.as_deref(), Some("Rex"));
        assert_eq!(layer.distance_sensor, Some(true));
    }

    #[test]
    fn absent_flags_leave_layer_empty() {
        let cli = Cli::try_parse_from(["rexbot"]).expect("parse");
        assert_eq!(cli.into_layer(), Config::default());
    }

    #[test]
    fn size_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["rexbot", "--size", "5"]).is_err());
    }

    #[test]
    fn unknown_group_is_rejected() {
        assert!(Cli::try_parse_from(["rexbot", "--viewer", "root"]).is_err());
    }

    fn settings_with(cfg: Config) -> Settings {
        Settings::resolve(cfg, std::path::Path::new("/tmp")).unwrap()
    }

    #[test]
    fn overrides_without_users_file_are_dropped() {
        let settings = settings_with(Config {
            operator: Some(AccessGroup::Admin),
            ..Config::default()
        });
        let (policy, credentials) = resolve_access(&settings);
        assert!(credentials.is_none());
        assert_eq!(policy, EffectivePolicy::default());
    }

    #[test]
    fn users_file_tightens_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let users = dir.path().join("users.htdigest");
        std::fs::write(&users, "pilot:rexbot:abcd\n").unwrap();
        let settings = settings_with(Config {
            htpass: Some(users),
            ..Config::default()
        });
        let (policy, credentials) = resolve_access(&settings);
        assert_eq!(policy.viewer, AccessGroup::User);
        assert_eq!(policy.operator, AccessGroup::Admin);
        assert_eq!(credentials.unwrap().users(), &["pilot".to_string()]);
    }

    #[test]
    fn missing_users_file_still_counts_as_configured() {
        let settings = settings_with(Config {
            htpass: Some(PathBuf::from("/nonexistent/users.htdigest")),
            viewer: Some(AccessGroup::Anyone),
            ..Config::default()
        });
        let (policy, credentials) = resolve_access(&settings);
        assert!(credentials.unwrap().users().is_empty());
        assert_eq!(policy.viewer, AccessGroup::Anyone);
        assert_eq!(policy.operator, AccessGroup::Admin);
    }
}
