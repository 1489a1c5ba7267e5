//! ringbridge headless host.
//!
//! Runs a `ToneEngine` on the producer cadence and plays it through the
//! output device, logging bridge diagnostics while it runs.
//!
//! ```text
//! ringbridge [--settings <file.json>] [--device <name>] [--seconds <n>]
//!            [--list-devices] [--init-settings]
//! ```

mod settings;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use ringbridge_core::{
    audio::device::list_output_devices, BridgeSession, SessionStatus, ToneEngine,
};
use settings::{default_settings_path, load_settings, save_settings, AppSettings};
use tracing::{error, info, warn};

#[derive(Debug, Default)]
struct Args {
    settings_path: Option<PathBuf>,
    device: Option<String>,
    seconds: Option<u64>,
    list_devices: bool,
    init_settings: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --settings");
                };
                args.settings_path = Some(PathBuf::from(v));
            }
            "--device" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --device");
                };
                args.device = Some(v);
            }
            "--seconds" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --seconds");
                };
                args.seconds = Some(v.parse().context("invalid value for --seconds")?);
            }
            "--list-devices" => args.list_devices = true,
            "--init-settings" => args.init_settings = true,
            "--help" | "-h" => {
                println!(
                    "Usage: ringbridge [--settings <file.json>] [--device <name>] \
                     [--seconds <n>] [--list-devices] [--init-settings]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    Ok(args)
}

fn main() {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ringbridge=info")),
        )
        .init();

    if let Err(e) = run() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = parse_args()?;

    if args.list_devices {
        for device in list_output_devices() {
            println!(
                "{}{}",
                device.name,
                if device.is_default { "  (default)" } else { "" }
            );
        }
        return Ok(());
    }

    let settings_path = args.settings_path.unwrap_or_else(default_settings_path);
    if args.init_settings {
        save_settings(&settings_path, &AppSettings::default())
            .with_context(|| format!("writing {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "default settings written");
        return Ok(());
    }

    let mut app_settings = load_settings(&settings_path);
    if let Some(device) = args.device {
        app_settings.preferred_output_device = Some(device);
    }
    if let Some(seconds) = args.seconds {
        app_settings.run_seconds = seconds;
    }
    app_settings.normalize();
    info!(
        settings_path = ?settings_path,
        waveform = ?app_settings.waveform,
        frequency_hz = app_settings.frequency_hz,
        buffer_len = app_settings.buffer_len,
        tick_hz = app_settings.tick_hz,
        target_latency_ms = app_settings.target_latency_ms,
        "settings loaded"
    );

    // ── Session setup ─────────────────────────────────────────────────────
    let engine = ToneEngine::new(app_settings.tone_config()).context("tone engine setup")?;
    let session = BridgeSession::new(app_settings.session_config());
    session
        .start(Box::new(engine))
        .context("session start")?;

    let report_every = Duration::from_millis(app_settings.report_interval_ms);
    let run_for = (app_settings.run_seconds > 0)
        .then(|| Duration::from_secs(app_settings.run_seconds));
    let started = Instant::now();

    loop {
        thread::sleep(report_every);

        let snap = session.diagnostics_snapshot();
        let available = session.ring().map(|r| r.available()).unwrap_or(0);
        info!(
            ticks = snap.ticks,
            produced = snap.samples_produced,
            rendered = snap.samples_rendered,
            available,
            overruns = snap.overruns,
            underruns = snap.underruns,
            "bridge"
        );

        if session.status() != SessionStatus::Running {
            warn!(status = ?session.status(), "session left the running state");
            break;
        }
        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
    }

    if session.is_running() {
        session.stop().context("session stop")?;
    }
    Ok(())
}
