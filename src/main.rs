/*
 *  main.rs
 *
 *  WiiMon - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;
use tokio::signal::unix::{SignalKind, signal};

use wiimon::config::{self, Cli};
use wiimon::display::create_driver;
use wiimon::monitor::PlaybackMonitor;
use wiimon::network::{ClockCorrection, HostLink, SystemClock};
use wiimon::transport::Transport;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP and logs which one arrived.
async fn signal_handler() -> Result<(), std::io::Error> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (cfg, settings) = config::load(&cli).context("loading configuration")?;

    if cli.dump_config {
        print!("{}", serde_yaml::to_string(&cfg)?);
        return Ok(());
    }

    let level = if cli.debug { "debug" } else { settings.log_level.as_str() };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("{} watching {}", env!("CARGO_PKG_NAME"), settings.host);
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let transport = Transport::new().context("building HTTP client")?;
    let driver = create_driver(&settings.display).context("opening panel")?;
    let correction = ClockCorrection::default();
    let link = HostLink::new(settings.network.clone(), correction.clone());
    let clock = SystemClock::new(settings.timezone_offset_secs, correction);

    let mut monitor = PlaybackMonitor::new(transport, &settings, driver, link, clock);
    monitor.start().await;

    tokio::select! {
        _ = monitor.run() => {}
        res = signal_handler() => res.context("installing signal handlers")?,
    }

    info!("Shut down");
    Ok(())
}
