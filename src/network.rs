/*
 *  network.rs
 *
 *  WiiMon - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *	Link bring-up, network time and the wall clock
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
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};
use log::{debug, info, warn};
use sntpc::{NtpContext, StdTimestampGen};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;

use crate::config::NetworkSettings;
use crate::constants::NTP_PORT;

const NTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("reconnect command failed: {0}")]
    Command(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot resolve {0}")]
    Resolve(String),
    #[error("time sync failed: {0}")]
    TimeSync(String),
    #[error("time sync timed out after {0:?}")]
    Timeout(Duration),
}

/// Bringing the device online and setting its clock.
#[async_trait]
pub trait Link: Send {
    async fn connect(&mut self) -> Result<(), NetworkError>;
    async fn sync_time(&mut self) -> Result<(), NetworkError>;
}

/// Local wall time for the clock face.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Microseconds to add to the system clock, as measured by SNTP.
#[derive(Debug, Clone, Default)]
pub struct ClockCorrection(Arc<AtomicI64>);

impl ClockCorrection {
    pub fn set_micros(&self, micros: i64) {
        self.0.store(micros, Ordering::Relaxed);
    }

    pub fn micros(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// System time, corrected by the last SNTP result, shown at a fixed offset.
#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
    correction: ClockCorrection,
}

impl SystemClock {
    pub fn new(timezone_offset_secs: i32, correction: ClockCorrection) -> Self {
        let offset = FixedOffset::east_opt(timezone_offset_secs).unwrap_or_else(|| Utc.fix());
        Self { offset, correction }
    }
}

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let corrected = Utc::now() + TimeDelta::microseconds(self.correction.micros());
        corrected.with_timezone(&self.offset)
    }
}

/// The real link: an optional shell command (wifi join, dhcp kick, ...) and
/// SNTP against the configured server.
#[derive(Debug, Clone)]
pub struct HostLink {
    settings: NetworkSettings,
    correction: ClockCorrection,
}

impl HostLink {
    pub fn new(settings: NetworkSettings, correction: ClockCorrection) -> Self {
        Self { settings, correction }
    }

    async fn query_ntp(&self) -> Result<i64, NetworkError> {
        let server = self.settings.ntp_server.as_str();
        let addr = tokio::net::lookup_host((server, NTP_PORT))
            .await?
            .find(|a| a.is_ipv4())
            .ok_or_else(|| NetworkError::Resolve(server.to_string()))?;

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let context = NtpContext::new(StdTimestampGen::default());
        let result = sntpc::get_time(addr, &socket, context)
            .await
            .map_err(|e| NetworkError::TimeSync(format!("{:?}", e)))?;
        debug!("SNTP {} -> offset {}us, roundtrip {}us", addr, result.offset(), result.roundtrip());
        Ok(result.offset())
    }
}

#[async_trait]
impl Link for HostLink {
    async fn connect(&mut self) -> Result<(), NetworkError> {
        let Some(cmd) = self.settings.reconnect_command.as_deref() else {
            debug!("no reconnect command configured");
            return Ok(());
        };
        info!("Reconnecting: {}", cmd);
        let status = tokio::process::Command::new("sh").arg("-c").arg(cmd).status().await?;
        if !status.success() {
            return Err(NetworkError::Command(format!("`{}` exited with {}", cmd, status)));
        }
        Ok(())
    }

    async fn sync_time(&mut self) -> Result<(), NetworkError> {
        let offset = tokio::time::timeout(NTP_TIMEOUT, self.query_ntp())
            .await
            .map_err(|_| NetworkError::Timeout(NTP_TIMEOUT))??;
        self.correction.set_micros(offset);
        info!("Clock synchronised against {} ({:+}us)", self.settings.ntp_server, offset);
        Ok(())
    }
}

/// Try to set the clock up to `attempts` times, sleeping `backoff` between
/// tries. Returns the last error if none succeeds.
pub async fn sync_time_with_retry<L: Link + ?Sized>(
    link: &mut L,
    attempts: u32,
    backoff: Duration,
) -> Result<(), NetworkError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match link.sync_time().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                warn!("Time sync attempt {}/{} failed: {}", attempt, attempts, e);
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("Time sync gave up after {} attempts: {}", attempts, e);
                return Err(e);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeLink;
    use super::*;

    #[test]
    fn system_clock_applies_offset_and_correction() {
        let correction = ClockCorrection::default();
        let clock = SystemClock::new(3600, correction.clone());
        assert_eq!(clock.now().offset().local_minus_utc(), 3600);

        let before = clock.now();
        correction.set_micros(2 * 3_600_000_000);
        let after = clock.now();
        let moved = (after - before).num_minutes();
        assert!((119..=121).contains(&moved), "moved {} minutes", moved);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        let clock = SystemClock::new(90_000, ClockCorrection::default());
        assert_eq!(clock.now().offset().local_minus_utc(), 0);
    }

    #[tokio::test]
    async fn retry_stops_at_first_success() {
        let mut link = FakeLink::default();
        link.sync_failures.store(2, Ordering::SeqCst);
        sync_time_with_retry(&mut link, 5, Duration::ZERO).await.unwrap();
        assert_eq!(link.syncs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_the_last_attempt() {
        let mut link = FakeLink::default();
        link.sync_failures.store(10, Ordering::SeqCst);
        let res = sync_time_with_retry(&mut link, 5, Duration::ZERO).await;
        assert!(matches!(res, Err(NetworkError::TimeSync(_))));
        assert_eq!(link.syncs.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn reconnect_command_exit_status_is_checked() {
        let ok = NetworkSettings { reconnect_command: Some("true".into()), ..NetworkSettings::default() };
        HostLink::new(ok, ClockCorrection::default()).connect().await.unwrap();

        let bad = NetworkSettings { reconnect_command: Some("exit 3".into()), ..NetworkSettings::default() };
        let res = HostLink::new(bad, ClockCorrection::default()).connect().await;
        assert!(matches!(res, Err(NetworkError::Command(_))));
    }

    #[tokio::test]
    async fn no_reconnect_command_is_a_no_op() {
        HostLink::new(NetworkSettings::default(), ClockCorrection::default())
            .connect()
            .await
            .unwrap();
    }
}
