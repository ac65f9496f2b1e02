/*
 *  monitor.rs
 *
 *  WiiMon - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *	Playback monitor: the poll loop and its state
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
use log::{debug, error, info, warn};

use crate::artwork::{ArtOutcome, ArtPipeline};
use crate::config::{NetworkSettings, PollSettings, Settings};
use crate::display::{Compositor, DisplayDriver, DisplayMode};
use crate::network::{Link, WallClock, sync_time_with_retry};
use crate::transport::HttpFetch;
use crate::wiim::{PlaybackStatus, WiimClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Playing,
}

/// Text currently shown in the overlay bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub artist: String,
    pub title: String,
}

/// What a single poll cycle did.
#[derive(Debug)]
pub struct CycleReport {
    pub mode: DisplayMode,
    pub metadata_fetched: bool,
    pub art: Option<ArtOutcome>,
    pub overlay: Option<NowPlaying>,
    pub clock_rendered: bool,
    pub reconnected: bool,
}

impl Default for CycleReport {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Clock,
            metadata_fetched: false,
            art: None,
            overlay: None,
            clock_rendered: false,
            reconnected: false,
        }
    }
}

/// Owns every piece of mutable state: counters, the applied track, the art
/// cache key, and (through the compositor) the panel.
pub struct PlaybackMonitor<T, D, L, C> {
    client: WiimClient<T>,
    art: ArtPipeline<T>,
    compositor: Compositor<D>,
    link: L,
    clock: C,
    poll: PollSettings,
    network: NetworkSettings,

    phase: Phase,
    showing_clock: bool,
    idle: u32,
    errors: u32,
    applied_title: String,
    art_key: String,
}

impl<T, D, L, C> PlaybackMonitor<T, D, L, C>
where
    T: HttpFetch + Clone,
    D: DisplayDriver,
    L: Link,
    C: WallClock,
{
    pub fn new(transport: T, settings: &Settings, driver: D, link: L, clock: C) -> Self {
        Self {
            client: WiimClient::new(transport.clone(), &settings.host),
            art: ArtPipeline::new(transport, settings.art.clone()),
            compositor: Compositor::new(driver),
            link,
            clock,
            poll: settings.poll.clone(),
            network: settings.network.clone(),
            phase: Phase::Idle,
            showing_clock: true,
            idle: 0,
            errors: 0,
            applied_title: String::new(),
            art_key: String::new(),
        }
    }

    pub fn phase(&self) -> Phase { self.phase }
    pub fn idle_count(&self) -> u32 { self.idle }
    pub fn error_count(&self) -> u32 { self.errors }
    pub fn applied_title(&self) -> &str { &self.applied_title }
    pub fn art_key(&self) -> &str { &self.art_key }
    pub fn compositor(&self) -> &Compositor<D> { &self.compositor }

    /// The clock holds the panel from start-up, after a reconnect, and once
    /// the idle threshold is crossed. A playing poll hands it to the track.
    pub fn mode(&self) -> DisplayMode {
        if self.showing_clock {
            DisplayMode::Clock
        } else {
            DisplayMode::NowPlaying
        }
    }

    /// Bring the link up, set the clock, show the time.
    pub async fn start(&mut self) {
        info!("Monitoring {}", self.client.status_url());
        self.bring_up().await;
        self.phase = Phase::Idle;
        self.showing_clock = true;
        self.render_clock();
    }

    /// Poll forever.
    pub async fn run(&mut self) {
        loop {
            let report = self.poll_once().await;
            debug!("cycle: {:?} idle={} errors={}", report.mode, self.idle, self.errors);
            tokio::time::sleep(self.poll.interval).await;
        }
    }

    pub async fn poll_once(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        match self.client.fetch_status().await {
            Err(e) => {
                self.errors += 1;
                warn!("Status poll failed ({}): {}", self.errors, e);
                if self.errors > self.poll.error_threshold {
                    self.recover().await;
                    report.reconnected = true;
                }
            }
            Ok(status) => {
                self.errors = 0;
                match status.status {
                    PlaybackStatus::Playing => self.on_playing(&status.title, &mut report).await,
                    PlaybackStatus::Stopped => self.on_idle(),
                }
            }
        }

        report.mode = self.mode();
        if report.mode == DisplayMode::Clock {
            report.clock_rendered = self.render_clock();
        }
        report
    }

    async fn on_playing(&mut self, title: &str, report: &mut CycleReport) {
        self.phase = Phase::Playing;
        self.showing_clock = false;
        self.idle = 0;

        if title == self.applied_title {
            return;
        }

        let meta = match self.client.fetch_track_metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Track metadata unavailable: {}", e);
                return;
            }
        };
        report.metadata_fetched = true;
        info!("Now playing: {} - {}", meta.display_artist(), meta.title);

        if meta.album_art_uri != self.art_key {
            let outcome = self.art.acquire_and_render(&meta.album_art_uri, &mut self.compositor).await;
            if !outcome.is_ok() {
                warn!("Album art incomplete ({} error(s)) for {}", outcome.errors.len(), outcome.url);
            }
            self.art_key = meta.album_art_uri.clone();
            report.art = Some(outcome);
        }
        self.applied_title = title.to_string();

        let now_playing = NowPlaying {
            artist: meta.display_artist().to_string(),
            title: meta.title.clone(),
        };
        match self.compositor.render_now_playing(&now_playing.artist, &now_playing.title) {
            Ok(()) => report.overlay = Some(now_playing),
            Err(e) => warn!("Overlay render failed: {}", e),
        }
    }

    fn on_idle(&mut self) {
        self.phase = Phase::Idle;
        self.idle += 1;
        if self.idle > self.poll.idle_threshold {
            debug!("idle for {} polls, dropping track cache", self.idle);
            self.idle = 0;
            self.forget_track();
            self.showing_clock = true;
        }
    }

    async fn recover(&mut self) {
        error!("{} consecutive poll failures, reconnecting", self.errors);
        self.forget_track();
        self.bring_up().await;
        self.idle = 0;
        self.errors = 0;
        self.phase = Phase::Idle;
        self.showing_clock = true;
    }

    async fn bring_up(&mut self) {
        if let Err(e) = self.link.connect().await {
            warn!("Connect failed: {}", e);
        }
        if let Err(e) = sync_time_with_retry(
            &mut self.link,
            self.network.time_sync_attempts,
            self.network.time_sync_backoff,
        )
        .await
        {
            warn!("Continuing with unsynchronised clock: {}", e);
        }
    }

    fn forget_track(&mut self) {
        self.applied_title.clear();
        self.art_key.clear();
    }

    fn render_clock(&mut self) -> bool {
        match self.compositor.render_clock(&self.clock.now()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Clock render failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::ArtFormat;
    use crate::display::drivers::mock::MockDriver;
    use crate::network::fake::{FakeLink, FixedClock};
    use crate::transport::fake::ScriptedTransport;
    use image::{ImageEncoder, Rgb, RgbImage};
    use image::codecs::png::PngEncoder;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const PLAY_A: &str = r#"{"status":"play","Title":"Song A"}"#;
    const PLAY_B: &str = r#"{"status":"play","Title":"Song B"}"#;
    const STOP: &str = r#"{"status":"stop","Title":""}"#;

    fn meta(title: &str, artist: &str, uri: &str) -> String {
        format!(
            r#"{{"metaData":{{"title":"{}","artist":"{}","subtitle":"DJ X","albumArtURI":"{}"}}}}"#,
            title, artist, uri
        )
    }

    fn png() -> Vec<u8> {
        let img = RgbImage::from_pixel(16, 16, Rgb([200, 10, 10]));
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(img.as_raw(), 16, 16, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    struct Rig {
        transport: ScriptedTransport,
        driver: MockDriver,
        link: FakeLink,
        monitor: PlaybackMonitor<ScriptedTransport, MockDriver, FakeLink, FixedClock>,
    }

    fn rig() -> Rig {
        let transport = ScriptedTransport::new();
        transport.set_art(Some(png()));
        let driver = MockDriver::new_with_size(480, 480);
        let link = FakeLink::default();
        let mut settings = Settings::for_host("10.0.0.5");
        settings.network.time_sync_backoff = Duration::ZERO;
        let monitor = PlaybackMonitor::new(
            transport.clone(),
            &settings,
            driver.clone(),
            link.clone(),
            FixedClock::at(2025, 6, 1, 21, 30),
        );
        Rig { transport, driver, link, monitor }
    }

    #[tokio::test]
    async fn start_connects_syncs_and_shows_the_clock() {
        let mut r = rig();
        r.link.sync_failures.store(2, Ordering::SeqCst);
        r.monitor.start().await;

        assert_eq!(r.link.connects.load(Ordering::SeqCst), 1);
        assert_eq!(r.link.syncs.load(Ordering::SeqCst), 3);
        assert_eq!(r.monitor.phase(), Phase::Idle);
        assert_eq!(r.driver.flush_count(), 1);
        assert!(r.driver.lit_pixels() > 0);
    }

    #[tokio::test]
    async fn start_proceeds_when_time_sync_never_succeeds() {
        let mut r = rig();
        r.link.sync_failures.store(100, Ordering::SeqCst);
        r.monitor.start().await;

        assert_eq!(r.link.syncs.load(Ordering::SeqCst), 5);
        assert_eq!(r.driver.flush_count(), 1);
    }

    #[tokio::test]
    async fn unknown_artist_falls_back_to_subtitle_and_png_path() {
        let mut r = rig();
        r.transport.push_status(PLAY_A);
        r.transport.push_meta(&meta("Song A", "unknown", "https://art.example/a.png?size=0"));

        let report = r.monitor.poll_once().await;

        assert_eq!(report.mode, DisplayMode::NowPlaying);
        let art = report.art.expect("art pipeline ran");
        assert!(art.is_ok(), "{:?}", art.errors);
        assert_eq!(art.format, Some(ArtFormat::Png));
        assert_eq!(
            report.overlay,
            Some(NowPlaying { artist: "DJ X".into(), title: "Song A".into() })
        );
        assert_eq!(r.transport.art_requests(), vec!["https://art.example/a.png?size=420X420".to_string()]);
        assert_eq!(r.monitor.applied_title(), "Song A");
        assert_eq!(r.monitor.art_key(), "https://art.example/a.png?size=0");
        // single present: art plus overlay
        assert_eq!(r.driver.flush_count(), 1);
        assert!(!report.clock_rendered);
    }

    #[tokio::test]
    async fn unchanged_title_fetches_art_once() {
        let mut r = rig();
        r.transport.push_status(PLAY_A);
        r.transport.push_meta(&meta("Song A", "Band", "https://art.example/a.jpg?size=0"));

        let first = r.monitor.poll_once().await;
        let second = r.monitor.poll_once().await;

        assert!(first.art.is_some());
        assert!(second.art.is_none());
        assert!(!second.metadata_fetched);
        assert_eq!(r.transport.meta_requests(), 1);
        assert_eq!(r.transport.art_requests().len(), 1);
        assert_eq!(r.driver.flush_count(), 1);
    }

    #[tokio::test]
    async fn title_change_with_same_art_only_redraws_the_overlay() {
        let mut r = rig();
        let uri = "https://art.example/album.png?size=0";
        r.transport.push_status(PLAY_A);
        r.transport.push_status(PLAY_B);
        r.transport.push_meta(&meta("Song A", "Band", uri));
        r.transport.push_meta(&meta("Song B", "Band", uri));

        r.monitor.poll_once().await;
        let second = r.monitor.poll_once().await;

        assert!(second.metadata_fetched);
        assert!(second.art.is_none());
        assert_eq!(second.overlay.map(|o| o.title), Some("Song B".to_string()));
        assert_eq!(r.transport.art_requests().len(), 1);
        assert_eq!(r.monitor.applied_title(), "Song B");
    }

    #[tokio::test]
    async fn metadata_failure_retries_next_poll() {
        let mut r = rig();
        r.transport.push_status(PLAY_A);

        let first = r.monitor.poll_once().await;
        assert!(!first.metadata_fetched);
        assert_eq!(r.monitor.applied_title(), "");
        assert_eq!(r.monitor.error_count(), 0);

        r.transport.push_meta(&meta("Song A", "Band", "https://art.example/a.jpg?size=0"));
        let second = r.monitor.poll_once().await;
        assert!(second.metadata_fetched);
        assert_eq!(r.monitor.applied_title(), "Song A");
    }

    #[tokio::test]
    async fn eleven_stopped_polls_from_idle_keep_the_clock_running() {
        let mut r = rig();
        r.transport.push_status(STOP);
        r.monitor.start().await;
        let flushes = r.driver.flush_count();

        for n in 1..=10 {
            let report = r.monitor.poll_once().await;
            assert!(report.clock_rendered);
            assert_eq!(report.mode, DisplayMode::Clock);
            assert_eq!(r.monitor.idle_count(), n);
        }

        let eleventh = r.monitor.poll_once().await;
        assert!(eleventh.clock_rendered);
        assert_eq!(eleventh.mode, DisplayMode::Clock);
        assert_eq!(r.monitor.idle_count(), 0);
        assert_eq!(r.driver.flush_count(), flushes + 11);

        // next run counts up from zero again
        r.monitor.poll_once().await;
        assert_eq!(r.monitor.idle_count(), 1);
    }

    #[tokio::test]
    async fn a_pause_keeps_the_art_until_the_idle_threshold() {
        let mut r = rig();
        r.transport.push_status(PLAY_A);
        r.transport.push_status(STOP);
        r.transport.push_meta(&meta("Song A", "Band", "https://art.example/a.jpg?size=0"));
        r.monitor.poll_once().await;
        let flushes = r.driver.flush_count();

        for n in 1..=10 {
            let report = r.monitor.poll_once().await;
            assert_eq!(report.mode, DisplayMode::NowPlaying);
            assert!(!report.clock_rendered);
            assert_eq!(r.monitor.phase(), Phase::Idle);
            assert_eq!(r.monitor.idle_count(), n);
            assert_eq!(r.monitor.applied_title(), "Song A");
        }
        assert_eq!(r.driver.flush_count(), flushes);

        let eleventh = r.monitor.poll_once().await;
        assert_eq!(eleventh.mode, DisplayMode::Clock);
        assert!(eleventh.clock_rendered);
        assert_eq!(r.monitor.idle_count(), 0);
        assert_eq!(r.monitor.applied_title(), "");
        assert_eq!(r.monitor.art_key(), "");
        assert_eq!(r.driver.flush_count(), flushes + 1);
    }

    #[tokio::test]
    async fn six_failed_polls_trigger_one_reconnect() {
        let mut r = rig();

        for n in 1..=5 {
            let report = r.monitor.poll_once().await;
            assert!(!report.reconnected);
            assert_eq!(r.monitor.error_count(), n);
        }
        assert_eq!(r.link.connects.load(Ordering::SeqCst), 0);

        let sixth = r.monitor.poll_once().await;
        assert!(sixth.reconnected);
        assert_eq!(r.link.connects.load(Ordering::SeqCst), 1);
        assert_eq!(r.link.syncs.load(Ordering::SeqCst), 1);
        assert_eq!(r.monitor.error_count(), 0);
        assert_eq!(r.monitor.idle_count(), 0);
        assert_eq!(r.monitor.phase(), Phase::Idle);
        assert_eq!(sixth.mode, DisplayMode::Clock);
    }

    #[tokio::test]
    async fn a_good_poll_breaks_the_failure_run() {
        let mut r = rig();
        for _ in 0..4 {
            r.monitor.poll_once().await;
        }
        r.transport.push_status(STOP);
        r.monitor.poll_once().await;
        assert_eq!(r.monitor.error_count(), 0);
        assert_eq!(r.link.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_while_playing_keep_the_art_on_screen() {
        let mut r = rig();
        r.transport.push_status(PLAY_A);
        r.transport.push_meta(&meta("Song A", "Band", "https://art.example/a.jpg?size=0"));
        r.monitor.poll_once().await;
        let flushes = r.driver.flush_count();

        // a stale status body that no longer parses
        r.transport.push_status("{}");
        r.transport.push_status("{}");
        r.monitor.poll_once().await; // still PLAY_A at the head
        let report = r.monitor.poll_once().await;

        assert_eq!(report.mode, DisplayMode::NowPlaying);
        assert!(!report.clock_rendered);
        assert_eq!(r.monitor.applied_title(), "Song A");
        assert_eq!(r.driver.flush_count(), flushes);
    }

    #[tokio::test]
    async fn a_short_pause_resumes_without_refetching() {
        let mut r = rig();
        r.transport.push_status(PLAY_A);
        r.transport.push_status(STOP);
        r.transport.push_status(PLAY_A);
        r.transport.push_meta(&meta("Song A", "Band", "https://art.example/a.jpg?size=0"));

        r.monitor.poll_once().await;
        r.monitor.poll_once().await;
        let resumed = r.monitor.poll_once().await;

        assert_eq!(resumed.mode, DisplayMode::NowPlaying);
        assert!(!resumed.metadata_fetched);
        assert!(resumed.art.is_none());
        assert_eq!(r.monitor.idle_count(), 0);
        assert_eq!(r.transport.meta_requests(), 1);
        assert_eq!(r.transport.art_requests().len(), 1);
    }

    #[tokio::test]
    async fn resuming_after_the_idle_threshold_redraws_the_track() {
        let mut r = rig();
        r.transport.push_status(PLAY_A);
        for _ in 0..11 {
            r.transport.push_status(STOP);
        }
        r.transport.push_status(PLAY_A);
        r.transport.push_meta(&meta("Song A", "Band", "https://art.example/a.jpg?size=0"));

        r.monitor.poll_once().await;
        for _ in 0..11 {
            r.monitor.poll_once().await;
        }
        assert_eq!(r.monitor.mode(), DisplayMode::Clock);
        let resumed = r.monitor.poll_once().await;

        assert_eq!(resumed.mode, DisplayMode::NowPlaying);
        assert!(resumed.metadata_fetched);
        assert!(resumed.art.is_some());
        assert!(!resumed.clock_rendered);
        assert_eq!(r.transport.art_requests().len(), 2);
    }
}
