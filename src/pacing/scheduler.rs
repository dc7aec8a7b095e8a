//! Schedule loop
//!
//! ```text
//! loop:
//!   session.observe ── not trading ──→ sleep poll interval
//!        │ trading
//!        ▼
//!   shuffle identities
//!   for each identity:
//!     re-check session (cap/window hold mid-round)
//!     forward leg (random target, random amount)
//!       ok → count, dwell, hedge leg (0.995x back to source)
//!     inter-identity delay
//!   inter-round delay
//! ```
//!
//! Identities run one at a time. Swap failures are logged and the loop moves
//! on; only cancellation stops it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::trading::{SwapExecutor, SwapRequest};
use crate::wallet::{Identity, IdentityPool};

use super::clock::{Clock, SystemClock};
use super::randomization::Randomizer;
use super::session::{SessionState, TradingSession};

/// Counters for one pass over the pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundStats {
    pub forward_ok: u32,
    pub forward_failed: u32,
    pub hedge_ok: u32,
    pub hedge_failed: u32,
    /// Session state that ended the round early, if any
    pub stopped_by: Option<SessionState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Session was not trading; nothing attempted
    Paused(SessionState),
    Completed(RoundStats),
    Cancelled,
}

pub struct ScheduleLoop {
    executor: SwapExecutor,
    pool: IdentityPool,
    session: TradingSession,
    schedule: ScheduleConfig,
    amount_bounds: (u64, u64),
    poll_interval: Duration,
    randomizer: Randomizer,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
}

impl ScheduleLoop {
    pub fn new(
        executor: SwapExecutor,
        pool: IdentityPool,
        session: TradingSession,
        schedule: ScheduleConfig,
        poll_interval: Duration,
    ) -> Self {
        let amount_bounds = schedule.amount_bounds_lamports();
        Self {
            executor,
            pool,
            session,
            schedule,
            amount_bounds,
            poll_interval,
            randomizer: Randomizer::default(),
            clock: Arc::new(SystemClock),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_randomizer(mut self, randomizer: Randomizer) -> Self {
        self.randomizer = randomizer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn session(&self) -> &TradingSession {
        &self.session
    }

    /// Run until cancelled
    pub async fn run(&mut self) {
        info!(
            "Schedule loop started: {} identities, window {} {}, cap {}/day",
            self.pool.len(),
            self.session.window(),
            self.session.timezone(),
            self.session.daily_cap()
        );

        loop {
            let wait = match self.run_round().await {
                RoundOutcome::Cancelled => break,
                RoundOutcome::Paused(state) => {
                    info!(
                        "Session {} ({}), re-checking in {:?}",
                        state,
                        self.session.status(),
                        self.poll_interval
                    );
                    self.poll_interval
                }
                RoundOutcome::Completed(stats) => {
                    info!(
                        "Round done: forward {} ok / {} failed, hedge {} ok / {} failed | today {}",
                        stats.forward_ok,
                        stats.forward_failed,
                        stats.hedge_ok,
                        stats.hedge_failed,
                        self.session.status()
                    );
                    self.randomizer.random_delay(
                        self.schedule.round_delay_min_ms,
                        self.schedule.round_delay_max_ms,
                    )
                }
            };

            if !self.pause(wait).await {
                break;
            }
        }

        info!("Schedule loop stopped ({} swaps today)", self.session.status());
    }

    /// One pass over the shuffled pool
    pub async fn run_round(&mut self) -> RoundOutcome {
        if self.shutdown.is_cancelled() {
            return RoundOutcome::Cancelled;
        }

        let state = self.session.observe(self.clock.now());
        if state != SessionState::Trading {
            return RoundOutcome::Paused(state);
        }

        let mut order: Vec<Arc<Identity>> = self.pool.identities().to_vec();
        self.randomizer.shuffle(&mut order);
        debug!(
            "Round order: {}",
            order.iter().map(|i| i.label()).collect::<Vec<_>>().join(", ")
        );

        let mut stats = RoundStats::default();
        let total = order.len();

        for (position, identity) in order.into_iter().enumerate() {
            if self.shutdown.is_cancelled() {
                return RoundOutcome::Cancelled;
            }

            let state = self.session.observe(self.clock.now());
            if state != SessionState::Trading {
                info!("Stopping round early: session {}", state);
                stats.stopped_by = Some(state);
                break;
            }

            if !self.run_identity(identity, &mut stats).await {
                return RoundOutcome::Cancelled;
            }

            if position + 1 < total {
                let delay = self.randomizer.random_delay(
                    self.schedule.identity_delay_min_ms,
                    self.schedule.identity_delay_max_ms,
                );
                if !self.pause(delay).await {
                    return RoundOutcome::Cancelled;
                }
            }
        }

        RoundOutcome::Completed(stats)
    }

    /// Forward leg then hedge for one identity. Returns false if cancelled.
    async fn run_identity(&mut self, identity: Arc<Identity>, stats: &mut RoundStats) -> bool {
        let Some(target) = self.randomizer.pick(&self.schedule.target_mints).cloned() else {
            warn!("No target mints configured");
            return true;
        };
        let (min, max) = self.amount_bounds;
        let amount = self.randomizer.amount_in_range(min, max);
        let label = identity.label().to_string();

        let forward = SwapRequest::forward(&self.schedule.source_mint, target, amount, identity);

        match self.executor.execute(&forward).await {
            Ok(result) => {
                self.session.record_success(self.clock.now());
                stats.forward_ok += 1;
                info!(
                    "[{}] forward {} -> {} ok via {} ({}) | today {}",
                    label,
                    forward.amount(),
                    forward.output_mint(),
                    result.provider,
                    result.signature,
                    self.session.status()
                );
            }
            Err(failure) => {
                stats.forward_failed += 1;
                error!("[{}] forward leg failed: {}", label, failure);
                return true;
            }
        }

        let dwell = self
            .randomizer
            .random_delay(self.schedule.dwell_min_ms, self.schedule.dwell_max_ms);
        debug!("[{}] dwelling {:?} before hedge", label, dwell);
        if !self.pause(dwell).await {
            return false;
        }

        let hedge = SwapRequest::hedge_of(&forward);
        match self.executor.execute(&hedge).await {
            Ok(result) => {
                stats.hedge_ok += 1;
                info!(
                    "[{}] hedge {} {} back ok via {} ({})",
                    label,
                    hedge.amount(),
                    hedge.output_mint(),
                    result.provider,
                    result.signature
                );
            }
            Err(failure) => {
                stats.hedge_failed += 1;
                warn!(
                    "[{}] hedge leg failed, {} left unhedged: {}",
                    label,
                    forward.output_mint(),
                    failure
                );
            }
        }

        true
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.shutdown.is_cancelled();
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WSOL_MINT;
    use crate::pacing::clock::ManualClock;
    use crate::pacing::session::TradingWindow;
    use crate::trading::testing::{test_identity, FakeProvider, Outcome, RecordingBroadcaster};
    use crate::trading::{ProviderChain, RetryPolicy, SwapMode, SwapProvider};
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashSet;

    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn schedule() -> ScheduleConfig {
        ScheduleConfig {
            source_mint: WSOL_MINT.into(),
            target_mints: vec![USDC.into()],
            min_amount_sol: 0.02,
            max_amount_sol: 0.02,
            dwell_min_ms: 0,
            dwell_max_ms: 0,
            identity_delay_min_ms: 0,
            identity_delay_max_ms: 0,
            round_delay_min_ms: 0,
            round_delay_max_ms: 0,
        }
    }

    struct Harness {
        provider: Arc<FakeProvider>,
        broadcaster: Arc<RecordingBroadcaster>,
        clock: Arc<ManualClock>,
        pool: Vec<Arc<Identity>>,
    }

    fn build(
        provider: Arc<FakeProvider>,
        identities: usize,
        cap: u32,
        hour: u32,
    ) -> (ScheduleLoop, Harness) {
        let broadcaster = RecordingBroadcaster::new();
        let clock = Arc::new(ManualClock::new(at(hour)));
        let retry = RetryPolicy::new(1, Duration::from_millis(1));
        let chain = ProviderChain::new(
            vec![provider.clone() as Arc<dyn SwapProvider>],
            retry.clone(),
        );
        let executor = SwapExecutor::new(chain, broadcaster.clone(), retry);

        let pool: Vec<Arc<Identity>> = (1..=identities)
            .map(|i| test_identity(&format!("w{}", i)))
            .collect();
        let session = TradingSession::new(cap, chrono_tz::UTC, TradingWindow::new(8, 24), at(hour));

        let schedule_loop = ScheduleLoop::new(
            executor,
            IdentityPool::from_identities(pool.clone()).unwrap(),
            session,
            schedule(),
            Duration::from_millis(10),
        )
        .with_randomizer(Randomizer::new(Some(42)))
        .with_clock(clock.clone());

        (
            schedule_loop,
            Harness {
                provider,
                broadcaster,
                clock,
                pool,
            },
        )
    }

    #[tokio::test]
    async fn test_forward_then_hedge_at_995() {
        let (mut schedule_loop, h) = build(FakeProvider::new("A", Outcome::Succeed), 1, 120, 10);

        let outcome = schedule_loop.run_round().await;
        let RoundOutcome::Completed(stats) = outcome else {
            panic!("expected a completed round, got {:?}", outcome);
        };
        assert_eq!(stats.forward_ok, 1);
        assert_eq!(stats.hedge_ok, 1);

        let quotes = h.provider.quotes();
        assert_eq!(quotes.len(), 2);
        let (forward, hedge) = (&quotes[0], &quotes[1]);

        assert_eq!(forward.input_mint, WSOL_MINT);
        assert_eq!(forward.output_mint, USDC);
        assert_eq!(forward.amount, 20_000_000);
        assert_eq!(forward.mode, SwapMode::ExactIn);

        assert_eq!(hedge.input_mint, USDC);
        assert_eq!(hedge.output_mint, WSOL_MINT);
        assert_eq!(hedge.amount, 19_900_000);
        assert_eq!(hedge.mode, SwapMode::ExactOut);
        assert_eq!(hedge.signer, forward.signer);

        // Only the forward leg counts
        assert_eq!(schedule_loop.session().daily_count(), 1);
        assert_eq!(h.broadcaster.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_attempts_out_of_window() {
        let (mut schedule_loop, h) = build(FakeProvider::new("A", Outcome::Succeed), 3, 120, 3);

        assert_eq!(
            schedule_loop.run_round().await,
            RoundOutcome::Paused(SessionState::OutOfWindow)
        );
        assert_eq!(h.provider.calls(), 0);
        assert_eq!(h.broadcaster.calls(), 0);

        // Window opens
        h.clock.set(at(8));
        assert!(matches!(
            schedule_loop.run_round().await,
            RoundOutcome::Completed(_)
        ));
        assert_eq!(schedule_loop.session().daily_count(), 3);
    }

    #[tokio::test]
    async fn test_cap_holds_inside_round() {
        let (mut schedule_loop, h) = build(FakeProvider::new("A", Outcome::Succeed), 5, 2, 12);

        let outcome = schedule_loop.run_round().await;
        let RoundOutcome::Completed(stats) = outcome else {
            panic!("expected a completed round, got {:?}", outcome);
        };
        assert_eq!(stats.forward_ok, 2);
        assert_eq!(stats.stopped_by, Some(SessionState::CapReached));
        assert_eq!(schedule_loop.session().daily_count(), 2);
        // Two forwards plus their hedges
        assert_eq!(h.provider.calls(), 4);

        assert_eq!(
            schedule_loop.run_round().await,
            RoundOutcome::Paused(SessionState::CapReached)
        );

        // Next local day starts fresh, but only once inside the window
        h.clock.set(Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap());
        assert!(matches!(
            schedule_loop.run_round().await,
            RoundOutcome::Completed(_)
        ));
        assert_eq!(schedule_loop.session().daily_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_forward_skips_hedge_and_count() {
        let (mut schedule_loop, h) = build(FakeProvider::new("A", Outcome::QuoteFail), 2, 120, 10);

        let RoundOutcome::Completed(stats) = schedule_loop.run_round().await else {
            panic!("expected a completed round");
        };
        assert_eq!(stats.forward_failed, 2);
        assert_eq!(stats.hedge_ok + stats.hedge_failed, 0);
        assert_eq!(schedule_loop.session().daily_count(), 0);
        assert!(h.provider.quotes().iter().all(|q| q.mode == SwapMode::ExactIn));
    }

    #[tokio::test]
    async fn test_failed_hedge_keeps_count() {
        let provider =
            FakeProvider::scripted("A", vec![Outcome::Succeed, Outcome::QuoteFail], Outcome::Succeed);
        let (mut schedule_loop, _h) = build(provider, 1, 120, 10);

        let RoundOutcome::Completed(stats) = schedule_loop.run_round().await else {
            panic!("expected a completed round");
        };
        assert_eq!(stats.forward_ok, 1);
        assert_eq!(stats.hedge_failed, 1);
        assert_eq!(schedule_loop.session().daily_count(), 1);
    }

    #[tokio::test]
    async fn test_every_identity_once_per_round() {
        let (mut schedule_loop, h) = build(FakeProvider::new("A", Outcome::Succeed), 6, 120, 10);

        schedule_loop.run_round().await;

        let forward_signers: Vec<String> = h
            .provider
            .quotes()
            .into_iter()
            .filter(|q| q.mode == SwapMode::ExactIn)
            .map(|q| q.signer)
            .collect();
        assert_eq!(forward_signers.len(), 6);

        let unique: HashSet<_> = forward_signers.iter().cloned().collect();
        let expected: HashSet<_> = h.pool.iter().map(|i| i.address()).collect();
        assert_eq!(unique, expected);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (schedule_loop, h) = build(FakeProvider::new("A", Outcome::Succeed), 2, 120, 3);
        let token = CancellationToken::new();
        let mut schedule_loop = schedule_loop.with_shutdown(token.clone());

        let handle = tokio::spawn(async move {
            schedule_loop.run().await;
            schedule_loop
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();

        let schedule_loop = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
        assert_eq!(schedule_loop.session().daily_count(), 0);
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_round_does_nothing() {
        let (schedule_loop, h) = build(FakeProvider::new("A", Outcome::Succeed), 2, 120, 10);
        let token = CancellationToken::new();
        token.cancel();
        let mut schedule_loop = schedule_loop.with_shutdown(token);

        assert_eq!(schedule_loop.run_round().await, RoundOutcome::Cancelled);
        assert_eq!(h.provider.calls(), 0);
    }
}
