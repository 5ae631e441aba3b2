//! Poll scheduler.
//!
//! Alternates between SCANNING (every wallet x token pair, bounded
//! concurrency, wait for all to settle) and IDLE (fixed sleep). Each pass is
//! a full re-scan; there is no cursor.

use crate::config::{SweeperConfig, TokenDescriptor, TokenList};
use crate::error::SweepError;
use crate::registry::DepositWallet;
use crate::sweeper::{SweepOutcome, Sweeper};
use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sweeper_chain::NetworkDescriptor;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub poll_interval: Duration,
    pub max_in_flight: usize,
    pub pair_timeout: Duration,
    /// Stop after this many passes (None = forever)
    pub max_iterations: Option<u64>,
    /// Chain being swept, for needs-gas messages and explorer links
    pub network: NetworkDescriptor,
}

impl ScannerConfig {
    pub fn from_config(cfg: &SweeperConfig) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            max_in_flight: cfg.tuning.max_in_flight.max(1),
            pair_timeout: cfg.tuning.pair_timeout(),
            max_iterations: cfg.tuning.max_iterations,
            network: cfg.network.clone(),
        }
    }
}

/// Last observed state of one (user, token) pair.
#[derive(Debug, Clone)]
pub struct PairStatus {
    pub last_attempt: DateTime<Utc>,
    pub last_outcome: &'static str,
    pub last_tx: Option<B256>,
}

/// Tallies for one scan pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub iteration: u64,
    pub pairs: usize,
    pub swept: usize,
    pub below_threshold: usize,
    pub needs_gas: usize,
    pub failed: usize,
}

impl ScanReport {
    fn record(&mut self, outcome: &SweepOutcome) {
        match outcome {
            SweepOutcome::Swept { .. } => self.swept += 1,
            SweepOutcome::BelowThreshold { .. } => self.below_threshold += 1,
            SweepOutcome::NeedsGas { .. } => self.needs_gas += 1,
            SweepOutcome::Failed(_) => self.failed += 1,
        }
    }
}

type PairKey = (String, Address);

/// Drives sweep passes over the registry.
pub struct Scanner {
    sweeper: Arc<Sweeper>,
    wallets: Arc<[DepositWallet]>,
    tokens: TokenList,
    config: ScannerConfig,
    iteration: AtomicU64,
    status: DashMap<PairKey, PairStatus>,
}

impl Scanner {
    pub fn new(
        sweeper: Arc<Sweeper>,
        wallets: Vec<DepositWallet>,
        tokens: TokenList,
        config: ScannerConfig,
    ) -> Self {
        Self {
            sweeper,
            wallets: wallets.into(),
            tokens,
            config,
            iteration: AtomicU64::new(0),
            status: DashMap::new(),
        }
    }

    /// Completed passes so far.
    pub fn iterations(&self) -> u64 {
        self.iteration.load(Ordering::Relaxed)
    }

    /// Last status recorded for `user_id` and `token`.
    pub fn pair_status(&self, user_id: &str, token: Address) -> Option<PairStatus> {
        self.status
            .get(&(user_id.to_string(), token))
            .map(|s| s.value().clone())
    }

    /// Run passes until `shutdown` resolves or `max_iterations` is reached.
    ///
    /// Returns the number of completed passes. A pass interrupted by
    /// shutdown is abandoned; already-submitted transfers stay submitted.
    pub async fn run<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            wallets = self.wallets.len(),
            tokens = self.tokens.len(),
            poll_interval_ms = self.config.poll_interval.as_millis(),
            max_in_flight = self.config.max_in_flight,
            "Sweep loop started"
        );

        loop {
            tokio::select! {
                _ = self.scan_once() => {}
                _ = &mut shutdown => {
                    warn!(iteration = self.iterations() + 1, "Shutdown during scan, abandoning pass");
                    break;
                }
            }

            if let Some(max) = self.config.max_iterations {
                if self.iterations() >= max {
                    info!(iterations = max, "Iteration limit reached");
                    break;
                }
            }

            tokio::select! {
                _ = sleep(self.config.poll_interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.iterations()
    }

    /// One SCANNING pass over every (wallet, token) pair.
    pub async fn scan_once(&self) -> ScanReport {
        let started = Instant::now();
        let iteration = self.iterations() + 1;
        let pairs: Vec<(DepositWallet, TokenDescriptor)> = self
            .wallets
            .iter()
            .flat_map(|w| self.tokens.iter().map(move |t| (w.clone(), t.clone())))
            .collect();

        let mut report = ScanReport {
            iteration,
            pairs: pairs.len(),
            ..Default::default()
        };

        let results: Vec<(DepositWallet, TokenDescriptor, SweepOutcome)> = stream::iter(pairs)
            .map(|(wallet, token)| self.run_pair(wallet, token))
            .buffer_unordered(self.config.max_in_flight)
            .collect()
            .await;

        for (wallet, token, outcome) in &results {
            report.record(outcome);
            self.log_outcome(wallet, token, outcome);
            self.status.insert(
                (wallet.user_id.clone(), token.contract),
                PairStatus {
                    last_attempt: Utc::now(),
                    last_outcome: outcome.label(),
                    last_tx: match outcome {
                        SweepOutcome::Swept { tx_hash, .. } => Some(*tx_hash),
                        _ => None,
                    },
                },
            );
        }

        self.iteration.store(iteration, Ordering::Relaxed);
        info!(
            iteration = report.iteration,
            pairs = report.pairs,
            swept = report.swept,
            below_threshold = report.below_threshold,
            needs_gas = report.needs_gas,
            failed = report.failed,
            scan_ms = started.elapsed().as_millis(),
            "Scan pass complete"
        );
        report
    }

    /// Sweep one pair in its own task so a panic stays inside the pair.
    async fn run_pair(
        &self,
        wallet: DepositWallet,
        token: TokenDescriptor,
    ) -> (DepositWallet, TokenDescriptor, SweepOutcome) {
        let sweeper = self.sweeper.clone();
        let pair_timeout = self.config.pair_timeout;
        let (task_wallet, task_token) = (wallet.clone(), token.clone());

        let handle = tokio::spawn(async move {
            match timeout(pair_timeout, sweeper.sweep_pair(&task_wallet, &task_token)).await {
                Ok(outcome) => outcome,
                Err(_) => SweepOutcome::Failed(SweepError::Timeout(pair_timeout)),
            }
        });

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => SweepOutcome::Failed(SweepError::Unclassified(format!(
                "sweep task aborted: {join_err}"
            ))),
        };
        (wallet, token, outcome)
    }

    fn log_outcome(&self, wallet: &DepositWallet, token: &TokenDescriptor, outcome: &SweepOutcome) {
        let amount = |value: &U256| {
            format_units(*value, token.decimals).unwrap_or_else(|_| value.to_string())
        };

        match outcome {
            SweepOutcome::Swept { tx_hash, amount: swept } => {
                let tx_url = self.config.network.tx_url(&tx_hash.to_string());
                info!(
                    user = %wallet.user_id,
                    address = %wallet.address,
                    token = %token.symbol,
                    amount = %amount(swept),
                    omnibus = %self.sweeper.omnibus(),
                    tx_hash = %tx_hash,
                    tx_url = tx_url.as_deref().unwrap_or("-"),
                    "Swept"
                )
            }
            SweepOutcome::BelowThreshold { balance } => debug!(
                user = %wallet.user_id,
                address = %wallet.address,
                token = %token.symbol,
                balance = %amount(balance),
                "Below threshold"
            ),
            SweepOutcome::NeedsGas { balance } => info!(
                user = %wallet.user_id,
                address = %wallet.address,
                token = %token.symbol,
                balance = %amount(balance),
                native = %self.config.network.native_symbol,
                "Needs gas; fund address with native token to sweep"
            ),
            SweepOutcome::Failed(err) => warn!(
                user = %wallet.user_id,
                address = %wallet.address,
                token = %token.symbol,
                reason = err.kind(),
                error = %err,
                "Sweep failed"
            ),
        }
    }
}
