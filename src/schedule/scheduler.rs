//! Load scheduler.
//!
//! Drives planned [`LoadTask`]s through cache lookup, fetch, decode and
//! write-behind caching, delivering decoded sources to a sink as they
//! complete.
//!
//! # Batching
//!
//! The first `critical_count` tasks are started together. The remainder run
//! in batches of `batch_size`, with a short pause before each batch so the
//! consumer gets a chance to draw. Within a batch, completions are delivered
//! in whatever order they finish.
//!
//! # Cancellation
//!
//! The generation token is checked before each batch, before each delivery
//! and before each cache write. Once it goes stale, in-flight tasks are
//! aborted, nothing more is delivered and the remaining tasks stay pending.

use std::ops::Range;
use std::sync::Arc;

use image::RgbaImage;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::TileError;
use crate::format::ResolvedAsset;
use crate::io::AssetSource;
use crate::tile::{TileCache, TileCodec};

use super::generation::GenerationToken;
use super::policy::LoadPolicy;
use super::task::{LoadTask, Placement, TaskState};

/// A decoded tile or sheet ready for drawing.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub task_id: usize,

    /// Resolved file name, also the cache key
    pub key: String,

    pub image: Arc<RgbaImage>,
    pub placements: Vec<Placement>,
    pub from_cache: bool,
}

/// Summary of one scheduler run.
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    /// Sources handed to the sink
    pub delivered: usize,

    /// Tasks that ended in `Failed`
    pub failed: usize,

    /// Sources served from the cache without a fetch
    pub cache_hits: usize,

    /// Sources that loaded only via their alternate file name
    pub fallbacks: usize,

    /// Whether the generation went stale before the run finished
    pub cancelled: bool,

    /// Every task with its final state
    pub tasks: Vec<LoadTask>,
}

struct Outcome {
    image: Arc<RgbaImage>,
    from_cache: bool,
    used_alternate: bool,
}

/// Loads tasks against one asset source and a shared cache.
pub struct LoadScheduler {
    source: Arc<dyn AssetSource>,
    cache: Arc<TileCache>,
    codec: TileCodec,
    policy: LoadPolicy,
}

impl LoadScheduler {
    pub fn new(source: Arc<dyn AssetSource>, cache: Arc<TileCache>, policy: LoadPolicy) -> Self {
        Self {
            source,
            cache,
            codec: TileCodec::new(),
            policy,
        }
    }

    /// Run `tasks` (already in priority order) to completion or cancellation.
    ///
    /// `sink` receives every successfully loaded source while `token` is
    /// current. Failed tasks are logged and skipped. Returns once every
    /// started task and pending cache write has settled.
    pub async fn run<F>(
        &self,
        mut tasks: Vec<LoadTask>,
        token: &GenerationToken,
        mut sink: F,
    ) -> ScheduleReport
    where
        F: FnMut(LoadedSource),
    {
        let mut report = ScheduleReport::default();
        let mut writes = JoinSet::new();

        for (n, range) in self.batches(tasks.len()).into_iter().enumerate() {
            let critical = n == 0 && self.policy.critical_count > 0;
            if n > 0 {
                tokio::task::yield_now().await;
                tokio::time::sleep(self.policy.batch_yield).await;
            }
            if !token.is_current() {
                report.cancelled = true;
                break;
            }

            debug!(
                generation = token.generation(),
                batch = n,
                tasks = range.len(),
                critical,
                "Starting load batch"
            );
            self.run_batch(&mut tasks[range], token, &mut sink, &mut report, &mut writes)
                .await;
        }

        while writes.join_next().await.is_some() {}

        if report.cancelled {
            info!(
                generation = token.generation(),
                delivered = report.delivered,
                "Load schedule cancelled"
            );
        } else {
            info!(
                generation = token.generation(),
                delivered = report.delivered,
                failed = report.failed,
                cache_hits = report.cache_hits,
                fallbacks = report.fallbacks,
                "Load schedule finished"
            );
        }

        report.tasks = tasks;
        report
    }

    /// Index ranges of the critical batch followed by regular batches.
    fn batches(&self, total: usize) -> Vec<Range<usize>> {
        let critical = self.policy.critical_count.min(total);
        let size = self.policy.batch_size.max(1);

        let mut ranges = Vec::new();
        if critical > 0 {
            ranges.push(0..critical);
        }
        let mut start = critical;
        while start < total {
            let end = (start + size).min(total);
            ranges.push(start..end);
            start = end;
        }
        ranges
    }

    async fn run_batch<F>(
        &self,
        batch: &mut [LoadTask],
        token: &GenerationToken,
        sink: &mut F,
        report: &mut ScheduleReport,
        writes: &mut JoinSet<()>,
    ) where
        F: FnMut(LoadedSource),
    {
        let mut set = JoinSet::new();
        for (slot, task) in batch.iter_mut().enumerate() {
            task.state = TaskState::InFlight;
            let source = Arc::clone(&self.source);
            let cache = Arc::clone(&self.cache);
            let codec = self.codec.clone();
            let asset = task.asset.clone();
            set.spawn(async move {
                let result = load_asset(source.as_ref(), &cache, &codec, &asset).await;
                (slot, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let (slot, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    if !e.is_cancelled() {
                        warn!("Load task panicked: {}", e);
                    }
                    continue;
                }
            };
            let task = &mut batch[slot];

            // Stale completions stay in flight and end up pending, whatever
            // their outcome.
            if !token.is_current() {
                report.cancelled = true;
                set.abort_all();
                continue;
            }

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(name = %task.asset.primary, "Tile load failed: {}", e);
                    task.state = TaskState::Failed;
                    report.failed += 1;
                    continue;
                }
            };
            task.state = TaskState::Cached;

            if outcome.from_cache {
                report.cache_hits += 1;
            } else {
                if outcome.used_alternate {
                    report.fallbacks += 1;
                }
                let cache = Arc::clone(&self.cache);
                let key = task.asset.primary.clone();
                let image = Arc::clone(&outcome.image);
                let token = token.clone();
                writes.spawn(async move {
                    if token.is_current() {
                        cache.put(&key, &image).await;
                    }
                });
            }

            sink(LoadedSource {
                task_id: task.id,
                key: task.asset.primary.clone(),
                image: outcome.image,
                placements: task.placements.clone(),
                from_cache: outcome.from_cache,
            });
            report.delivered += 1;
        }

        for task in batch.iter_mut().filter(|t| t.state == TaskState::InFlight) {
            if report.cancelled {
                task.state = TaskState::Pending;
            } else {
                task.state = TaskState::Failed;
                report.failed += 1;
            }
        }
    }
}

/// Load one asset: cache first, then the primary file, then the alternate
/// file exactly once.
async fn load_asset(
    source: &dyn AssetSource,
    cache: &TileCache,
    codec: &TileCodec,
    asset: &ResolvedAsset,
) -> Result<Outcome, TileError> {
    if let Some(image) = cache.get(&asset.primary).await {
        return Ok(Outcome {
            image,
            from_cache: true,
            used_alternate: false,
        });
    }

    match fetch_and_decode(source, codec, &asset.primary).await {
        Ok(image) => Ok(Outcome {
            image: Arc::new(image),
            from_cache: false,
            used_alternate: false,
        }),
        Err(e) => {
            let Some(alternate) = &asset.alternate else {
                return Err(e);
            };
            debug!(
                name = %asset.primary,
                alternate = %alternate,
                "Falling back to alternate format: {}",
                e
            );
            let image = fetch_and_decode(source, codec, alternate).await?;
            Ok(Outcome {
                image: Arc::new(image),
                from_cache: false,
                used_alternate: true,
            })
        }
    }
}

async fn fetch_and_decode(
    source: &dyn AssetSource,
    codec: &TileCodec,
    name: &str,
) -> Result<RgbaImage, TileError> {
    let bytes = source
        .fetch(name)
        .await
        .map_err(|source| TileError::FetchFailed {
            name: name.to_string(),
            source,
        })?;
    codec.decode(name, &bytes)
}
