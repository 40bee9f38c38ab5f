mod conflict;
mod error;
mod mutations;
mod queries;

pub use conflict::{check_conflict, validate_and_check};
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedDaySchedule = Arc<RwLock<DaySchedule>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut pending = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            pending = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                let result = timed_flush(&mut wal, &batch);
                respond_batch(batch, &result);
                if let Some(other) = pending {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn timed_flush(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    result
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so buffered bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// In-memory schedule store backed by the WAL.
///
/// Every `(number_room, date)` slot key owns its own lock. Create and update
/// hold the slot's write lock across read → decide → WAL append → apply, so
/// admission decisions never run against a stale read set.
pub struct Engine {
    pub(super) days: DashMap<SlotKey, SharedDaySchedule>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Reverse lookup: schedule id → slot key
    pub(super) schedule_to_slot: DashMap<Ulid, SlotKey>,
    /// Mutations hold it shared; compaction holds it exclusively so the
    /// snapshot it writes cannot miss a concurrent append.
    pub(super) compaction_gate: RwLock<()>,
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            days: DashMap::new(),
            wal_tx,
            schedule_to_slot: DashMap::new(),
            compaction_gate: RwLock::new(()),
        };

        // We're the sole owner of every Arc during replay, so try_write always
        // succeeds. Never block here: this may run inside an async context.
        for event in &events {
            engine.replay_event(event);
        }

        Ok(engine)
    }

    fn replay_event(&self, event: &Event) {
        match event {
            Event::ScheduleCreated { id, number_room, date, span }
            | Event::ScheduleUpdated { id, number_room, date, span } => {
                self.replay_remove(id);
                let schedule = Schedule {
                    id: *id,
                    number_room: *number_room,
                    date: *date,
                    span: *span,
                };
                let key = schedule.slot_key();
                let day = self.day(key);
                let mut guard = day.try_write().expect("replay: uncontended write");
                guard.insert_schedule(schedule);
                self.schedule_to_slot.insert(*id, key);
            }
            Event::ScheduleDeleted { id } => self.replay_remove(id),
        }
    }

    fn replay_remove(&self, id: &Ulid) {
        if let Some((_, key)) = self.schedule_to_slot.remove(id)
            && let Some(day) = self.get_day(&key)
        {
            day.try_write()
                .expect("replay: uncontended write")
                .remove_schedule(*id);
        }
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_day(&self, key: &SlotKey) -> Option<SharedDaySchedule> {
        self.days.get(key).map(|e| e.value().clone())
    }

    /// Get the day for `key`, creating an empty one on first use.
    pub(super) fn day(&self, key: SlotKey) -> SharedDaySchedule {
        self.days
            .entry(key)
            .or_insert_with(|| Arc::new(RwLock::new(DaySchedule::new(key))))
            .value()
            .clone()
    }

    pub fn slot_of(&self, id: &Ulid) -> Option<SlotKey> {
        self.schedule_to_slot.get(id).map(|e| *e.value())
    }

    /// Lookup schedule → slot key, acquire that slot's write lock.
    ///
    /// The index only changes under the slot's write lock, so once the lock is
    /// held and the index still agrees, the schedule cannot move away.
    pub(super) async fn resolve_schedule_write(
        &self,
        id: &Ulid,
    ) -> Result<(SlotKey, OwnedRwLockWriteGuard<DaySchedule>), EngineError> {
        loop {
            let key = self.slot_of(id).ok_or(EngineError::NotFound(*id))?;
            let guard = self.day(key).write_owned().await;
            if self.slot_of(id) == Some(key) {
                return Ok((key, guard));
            }
        }
    }

    /// Write-lock two slots in sorted key order to prevent deadlocks.
    /// Returns `(a, None)` when both keys are the same slot.
    pub(super) async fn lock_pair(
        &self,
        a: SlotKey,
        b: SlotKey,
    ) -> (OwnedRwLockWriteGuard<DaySchedule>, Option<OwnedRwLockWriteGuard<DaySchedule>>) {
        if a == b {
            return (self.day(a).write_owned().await, None);
        }
        if a < b {
            let ga = self.day(a).write_owned().await;
            let gb = self.day(b).write_owned().await;
            (ga, Some(gb))
        } else {
            let gb = self.day(b).write_owned().await;
            let ga = self.day(a).write_owned().await;
            (ga, Some(gb))
        }
    }
}
