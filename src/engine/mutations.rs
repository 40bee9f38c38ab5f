use tokio::sync::oneshot;
use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;
use crate::observability::ADMISSION_REJECTIONS_TOTAL;
use crate::validate::{validate, ScheduleParams};

use super::conflict::check_conflict;
use super::{Engine, EngineError, WalCommand};

fn count_rejection(err: &EngineError) {
    metrics::counter!(ADMISSION_REJECTIONS_TOTAL, "reason" => err.reason()).increment(1);
}

fn validated(params: &ScheduleParams) -> Result<ScheduleDraft, EngineError> {
    validate(params).map_err(|e| {
        let err = EngineError::from(e);
        debug!("schedule rejected by validation: {err}");
        count_rejection(&err);
        err
    })
}

fn admitted<'a>(
    draft: &ScheduleDraft,
    existing: impl IntoIterator<Item = &'a Schedule>,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    check_conflict(draft, existing, exclude).inspect_err(|err| {
        debug!(
            "schedule rejected for room {} on {}: {err}",
            draft.number_room, draft.date
        );
        count_rejection(err);
    })
}

impl Engine {
    /// Validate, check against the slot's bookings and persist a new schedule.
    pub async fn create(&self, params: &ScheduleParams) -> Result<Schedule, EngineError> {
        let draft = validated(params)?;
        let key = draft.slot_key();

        let _gate = self.compaction_gate.read().await;
        let day = self.day(key);
        let mut guard = day.write().await;
        admitted(&draft, &guard.schedules, None)?;

        let schedule = draft.into_schedule(Ulid::new());
        self.wal_append(&Event::created(&schedule)).await?;
        debug_assert!(guard.schedules.iter().all(|s| !s.span.overlaps(&schedule.span)));
        guard.insert_schedule(schedule.clone());
        self.schedule_to_slot.insert(schedule.id, key);

        info!(
            "created schedule {} for room {} on {}",
            schedule.id, schedule.number_room, schedule.date
        );
        Ok(schedule)
    }

    /// Replace every field of schedule `id`. The schedule may move to another
    /// room or date; both slots stay locked until the move is applied.
    pub async fn update(&self, id: Ulid, params: &ScheduleParams) -> Result<Schedule, EngineError> {
        let draft = validated(params)?;
        let new_key = draft.slot_key();

        let _gate = self.compaction_gate.read().await;
        let (old_key, mut old_guard, mut new_guard) = loop {
            let old_key = self.slot_of(&id).ok_or(EngineError::NotFound(id))?;
            let (old_guard, new_guard) = self.lock_pair(old_key, new_key).await;
            // Moved or deleted while we waited for the locks.
            if self.slot_of(&id) == Some(old_key) {
                break (old_key, old_guard, new_guard);
            }
        };

        let target = new_guard.as_deref().unwrap_or(&*old_guard);
        admitted(&draft, &target.schedules, Some(id))?;

        let schedule = draft.into_schedule(id);
        self.wal_append(&Event::updated(&schedule)).await?;
        old_guard.remove_schedule(id);
        match new_guard.as_mut() {
            Some(guard) => guard.insert_schedule(schedule.clone()),
            None => old_guard.insert_schedule(schedule.clone()),
        }
        self.schedule_to_slot.insert(id, new_key);

        if old_key == new_key {
            info!("updated schedule {id}");
        } else {
            info!(
                "moved schedule {id} to room {} on {}",
                schedule.number_room, schedule.date
            );
        }
        Ok(schedule)
    }

    pub async fn delete(&self, id: Ulid) -> Result<Schedule, EngineError> {
        let _gate = self.compaction_gate.read().await;
        let (_, mut guard) = self.resolve_schedule_write(&id).await?;
        if guard.get(id).is_none() {
            return Err(EngineError::NotFound(id));
        }

        self.wal_append(&Event::ScheduleDeleted { id }).await?;
        let removed = guard.remove_schedule(id).ok_or(EngineError::NotFound(id))?;
        self.schedule_to_slot.remove(&id);

        info!("deleted schedule {id}");
        Ok(removed)
    }

    /// Compact the WAL by rewriting it with one `ScheduleCreated` per live
    /// schedule. Slots left empty by deletes and moves are dropped.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.compaction_gate.write().await;

        let mut days: Vec<_> = self.days.iter().map(|e| (*e.key(), e.value().clone())).collect();
        days.sort_by_key(|(key, _)| *key);

        let mut events = Vec::new();
        let mut empty = Vec::new();
        for (key, day) in days {
            let guard = day.read().await;
            if guard.schedules.is_empty() {
                empty.push(key);
            }
            events.extend(guard.schedules.iter().map(Event::created));
        }
        // No mutation runs while the gate is held, so nothing can refill these.
        for key in &empty {
            self.days.remove(key);
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;

        info!(
            "compacted WAL to {count} schedules, dropped {} empty slots",
            empty.len()
        );
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
