use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub async fn find_by_id(&self, id: Ulid) -> Result<Schedule, EngineError> {
        let day = self
            .slot_of(&id)
            .and_then(|key| self.get_day(&key))
            .ok_or(EngineError::NotFound(id))?;
        let guard = day.read().await;
        guard.get(id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Schedules of one room on one date ordered by start time, optionally
    /// leaving out the record being updated.
    pub async fn find_by_room_and_date(
        &self,
        number_room: u32,
        date: NaiveDate,
        exclude: Option<Ulid>,
    ) -> Vec<Schedule> {
        let Some(day) = self.get_day(&SlotKey::new(number_room, date)) else {
            return Vec::new();
        };
        let guard = day.read().await;
        guard
            .schedules
            .iter()
            .filter(|s| Some(s.id) != exclude)
            .cloned()
            .collect()
    }

    /// Everything, ordered by date, room, start time.
    pub async fn list(&self) -> Vec<Schedule> {
        self.collect_where(|_| true).await
    }

    /// Ordered by room, start time.
    pub async fn list_by_date(&self, date: NaiveDate) -> Vec<Schedule> {
        self.collect_where(|key| key.date == date).await
    }

    /// Ordered by date, start time.
    pub async fn list_by_room(&self, number_room: u32) -> Vec<Schedule> {
        self.collect_where(|key| key.number_room == number_room).await
    }

    /// Ordered by start time.
    pub async fn list_by_date_and_room(&self, date: NaiveDate, number_room: u32) -> Vec<Schedule> {
        self.find_by_room_and_date(number_room, date, None).await
    }

    pub fn schedule_count(&self) -> usize {
        self.schedule_to_slot.len()
    }

    async fn collect_where(&self, filter: impl Fn(&SlotKey) -> bool) -> Vec<Schedule> {
        // Clone the Arcs first: no DashMap guard may live across an await.
        let days: Vec<_> = self
            .days
            .iter()
            .filter(|e| filter(e.key()))
            .map(|e| e.value().clone())
            .collect();

        let mut out = Vec::new();
        for day in days {
            let guard = day.read().await;
            out.extend(guard.schedules.iter().cloned());
        }
        out.sort_by_key(|s| (s.date, s.number_room, s.span.start));
        out
    }
}
