use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since local midnight. The only time-of-day type.
pub type Minute = u16;

/// Opening of the working window (09:00).
pub const OPEN_TIME: Minute = 9 * 60;
/// Closing of the working window (18:00).
pub const CLOSE_TIME: Minute = 18 * 60;

/// Render a minute-of-day as `HH:MM`.
pub fn format_minute(m: Minute) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Closed interval `[start, end]` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Minute,
    pub end: Minute,
}

impl Span {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> Minute {
        self.end - self.start
    }

    /// Both endpoints are included.
    pub fn contains_instant(&self, t: Minute) -> bool {
        self.start <= t && t <= self.end
    }

    /// Closed-interval overlap: touching endpoints share an instant.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Scope of conflicts and of write locks: one room on one date.
///
/// Ordered by date first so that sorted keys follow the listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub number_room: u32,
}

impl SlotKey {
    pub fn new(number_room: u32, date: NaiveDate) -> Self {
        Self { date, number_room }
    }
}

/// A persisted reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Ulid,
    pub number_room: u32,
    pub date: NaiveDate,
    pub span: Span,
}

impl Schedule {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.number_room, self.date)
    }
}

/// A validated candidate that has not been admitted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDraft {
    pub number_room: u32,
    pub date: NaiveDate,
    pub span: Span,
}

impl ScheduleDraft {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.number_room, self.date)
    }

    pub fn into_schedule(self, id: Ulid) -> Schedule {
        Schedule {
            id,
            number_room: self.number_room,
            date: self.date,
            span: self.span,
        }
    }
}

/// All schedules of one slot key, sorted by `span.start`.
#[derive(Debug, Clone)]
pub struct DaySchedule {
    pub key: SlotKey,
    pub schedules: Vec<Schedule>,
}

impl DaySchedule {
    pub fn new(key: SlotKey) -> Self {
        Self {
            key,
            schedules: Vec::new(),
        }
    }

    /// Insert maintaining sort order by span.start.
    pub fn insert_schedule(&mut self, schedule: Schedule) {
        debug_assert_eq!(schedule.slot_key(), self.key);
        let pos = self
            .schedules
            .partition_point(|s| s.span.start <= schedule.span.start);
        self.schedules.insert(pos, schedule);
    }

    pub fn remove_schedule(&mut self, id: Ulid) -> Option<Schedule> {
        let pos = self.schedules.iter().position(|s| s.id == id)?;
        Some(self.schedules.remove(pos))
    }

    pub fn get(&self, id: Ulid) -> Option<&Schedule> {
        self.schedules.iter().find(|s| s.id == id)
    }
}

/// The event types, flat. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ScheduleCreated {
        id: Ulid,
        number_room: u32,
        date: NaiveDate,
        span: Span,
    },
    ScheduleUpdated {
        id: Ulid,
        number_room: u32,
        date: NaiveDate,
        span: Span,
    },
    ScheduleDeleted {
        id: Ulid,
    },
}

impl Event {
    pub fn created(schedule: &Schedule) -> Self {
        Event::ScheduleCreated {
            id: schedule.id,
            number_room: schedule.number_room,
            date: schedule.date,
            span: schedule.span,
        }
    }

    pub fn updated(schedule: &Schedule) -> Self {
        Event::ScheduleUpdated {
            id: schedule.id,
            number_room: schedule.number_room,
            date: schedule.date,
            span: schedule.span,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// Wire form of a schedule: `YYYY-MM-DD` date, `HH:MM` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleView {
    pub id: Ulid,
    pub number_room: u32,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

impl From<&Schedule> for ScheduleView {
    fn from(s: &Schedule) -> Self {
        Self {
            id: s.id,
            number_room: s.number_room,
            date: s.date.format("%Y-%m-%d").to_string(),
            start_time: format_minute(s.span.start),
            end_time: format_minute(s.span.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 10).unwrap()
    }

    fn schedule(start: Minute, end: Minute) -> Schedule {
        Schedule {
            id: Ulid::new(),
            number_room: 1,
            date: day(),
            span: Span::new(start, end),
        }
    }

    #[test]
    fn span_is_closed() {
        let s = Span::new(600, 660);
        assert_eq!(s.duration(), 60);
        assert!(s.contains_instant(600));
        assert!(s.contains_instant(660)); // closed
        assert!(!s.contains_instant(661));
    }

    #[test]
    fn touching_spans_overlap() {
        let a = Span::new(600, 660);
        let b = Span::new(660, 720);
        let c = Span::new(661, 720);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn format_minute_pads() {
        assert_eq!(format_minute(OPEN_TIME), "09:00");
        assert_eq!(format_minute(CLOSE_TIME), "18:00");
        assert_eq!(format_minute(12 * 60 + 59), "12:59");
        assert_eq!(format_minute(0), "00:00");
    }

    #[test]
    fn slot_keys_sort_by_date_then_room() {
        let a = SlotKey::new(2, NaiveDate::from_ymd_opt(2022, 1, 10).unwrap());
        let b = SlotKey::new(1, NaiveDate::from_ymd_opt(2022, 1, 11).unwrap());
        let c = SlotKey::new(3, NaiveDate::from_ymd_opt(2022, 1, 10).unwrap());
        let mut keys = vec![b, c, a];
        keys.sort();
        assert_eq!(keys, vec![a, c, b]);
    }

    #[test]
    fn day_schedule_keeps_start_order() {
        let mut d = DaySchedule::new(SlotKey::new(1, day()));
        d.insert_schedule(schedule(780, 960));
        d.insert_schedule(schedule(600, 660));
        d.insert_schedule(schedule(700, 720));
        let starts: Vec<_> = d.schedules.iter().map(|s| s.span.start).collect();
        assert_eq!(starts, vec![600, 700, 780]);
    }

    #[test]
    fn day_schedule_remove() {
        let mut d = DaySchedule::new(SlotKey::new(1, day()));
        let a = schedule(600, 660);
        let b = schedule(700, 720);
        d.insert_schedule(a.clone());
        d.insert_schedule(b.clone());

        assert_eq!(d.remove_schedule(a.id), Some(a.clone()));
        assert!(d.remove_schedule(a.id).is_none());
        assert!(d.get(a.id).is_none());
        assert_eq!(d.get(b.id), Some(&b));
    }

    #[test]
    fn view_renders_wire_formats() {
        let s = schedule(13 * 60, 16 * 60);
        let view = ScheduleView::from(&s);
        assert_eq!(view.id, s.id);
        assert_eq!(view.number_room, 1);
        assert_eq!(view.date, "2022-01-10");
        assert_eq!(view.start_time, "13:00");
        assert_eq!(view.end_time, "16:00");
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::created(&schedule(600, 660));
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
