//! Reading statistics derived from history and subjects.
//!
//! Everything here is a pure function of its inputs and the reference time,
//! so the same snapshot always yields the same numbers.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono::Datelike;
use std::collections::BTreeMap;

use crate::model::{GoalSettings, HistoryRecord, Subject, SubjectId};
use crate::time::{round2, week_start};

/// Number of daily buckets in the activity chart.
pub const CHART_DAYS: usize = 7;

/// Minutes read on one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub minutes: f64,
}

impl DailyTotal {
    #[must_use]
    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingStats {
    pub total_minutes: f64,
    pub today_minutes: f64,
    pub weekly_minutes: f64,
    /// Oldest day first; the last entry is the reference day.
    pub chart: Vec<DailyTotal>,
    pub chapters_read: usize,
}

/// How far today's and this week's reading got towards the goals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalProgress {
    pub daily_ratio: f64,
    pub weekly_ratio: f64,
    pub daily_met: bool,
    pub weekly_met: bool,
}

impl ReadingStats {
    #[must_use]
    pub fn goal_progress(&self, goals: &GoalSettings) -> GoalProgress {
        let daily = f64::from(goals.daily_goal_minutes());
        let weekly = f64::from(goals.weekly_goal_minutes());
        GoalProgress {
            daily_ratio: ratio(self.today_minutes, daily),
            weekly_ratio: ratio(self.weekly_minutes, weekly),
            daily_met: self.today_minutes >= daily,
            weekly_met: self.weekly_minutes >= weekly,
        }
    }
}

fn ratio(value: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    (value / target).clamp(0.0, 1.0)
}

/// Aggregate reading statistics as seen at `now`.
///
/// Day boundaries are local midnights in `now`'s timezone and weeks start on
/// Sunday. Records dated after `now` still count towards today and this week.
pub fn compute_stats<Tz: TimeZone>(
    history: &[HistoryRecord],
    subjects: &[Subject],
    now: &DateTime<Tz>,
) -> ReadingStats {
    let tz = now.timezone();
    let today = now.date_naive();
    let week = week_start(today);
    let first_chart_day = today - Duration::days(CHART_DAYS as i64 - 1);

    let mut total = 0.0;
    let mut today_minutes = 0.0;
    let mut weekly = 0.0;
    let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for record in history {
        let day = record.recorded_at.with_timezone(&tz).date_naive();
        let minutes = record.duration_minutes;
        total += minutes;
        if day >= today {
            today_minutes += minutes;
        }
        if day >= week {
            weekly += minutes;
        }
        if (first_chart_day..=today).contains(&day) {
            *per_day.entry(day).or_insert(0.0) += minutes;
        }
    }

    let chart = (0..CHART_DAYS as i64)
        .map(|offset| {
            let date = first_chart_day + Duration::days(offset);
            DailyTotal {
                date,
                minutes: round2(per_day.get(&date).copied().unwrap_or(0.0)),
            }
        })
        .collect();

    ReadingStats {
        total_minutes: round2(total),
        today_minutes: round2(today_minutes),
        weekly_minutes: round2(weekly),
        chart,
        chapters_read: subjects.iter().map(Subject::completed_chapters).sum(),
    }
}

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

/// Minutes and session count for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectTotal {
    pub subject_id: SubjectId,
    /// Name snapshot from the most recent record.
    pub subject_name: String,
    pub minutes: f64,
    pub sessions: usize,
}

/// Aggregate view over a history list.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingReport {
    /// Most minutes first, ties broken by name.
    pub subjects: Vec<SubjectTotal>,
    pub sessions: usize,
    pub total_minutes: f64,
    pub first_recorded_at: Option<DateTime<Utc>>,
    pub last_recorded_at: Option<DateTime<Utc>>,
}

#[must_use]
pub fn subject_report(history: &[HistoryRecord]) -> ReadingReport {
    let mut totals: BTreeMap<SubjectId, (SubjectTotal, DateTime<Utc>)> = BTreeMap::new();
    let mut first: Option<DateTime<Utc>> = None;
    let mut last: Option<DateTime<Utc>> = None;
    let mut total = 0.0;

    for record in history {
        total += record.duration_minutes;
        first = Some(first.map_or(record.recorded_at, |t| t.min(record.recorded_at)));
        last = Some(last.map_or(record.recorded_at, |t| t.max(record.recorded_at)));

        let (entry, seen_at) = totals.entry(record.subject_id).or_insert_with(|| {
            (
                SubjectTotal {
                    subject_id: record.subject_id,
                    subject_name: record.subject_name.clone(),
                    minutes: 0.0,
                    sessions: 0,
                },
                record.recorded_at,
            )
        });
        entry.minutes += record.duration_minutes;
        entry.sessions += 1;
        if record.recorded_at >= *seen_at {
            *seen_at = record.recorded_at;
            entry.subject_name.clone_from(&record.subject_name);
        }
    }

    let mut subjects: Vec<SubjectTotal> = totals
        .into_values()
        .map(|(mut entry, _)| {
            entry.minutes = round2(entry.minutes);
            entry
        })
        .collect();
    subjects.sort_by(|a, b| {
        b.minutes
            .total_cmp(&a.minutes)
            .then_with(|| a.subject_name.cmp(&b.subject_name))
    });

    ReadingReport {
        subjects,
        sessions: history.len(),
        total_minutes: round2(total),
        first_recorded_at: first,
        last_recorded_at: last,
    }
}
