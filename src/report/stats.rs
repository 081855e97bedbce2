use crate::model::attendance::AttendanceRecord;
use crate::model::status::AttendanceStatus;
use crate::model::student::Student;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use utoipa::ToSchema;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub present: u32,
    pub late: u32,
    pub sick: u32,
    pub absent: u32,
    pub excused: u32,
    pub total: u32,
}

impl StatusCounts {
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = AttendanceStatus>,
    {
        let mut counts = StatusCounts::default();
        for status in statuses {
            counts.add(status);
        }
        counts
    }

    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Sick => self.sick += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
        self.total += 1;
    }

    pub fn attending(&self) -> u32 {
        self.present + self.late
    }

    pub fn not_attending(&self) -> u32 {
        self.sick + self.absent + self.excused
    }

    /// `(present + late) / total` as a rounded percentage, 0 when empty.
    pub fn attendance_percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (f64::from(self.attending()) / f64::from(self.total) * 100.0).round() as u32
    }
}

/// Counts for the records dated `date`.
pub fn counts_for_date(records: &[AttendanceRecord], date: NaiveDate) -> StatusCounts {
    StatusCounts::tally(records.iter().filter(|r| r.date == date).map(|r| r.status))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_students: u64,
    pub today: StatusCounts,
    /// Share of the roster marked present today, one decimal.
    pub attendance_rate: f64,
}

pub fn dashboard_stats(
    records: &[AttendanceRecord],
    today: NaiveDate,
    total_students: u64,
) -> DashboardStats {
    let counts = counts_for_date(records, today);
    let attendance_rate = if total_students == 0 {
        0.0
    } else {
        let rate = f64::from(counts.present) / total_students as f64 * 100.0;
        (rate * 10.0).round() / 10.0
    };

    DashboardStats {
        total_students,
        today: counts,
        attendance_rate,
    }
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct WeeklyPoint {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// Short Indonesian weekday name, e.g. `Sen`.
    pub day: String,
    pub present: u32,
    pub absent: u32,
}

const DAY_NAMES: [&str; 7] = ["Min", "Sen", "Sel", "Rab", "Kam", "Jum", "Sab"];

fn short_day_name(date: NaiveDate) -> &'static str {
    DAY_NAMES[date.weekday().num_days_from_sunday() as usize]
}

/// One point per day for the seven days ending at `today`, oldest first.
pub fn weekly_chart(records: &[AttendanceRecord], today: NaiveDate) -> Vec<WeeklyPoint> {
    (0..7)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            let counts = counts_for_date(records, date);
            WeeklyPoint {
                date,
                day: short_day_name(date).to_string(),
                present: counts.attending(),
                absent: counts.not_attending(),
            }
        })
        .collect()
}

/// Newest `limit` records by creation time.
pub fn recent_activity(records: &[AttendanceRecord], limit: usize) -> Vec<AttendanceRecord> {
    let mut sorted: Vec<_> = records.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(limit);
    sorted
}

/// First and last day of a `YYYY-MM` month.
pub fn month_range(month: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (year, mon) = month.split_once('-')?;
    if year.len() != 4 || mon.len() != 2 {
        return None;
    }
    let first = NaiveDate::from_ymd_opt(year.parse().ok()?, mon.parse().ok()?, 1)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentRecap {
    pub student_id: u64,
    pub name: String,
    pub class_name: String,
    pub nis: String,
    pub counts: StatusCounts,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyRecap {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub counts: StatusCounts,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyRecap {
    #[schema(example = "2026-10")]
    pub month: String,
    pub total_days: u32,
    /// Distinct dates that have at least one record.
    pub active_days: u32,
    pub counts: StatusCounts,
    pub students: Vec<StudentRecap>,
    pub days: Vec<DailyRecap>,
}

/// Aggregates one month of admin records. `records` must already be
/// limited to the month; records whose student left the roster count in
/// the totals but not in the per-student rows.
pub fn monthly_recap(
    month: &str,
    first: NaiveDate,
    last: NaiveDate,
    records: &[AttendanceRecord],
    students: &[Student],
) -> MonthlyRecap {
    let total_days = (last - first).num_days() as u32 + 1;
    let active_days = records.iter().map(|r| r.date).collect::<BTreeSet<_>>().len() as u32;
    let counts = StatusCounts::tally(records.iter().map(|r| r.status));

    let mut per_student: HashMap<u64, StatusCounts> = HashMap::new();
    let mut per_day: BTreeMap<NaiveDate, StatusCounts> = BTreeMap::new();
    for record in records {
        per_student.entry(record.student_id).or_default().add(record.status);
        per_day.entry(record.date).or_default().add(record.status);
    }

    let mut student_rows: Vec<StudentRecap> = students
        .iter()
        .filter_map(|s| {
            per_student.get(&s.id).map(|counts| StudentRecap {
                student_id: s.id,
                name: s.name.clone(),
                class_name: s.class_name.clone(),
                nis: s.nis.clone(),
                counts: *counts,
            })
        })
        .collect();
    // stable: ties keep roster order
    student_rows.sort_by(|a, b| b.counts.total.cmp(&a.counts.total));

    let days = per_day
        .into_iter()
        .rev()
        .map(|(date, counts)| DailyRecap { date, counts })
        .collect();

    MonthlyRecap {
        month: month.to_string(),
        total_days,
        active_days,
        counts,
        students: student_rows,
        days,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::model::student::Gender;
    use AttendanceStatus::*;

    #[test]
    fn date_counts_match_literal_filters() {
        let records = vec![
            record(1, 1, "2026-10-16", Present),
            record(2, 2, "2026-10-16", Late),
            record(3, 3, "2026-10-16", Late),
            record(4, 4, "2026-10-16", Sick),
            record(5, 5, "2026-10-16", Absent),
            record(6, 1, "2026-10-15", Absent),
        ];
        let day = date("2026-10-16");
        let counts = counts_for_date(&records, day);

        let literal = |status| {
            records
                .iter()
                .filter(|r| r.date == day && r.status == status)
                .count() as u32
        };
        assert_eq!(counts.present, literal(Present));
        assert_eq!(counts.late, literal(Late));
        assert_eq!(counts.sick, literal(Sick));
        assert_eq!(counts.absent, literal(Absent));
        assert_eq!(counts.total, 5);
    }

    #[test]
    fn percentage_counts_late_as_attending() {
        let counts = StatusCounts::tally([Present, Late, Sick]);
        assert_eq!(counts.attendance_percentage(), 67);
        assert_eq!(StatusCounts::default().attendance_percentage(), 0);
    }

    #[test]
    fn dashboard_rate_uses_roster_size() {
        let records = vec![
            record(1, 1, "2026-10-17", Present),
            record(2, 2, "2026-10-17", Late),
        ];
        let stats = dashboard_stats(&records, date("2026-10-17"), 3);
        assert_eq!(stats.attendance_rate, 33.3);
        assert_eq!(dashboard_stats(&records, date("2026-10-17"), 0).attendance_rate, 0.0);
    }

    #[test]
    fn weekly_chart_covers_seven_days_oldest_first() {
        let records = vec![
            record(1, 1, "2026-10-17", Present),
            record(2, 2, "2026-10-17", Late),
            record(3, 3, "2026-10-17", Excused),
            record(4, 1, "2026-10-11", Sick),
            record(5, 1, "2026-10-10", Present),
        ];
        let chart = weekly_chart(&records, date("2026-10-17"));

        assert_eq!(chart.len(), 7);
        assert_eq!(chart[0].date, date("2026-10-11"));
        assert_eq!(chart[0].day, "Min");
        assert_eq!((chart[0].present, chart[0].absent), (0, 1));
        assert_eq!(chart[6].day, "Sab");
        assert_eq!(
            chart.iter().map(|p| p.day.as_str()).collect::<Vec<_>>(),
            ["Min", "Sen", "Sel", "Rab", "Kam", "Jum", "Sab"]
        );
        assert_eq!((chart[6].present, chart[6].absent), (2, 1));
    }

    #[test]
    fn recent_activity_is_newest_first() {
        let records: Vec<_> = (1..=8).map(|i| record(i, i, "2026-10-17", Present)).collect();
        let recent = recent_activity(&records, 5);
        let ids: Vec<u64> = recent.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![8, 7, 6, 5, 4]);
    }

    #[test]
    fn month_range_handles_month_lengths() {
        assert_eq!(
            month_range("2026-02"),
            Some((date("2026-02-01"), date("2026-02-28")))
        );
        assert_eq!(
            month_range("2024-12"),
            Some((date("2024-12-01"), date("2024-12-31")))
        );
        assert_eq!(month_range("2026-13"), None);
        assert_eq!(month_range("202610"), None);
        assert_eq!(month_range("26-10"), None);
    }

    #[test]
    fn recap_groups_by_student_and_day() {
        let students = vec![
            student(1, "Ahmad", "XII IPA 1", Gender::Male),
            student(2, "Sari", "XII IPA 1", Gender::Female),
            student(3, "Budi", "XII IPA 2", Gender::Male),
        ];
        let records = vec![
            record(1, 1, "2026-10-01", Present),
            record(2, 2, "2026-10-01", Sick),
            record(3, 2, "2026-10-02", Late),
            record(4, 9, "2026-10-02", Absent),
        ];
        let (first, last) = month_range("2026-10").unwrap();
        let recap = monthly_recap("2026-10", first, last, &records, &students);

        assert_eq!(recap.total_days, 31);
        assert_eq!(recap.active_days, 2);
        assert_eq!(recap.counts.total, 4);

        let names: Vec<&str> = recap.students.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Sari", "Ahmad"]);
        assert_eq!(recap.students[0].counts.sick, 1);
        assert_eq!(recap.students[0].counts.late, 1);

        let days: Vec<NaiveDate> = recap.days.iter().map(|d| d.date).collect();
        assert_eq!(days, vec![date("2026-10-02"), date("2026-10-01")]);
        assert_eq!(recap.days[0].counts.absent, 1);
    }
}
