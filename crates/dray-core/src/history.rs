use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use tracing::debug;

use crate::datetime::parse_record_date;
use crate::task::TaskRecord;

/// Inclusive calendar-date window selected in the history view.
///
/// Absent bounds are open: a missing start admits everything up to `end`,
/// a missing end everything from `start` on. With both bounds absent the
/// range is unbounded and filtering is skipped entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn admits(&self, date: NaiveDate) -> bool {
        let start = self.start.unwrap_or(NaiveDate::MIN);
        let end = self.end.unwrap_or(NaiveDate::MAX);
        start <= date && date <= end
    }
}

/// Which timestamp column governs range filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterField {
    Deadline,
    Created,
}

/// Which column governs output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderField {
    Deadline,
    Created,
    Status,
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadline => f.write_str("deadline"),
            Self::Created => f.write_str("created"),
        }
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadline => f.write_str("deadline"),
            Self::Created => f.write_str("created"),
            Self::Status => f.write_str("status"),
        }
    }
}

/// Derives the history view: tasks admitted by `range` on `filter_field`,
/// stably sorted on `order_field`.
///
/// Whenever a bound is set, a task whose filter date is absent or fails to
/// parse is excluded. Under a date ordering such tasks sort after every
/// task with a valid date, keeping their input order among themselves;
/// status ordering is case-insensitive with absent status last. Filter
/// field and order field are independent selectors.
#[tracing::instrument(skip(tasks), fields(total = tasks.len()))]
pub fn derive(
    tasks: &[TaskRecord],
    range: &DateRange,
    filter_field: FilterField,
    order_field: OrderField,
) -> Vec<TaskRecord> {
    let mut rows: Vec<TaskRecord> = tasks
        .iter()
        .filter(|task| {
            if range.is_unbounded() {
                return true;
            }
            filter_date(task, filter_field).is_some_and(|date| range.admits(date))
        })
        .cloned()
        .collect();

    rows.sort_by(|a, b| compare_on_field(a, b, order_field));

    debug!(kept = rows.len(), "derived history view");
    rows
}

fn filter_date(task: &TaskRecord, field: FilterField) -> Option<NaiveDate> {
    let raw = match field {
        FilterField::Deadline => task.deadline.as_deref(),
        FilterField::Created => task.creation_date.as_deref(),
    };
    raw.and_then(parse_record_date)
}

fn compare_on_field(a: &TaskRecord, b: &TaskRecord, field: OrderField) -> Ordering {
    match field {
        OrderField::Deadline => cmp_present_first(
            a.deadline.as_deref().and_then(parse_record_date),
            b.deadline.as_deref().and_then(parse_record_date),
        ),
        OrderField::Created => cmp_present_first(
            a.creation_date.as_deref().and_then(parse_record_date),
            b.creation_date.as_deref().and_then(parse_record_date),
        ),
        OrderField::Status => cmp_present_first(
            a.status.as_deref().map(str::to_ascii_lowercase),
            b.status.as_deref().map(str::to_ascii_lowercase),
        ),
    }
}

fn cmp_present_first<T: Ord>(left: Option<T>, right: Option<T>) -> Ordering {
    match (left, right) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{DateRange, FilterField, OrderField, derive};
    use crate::task::TaskRecord;

    fn task(id: i64, status: Option<&str>, created: Option<&str>, deadline: Option<&str>) -> TaskRecord {
        TaskRecord {
            id,
            kind: Some("delivery".to_string()),
            status: status.map(ToString::to_string),
            description: None,
            creation_date: created.map(ToString::to_string),
            deadline: deadline.map(ToString::to_string),
            user_id: None,
        }
    }

    fn ids(rows: &[TaskRecord]) -> Vec<i64> {
        rows.iter().map(|row| row.id).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> DateRange {
        DateRange { start, end }
    }

    #[test]
    fn unbounded_range_keeps_every_task() {
        let tasks = vec![
            task(1, Some("done"), None, Some("2024-01-05")),
            task(2, Some("open"), None, Some("2024-01-01")),
            task(3, Some("open"), None, None),
        ];

        let out = derive(&tasks, &DateRange::default(), FilterField::Deadline, OrderField::Deadline);
        assert_eq!(ids(&out), vec![2, 1, 3]);

        let mut sorted_input = ids(&tasks);
        let mut sorted_output = ids(&out);
        sorted_input.sort_unstable();
        sorted_output.sort_unstable();
        assert_eq!(sorted_input, sorted_output);
    }

    #[test]
    fn range_excludes_out_of_window_and_unparsable_deadlines() {
        let tasks = vec![
            task(1, Some("done"), None, Some("2024-01-05")),
            task(2, Some("open"), None, Some("2024-01-01")),
            task(3, Some("open"), None, None),
        ];
        let window = range(Some(date(2024, 1, 2)), Some(date(2024, 1, 10)));

        let out = derive(&tasks, &window, FilterField::Deadline, OrderField::Deadline);
        assert_eq!(ids(&out), vec![1]);
    }

    #[test]
    fn inverted_range_admits_nothing() {
        let tasks = vec![
            task(1, None, Some("2024-01-05"), Some("2024-01-05")),
            task(2, None, Some("2024-06-01"), Some("2024-06-01")),
        ];
        let window = range(Some(date(2024, 7, 1)), Some(date(2024, 1, 1)));

        assert!(derive(&tasks, &window, FilterField::Created, OrderField::Created).is_empty());
        assert!(derive(&tasks, &window, FilterField::Deadline, OrderField::Status).is_empty());
    }

    #[test]
    fn open_bounds_admit_everything_on_one_side() {
        let tasks = vec![
            task(1, None, Some("2023-12-25"), None),
            task(2, None, Some("2024-01-15"), None),
            task(3, None, Some("2024-02-20"), None),
        ];

        let from_jan = range(Some(date(2024, 1, 1)), None);
        assert_eq!(
            ids(&derive(&tasks, &from_jan, FilterField::Created, OrderField::Created)),
            vec![2, 3]
        );

        let until_jan = range(None, Some(date(2024, 1, 31)));
        assert_eq!(
            ids(&derive(&tasks, &until_jan, FilterField::Created, OrderField::Created)),
            vec![1, 2]
        );
    }

    #[test]
    fn all_unparsable_dates_with_active_range_yield_empty_output() {
        let tasks = vec![
            task(1, Some("open"), Some("not a date"), Some("also bad")),
            task(2, Some("open"), None, Some("2024-01-01T10:00:00")),
        ];
        let window = range(Some(date(2020, 1, 1)), Some(date(2030, 1, 1)));

        assert!(derive(&tasks, &window, FilterField::Deadline, OrderField::Deadline).is_empty());
        assert!(derive(&tasks, &window, FilterField::Created, OrderField::Created).is_empty());
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let window = range(Some(date(2024, 1, 1)), Some(date(2024, 12, 31)));
        assert!(derive(&[], &window, FilterField::Deadline, OrderField::Status).is_empty());
        assert!(derive(&[], &DateRange::default(), FilterField::Created, OrderField::Created).is_empty());
    }

    #[test]
    fn missing_dates_sort_after_valid_ones_in_input_order() {
        let tasks = vec![
            task(1, None, None, None),
            task(2, None, None, Some("2024-02-01")),
            task(3, None, None, Some("definitely not ISO")),
            task(4, None, None, Some("2024-01-01")),
            task(5, None, None, None),
        ];

        let out = derive(&tasks, &DateRange::default(), FilterField::Deadline, OrderField::Deadline);
        assert_eq!(ids(&out), vec![4, 2, 1, 3, 5]);
    }

    #[test]
    fn status_order_is_case_insensitive_and_stable() {
        let tasks = vec![
            task(1, Some("Open"), None, None),
            task(2, Some("done"), None, None),
            task(3, Some("OPEN"), None, None),
            task(4, None, None, None),
        ];

        let out = derive(&tasks, &DateRange::default(), FilterField::Deadline, OrderField::Status);
        // Alphabetical ignoring case: "done" first, then both "open"
        // variants in input order, absent status last.
        assert_eq!(ids(&out), vec![2, 1, 3, 4]);
    }

    #[test]
    fn equal_keys_preserve_input_order() {
        let tasks = vec![
            task(10, Some("open"), None, Some("2024-03-01")),
            task(11, Some("open"), None, Some("2024-03-01")),
            task(12, Some("open"), None, Some("2024-02-01")),
            task(13, Some("open"), None, Some("2024-03-01")),
        ];

        let out = derive(&tasks, &DateRange::default(), FilterField::Created, OrderField::Deadline);
        assert_eq!(ids(&out), vec![12, 10, 11, 13]);
    }

    #[test]
    fn filter_and_order_fields_are_independent() {
        let tasks = vec![
            task(1, Some("b"), Some("2024-01-10"), Some("2024-01-01")),
            task(2, Some("a"), Some("2024-01-20"), Some("2024-01-02")),
            task(3, Some("c"), Some("2024-02-05"), Some("2024-01-03")),
        ];
        // Filter on creation date, order on status.
        let window = range(Some(date(2024, 1, 1)), Some(date(2024, 1, 31)));

        let out = derive(&tasks, &window, FilterField::Created, OrderField::Status);
        assert_eq!(ids(&out), vec![2, 1]);

        // Same window applied to deadlines admits all three.
        let out = derive(&tasks, &window, FilterField::Deadline, OrderField::Created);
        assert_eq!(ids(&out), vec![1, 2, 3]);
    }

    #[test]
    fn date_time_values_filter_on_their_encoded_date() {
        let tasks = vec![
            task(1, None, Some("2024-01-31T23:30:00-03:00"), None),
            task(2, None, Some("2024-02-01T00:10:00+00:00"), None),
        ];
        let january = range(Some(date(2024, 1, 1)), Some(date(2024, 1, 31)));

        let out = derive(&tasks, &january, FilterField::Created, OrderField::Created);
        assert_eq!(ids(&out), vec![1]);
    }
}
