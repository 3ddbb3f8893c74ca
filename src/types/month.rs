//! Month selection for catalog requests.

use thiserror::Error;

pub(crate) const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Error returned when a month index falls outside 1-12.
#[derive(Debug, Error)]
#[error("month {0} is out of range (expected 1-12)")]
pub struct InvalidMonth(pub u32);

/// Restricts a clearinghouse catalog to a subset of its months.
///
/// The clearinghouse groups daily downloads by month; a filter either keeps
/// everything, one month, or an explicit list of months.
///
/// # Examples
///
/// ```
/// use pems::MonthFilter;
///
/// let january = MonthFilter::single(1).unwrap();
/// let q1 = MonthFilter::months(vec![1, 2, 3]).unwrap();
/// assert!(MonthFilter::single(13).is_err());
/// assert!(q1 != january);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthFilter {
    /// Keep every month the catalog lists.
    All,
    /// Keep a single month (1-12).
    Single(u32),
    /// Keep an explicit set of months (each 1-12).
    Months(Vec<u32>),
}

impl MonthFilter {
    /// Builds a single-month filter, validating the index.
    pub fn single(month: u32) -> Result<Self, InvalidMonth> {
        validate(month)?;
        Ok(MonthFilter::Single(month))
    }

    /// Builds a multi-month filter, validating every index.
    pub fn months(months: Vec<u32>) -> Result<Self, InvalidMonth> {
        for &month in &months {
            validate(month)?;
        }
        Ok(MonthFilter::Months(months))
    }

    pub(crate) fn includes(&self, month: u32) -> bool {
        match self {
            MonthFilter::All => true,
            MonthFilter::Single(selected) => *selected == month,
            MonthFilter::Months(selected) => selected.contains(&month),
        }
    }
}

fn validate(month: u32) -> Result<(), InvalidMonth> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(InvalidMonth(month))
    }
}

/// English name of a month index, which some catalogs use as their keys.
pub(crate) fn month_name(month: u32) -> &'static str {
    MONTH_NAMES[(month - 1) as usize]
}
