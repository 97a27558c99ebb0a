use chrono::{Datelike, Duration, Months, NaiveDate, Utc};
use serde::Serialize;

use crate::config::StatsParams;
use crate::error::{AppError, Result};
use tracker_core::StatsFilter;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn resolve_filter(params: &StatsParams) -> Result<StatsFilter> {
    resolve_filter_at(params, Utc::now().date_naive())
}

/// Validates explicit `from`/`to` dates, or expands a range preset relative
/// to `today`. Blank strings count as absent.
pub fn resolve_filter_at(params: &StatsParams, today: NaiveDate) -> Result<StatsFilter> {
    let mut from = non_blank(&params.from).map(parse_date).transpose()?;
    let mut to = non_blank(&params.to).map(parse_date).transpose()?;

    if from.is_none() && to.is_none() {
        match non_blank(&params.range).unwrap_or("alltime") {
            "today" => from = Some(today),
            "last7days" => from = Some(today - Duration::days(7)),
            "last30days" => from = Some(today - Duration::days(30)),
            "thismonth" => from = today.with_day(1),
            "alltime" => {}
            value => {
                return Err(AppError::InvalidInput(format!(
                    "unsupported range {}",
                    value
                )));
            }
        }
        if from.is_some() {
            to = Some(today);
        }
    }
    if let (Some(start), Some(end)) = (from, to)
        && start > end
    {
        return Err(AppError::InvalidInput(format!(
            "from {} is after to {}",
            start, end
        )));
    }

    Ok(StatsFilter {
        from: from.map(format_date),
        to: to.map(format_date),
        project: non_blank(&params.project).map(str::to_string),
        custom_title: non_blank(&params.custom_title).map(str::to_string),
    })
}

/// Strict `YYYY-MM-DD`.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let valid_shape = value.len() == 10
        && value
            .char_indices()
            .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
    if !valid_shape {
        return Err(AppError::InvalidInput(
            "invalid date format, use YYYY-MM-DD".to_string(),
        ));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|err| AppError::InvalidInput(format!("invalid date {}: {}", value, err)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingPeriod {
    pub period_start: String,
    pub period_end: String,
    pub next_payment: String,
}

/// Monthly subscription cycle containing `today`. The billing day is the
/// day-of-month of `start_date`, clamped to the length of shorter months.
pub fn billing_period(start_date: NaiveDate, today: NaiveDate) -> Result<BillingPeriod> {
    let billing_day = start_date.day();
    let this_month = billing_date(today.with_day(1), billing_day)?;
    let period_start = if today >= this_month {
        this_month
    } else {
        let previous = today
            .with_day(1)
            .and_then(|first| first.checked_sub_months(Months::new(1)));
        billing_date(previous, billing_day)?
    };
    let following = period_start
        .with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)));
    let next_payment = billing_date(following, billing_day)?;
    let period_end = next_payment
        .pred_opt()
        .ok_or_else(|| AppError::InvalidInput("date out of range".to_string()))?;
    Ok(BillingPeriod {
        period_start: format_date(period_start),
        period_end: format_date(period_end),
        next_payment: format_date(next_payment),
    })
}

fn billing_date(month_start: Option<NaiveDate>, billing_day: u32) -> Result<NaiveDate> {
    let month_start =
        month_start.ok_or_else(|| AppError::InvalidInput("date out of range".to_string()))?;
    let last_day = month_start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28);
    month_start
        .with_day(billing_day.min(last_day))
        .ok_or_else(|| AppError::InvalidInput("date out of range".to_string()))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
