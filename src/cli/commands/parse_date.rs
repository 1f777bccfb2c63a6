//! Date normalizer check.

use chrono::{Datelike, Local};
use console::style;

use crate::models::SENTINEL;
use crate::services::date_normalize::{DateNormalizer, DayOrder};

pub fn cmd_parse_date(text: &str, year: Option<i32>, month_first: bool) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    let order = if month_first {
        DayOrder::MonthFirst
    } else {
        DayOrder::DayFirst
    };
    let normalizer = DateNormalizer::new(year.unwrap_or(today.year()), today, order);

    match normalizer.normalize(text) {
        Ok(date) => println!("{}", date.format("%Y-%m-%d")),
        Err(e) => {
            println!("{}", SENTINEL);
            eprintln!("{} {}", style("!").yellow(), e);
        }
    }
    Ok(())
}
