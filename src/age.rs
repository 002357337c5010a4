//! Purpose: Compute a worker's age in completed years from a `YYYY-MM-DD` birth date.
//! Exports: `parse_dob`, `format_dob`, `age_in_years`, `age_today`.
//! Role: Pure helper used by the listing command; never touches the store.
//! Invariants: Malformed or future dates surface as `ErrorKind::MalformedInput`.
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::core::error::{Error, ErrorKind};

pub fn parse_dob(dob: &str) -> Result<Date, Error> {
    Date::parse(dob, format_description!("[year]-[month]-[day]")).map_err(|err| {
        Error::new(ErrorKind::MalformedInput)
            .with_message(format!("invalid date of birth: {dob:?}"))
            .with_hint("Use the YYYY-MM-DD form, e.g. 1990-05-17.")
            .with_source(err)
    })
}

pub fn format_dob(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Completed years between `dob` and `today`. The count drops by one while
/// `today`'s (month, day) is still before the birthday.
pub fn age_in_years(dob: &str, today: Date) -> Result<u32, Error> {
    let birth = parse_dob(dob)?;
    let mut years = today.year() - birth.year();
    if (u8::from(today.month()), today.day()) < (u8::from(birth.month()), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).map_err(|_| {
        Error::new(ErrorKind::MalformedInput)
            .with_message(format!("date of birth is in the future: {dob}"))
    })
}

/// Age against today's local calendar date.
pub fn age_today(dob: &str) -> Result<u32, Error> {
    let today = calendar_date(
        OffsetDateTime::now_utc(),
        UtcOffset::current_local_offset().ok(),
    );
    age_in_years(dob, today)
}

/// Calendar date of `now` at `offset`; UTC when the local offset cannot be
/// determined (e.g. other threads are running on Unix).
fn calendar_date(now: OffsetDateTime, offset: Option<UtcOffset>) -> Date {
    now.to_offset(offset.unwrap_or(UtcOffset::UTC)).date()
}
