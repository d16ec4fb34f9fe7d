//! `DUMP_CRON` schedule parsing, grounded in `doscrawler/dumps/crons.py`'s `@app.crontab`
//! decorator. Faust's crontab driver is out of scope, so the `cli` crate's loop computes the
//! next fire time itself and sleeps until then.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::DumpWriterError;

pub fn next_fire_after(expr: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, DumpWriterError> {
    let schedule = Schedule::from_str(expr)?;
    Ok(schedule.after(&after).next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hourly_schedule_fires_on_the_hour() {
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 13, 30, 0).unwrap();
        let next = next_fire_after("0 0 * * * *", after).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 14, 0, 0).unwrap());
    }

    #[test]
    fn malformed_expression_is_rejected() {
        assert!(next_fire_after("not a cron expression", Utc::now()).is_err());
    }
}
