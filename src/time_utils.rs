use chrono::DateTime;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::TimeZone;
use chrono::Utc;
use chrono_tz::Tz;

/// A parsed `HH:MM:SS` schedule clock. Hours of 24 and above denote service
/// past midnight that still belongs to the previous service day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleClock {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

pub fn parse_schedule_clock(raw: &str) -> Option<ScheduleClock> {
    let mut parts = raw.split(':');

    let hours = parts.next()?.trim().parse::<u32>().ok()?;
    let minutes = parts.next()?.trim().parse::<u32>().ok()?;
    let seconds = parts.next()?.trim().parse::<u32>().ok()?;

    if parts.next().is_some() || minutes > 59 || seconds > 59 {
        return None;
    }

    Some(ScheduleClock {
        hours,
        minutes,
        seconds,
    })
}

/// Resolve a service-day clock against a base date in the given timezone and
/// return the absolute instant. Hours are normalized mod 24 and the date is
/// advanced by `hours / 24` days, so `25:10:00` on day D lands on D+1 01:10:00.
pub fn compose_service_timestamp(
    base_date: NaiveDate,
    clock: ScheduleClock,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    let day_offset = i64::from(clock.hours / 24);
    let hours = clock.hours % 24;

    let date = base_date.checked_add_signed(Duration::days(day_offset))?;
    let naive = date.and_hms_opt(hours, clock.minutes, clock.seconds)?;

    // earliest() picks the pre-transition instant on DST-ambiguous wall times
    let local = tz.from_local_datetime(&naive).earliest()?;

    Some(local.with_timezone(&Utc))
}

pub fn clock_string_for(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M:%S").to_string()
}

/// Minute-granularity rendering, also used as the time component of
/// minute-bucket collision keys.
pub fn minute_display(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}
