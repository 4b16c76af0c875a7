use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Days,
  Local,
  NaiveDate,
  Weekday
};
use regex::Regex;

/// Calendar date of the local clock.
#[must_use]
pub fn local_today() -> NaiveDate {
  Local::now().date_naive()
}

/// Due dates are displayed the way the task list shows them, e.g.
/// `Jan 3, 2024`.
#[must_use]
pub fn format_due_date(
  date: NaiveDate
) -> String {
  date.format("%b %-d, %Y").to_string()
}

pub fn parse_due_date(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "date out of range for \
             tomorrow"
          )
        });
    }
    | "yesterday" => {
      return today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "date out of range for \
             yesterday"
          )
        });
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return next_weekday_date(
      today,
      target_weekday
    );
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: u64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative amount"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let days = match unit {
      | "w" => num.saturating_mul(7),
      | _ => num
    };

    let shifted = if sign == "-" {
      today.checked_sub_days(Days::new(
        days
      ))
    } else {
      today.checked_add_days(Days::new(
        days
      ))
    };

    return shifted.ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {token}"
      )
    });
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized due date: \
       {token}"
    )
  })
}

fn parse_weekday_name(
  lower: &str
) -> Option<Weekday> {
  match lower {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  today: NaiveDate,
  target: Weekday
) -> anyhow::Result<NaiveDate> {
  let current = today
    .weekday()
    .num_days_from_monday();
  let wanted =
    target.num_days_from_monday();
  let mut ahead =
    (wanted + 7 - current) % 7;
  if ahead == 0 {
    ahead = 7;
  }
  today
    .checked_add_days(Days::new(
      u64::from(ahead)
    ))
    .ok_or_else(|| {
      anyhow!(
        "weekday date out of range"
      )
    })
}
