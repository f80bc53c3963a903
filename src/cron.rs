//! Cron 表达式求值模块
//! Cron expression evaluation module
//!
//! 在固定时区偏移下解析 5 字段 cron 表达式，并围绕某个时刻展开
//! 前一次 / 下一次 / 区间内的触发时间。求值是纯函数，可任意重启。
//! Parses 5-field cron expressions and expands previous / next / in-window
//! firing instants around an instant, under a fixed timezone offset. The
//! evaluation is pure and restartable.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, FixedOffset, Offset, SecondsFormat, TimeZone, Utc};
use cron::Schedule;
use std::str::FromStr;

/// 向过去扫描的上限（一年的分钟数），防止稀有表达式导致无界回溯
/// Upper bound for backward scanning (one year of minutes), keeps rare
/// expressions from walking back unboundedly
const MAX_LOOKBACK_MINUTES: u32 = 366 * 24 * 60;

/// 解析后的 cron 表达式
/// A parsed cron expression
///
/// 接受标准 5 字段格式（分 时 日 月 周），内部规格化为带秒字段的形式。
/// 两个匹配相同分钟集合的表达式产生完全相同的触发序列。
/// Accepts the standard 5-field form (minute hour day month weekday) and
/// normalizes it internally to the seconds-bearing form. Two expressions
/// matching the same set of minutes yield identical firing sequences.
#[derive(Debug, Clone)]
pub struct CronSpec {
  raw: String,
  schedule: Schedule,
}

impl CronSpec {
  /// 解析 5 字段 cron 表达式
  /// Parse a 5-field cron expression
  pub fn parse(expr: &str) -> Result<Self> {
    let raw = expr.trim();
    let fields = raw.split_whitespace().count();
    if fields != 5 {
      return Err(Error::invalid_cron(
        raw,
        format!("expected 5 fields, found {}", fields),
      ));
    }
    // 秒字段固定为 0，触发粒度为分钟
    // The seconds field is pinned to 0; firings have minute granularity
    let normalized = format!("0 {}", raw);
    let schedule =
      Schedule::from_str(&normalized).map_err(|e| Error::invalid_cron(raw, e.to_string()))?;
    Ok(Self {
      raw: raw.to_string(),
      schedule,
    })
  }

  /// 原始表达式
  /// The original expression
  pub fn as_str(&self) -> &str {
    &self.raw
  }

  /// `from` 之前（含）最近的 `n` 次触发，按时间降序
  /// The `n` most recent firings at or before `from`, descending
  pub fn previous_firings(
    &self,
    offset: FixedOffset,
    from: DateTime<Utc>,
    n: usize,
  ) -> Vec<DateTime<Utc>> {
    let mut out = Vec::new();
    if n == 0 {
      return out;
    }
    let local = from.with_timezone(&offset);
    let aligned = local.timestamp() - local.timestamp().rem_euclid(60);
    let mut cursor = match offset.timestamp_opt(aligned, 0).single() {
      Some(t) => t,
      None => return out,
    };
    for _ in 0..MAX_LOOKBACK_MINUTES {
      if self.schedule.includes(cursor) {
        out.push(cursor.with_timezone(&Utc));
        if out.len() == n {
          break;
        }
      }
      cursor -= Duration::minutes(1);
    }
    out
  }

  /// `from` 之后（不含）的 `n` 次触发，按时间升序
  /// The `n` firings strictly after `from`, ascending
  pub fn next_firings(
    &self,
    offset: FixedOffset,
    from: DateTime<Utc>,
    n: usize,
  ) -> Vec<DateTime<Utc>> {
    self
      .schedule
      .after(&from.with_timezone(&offset))
      .take(n)
      .map(|t| t.with_timezone(&Utc))
      .collect()
  }

  /// 半开区间 `[start, end)` 内的全部触发，按时间升序
  /// All firings within the half-open window `[start, end)`, ascending
  pub fn firings_within(
    &self,
    offset: FixedOffset,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> Vec<DateTime<Utc>> {
    if start >= end {
      return Vec::new();
    }
    // `after` 是严格大于语义；回退一秒以包含恰好落在 start 上的触发
    // `after` is strictly-greater; back off one second so a firing landing
    // exactly on start is included
    let probe = (start - Duration::seconds(1)).with_timezone(&offset);
    self
      .schedule
      .after(&probe)
      .map(|t| t.with_timezone(&Utc))
      .take_while(|t| *t < end)
      .collect()
  }
}

/// 解析固定时区偏移："UTC"、"Z"、空串、"+05:30"、"-0800" 等
/// Parse a fixed timezone offset: "UTC", "Z", the empty string, "+05:30",
/// "-0800", etc.
pub fn parse_offset(value: &str) -> Result<FixedOffset> {
  let v = value.trim();
  if v.is_empty() || v == "Z" || v.eq_ignore_ascii_case("utc") {
    return Ok(Utc.fix());
  }
  let (sign, rest) = match v.chars().next() {
    Some('+') => (1i32, &v[1..]),
    Some('-') => (-1i32, &v[1..]),
    _ => return Err(Error::invalid_timezone(value)),
  };
  let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
    (h, m)
  } else if rest.len() == 4 {
    rest.split_at(2)
  } else {
    return Err(Error::invalid_timezone(value));
  };
  let hours: i32 = hours
    .parse()
    .map_err(|_| Error::invalid_timezone(value))?;
  let minutes: i32 = minutes
    .parse()
    .map_err(|_| Error::invalid_timezone(value))?;
  if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
    return Err(Error::invalid_timezone(value));
  }
  FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
    .ok_or_else(|| Error::invalid_timezone(value))
}

/// 以日程所在偏移格式化时刻（RFC 3339，零偏移渲染为 `Z`）
/// Format an instant in the schedule's offset (RFC 3339, a zero offset
/// renders as `Z`)
pub fn format_instant(instant: &DateTime<FixedOffset>) -> String {
  instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}
