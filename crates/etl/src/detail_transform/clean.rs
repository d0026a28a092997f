//! Cleaning rules: raw page text → the canonical enriched record.
//!
//! Every rule is total: a field that fails to parse comes out `None`
//! (or empty), never an error. The texts arrive with UI decoration
//! (em-dashes, dot-operators, capital-letter run-ons) that the shared
//! normalization strips first.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use jobrail_codec::EnrichedJob;

use crate::html::markdown::html_to_markdown;

use super::raw::RawJobPage;

const HOURS_PER_YEAR: i64 = 40 * 52;
const WEEKS_PER_YEAR: i64 = 52;
const MONTHS_PER_YEAR: i64 = 12;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

// ── Normalization ────────────────────────────────────────────────────

/// Shared text normalization: em-dash → `-`, dot-operator → space,
/// a space injected before capital-letter run-ons, lowercase, trim.
pub fn normalize(raw: &str) -> String {
    let replaced = raw
        .replace('\u{2013}', "-")
        .replace("\\xe2\\x80\\x93", "-")
        .replace('\u{2219}', " ")
        .replace("\\xe2\\x88\\x99", " ");
    inject_spaces(&replaced).to_lowercase().trim().to_string()
}

/// Insert a space before an uppercase letter glued to the word before
/// it. `K` is special-cased so `$80K` keeps its thousands suffix.
fn inject_spaces(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        let prev = if i > 0 { Some(chars[i - 1]) } else { None };
        let prev2 = if i > 1 { Some(chars[i - 2]) } else { None };
        let after_two_uppers = prev.is_some_and(|p| p.is_ascii_uppercase())
            && prev2.is_some_and(|p| p.is_ascii_uppercase());
        let needs_space = if !c.is_ascii_uppercase() || i == 0 {
            false
        } else if c == 'K' {
            prev.is_some_and(|p| {
                !p.is_ascii_digit() && !p.is_ascii_uppercase() && !p.is_whitespace()
            }) || after_two_uppers
        } else {
            prev.is_some_and(|p| !p.is_whitespace() && !p.is_ascii_uppercase()) || after_two_uppers
        };
        if needs_space {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

fn lower_and_strip(raw: &str) -> String {
    raw.to_lowercase().trim().to_string()
}

// ── Wage ─────────────────────────────────────────────────────────────

fn annualize(unit: &str, in_thousands: bool, low: i64, high: i64) -> Option<[i64; 2]> {
    let k = if in_thousands { 1000 } else { 1 };
    let per_year = match unit {
        // A `k` on an hourly wage reads as "annual already".
        "hr" | "hour" if in_thousands => 1,
        "hr" | "hour" => HOURS_PER_YEAR,
        "wk" | "week" => WEEKS_PER_YEAR,
        "mo" | "month" => MONTHS_PER_YEAR,
        "yr" | "year" => 1,
        _ => return None,
    };
    Some([low * per_year * k, high * per_year * k])
}

/// Parse a wage text into an annualized USD range.
///
/// `unpaid` → `[0, 0]`; a bare `paid` → `None` (acknowledged but
/// unquantified); no unit mention at all → `None`.
pub fn clean_wage(raw: &str) -> Option<[i64; 2]> {
    static UNIT: OnceLock<Regex> = OnceLock::new();
    static RANGE: OnceLock<Regex> = OnceLock::new();
    static THOUSANDS: OnceLock<Regex> = OnceLock::new();

    let text = normalize(raw);
    let unit_re = regex(&UNIT, r"/(\w+)|\bper (\w+)|\b(unpaid|paid)\b");
    let captures = unit_re.captures(&text)?;
    let unit = captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))?
        .as_str();

    match unit {
        "unpaid" => return Some([0, 0]),
        "paid" => return None,
        _ => {}
    }

    let range = regex(&RANGE, r"(?s).*?(\d+)(?:[^\d].*?(\d+))?").captures(&text)?;
    let low: i64 = range.get(1)?.as_str().parse().ok()?;
    let high: i64 = match range.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => low,
    };
    let in_thousands = regex(&THOUSANDS, r"\d(k)").is_match(&text);
    annualize(unit, in_thousands, low, high)
}

// ── Location ─────────────────────────────────────────────────────────

/// The free-form place name after `based in `.
pub fn clean_location(raw: &str) -> Option<String> {
    static LOCATION: OnceLock<Regex> = OnceLock::new();
    let text = normalize(raw);
    regex(&LOCATION, r"based in (.*)$")
        .captures(&text)
        .map(|captures| captures[1].to_string())
}

/// The work-mode subset mentioned in the location text.
pub fn clean_location_type(raw: &str) -> Vec<String> {
    static MODE: OnceLock<Regex> = OnceLock::new();
    let text = normalize(raw);
    let mut out: Vec<String> = Vec::new();
    for found in regex(&MODE, r"(onsite|remote|hybrid)").find_iter(&text) {
        let mode = found.as_str().to_string();
        if !out.contains(&mode) {
            out.push(mode);
        }
    }
    out
}

// ── Employment / job type ────────────────────────────────────────────

pub fn clean_employment_type(raw: &str) -> Option<String> {
    static EMPLOYMENT: OnceLock<Regex> = OnceLock::new();
    let text = normalize(raw);
    regex(&EMPLOYMENT, r"\w+-time")
        .find(&text)
        .map(|found| found.as_str().to_string())
}

pub fn clean_job_type(raw: &str) -> String {
    normalize(raw)
}

// ── Apply type ───────────────────────────────────────────────────────

/// The plain `Apply` button is the internal flow; anything else sends
/// the candidate elsewhere.
pub fn clean_apply_type(raw: &str) -> String {
    if normalize(raw) == "apply" {
        "internal".to_string()
    } else {
        "external".to_string()
    }
}

// ── Times ────────────────────────────────────────────────────────────

fn strip_bullet(raw: &str) -> String {
    raw.replace('\u{2219}', " ").replace("\\xe2\\x88\\x99", " ")
}

/// `posted N unit[s] ago` → the instant `N` units before the scrape.
pub fn clean_posted_at(raw: &str, scraped_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    static POSTED: OnceLock<Regex> = OnceLock::new();
    let text = strip_bullet(raw);
    let captures = regex(&POSTED, r"(?i)posted (\d+) ([a-zA-Z]+)").captures(&text)?;
    let count: i64 = captures[1].parse().ok()?;
    let unit = captures[2].to_lowercase();
    let unit = unit.strip_suffix('s').unwrap_or(&unit);
    match unit {
        "second" => Some(scraped_at - Duration::seconds(count)),
        "minute" => Some(scraped_at - Duration::minutes(count)),
        "hour" => Some(scraped_at - Duration::hours(count)),
        "day" => Some(scraped_at - Duration::days(count)),
        "week" => Some(scraped_at - Duration::weeks(count)),
        "month" => shift_months(scraped_at, -(count as i32)),
        "year" => shift_months(scraped_at, -(count as i32) * 12),
        _ => None,
    }
}

/// Calendar-aware month arithmetic with end-of-month clamping.
fn shift_months(instant: DateTime<Utc>, months: i32) -> Option<DateTime<Utc>> {
    let date = instant.date_naive();
    let total = date.year() * 12 + date.month0() as i32 + months;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u32;
    let day = date.day().min(days_in_month(year, month0 + 1)?);
    let shifted = NaiveDate::from_ymd_opt(year, month0 + 1, day)?.and_time(instant.time());
    Some(DateTime::from_naive_utc_and_offset(shifted, Utc))
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(next.signed_duration_since(first).num_days() as u32)
}

/// `apply by Month D, Y at H:MM am|pm` → the naive local deadline.
pub fn clean_apply_by(raw: &str) -> Option<NaiveDateTime> {
    static APPLY: OnceLock<Regex> = OnceLock::new();
    let text = strip_bullet(raw);
    let captures = regex(
        &APPLY,
        r"(?i)apply by (\w+) (\d+), (\d+) at (\d+:\d+) (am|pm)",
    )
    .captures(&text)?;
    let stamp = format!(
        "{} {} {} {} {}",
        &captures[1], &captures[2], &captures[3], &captures[4], &captures[5]
    );
    NaiveDateTime::parse_from_str(&stamp, "%B %d %Y %I:%M %p").ok()
}

// ── About ────────────────────────────────────────────────────────────

/// Inner HTML → Markdown → artifact scrub.
pub fn clean_about(raw_html: &str) -> String {
    static HEX_RESIDUE: OnceLock<Regex> = OnceLock::new();
    static AFTER_NEWLINE: OnceLock<Regex> = OnceLock::new();
    static SPACE_RUN: OnceLock<Regex> = OnceLock::new();

    let markdown = html_to_markdown(raw_html);
    let replaced = markdown
        .replace("\\xc2\\xa0", " ")
        .replace('\u{a0}', " ")
        .replace("\\xe2\\x80\\x93", "-")
        .replace("\\xe2\\x80\\x98", "\"")
        .replace("\\xe2\\x80\\x99", "\"")
        .replace('\u{2018}', "\"")
        .replace('\u{2019}', "\"")
        .replace("Less\n", "");
    let no_hex = regex(&HEX_RESIDUE, r"\\x..").replace_all(&replaced, "");
    let tight_lines = regex(&AFTER_NEWLINE, r"\n\s+").replace_all(&no_hex, "\n");
    let tight = regex(&SPACE_RUN, r"( ) +").replace_all(&tight_lines, "$1");
    tight.trim().to_string()
}

// ── Documents ────────────────────────────────────────────────────────

/// `Search your <name>` placeholders → `<name>` with any plural `s`
/// dropped.
pub fn clean_documents(raw: &[String]) -> Vec<String> {
    static DOCUMENT: OnceLock<Regex> = OnceLock::new();
    raw.iter()
        .filter_map(|placeholder| {
            let trimmed = placeholder.trim();
            let captures = regex(&DOCUMENT, r"Search your\s+(.*)").captures(trimmed)?;
            Some(captures[1].trim_end_matches('s').to_string())
        })
        .collect()
}

// ── Assembly ─────────────────────────────────────────────────────────

/// Run every cleaning rule over the raw page and assemble the record.
pub fn enrich(raw: &RawJobPage, url: &str, scraped_at: DateTime<Utc>) -> EnrichedJob {
    let times = raw.times();
    let location = raw.location();
    EnrichedJob {
        about: raw.about().map(|html| clean_about(&html)),
        apply_by: times.as_deref().and_then(clean_apply_by),
        apply_type: raw.apply_type().map(|text| clean_apply_type(&text)),
        company: raw.company().map(|text| text.trim().to_string()),
        documents: clean_documents(&raw.documents()),
        employment_type: raw
            .employment_type()
            .as_deref()
            .and_then(clean_employment_type),
        industry: raw.industry().map(|text| lower_and_strip(&text)),
        job_type: raw.job_type().map(|text| clean_job_type(&text)),
        location: location.as_deref().and_then(clean_location),
        location_type: location
            .as_deref()
            .map(clean_location_type)
            .unwrap_or_default(),
        position: raw.position().map(|text| lower_and_strip(&text)),
        posted_at: times
            .as_deref()
            .and_then(|text| clean_posted_at(text, scraped_at)),
        url: url.to_string(),
        wage: raw.wage().as_deref().and_then(clean_wage),
    }
}
