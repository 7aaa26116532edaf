//! Free-text validity parsing: "Valid until December 31, 2026",
//! "1st Jan - 31st Mar 2026", "from 5 Sept to 20 Oct".

use chrono::{Datelike, NaiveDate};

/// Parsed validity range. A single date is read as the end of the offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityWindow {
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl ValidityWindow {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.until.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
struct DateMention {
    day: u32,
    month: u32,
    year: Option<i32>,
}

fn month_number(token: &str) -> Option<u32> {
    let month = match token {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// A day-of-month token, ordinal suffixes allowed ("1st", "22nd", "31").
fn day_number(token: &str) -> Option<u32> {
    let digits = ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| token.strip_suffix(suffix))
        .unwrap_or(token);
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok().filter(|d| (1..=31).contains(d))
}

fn year_number(token: &str) -> Option<i32> {
    if token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Every (day, month, optional year) mention in `text`, in reading order.
/// A token already used as one date's day is never reused for the next.
fn find_mentions(text: &str) -> Vec<DateMention> {
    let tokens = tokenize(text);
    let mut consumed = vec![false; tokens.len()];
    let mut mentions = Vec::new();

    for i in 0..tokens.len() {
        if consumed[i] {
            continue;
        }
        let Some(month) = month_number(&tokens[i]) else {
            continue;
        };

        let before = i
            .checked_sub(1)
            .filter(|&j| !consumed[j])
            .and_then(|j| day_number(&tokens[j]).map(|d| (j, d)));
        let after = || {
            tokens
                .get(i + 1)
                .and_then(|t| day_number(t))
                .map(|d| (i + 1, d))
        };
        let Some((day_index, day)) = before.or_else(after) else {
            continue;
        };

        consumed[i] = true;
        consumed[day_index] = true;

        let year_index = i.max(day_index) + 1;
        let year = tokens.get(year_index).and_then(|t| year_number(t));
        if year.is_some() {
            consumed[year_index] = true;
        }

        mentions.push(DateMention { day, month, year });
    }

    mentions
}

/// Resolves missing years: a yearless mention takes the year of the next
/// mention that states one, then of the closest earlier one, else
/// `fallback_year`.
fn resolve(mentions: &[DateMention], fallback_year: i32) -> Vec<(Option<NaiveDate>, bool)> {
    mentions
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let (year, inherited) = match m.year {
                Some(y) => (y, false),
                None => (
                    mentions[i + 1..]
                        .iter()
                        .find_map(|later| later.year)
                        .or_else(|| mentions[..i].iter().rev().find_map(|earlier| earlier.year))
                        .unwrap_or(fallback_year),
                    true,
                ),
            };
            (NaiveDate::from_ymd_opt(year, m.month, m.day), inherited)
        })
        .collect()
}

/// The last date mentioned in `text`, or `None` when no valid date is found.
/// Year resolution follows [`parse_validity_window`].
#[must_use]
pub fn parse_validity_date(text: &str, fallback_year: i32) -> Option<NaiveDate> {
    parse_validity_window(text, fallback_year).until
}

/// Parses a validity expression into a window.
///
/// With two or more dates the first is `from` and the last is `until`. A
/// window that would run backwards is repaired on the yearless end: a
/// yearless `from` moves back one year ("Dec 15 - Jan 15 2027"), else a
/// yearless `until` moves forward one ("1 Nov 2026 - 31 Mar").
#[must_use]
pub fn parse_validity_window(text: &str, fallback_year: i32) -> ValidityWindow {
    let mentions = find_mentions(text);
    let resolved = resolve(&mentions, fallback_year);

    match resolved.as_slice() {
        [] => ValidityWindow::default(),
        [(single, _)] => ValidityWindow {
            from: None,
            until: *single,
        },
        [(first, first_inherited), .., (last, last_inherited)] => {
            let (mut from, mut until) = (*first, *last);
            if let (Some(f), Some(u)) = (from, until) {
                if f > u {
                    if *first_inherited {
                        from = f.with_year(f.year() - 1);
                    } else if *last_inherited {
                        until = u.with_year(u.year() + 1);
                    }
                }
            }
            ValidityWindow { from, until }
        }
    }
}

/// True when `text` holds a day and month pair ("5 Oct", "June 30th").
/// A month word on its own, like the verb "may", does not count.
#[must_use]
pub fn mentions_date(text: &str) -> bool {
    !find_mentions(text).is_empty()
}
