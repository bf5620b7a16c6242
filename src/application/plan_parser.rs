//! Extraction of the day's schedule from planning text.
//!
//! The text is a multi-section document in which section 2 (headed "Plan",
//! "Plano", "Schedule", "Cronograma", ...) lists one time block per line:
//!
//! ```text
//! 2) Plano
//! - 08:00–09:30 — [TRABALHO FOCADO] Escrever relatório (90 min; P1)
//! 3) Próximo passo
//! ```
//!
//! Parsing never fails: text without a plan section or without matching lines
//! yields an empty schedule.

use crate::domain::schedule::{parse_hhmm, Priority, ScheduledItem};
use once_cell::sync::Lazy;
use regex::Regex;

static PLAN_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t>#*_]*2\s*[).:]\s*[*_]*\s*(?:plan|plano|planning|planejamento|schedule|cronograma|agenda)\b[^\n]*$",
    )
    .expect("valid plan heading regex")
});
static NEXT_SECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t>#*_]*3\s*[).:](?:[^\d\n]|$)").expect("valid section heading regex")
});
static SCHEDULE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[-*+•]|\d+[.)])\s*(\d{1,2}:\d{2})\s*[-–—]\s*(\d{1,2}:\d{2})\s*(?:[-–—]\s*)?(?:\[([^\]]*)\]\s*)?(.*)$",
    )
    .expect("valid schedule line regex")
});
static PRIORITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\([^()]*?\b(P[123])\b[^()]*\)").expect("valid priority regex")
});
static TRAILING_GROUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^()]*\)\s*$").expect("valid trailing group regex"));
static TIME_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}:\d{2})\s*[-–—]\s*(\d{1,2}:\d{2})").expect("valid time range regex")
});
static TIME_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d{1,2}:\d{2}\s*[-–—]\s*\d{1,2}:\d{2}\s*[-–—]?\s*")
        .expect("valid time prefix regex")
});

const DASHES: [char; 3] = ['-', '–', '—'];

/// Returns the body of the last plan section, or `None` when the text has no
/// plan heading.
pub fn plan_section(text: &str) -> Option<&str> {
    let heading = PLAN_HEADING_RE.find_iter(text).last()?;
    let rest = &text[heading.end()..];
    let end = NEXT_SECTION_RE
        .find_iter(rest)
        .map(|section| section.start())
        .find(|&start| !is_schedule_line(line_at(rest, start)))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn line_at(text: &str, start: usize) -> &str {
    let tail = &text[start..];
    tail.split('\n').next().unwrap_or(tail)
}

// A numbered plan item such as `3) 10:00-11:00 - Review` is not a heading.
fn is_schedule_line(line: &str) -> bool {
    SCHEDULE_LINE_RE.is_match(line.trim())
}

/// Returns the text from the last plan heading onward.
pub fn latest_plan_excerpt(text: &str) -> Option<&str> {
    PLAN_HEADING_RE
        .find_iter(text)
        .last()
        .map(|heading| &text[heading.start()..])
}

pub fn parse_plan(text: &str) -> Vec<ScheduledItem> {
    let Some(section) = plan_section(text) else {
        return Vec::new();
    };
    section.lines().filter_map(parse_schedule_line).collect()
}

pub fn parse_schedule_line(line: &str) -> Option<ScheduledItem> {
    let captures = SCHEDULE_LINE_RE.captures(line.trim())?;
    let start = parse_hhmm(&captures[1])?;
    let end = parse_hhmm(&captures[2])?;
    let category = captures
        .get(3)
        .map(|value| value.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);
    let remainder = captures.get(4).map(|value| value.as_str()).unwrap_or_default();

    let priority = PRIORITY_RE
        .captures(remainder)
        .and_then(|found| found[1].parse::<Priority>().ok())
        .unwrap_or_default();

    let mut label = clean_label(remainder);
    if label.is_empty() {
        label = category.clone().unwrap_or_default();
    }

    Some(ScheduledItem {
        start,
        end,
        label,
        priority,
        category,
    })
}

fn clean_label(remainder: &str) -> String {
    let without_group = TRAILING_GROUP_RE.replace(remainder, "");
    without_group
        .trim()
        .trim_start_matches(|candidate: char| DASHES.contains(&candidate) || candidate.is_whitespace())
        .trim()
        .to_string()
}

/// Finds the first `HH:MM–HH:MM` range anywhere in `text`.
pub fn extract_time_range(text: &str) -> Option<(chrono::NaiveTime, chrono::NaiveTime)> {
    let captures = TIME_RANGE_RE.captures(text)?;
    Some((parse_hhmm(&captures[1])?, parse_hhmm(&captures[2])?))
}

/// Removes a leading `HH:MM–HH:MM —` prefix.
pub fn strip_time_prefix(text: &str) -> String {
    TIME_PREFIX_RE.replace(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn time(value: &str) -> chrono::NaiveTime {
        parse_hhmm(value).expect("valid HH:MM")
    }

    #[test]
    fn parses_the_documented_line_format() {
        let items = parse_plan(
            "2) Plano\n- 08:00–09:30 — [TRABALHO FOCADO] Escrever relatório (90 min; P1)\n3) ...",
        );
        assert_eq!(
            items,
            vec![ScheduledItem {
                start: time("08:00"),
                end: time("09:30"),
                label: "Escrever relatório".to_string(),
                priority: Priority::P1,
                category: Some("TRABALHO FOCADO".to_string()),
            }]
        );
    }

    #[test]
    fn every_dash_glyph_parses_identically() {
        let variants = ["-", "–", "—"].map(|dash| {
            parse_plan(&format!(
                "2) Plano\n- 08:00{dash}09:30 {dash} [TRABALHO FOCADO] Escrever relatório (90 min; P1)\n"
            ))
        });
        assert_eq!(variants[0].len(), 1);
        assert_eq!(variants[0], variants[1]);
        assert_eq!(variants[1], variants[2]);
    }

    #[test]
    fn last_plan_section_wins() {
        let text = "\
1) Intento
Focar.

2) Plano
- 08:00–09:00 — [BUFFER] Versão antiga (60 min; P3)

3) Próximo Passo
Algo.

=== revisão ===
2) Plano
- 10:00–11:00 — [TRABALHO FOCADO] Versão nova (60 min; P1)
- 11:00–11:15 — [POWER UP] Alongar (15 min; P2)

3) Próximo Passo
Outro.
";
        let items = parse_plan(text);
        let labels = items.iter().map(|item| item.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["Versão nova", "Alongar"]);
    }

    #[test]
    fn section_runs_to_end_of_text_without_section_three() {
        let items = parse_plan("## 2) Schedule\n- 09:00-10:00 - Standup\n- 10:00-10:30 - Email (P3)");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].priority, Priority::P3);
        assert_eq!(items[1].label, "Email");
    }

    #[test]
    fn numbered_items_past_the_third_are_kept() {
        let items = parse_plan(
            "2) Plan\n1) 08:00-09:00 - A\n2) 09:00-10:00 - B\n3) 10:00-11:00 - C\n4) 11:00-12:00 - D\n3. 12:00-12:30 - E\n",
        );
        let labels = items.iter().map(|item| item.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn numbered_plan_still_stops_at_section_three() {
        let items = parse_plan(
            "2) Plan\n1) 08:00-09:00 - A\n2) 09:00-10:00 - B\n3) 10:00-11:00 - C\n3) Next step\n- 13:00-14:00 - Not a plan line\n",
        );
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].label, "C");
    }

    #[test]
    fn section_three_heading_accepts_heading_punctuation() {
        for marker in ["3)", "3.", "3:"] {
            let text = format!(
                "## 2. Plan\n- 08:00-09:00 - A\n## {marker} Next step\n- 10:00-11:00 - Not a plan line\n"
            );
            let labels = parse_plan(&text)
                .into_iter()
                .map(|item| item.label)
                .collect::<Vec<_>>();
            assert_eq!(labels, vec!["A".to_string()], "marker {marker}");
        }
    }

    #[test]
    fn overnight_line_is_passed_through() {
        let items = parse_plan("2) Plan\n- 23:50–00:10 — Wind down (20 min; P2)\n");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].start, time("23:50"));
        assert_eq!(items[0].end, time("00:10"));
    }

    #[test]
    fn non_matching_lines_are_skipped() {
        let text = "2) Plano\nIntro prose.\n- sem horário — tarefa\n08:00–09:00 — sem marcador\n- 25:00–26:00 — hora inválida\n- 07:00–07:30 — Café\n3) fim";
        let items = parse_plan(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "Café");
        assert_eq!(items[0].priority, Priority::P2);
    }

    #[test]
    fn missing_plan_section_yields_nothing() {
        assert!(parse_plan("1) Intento\n- 08:00–09:00 — Algo\n3) fim").is_empty());
        assert!(parse_plan("").is_empty());
    }

    #[test]
    fn only_trailing_group_is_stripped() {
        let item = parse_schedule_line("- 14:00–14:30 — Call (Ana) (30 min; P1)").expect("line");
        assert_eq!(item.label, "Call (Ana)");
        assert_eq!(item.priority, Priority::P1);
        assert_eq!(item.category, None);
    }

    #[test]
    fn category_fills_an_empty_label() {
        let item = parse_schedule_line("- 09:45–10:00 — [BUFFER] (15 min; P3)").expect("line");
        assert_eq!(item.label, "BUFFER");
        assert_eq!(item.priority, Priority::P3);
    }

    #[test]
    fn leftover_dashes_are_trimmed_from_label() {
        let item = parse_schedule_line("* 9:00 – 9:30 —— Inbox zero").expect("line");
        assert_eq!(item.start, time("09:00"));
        assert_eq!(item.label, "Inbox zero");
    }

    #[test]
    fn excerpt_starts_at_latest_heading() {
        let text = "intro\n2) Cronograma\n- 08:00–09:00 — A\n";
        assert_eq!(
            latest_plan_excerpt(text),
            Some("2) Cronograma\n- 08:00–09:00 — A\n")
        );
        assert_eq!(latest_plan_excerpt("no plan here"), None);
    }

    #[test]
    fn time_range_helpers_handle_task_titles() {
        assert_eq!(
            extract_time_range("06:00–06:20 — Meditar"),
            Some((time("06:00"), time("06:20")))
        );
        assert_eq!(extract_time_range("Meditar"), None);
        assert_eq!(strip_time_prefix("06:00-06:20 - Meditar"), "Meditar");
        assert_eq!(strip_time_prefix("Meditar"), "Meditar");
    }

    proptest! {
        #[test]
        fn parser_never_panics_on_arbitrary_text(text in ".{0,400}") {
            let _ = parse_plan(&text);
        }

        #[test]
        fn dash_glyphs_are_interchangeable(
            range_dash in prop_oneof![Just('-'), Just('–'), Just('—')],
            label_dash in prop_oneof![Just('-'), Just('–'), Just('—')],
            hour in 0u32..24,
            minute in 0u32..60,
        ) {
            let baseline = parse_plan(&format!(
                "2) Plan\n- {hour:02}:{minute:02}-{hour:02}:{minute:02} - [X] Item (P1)\n"
            ));
            let varied = parse_plan(&format!(
                "2) Plan\n- {hour:02}:{minute:02}{range_dash}{hour:02}:{minute:02} {label_dash} [X] Item (P1)\n"
            ));
            prop_assert_eq!(baseline.len(), 1);
            prop_assert_eq!(baseline, varied);
        }
    }
}
