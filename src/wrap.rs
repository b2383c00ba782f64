use crate::font::FontMetrics;
use crate::types::Pt;

/// Result of wrapping one field's text: at most `max_lines` lines, each
/// measuring within the field's max width except a force-accepted single
/// word or a marker-truncated final line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedText {
    pub lines: Vec<String>,
    pub truncated: bool,
}

const TRUNCATION_MARKER: &str = "...";

/// Greedy width-bounded word wrapping with a hard line-count cap.
///
/// Words are accumulated while the candidate line measures within
/// `max_width`. A single word wider than the box is force-accepted on its
/// own line, never split. Once `max_lines - 1` lines are complete, every
/// remaining word joins the final line candidate; if that candidate still
/// overflows, its last 3 characters are chopped and a 3-dot marker appended.
/// The chopped line is not re-measured; truncation, not failure, is the
/// overflow policy.
pub fn wrap_text(
    font: &FontMetrics,
    text: &str,
    font_size: Pt,
    max_width: Pt,
    max_lines: usize,
) -> WrappedText {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut capped = false;

    if max_lines == 0 {
        return WrappedText {
            lines,
            truncated: false,
        };
    }

    for (index, word) in words.iter().enumerate() {
        let candidate = if current.is_empty() {
            (*word).to_string()
        } else {
            format!("{current} {word}")
        };
        if current.is_empty() || font.text_width(&candidate, font_size) <= max_width {
            current = candidate;
            continue;
        }

        lines.push(std::mem::take(&mut current));
        current = (*word).to_string();

        if lines.len() >= max_lines - 1 {
            // Box is full after this line; the rest of the words become the
            // final line candidate and face the truncation check below.
            capped = true;
            for rest in &words[index + 1..] {
                current.push(' ');
                current.push_str(rest);
            }
            break;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        return WrappedText {
            lines,
            truncated: false,
        };
    }

    // The marker only applies when the line cap actually cut material off.
    // A lone force-accepted word wider than the box stays uncut.
    let mut truncated = false;
    if capped && lines.len() == max_lines {
        if let Some(last) = lines.last_mut() {
            if font.text_width(last, font_size) > max_width {
                *last = chop_with_marker(last);
                truncated = true;
            }
        }
    }

    WrappedText { lines, truncated }
}

fn chop_with_marker(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let keep = chars.len().saturating_sub(TRUNCATION_MARKER.len());
    let mut out: String = chars[..keep].iter().collect();
    out.truncate(out.trim_end().len());
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helvetica() -> FontMetrics {
        FontMetrics::helvetica()
    }

    #[test]
    fn short_text_fits_on_one_line() {
        let out = wrap_text(&helvetica(), "Bonjour", Pt::from_i32(9), Pt::from_i32(480), 1);
        assert_eq!(out.lines, vec!["Bonjour".to_string()]);
        assert!(!out.truncated);
    }

    #[test]
    fn empty_text_produces_no_lines() {
        let out = wrap_text(&helvetica(), "", Pt::from_i32(9), Pt::from_i32(480), 3);
        assert!(out.lines.is_empty());
        assert!(!out.truncated);

        let out = wrap_text(&helvetica(), "   ", Pt::from_i32(9), Pt::from_i32(480), 3);
        assert!(out.lines.is_empty());
    }

    #[test]
    fn every_line_measures_within_the_box() {
        let font = helvetica();
        let text = "la formation professionnelle continue des participants de la société";
        let max_width = Pt::from_i32(120);
        let out = wrap_text(&font, text, Pt::from_i32(9), max_width, 10);
        assert!(out.lines.len() > 1);
        for line in &out.lines {
            assert!(font.text_width(line, Pt::from_i32(9)) <= max_width, "{line}");
        }
    }

    #[test]
    fn overflow_past_the_line_cap_is_truncated_with_marker() {
        // "mot mot ..." x20, box tuned so roughly five words fit per line.
        let font = helvetica();
        let text = vec!["mot"; 20].join(" ");
        let out = wrap_text(&font, &text, Pt::from_i32(9), Pt::from_i32(88), 2);
        assert_eq!(out.lines.len(), 2);
        assert!(out.lines[1].ends_with("..."));
        assert!(out.truncated);
    }

    #[test]
    fn single_line_overflow_is_dropped_silently() {
        let font = helvetica();
        let text = vec!["mot"; 20].join(" ");
        let out = wrap_text(&font, &text, Pt::from_i32(9), Pt::from_i32(88), 1);
        assert_eq!(out.lines.len(), 1);
        assert!(!out.lines[0].ends_with("..."));
        assert!(!out.truncated);
        assert!(font.text_width(&out.lines[0], Pt::from_i32(9)) <= Pt::from_i32(88));
    }

    #[test]
    fn a_word_wider_than_the_box_is_never_split() {
        let font = helvetica();
        let word = "Anticonstitutionnellement";
        let out = wrap_text(&font, word, Pt::from_i32(9), Pt::from_i32(20), 3);
        assert_eq!(out.lines, vec![word.to_string()]);
        assert!(font.text_width(word, Pt::from_i32(9)) > Pt::from_i32(20));
    }

    #[test]
    fn a_lone_wide_word_on_a_one_line_field_stays_uncut() {
        let font = helvetica();
        let word = "Anticonstitutionnellement";
        let out = wrap_text(&font, word, Pt::from_i32(9), Pt::from_i32(20), 1);
        assert_eq!(out.lines, vec![word.to_string()]);
        assert!(!out.truncated);
    }

    #[test]
    fn wide_word_forces_a_break_for_the_following_words() {
        let font = helvetica();
        let out = wrap_text(
            &font,
            "Anticonstitutionnellement oui",
            Pt::from_i32(9),
            Pt::from_i32(20),
            5,
        );
        assert_eq!(
            out.lines,
            vec!["Anticonstitutionnellement".to_string(), "oui".to_string()]
        );
    }

    #[test]
    fn wrapping_is_deterministic() {
        let font = helvetica();
        let text = "Et : Exemple SARL, dont le siège social est situé à Paris";
        let a = wrap_text(&font, text, Pt::from_i32(9), Pt::from_i32(140), 2);
        let b = wrap_text(&font, text, Pt::from_i32(9), Pt::from_i32(140), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn marker_replaces_the_last_three_characters() {
        let font = helvetica();
        // One completed line, then a remainder wide enough to truncate.
        let out = wrap_text(
            &font,
            "aaaa bbbb cccc dddd eeee ffff",
            Pt::from_i32(9),
            Pt::from_i32(30),
            2,
        );
        assert_eq!(out.lines.len(), 2);
        let last = &out.lines[1];
        assert!(last.ends_with("..."));
        // Chopped before the marker, so the line is shorter than the raw remainder.
        assert!(last.len() < "bbbb cccc dddd eeee ffff".len() + 3);
    }
}
