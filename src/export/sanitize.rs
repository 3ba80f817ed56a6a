//! Markdown → plain-text sanitization for fixed-font PDF export.
//!
//! The PDF uses builtin fonts that only cover printable ASCII, so generated
//! markdown is rewritten until every character is in the safe set (printable
//! ASCII plus `\n`). Pictographs become bracketed tags, typography becomes its
//! ASCII spelling, box drawing becomes `|` / `=`, and markdown decoration is
//! stripped while list structure survives.
//!
//! One pass is a fixed sequence of rewrites. `sanitize` repeats the pass until
//! the text stops changing, so `sanitize(sanitize(x)) == sanitize(x)`.

use std::sync::LazyLock;

use regex::Regex;

/// Upper bound on rewrite passes before giving up.
const MAX_PASSES: usize = 8;

/// A line is a separator when at least this share of its visible characters
/// are separator glyphs.
const SEPARATOR_SHARE: (usize, usize) = (4, 5);

#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("Character {character:?} on line {line} is outside the printable ASCII set")]
    UnsafeCharacter { character: char, line: usize },

    #[error("Sanitization did not converge after {0} passes")]
    Unstable(usize),
}

/// Printable ASCII plus newline.
pub fn is_safe_char(c: char) -> bool {
    c == '\n' || (' '..='~').contains(&c)
}

/// Sanitize `text` to its fixed point and verify the result is in the safe set.
pub fn sanitize(text: &str) -> Result<String, SanitizeError> {
    let mut current = sanitize_pass(text);
    for _ in 1..MAX_PASSES {
        let next = sanitize_pass(&current);
        if next == current {
            check_safe(&current)?;
            return Ok(current);
        }
        current = next;
    }
    Err(SanitizeError::Unstable(MAX_PASSES))
}

fn check_safe(text: &str) -> Result<(), SanitizeError> {
    for (index, line) in text.split('\n').enumerate() {
        if let Some(character) = line.chars().find(|c| !is_safe_char(*c)) {
            return Err(SanitizeError::UnsafeCharacter {
                character,
                line: index + 1,
            });
        }
    }
    Ok(())
}

fn sanitize_pass(text: &str) -> String {
    let text = replace_glyphs(text);
    let text = flatten_fences(&text);
    let text = strip_headers(&text);
    let text = normalize_list_markers(&text);
    let text = strip_emphasis(&text);
    let text = drop_separator_lines(&text);
    tidy_whitespace(&text)
}

// ═══════════════════════════════════════════════════════════
// Character substitution
// ═══════════════════════════════════════════════════════════

fn replace_glyphs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match substitute(c) {
            Substitute::Keep => out.push(c),
            Substitute::Drop => {}
            Substitute::With(s) => out.push_str(s),
        }
    }
    out
}

enum Substitute {
    Keep,
    Drop,
    With(&'static str),
}

fn substitute(c: char) -> Substitute {
    if is_safe_char(c) {
        return Substitute::Keep;
    }
    if let Some(tag) = glyph_tag(c) {
        return Substitute::With(tag);
    }
    if let Some(folded) = fold_latin(c) {
        return Substitute::With(folded);
    }
    match c {
        '\t' => Substitute::With("    "),
        // Variation selectors, joiners, keycap and zero-width marks.
        '\u{FE00}'..='\u{FE0F}' | '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{20E3}' | '\u{FEFF}' => {
            Substitute::Drop
        }
        '\u{E0020}'..='\u{E007F}' | '\u{1F3FB}'..='\u{1F3FF}' => Substitute::Drop,
        c if c.is_control() => Substitute::Drop,
        c if is_pictographic(c) => Substitute::With("[EMOJI]"),
        _ => Substitute::With("?"),
    }
}

/// Named pictographs, arrows, typography and drawing glyphs.
fn glyph_tag(c: char) -> Option<&'static str> {
    let tag = match c {
        '🔴' | '🛑' | '❗' | '🚨' => "[ALERT]",
        '🔵' | '🔷' | 'ℹ' => "[INFO]",
        '🟢' | '✅' | '✓' | '✔' => "[OK]",
        '🟡' | '⚠' | '⚡' => "[WARNING]",
        '🔧' | '🛠' | '⚙' => "[FIX]",
        '⏱' | '⏰' | '🕐' | '⌛' | '⏳' => "[TIME]",
        '📊' | '📈' | '📉' => "[METRICS]",
        '🚀' | '▶' => "[START]",
        '❌' | '✗' | '✘' | '❎' => "[X]",
        '☑' | '☒' => "[CHECK]",
        '🔍' | '🔎' => "[SEARCH]",
        '💡' => "[IDEA]",
        '📝' | '📋' => "[NOTE]",

        '→' | '➜' | '➔' | '➡' | '⇒' | '⟶' | '⟹' => "->",
        '←' | '⬅' | '⇐' | '⟵' => "<-",
        '↔' | '⇔' => "<->",
        '↑' | '⬆' => "^",
        '↓' | '⬇' => "v",

        '‘' | '’' | '‚' | '‛' | 'ʻ' | 'ʼ' | '′' => "'",
        '“' | '”' | '„' | '‟' | 'ˮ' | '″' | '«' | '»' => "\"",
        '–' | '—' | '―' | '‐' | '‑' | '−' => "-",
        '…' => "...",
        '•' | '‣' | '⁃' | '·' => "-",
        '×' => "x",
        '÷' => "/",
        '±' => "+/-",
        '≥' => ">=",
        '≤' => "<=",
        '≠' => "!=",
        '≈' | '∼' => "~",
        '°' => " deg",
        '©' => "(c)",
        '®' => "(R)",
        '™' => "(TM)",
        '€' => "EUR",
        '£' => "GBP",
        '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => " ",

        // Double-line box drawing.
        '\u{2550}'..='\u{256C}' => "=",
        // Remaining box drawing and block elements.
        '\u{2500}'..='\u{257F}' | '\u{2580}'..='\u{259F}' => "|",
        // Geometric squares and small bullets.
        '\u{25A0}'..='\u{25AF}' | '\u{25FB}'..='\u{25FE}' | '▸' | '►' | '▹' => "-",
        // Circles and diamonds.
        '◆' | '◇' | '◈' | '◉' | '◊' | '○' | '◌' | '◍' | '◎' | '●' | '◦' | '⚪' | '⚫' => "o",
        _ => return None,
    };
    Some(tag)
}

fn is_pictographic(c: char) -> bool {
    matches!(
        c,
        '\u{1F000}'..='\u{1FAFF}'
            | '\u{2600}'..='\u{26FF}'
            | '\u{2700}'..='\u{27BF}'
            | '\u{2B00}'..='\u{2BFF}'
            | '\u{2300}'..='\u{23FF}'
            | '\u{25B0}'..='\u{25FF}'
    )
}

/// Fold accented Latin letters to their ASCII base.
fn fold_latin(c: char) -> Option<&'static str> {
    let folded = match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'Æ' => "AE",
        'æ' => "ae",
        'Ç' | 'Ć' | 'Č' | 'Ĉ' | 'Ċ' => "C",
        'ç' | 'ć' | 'č' | 'ĉ' | 'ċ' => "c",
        'Ð' | 'Ď' | 'Đ' => "D",
        'ð' | 'ď' | 'đ' => "d",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ė' | 'Ę' | 'Ě' => "E",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'Ğ' | 'Ĝ' | 'Ġ' | 'Ģ' => "G",
        'ğ' | 'ĝ' | 'ġ' | 'ģ' => "g",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' | 'Į' | 'İ' => "I",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => "i",
        'Ł' | 'Ľ' | 'Ĺ' => "L",
        'ł' | 'ľ' | 'ĺ' => "l",
        'Ñ' | 'Ń' | 'Ň' => "N",
        'ñ' | 'ń' | 'ň' => "n",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ő' => "O",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'Œ' => "OE",
        'œ' => "oe",
        'Ř' | 'Ŕ' => "R",
        'ř' | 'ŕ' => "r",
        'Ś' | 'Š' | 'Ş' => "S",
        'ś' | 'š' | 'ş' => "s",
        'ß' => "ss",
        'Ť' | 'Ţ' => "T",
        'ť' | 'ţ' => "t",
        'Þ' => "Th",
        'þ' => "th",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' | 'Ű' | 'Ų' => "U",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' | 'ų' => "u",
        'Ý' | 'Ÿ' => "Y",
        'ý' | 'ÿ' => "y",
        'Ź' | 'Ż' | 'Ž' => "Z",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

// ═══════════════════════════════════════════════════════════
// Markdown structure
// ═══════════════════════════════════════════════════════════

static FENCE_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[=\-_]+$").expect("valid regex"));

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(?:#{1,6}(?:[ \t]+|$))+").expect("valid regex"));

static CHECKBOX_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+\[ \][ \t]*").expect("valid regex"));

static CHECKBOX_DONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+\[[xX]\][ \t]*").expect("valid regex"));

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+").expect("valid regex"));

static BOLD_STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n]+)\*\*").expect("valid regex"));

static BOLD_UNDERSCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__([^_\n]+)__").expect("valid regex"));

static ITALIC_STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").expect("valid regex"));

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Remove fence lines; clean the lines between them. An unclosed fence runs
/// to the end of the text.
fn flatten_fences(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_fence = false;

    for line in text.split('\n') {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            // Keep the block on its own lines.
            if out.last().is_some_and(|l| !l.trim().is_empty()) {
                out.push(String::new());
            }
            continue;
        }
        if !in_fence {
            out.push(line.to_string());
            continue;
        }
        if let Some(cleaned) = clean_fenced_line(line) {
            out.push(cleaned);
        }
    }
    out.join("\n")
}

fn clean_fenced_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || FENCE_SEPARATOR_RE.is_match(trimmed) {
        return None;
    }
    if trimmed.chars().filter(|c| !c.is_whitespace()).count() < 3 {
        return None;
    }
    let inner = trimmed.trim_matches(|c: char| c == '|' || c.is_whitespace());
    (!inner.is_empty()).then(|| inner.to_string())
}

fn strip_headers(text: &str) -> String {
    HEADER_RE.replace_all(text, "").into_owned()
}

fn normalize_list_markers(text: &str) -> String {
    let text = CHECKBOX_OPEN_RE.replace_all(text, "[ ] ");
    let text = CHECKBOX_DONE_RE.replace_all(&text, "[x] ");
    BULLET_RE.replace_all(&text, "  - ").into_owned()
}

fn strip_emphasis(text: &str) -> String {
    let text = BOLD_STAR_RE.replace_all(text, "$1");
    let text = BOLD_UNDERSCORE_RE.replace_all(&text, "$1");
    ITALIC_STAR_RE.replace_all(&text, "$1").into_owned()
}

fn is_separator(c: char) -> bool {
    matches!(c, '|' | '=' | '-' | '_' | '+')
}

fn drop_separator_lines(text: &str) -> String {
    let (num, den) = SEPARATOR_SHARE;
    text.split('\n')
        .filter(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return true;
            }
            let total = trimmed.chars().count();
            let separators = trimmed.chars().filter(|c| is_separator(*c)).count();
            separators * den < total * num
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn tidy_whitespace(text: &str) -> String {
    let trimmed_lines = text
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN_RE
        .replace_all(&trimmed_lines, "\n\n")
        .trim_start_matches('\n')
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSTMORTEM: &str = "# 🚨 Incident Post-Mortem\n\n\
        ## Summary\n\
        **Severity:** SEV-1 ⚠️ — checkout *down* for 47 minutes…\n\n\n\n\
        ### Timeline\n\
        ```text\n\
        ╔══════════════════════════╗\n\
        ║ 14:23 │ 🔴 Alert fired    ║\n\
        ║ 14:31 │ 🔧 Rollback → v2.3 ║\n\
        ╚══════════════════════════╝\n\
        ```\n\n\
        - [ ] Add DB pool alerting @sarah\n\
        - [x] Roll back release\n\
        * Root cause: “connection pool exhaustion”\n\
        | Metric | Value |\n\
        |--------|-------|\n\
        | Error rate | 34% |\n\
        ---\n\
        Café owner Zoë confirmed ✅ recovery 🎉";

    fn clean(text: &str) -> String {
        sanitize(text).unwrap()
    }

    // ── Properties ──────────────────────────────────────

    #[test]
    fn idempotent_on_realistic_report() {
        let once = clean(POSTMORTEM);
        assert_eq!(clean(&once), once);
    }

    #[test]
    fn idempotent_on_awkward_inputs() {
        let samples = [
            "",
            "   \n\n\n  ",
            "* * *",
            "*- x*",
            "**unclosed bold",
            "```\nunclosed fence\n| a | b |",
            "# # # nested headers",
            "\t- tabbed bullet\r\n\t\t+ nested",
            "- [ ]\n- [X] done",
            "__init__ and __main__ stay readable",
            "漢字 and 🦀 and é",
        ];
        for sample in samples {
            let once = clean(sample);
            assert_eq!(clean(&once), once, "sample {sample:?}");
        }
    }

    #[test]
    fn output_stays_in_safe_set() {
        let out = clean(POSTMORTEM);
        assert!(out.chars().all(is_safe_char), "{out}");
        let out = clean("混合 ✨ text \u{1F9EA} \u{0007} \u{00A0}end\u{FEFF}");
        assert!(out.chars().all(is_safe_char), "{out}");
    }

    // ── Scenario ────────────────────────────────────────

    #[test]
    fn warning_glyph_and_fenced_box_drawing() {
        let out = clean("⚠️ Database failover\n```\n╔════════╗\n║ 14:23 │ Alert fired ║\n╚════════╝\n```");
        assert!(out.starts_with("[WARNING] Database failover"), "{out}");
        assert!(out.contains("14:23 | Alert fired"), "{out}");
        assert!(!out.contains("```"));
        assert!(!out.contains('╔'));
        assert!(!out.contains("====="), "separator rows dropped: {out}");
    }

    // ── Glyphs ──────────────────────────────────────────

    #[test]
    fn pictographs_become_tags() {
        assert_eq!(clean("🔴 down"), "[ALERT] down");
        assert_eq!(clean("🟢 up"), "[OK] up");
        assert_eq!(clean("⏱️ 4m"), "[TIME] 4m");
        assert_eq!(clean("📈 p99"), "[METRICS] p99");
        assert_eq!(clean("🚀 deploy"), "[START] deploy");
        assert_eq!(clean("❌ failed"), "[X] failed");
        assert_eq!(clean("☑ verified"), "[CHECK] verified");
        assert_eq!(clean("ℹ️ note"), "[INFO] note");
        assert_eq!(clean("🎉 party"), "[EMOJI] party");
    }

    #[test]
    fn arrows_and_typography() {
        assert_eq!(clean("a → b ← c ↑ ↓"), "a -> b <- c ^ v");
        assert_eq!(clean("“quoted” ‘single’"), "\"quoted\" 'single'");
        assert_eq!(clean("a – b — c…"), "a - b - c...");
    }

    #[test]
    fn drawing_glyphs() {
        assert_eq!(clean("a │ b"), "a | b");
        assert_eq!(clean("a ║ b"), "a = b");
        assert_eq!(clean("note ■ item ● dot"), "note - item o dot");
        assert_eq!(clean("■ first"), "  - first");
    }

    #[test]
    fn accented_letters_folded() {
        assert_eq!(clean("Café naïve Zoë Łódź"), "Cafe naive Zoe Lodz");
    }

    #[test]
    fn unknown_characters_become_question_marks() {
        assert_eq!(clean("漢字"), "??");
    }

    #[test]
    fn percent_survives() {
        assert_eq!(clean("error rate 34%"), "error rate 34%");
    }

    #[test]
    fn tabs_and_carriage_returns() {
        assert_eq!(clean("a\tb\r\nc"), "a    b\nc");
    }

    // ── Markdown ────────────────────────────────────────

    #[test]
    fn headers_and_emphasis_stripped() {
        assert_eq!(
            clean("## Root Cause\n**Pool** was *tiny* and __shared__"),
            "Root Cause\nPool was tiny and shared"
        );
    }

    #[test]
    fn list_markers_normalized() {
        assert_eq!(
            clean("intro\n- one\n* two\n+ three\n- [ ] open\n- [x] done"),
            "intro\n  - one\n  - two\n  - three\n[ ] open\n[x] done"
        );
    }

    #[test]
    fn bullet_with_italic_keeps_marker() {
        assert_eq!(clean("intro\n* item with *stress*"), "intro\n  - item with stress");
    }

    #[test]
    fn blank_line_runs_collapse() {
        assert_eq!(clean("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn separator_lines_dropped() {
        assert_eq!(clean("a\n|---|---|\n===\nb | c"), "a\nb | c");
    }

    #[test]
    fn fenced_block_lines_cleaned() {
        assert_eq!(
            clean("before\n```bash\n| kubectl rollout undo |\n--\nok\n\n```\nafter"),
            "before\n\nkubectl rollout undo\n\nafter"
        );
    }

    #[test]
    fn realistic_report_shape() {
        let out = clean(POSTMORTEM);
        assert!(out.starts_with("[ALERT] Incident Post-Mortem"), "{out}");
        assert!(out.contains("Severity: SEV-1 [WARNING] - checkout down for 47 minutes..."));
        assert!(out.contains("14:23 | [ALERT] Alert fired"));
        assert!(out.contains("14:31 | [FIX] Rollback -> v2.3"));
        assert!(out.contains("[ ] Add DB pool alerting @sarah"));
        assert!(out.contains("[x] Roll back release"));
        assert!(out.contains("  - Root cause: \"connection pool exhaustion\""));
        assert!(out.contains("Error rate | 34%"));
        assert!(!out.contains("|--------|"));
        assert!(out.contains("Cafe owner Zoe confirmed [OK] recovery [EMOJI]"));
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn safe_set_checker_reports_line() {
        let err = check_safe("ok\nbad \u{2603}").unwrap_err();
        assert!(matches!(err, SanitizeError::UnsafeCharacter { line: 2, .. }));
    }
}
