//! Repair rules for near-JSON model output.
//!
//! Rules run on raw text, in a fixed order, because the input is not yet
//! parseable:
//!
//! 1. [`fix_embedded_digit_costs`] -- `"estimated_cost": about 100` or `100元` → `100`
//! 2. [`fix_non_numeric_costs`] -- `"estimated_cost": depends` → `0`
//! 3. [`fix_arithmetic_costs`] -- `"estimated_cost": 1000 + 100 = 1100` → `1100`
//! 4. [`strip_comments`] -- `//` line and `/* */` block comments
//! 5. [`strip_trailing_commas`] -- `,` directly before `}` or `]`
//!
//! The cost rules must see values before comments and commas are touched.
//! A comment trailing a cost value is never read as part of it.
//! [`repair`] repeats the ordered pass until the text is stable, so repairing
//! an already repaired fragment is a no-op.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// An unquoted scalar value of a cost/price key, up to the next `,` `}` `]`
/// or newline.
static COST_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<head>"(?:[A-Za-z]+_)*(?i:cost|price)(?:_[A-Za-z]+)*"\s*:\s*)(?P<value>[^\s"\[\{,\}\]][^,\}\]\n]*)"#,
    )
    .expect("cost value pattern is valid")
});

/// A run of ASCII digits with an optional fractional part.
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").expect("number pattern is valid"));

/// Apply every rule, in order, until the text stops changing.
pub fn repair(candidate: &str) -> String {
    let mut current = apply_rules(candidate);
    let mut passes = 1;
    // Terminates: a pass that changes the text either shortens it or turns a
    // single non-digit cost value into `0`.
    loop {
        let next = apply_rules(&current);
        if next == current {
            break;
        }
        current = next;
        passes += 1;
    }
    if passes > 1 {
        tracing::debug!(passes, "repair needed more than one pass to settle");
    }
    current
}

/// One ordered pass over all five rules.
fn apply_rules(text: &str) -> String {
    let text = fix_embedded_digit_costs(text);
    let text = fix_non_numeric_costs(&text);
    let text = fix_arithmetic_costs(&text);
    let text = strip_comments(&text);
    strip_trailing_commas(&text)
}

/// Rule 1: a cost value mixing prose and a number collapses to one number.
/// Prose first: the first number after it. Number first, as in `100元`: the
/// arithmetic run it opens, read the way rule 3 reads it. A value that is
/// arithmetic throughout is left to rule 3.
pub fn fix_embedded_digit_costs(text: &str) -> String {
    rewrite_cost_values(text, |value| {
        let first = value.chars().next()?;
        if !first.is_ascii_digit() {
            return first_number(value);
        }
        let run = arithmetic_prefix(value);
        if run.len() == value.len() {
            return None;
        }
        last_number(run)
    })
}

/// Rule 2: a cost value with no digit at all becomes `0`.
pub fn fix_non_numeric_costs(text: &str) -> String {
    rewrite_cost_values(text, |value| {
        if value.chars().any(|c| c.is_ascii_digit()) {
            None
        } else {
            Some("0".to_string())
        }
    })
}

/// Rule 3: an arithmetic expression collapses to its final number, taken
/// as the already computed result. Nothing is evaluated.
pub fn fix_arithmetic_costs(text: &str) -> String {
    rewrite_cost_values(text, |value| {
        let starts_with_digit = value.chars().next().is_some_and(|c| c.is_ascii_digit());
        let ends_with_digit = value.chars().last().is_some_and(|c| c.is_ascii_digit());
        let arithmetic_only = value.chars().all(is_arithmetic);
        if starts_with_digit && ends_with_digit && arithmetic_only {
            last_number(value)
        } else {
            None
        }
    })
}

/// Rule 4: drop `//` line comments and `/* */` block comments that sit
/// outside string literals. Line comments keep their newline. An
/// unterminated block comment is left as is.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut literal = StringLiteral::default();

    while let Some(c) = chars.next() {
        if literal.consume(c) {
            out.push(c);
            continue;
        }
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut body = String::new();
                let mut closed = false;
                while let Some(n) = chars.next() {
                    if n == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                    body.push(n);
                }
                if !closed {
                    out.push_str("/*");
                    out.push_str(&body);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Rule 5: drop commas whose next significant character (skipping
/// whitespace and further commas) is `}` or `]`.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut literal = StringLiteral::default();

    for (i, &c) in chars.iter().enumerate() {
        if literal.consume(c) {
            out.push(c);
            continue;
        }
        if c == ',' && closes_next(&chars[i + 1..]) {
            continue;
        }
        out.push(c);
    }
    out
}

fn closes_next(rest: &[char]) -> bool {
    rest.iter()
        .find(|c| !c.is_whitespace() && **c != ',')
        .is_some_and(|c| matches!(c, '}' | ']'))
}

/// Tracks whether the scanner is inside a JSON string literal.
#[derive(Default)]
struct StringLiteral {
    inside: bool,
    escaped: bool,
}

impl StringLiteral {
    /// Feed one character. Returns `true` when the character belongs to a
    /// string literal (including its quotes) and must be copied verbatim.
    fn consume(&mut self, c: char) -> bool {
        if self.inside {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.inside = false;
            }
            return true;
        }
        if c == '"' {
            self.inside = true;
            return true;
        }
        false
    }
}

/// Rewrite every cost value for which `fix` returns a replacement.
/// Values that are already valid JSON scalars are never touched. `fix` sees
/// the value up to any `//` or `/*`; the comment is kept for rule 4.
fn rewrite_cost_values(text: &str, fix: impl Fn(&str) -> Option<String>) -> String {
    COST_VALUE
        .replace_all(text, |caps: &Captures<'_>| {
            let head = &caps["head"];
            let value = &caps["value"];
            let body = &value[..comment_start(value).unwrap_or(value.len())];
            let trimmed = body.trim_end();
            let trailing = &value[trimmed.len()..];
            if trimmed.is_empty() || is_json_scalar(trimmed) {
                return caps[0].to_string();
            }
            match fix(trimmed) {
                Some(fixed) => format!("{head}{fixed}{trailing}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn is_json_scalar(value: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(value).is_ok()
}

fn comment_start(value: &str) -> Option<usize> {
    [value.find("//"), value.find("/*")].into_iter().flatten().min()
}

fn is_arithmetic(c: char) -> bool {
    c.is_ascii_digit() || c.is_whitespace() || "+-*/=.".contains(c)
}

/// Leading run of `value` made only of arithmetic characters.
fn arithmetic_prefix(value: &str) -> &str {
    let end = value.find(|c: char| !is_arithmetic(c)).unwrap_or(value.len());
    &value[..end]
}

fn first_number(value: &str) -> Option<String> {
    NUMBER.find(value).map(|m| m.as_str().to_string())
}

fn last_number(value: &str) -> Option<String> {
    NUMBER.find_iter(value).last().map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_digit_cost_keeps_trailing_number() {
        let fixed = repair(r#"{"estimated_cost": transport and ticket about 100}"#);
        assert_eq!(fixed, r#"{"estimated_cost": 100}"#);
    }

    #[test]
    fn embedded_digit_cost_drops_unit_suffix() {
        let fixed = repair(r#"{"estimated_cost": about 50 yuan, "x": 1}"#);
        assert_eq!(fixed, r#"{"estimated_cost": 50, "x": 1}"#);
    }

    #[test]
    fn embedded_digit_cost_takes_first_number_after_prose() {
        let fixed = repair(r#"{"estimated_cost": about 50 yuan for 2 people}"#);
        assert_eq!(fixed, r#"{"estimated_cost": 50}"#);
    }

    #[test]
    fn line_comment_after_cost_is_not_read() {
        let fixed = repair("{\"estimated_cost\": about 50 // for 2 people\n}");
        assert_eq!(fixed, "{\"estimated_cost\": 50 \n}");
    }

    #[test]
    fn block_comment_after_cost_is_not_read() {
        let fixed = repair(r#"{"estimated_cost": about 50 /* was 80 */}"#);
        assert_eq!(fixed, r#"{"estimated_cost": 50 }"#);
    }

    #[test]
    fn comment_before_cost_value_is_stripped_first() {
        let fixed = repair(r#"{"estimated_cost": /* per person */ about 40}"#);
        assert_eq!(fixed, r#"{"estimated_cost":  40}"#);
    }

    #[test]
    fn number_then_unit_keeps_the_number() {
        assert_eq!(
            repair("{\"estimated_cost\": 100元, \"price\": 35 yuan}"),
            "{\"estimated_cost\": 100, \"price\": 35}"
        );
        assert_eq!(
            repair(r#"{"total_cost": 300 + 100 = 400 yuan}"#),
            r#"{"total_cost": 400}"#
        );
    }

    #[test]
    fn embedded_digit_cost_handles_chinese_prose() {
        let fixed = repair("{\"estimated_cost\": 交通+门票 约100}");
        assert_eq!(fixed, "{\"estimated_cost\": 100}");
    }

    #[test]
    fn non_numeric_cost_becomes_zero() {
        let fixed = repair(r#"{"estimated_cost": depends on personal spending}"#);
        assert_eq!(fixed, r#"{"estimated_cost": 0}"#);
    }

    #[test]
    fn arithmetic_cost_takes_final_result() {
        let fixed = repair(r#"{"estimated_cost": 1000 + 100 = 1100}"#);
        assert_eq!(fixed, r#"{"estimated_cost": 1100}"#);
    }

    #[test]
    fn arithmetic_is_not_evaluated() {
        // The last number wins even when the expression has no `=`.
        let fixed = repair(r#"{"total_cost": 200 * 3}"#);
        assert_eq!(fixed, r#"{"total_cost": 3}"#);
    }

    #[test]
    fn decimal_numbers_survive() {
        let fixed = repair(r#"{"ticket_price": roughly 12.5 each}"#);
        assert_eq!(fixed, r#"{"ticket_price": 12.5}"#);
    }

    #[test]
    fn cost_family_includes_compound_keys() {
        let fixed = repair(
            r#"{"estimated_cost_per_night": about 200, "total_cost": n/a, "price": ~30}"#,
        );
        assert_eq!(
            fixed,
            r#"{"estimated_cost_per_night": 200, "total_cost": 0, "price": 30}"#
        );
    }

    #[test]
    fn unrelated_keys_are_untouched() {
        let text = r#"{"duration": about 2 hours}"#;
        assert_eq!(fix_embedded_digit_costs(text), text);
        assert_eq!(fix_non_numeric_costs(text), text);
    }

    #[test]
    fn valid_cost_literals_are_untouched() {
        let text = r#"{"estimated_cost": 50, "total_cost": null, "price": -3.5, "cost": "about 5"}"#;
        assert_eq!(repair(text), text);
    }

    #[test]
    fn trailing_whitespace_in_value_is_kept() {
        let text = "{\n  \"estimated_cost\": about 80  \n}";
        assert_eq!(repair(text), "{\n  \"estimated_cost\": 80  \n}");
    }

    #[test]
    fn strips_line_and_block_comments() {
        let text = "{\n  \"a\": 1, // first\n  /* block\n comment */ \"b\": 2\n}";
        assert_eq!(strip_comments(text), "{\n  \"a\": 1, \n   \"b\": 2\n}");
    }

    #[test]
    fn line_comment_at_end_of_input_is_removed() {
        assert_eq!(strip_comments("{\"a\": 1} // done"), "{\"a\": 1} ");
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        let text = r#"{"url": "https://example.com/a", "note": "/* keep */"}"#;
        assert_eq!(strip_comments(text), text);
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let text = r#"{"a": "say \"hi\" // not a comment"}"#;
        assert_eq!(strip_comments(text), text);
    }

    #[test]
    fn unterminated_block_comment_is_kept() {
        let text = "{\"a\": 1 /* never closed";
        assert_eq!(strip_comments(text), text);
    }

    #[test]
    fn removes_trailing_commas() {
        assert_eq!(strip_trailing_commas(r#"{"a":1, "b":2,}"#), r#"{"a":1, "b":2}"#);
        assert_eq!(strip_trailing_commas("[1, 2,\n ]"), "[1, 2\n ]");
    }

    #[test]
    fn removes_repeated_trailing_commas() {
        assert_eq!(strip_trailing_commas("[1,, ]"), "[1 ]");
    }

    #[test]
    fn commas_inside_strings_are_kept() {
        let text = r#"{"a": "x,}"}"#;
        assert_eq!(strip_trailing_commas(text), text);
    }

    #[test]
    fn trailing_comma_fragment_parses_after_repair() {
        let fixed = repair(r#"{"a":1, "b":2,}"#);
        assert_eq!(fixed, r#"{"a":1, "b":2}"#);
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn comment_inside_cost_value_is_handled() {
        let fixed = repair("{\"estimated_cost\": 50 // per person\n}");
        assert_eq!(fixed, "{\"estimated_cost\": 50 \n}");
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["estimated_cost"], 50);
    }

    #[test]
    fn comment_removal_that_exposes_a_new_comment_settles() {
        // Removing the block comment joins two slashes into a line comment.
        let text = "{\"a\": 1 //**/\n}";
        let once = repair(text);
        assert_eq!(repair(&once), once);
    }

    #[test]
    fn repair_is_idempotent_on_fixtures() {
        let fixtures = [
            r#"{"estimated_cost": about 50 yuan,}"#,
            "{\"a\": [1, 2, ], // c\n \"price\": 1 + 2 = 3 }",
            r#"{"total_cost": 5 /* x */ 6}"#,
            r#"{"cost": , "b": ]"#,
            "not json at all",
            "",
        ];
        for text in fixtures {
            let once = repair(text);
            assert_eq!(repair(&once), once, "not idempotent for {text:?}");
        }
    }

    #[test]
    fn well_formed_json_is_unchanged() {
        let text = r#"{"overview": "A trip", "daily_itinerary": [{"day": 1, "activities": []}], "budget_breakdown": {"total": 1000}}"#;
        assert_eq!(repair(text), text);
    }
}
