//! Purpose: Pretty-print CLI JSON with optional ANSI colorization.
//! Exports: render_json.
//! Role: Pure formatter behind `emit_json` when stdout is a terminal or color is forced.
//! Invariants: With color off, output equals serde_json::to_string_pretty.
//! Invariants: The NULL and UNSUPPORTED cell sentinels are dimmed so they stand apart from data.
use rowpeek::api::{NULL_CELL, UNSUPPORTED_CELL};
use serde_json::Value;

const INDENT: &str = "  ";

// Plain 8/16-color codes; bright variants wash out on light themes.
const COLOR_KEY: &str = "36";
const COLOR_STRING: &str = "32";
const COLOR_NUMBER: &str = "33";
const COLOR_BOOL: &str = "35";
const COLOR_PLAIN: &str = "39";
const COLOR_SENTINEL: &str = "2";

pub fn render_json(value: &Value, use_color: bool) -> String {
    let mut writer = JsonWriter {
        out: String::new(),
        use_color,
    };
    writer.value(value, 0);
    writer.out
}

struct JsonWriter {
    out: String,
    use_color: bool,
}

impl JsonWriter {
    fn value(&mut self, value: &Value, depth: usize) {
        match value {
            Value::Null => self.token("null", COLOR_PLAIN),
            Value::Bool(flag) => self.token(if *flag { "true" } else { "false" }, COLOR_BOOL),
            Value::Number(num) => self.token(&num.to_string(), COLOR_NUMBER),
            Value::String(text) => {
                let color = if text.as_str() == NULL_CELL || text.as_str() == UNSUPPORTED_CELL {
                    COLOR_SENTINEL
                } else {
                    COLOR_STRING
                };
                self.token(&quote(text), color);
            }
            Value::Array(items) => {
                self.container(('[', ']'), items.len(), depth, |writer, idx| {
                    writer.value(&items[idx], depth + 1);
                });
            }
            Value::Object(map) => {
                let entries = map.iter().collect::<Vec<_>>();
                self.container(('{', '}'), entries.len(), depth, |writer, idx| {
                    let (key, value) = entries[idx];
                    writer.token(&quote(key), COLOR_KEY);
                    writer.token(":", COLOR_PLAIN);
                    writer.out.push(' ');
                    writer.value(value, depth + 1);
                });
            }
        }
    }

    fn container(
        &mut self,
        (open, close): (char, char),
        len: usize,
        depth: usize,
        mut item: impl FnMut(&mut Self, usize),
    ) {
        if len == 0 {
            self.token(&format!("{open}{close}"), COLOR_PLAIN);
            return;
        }
        self.token(&open.to_string(), COLOR_PLAIN);
        for idx in 0..len {
            self.out.push('\n');
            self.indent(depth + 1);
            item(self, idx);
            if idx + 1 < len {
                self.token(",", COLOR_PLAIN);
            }
        }
        self.out.push('\n');
        self.indent(depth);
        self.token(&close.to_string(), COLOR_PLAIN);
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
    }

    fn token(&mut self, text: &str, color: &str) {
        if self.use_color {
            self.out.push_str("\u{1b}[");
            self.out.push_str(color);
            self.out.push('m');
            self.out.push_str(text);
            self.out.push_str("\u{1b}[0m");
        } else {
            self.out.push_str(text);
        }
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}
