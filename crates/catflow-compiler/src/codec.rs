//! Bracket-tagged instruction grammar.
//!
//! ```text
//! document      := router_block? step_block*
//! router_block  := "[router]" TEXT "[/router]"
//! step_block    := "[step" attrs "]" TEXT "[/step]"
//! attrs         := (WS key "=" '"' value '"')*
//! ```
//!
//! Text without any `[router]` or `[step` tag is a legacy document: all of
//! it is global text and there are no steps. Step blocks that do not carry a
//! positive `index`, a non-empty `model`, and a non-empty body are dropped on
//! both encode and decode.
//!
//! Values are not escaped. A `"` inside an attribute value is outside the
//! grammar and ends the value early.

use std::collections::HashMap;
use std::sync::OnceLock;

use catflow_types::{InstructionDocument, RouterStepInstruction};
use regex::Regex;
use tracing::trace;

const ROUTER_OPEN: &str = "[router]";
const ROUTER_CLOSE: &str = "[/router]";
const STEP_OPEN: &str = "[step";
const STEP_CLOSE: &str = "[/step]";

/// Encode a document.
///
/// Falls back to the trimmed global text alone when no step survives
/// filtering.
pub fn serialize(doc: &InstructionDocument) -> String {
    let global = doc.global.trim();
    let steps = sanitize_steps(&doc.steps);

    if steps.is_empty() {
        return global.to_string();
    }

    let mut out = format!("{ROUTER_OPEN}\n{global}\n{ROUTER_CLOSE}\n");
    for step in &steps {
        out.push_str(&format!(
            "\n[step index=\"{}\" model=\"{}\"]\n{}\n{STEP_CLOSE}\n",
            step.index, step.model_id, step.instructions
        ));
    }
    out.trim().to_string()
}

/// Decode a document.
///
/// Never fails: malformed step blocks are skipped.
pub fn parse(raw: &str) -> InstructionDocument {
    if !is_structured(raw) {
        return InstructionDocument::plain(raw.trim());
    }

    let blocks = step_blocks(raw);

    let global = match router_block(raw) {
        Some(inner) => inner.trim().to_string(),
        None => strip_blocks(raw, &blocks).trim().to_string(),
    };

    let mut steps: Vec<RouterStepInstruction> = blocks
        .iter()
        .filter_map(|block| {
            let step = block.to_instruction();
            if step.is_none() {
                trace!(attrs = block.attrs, "skipping malformed step block");
            }
            step
        })
        .collect();
    steps.sort_by_key(|s| s.index);

    InstructionDocument { global, steps }
}

/// Whether `raw` uses the tagged grammar rather than the legacy plain form.
pub fn is_structured(raw: &str) -> bool {
    raw.contains(ROUTER_OPEN) || raw.contains(STEP_OPEN)
}

/// Keep only encodable steps, trimmed and lowercased, ordered by index.
fn sanitize_steps(steps: &[RouterStepInstruction]) -> Vec<RouterStepInstruction> {
    let mut kept: Vec<RouterStepInstruction> = steps
        .iter()
        .filter_map(|s| {
            let model_id = s.model_id.trim().to_lowercase();
            let instructions = s.instructions.trim();
            (s.index > 0 && !model_id.is_empty() && !instructions.is_empty())
                .then(|| RouterStepInstruction::new(s.index, model_id, instructions))
        })
        .collect();
    kept.sort_by_key(|s| s.index);
    kept
}

// ── Productions ─────────────────────────────────────────────────────────

/// Inner text of the first complete `[router]...[/router]` pair.
fn router_block(raw: &str) -> Option<&str> {
    let open = raw.find(ROUTER_OPEN)?;
    let inner_start = open + ROUTER_OPEN.len();
    let close = raw[inner_start..].find(ROUTER_CLOSE)?;
    Some(&raw[inner_start..inner_start + close])
}

/// A `[step ...]...[/step]` block located in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StepBlock<'a> {
    /// Raw text between `[step` and the closing `]` of the open tag.
    attrs: &'a str,
    body: &'a str,
    /// Byte span of the whole block, tags included.
    span: (usize, usize),
}

impl StepBlock<'_> {
    fn to_instruction(&self) -> Option<RouterStepInstruction> {
        let attrs = parse_attrs(self.attrs);
        let index = parse_index(attrs.get("index")?)?;
        let model_id = attrs.get("model")?.trim().to_lowercase();
        let body = self.body.trim();
        if model_id.is_empty() || body.is_empty() {
            return None;
        }
        Some(RouterStepInstruction::new(index, model_id, body))
    }
}

/// Scan every step block left to right without backtracking.
///
/// The open tag ends at the first `]`; the body ends at the first
/// `[/step]` after it. An unterminated block stops the scan.
fn step_blocks(raw: &str) -> Vec<StepBlock<'_>> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(found) = raw[pos..].find(STEP_OPEN) {
        let open = pos + found;
        let after_name = open + STEP_OPEN.len();

        // "[steps" or "[stepper" is not a step tag.
        match raw[after_name..].chars().next() {
            Some(c) if c == ']' || c.is_whitespace() => {}
            Some(_) => {
                pos = after_name;
                continue;
            }
            None => break,
        }

        let Some(tag_len) = raw[after_name..].find(']') else {
            break;
        };
        let tag_end = after_name + tag_len;
        let body_start = tag_end + 1;

        let Some(body_len) = raw[body_start..].find(STEP_CLOSE) else {
            break;
        };
        let close = body_start + body_len;
        let end = close + STEP_CLOSE.len();

        blocks.push(StepBlock {
            attrs: &raw[after_name..tag_end],
            body: &raw[body_start..close],
            span: (open, end),
        });
        pos = end;
    }

    blocks
}

/// `raw` with every block span cut out.
fn strip_blocks(raw: &str, blocks: &[StepBlock<'_>]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut cursor = 0;
    for block in blocks {
        out.push_str(&raw[cursor..block.span.0]);
        cursor = block.span.1;
    }
    out.push_str(&raw[cursor..]);
    out
}

fn attr_regex() -> &'static Regex {
    static ATTR: OnceLock<Regex> = OnceLock::new();
    ATTR.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][A-Za-z0-9_-]*)\s*=\s*"([^"]*)""#).expect("attribute pattern is valid")
    })
}

/// `key="value"` pairs in any order. The first occurrence of a key wins.
fn parse_attrs(attrs: &str) -> HashMap<&str, &str> {
    let mut out = HashMap::new();
    for caps in attr_regex().captures_iter(attrs) {
        if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
            out.entry(key.as_str()).or_insert(value.as_str());
        }
    }
    out
}

/// A strictly positive integer, surrounding whitespace allowed.
fn parse_index(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|i| *i > 0)
}
