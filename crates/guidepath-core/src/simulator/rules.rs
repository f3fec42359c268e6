use super::state::{Deferred, SimState};
use super::TerminalLine;

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A fn-pointer rule: case-sensitive substring pattern, transcript builder
/// and an optional state effect.
///
/// The builder sees the state *before* the effect runs. The effect applies
/// immediate changes and returns background mutations to schedule.
pub struct CommandRule {
    pub id: &'static str,
    pub pattern: &'static str,
    pub output: fn(&SimState, &str) -> Vec<TerminalLine>,
    pub effect: Option<fn(&mut SimState, &str) -> Vec<Deferred>>,
}

impl CommandRule {
    pub fn matches(&self, input: &str) -> bool {
        input.contains(self.pattern)
    }
}

macro_rules! command_rule {
    (
        id: $id:expr,
        pattern: $pattern:expr,
        output: $output:expr $(,)?
    ) => {
        $crate::simulator::rules::CommandRule {
            id: $id,
            pattern: $pattern,
            output: $output,
            effect: None,
        }
    };
    (
        id: $id:expr,
        pattern: $pattern:expr,
        output: $output:expr,
        effect: $effect:expr $(,)?
    ) => {
        $crate::simulator::rules::CommandRule {
            id: $id,
            pattern: $pattern,
            output: $output,
            effect: {
                let effect: fn(
                    &mut $crate::simulator::state::SimState,
                    &str,
                ) -> Vec<$crate::simulator::state::Deferred> = $effect;
                Some(effect)
            },
        }
    };
}

pub(crate) use command_rule;

// ---------------------------------------------------------------------------
// RuleTable
// ---------------------------------------------------------------------------

/// Result of dispatching one command line.
#[derive(Debug)]
pub struct Dispatch {
    /// `None` when nothing matched.
    pub rule_id: Option<&'static str>,
    pub lines: Vec<TerminalLine>,
    pub deferred: Vec<Deferred>,
}

/// Ordered rule list. Declaration order is the contract: the first rule whose
/// pattern occurs in the input wins, so specific patterns must precede the
/// general ones they contain.
pub struct RuleTable {
    rules: Vec<CommandRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<CommandRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CommandRule] {
        &self.rules
    }

    /// First matching rule, if any.
    pub fn find(&self, input: &str) -> Option<&CommandRule> {
        self.rules.iter().find(|r| r.matches(input))
    }

    pub fn dispatch(&self, state: &mut SimState, input: &str) -> Dispatch {
        match self.find(input) {
            Some(rule) => {
                tracing::debug!(rule = rule.id, input, "command matched");
                let lines = (rule.output)(state, input);
                let deferred = match rule.effect {
                    Some(effect) => effect(state, input),
                    None => Vec::new(),
                };
                Dispatch {
                    rule_id: Some(rule.id),
                    lines,
                    deferred,
                }
            }
            None => {
                tracing::debug!(input, "no rule matched");
                Dispatch {
                    rule_id: None,
                    lines: vec![TerminalLine::error(
                        format!("command not found: {input}"),
                        100,
                    )],
                    deferred: Vec::new(),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder helpers shared by the platform tables
// ---------------------------------------------------------------------------

/// Whitespace-split arguments, honoring single and double quotes.
pub fn words(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;
    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => cur.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    out.push(std::mem::take(&mut cur));
                    in_word = false;
                }
            }
            None => {
                cur.push(ch);
                in_word = true;
            }
        }
    }
    if in_word {
        out.push(cur);
    }
    out
}

/// Value following `flag`, either as the next word or as `flag=value`.
pub fn flag_value(input: &str, flag: &str) -> Option<String> {
    let args = words(input);
    let prefix = format!("{flag}=");
    args.iter().enumerate().find_map(|(i, a)| {
        if a == flag {
            args.get(i + 1).cloned()
        } else {
            a.strip_prefix(&prefix).map(str::to_string)
        }
    })
}

/// Words after the `skip` leading words that are not flags or flag values.
pub fn positionals(input: &str, skip: usize, flags_with_values: &[&str]) -> Vec<String> {
    let args = words(input);
    let mut out = Vec::new();
    let mut i = skip;
    while i < args.len() {
        let a = &args[i];
        if flags_with_values.contains(&a.as_str()) {
            i += 2;
            continue;
        }
        if !a.starts_with('-') {
            out.push(a.clone());
        }
        i += 1;
    }
    out
}

/// Left-aligned columns separated by three spaces, like CLI table output.
pub fn columns(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }
    let render = |cells: Vec<String>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:width$}", c, width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("   ")
            .trim_end()
            .to_string()
    };
    let mut out = vec![render(headers.iter().map(|h| h.to_string()).collect())];
    out.extend(rows.iter().map(|r| render(r.clone())));
    out
}

/// Deterministic hex id derived from `seed`, for hashes and container ids.
pub fn fake_hex(seed: &str, len: usize) -> String {
    // FNV-1a, stretched by re-hashing.
    let mut out = String::with_capacity(len);
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut round = 0u64;
    while out.len() < len {
        for b in seed.bytes().chain(round.to_le_bytes()) {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        out.push_str(&format!("{hash:016x}"));
        round += 1;
    }
    out.truncate(len);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
