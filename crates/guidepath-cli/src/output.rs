use guidepath_core::session::SessionEvent;
use guidepath_core::simulator::TerminalLine;
use guidepath_core::types::LineKind;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Left-aligned columns separated by two spaces, with a dashed rule under
/// the header.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let render = |cells: Vec<String>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:width$}", c, width = widths.get(i).copied().unwrap_or(0)))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    println!("{}", render(headers.iter().map(|h| h.to_string()).collect()));
    println!("{}", render(widths.iter().map(|&w| "-".repeat(w)).collect()));
    for row in rows {
        println!("{}", render(row));
    }
}

/// One transcript line as the terminal panel shows it.
pub fn format_line(prompt: &str, line: &TerminalLine) -> String {
    match line.kind {
        LineKind::Input => format!("{prompt} {}", line.text),
        LineKind::Output => line.text.clone(),
        LineKind::Error => format!("! {}", line.text),
        LineKind::Success => format!("✓ {}", line.text),
    }
}

pub fn print_lines(prompt: &str, lines: &[TerminalLine]) {
    for line in lines {
        println!("{}", format_line(prompt, line));
    }
}

pub fn describe_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::StepCompleted { step_id } => format!("step '{step_id}' completed"),
        SessionEvent::Advanced { index } => format!("moved to step {}", index + 1),
        SessionEvent::ModuleCompleted { module_id } => format!("module '{module_id}' completed"),
        SessionEvent::QuizAvailable { module_id } => {
            format!("quiz unlocked: guidepath quiz record --score <N> (module '{module_id}')")
        }
        SessionEvent::UpgradeRequired => {
            "free plan limit reached; upgrade to continue with new modules".to_string()
        }
    }
}

pub fn print_events(events: &[SessionEvent]) {
    for event in events {
        println!("» {}", describe_event(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_lines_carry_prompt() {
        let line = TerminalLine::input("git status", 0);
        assert_eq!(format_line("learner@lab:~/repo$", &line), "learner@lab:~/repo$ git status");
    }

    #[test]
    fn error_and_success_are_marked() {
        assert_eq!(format_line("$", &TerminalLine::error("boom", 0)), "! boom");
        assert_eq!(format_line("$", &TerminalLine::success("done", 0)), "✓ done");
        assert_eq!(format_line("$", &TerminalLine::output("plain", 0)), "plain");
    }

    #[test]
    fn advanced_event_is_one_based() {
        assert_eq!(
            describe_event(&SessionEvent::Advanced { index: 0 }),
            "moved to step 1"
        );
    }
}
