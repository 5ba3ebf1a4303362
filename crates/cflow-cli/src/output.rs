//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use cflow_collect::{CollectionSummary, ScopeOutcome, ScopeReport};
use cflow_core::CodeEntityKind;
use cflow_graph::queries::{IssueSummary, MilestoneProgress, ProjectBoard};
use cflow_graph::SchemaReport;

use crate::commands::code::FileEntities;

pub fn print_schema_report(report: &SchemaReport) {
    println!("  Applied: {}", report.applied.len().to_string().green());
    if report.failed.is_empty() {
        return;
    }
    println!("  Failed:  {}", report.failed.len().to_string().red());
    for (name, error) in &report.failed {
        println!("    {} {} {}", "✗".red(), name, error.dimmed());
    }
}

fn outcome_colored(outcome: ScopeOutcome) -> ColoredString {
    match outcome {
        ScopeOutcome::Succeeded => "ok".green().bold(),
        ScopeOutcome::Partial => "partial".yellow().bold(),
        ScopeOutcome::Failed => "failed".red().bold(),
    }
}

fn print_scope(report: &ScopeReport) {
    println!(
        "{} {}  {} nodes, {} rels",
        outcome_colored(report.outcome()),
        report.scope.cyan(),
        report.nodes_merged,
        report.relationships_linked
    );

    if let Some(error) = &report.root_error {
        println!("    {}", error.red());
    }
    for kind in &report.kinds {
        let mut line = format!("    {:<12} {:>5}", kind.kind.as_str(), kind.collected);
        if kind.skipped > 0 {
            line.push_str(&format!("  ({} skipped)", kind.skipped));
        }
        match &kind.error {
            Some(error) => println!("{}  {}", line, error.red()),
            None => println!("{}", line),
        }
    }
    if !report.pending_edges.is_empty() {
        println!(
            "    {} {} edge(s) still waiting for an endpoint",
            "!".yellow(),
            report.pending_edges.len()
        );
        for edge in &report.pending_edges {
            println!("      {}", edge.to_string().dimmed());
        }
    }
}

/// Per-scope results followed by totals.
pub fn print_summary(summary: &CollectionSummary) {
    println!();
    println!("{} {}", "Run".bold(), summary.run_id.to_string().dimmed());
    println!("{}", "─".repeat(50));
    for report in &summary.scopes {
        print_scope(report);
    }
    println!("{}", "─".repeat(50));
    println!(
        "  {} succeeded, {} partial, {} failed",
        summary.succeeded().to_string().green(),
        summary.partial().to_string().yellow(),
        summary.failed().to_string().red()
    );
}

/// Get terminal width, defaulting to 80.
fn term_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Truncate a string respecting visual width.
fn truncate_visual(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let mut result = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + ch_width > max_width - 2 {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }
    result.push_str("..");
    result
}

/// Pad a plain string to a given visual width (right-padded).
fn pad_right(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

fn state_colored(state: &str) -> ColoredString {
    match state {
        "open" => state.green(),
        "closed" => state.dimmed(),
        other => other.normal(),
    }
}

pub fn print_issues_table(issues: &[IssueSummary]) {
    if issues.is_empty() {
        println!("{}", "No issues found.".dimmed());
        return;
    }

    // number + state + labels columns take ~40 characters.
    let title_width = term_width().saturating_sub(40).clamp(20, 80);
    println!("{:<7} {} {:<8} {}", "#", pad_right("Title", title_width), "State", "Labels");
    println!("{}", "─".repeat(title_width + 30));

    for issue in issues {
        println!(
            "{:<7} {} {:<8} {}",
            format!("#{}", issue.number),
            pad_right(&truncate_visual(&issue.title, title_width), title_width),
            state_colored(&issue.state),
            issue.labels.join(", ").dimmed()
        );
    }

    println!();
    println!("{} issue(s)", issues.len());
}

pub fn print_milestones(milestones: &[MilestoneProgress]) {
    if milestones.is_empty() {
        println!("{}", "No milestones found.".dimmed());
        return;
    }

    for m in milestones {
        println!(
            "{} {} [{}]  {:.0}% done",
            format!("#{}", m.number).dimmed(),
            m.title.cyan().bold(),
            state_colored(&m.state),
            m.completion()
        );
        println!(
            "    reported: {} open / {} closed   linked in graph: {} ({} open)",
            m.open_issues, m.closed_issues, m.linked_issues, m.linked_open
        );
        if let Some(due) = &m.due_on {
            println!("    due: {}", due);
        }
        if m.has_drift() {
            println!("    {}", "reported counts differ from linked issues".yellow());
        }
    }
}

pub fn print_boards(boards: &[ProjectBoard]) {
    if boards.is_empty() {
        println!("{}", "No projects found.".dimmed());
        return;
    }

    for board in boards {
        println!(
            "{} {} [{}]",
            format!("#{}", board.number).dimmed(),
            board.name.cyan().bold(),
            state_colored(&board.state)
        );
        if board.columns.is_empty() {
            println!("    {}", "no columns".dimmed());
        } else {
            println!("    {}", board.columns.join(" │ "));
        }
    }
}

pub fn print_code_entities(files: &[FileEntities]) {
    if files.is_empty() {
        println!("{}", "No supported source files found.".dimmed());
        return;
    }

    let mut total = 0;
    for file in files {
        println!("{}", file.path.display().to_string().cyan().bold());
        if file.entities.is_empty() {
            println!("    {}", "no entities".dimmed());
        }
        for entity in &file.entities {
            let kind = match entity.kind {
                CodeEntityKind::Class => "class".yellow(),
                CodeEntityKind::Function => "fn".green(),
            };
            println!("    {:>5}  {:<6} {}", entity.start_line, kind, entity.name);
        }
        total += file.entities.len();
    }

    println!();
    println!("{} entities in {} file(s)", total, files.len());
}
