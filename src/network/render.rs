//! Render statements back into configuration commands.
//!
//! Used by rollback: the pre-change snapshot is re-applied either in full or
//! as a delta. The output does not include the enter/exit configuration mode
//! commands; [`Platform::wrap_config`] adds those.

use super::Platform;
use crate::snapshot::{Statement, StatementKind, StatementPath};

/// Tracks the configuration sub-mode a line-oriented device is in.
#[derive(Default)]
struct ModeTracker {
    open: Vec<String>,
    commands: Vec<String>,
}

impl ModeTracker {
    /// Navigate from the current sub-mode to `parents`.
    fn enter(&mut self, parents: &[String]) {
        let common = self
            .open
            .iter()
            .zip(parents)
            .take_while(|(a, b)| a == b)
            .count();

        for _ in common..self.open.len() {
            self.commands.push("exit".to_string());
        }
        self.open.truncate(common);

        for header in &parents[common..] {
            self.push_line(header.clone());
            self.open.push(header.clone());
        }
    }

    fn push_line(&mut self, line: String) {
        self.commands
            .push(format!("{}{}", " ".repeat(self.open.len()), line));
    }
}

fn sorted(statements: &[Statement]) -> Vec<&Statement> {
    let mut sorted: Vec<&Statement> = statements.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    sorted
}

fn junos_prefix(statement: &Statement) -> String {
    statement
        .parents
        .iter()
        .map(|p| format!("{} ", p))
        .collect::<String>()
}

fn removal_targets(statements: &[Statement]) -> Vec<&Statement> {
    let mut removed: Vec<&StatementPath> = Vec::new();
    let mut targets = Vec::new();
    for statement in sorted(statements) {
        if statement.kind == StatementKind::Negated
            || removed.iter().any(|r| statement.path.is_descendant_of(r))
        {
            continue;
        }
        removed.push(&statement.path);
        targets.push(statement);
    }
    targets
}

fn emit_commands(mode: &mut ModeTracker, platform: Platform, statements: &[Statement]) {
    for statement in sorted(statements) {
        if platform == Platform::Junos {
            if matches!(statement.kind, StatementKind::Setting | StatementKind::Flag) {
                mode.commands.push(format!(
                    "set {}{}",
                    junos_prefix(statement),
                    statement.config_line("delete")
                ));
            }
            continue;
        }
        mode.enter(&statement.parents);
        mode.push_line(statement.config_line(platform.negation_prefix()));
        if statement.kind == StatementKind::Section {
            mode.open.push(statement.keyword.clone());
        }
    }
}

fn emit_removals(mode: &mut ModeTracker, platform: Platform, statements: &[Statement]) {
    for statement in removal_targets(statements) {
        if platform == Platform::Junos {
            mode.commands
                .push(format!("delete {}{}", junos_prefix(statement), statement.keyword));
            continue;
        }
        mode.enter(&statement.parents);
        mode.push_line(format!("{} {}", platform.negation_prefix(), statement.keyword));
    }
}

/// Commands that (re)create `statements` on the device.
pub fn render_commands(platform: Platform, statements: &[Statement]) -> Vec<String> {
    let mut mode = ModeTracker::default();
    emit_commands(&mut mode, platform, statements);
    mode.commands
}

/// Commands that remove `statements` from the device.
///
/// Statements underneath a removed section are skipped since removing the
/// section removes them too. Negations have nothing to remove.
pub fn render_removals(platform: Platform, statements: &[Statement]) -> Vec<String> {
    let mut mode = ModeTracker::default();
    emit_removals(&mut mode, platform, statements);
    mode.commands
}

/// Removals followed by re-creations, navigated as one command sequence.
pub fn render_delta(platform: Platform, remove: &[Statement], restore: &[Statement]) -> Vec<String> {
    let mut mode = ModeTracker::default();
    emit_removals(&mut mode, platform, remove);
    mode.enter(&[]);
    emit_commands(&mut mode, platform, restore);
    mode.commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::parse_statements;
    use pretty_assertions::assert_eq;

    const RUNNING: &str = "\
hostname sw1
vlan 10
 name SALES
interface GigabitEthernet0/1
 description Uplink
 switchport access vlan 10
 no shutdown
";

    #[test]
    fn test_render_line_oriented() {
        let statements = parse_statements(Platform::Ios, RUNNING).unwrap();
        let commands = render_commands(Platform::Ios, &statements);
        assert_eq!(
            commands,
            vec![
                "hostname sw1",
                "interface GigabitEthernet0/1",
                " description Uplink",
                " no shutdown",
                " switchport access vlan 10",
                "exit",
                "vlan 10",
                " name SALES",
            ]
        );
    }

    #[test]
    fn test_rendered_commands_normalize_to_the_same_statements() {
        let statements = parse_statements(Platform::Ios, RUNNING).unwrap();
        let rendered = render_commands(Platform::Ios, &statements)
            .into_iter()
            .filter(|c| c != "exit")
            .collect::<Vec<_>>()
            .join("\n");
        let reparsed = parse_statements(Platform::Ios, &rendered).unwrap();
        assert_eq!(reparsed, statements);
    }

    #[test]
    fn test_render_children_without_section_statement() {
        let statements = parse_statements(Platform::Ios, RUNNING).unwrap();
        let only_name: Vec<Statement> = statements
            .into_iter()
            .filter(|s| s.path.to_string() == "vlan/10/name")
            .collect();
        assert_eq!(
            render_commands(Platform::Ios, &only_name),
            vec!["vlan 10", " name SALES"]
        );
    }

    #[test]
    fn test_render_removals_skip_descendants() {
        let statements = parse_statements(Platform::Ios, RUNNING).unwrap();
        let vlan: Vec<Statement> = statements
            .into_iter()
            .filter(|s| s.path.to_string().starts_with("vlan/10"))
            .collect();
        assert_eq!(render_removals(Platform::Ios, &vlan), vec!["no vlan 10"]);
    }

    #[test]
    fn test_render_delta_returns_to_top_level() {
        let statements = parse_statements(Platform::Ios, RUNNING).unwrap();
        let (remove, restore): (Vec<Statement>, Vec<Statement>) = statements
            .into_iter()
            .filter(|s| {
                let path = s.path.to_string();
                path.ends_with("description") || path == "hostname"
            })
            .partition(|s| s.path.to_string().ends_with("description"));
        assert_eq!(
            render_delta(Platform::Ios, &remove, &restore),
            vec![
                "interface GigabitEthernet0/1",
                " no description",
                "exit",
                "hostname sw1",
            ]
        );
    }

    #[test]
    fn test_render_junos() {
        let text = "vlans {\n    GUEST {\n        vlan-id 20;\n    }\n}\n";
        let statements = parse_statements(Platform::Junos, text).unwrap();
        assert_eq!(
            render_commands(Platform::Junos, &statements),
            vec!["set vlans GUEST vlan-id 20"]
        );
        assert_eq!(
            render_removals(Platform::Junos, &statements),
            vec!["delete vlans"]
        );
    }
}
