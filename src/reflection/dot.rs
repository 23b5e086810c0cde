//! UML-flavoured Graphviz output.

use super::{StateInfo, StateMachineInfo, TransitionInfo, TransitionKind};

const PREFIX: &str = "digraph {\ncompound=true;\nnode [shape=Mrecord]\nrankdir=\"LR\"\n";

/// Renders a [`StateMachineInfo`] as a DOT digraph.
///
/// Superstates become clusters and leaf states become record nodes listing
/// their entry and exit actions. Every permit becomes an edge labelled
/// `trigger / actions [guards]`: stays and ignored triggers loop back onto
/// their state, and dynamic permits point at a diamond decision node named
/// after their selector.
///
/// # Example
///
/// ```rust
/// use statecraft::reflection::UmlDotGraph;
/// use statecraft::StateMachine;
///
/// let machine: StateMachine<&str, &str> = StateMachine::new("Off");
/// machine.configure("Off", |s| s.permit("toggle", "On")).unwrap();
///
/// let dot = UmlDotGraph::new().render(&machine.info());
/// assert!(dot.starts_with("digraph {"));
/// assert!(dot.contains("-> \"\\\"On\\\"\""));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct UmlDotGraph {
    show_active: bool,
}

impl UmlDotGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw the active states bold and filled.
    pub fn show_active(mut self, show: bool) -> Self {
        self.show_active = show;
        self
    }

    pub fn render(&self, info: &StateMachineInfo) -> String {
        let mut dot = String::from(PREFIX);

        for state in info.top_level_states() {
            self.push_state(&mut dot, info, state);
        }

        let mut edges = String::new();
        let mut decisions = 0;
        for transition in info.states.iter().flat_map(|state| &state.transitions) {
            if transition.kind == TransitionKind::Dynamic {
                decisions += 1;
                let decision = format!("Decision{decisions}");
                dot.push_str(&format!(
                    "{decision} [shape = \"diamond\", label = \"{}\"];\n",
                    escape(&transition.destination)
                ));
                edges.push_str(&line(&transition.source, &decision, &edge_label(transition)));
            } else {
                edges.push_str(&edge(transition));
            }
            edges.push('\n');
        }
        dot.push_str(&edges);

        dot.push_str(&format!(
            "init [label=\"\", shape=point];\ninit -> {}[style = \"solid\"]\n}}",
            node_id(&info.initial_state)
        ));
        dot
    }

    fn push_state(&self, dot: &mut String, info: &StateMachineInfo, state: &StateInfo) {
        if state.substates.is_empty() {
            dot.push_str(&self.leaf(state));
            return;
        }

        let mut label = escape_id(&state.name);
        if !state.entry_actions.is_empty() || !state.exit_actions.is_empty() {
            label.push_str("\\n----------");
            for line in action_lines(state) {
                label.push_str("\\n");
                label.push_str(&line);
            }
        }

        dot.push_str(&format!(
            "\nsubgraph \"cluster{}\"\n\t{{\n\tlabel = \"{}\"\n",
            escape_id(&state.name),
            label
        ));
        for substate in &state.substates {
            if let Some(substate) = info.state(substate) {
                self.push_state(dot, info, substate);
            }
        }
        dot.push_str("}\n");
    }

    fn leaf(&self, state: &StateInfo) -> String {
        let style = if self.show_active && state.is_active {
            "style=\"bold, filled\", "
        } else {
            ""
        };
        let name = escape_record(&state.name);
        let lines = action_lines(state);
        if lines.is_empty() {
            format!("{} [{style}label=\"{name}\"];\n", node_id(&state.name))
        } else {
            format!(
                "{} [{style}label=\"{name}|{}\"];\n",
                node_id(&state.name),
                lines.join("\\n")
            )
        }
    }
}

fn action_lines(state: &StateInfo) -> Vec<String> {
    let entries = state
        .entry_actions
        .iter()
        .map(|action| format!("entry / {}", escape(&action.description)));
    let exits = state
        .exit_actions
        .iter()
        .map(|action| format!("exit / {}", escape(action)));
    entries.chain(exits).collect()
}

fn edge(transition: &TransitionInfo) -> String {
    line(
        &transition.source,
        &transition.destination,
        &edge_label(transition),
    )
}

fn edge_label(transition: &TransitionInfo) -> String {
    let mut label = transition.trigger.clone();
    if !transition.actions.is_empty() {
        label.push_str(" / ");
        label.push_str(&transition.actions.join(", "));
    }
    for guard in &transition.guards {
        if !label.is_empty() {
            label.push(' ');
        }
        label.push('[');
        label.push_str(guard);
        label.push(']');
    }
    label
}

fn line(from: &str, to: &str, label: &str) -> String {
    format!(
        "{} -> {} [style=\"solid\", label=\"{}\"];",
        node_id(from),
        node_id(to),
        escape(label)
    )
}

fn node_id(name: &str) -> String {
    format!("\"{}\"", escape_id(name))
}

/// Quoted-identifier escaping for state names.
fn escape_id(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escaping for text inside a record label, where braces, bars and angle
/// brackets delimit fields.
fn escape_record(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | '"' | '{' | '}' | '|' | '<' | '>') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Label escaping for action and guard descriptions.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            '$' => escaped.push_str("\\$"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}
