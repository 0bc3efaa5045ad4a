// Console - Line commands driving a script session
//
// Each stdin line parses into a `Command`. The console keeps the literals
// typed into input blocks and the seed variables between runs, standing in
// for the editor's text fields.

use std::collections::HashMap;
use std::str::FromStr;

use blockscript_runtime::{CancelSignal, RunResult, ScriptSession, SessionError};
use blockscript_types::{
    Action, BlockGraph, BlockId, BlockKind, Comparison, EdgeKind, Predicate, Value, VariableStore,
};
use tracing::debug;

pub const HELP: &str = "\
Commands:
  add generic [label]              placeholder block
  add input <name>                 input block writing <name>
  add action <var> += <n>          add <n> to an integer variable
  add action <var> -= <n>          subtract <n> from an integer variable
  add action <var> = <literal>     assign a literal
  add condition <var> <op> <n>     condition (ops: > >= < <= == !=)
  add loop <var> <op> <n> [max]    loop while the predicate holds
  remove <id>                      remove a block and its connections
  connect <from> <to> [kind]       kinds: flow then else body loopback
  disconnect <from> <to>           remove a connection
  bind <id> <name>                 change an input block's variable
  label <id> <text>                change a block's label
  input <id> <literal>             literal supplied to an input block
  var <name> <literal>             seed a variable for every run
  blocks | connections             list the graph
  run                              run the program (Ctrl-C cancels)
  help | quit";

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Errors reported back to the console user
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}' (try 'help')")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Block not found: {0}")]
    UnknownBlock(BlockId),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to encode run result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddGeneric { label: Option<String> },
    AddInput { name: String },
    AddAction(Action),
    AddCondition(Predicate),
    AddLoop {
        predicate: Predicate,
        max_iterations: Option<u32>,
    },
    Remove(BlockId),
    Connect {
        from: BlockId,
        to: BlockId,
        kind: EdgeKind,
    },
    Disconnect { from: BlockId, to: BlockId },
    Bind { id: BlockId, name: String },
    Label { id: BlockId, text: String },
    Input { id: BlockId, literal: String },
    Var { name: String, literal: String },
    Blocks,
    Connections,
    Run,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, args)) = words.split_first() else {
            return Err(ConsoleError::Empty);
        };

        match head {
            "add" => parse_add(args),
            "remove" | "rm" => match args {
                [id] => Ok(Command::Remove(parse_id(id)?)),
                _ => Err(ConsoleError::Usage("remove <id>")),
            },
            "connect" => match args {
                [from, to] => Ok(Command::Connect {
                    from: parse_id(from)?,
                    to: parse_id(to)?,
                    kind: EdgeKind::Flow,
                }),
                [from, to, kind] => Ok(Command::Connect {
                    from: parse_id(from)?,
                    to: parse_id(to)?,
                    kind: kind.parse().map_err(ConsoleError::InvalidArgument)?,
                }),
                _ => Err(ConsoleError::Usage("connect <from> <to> [kind]")),
            },
            "disconnect" => match args {
                [from, to] => Ok(Command::Disconnect {
                    from: parse_id(from)?,
                    to: parse_id(to)?,
                }),
                _ => Err(ConsoleError::Usage("disconnect <from> <to>")),
            },
            "bind" => match args {
                [id, name] => Ok(Command::Bind {
                    id: parse_id(id)?,
                    name: name.to_string(),
                }),
                _ => Err(ConsoleError::Usage("bind <id> <name>")),
            },
            "label" => match args {
                [id, text @ ..] if !text.is_empty() => Ok(Command::Label {
                    id: parse_id(id)?,
                    text: text.join(" "),
                }),
                _ => Err(ConsoleError::Usage("label <id> <text>")),
            },
            "input" => match args {
                [id, literal @ ..] if !literal.is_empty() => Ok(Command::Input {
                    id: parse_id(id)?,
                    literal: literal.join(" "),
                }),
                _ => Err(ConsoleError::Usage("input <id> <literal>")),
            },
            "var" => match args {
                [name, literal @ ..] if !literal.is_empty() => Ok(Command::Var {
                    name: name.to_string(),
                    literal: literal.join(" "),
                }),
                _ => Err(ConsoleError::Usage("var <name> <literal>")),
            },
            "blocks" | "ls" => Ok(Command::Blocks),
            "connections" => Ok(Command::Connections),
            "run" => Ok(Command::Run),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(ConsoleError::UnknownCommand(other.to_string())),
        }
    }
}

fn parse_add(args: &[&str]) -> Result<Command, ConsoleError> {
    match args {
        ["generic", label @ ..] => Ok(Command::AddGeneric {
            label: (!label.is_empty()).then(|| label.join(" ")),
        }),
        ["input", name] => Ok(Command::AddInput {
            name: name.to_string(),
        }),
        ["action", var, "+=", n] => Ok(Command::AddAction(Action::add(*var, parse_int(n)?))),
        ["action", var, "-=", n] => {
            let delta = parse_int(n)?
                .checked_neg()
                .ok_or_else(|| ConsoleError::InvalidArgument(format!("'{}' out of range", n)))?;
            Ok(Command::AddAction(Action::add(*var, delta)))
        }
        ["action", var, "=", literal @ ..] if !literal.is_empty() => Ok(Command::AddAction(
            Action::assign(*var, Value::from_literal(&literal.join(" "))),
        )),
        ["condition", var, op, n] => Ok(Command::AddCondition(parse_predicate(var, op, n)?)),
        ["loop", var, op, n] => Ok(Command::AddLoop {
            predicate: parse_predicate(var, op, n)?,
            max_iterations: None,
        }),
        ["loop", var, op, n, max] => Ok(Command::AddLoop {
            predicate: parse_predicate(var, op, n)?,
            max_iterations: Some(max.parse().map_err(|_| {
                ConsoleError::InvalidArgument(format!("'{}' is not an iteration count", max))
            })?),
        }),
        ["generic" | "input" | "action" | "condition" | "loop", ..] => Err(ConsoleError::Usage(
            "add generic [label] | add input <name> | add action <var> (+=|-=|=) <value> | \
             add condition <var> <op> <n> | add loop <var> <op> <n> [max]",
        )),
        _ => Err(ConsoleError::Usage(
            "add (generic|input|action|condition|loop) ...",
        )),
    }
}

fn parse_id(text: &str) -> Result<BlockId, ConsoleError> {
    text.parse()
        .map_err(|_| ConsoleError::InvalidArgument(format!("'{}' is not a block id", text)))
}

fn parse_int(text: &str) -> Result<i64, ConsoleError> {
    text.parse()
        .map_err(|_| ConsoleError::InvalidArgument(format!("'{}' is not an integer", text)))
}

fn parse_predicate(var: &str, op: &str, n: &str) -> Result<Predicate, ConsoleError> {
    let comparison: Comparison = op.parse().map_err(ConsoleError::InvalidArgument)?;
    Ok(Predicate::new(var, comparison, parse_int(n)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Console
// ─────────────────────────────────────────────────────────────────────────────

/// Executes commands against a session
pub struct Console {
    session: ScriptSession,
    /// Literals typed into input blocks
    inputs: HashMap<BlockId, String>,
    /// Variables every run starts with
    variables: VariableStore,
    json: bool,
}

impl Console {
    pub fn new(session: ScriptSession, json: bool) -> Self {
        Self {
            session,
            inputs: HashMap::new(),
            variables: VariableStore::new(),
            json,
        }
    }

    pub fn session(&self) -> &ScriptSession {
        &self.session
    }

    /// Execute one command and return the text to print
    pub async fn execute(
        &mut self,
        command: Command,
        cancel: CancelSignal,
    ) -> Result<String, ConsoleError> {
        debug!(?command, "Console command");

        match command {
            Command::AddGeneric { label } => {
                let id = self.session.add_block(BlockKind::generic(), None)?;
                if let Some(label) = label {
                    self.session.set_label(id, Some(&label))?;
                }
                Ok(format!("Added block {}", id))
            }
            Command::AddInput { name } => {
                let id = self.session.add_block(BlockKind::InputVariable, Some(&name))?;
                Ok(format!("Added block {}", id))
            }
            Command::AddAction(action) => {
                let id = self.session.add_block(BlockKind::action(action), None)?;
                Ok(format!("Added block {}", id))
            }
            Command::AddCondition(predicate) => {
                let id = self.session.add_block(BlockKind::condition(predicate), None)?;
                Ok(format!("Added block {}", id))
            }
            Command::AddLoop {
                predicate,
                max_iterations,
            } => {
                let kind = BlockKind::looping(predicate, max_iterations);
                let id = self.session.add_block(kind, None)?;
                Ok(format!("Added block {}", id))
            }
            Command::Remove(id) => {
                if !self.session.remove_block(id)? {
                    return Err(ConsoleError::UnknownBlock(id));
                }
                self.inputs.remove(&id);
                Ok(format!("Removed block {}", id))
            }
            Command::Connect { from, to, kind } => {
                self.session.add_connection(from, to, kind)?;
                Ok(format!("Connected {} -> {} ({})", from, to, kind))
            }
            Command::Disconnect { from, to } => {
                if self.session.remove_connection(from, to)? {
                    Ok(format!("Disconnected {} -> {}", from, to))
                } else {
                    Ok(format!("No connection {} -> {}", from, to))
                }
            }
            Command::Bind { id, name } => {
                self.session.set_binding_name(id, Some(&name))?;
                Ok(format!("Block {} now writes '{}'", id, name))
            }
            Command::Label { id, text } => {
                self.session.set_label(id, Some(&text))?;
                Ok(format!("Block {} labelled '{}'", id, text))
            }
            Command::Input { id, literal } => {
                let graph = self.session.snapshot().await;
                match graph.block(id) {
                    Some(block) if matches!(block.kind, BlockKind::InputVariable) => {
                        self.inputs.insert(id, literal);
                        Ok(format!("Input for block {} set", id))
                    }
                    Some(_) => Err(ConsoleError::InvalidArgument(format!(
                        "block {} is not an input block",
                        id
                    ))),
                    None => Err(ConsoleError::UnknownBlock(id)),
                }
            }
            Command::Var { name, literal } => {
                let value = Value::from_literal(&literal);
                let text = format!("{} = {}", name, value);
                self.variables.set(name, value);
                Ok(text)
            }
            Command::Blocks => Ok(render_blocks(&self.session.snapshot().await)),
            Command::Connections => Ok(render_connections(&self.session.snapshot().await)),
            Command::Run => {
                let result = self
                    .session
                    .run(self.variables.clone(), &self.inputs, cancel)
                    .await;
                if self.json {
                    Ok(serde_json::to_string_pretty(&result)?)
                } else {
                    Ok(render_result(&result))
                }
            }
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

fn describe(kind: &BlockKind) -> String {
    match kind {
        BlockKind::Generic { action: None } => String::new(),
        BlockKind::Generic {
            action: Some(action),
        } => action.to_string(),
        BlockKind::InputVariable => String::new(),
        BlockKind::Condition { predicate } => format!("if {}", predicate),
        BlockKind::Loop {
            predicate,
            max_iterations: Some(max),
        } => format!("while {} (max {})", predicate, max),
        BlockKind::Loop { predicate, .. } => format!("while {}", predicate),
    }
}

fn render_blocks(graph: &BlockGraph) -> String {
    if graph.is_empty() {
        return "No blocks".to_string();
    }

    graph
        .blocks()
        .map(|block| {
            let line = format!(
                "{:>4}  {:<16} {}",
                block.id,
                block.display_label(),
                describe(&block.kind)
            );
            match &block.binding_name {
                Some(name) => format!("{} -> {}", line, name),
                None => line.trim_end().to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_connections(graph: &BlockGraph) -> String {
    if graph.connections().is_empty() {
        return "No connections".to_string();
    }

    graph
        .connections()
        .iter()
        .map(|c| format!("{} -> {} ({})", c.from, c.to, c.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_result(result: &RunResult) -> String {
    let mut lines = vec![format!("Run {} {}", result.run_id, result.status)];
    lines.extend(result.trace.iter().map(|entry| format!("  {}", entry)));
    if let Some(err) = &result.error {
        lines.push(format!("Error: {}", err));
    }
    if !result.variables.is_empty() {
        lines.push("Variables:".to_string());
        lines.extend(
            result
                .variables
                .iter_sorted()
                .map(|(name, value)| format!("  {} = {}", name, value)),
        );
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use blockscript_runtime::{InterpreterConfig, RunState};

    use super::*;

    fn console() -> Console {
        let config = InterpreterConfig::default().with_loop_delay(Duration::ZERO);
        Console::new(ScriptSession::new(config), false)
    }

    async fn exec(console: &mut Console, line: &str) -> Result<String, ConsoleError> {
        let command: Command = line.parse()?;
        console.execute(command, CancelSignal::never()).await
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "add action n -= 1".parse::<Command>().unwrap(),
            Command::AddAction(Action::add("n", -1))
        );
        assert_eq!(
            "add loop n > 0 5".parse::<Command>().unwrap(),
            Command::AddLoop {
                predicate: Predicate::greater_than("n", 0),
                max_iterations: Some(5),
            }
        );
        assert_eq!(
            "connect 1 2 body".parse::<Command>().unwrap(),
            Command::Connect {
                from: "1".parse().unwrap(),
                to: "2".parse().unwrap(),
                kind: EdgeKind::Body,
            }
        );
        assert_eq!(
            "add action msg = hello world".parse::<Command>().unwrap(),
            Command::AddAction(Action::assign("msg", Value::from("hello world")))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("   ".parse::<Command>(), Err(ConsoleError::Empty)));
        assert!(matches!(
            "jump 3".parse::<Command>(),
            Err(ConsoleError::UnknownCommand(_))
        ));
        assert!(matches!(
            "add condition x >> 3".parse::<Command>(),
            Err(ConsoleError::InvalidArgument(_))
        ));
        assert!(matches!(
            "connect 1".parse::<Command>(),
            Err(ConsoleError::Usage(_))
        ));
        assert!(matches!(
            "connect 1 2 sideways".parse::<Command>(),
            Err(ConsoleError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_countdown_program() {
        let mut console = console();
        for line in [
            "add input n",
            "add loop n > 0",
            "add action n += -1",
            "add generic done",
            "connect 1 2",
            "connect 2 3 body",
            "connect 3 2 loopback",
            "connect 2 4",
            "input 1 3",
        ] {
            exec(&mut console, line).await.unwrap();
        }

        let output = exec(&mut console, "run").await.unwrap();
        assert!(output.contains("completed"), "{}", output);
        assert!(output.contains("looped 3 time(s)"), "{}", output);
        assert!(output.contains("n = 0"), "{}", output);
        assert_eq!(console.session().state(), RunState::Completed);

        let listing = exec(&mut console, "blocks").await.unwrap();
        assert!(listing.contains("while n > 0"), "{}", listing);
        assert!(listing.contains("done"), "{}", listing);
    }

    #[tokio::test]
    async fn test_errors_leave_session_usable() {
        let mut console = console();
        exec(&mut console, "add generic").await.unwrap();

        let err = exec(&mut console, "connect 1 1").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Session(SessionError::Graph(_))));
        let err = exec(&mut console, "input 1 5").await.unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidArgument(_)));
        let err = exec(&mut console, "remove 9").await.unwrap_err();
        assert!(matches!(err, ConsoleError::UnknownBlock(_)));

        exec(&mut console, "var x 12").await.unwrap();
        let output = exec(&mut console, "run").await.unwrap();
        assert!(output.contains("x = 12"), "{}", output);
    }

    #[tokio::test]
    async fn test_text_output_layout() {
        let mut console = console();
        exec(&mut console, "add generic").await.unwrap();
        exec(&mut console, "add action n = 4").await.unwrap();
        exec(&mut console, "var a 1").await.unwrap();

        let listing = exec(&mut console, "blocks").await.unwrap();
        assert_eq!(listing.lines().next(), Some("   1  Generic"));
        assert_eq!(listing.lines().count(), 2);

        let output = exec(&mut console, "run").await.unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("Run ") && lines[0].ends_with(" completed"), "{}", output);
        assert_eq!(
            &lines[1..],
            &["  [1] executed", "  [2] n = 4", "Variables:", "  a = 1", "  n = 4"]
        );
    }

    #[tokio::test]
    async fn test_json_output() {
        let config = InterpreterConfig::default().with_loop_delay(Duration::ZERO);
        let mut console = Console::new(ScriptSession::new(config), true);
        exec(&mut console, "add action n = 4").await.unwrap();

        let output = exec(&mut console, "run").await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["variables"]["n"]["value"], 4);
    }
}
