//! Example: Read a number, branch on it, then count it down in a loop
//!
//! Usage: cargo run --example countdown -- 12

use std::collections::HashMap;

use blockscript_runtime::{CancelSignal, InterpreterConfig, ScriptSession};
use blockscript_types::{Action, BlockKind, EdgeKind, Predicate, Value, VariableStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info,blockscript_runtime=debug")
        .init();

    let literal = std::env::args().nth(1).unwrap_or_else(|| "12".to_string());

    let session = ScriptSession::new(InterpreterConfig::default());

    // input myVariable -> if myVariable > 10 -> while myVariable > 0 { myVariable -= 1 }
    let input = session.add_block(BlockKind::InputVariable, Some("myVariable"))?;
    let check = session.add_block(
        BlockKind::condition(Predicate::greater_than("myVariable", 10)),
        None,
    )?;
    let big = session.add_block(
        BlockKind::action(Action::assign("message", Value::from("big number"))),
        None,
    )?;
    let small = session.add_block(
        BlockKind::action(Action::assign("message", Value::from("small number"))),
        None,
    )?;
    let countdown = session.add_block(
        BlockKind::looping(Predicate::greater_than("myVariable", 0), None),
        None,
    )?;
    let step = session.add_block(BlockKind::action(Action::add("myVariable", -1)), None)?;

    session.add_connection(input, check, EdgeKind::Flow)?;
    session.add_connection(check, big, EdgeKind::Then)?;
    session.add_connection(check, small, EdgeKind::Else)?;
    session.add_connection(big, countdown, EdgeKind::Flow)?;
    session.add_connection(countdown, step, EdgeKind::Body)?;
    session.add_connection(step, countdown, EdgeKind::LoopBack)?;

    let inputs = HashMap::from([(input, literal)]);
    let result = session
        .run(VariableStore::new(), &inputs, CancelSignal::never())
        .await;

    println!("Status: {}", result.status);
    for entry in &result.trace {
        println!("  {}", entry);
    }
    for (name, value) in result.variables.iter_sorted() {
        println!("  {} = {}", name, value);
    }

    Ok(())
}
