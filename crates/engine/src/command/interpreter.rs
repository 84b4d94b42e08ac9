// RDB - Replay Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Text-to-command dispatch.
//!
//! The [`CommandInterpreter`] maps command names to factories. Parsing splits the input
//! on whitespace, looks the first token up and hands the remaining tokens to the
//! factory, which validates arity and argument types.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use itertools::Itertools;
use rdb_common::types::{BreakpointKind, BreakpointLocation};

use crate::{
    command::{breakpoints::*, inspection::*, navigation::*},
    Command, CommandResult, ControlInterface, DebuggerError, DebuggerResult, DebuggerState,
};

/// Builds a command from its arguments.
pub type CommandFactory = Arc<dyn Fn(&CommandInterpreter, &[&str]) -> CommandBuild + Send + Sync>;

/// What a [`CommandFactory`] produces.
pub type CommandBuild = DebuggerResult<Box<dyn Command>>;

/// Help grouping of commands. Has no effect on dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandCategory {
    /// Stepping and continuing
    Navigation,
    /// Moving through recorded history
    History,
    /// Frames and methods
    Inspection,
    /// Variables and output
    Variables,
    /// Breakpoint management
    Breakpoints,
}

impl CommandCategory {
    /// Heading used in the help text.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Navigation => "Navigation commands",
            Self::History => "History navigation (replay mode)",
            Self::Inspection => "Code inspection",
            Self::Variables => "Variable inspection",
            Self::Breakpoints => "Breakpoint management",
        }
    }
}

struct CommandEntry {
    factory: CommandFactory,
    help: String,
    category: CommandCategory,
}

/// Registry of named command factories.
pub struct CommandInterpreter {
    entries: BTreeMap<String, CommandEntry>,
}

impl fmt::Debug for CommandInterpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandInterpreter").field("commands", &self.entries.keys()).finish()
    }
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandInterpreter {
    /// Creates an interpreter with every built-in command registered.
    pub fn new() -> Self {
        let mut interpreter = Self::empty();
        interpreter.register_builtins();
        interpreter
    }

    /// Creates an interpreter without any command.
    pub fn empty() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Registers (or replaces) a command.
    pub fn register<F>(
        &mut self,
        name: &str,
        factory: F,
        help: impl Into<String>,
        category: CommandCategory,
    ) where
        F: Fn(&Self, &[&str]) -> DebuggerResult<Box<dyn Command>> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_string(),
            CommandEntry { factory: Arc::new(factory), help: help.into(), category },
        );
    }

    /// Parses a line of operator input into a command.
    pub fn parse(&self, line: &str) -> DebuggerResult<Box<dyn Command>> {
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        let Some((name, args)) = tokens.split_first() else {
            return Err(DebuggerError::user_input("Empty command"));
        };
        let entry = self.entries.get(*name).ok_or_else(|| {
            DebuggerError::user_input(format!(
                "Unknown command: {name}. Type 'help' for available commands."
            ))
        })?;
        (entry.factory)(self, args)
    }

    /// Whether a command is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered command names in sorted order.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Help line of a single command.
    pub fn help(&self, name: &str) -> Option<String> {
        self.entries.get(name).map(|entry| format!("  {name:<26} - {}", entry.help))
    }

    /// Help text of every command, grouped by category.
    pub fn full_help(&self) -> String {
        let groups = self
            .entries
            .iter()
            .map(|(name, entry)| (entry.category, name))
            .into_group_map();

        let mut text = String::from("Available commands:\n");
        for category in groups.keys().sorted() {
            text.push_str(&format!("\n{}:\n", category.description()));
            for name in groups[category].iter().sorted() {
                if let Some(line) = self.help(name) {
                    text.push_str(&line);
                    text.push('\n');
                }
            }
        }
        text.push_str("\nOther:\n");
        text.push_str(&format!("  {:<26} - Exit the debugger\n", "quit, exit"));
        text
    }

    fn register_builtins(&mut self) {
        use CommandCategory::*;

        self.register(
            "step",
            no_args(|| StepCommand),
            "Step to the next line, entering calls",
            Navigation,
        );
        self.register(
            "step-over",
            no_args(|| StepOverCommand),
            "Step to the next line, over calls",
            Navigation,
        );
        self.register(
            "step-back",
            no_args(|| StepBackCommand),
            "Step to the previous line, over calls (replay)",
            Navigation,
        );
        self.register(
            "continue",
            no_args(|| ContinueCommand),
            "Continue to the next breakpoint",
            Navigation,
        );

        self.register("back", no_args(|| BackCommand), "Go one recorded step back", History);
        self.register(
            "forward",
            no_args(|| ForwardCommand),
            "Go one recorded step forward",
            History,
        );
        self.register(
            "goto",
            |_, args| {
                let [step] = expect_args::<1>(args, "goto <step>")?;
                Ok(Box::new(GotoCommand { step: parse_number(step, "step")? }) as Box<dyn Command>)
            },
            "Jump to a recorded step",
            History,
        );
        self.register("history", no_args(|| HistoryCommand), "Show the execution history", History);

        self.register("frame", no_args(|| FrameCommand), "Show the current position", Inspection);
        self.register("stack", no_args(|| StackCommand), "Show the call stack", Inspection);
        self.register("sender", no_args(|| SenderCommand), "Show the calling frame", Inspection);
        self.register("method", no_args(|| MethodCommand), "Show the current method", Inspection);

        self.register(
            "temporaries",
            no_args(|| TemporariesCommand),
            "Show local variables",
            Variables,
        );
        self.register(
            "arguments",
            no_args(|| ArgumentsCommand),
            "Show method arguments",
            Variables,
        );
        self.register(
            "receiver",
            no_args(|| ReceiverCommand),
            "Show the receiver (this)",
            Variables,
        );
        self.register(
            "receiver-variables",
            no_args(|| ReceiverVariablesCommand),
            "Show the receiver's fields",
            Variables,
        );
        self.register(
            "print-var",
            |_, args| {
                let [name] = expect_args::<1>(args, "print-var <name>")?;
                Ok(Box::new(PrintVarCommand { name: name.to_string() }) as Box<dyn Command>)
            },
            "Print a variable or field",
            Variables,
        );
        self.register("output", no_args(|| OutputCommand), "Show program output so far", Variables);

        self.register(
            "break",
            |_, args| break_command(args, "break <file> <line>", BreakpointKind::Normal),
            "Set a breakpoint",
            Breakpoints,
        );
        self.register(
            "break-once",
            |_, args| break_command(args, "break-once <file> <line>", BreakpointKind::Once),
            "Set a one-time breakpoint",
            Breakpoints,
        );
        self.register(
            "break-on-count",
            |_, args| {
                let [file, line, count] =
                    expect_args::<3>(args, "break-on-count <file> <line> <count>")?;
                let kind = BreakpointKind::OnCount(parse_number(count, "count")?);
                Ok(Box::new(BreakCommand { location: location(file, line)?, kind })
                    as Box<dyn Command>)
            },
            "Stop once a line has been hit <count> times",
            Breakpoints,
        );
        self.register(
            "remove-break",
            |_, args| {
                let [file, line] = expect_args::<2>(args, "remove-break <file> <line>")?;
                Ok(Box::new(RemoveBreakCommand { location: location(file, line)? })
                    as Box<dyn Command>)
            },
            "Remove a breakpoint",
            Breakpoints,
        );
        self.register(
            "clear-breaks",
            no_args(|| ClearBreaksCommand),
            "Remove all breakpoints",
            Breakpoints,
        );
        self.register(
            "breakpoints",
            no_args(|| ListBreakpointsCommand),
            "List breakpoints",
            Breakpoints,
        );
        self.register(
            "break-before-method-call",
            |_, args| {
                let [method] = expect_args::<1>(args, "break-before-method-call <method>")?;
                Ok(Box::new(BreakBeforeMethodCommand { method: method.to_string() })
                    as Box<dyn Command>)
            },
            "Stop before a method is entered",
            Breakpoints,
        );

        self.register(
            "help",
            |interpreter, args| {
                let text = match args.first() {
                    Some(name) => interpreter.help(name).ok_or_else(|| {
                        DebuggerError::user_input(format!("Unknown command: {name}"))
                    })?,
                    None => interpreter.full_help(),
                };
                Ok(Box::new(HelpCommand { text }) as Box<dyn Command>)
            },
            "Show help, for one command or all",
            Inspection,
        );
    }
}

/// `help [command]`: carries its text, rendered at parse time.
#[derive(Debug)]
pub struct HelpCommand {
    text: String,
}

impl Command for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn run(
        &self,
        _state: &mut DebuggerState,
        _control: &mut dyn ControlInterface,
    ) -> DebuggerResult<CommandResult> {
        Ok(CommandResult::ok(self.text.clone()))
    }
}

fn no_args<C, F>(
    make: F,
) -> impl Fn(&CommandInterpreter, &[&str]) -> CommandBuild + Send + Sync + 'static
where
    C: Command + 'static,
    F: Fn() -> C + Send + Sync + 'static,
{
    move |_, _| Ok(Box::new(make()) as Box<dyn Command>)
}

fn expect_args<'a, const N: usize>(args: &[&'a str], usage: &str) -> DebuggerResult<[&'a str; N]> {
    <[&'a str; N]>::try_from(args.get(..N).unwrap_or(args))
        .map_err(|_| DebuggerError::user_input(format!("Usage: {usage}")))
}

fn parse_number<T: FromStr>(token: &str, what: &str) -> DebuggerResult<T> {
    token.parse().map_err(|_| {
        DebuggerError::user_input(format!("Invalid {what}: '{token}' is not a number"))
    })
}

fn location(file: &str, line: &str) -> DebuggerResult<BreakpointLocation> {
    Ok(BreakpointLocation::new(file, parse_number(line, "line")?))
}

fn break_command(
    args: &[&str],
    usage: &str,
    kind: BreakpointKind,
) -> DebuggerResult<Box<dyn Command>> {
    let [file, line] = expect_args::<2>(args, usage)?;
    Ok(Box::new(BreakCommand { location: location(file, line)?, kind }))
}
