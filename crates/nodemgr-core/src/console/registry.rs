//! Immutable table of console commands.
//!
//! Names and aliases are case-sensitive. Each entry also knows how to build
//! the clap parser for its flags, so the table is the single description of
//! what the console accepts.

use std::fmt::Write as _;

use clap::{Arg, ArgAction, ColorChoice, value_parser};

/// Global flag selecting JSON output; matched case-insensitively.
pub const JSON_FLAG: &str = "--json";
pub const JSON_FLAG_SHORT: &str = "-j";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Status,
    NetInfo,
    DialPeer,
    PruneBlocks,
    Help,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    String,
    Int,
    Bool,
}

#[derive(Debug)]
pub struct FlagSpec {
    pub name: &'static str,
    pub short: char,
    pub kind: FlagKind,
    pub required: bool,
    pub help: &'static str,
}

impl FlagSpec {
    pub fn long(&self) -> String {
        format!("--{}", self.name)
    }

    fn to_arg(&self) -> Arg {
        let arg = Arg::new(self.name)
            .long(self.name)
            .short(self.short)
            .help(self.help)
            .required(self.required);
        match self.kind {
            FlagKind::String => arg.action(ArgAction::Set).value_parser(value_parser!(String)),
            FlagKind::Int => arg
                .action(ArgAction::Set)
                .value_parser(value_parser!(i64).range(0..)),
            FlagKind::Bool => arg
                .action(ArgAction::Set)
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true")
                .default_value("false")
                .value_parser(value_parser!(bool)),
        }
    }

    fn usage(&self) -> String {
        let value = match self.kind {
            FlagKind::String => "=<string>",
            FlagKind::Int => "=<int>",
            FlagKind::Bool => "",
        };
        let optional = if self.required { "" } else { " (optional)" };
        format!("--{}{value}, -{}{optional}", self.name, self.short)
    }
}

#[derive(Debug)]
pub struct CommandSpec {
    pub kind: CommandKind,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub about: &'static str,
    pub flags: &'static [FlagSpec],
}

impl CommandSpec {
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }

    pub fn flag(&self, name: &str) -> Option<&'static FlagSpec> {
        self.flags.iter().find(|flag| flag.name == name)
    }

    /// Parser for the tokens that follow the command name.
    pub fn parser(&self) -> clap::Command {
        let mut command = clap::Command::new(self.name)
            .no_binary_name(true)
            .about(self.about)
            .color(ColorChoice::Never)
            .disable_version_flag(true)
            .visible_aliases(self.aliases.iter().copied());
        for flag in self.flags {
            command = command.arg(flag.to_arg());
        }
        command
    }

    fn label(&self) -> String {
        let mut label = self.name.to_string();
        for alias in self.aliases {
            label.push_str(", ");
            label.push_str(alias);
        }
        label
    }
}

static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        kind: CommandKind::Status,
        name: "status",
        aliases: &["s"],
        about: "display the current status of the blockchain",
        flags: &[],
    },
    CommandSpec {
        kind: CommandKind::NetInfo,
        name: "net_info",
        aliases: &["ni"],
        about: "display network data",
        flags: &[],
    },
    CommandSpec {
        kind: CommandKind::DialPeer,
        name: "dial_peer",
        aliases: &["dp"],
        about: "connect a new peer",
        flags: &[
            FlagSpec {
                name: "address",
                short: 'a',
                kind: FlagKind::String,
                required: true,
                help: "peer address as <id>@<host>:<port>",
            },
            FlagSpec {
                name: "persistent",
                short: 'p',
                kind: FlagKind::Bool,
                required: false,
                help: "keep reconnecting to the peer",
            },
        ],
    },
    CommandSpec {
        kind: CommandKind::PruneBlocks,
        name: "prune_blocks",
        aliases: &["pb"],
        about: "delete block information",
        flags: &[
            FlagSpec {
                name: "from",
                short: 'f',
                kind: FlagKind::Int,
                required: true,
                help: "first height to delete",
            },
            FlagSpec {
                name: "to",
                short: 't',
                kind: FlagKind::Int,
                required: true,
                help: "last height to delete (inclusive)",
            },
        ],
    },
    CommandSpec {
        kind: CommandKind::Help,
        name: "help",
        aliases: &[],
        about: "show this help message",
        flags: &[],
    },
    CommandSpec {
        kind: CommandKind::Exit,
        name: "exit",
        aliases: &["e"],
        about: "exit the console",
        flags: &[],
    },
];

#[derive(Debug, Clone, Copy)]
pub struct Registry {
    commands: &'static [CommandSpec],
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    pub fn builtin() -> Self {
        Self { commands: COMMANDS }
    }

    pub fn commands(&self) -> &'static [CommandSpec] {
        self.commands
    }

    pub fn lookup(&self, name: &str) -> Option<&'static CommandSpec> {
        self.commands.iter().find(|command| command.matches(name))
    }

    pub fn help_text(&self) -> String {
        let mut text = String::from("Commands:\n");
        for command in self.commands {
            let _ = writeln!(text, "  {:<20}{}", command.label(), command.about);
            for flag in command.flags {
                let _ = writeln!(text, "      {:<30}{}", flag.usage(), flag.help);
            }
        }
        let _ = writeln!(
            text,
            "Add {JSON_FLAG} ({JSON_FLAG_SHORT}) to any command for JSON output."
        );
        text.push_str("Example: status --json");
        text
    }

    /// Completion candidates for the word ending at `pos`: command names for
    /// the first word, otherwise the flags of the typed command not yet used.
    pub fn complete(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let Some(head) = line.get(..pos) else {
            return (pos, Vec::new());
        };
        let start = head
            .char_indices()
            .rev()
            .find(|(_, ch)| ch.is_whitespace())
            .map(|(idx, ch)| idx + ch.len_utf8())
            .unwrap_or(0);
        let word = &head[start..];
        let typed: Vec<&str> = head[..start].split_whitespace().collect();

        let Some(first) = typed.first() else {
            let names = self
                .commands
                .iter()
                .map(|command| command.name)
                .filter(|name| name.starts_with(word))
                .map(str::to_string)
                .collect();
            return (start, names);
        };
        let Some(command) = self.lookup(first) else {
            return (start, Vec::new());
        };
        let used = |long: &str| {
            typed
                .iter()
                .any(|token| *token == long || token.starts_with(&format!("{long}=")))
        };
        let mut candidates: Vec<String> = command
            .flags
            .iter()
            .map(FlagSpec::long)
            .filter(|long| !used(long))
            .collect();
        if !used(JSON_FLAG) {
            candidates.push(JSON_FLAG.to_string());
        }
        candidates.retain(|candidate| candidate.starts_with(word));
        (start, candidates)
    }
}
