//! The command table.
//!
//! Every entry point (the connection loop, direct callers of
//! [`CommandHandler::dispatch`]) resolves operation names here, so all of them
//! see the same commands with the same arity rules.

use crate::commands::handler::{CommandError, CommandHandler};
use crate::protocol::RespValue;

/// Signature shared by all command implementations. `args` excludes the
/// operation name.
pub type CommandFn = fn(&CommandHandler, &[String]) -> Result<RespValue, CommandError>;

/// Number of arguments a command accepts, not counting its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range { min: usize, max: usize },
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(expected) => n == expected,
            Arity::Range { min, max } => (min..=max).contains(&n),
        }
    }
}

#[derive(Clone, Copy)]
pub struct CommandSpec {
    /// Upper-case operation name
    pub name: &'static str,
    pub arity: Arity,
    pub handler: CommandFn,
}

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "PING",
        arity: Arity::Range { min: 0, max: 1 },
        handler: CommandHandler::cmd_ping,
    },
    CommandSpec {
        name: "ECHO",
        arity: Arity::Exact(1),
        handler: CommandHandler::cmd_echo,
    },
    CommandSpec {
        name: "GET",
        arity: Arity::Exact(1),
        handler: CommandHandler::cmd_get,
    },
    CommandSpec {
        name: "SET",
        arity: Arity::Exact(2),
        handler: CommandHandler::cmd_set,
    },
    CommandSpec {
        name: "DEL",
        arity: Arity::Exact(1),
        handler: CommandHandler::cmd_del,
    },
    CommandSpec {
        name: "EXPIRE",
        arity: Arity::Exact(2),
        handler: CommandHandler::cmd_expire,
    },
    CommandSpec {
        name: "EXISTS",
        arity: Arity::Exact(1),
        handler: CommandHandler::cmd_exists,
    },
    CommandSpec {
        name: "TTL",
        arity: Arity::Exact(1),
        handler: CommandHandler::cmd_ttl,
    },
    CommandSpec {
        name: "PERSIST",
        arity: Arity::Exact(1),
        handler: CommandHandler::cmd_persist,
    },
];

/// Finds a command by name, ignoring ASCII case.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        assert_eq!(lookup("get").map(|c| c.name), Some("GET"));
        assert_eq!(lookup("PeRsIsT").map(|c| c.name), Some("PERSIST"));
        assert!(lookup("FLUSHALL").is_none());
    }

    #[test]
    fn test_arity() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(1));
        let ping = Arity::Range { min: 0, max: 1 };
        assert!(ping.accepts(0) && ping.accepts(1) && !ping.accepts(2));
    }

    #[test]
    fn test_names_are_unique_and_upper_case() {
        for (i, spec) in COMMANDS.iter().enumerate() {
            assert_eq!(spec.name, spec.name.to_ascii_uppercase());
            assert!(COMMANDS[i + 1..].iter().all(|other| other.name != spec.name));
        }
    }
}
