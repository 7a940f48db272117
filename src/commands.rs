use std::fmt;

use texter_core::{DVec3, EntityId, SessionId, ToCoordinate, WorldRef, WorldResolver};
use texter_net::SessionTransport;
use texter_server::{LabelBook, WorldSessions};
use texter_store::LabelStore;

/// Separates the title from the body text in `add`.
const TEXT_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CommandError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordArg {
    Absolute(f64),
    Relative(f64),
}

impl CoordArg {
    pub fn resolve(self, base: f64) -> f64 {
        match self {
            Self::Absolute(v) => v,
            Self::Relative(delta) => base + delta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabelCommand {
    Help,
    Add {
        position: DVec3,
        title: String,
        text: String,
    },
    Move {
        id: EntityId,
        x: CoordArg,
        y: CoordArg,
        z: CoordArg,
    },
    /// Raw value so non-numeric input reaches the label unchanged.
    Coordinate {
        id: EntityId,
        axis: Axis,
        value: String,
    },
    Title {
        id: EntityId,
        title: String,
    },
    Text {
        id: EntityId,
        text: String,
    },
    Invisible {
        id: EntityId,
        invisible: bool,
    },
    World {
        id: EntityId,
        name: String,
    },
    Remove {
        id: EntityId,
    },
    List {
        world: Option<String>,
    },
    Join {
        session: SessionId,
        world: String,
    },
    Leave {
        session: SessionId,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub lines: Vec<String>,
}

impl CommandOutput {
    fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }
}

fn missing_label(id: EntityId) -> CommandOutput {
    CommandOutput::default().line(format!("Error: no label with id {id}"))
}

pub fn execute_command<S, T>(
    book: &mut LabelBook<S, WorldSessions, T>,
    default_world: &WorldRef,
    cmd: LabelCommand,
) -> CommandOutput
where
    S: LabelStore,
    T: SessionTransport,
{
    let out = CommandOutput::default();
    match cmd {
        LabelCommand::Help => CommandOutput { lines: help_lines() },
        LabelCommand::Add {
            position,
            title,
            text,
        } => match book.spawn(default_world.clone(), position, &title, &text) {
            Ok(id) => out.line(format!("Added label {id} in {}", default_world.name())),
            Err(err) => out.line(format!("Error: {err}")),
        },
        LabelCommand::Move { id, x, y, z } => {
            let moved = book.edit(id, |label| {
                let base = label.position();
                let target = DVec3::new(x.resolve(base.x), y.resolve(base.y), z.resolve(base.z));
                label.set_position(target);
                label.position()
            });
            match moved {
                Some(pos) => out.line(format!(
                    "Label {id} at {:.1} {:.1} {:.1}",
                    pos.x, pos.y, pos.z
                )),
                None => missing_label(id),
            }
        }
        LabelCommand::Coordinate { id, axis, value } => {
            if value.as_str().to_coordinate().is_none() {
                return out.line(format!("Ignored non-numeric coordinate: {value}"));
            }
            let moved = book.edit(id, |label| {
                match axis {
                    Axis::X => label.set_x(value.as_str()),
                    Axis::Y => label.set_y(value.as_str()),
                    Axis::Z => label.set_z(value.as_str()),
                };
                label.position()
            });
            match moved {
                Some(pos) => out.line(format!(
                    "Label {id} at {:.1} {:.1} {:.1}",
                    pos.x, pos.y, pos.z
                )),
                None => missing_label(id),
            }
        }
        LabelCommand::Title { id, title } => {
            match book.edit(id, |label| label.set_title(&title).title().to_string()) {
                Some(title) => out.line(format!("Label {id} title: {}", title.escape_debug())),
                None => missing_label(id),
            }
        }
        LabelCommand::Text { id, text } => {
            match book.edit(id, |label| label.set_text(&text).text().to_string()) {
                Some(text) => out.line(format!("Label {id} text: {}", text.escape_debug())),
                None => missing_label(id),
            }
        }
        LabelCommand::Invisible { id, invisible } => {
            match book.edit(id, |label| label.set_invisible(invisible).is_invisible()) {
                Some(invisible) => out.line(format!("Label {id} invisible: {invisible}")),
                None => missing_label(id),
            }
        }
        LabelCommand::World { id, name } => {
            let known = book.sync().observers().world_by_name(&name).is_some();
            match book.edit(id, |label| label.set_world_by_name(&name).world().to_string()) {
                Some(world) if known => out.line(format!("Label {id} now in {world}")),
                Some(_) => out.line(format!("Error: unknown world {name}")),
                None => missing_label(id),
            }
        }
        LabelCommand::Remove { id } => match book.remove(id) {
            Some(_) => out.line(format!("Removed label {id}")),
            None => missing_label(id),
        },
        LabelCommand::List { world } => {
            let filter = match world {
                Some(name) => match book.sync().observers().world_by_name(&name) {
                    Some(world) => Some(world.id()),
                    None => return out.line(format!("Error: unknown world {name}")),
                },
                None => None,
            };
            let mut out = out;
            for label in book
                .labels()
                .filter(|label| filter.map_or(true, |world| label.world().id() == world))
            {
                out.lines.push(format!(
                    "#{} {} ({:.1}, {:.1}, {:.1}) {}",
                    label.entity_id(),
                    label.world().name(),
                    label.x(),
                    label.y(),
                    label.z(),
                    label.title().escape_debug()
                ));
            }
            if out.lines.is_empty() {
                out.lines.push("No labels".to_string());
            }
            out
        }
        LabelCommand::Join { session, world } => match book.move_session(session, &world) {
            Ok(world) => out.line(format!("{session} now viewing {}", world.name())),
            Err(err) => out.line(format!("Error: {err}")),
        },
        LabelCommand::Leave { session } => match book.leave(session) {
            Some(_) => out.line(format!("{session} left")),
            None => out.line(format!("Error: {session} is not connected")),
        },
    }
}

pub fn parse_command(input: &str) -> Result<LabelCommand, CommandError> {
    let input = input.trim();
    let input = input.strip_prefix('/').unwrap_or(input).trim();
    if input.is_empty() {
        return Ok(LabelCommand::Help);
    }

    let (head, rest) = take_tokens(input, 1);
    let cmd = head
        .first()
        .ok_or_else(|| CommandError::new("Missing command"))?
        .to_ascii_lowercase();

    match cmd.as_str() {
        "help" | "?" => Ok(LabelCommand::Help),
        "add" => {
            let (coords, rest) = take_tokens(rest, 3);
            if coords.len() != 3 || rest.is_empty() {
                return Err(CommandError::new("Usage: add <x> <y> <z> <title>[|text]"));
            }
            let position = DVec3::new(
                parse_absolute(coords[0])?,
                parse_absolute(coords[1])?,
                parse_absolute(coords[2])?,
            );
            let (title, text) = rest.split_once(TEXT_SEPARATOR).unwrap_or((rest, ""));
            Ok(LabelCommand::Add {
                position,
                title: title.trim().to_string(),
                text: text.trim().to_string(),
            })
        }
        "move" | "tp" => {
            let (args, rest) = take_tokens(rest, 4);
            if args.len() != 4 || !rest.is_empty() {
                return Err(CommandError::new("Usage: move <id> <x> <y> <z>"));
            }
            Ok(LabelCommand::Move {
                id: parse_id(args[0])?,
                x: parse_coord(args[1])?,
                y: parse_coord(args[2])?,
                z: parse_coord(args[3])?,
            })
        }
        "x" | "y" | "z" => {
            let axis = match cmd.as_str() {
                "x" => Axis::X,
                "y" => Axis::Y,
                _ => Axis::Z,
            };
            let (args, value) = take_tokens(rest, 1);
            if args.len() != 1 || value.is_empty() {
                return Err(CommandError::new(format!("Usage: {cmd} <id> <value>")));
            }
            Ok(LabelCommand::Coordinate {
                id: parse_id(args[0])?,
                axis,
                value: value.to_string(),
            })
        }
        "title" => {
            let (args, title) = take_tokens(rest, 1);
            if args.len() != 1 {
                return Err(CommandError::new("Usage: title <id> <title>"));
            }
            Ok(LabelCommand::Title {
                id: parse_id(args[0])?,
                title: title.to_string(),
            })
        }
        "text" => {
            let (args, text) = take_tokens(rest, 1);
            if args.len() != 1 {
                return Err(CommandError::new("Usage: text <id> [text]"));
            }
            Ok(LabelCommand::Text {
                id: parse_id(args[0])?,
                text: text.to_string(),
            })
        }
        "invisible" => {
            let (args, rest) = take_tokens(rest, 2);
            if args.len() != 2 || !rest.is_empty() {
                return Err(CommandError::new("Usage: invisible <id> <on|off>"));
            }
            Ok(LabelCommand::Invisible {
                id: parse_id(args[0])?,
                invisible: parse_toggle(args[1])?,
            })
        }
        "world" => {
            let (args, rest) = take_tokens(rest, 2);
            if args.len() != 2 || !rest.is_empty() {
                return Err(CommandError::new("Usage: world <id> <name>"));
            }
            Ok(LabelCommand::World {
                id: parse_id(args[0])?,
                name: args[1].to_string(),
            })
        }
        "remove" | "rm" => {
            let (args, rest) = take_tokens(rest, 1);
            if args.len() != 1 || !rest.is_empty() {
                return Err(CommandError::new("Usage: remove <id>"));
            }
            Ok(LabelCommand::Remove {
                id: parse_id(args[0])?,
            })
        }
        "list" | "ls" => {
            let (args, rest) = take_tokens(rest, 1);
            if !rest.is_empty() {
                return Err(CommandError::new("Usage: list [world]"));
            }
            Ok(LabelCommand::List {
                world: args.first().map(|name| name.to_string()),
            })
        }
        "join" => {
            let (args, rest) = take_tokens(rest, 2);
            if args.len() != 2 || !rest.is_empty() {
                return Err(CommandError::new("Usage: join <session> <world>"));
            }
            Ok(LabelCommand::Join {
                session: parse_session(args[0])?,
                world: args[1].to_string(),
            })
        }
        "leave" => {
            let (args, rest) = take_tokens(rest, 1);
            if args.len() != 1 || !rest.is_empty() {
                return Err(CommandError::new("Usage: leave <session>"));
            }
            Ok(LabelCommand::Leave {
                session: parse_session(args[0])?,
            })
        }
        _ => Err(CommandError::new(format!("Unknown command: {cmd}. Try help"))),
    }
}

/// Split off up to `count` whitespace-separated tokens; the remainder keeps
/// its inner spacing.
fn take_tokens(input: &str, count: usize) -> (Vec<&str>, &str) {
    let mut tokens = Vec::with_capacity(count);
    let mut rest = input.trim_start();
    while tokens.len() < count && !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        tokens.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    (tokens, rest.trim_end())
}

fn parse_id(s: &str) -> Result<EntityId, CommandError> {
    s.trim_start_matches('#')
        .parse::<EntityId>()
        .map_err(|_| CommandError::new(format!("Invalid label id: {s}")))
}

fn parse_session(s: &str) -> Result<SessionId, CommandError> {
    s.strip_prefix("session-")
        .unwrap_or(s)
        .parse::<u64>()
        .map(SessionId)
        .map_err(|_| CommandError::new(format!("Invalid session: {s}")))
}

fn parse_absolute(s: &str) -> Result<f64, CommandError> {
    s.to_coordinate()
        .ok_or_else(|| CommandError::new(format!("Invalid coordinate: {s}")))
}

fn parse_coord(s: &str) -> Result<CoordArg, CommandError> {
    if let Some(rest) = s.strip_prefix('~') {
        if rest.is_empty() {
            return Ok(CoordArg::Relative(0.0));
        }
        let delta = rest
            .to_coordinate()
            .ok_or_else(|| CommandError::new(format!("Invalid relative coordinate: {s}")))?;
        return Ok(CoordArg::Relative(delta));
    }
    parse_absolute(s).map(CoordArg::Absolute)
}

fn parse_toggle(s: &str) -> Result<bool, CommandError> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(CommandError::new(format!("Expected on/off, got {s}"))),
    }
}

fn help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  help".to_string(),
        "  add <x> <y> <z> <title>[|text]   ('#' starts a new line)".to_string(),
        "  move <id> <x> <y> <z>            (supports ~offset)".to_string(),
        "  x|y|z <id> <value>".to_string(),
        "  title <id> <title>".to_string(),
        "  text <id> [text]".to_string(),
        "  invisible <id> <on|off>".to_string(),
        "  world <id> <name>".to_string(),
        "  remove <id>".to_string(),
        "  list [world]".to_string(),
        "  join <session> <world>".to_string(),
        "  leave <session>".to_string(),
    ]
}
