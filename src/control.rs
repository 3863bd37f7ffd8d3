// Control thread - line-oriented access to any instance
//
// A line is either a context command (`switch 2`, `list`, `start`, `stop 2`)
// or `key=value` tokens describing one CommandBlock:
//
//   part=0 control=0 value=100 type=write
//   part=main control=0 type=max
//   part=insefx kit=3 control=0 engine=1 type=read
//
// The current instance is local state of the context, looked up through the
// manager on every line.

use crate::instance::{InstanceError, InstanceManager};
use crate::interchange::SendError;
use crate::messaging::channels::NotificationConsumer;
use crate::messaging::command::{CommandBlock, LimitRequest, UNUSED, kind};
use crate::messaging::controls::section;
use crate::messaging::text_msg::NO_MSG;
use ringbuf::traits::Consumer;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error("Instance {0} is not running")]
    NotReady(u32),

    #[error("No reply from instance {0}")]
    NoReply(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Read,
    Write,
    Limit(LimitRequest),
}

pub struct ControlContext {
    manager: Arc<InstanceManager>,
    current: u32,
    notifications: Option<NotificationConsumer>,
}

impl ControlContext {
    pub fn new(manager: Arc<InstanceManager>) -> Self {
        Self {
            manager,
            current: 0,
            notifications: None,
        }
    }

    /// Print pending notifications before each prompt
    pub fn with_notifications(mut self, notifications: NotificationConsumer) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    /// Read lines until EOF, `exit`, or the primary instance stopping
    pub fn run(&mut self, input: impl BufRead, mut output: impl Write) -> Result<(), ControlError> {
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if matches!(line, "exit" | "quit") || !self.manager.is_running() {
                break;
            }
            if !line.is_empty() {
                match self.execute(line) {
                    Ok(text) => writeln!(output, "{}", text)?,
                    Err(e) => writeln!(output, "{}", e)?,
                }
            }
            self.print_notifications(&mut output)?;
        }
        Ok(())
    }

    fn print_notifications(&mut self, output: &mut impl Write) -> Result<(), ControlError> {
        let Some(rx) = self.notifications.as_mut() else {
            return Ok(());
        };
        while let Some(notification) = rx.try_pop() {
            writeln!(output, "{}", notification)?;
        }
        Ok(())
    }

    /// Run one line and return what to show
    pub fn execute(&mut self, line: &str) -> Result<String, ControlError> {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("switch") => {
                let id = parse_id(words.next())?;
                if self.manager.get(id).is_none() {
                    return Err(InstanceError::UnknownId(id).into());
                }
                self.current = id;
                Ok(format!("Instance {}", id))
            }
            Some("list") => Ok(self
                .manager
                .ids()
                .into_iter()
                .filter_map(|id| self.manager.get(id))
                .map(|i| {
                    let marker = if i.id() == self.current { "*" } else { " " };
                    format!("{}{} {}", marker, i.id(), i.state())
                })
                .collect::<Vec<_>>()
                .join("\n")),
            Some("start") => {
                let wanted = words.next().map(|w| parse_id(Some(w))).transpose()?;
                let id = self.manager.request_new_instance(wanted)?;
                Ok(format!("Instance {} starting", id))
            }
            Some("stop") => {
                let id = parse_id(words.next())?;
                self.manager.request_stop(id)?;
                Ok(format!("Instance {} stopping", id))
            }
            _ => {
                let (block, text) = parse_block(line)?;
                self.send(block, text.as_deref())
            }
        }
    }

    fn send(&mut self, block: CommandBlock, text: Option<&str>) -> Result<String, ControlError> {
        let id = self.current;
        let instance = self.manager.get(id).ok_or(InstanceError::UnknownId(id))?;
        if !instance.is_running() {
            return Err(ControlError::NotReady(id));
        }
        instance
            .with_cli(|cli| -> Result<String, ControlError> {
                let immediate = match text {
                    Some(text) => cli.send_text(block, text)?,
                    None => cli.send(block)?,
                };
                let reply = match immediate {
                    Some(reply) => reply,
                    None => cli.wait_reply(REPLY_TIMEOUT).ok_or(ControlError::NoReply(id))?,
                };
                let text = if reply.miscmsg != NO_MSG && reply.miscmsg != UNUSED {
                    Some(cli.reply_text(&reply))
                } else {
                    None
                };
                Ok(format_reply(&reply, text.as_deref()))
            })
            .ok_or(ControlError::NotReady(id))?
    }
}

fn parse_id(word: Option<&str>) -> Result<u32, ControlError> {
    let word = word.ok_or_else(|| ControlError::Parse("missing instance id".to_string()))?;
    word.parse()
        .map_err(|_| ControlError::Parse(format!("bad instance id '{}'", word)))
}

/// Decimal, 0x hex, or a section name for `part`
fn parse_byte(key: &str, value: &str) -> Result<u8, ControlError> {
    let named = match (key, value) {
        ("part", "main") => Some(section::MAIN),
        ("part", "sysefx") => Some(section::SYSTEM_EFFECTS),
        ("part", "insefx") => Some(section::INSERT_EFFECTS),
        ("part", "config") => Some(section::CONFIG),
        ("part", "midi") => Some(section::MIDI_IN),
        (_, "unused") => Some(UNUSED),
        _ => None,
    };
    if let Some(byte) = named {
        return Ok(byte);
    }
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| ControlError::Parse(format!("bad value for {}: '{}'", key, value)))
}

/// Build the block described by `key=value` tokens, plus any text it carries
pub fn parse_block(line: &str) -> Result<(CommandBlock, Option<String>), ControlError> {
    let mut block = CommandBlock::default();
    let mut request = Request::Read;
    let mut text = None;
    let mut control = None;

    for token in line.split_whitespace() {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| ControlError::Parse(format!("expected key=value, got '{}'", token)))?;
        match key {
            "control" => control = Some(parse_byte(key, value)?),
            "part" => block.part = parse_byte(key, value)?,
            "kit" => block.kit = parse_byte(key, value)?,
            "engine" => block.engine = parse_byte(key, value)?,
            "insert" => block.insert = parse_byte(key, value)?,
            "parameter" => block.parameter = parse_byte(key, value)?,
            "offset" => block.offset = parse_byte(key, value)?,
            "value" => {
                block.value = value
                    .parse()
                    .map_err(|_| ControlError::Parse(format!("bad value '{}'", value)))?;
            }
            "type" => {
                request = match value {
                    "read" => Request::Read,
                    "write" => Request::Write,
                    "min" => Request::Limit(LimitRequest::Minimum),
                    "max" => Request::Limit(LimitRequest::Maximum),
                    "default" => Request::Limit(LimitRequest::Default),
                    other => return Err(ControlError::Parse(format!("unknown type '{}'", other))),
                }
            }
            "text" | "name" => text = Some(value.replace('_', " ")),
            other => return Err(ControlError::Parse(format!("unknown key '{}'", other))),
        }
    }

    block.control = control.ok_or_else(|| ControlError::Parse("missing control".to_string()))?;
    if block.part == UNUSED {
        return Err(ControlError::Parse("missing part".to_string()));
    }
    block.kind = match request {
        Request::Read => kind::READ,
        Request::Write => kind::WRITE,
        Request::Limit(limit) => kind::LIMITS | limit.bits(),
    };
    Ok((block, text))
}

/// `value` with integer rounding when the reply is tagged Integer
pub fn format_reply(reply: &CommandBlock, text: Option<&str>) -> String {
    if reply.has_error() {
        return "Error".to_string();
    }
    let mut out = if reply.is_integer() {
        format!("{}", reply.int_value())
    } else {
        format!("{:.3}", reply.value)
    };
    if reply.is_learnable() {
        out.push_str(" (learnable)");
    }
    if let Some(text) = text.filter(|t| !t.is_empty()) {
        out.push_str(&format!(" \"{}\"", text));
    }
    out
}
