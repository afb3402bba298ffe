//! Request/response control surface.
//!
//! Everything a controller can do to an injector is a [`Request`]: listing
//! points, managing groups and membership, and reading or writing one
//! attribute of one fault kind.  Requests come either as JSON (serde) or
//! as one-line text commands:
//!
//! ```text
//! list                                 all fault points
//! create <id>                          create group <id>
//! next-free                            lowest unused group id
//! delete <id>                          delete group <id>
//! <id>/list                            members of group <id>
//! <id>/add <address>                   add a point to group <id>
//! <id>/del <address>                   remove a point from group <id>
//! read <id>/<kind>/<attribute>         read one attribute
//! write <id>/<kind>/<attribute> <v>    write one attribute
//! report                               statistics for every group
//! reset                                delete every group
//! ```
//!
//! Booleans read back as `Y`/`N`; writes also accept `1`/`0`, `true`/`false`
//! and `on`/`off`.

use crate::config::{FaultConfig, FaultKind};
use crate::error::{FaultError, Result};
use crate::group::GroupId;
use crate::injector::{FaultInjector, InjectorReport};
use crate::point::FaultPointInfo;
use crate::site::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One attribute of a fault kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Enabled,
    Hits,
    Injected,
    Times,
    Probability,
    Interval,
    TaskFilter,
    DelayUs,
    Errors,
}

impl Attribute {
    pub const ALL: [Attribute; 9] = [
        Attribute::Enabled,
        Attribute::Hits,
        Attribute::Injected,
        Attribute::Times,
        Attribute::Probability,
        Attribute::Interval,
        Attribute::TaskFilter,
        Attribute::DelayUs,
        Attribute::Errors,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Attribute::Enabled => "enabled",
            Attribute::Hits => "hits",
            Attribute::Injected => "injected",
            Attribute::Times => "times",
            Attribute::Probability => "probability",
            Attribute::Interval => "interval",
            Attribute::TaskFilter => "task_filter",
            Attribute::DelayUs => "delay_us",
            Attribute::Errors => "errors",
        }
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, Attribute::Hits | Attribute::Injected)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Attribute {
    type Err = FaultError;

    fn from_str(s: &str) -> Result<Self> {
        Attribute::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| FaultError::UnknownAttribute(s.to_string()))
    }
}

/// A control operation.  Group ids and addresses are carried raw and
/// validated when the request is handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    ListFaultPoints,
    CreateGroup {
        group: i64,
    },
    NextFreeId,
    DeleteGroup {
        group: i64,
    },
    GroupFaultPoints {
        group: i64,
    },
    AddFaultPoint {
        group: i64,
        address: String,
    },
    DelFaultPoint {
        group: i64,
        address: String,
    },
    Read {
        group: i64,
        kind: FaultKind,
        attribute: Attribute,
    },
    Write {
        group: i64,
        kind: FaultKind,
        attribute: Attribute,
        value: String,
    },
    Report,
    Reset,
}

impl Request {
    /// Parse a text command.
    pub fn parse(line: &str) -> Result<Request> {
        let line = line.trim();
        let malformed = || FaultError::MalformedCommand(line.to_string());
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let request = match command {
            "list" if rest.is_empty() => Request::ListFaultPoints,
            "next-free" if rest.is_empty() => Request::NextFreeId,
            "report" if rest.is_empty() => Request::Report,
            "reset" if rest.is_empty() => Request::Reset,
            "create" => Request::CreateGroup {
                group: parse_group(rest)?,
            },
            "delete" => Request::DeleteGroup {
                group: parse_group(rest)?,
            },
            "read" => {
                let (group, kind, attribute) = parse_path(line, rest)?;
                Request::Read {
                    group,
                    kind,
                    attribute,
                }
            }
            "write" => {
                let (path, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let (group, kind, attribute) = parse_path(line, path)?;
                Request::Write {
                    group,
                    kind,
                    attribute,
                    value: value.trim().to_string(),
                }
            }
            _ => {
                let (group, verb) = command.split_once('/').ok_or_else(malformed)?;
                let group = parse_group(group)?;
                match verb {
                    "list" if rest.is_empty() => Request::GroupFaultPoints { group },
                    "add" if !rest.is_empty() => Request::AddFaultPoint {
                        group,
                        address: rest.to_string(),
                    },
                    "del" if !rest.is_empty() => Request::DelFaultPoint {
                        group,
                        address: rest.to_string(),
                    },
                    "add" | "del" => return Err(FaultError::EmptyInput("address")),
                    _ => return Err(malformed()),
                }
            }
        };
        Ok(request)
    }
}

impl FromStr for Request {
    type Err = FaultError;

    fn from_str(s: &str) -> Result<Self> {
        Request::parse(s)
    }
}

fn parse_group(text: &str) -> Result<i64> {
    if text.is_empty() {
        return Err(FaultError::EmptyInput("group"));
    }
    text.parse().map_err(|_| FaultError::MalformedValue {
        attribute: "group".to_string(),
        input: text.to_string(),
    })
}

/// `<group>/<kind>/<attribute>`.
fn parse_path(line: &str, path: &str) -> Result<(i64, FaultKind, Attribute)> {
    let parts: Vec<&str> = path.split('/').collect();
    let [group, kind, attribute] = parts[..] else {
        return Err(FaultError::MalformedCommand(line.to_string()));
    };
    Ok((parse_group(group)?, kind.parse()?, attribute.parse()?))
}

/// Result of a handled [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Response {
    Listing(Vec<FaultPointInfo>),
    Group(GroupId),
    Value(String),
    Done,
    Report(InjectorReport),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Listing(rows) => {
                for row in rows {
                    writeln!(f, "{row}")?;
                }
                Ok(())
            }
            Response::Group(id) => write!(f, "{id}"),
            Response::Value(value) => f.write_str(value),
            Response::Done => f.write_str("ok"),
            Response::Report(report) => {
                writeln!(f, "seed {} points {}", report.seed, report.points)?;
                for group in &report.groups {
                    for stats in &group.kinds {
                        writeln!(
                            f,
                            "group {:>3} {:<5} enabled={} hits={} injected={} times={}",
                            group.id,
                            stats.kind,
                            render_bool(stats.enabled),
                            stats.hits,
                            stats.injected,
                            stats.times
                        )?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn render_bool(value: bool) -> &'static str {
    if value {
        "Y"
    } else {
        "N"
    }
}

fn parse_bool(attribute: Attribute, text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "y" | "1" | "true" | "on" => Ok(true),
        "n" | "0" | "false" | "off" => Ok(false),
        _ => Err(malformed_value(attribute, text)),
    }
}

fn parse_number<T: FromStr>(attribute: Attribute, text: &str) -> Result<T> {
    text.parse().map_err(|_| malformed_value(attribute, text))
}

fn malformed_value(attribute: Attribute, text: &str) -> FaultError {
    FaultError::MalformedValue {
        attribute: attribute.name().to_string(),
        input: text.to_string(),
    }
}

fn read_attribute(config: &FaultConfig, attribute: Attribute) -> Result<String> {
    let unsupported = || FaultError::UnsupportedAttribute {
        kind: config.kind(),
        attribute: attribute.name(),
    };
    Ok(match attribute {
        Attribute::Enabled => render_bool(config.is_enabled()).to_string(),
        Attribute::Hits => config.hits().to_string(),
        Attribute::Injected => config.injected().to_string(),
        Attribute::Times => config.times().to_string(),
        Attribute::Probability => config.probability().to_string(),
        Attribute::Interval => config.interval().to_string(),
        Attribute::TaskFilter => render_bool(config.task_filter()).to_string(),
        Attribute::DelayUs => config.delay_us().ok_or_else(unsupported)?.to_string(),
        Attribute::Errors => config.errors().ok_or_else(unsupported)?.render(),
    })
}

/// Apply a write to any attribute except `enabled`, which needs the
/// injector to re-arm members.
fn write_attribute(config: &FaultConfig, attribute: Attribute, value: &str) -> Result<()> {
    match attribute {
        Attribute::Times => config.set_times(parse_number(attribute, value)?),
        Attribute::Probability => config.set_probability(parse_number(attribute, value)?),
        Attribute::Interval => config.set_interval(parse_number(attribute, value)?),
        Attribute::TaskFilter => {
            config.set_task_filter(parse_bool(attribute, value)?);
            Ok(())
        }
        Attribute::DelayUs => config.set_delay_us(parse_number(attribute, value)?),
        Attribute::Errors => config.set_errors(value),
        Attribute::Enabled | Attribute::Hits | Attribute::Injected => {
            Err(FaultError::ReadOnly(attribute.name()))
        }
    }
}

impl FaultInjector {
    /// Carry out one control request.
    pub fn handle(&self, request: Request) -> Result<Response> {
        match request {
            Request::ListFaultPoints => Ok(Response::Listing(self.list_fault_points().collect())),
            Request::CreateGroup { group } => self.create_group(group).map(Response::Group),
            Request::NextFreeId => self.next_free_id().map(Response::Group),
            Request::DeleteGroup { group } => {
                self.delete_group(GroupId::new(group)?)?;
                Ok(Response::Done)
            }
            Request::GroupFaultPoints { group } => self
                .group_fault_points(GroupId::new(group)?)
                .map(Response::Listing),
            Request::AddFaultPoint { group, address } => {
                let group = GroupId::new(group)?;
                self.add_fault_point(group, address.parse::<Address>()?)?;
                Ok(Response::Done)
            }
            Request::DelFaultPoint { group, address } => {
                let group = GroupId::new(group)?;
                self.del_fault_point(group, address.parse::<Address>()?)?;
                Ok(Response::Done)
            }
            Request::Read {
                group,
                kind,
                attribute,
            } => {
                let group = self.group(GroupId::new(group)?)?;
                read_attribute(group.config(kind), attribute).map(Response::Value)
            }
            Request::Write {
                group,
                kind,
                attribute,
                value,
            } => {
                let group = GroupId::new(group)?;
                let value = value.trim();
                if attribute.is_read_only() {
                    return Err(FaultError::ReadOnly(attribute.name()));
                }
                if value.is_empty() && attribute != Attribute::Errors {
                    return Err(FaultError::EmptyInput(attribute.name()));
                }
                if attribute == Attribute::Enabled {
                    self.set_enabled(group, kind, parse_bool(attribute, value)?)?;
                } else {
                    self.configure(group, kind, |config| {
                        write_attribute(config, attribute, value)
                    })?;
                }
                Ok(Response::Done)
            }
            Request::Report => Ok(Response::Report(self.report())),
            Request::Reset => {
                self.reset();
                Ok(Response::Done)
            }
        }
    }

    /// Parse and carry out a text command.
    pub fn execute(&self, line: &str) -> Result<Response> {
        self.handle(Request::parse(line)?)
    }
}
