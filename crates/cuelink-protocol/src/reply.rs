//! Interpretation of inbound datagrams.
//!
//! QLab sends two kinds of packets back:
//!
//! - **replies** (`/reply/<query address>`) whose payload embeds a JSON
//!   object such as `{"workspace_id": "...", "status": "ok", "data": [...]}`
//! - **updates** (`/update/workspace/{id}/...`) pushed whenever something
//!   changes, optionally carrying one string argument
//!
//! Nothing on the wire ties a reply to the query that caused it, so
//! replies are classified by the shape of their `data`. All of that shape
//! sniffing lives in this module.

use cuelink_core::Cue;
use serde_json::{Map, Value};
use tracing::trace;

use crate::address::{REPLY_PREFIX, UPDATE_PREFIX};
use crate::error::{DecodeError, DecodeResult};
use crate::osc::{extract_json, extract_update_argument, split_packet};

/// Whether an address is a reply or an update notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Answer to a query.
    Reply,
    /// Unsolicited change notification.
    Update,
}

/// Classifies a packet address.
///
/// Anything outside the update tree is treated as a reply.
pub fn classify(address: &str) -> MessageKind {
    let is_update = address
        .strip_prefix(UPDATE_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
    if is_update {
        MessageKind::Update
    } else {
        MessageKind::Reply
    }
}

/// One entry of the workspace listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSummary {
    pub id: String,
    pub display_name: Option<String>,
    pub has_passcode: Option<bool>,
    pub version: Option<String>,
}

/// One entry of a cue-list listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueListSummary {
    pub id: String,
    pub name: Option<String>,
}

/// What a reply's payload turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyData {
    /// Workspace listing; the first entry is the one to drive.
    Workspaces(Vec<WorkspaceSummary>),
    /// Cue lists of a workspace; the first entry is the main list.
    CueLists(Vec<CueListSummary>),
    /// Full children of a cue list, in playback order.
    Cues(Vec<Cue>),
    /// Cue at the playhead; `None` when nothing is there.
    PlaybackPosition(Option<String>),
    /// Answer to an authentication attempt.
    Authentication { accepted: bool },
    /// Server refused or failed the query.
    Rejected { status: String },
    /// Valid JSON of a shape this client does not track.
    Unrecognized,
}

/// A decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Address of the query this answers, without the `/reply` prefix.
    pub address: String,
    /// Workspace the reply came from, when the server says so.
    pub workspace_id: Option<String>,
    /// The classified payload.
    pub data: ReplyData,
}

/// A decoded update notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// The playhead of a cue list moved; `cue_id` is `None` when cleared.
    PlaybackPosition {
        workspace_id: String,
        cue_list_id: String,
        cue_id: Option<String>,
    },
    /// Something in the workspace changed (cues added, removed, reordered).
    WorkspaceChanged { workspace_id: String },
    /// A single cue's properties changed.
    CueChanged { workspace_id: String, cue_id: String },
    /// The server is closing the session.
    Disconnect { workspace_id: String },
    /// An update this client does not act on.
    Other { address: String },
}

impl Update {
    /// Workspace the update concerns, if it names one.
    pub fn workspace_id(&self) -> Option<&str> {
        match self {
            Self::PlaybackPosition { workspace_id, .. }
            | Self::WorkspaceChanged { workspace_id }
            | Self::CueChanged { workspace_id, .. }
            | Self::Disconnect { workspace_id } => Some(workspace_id),
            Self::Other { .. } => None,
        }
    }
}

/// A decoded inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Reply(Reply),
    Update(Update),
}

/// Decodes and classifies one inbound datagram.
///
/// # Errors
///
/// Fails when the packet has no address, or when a reply carries no
/// parsable JSON object. Unknown but well-formed shapes are not errors;
/// they come back as [`ReplyData::Unrecognized`] or [`Update::Other`].
pub fn interpret(raw: &[u8]) -> DecodeResult<Inbound> {
    let (address, payload) = split_packet(raw);
    if address.is_empty() {
        return Err(DecodeError::MissingAddress);
    }

    trace!(%address, bytes = raw.len(), "interpreting packet");
    match classify(&address) {
        MessageKind::Update => Ok(Inbound::Update(parse_update(&address, raw))),
        MessageKind::Reply => parse_reply(&address, payload).map(Inbound::Reply),
    }
}

/// Parses an update notification from its address and raw packet.
pub fn parse_update(address: &str, raw: &[u8]) -> Update {
    let segments: Vec<&str> = address.trim_matches('/').split('/').collect();

    match segments.as_slice() {
        ["update", "workspace", workspace_id] => Update::WorkspaceChanged {
            workspace_id: workspace_id.to_string(),
        },
        ["update", "workspace", workspace_id, "disconnect"] => Update::Disconnect {
            workspace_id: workspace_id.to_string(),
        },
        ["update", "workspace", workspace_id, "cue_id", cue_id] => Update::CueChanged {
            workspace_id: workspace_id.to_string(),
            cue_id: cue_id.to_string(),
        },
        ["update", "workspace", workspace_id, "cueList", cue_list_id, "playbackPosition"] => {
            Update::PlaybackPosition {
                workspace_id: workspace_id.to_string(),
                cue_list_id: cue_list_id.to_string(),
                cue_id: extract_update_argument(raw).into_value(),
            }
        }
        _ => Update::Other {
            address: address.to_string(),
        },
    }
}

/// Parses a reply from its address and the payload after the address.
///
/// # Errors
///
/// Fails when the payload has no JSON object or the JSON is malformed.
pub fn parse_reply(address: &str, payload: &[u8]) -> DecodeResult<Reply> {
    let query = address.strip_prefix(REPLY_PREFIX).unwrap_or(address);

    let text = String::from_utf8_lossy(payload);
    let json = extract_json(&text).ok_or_else(|| DecodeError::MissingJson {
        address: address.to_string(),
    })?;
    let body: Value = serde_json::from_str(json)?;
    let body = body.as_object().ok_or(DecodeError::NotAnObject)?;

    Ok(Reply {
        address: query.to_string(),
        workspace_id: string_field(body, "workspace_id"),
        data: classify_body(query, body),
    })
}

fn classify_body(query: &str, body: &Map<String, Value>) -> ReplyData {
    if let Some(status) = body.get("status").and_then(Value::as_str)
        && status != "ok"
    {
        return ReplyData::Rejected {
            status: status.to_string(),
        };
    }

    if query.ends_with("/connect") {
        let accepted = body
            .get("data")
            .and_then(Value::as_str)
            .is_some_and(|data| data.starts_with("ok"));
        return ReplyData::Authentication { accepted };
    }

    match body.get("data") {
        Some(Value::Array(items)) => classify_array(query, items),
        Some(Value::String(id)) if is_position_query(query) => {
            ReplyData::PlaybackPosition(non_empty(id))
        }
        Some(Value::Null) if is_position_query(query) => ReplyData::PlaybackPosition(None),
        Some(Value::Object(object)) => match id_field(object) {
            Some(id) => ReplyData::PlaybackPosition(non_empty(&id)),
            None => ReplyData::Unrecognized,
        },
        None => match id_field(body) {
            Some(id) => ReplyData::PlaybackPosition(non_empty(&id)),
            None => ReplyData::Unrecognized,
        },
        Some(_) => ReplyData::Unrecognized,
    }
}

fn classify_array(query: &str, items: &[Value]) -> ReplyData {
    let Some(first) = items.first() else {
        // An empty array is only meaningful as an empty cue list.
        return if query.ends_with("/children") {
            ReplyData::Cues(Vec::new())
        } else {
            ReplyData::Unrecognized
        };
    };
    let Some(first) = first.as_object() else {
        return ReplyData::Unrecognized;
    };

    let objects = || items.iter().filter_map(Value::as_object);

    if is_workspace_entry(first) {
        ReplyData::Workspaces(objects().filter_map(parse_workspace).collect())
    } else if first.get("type").and_then(Value::as_str) == Some("Cue List") {
        ReplyData::CueLists(objects().filter_map(parse_cue_list).collect())
    } else if id_field(first).is_some() {
        ReplyData::Cues(objects().map(parse_cue).collect())
    } else {
        ReplyData::Unrecognized
    }
}

fn is_position_query(query: &str) -> bool {
    query.ends_with("/playbackPositionId")
}

fn is_workspace_entry(entry: &Map<String, Value>) -> bool {
    ["displayName", "hasPasscode", "version"]
        .iter()
        .any(|key| entry.contains_key(*key))
}

fn parse_workspace(entry: &Map<String, Value>) -> Option<WorkspaceSummary> {
    Some(WorkspaceSummary {
        id: id_field(entry)?,
        display_name: string_field(entry, "displayName"),
        has_passcode: entry.get("hasPasscode").and_then(Value::as_bool),
        version: string_field(entry, "version"),
    })
}

fn parse_cue_list(entry: &Map<String, Value>) -> Option<CueListSummary> {
    Some(CueListSummary {
        id: id_field(entry)?,
        name: string_field(entry, "name").or_else(|| string_field(entry, "listName")),
    })
}

fn parse_cue(entry: &Map<String, Value>) -> Cue {
    Cue {
        id: id_field(entry).unwrap_or_default(),
        number: string_field(entry, "number"),
        name: string_field(entry, "name").or_else(|| string_field(entry, "listName")),
        kind: string_field(entry, "type"),
        notes: string_field(entry, "notes"),
    }
}

/// Cue and workspace ids are `uniqueID` in QLab's JSON; `id` is accepted too.
fn id_field(entry: &Map<String, Value>) -> Option<String> {
    string_field(entry, "uniqueID").or_else(|| string_field(entry, "id"))
}

/// Reads a scalar field as a string. Numbers and booleans are stringified.
fn string_field(entry: &Map<String, Value>, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
