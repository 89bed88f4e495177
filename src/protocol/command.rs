//! Inbound command envelopes.
//!
//! The peer sends flat JSON objects:
//!
//! ```json
//! { "requestId": "r1", "action": "click", "tabId": 7, "selector": "#submit" }
//! ```
//!
//! [`CommandEnvelope`] mirrors that shape. [`Command::from_envelope`] checks the
//! action name against the closed [`Action`] set and pulls out the fields that
//! action requires, so handlers only ever see well-formed commands.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, TabId};

// ============================================================================
// Constants
// ============================================================================

/// Synthetic refs produced by snapshots look like `e0`, `e12`, ...
static REF_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^e(\d+)$").expect("ref pattern is valid"));

// ============================================================================
// CommandEnvelope
// ============================================================================

/// A command as received from the peer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    /// Correlation token echoed in the response.
    pub request_id: RequestId,

    /// Action name.
    pub action: String,

    /// Target tab.
    #[serde(default)]
    pub tab_id: Option<TabId>,

    /// URL for `open`.
    #[serde(default)]
    pub url: Option<String>,

    /// CSS selector or snapshot ref for `click`/`type`.
    #[serde(default)]
    pub selector: Option<String>,

    /// Text for `type`.
    #[serde(default)]
    pub text: Option<String>,

    /// Expression for `evaluate`.
    #[serde(default)]
    pub expression: Option<String>,

    /// Direction for `scroll`.
    #[serde(default)]
    pub direction: Option<String>,
}

/// A message that could not be decoded into a [`CommandEnvelope`].
#[derive(Debug)]
pub struct DecodeFailure {
    /// Request id, if the message carried one.
    pub request_id: Option<RequestId>,
    /// What went wrong.
    pub error: Error,
}

impl CommandEnvelope {
    /// Decodes a text frame.
    ///
    /// When decoding fails but the frame is an object with a `requestId`,
    /// the id is returned alongside the error so the failure can still be
    /// answered.
    pub fn decode(text: &str) -> std::result::Result<Self, DecodeFailure> {
        let value: Value = serde_json::from_str(text).map_err(|e| DecodeFailure {
            request_id: None,
            error: Error::malformed(e.to_string()),
        })?;

        let request_id = value
            .as_object()
            .and_then(|obj| obj.get("requestId"))
            .cloned()
            .map(RequestId::new);

        serde_json::from_value(value).map_err(|e| DecodeFailure {
            request_id,
            error: Error::malformed(e.to_string()),
        })
    }

    fn require_tab(&self) -> Result<TabId> {
        self.tab_id
            .ok_or_else(|| Error::missing_field("tabId", &self.action))
    }

    fn require_str<'a>(&'a self, field: &'a Option<String>, name: &str) -> Result<&'a str> {
        field
            .as_deref()
            .ok_or_else(|| Error::missing_field(name, &self.action))
    }
}

// ============================================================================
// Action
// ============================================================================

/// Every action the relay understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Liveness check.
    Ping,
    /// List browser tabs.
    ListTabs,
    /// Open a new tab.
    Open,
    /// Close a tab.
    Close,
    /// Open a debugging session.
    Attach,
    /// Close a debugging session.
    Detach,
    /// Capture a page snapshot.
    Snapshot,
    /// Evaluate a script expression.
    Evaluate,
    /// Click an element.
    Click,
    /// Type into an element.
    Type,
    /// Scroll the page.
    Scroll,
    /// Capture a screenshot.
    Screenshot,
}

impl Action {
    /// All actions, in wire documentation order.
    pub const ALL: [Action; 12] = [
        Action::Ping,
        Action::ListTabs,
        Action::Open,
        Action::Close,
        Action::Attach,
        Action::Detach,
        Action::Snapshot,
        Action::Evaluate,
        Action::Click,
        Action::Type,
        Action::Scroll,
        Action::Screenshot,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::ListTabs => "list_tabs",
            Self::Open => "open",
            Self::Close => "close",
            Self::Attach => "attach",
            Self::Detach => "detach",
            Self::Snapshot => "snapshot",
            Self::Evaluate => "evaluate",
            Self::Click => "click",
            Self::Type => "type",
            Self::Scroll => "scroll",
            Self::Screenshot => "screenshot",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| Error::unknown_action(s))
    }
}

// ============================================================================
// Direction
// ============================================================================

/// Scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the top of the page.
    Up,
    /// Towards the bottom of the page.
    Down,
    /// Towards the left edge.
    Left,
    /// Towards the right edge.
    Right,
}

impl Direction {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Returns the `(x, y)` offset for a scroll of `amount` pixels.
    #[must_use]
    pub const fn offset(self, amount: i32) -> (i32, i32) {
        match self {
            Self::Up => (0, -amount),
            Self::Down => (0, amount),
            Self::Left => (-amount, 0),
            Self::Right => (amount, 0),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(Error::invalid_argument(format!(
                "invalid scroll direction '{other}' (expected up, down, left or right)"
            ))),
        }
    }
}

// ============================================================================
// ElementTarget
// ============================================================================

/// What a `click` or `type` command points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementTarget {
    /// Synthetic ref from the tab's latest snapshot.
    Ref(String),
    /// CSS selector evaluated against the live page.
    Selector(String),
}

impl ElementTarget {
    /// Classifies a `selector` field value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if REF_PATTERN.is_match(trimmed) {
            Self::Ref(trimmed.to_string())
        } else {
            Self::Selector(raw.to_string())
        }
    }

    /// Returns the raw text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ref(s) | Self::Selector(s) => s,
        }
    }
}

// ============================================================================
// Command
// ============================================================================

/// A validated command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `ping`
    Ping,
    /// `list_tabs`
    ListTabs,
    /// `open`
    Open {
        /// Absolute URL to load.
        url: String,
    },
    /// `close`
    Close {
        /// Tab to close.
        tab_id: TabId,
    },
    /// `attach`
    Attach {
        /// Tab to attach to.
        tab_id: TabId,
    },
    /// `detach`
    Detach {
        /// Tab to detach from.
        tab_id: TabId,
    },
    /// `snapshot`
    Snapshot {
        /// Tab to capture.
        tab_id: TabId,
    },
    /// `evaluate`
    Evaluate {
        /// Tab to run in.
        tab_id: TabId,
        /// Script expression.
        expression: String,
    },
    /// `click`
    Click {
        /// Tab to act on.
        tab_id: TabId,
        /// Element to click.
        target: ElementTarget,
    },
    /// `type`
    Type {
        /// Tab to act on.
        tab_id: TabId,
        /// Element to type into.
        target: ElementTarget,
        /// Text to insert.
        text: String,
    },
    /// `scroll`
    Scroll {
        /// Tab to scroll.
        tab_id: TabId,
        /// Direction of travel.
        direction: Direction,
    },
    /// `screenshot`
    Screenshot {
        /// Tab to capture.
        tab_id: TabId,
    },
}

impl Command {
    /// Validates an envelope against its action's required fields.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownAction`] for action names outside [`Action::ALL`]
    /// - [`Error::InvalidArgument`] for missing or invalid fields
    pub fn from_envelope(envelope: &CommandEnvelope) -> Result<Self> {
        let action: Action = envelope.action.parse()?;

        let command = match action {
            Action::Ping => Self::Ping,
            Action::ListTabs => Self::ListTabs,
            Action::Open => {
                let url = envelope.require_str(&envelope.url, "url")?;
                Url::parse(url).map_err(|e| {
                    Error::invalid_argument(format!("invalid url '{url}': {e}"))
                })?;
                Self::Open {
                    url: url.to_string(),
                }
            }
            Action::Close => Self::Close {
                tab_id: envelope.require_tab()?,
            },
            Action::Attach => Self::Attach {
                tab_id: envelope.require_tab()?,
            },
            Action::Detach => Self::Detach {
                tab_id: envelope.require_tab()?,
            },
            Action::Snapshot => Self::Snapshot {
                tab_id: envelope.require_tab()?,
            },
            Action::Evaluate => Self::Evaluate {
                tab_id: envelope.require_tab()?,
                expression: envelope
                    .require_str(&envelope.expression, "expression")?
                    .to_string(),
            },
            Action::Click => Self::Click {
                tab_id: envelope.require_tab()?,
                target: ElementTarget::parse(
                    envelope.require_str(&envelope.selector, "selector")?,
                ),
            },
            Action::Type => Self::Type {
                tab_id: envelope.require_tab()?,
                target: ElementTarget::parse(
                    envelope.require_str(&envelope.selector, "selector")?,
                ),
                text: envelope.require_str(&envelope.text, "text")?.to_string(),
            },
            Action::Scroll => Self::Scroll {
                tab_id: envelope.require_tab()?,
                direction: envelope
                    .require_str(&envelope.direction, "direction")?
                    .parse()?,
            },
            Action::Screenshot => Self::Screenshot {
                tab_id: envelope.require_tab()?,
            },
        };

        Ok(command)
    }

    /// Returns the action this command belongs to.
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Ping => Action::Ping,
            Self::ListTabs => Action::ListTabs,
            Self::Open { .. } => Action::Open,
            Self::Close { .. } => Action::Close,
            Self::Attach { .. } => Action::Attach,
            Self::Detach { .. } => Action::Detach,
            Self::Snapshot { .. } => Action::Snapshot,
            Self::Evaluate { .. } => Action::Evaluate,
            Self::Click { .. } => Action::Click,
            Self::Type { .. } => Action::Type,
            Self::Scroll { .. } => Action::Scroll,
            Self::Screenshot { .. } => Action::Screenshot,
        }
    }

    /// Returns the tab a command operates on, if any.
    #[must_use]
    pub fn tab_id(&self) -> Option<TabId> {
        match self {
            Self::Ping | Self::ListTabs | Self::Open { .. } => None,
            Self::Close { tab_id }
            | Self::Attach { tab_id }
            | Self::Detach { tab_id }
            | Self::Snapshot { tab_id }
            | Self::Evaluate { tab_id, .. }
            | Self::Click { tab_id, .. }
            | Self::Type { tab_id, .. }
            | Self::Scroll { tab_id, .. }
            | Self::Screenshot { tab_id } => Some(*tab_id),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
