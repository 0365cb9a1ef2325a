//! Downstream operation domain types
//!
//! A job is routed to exactly one WebUI call. The set of calls is closed:
//! adding one means adding a variant here, and every `match` on
//! [`Operation`] has to handle it.

use std::fmt;
use std::time::Duration;

/// Tag used when a job input carries no `api` field
pub const DEFAULT_OPERATION_TAG: &str = "txt2img";

/// HTTP method of a downstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    /// Whether a request with this method may be replayed safely
    pub fn is_idempotent(self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// A WebUI operation a job can be dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Txt2Img,
    Img2Img,
    GetLoras,
    GetOptions,
    SetOptions,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Txt2Img,
        Operation::Img2Img,
        Operation::GetLoras,
        Operation::GetOptions,
        Operation::SetOptions,
    ];

    /// Resolves an operation from its job tag (exact, case-sensitive match)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "txt2img" => Some(Operation::Txt2Img),
            "img2img" => Some(Operation::Img2Img),
            "getLoras" => Some(Operation::GetLoras),
            "getOptions" => Some(Operation::GetOptions),
            "setOptions" => Some(Operation::SetOptions),
            _ => None,
        }
    }

    /// The tag a job uses to select this operation
    pub fn tag(self) -> &'static str {
        match self {
            Operation::Txt2Img => "txt2img",
            Operation::Img2Img => "img2img",
            Operation::GetLoras => "getLoras",
            Operation::GetOptions => "getOptions",
            Operation::SetOptions => "setOptions",
        }
    }

    pub fn method(self) -> HttpMethod {
        match self {
            Operation::Txt2Img | Operation::Img2Img | Operation::SetOptions => HttpMethod::Post,
            Operation::GetLoras | Operation::GetOptions => HttpMethod::Get,
        }
    }

    /// Path relative to the WebUI API base URL
    pub fn path(self) -> &'static str {
        match self {
            Operation::Txt2Img => "/txt2img",
            Operation::Img2Img => "/img2img",
            Operation::GetLoras => "/loras",
            Operation::GetOptions | Operation::SetOptions => "/options",
        }
    }

    /// Whether the job parameters are sent as the request body
    pub fn forwards_params(self) -> bool {
        self.method() == HttpMethod::Post
    }

    /// Per-attempt timeout for the downstream call
    ///
    /// Generation calls get more headroom than the settings endpoints.
    pub fn timeout(self) -> Duration {
        match self {
            Operation::Txt2Img | Operation::Img2Img => Duration::from_secs(90),
            Operation::GetLoras | Operation::GetOptions | Operation::SetOptions => {
                Duration::from_secs(60)
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
