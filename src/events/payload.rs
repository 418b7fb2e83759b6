//! Typed view over the `data` object of an exported event. Every bucket type gets its own
//! variant, so display-name extraction never has to probe an untyped map.

use serde_json::{Map, Value};

use super::model::BucketType;

pub const UNKNOWN_WINDOW: &str = "Unknown window";
pub const UNKNOWN_PAGE: &str = "Unknown page";
pub const DEFAULT_EDITOR: &str = "Editor";
pub const ACTIVE: &str = "Active";
pub const AWAY: &str = "Away";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowData {
    pub app: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditorData {
    pub editor: Option<String>,
    pub file: Option<String>,
    pub project: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowserData {
    pub title: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfkStatus {
    Active,
    Away,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Window(WindowData),
    Editor(EditorData),
    Browser(BrowserData),
    AfkStatus(AfkStatus),
    Unknown(Map<String, Value>),
}

impl EventPayload {
    pub fn from_data(bucket_type: &BucketType, data: Map<String, Value>) -> Self {
        match bucket_type {
            BucketType::Window => EventPayload::Window(WindowData {
                app: string_field(&data, "app"),
                title: string_field(&data, "title"),
            }),
            BucketType::Editor => EventPayload::Editor(EditorData {
                editor: string_field(&data, "editor"),
                file: string_field(&data, "file"),
                project: string_field(&data, "project"),
                language: string_field(&data, "language"),
            }),
            BucketType::Browser => EventPayload::Browser(BrowserData {
                title: string_field(&data, "title"),
                url: string_field(&data, "url"),
            }),
            BucketType::AfkStatus => {
                let status = match string_field(&data, "status").as_deref() {
                    Some("not-afk") => AfkStatus::Active,
                    _ => AfkStatus::Away,
                };
                EventPayload::AfkStatus(status)
            }
            BucketType::Other(_) => EventPayload::Unknown(data),
        }
    }

    /// Human readable name of the activity. Total: every variant has a fallback.
    pub fn display_name(&self, bucket_type: &BucketType) -> String {
        match self {
            EventPayload::Window(WindowData { app, title }) => app
                .clone()
                .or_else(|| title.clone())
                .unwrap_or_else(|| UNKNOWN_WINDOW.to_string()),
            EventPayload::Editor(data) => editor_name(data),
            EventPayload::Browser(BrowserData { title, url }) => title
                .clone()
                .or_else(|| url.as_deref().and_then(url_host))
                .unwrap_or_else(|| UNKNOWN_PAGE.to_string()),
            EventPayload::AfkStatus(AfkStatus::Active) => ACTIVE.to_string(),
            EventPayload::AfkStatus(AfkStatus::Away) => AWAY.to_string(),
            EventPayload::Unknown(data) => string_field(data, "app")
                .or_else(|| string_field(data, "title"))
                .unwrap_or_else(|| capitalize(&bucket_type.to_string())),
        }
    }
}

fn editor_name(data: &EditorData) -> String {
    let editor = data.editor.as_deref().unwrap_or(DEFAULT_EDITOR);
    if let Some(file) = data.file.as_deref().and_then(file_name) {
        format!("{editor}: {file}")
    } else if let Some(project) = &data.project {
        format!("{editor}: {project}")
    } else if let Some(language) = &data.language {
        format!("{editor} ({language})")
    } else {
        editor.to_string()
    }
}

/// Empty strings are treated the same as missing ones.
fn string_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn file_name(path: &str) -> Option<&str> {
    path.rsplit(['/', '\\']).find(|v| !v.is_empty())
}

fn url_host(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
