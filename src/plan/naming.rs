//! Artifact naming
//!
//! Output filenames are derived from a per-request identifier and the
//! segment index, never from the contents of the output directory, so
//! concurrent requests cannot overwrite each other's files.

use std::fmt;

use uuid::Uuid;

/// Longest caption-derived label kept in a filename
const MAX_LABEL_LEN: usize = 40;

/// Unique identifier of one processing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Builds deterministic filenames for one request
#[derive(Debug, Clone)]
pub struct ArtifactNamer {
    request_id: RequestId,
    label: Option<String>,
}

impl ArtifactNamer {
    /// Names for uncaptioned segments: `segment_<id>_<N>.mp4`
    pub fn raw(request_id: RequestId) -> Self {
        Self {
            request_id,
            label: None,
        }
    }

    /// Names for captioned segments: `output_segment_<label>_<id>_part<N>.mp4`
    pub fn captioned(request_id: RequestId, caption: &str) -> Self {
        Self {
            request_id,
            label: Some(sanitize_label(caption)),
        }
    }

    /// Filename for a 1-based segment index
    pub fn filename(&self, index: usize) -> String {
        match &self.label {
            Some(label) => format!(
                "output_segment_{}_{}_part{}.mp4",
                label, self.request_id, index
            ),
            None => format!("segment_{}_{}.mp4", self.request_id, index),
        }
    }
}

/// Reduce caption text to a filename-safe label
pub fn sanitize_label(text: &str) -> String {
    let mut label = String::with_capacity(MAX_LABEL_LEN);
    let mut pending_sep = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            if pending_sep && !label.is_empty() {
                label.push('_');
            }
            pending_sep = false;
            label.push(c);
        } else {
            pending_sep = true;
        }
        if label.len() >= MAX_LABEL_LEN {
            break;
        }
    }

    label.truncate(MAX_LABEL_LEN);
    if label.is_empty() {
        "caption".to_string()
    } else {
        label
    }
}
