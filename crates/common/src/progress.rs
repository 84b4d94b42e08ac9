// RDB - Replay Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Progress notices for long-running operations

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// A coarse progress notice, such as the number of steps recorded so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    /// What is in progress
    pub message: String,
    /// Units of work completed so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl ProgressMessage {
    /// A notice without a count
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), count: None }
    }

    /// A notice reporting how much work is done
    pub fn with_count(message: impl Into<String>, count: usize) -> Self {
        Self { message: message.into(), count: Some(count) }
    }
}

impl Display for ProgressMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            Some(count) => write!(f, "{} ({count})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ProgressMessage::new("Attaching").to_string(), "Attaching");
        assert_eq!(
            ProgressMessage::with_count("Recording execution", 200).to_string(),
            "Recording execution (200)"
        );
    }

    #[test]
    fn test_count_omitted_from_json_when_absent() {
        let json = serde_json::to_string(&ProgressMessage::new("Attaching")).unwrap();
        assert_eq!(json, r#"{"message":"Attaching"}"#);

        let msg = ProgressMessage::with_count("Recording execution", 100);
        let back: ProgressMessage =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(back, msg);
    }
}
