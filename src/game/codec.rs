//! Replay blob encoding: versioned JSON wrapped in base64 for copy/paste sharing

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::court::{CourtDimensions, Vec2};
use super::recording::{Action, ActionLog};

/// The only blob version this build reads or writes
pub const REPLAY_FORMAT_VERSION: &str = "1.0";

/// Portable replay payload. Field names are part of the shared format
/// and stay camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayBlob {
    pub version: String,
    pub initial_positions: [Vec2; 2],
    pub actions: Vec<Action>,
    pub court_dimensions: CourtDimensions,
}

/// Encode/decode failures, surfaced to the client as user-facing errors.
/// Decode failures never touch the in-memory log.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("replay data is not valid base64")]
    Transport(#[from] base64::DecodeError),

    #[error("replay data is not valid UTF-8 text")]
    Text(#[from] std::string::FromUtf8Error),

    #[error("replay data has an invalid structure: {0}")]
    Structure(#[from] serde_json::Error),

    #[error("unsupported replay version: {0}")]
    UnsupportedVersion(String),

    #[error("no recorded actions")]
    EmptyLog,
}

impl CodecError {
    /// Stable error code for the wire protocol
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::Transport(_) | CodecError::Text(_) | CodecError::Structure(_) => {
                "format_error"
            }
            CodecError::UnsupportedVersion(_) => "unsupported_version",
            CodecError::EmptyLog => "empty_log",
        }
    }
}

/// Serialize a recorded log into a shareable opaque string
pub fn encode(log: &ActionLog, court: CourtDimensions) -> Result<String, CodecError> {
    if log.is_empty() {
        return Err(CodecError::EmptyLog);
    }

    let blob = ReplayBlob {
        version: REPLAY_FORMAT_VERSION.to_string(),
        initial_positions: log.initial_positions,
        actions: log.actions.clone(),
        court_dimensions: court,
    };

    let json = serde_json::to_string(&blob)?;
    Ok(BASE64.encode(json))
}

/// Parse a shared replay string back into an action log.
///
/// Court dimensions are carried in the blob for forward compatibility but
/// the importing session keeps its own court; a mismatch is only logged.
pub fn decode(data: &str, court: CourtDimensions) -> Result<ActionLog, CodecError> {
    let bytes = BASE64.decode(data.trim())?;
    let json = String::from_utf8(bytes)?;
    let blob: ReplayBlob = serde_json::from_str(&json)?;

    if blob.version != REPLAY_FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(blob.version));
    }

    if blob.court_dimensions != court {
        debug!(
            blob_width = blob.court_dimensions.width,
            blob_height = blob.court_dimensions.height,
            "imported replay was recorded on a different court size"
        );
    }

    Ok(ActionLog {
        initial_positions: blob.initial_positions,
        actions: blob.actions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::recording::ActionKind;

    fn sample_log() -> ActionLog {
        ActionLog {
            initial_positions: [Vec2::new(288.0, 292.5), Vec2::new(96.0, 292.5)],
            actions: vec![
                Action {
                    time: 0,
                    kind: ActionKind::Move {
                        player_id: 1,
                        x: 120.0,
                        y: 300.0,
                    },
                },
                Action {
                    time: 1,
                    kind: ActionKind::Hit {
                        player_id: 0,
                        start_x: 288.0,
                        start_y: 292.5,
                        velocity_x: -20.25,
                        velocity_y: 3.5,
                    },
                },
            ],
        }
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let court = CourtDimensions::default();
        let log = sample_log();

        let encoded = encode(&log, court).unwrap();
        let decoded = decode(&encoded, court).unwrap();

        assert_eq!(decoded, log);
    }

    #[test]
    fn round_trip_of_empty_action_list_is_rejected_at_encode() {
        let err = encode(&ActionLog::empty(), CourtDimensions::default()).unwrap_err();
        assert!(matches!(err, CodecError::EmptyLog));
        assert_eq!(err.code(), "empty_log");
    }

    #[test]
    fn wire_shape_matches_shared_format() {
        let court = CourtDimensions::default();
        let encoded = encode(&sample_log(), court).unwrap();
        let json = String::from_utf8(BASE64.decode(encoded).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], "1.0");
        assert_eq!(value["courtDimensions"]["width"], 384.0);
        assert_eq!(value["actions"][0]["type"], "move");
        assert_eq!(value["actions"][0]["time"], 0);
        assert_eq!(value["actions"][0]["data"]["playerId"], 1);
        assert_eq!(value["actions"][1]["type"], "hit");
        assert_eq!(value["actions"][1]["data"]["velocityX"], -20.25);
    }

    #[test]
    fn invalid_base64_is_a_format_error() {
        let err = decode("not-valid-base64!!", CourtDimensions::default()).unwrap_err();
        assert!(matches!(err, CodecError::Transport(_)));
        assert_eq!(err.code(), "format_error");
    }

    #[test]
    fn missing_actions_field_is_a_format_error() {
        let json = r#"{"version":"1.0","initialPositions":[{"x":0,"y":0},{"x":0,"y":0}],"courtDimensions":{"width":384,"height":585}}"#;
        let data = BASE64.encode(json);

        let err = decode(&data, CourtDimensions::default()).unwrap_err();
        assert!(matches!(err, CodecError::Structure(_)));
        assert_eq!(err.code(), "format_error");
    }

    #[test]
    fn missing_version_field_is_a_format_error() {
        let json = r#"{"initialPositions":[{"x":0,"y":0},{"x":0,"y":0}],"actions":[],"courtDimensions":{"width":384,"height":585}}"#;
        let data = BASE64.encode(json);

        let err = decode(&data, CourtDimensions::default()).unwrap_err();
        assert!(matches!(err, CodecError::Structure(_)));
    }

    #[test]
    fn unknown_version_is_rejected_not_coerced() {
        let json = r#"{"version":"2.0","initialPositions":[{"x":0,"y":0},{"x":0,"y":0}],"actions":[],"courtDimensions":{"width":384,"height":585}}"#;
        let data = BASE64.encode(json);

        match decode(&data, CourtDimensions::default()) {
            Err(CodecError::UnsupportedVersion(v)) => assert_eq!(v, "2.0"),
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn surrounding_whitespace_from_copy_paste_is_tolerated() {
        let court = CourtDimensions::default();
        let log = sample_log();
        let encoded = format!("  {}\n", encode(&log, court).unwrap());

        assert_eq!(decode(&encoded, court).unwrap(), log);
    }
}
