//! DMS analysis results

use serde::{Deserialize, Serialize};

use crate::landmarks::FaceGeometry;
use crate::signals::FrameSignals;
use crate::state::{AlertKind, AlertState};

/// Everything the renderer and the audio arbiter need for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DmsAnalysis {
    /// Frame sequence number
    pub sequence: u64,

    /// Whether a face was detected
    pub face_detected: bool,

    /// EAR/MAR for this frame (face frames only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<FrameSignals>,

    /// Landmark subsets used for the signals (face frames only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<FaceGeometry>,

    /// Alert state after this frame. Carried unchanged through faceless frames.
    pub state: AlertState,
}

impl DmsAnalysis {
    /// Result for a frame without a face
    pub fn no_face(sequence: u64, state: AlertState) -> Self {
        Self {
            sequence,
            face_detected: false,
            signals: None,
            geometry: None,
            state,
        }
    }

    /// Alert decided on this frame; faceless frames decide nothing
    pub fn alert(&self) -> AlertKind {
        if self.face_detected {
            self.state.current_alert
        } else {
            AlertKind::None
        }
    }

    /// Check if an alert was raised on this frame
    pub fn has_alert(&self) -> bool {
        self.alert() != AlertKind::None
    }
}
