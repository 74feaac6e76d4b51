use serde::{Deserialize, Serialize};

/// Feel constants shared by controllers and systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Radians per second for keyboard turns.
    pub cube_turn_rate: f64,
    /// Units per second for keyboard moves.
    pub cube_move_rate: f64,
    /// Units per second for free-camera WASD/QE.
    pub cam_move_rate: f64,
    /// Zoom units per second while `KeyZ` is held.
    pub zoom_rate: f64,
    /// Radians per second the tracking system may turn an entity.
    pub max_tracking_turn_rate: f64,
    /// Radians per second of roll back toward world up; 0 disables.
    pub roll_stabilize: f64,
    /// Seconds of camera velocity to lead the aim point by.
    pub lead_time: f64,
    /// Radians per pixel.
    pub mouse_sensitivity: f64,
    pub touch_sensitivity: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            cube_turn_rate: 1.5,
            cube_move_rate: 1.0,
            cam_move_rate: 1.0,
            zoom_rate: 250.0,
            max_tracking_turn_rate: 0.8,
            roll_stabilize: 2.0,
            lead_time: 0.20,
            mouse_sensitivity: 0.0025,
            touch_sensitivity: 0.004,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let t: Tuning = serde_json::from_str(r#"{"lead_time": 0.5, "zoom_rate": 100}"#).unwrap();
        assert_eq!(t.lead_time, 0.5);
        assert_eq!(t.zoom_rate, 100.0);
        assert_eq!(t.max_tracking_turn_rate, 0.8);
        assert_eq!(t.mouse_sensitivity, 0.0025);
    }
}
