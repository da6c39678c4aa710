#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelCommand {
    left: f64,
    right: f64,
}

impl WheelCommand {
    pub fn new(left: f64, right: f64) -> WheelCommand {
        WheelCommand { left, right }
    }

    pub fn stopped() -> Self {
        Self {
            left: 0.0,
            right: 0.0,
        }
    }

    pub fn forward(speed: f64) -> Self {
        Self::new(speed, speed)
    }

    /// Spin in place. Positive speed turns clockwise.
    pub fn spin(speed: f64) -> Self {
        Self::new(speed, -speed)
    }

    pub fn from_move(forward: f64, yaw: f64) -> WheelCommand {
        WheelCommand::new(forward + yaw, forward - yaw)
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn is_stopped(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clockwise_spin_drives_left_forward() {
        let command = WheelCommand::spin(80.0);
        assert_eq!(command.left(), 80.0);
        assert_eq!(command.right(), -80.0);
    }

    #[test]
    fn move_mixes_forward_and_yaw() {
        let command = WheelCommand::from_move(100.0, 20.0);
        assert_eq!(command, WheelCommand::new(120.0, 80.0));
        assert!(WheelCommand::stopped().is_stopped());
    }
}
