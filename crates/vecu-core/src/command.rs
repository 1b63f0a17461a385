/// Who put a command on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Panel,
    Controller,
}

/// The fixed set of operator actions the panel can request.
///
/// Every action is an idempotent set or a clamped step, so duplicate
/// delivery from the panel is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    LeftTurnOn,
    LeftTurnOff,
    RightTurnOn,
    RightTurnOff,
    HazardOn,
    HazardOff,
    LowBeamOn,
    LowBeamOff,
    HighBeamOn,
    HighBeamOff,
    BeamsOff,
    Accelerate,
    Brake,
    CruiseOn,
    CruiseOff,
    CruiseFaster,
    CruiseSlower,
    Terminate,
}

impl CommandKind {
    pub const ALL: [CommandKind; 18] = [
        CommandKind::LeftTurnOn,
        CommandKind::LeftTurnOff,
        CommandKind::RightTurnOn,
        CommandKind::RightTurnOff,
        CommandKind::HazardOn,
        CommandKind::HazardOff,
        CommandKind::LowBeamOn,
        CommandKind::LowBeamOff,
        CommandKind::HighBeamOn,
        CommandKind::HighBeamOff,
        CommandKind::BeamsOff,
        CommandKind::Accelerate,
        CommandKind::Brake,
        CommandKind::CruiseOn,
        CommandKind::CruiseOff,
        CommandKind::CruiseFaster,
        CommandKind::CruiseSlower,
        CommandKind::Terminate,
    ];

    /// Stable wire tag used by the panel protocol.
    pub fn as_tag(&self) -> &'static str {
        match self {
            CommandKind::LeftTurnOn => "left_turn_on",
            CommandKind::LeftTurnOff => "left_turn_off",
            CommandKind::RightTurnOn => "right_turn_on",
            CommandKind::RightTurnOff => "right_turn_off",
            CommandKind::HazardOn => "hazard_on",
            CommandKind::HazardOff => "hazard_off",
            CommandKind::LowBeamOn => "low_beam_on",
            CommandKind::LowBeamOff => "low_beam_off",
            CommandKind::HighBeamOn => "high_beam_on",
            CommandKind::HighBeamOff => "high_beam_off",
            CommandKind::BeamsOff => "beams_off",
            CommandKind::Accelerate => "accelerate",
            CommandKind::Brake => "brake",
            CommandKind::CruiseOn => "cruise_on",
            CommandKind::CruiseOff => "cruise_off",
            CommandKind::CruiseFaster => "cruise_faster",
            CommandKind::CruiseSlower => "cruise_slower",
            CommandKind::Terminate => "terminate",
        }
    }

    /// Inverse of [`as_tag`](Self::as_tag); `None` for unknown tags
    /// (the caller logs and discards those).
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_tag() == tag)
    }
}

/// One instruction, consumed exactly once by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub origin: Origin,
}

impl Command {
    pub fn panel(kind: CommandKind) -> Self {
        Self {
            kind,
            origin: Origin::Panel,
        }
    }

    pub fn controller(kind: CommandKind) -> Self {
        Self {
            kind,
            origin: Origin::Controller,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_tag(kind.as_tag()), Some(kind));
        }
    }

    #[test]
    fn tags_are_unique() {
        for (i, a) in CommandKind::ALL.iter().enumerate() {
            for b in &CommandKind::ALL[i + 1..] {
                assert_ne!(a.as_tag(), b.as_tag());
            }
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(CommandKind::from_tag("warp_drive_on"), None);
        assert_eq!(CommandKind::from_tag(""), None);
    }
}
