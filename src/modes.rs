//! UniPro power modes exercised by a loopback campaign, in run order.
//!
//! Each mode maps to the `svc linktest` commands that put one link into it.
//! The `X` placeholder stands for the SVC port of the link.

/// A named link configuration and the SVC commands that select it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerMode {
    pub name: &'static str,
    commands: &'static [&'static str],
}

const fn mode(name: &'static str, commands: &'static [&'static str]) -> PowerMode {
    PowerMode { name, commands }
}

pub const POWER_MODES: &[PowerMode] = &[
    mode("PWM-G1 - 1 lane", &["svc linktest -p X -m pwm -g 1 -s a -l 1"]),
    mode("PWM-G2 - 1 lane", &["svc linktest -p X -m pwm -g 2 -s a -l 1"]),
    mode("PWM-G3 - 1 lane", &["svc linktest -p X -m pwm -g 3 -s a -l 1"]),
    mode("PWM-G4 - 1 lane", &["svc linktest -p X -m pwm -g 4 -s a -l 1"]),
    mode("PWM-G1 - 2 lanes", &["svc linktest -p X -m pwm -g 1 -s a -l 2"]),
    mode("PWM-G2 - 2 lanes", &["svc linktest -p X -m pwm -g 2 -s a -l 2"]),
    mode("PWM-G3 - 2 lanes", &["svc linktest -p X -m pwm -g 3 -s a -l 2"]),
    mode("PWM-G4 - 2 lanes", &["svc linktest -p X -m pwm -g 4 -s a -l 2"]),
    mode("HS-G1A - 1 lane", &["svc linktest -p X -m hs  -g 1 -s a -l 1"]),
    mode("HS-G2A - 1 lane", &["svc linktest -p X -m hs  -g 2 -s a -l 1"]),
    mode("HS-G1A - 2 lanes", &["svc linktest -p X -m hs  -g 1 -s a -l 2"]),
    mode("HS-G2A - 2 lanes", &["svc linktest -p X -m hs  -g 2 -s a -l 2"]),
    // Series B rates are only reachable from PWM, so step down first.
    mode(
        "HS-G1B - 1 lane",
        &[
            "svc linktest -p X -m pwm -g 1 -s a -l 1",
            "svc linktest -p X -m pwm -g 1 -s b -l 1",
            "svc linktest -p X -m hs  -g 1 -s b -l 1",
        ],
    ),
    mode(
        "HS-G2B - 1 lane",
        &[
            "svc linktest -p X -m pwm -g 1 -s a -l 1",
            "svc linktest -p X -m pwm -g 1 -s b -l 1",
            "svc linktest -p X -m hs  -g 2 -s b -l 1",
        ],
    ),
    mode(
        "HS-G1B - 2 lanes",
        &[
            "svc linktest -p X -m pwm -g 1 -s a -l 2",
            "svc linktest -p X -m pwm -g 1 -s b -l 2",
            "svc linktest -p X -m hs  -g 1 -s b -l 2",
        ],
    ),
    mode(
        "HS-G2B - 2 lanes",
        &[
            "svc linktest -p X -m pwm -g 1 -s a -l 2",
            "svc linktest -p X -m pwm -g 1 -s b -l 2",
            "svc linktest -p X -m hs  -g 2 -s b -l 2",
        ],
    ),
];

impl PowerMode {
    /// The mode's commands with the port placeholder filled in.
    pub fn commands_for(&self, port: u32) -> Vec<String> {
        let port = port.to_string();
        self.commands.iter().map(|c| c.replace('X', &port)).collect()
    }
}

/// Mode names in run order.
pub fn names() -> impl Iterator<Item = &'static str> {
    POWER_MODES.iter().map(|m| m.name)
}

pub fn find(name: &str) -> Option<&'static PowerMode> {
    POWER_MODES.iter().find(|m| m.name == name)
}

/// Commands for the named mode on `port`, `None` if the mode is unknown.
pub fn commands_for(name: &str, port: u32) -> Option<Vec<String>> {
    find(name).map(|m| m.commands_for(port))
}
