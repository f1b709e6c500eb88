use std::collections::BTreeMap;

/// One color sample, every channel in `[-1, 1]`.
pub type Rgb = [f32; 3];

/// Map a `[-1, 1]` channel to a byte.
pub fn channel_to_u8(c: f32) -> u8 {
    ((c.clamp(-1.0, 1.0) + 1.0) * 127.5).round() as u8
}

pub fn rgb_to_rgba8(c: Rgb) -> [u8; 4] {
    [
        channel_to_u8(c[0]),
        channel_to_u8(c[1]),
        channel_to_u8(c[2]),
        255,
    ]
}

/// Row-major RGBA8 image, straight alpha (always opaque).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameRGBA {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }
}

/// Named inputs fed by an external analyser (audio band levels).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
    Low,
    Mid,
    Hi,
    SubBass,
    Bass,
    LowMidrange,
    Midrange,
    UpperMidrange,
    Presence,
    Brilliance,
}

impl Variable {
    pub const COUNT: usize = 10;

    pub const ALL: [Variable; Self::COUNT] = [
        Variable::Low,
        Variable::Mid,
        Variable::Hi,
        Variable::SubBass,
        Variable::Bass,
        Variable::LowMidrange,
        Variable::Midrange,
        Variable::UpperMidrange,
        Variable::Presence,
        Variable::Brilliance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variable::Low => "low",
            Variable::Mid => "mid",
            Variable::Hi => "hi",
            Variable::SubBass => "subbass",
            Variable::Bass => "bass",
            Variable::LowMidrange => "lowmidrange",
            Variable::Midrange => "midrange",
            Variable::UpperMidrange => "uppermidrange",
            Variable::Presence => "presence",
            Variable::Brilliance => "brilliance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    /// Slot in the flat variable array (also the shader uniform layout).
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Current values of every [`Variable`]. Unset or non-finite values read as `0`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "BTreeMap<String, f32>", into = "BTreeMap<String, f32>")]
pub struct Variables {
    values: [f32; Variable::COUNT],
}

impl Default for Variables {
    fn default() -> Self {
        Self::NONE
    }
}

impl Variables {
    pub const NONE: Variables = Variables {
        values: [0.0; Variable::COUNT],
    };

    pub fn get(&self, v: Variable) -> f32 {
        self.values[v.index()]
    }

    pub fn set(&mut self, v: Variable, value: f32) {
        self.values[v.index()] = if value.is_finite() { value } else { 0.0 };
    }

    /// Set a value by name; returns `false` for unknown names.
    pub fn set_named(&mut self, name: &str, value: f32) -> bool {
        match Variable::from_name(name) {
            Some(v) => {
                self.set(v, value);
                true
            }
            None => false,
        }
    }
}

impl From<BTreeMap<String, f32>> for Variables {
    fn from(map: BTreeMap<String, f32>) -> Self {
        let mut out = Variables::NONE;
        for (name, value) in map {
            if !out.set_named(&name, value) {
                tracing::debug!(%name, "ignoring unknown variable");
            }
        }
        out
    }
}

impl From<Variables> for BTreeMap<String, f32> {
    fn from(vars: Variables) -> Self {
        Variable::ALL
            .into_iter()
            .map(|v| (v.name().to_owned(), vars.get(v)))
            .collect()
    }
}
