//! Named grammars with their suggested depth.

use crate::grammar::{Grammar, GrammarError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub depth: u32,
    pub text: &'static str,
}

impl Preset {
    pub fn compile(&self) -> Result<Grammar, GrammarError> {
        Grammar::compile(self.text)
    }
}

pub const DEFAULT_PRESET: &str = "basic";

pub const PRESETS: &[Preset] = &[
    Preset {
        name: "basic",
        depth: 12,
        text: "A :: triple(B,B,B):1\n\
               B :: Z:1 | sin(B):1 | cos(B):1 | exp(B):1 | sqrt(B):1 | tan(B):1 | sum(B,B):1 | mult(B,B):1 | mix(B,B,B):1\n\
               Z :: x:1 | y:1 | rgb:1",
    },
    Preset {
        name: "all",
        depth: 12,
        text: "A :: triple(B,B,B):1\n\
               B :: Z:1 | sin(B):1 | cos(B):1 | tan(B):1 | exp(B):1 | sqrt(B):1 | sum(B,B):1 | mult(B,B):1 | mod(B,B):1 | mix(B,B,B):1 | level(B,B,B):1\n\
               Z :: x:1 | y:1 | rgb:1 | bw:1",
    },
    Preset {
        name: "waves",
        depth: 12,
        text: "A :: triple(B,B,B):1\n\
               B :: Z:1 | sin(B,2):6 | sum(B,B):1 | mult(B,B):1 | mix(B,B,B):1\n\
               Z :: x:2 | y:2 | rgb:1 | bw:1",
    },
    Preset {
        name: "gradients",
        depth: 5,
        text: "A :: triple(B,B,B):1\n\
               B :: Z:1 | mix(B,B,B):2\n\
               Z :: x:1 | y:1 | rgb:1",
    },
    Preset {
        name: "animated",
        depth: 12,
        text: "A :: triple(B,B,B):1\n\
               B :: Z:1 | sin(B):1 | cos(B):1 | exp(B):1 | sqrt(B):1 | tan(B):1 | sum(B,B):1 | mult(B,B):1 | mix(B,B,B):1\n\
               Z :: x:1 | y:1 | rgb:1 | t:1",
    },
    Preset {
        name: "audio",
        depth: 12,
        text: "A :: triple(B,B,B):1\n\
               B :: Z:1 | sin(B):1 | cos(B):1 | exp(B):1 | sqrt(B):1 | tan(B):1 | sum(B,B):1 | mult(B,B):1 | mix(B,B,B):1\n\
               Z :: x:1 | y:1 | rgb:1 | low:1 | mid:1 | hi:1",
    },
    Preset {
        name: "audioDetailed",
        depth: 12,
        text: "A :: triple(B,B,B):1\n\
               B :: Z:1 | sin(B):1 | cos(B):1 | exp(B):1 | sqrt(B):1 | tan(B):1 | sum(B,B):1 | mult(B,B):1 | mix(B,B,B):1\n\
               Z :: x:1 | y:1 | rgb:1 | subbass:1 | bass:1 | lowmidrange:1 | midrange:1 | uppermidrange:1 | presence:1 | brilliance:1",
    },
];

pub fn preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Variable;

    #[test]
    fn every_preset_compiles() {
        for p in PRESETS {
            let g = p.compile().unwrap_or_else(|e| panic!("{}: {e}", p.name));
            assert_eq!(g.start_symbol(), "A", "{}", p.name);
            assert!(g.contains("Z"), "{}", p.name);
        }
        assert!(preset(DEFAULT_PRESET).is_some());
    }

    #[test]
    fn audio_presets_expose_their_bands() {
        let g = preset("audio").unwrap().compile().unwrap();
        assert_eq!(g.variables().len(), 3);
        let g = preset("audioDetailed").unwrap().compile().unwrap();
        assert_eq!(g.variables().len(), 7);
        assert!(g.variables().contains(&Variable::UpperMidrange));
        assert!(preset("nope").is_none());
    }
}
