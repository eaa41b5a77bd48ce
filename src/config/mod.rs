mod engine_desc;
mod music_config;

pub use engine_desc::{CompressionDesc, ReverbParams, SourceDefaults, StarSonicDesc};
pub use music_config::MusicConfig;
