// Audio module - input detection, source probing and encoding parameter policy

pub mod detection;
pub mod encoding;
pub mod probe;

pub use detection::is_audio_file;
pub use encoding::{round_up, EncodingMode, EncodingParameters, ParameterError};
pub use probe::{AudioProbe, FfprobeProbe, ProbeError, ProbeResult};
