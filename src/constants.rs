//! Common constants used throughout batchwork.

/// Action names the engine dispatches itself. Matched case-insensitively.
pub const BUILTIN_ACTIONS: [&str; 15] = [
    "None",
    "Batch",
    "DrawImage",
    "FileOpenImage",
    "FileOverlayImage",
    "FileSaveImage",
    "ForEachFile",
    "If",
    "ImageBackground",
    "ImagesClear",
    "OpenWorkingDocument",
    "RunSequence",
    "SaveWorkingDocument",
    "SetWorkingImage",
    "SizeImage",
];

/// Option that suppresses a child.
pub const OPTION_MUTE: &str = "mute";

/// Option that, among a batch's direct children, selects only the tagged ones.
pub const OPTION_SOLO: &str = "solo";

/// Option values that switch an option off.
pub const OPTION_OFF_VALUES: [&str; 4] = ["false", "0", "no", "off"];

/// Upper bound on substitution passes in value normalization.
pub const MAX_NORMALIZE_PASSES: usize = 32;

/// Upper bound on the names a single range may expand to.
pub const MAX_RANGE_ENTRIES: usize = 100_000;

/// Token replaced by each enumerated range entry in input names.
pub const RANGE_TOKEN: &str = "{Range}";

/// Property naming the sequence a `RunSequence` node replays.
pub const SEQUENCE_NAME_PROPERTY: &str = "SequenceName";

/// Ambient variable holding the current file's name in conditions.
pub const CURRENT_FILENAME_VAR: &str = "CurrentFilename";

/// Ambient variable holding the current file's numeric seed in conditions.
pub const CURRENT_FILE_NUMBER_VAR: &str = "CurrentFileNumber";

/// Configuration file extensions parsed as YAML; anything else is JSON.
pub const YAML_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Properties read by the image actions.
pub mod image_props {
    pub const NAME: &str = "ImageName";
    pub const X: &str = "X";
    pub const Y: &str = "Y";
    pub const WIDTH: &str = "Width";
    pub const HEIGHT: &str = "Height";
    pub const COLOR: &str = "Color";
}
