//! Trellis core: structural model, diagram renderer and snapshot cell

pub mod model;
pub mod render;
pub mod settings;
pub mod snapshot;

pub use model::{
    ClassEntry, Extraction, FileFailure, MethodSignature, Relationship, StructuralModel,
    UNNAMED_CLASS, display_name,
};
pub use render::render;
pub use settings::{
    DEFAULT_DESCRIPTOR, ProjectSettings, SETTINGS_FILE, ServerSettings, Settings, SettingsError,
};
pub use snapshot::{DiagramCell, DiagramReader, DiagramSnapshot};
