//! PlantUML class-diagram rendering

use crate::model::StructuralModel;

pub const DIAGRAM_HEADER: &str = "@startuml";
pub const DIAGRAM_TRAILER: &str = "@enduml";

/// Render a structural model into PlantUML text.
///
/// Output follows input order exactly: one `class` block per entry with its
/// methods indented by two spaces, then one `from --> to` line per
/// relationship. Lines are joined with `\n` and there is no trailing newline,
/// so an empty model renders as `@startuml\n@enduml`.
pub fn render(model: &StructuralModel) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(
        2 + model.relationships.len()
            + model.classes.iter().map(|c| c.methods.len() + 2).sum::<usize>(),
    );

    lines.push(DIAGRAM_HEADER.to_string());

    for class in &model.classes {
        lines.push(format!("class {} {{", class.name));
        for method in &class.methods {
            lines.push(format!("  {}", method));
        }
        lines.push("}".to_string());
    }

    for rel in &model.relationships {
        lines.push(format!("{} --> {}", rel.from, rel.to));
    }

    lines.push(DIAGRAM_TRAILER.to_string());
    lines.join("\n")
}
